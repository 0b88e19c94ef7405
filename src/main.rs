//! Replays a journal and prints the resulting state of every game.
//!
//! Usage: derbyclock <journal> [state] [key] [--archive]
//!
//! With a state name only that state is printed. `--archive` also stores the
//! recovered timelines and keyframes in the sqlite archive at `ARCHIVE_PATH`.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::json;

use derbyclock::archive::GameArchive;
use derbyclock::config::ScoreboardConfig;
use derbyclock::journal::Journal;
use derbyclock::logging::{log, obj, v_int, v_str, Domain, Level};
use derbyclock::reducers::default_registry;
use derbyclock::store::Game;

fn main() -> Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let archive = match args.iter().position(|a| a == "--archive") {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    };
    let Some(journal_path) = args.first().cloned() else {
        bail!("usage: derbyclock <journal> [state] [key] [--archive]");
    };
    let state = args.get(1).cloned();
    let key = args.get(2).cloned();

    let config = ScoreboardConfig::from_env();
    let ctx = config.game_context().context("loading ruleset")?;
    let registry = Arc::new(default_registry(&ctx.ruleset)?);

    let recovery = Journal::recover(&journal_path).with_context(|| format!("reading journal {journal_path}"))?;
    log(
        Level::Info,
        Domain::System,
        "journal_recovered",
        obj(&[
            ("path", v_str(&journal_path)),
            ("games", v_int(recovery.games.len() as i64)),
            ("skipped", v_int(recovery.skipped as i64)),
        ]),
    );

    let mut store = if archive { Some(GameArchive::open(&config.archive_path)?) } else { None };

    for (id, timeline) in recovery.games {
        let game = Game::restore(id.as_str(), Arc::clone(&registry), &ctx, timeline, Vec::new())
            .with_context(|| format!("replaying game {id}"))?;

        let states = match (&state, &key) {
            (Some(name), Some(key)) => game.keyed_state(name, key)?,
            (Some(name), None) => game.state(name)?,
            (None, _) => serde_json::to_value(game.states().snapshot()?)?,
        };
        let out = json!({
            "game": id,
            "events": game.timeline().len(),
            "last_tick": game.timeline().last().map(|e| e.tick().get()),
            "digest": game.digest()?,
            "states": states,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);

        if let Some(store) = store.as_mut() {
            store.save_game(&id, game.timeline(), game.keyframes().iter())?;
        }
    }
    Ok(())
}
