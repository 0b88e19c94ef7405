//! Games archived to sqlite come back with the same state, with or without
//! their keyframes.

use std::sync::Arc;

use tempfile::TempDir;

use derbyclock::archive::GameArchive;
use derbyclock::config::GameContext;
use derbyclock::events::{EventBody, PenaltyCall, PenaltyRescind, ScoreChange, TeamSide};
use derbyclock::reducers::PenaltySheetState;
use derbyclock::rules::Ruleset;
use derbyclock::store::{Game, KeyFrame, KeyFramePolicy};
use derbyclock::tick::Tick;

fn tick(v: i64) -> Tick {
    Tick::new(v).unwrap()
}

fn played_game(ctx: &GameContext) -> Game {
    let mut game = Game::with_defaults("bout", ctx).unwrap();
    game.append(EventBody::GameStarted, tick(0)).unwrap();
    game.append(EventBody::JamStarted, tick(1000)).unwrap();
    let call = PenaltyCall { team: TeamSide::Away, skater_number: "12".to_string(), code: "B".to_string() };
    let first = game.append(EventBody::PenaltyAssessed(call.clone()), tick(4000)).unwrap();
    game.append(EventBody::ScoreModifiedRelative(ScoreChange { team: TeamSide::Home, points: 4 }), tick(6000))
        .unwrap();
    game.append(EventBody::JamEnded, tick(30_000)).unwrap();
    game.append(EventBody::PenaltyAssessed(call), tick(40_000)).unwrap();
    game.append(
        EventBody::PenaltyRescinded(PenaltyRescind { team: TeamSide::Away, penalty: first }),
        tick(45_000),
    )
    .unwrap();
    let extra = game.append(EventBody::JamStarted, tick(60_000)).unwrap();
    game.delete(extra).unwrap();
    game
}

#[test]
fn archived_game_restores_identically() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scoreboard.sqlite");
    let ctx = GameContext::new(Ruleset::default(), KeyFramePolicy::every(2));
    let game = played_game(&ctx);
    assert_eq!(game.get_keyed::<PenaltySheetState>("away").unwrap().penalties.len(), 1);

    {
        let mut archive = GameArchive::open(path.to_str().unwrap()).unwrap();
        archive.save_game(game.id(), game.timeline(), game.keyframes().iter()).unwrap();
    }

    let archive = GameArchive::open(path.to_str().unwrap()).unwrap();
    assert_eq!(archive.games().unwrap(), vec!["bout".to_string()]);
    let timeline = archive.load_timeline("bout").unwrap().unwrap();
    let frames = archive.load_keyframes("bout").unwrap();
    assert_eq!(&timeline, game.timeline());
    assert_eq!(frames.len(), game.keyframes().len());

    let registry = Arc::clone(game.registry());
    let with_frames = Game::restore("bout", Arc::clone(&registry), &ctx, timeline.clone(), frames).unwrap();
    let without = Game::restore("bout", registry, &ctx, timeline, Vec::new()).unwrap();
    assert_eq!(with_frames.digest().unwrap(), game.digest().unwrap());
    assert_eq!(without.digest().unwrap(), game.digest().unwrap());
}

#[test]
fn restored_game_keeps_minting_fresh_ids() {
    let ctx = GameContext::new(Ruleset::default(), KeyFramePolicy::default());
    let game = played_game(&ctx);
    let mut archive = GameArchive::in_memory().unwrap();
    archive.save_timeline("bout", game.timeline()).unwrap();

    let timeline = archive.load_timeline("bout").unwrap().unwrap();
    let mut restored = Game::restore("bout", Arc::clone(game.registry()), &ctx, timeline, Vec::new()).unwrap();
    let id = restored.append(EventBody::JamStarted, tick(60_000)).unwrap();
    assert_eq!(id.seq(), game.timeline().next_seq());
}

#[test]
fn frames_from_another_timeline_are_ignored_on_restore() {
    let ctx = GameContext::new(Ruleset::default(), KeyFramePolicy::every(2));
    let game = played_game(&ctx);
    let frames: Vec<KeyFrame> = game.keyframes().iter().cloned().collect();
    assert!(frames.len() >= 2);
    let first = frames.first().unwrap();
    let last = frames.last().unwrap();

    // Neither tick carries an event; both frames would corrupt a restore if trusted.
    let early = KeyFrame { tick: tick(2), states: last.states.clone() };
    let late = KeyFrame { tick: tick(90_000), states: first.states.clone() };

    let registry = Arc::clone(game.registry());
    let only_stale =
        Game::restore("bout", Arc::clone(&registry), &ctx, game.timeline().clone(), vec![early.clone(), late.clone()])
            .unwrap();
    assert_eq!(only_stale.digest().unwrap(), game.digest().unwrap());

    let mut mixed = frames.clone();
    mixed.push(early);
    mixed.push(late);
    let restored = Game::restore("bout", registry, &ctx, game.timeline().clone(), mixed).unwrap();
    assert_eq!(restored.digest().unwrap(), game.digest().unwrap());
    assert!(!restored.keyframes().ticks().contains(&tick(2)));
    assert!(!restored.keyframes().ticks().contains(&tick(90_000)));
}

#[test]
fn saving_a_game_replaces_timeline_and_frames_together() {
    let ctx = GameContext::new(Ruleset::default(), KeyFramePolicy::every(2));
    let mut game = played_game(&ctx);
    let mut archive = GameArchive::in_memory().unwrap();
    archive.save_game("bout", game.timeline(), game.keyframes().iter()).unwrap();

    let jam = game.timeline().events()[1].id;
    game.move_event(jam, tick(2000)).unwrap();
    archive.save_game("bout", game.timeline(), game.keyframes().iter()).unwrap();

    let timeline = archive.load_timeline("bout").unwrap().unwrap();
    let frames = archive.load_keyframes("bout").unwrap();
    assert_eq!(&timeline, game.timeline());
    assert_eq!(frames.iter().map(|f| f.tick).collect::<Vec<_>>(), game.keyframes().ticks());

    let restored = Game::restore("bout", Arc::clone(game.registry()), &ctx, timeline, frames).unwrap();
    assert_eq!(restored.digest().unwrap(), game.digest().unwrap());
}
