//! SQLite archive of game timelines and keyframes.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde_json::Value;

use crate::events::{Event, EventBody, EventId, EventKind};
use crate::logging::{log, obj, v_int, v_str, Domain, Level};
use crate::store::{KeyFrame, StateId};
use crate::tick::Tick;
use crate::timeline::Timeline;

pub struct GameArchive {
    conn: Connection,
}

impl GameArchive {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("opening archive {path}"))?;
        let mut archive = Self { conn };
        archive.init()?;
        Ok(archive)
    }

    pub fn in_memory() -> Result<Self> {
        let mut archive = Self { conn: Connection::open_in_memory()? };
        archive.init()?;
        Ok(archive)
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS games (
                game TEXT PRIMARY KEY,
                next_seq INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS events (
                game TEXT NOT NULL,
                tick INTEGER NOT NULL,
                seq INTEGER NOT NULL,
                kind TEXT NOT NULL,
                payload TEXT,
                origin TEXT,
                PRIMARY KEY (game, tick, seq)
            );
            CREATE TABLE IF NOT EXISTS keyframes (
                game TEXT NOT NULL,
                tick INTEGER NOT NULL,
                states TEXT NOT NULL,
                PRIMARY KEY (game, tick)
            );
            COMMIT;",
        )?;
        Ok(())
    }

    pub fn games(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT game FROM games ORDER BY game")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Replaces the stored timeline of `game`.
    pub fn save_timeline(&mut self, game: &str, timeline: &Timeline) -> Result<()> {
        let tx = self.conn.transaction()?;
        write_timeline(&tx, game, timeline)?;
        tx.commit()?;
        Ok(())
    }

    /// Replaces the timeline and keyframes of `game` together, so a restore
    /// never pairs frames with a timeline they were not taken from.
    pub fn save_game<'a>(
        &mut self,
        game: &str,
        timeline: &Timeline,
        frames: impl IntoIterator<Item = &'a KeyFrame>,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        write_timeline(&tx, game, timeline)?;
        write_keyframes(&tx, game, frames)?;
        tx.commit()?;
        Ok(())
    }

    pub fn load_timeline(&self, game: &str) -> Result<Option<Timeline>> {
        let next_seq: Option<i64> = self
            .conn
            .query_row("SELECT next_seq FROM games WHERE game = ?1", params![game], |row| row.get(0))
            .optional()?;
        let Some(next_seq) = next_seq else {
            return Ok(None);
        };

        let mut stmt = self
            .conn
            .prepare("SELECT tick, seq, kind, payload, origin FROM events WHERE game = ?1 ORDER BY tick, seq")?;
        let rows = stmt.query_map(params![game], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (tick, seq, kind, payload, origin) = row?;
            let id = EventId::new(Tick::new(tick)?, seq as u64);
            let kind: EventKind = kind.parse()?;
            let payload: Option<Value> = payload
                .map(|p| serde_json::from_str(&p))
                .transpose()
                .with_context(|| format!("payload of event {id}"))?;
            let mut event = Event::new(id, EventBody::decode(kind, payload)?);
            event.origin = origin
                .map(|o| o.parse::<EventId>())
                .transpose()
                .map_err(anyhow::Error::msg)?;
            events.push(event);
        }
        let timeline = Timeline::from_events(events)?.with_next_seq(next_seq as u64);
        Ok(Some(timeline))
    }

    /// Replaces the stored keyframes of `game`.
    pub fn save_keyframes<'a>(&mut self, game: &str, frames: impl IntoIterator<Item = &'a KeyFrame>) -> Result<()> {
        let tx = self.conn.transaction()?;
        write_keyframes(&tx, game, frames)?;
        tx.commit()?;
        Ok(())
    }

    pub fn load_keyframes(&self, game: &str) -> Result<Vec<KeyFrame>> {
        let mut stmt = self.conn.prepare("SELECT tick, states FROM keyframes WHERE game = ?1 ORDER BY tick")?;
        let rows = stmt.query_map(params![game], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
        let mut frames = Vec::new();
        for row in rows {
            let (tick, states) = row?;
            let states: BTreeMap<StateId, Value> =
                serde_json::from_str(&states).with_context(|| format!("keyframe at tick {tick}"))?;
            frames.push(KeyFrame { tick: Tick::new(tick)?, states });
        }
        Ok(frames)
    }
}

fn write_timeline(tx: &Transaction<'_>, game: &str, timeline: &Timeline) -> Result<()> {
    tx.execute("DELETE FROM events WHERE game = ?1", params![game])?;
    tx.execute(
        "INSERT INTO games (game, next_seq) VALUES (?1, ?2)
         ON CONFLICT(game) DO UPDATE SET next_seq = excluded.next_seq",
        params![game, timeline.next_seq() as i64],
    )?;
    for event in timeline.iter() {
        let payload = event.body.payload().map(|p| p.to_string());
        tx.execute(
            "INSERT INTO events (game, tick, seq, kind, payload, origin)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                game,
                event.tick().get(),
                event.id.seq() as i64,
                event.kind().name(),
                payload,
                event.origin.map(|o| o.to_string()),
            ],
        )?;
    }
    log(
        Level::Debug,
        Domain::Archive,
        "timeline_saved",
        obj(&[("game", v_str(game)), ("events", v_int(timeline.len() as i64))]),
    );
    Ok(())
}

fn write_keyframes<'a>(tx: &Transaction<'_>, game: &str, frames: impl IntoIterator<Item = &'a KeyFrame>) -> Result<()> {
    tx.execute("DELETE FROM keyframes WHERE game = ?1", params![game])?;
    for frame in frames {
        tx.execute(
            "INSERT INTO keyframes (game, tick, states) VALUES (?1, ?2, ?3)",
            params![game, frame.tick.get(), serde_json::to_string(&frame.states)?],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ScoreChange, TeamSide};
    use tempfile::TempDir;

    fn tick(v: i64) -> Tick {
        Tick::new(v).unwrap()
    }

    #[test]
    fn test_timeline_roundtrip_keeps_ids_and_sequence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archive.sqlite");
        let mut archive = GameArchive::open(path.to_str().unwrap()).unwrap();

        let mut timeline = Timeline::new();
        let jam = timeline.append(EventBody::JamStarted, tick(1000)).unwrap();
        timeline
            .append(EventBody::ScoreModifiedRelative(ScoreChange { team: TeamSide::Home, points: 4 }), tick(3000))
            .unwrap();
        let last = timeline.append(EventBody::JamEnded, tick(9000)).unwrap();
        timeline.delete(last.id).unwrap();
        timeline.move_event(jam.id, tick(1500)).unwrap();

        archive.save_timeline("bout-1", &timeline).unwrap();
        let loaded = archive.load_timeline("bout-1").unwrap().unwrap();
        assert_eq!(loaded, timeline);
        assert_eq!(archive.games().unwrap(), vec!["bout-1".to_string()]);
        assert!(archive.load_timeline("bout-2").unwrap().is_none());
    }

    #[test]
    fn test_keyframes_roundtrip() {
        let mut archive = GameArchive::in_memory().unwrap();
        let mut states = BTreeMap::new();
        states.insert(StateId::keyed("team_score", "home"), serde_json::json!({"total": 4}));
        let frames = vec![KeyFrame { tick: tick(5000), states }];
        archive.save_keyframes("bout-1", &frames).unwrap();
        assert_eq!(archive.load_keyframes("bout-1").unwrap(), frames);
        assert!(archive.load_keyframes("other").unwrap().is_empty());
    }
}
