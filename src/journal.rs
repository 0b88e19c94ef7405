//! Append-only JSONL journal of timeline mutations.
//!
//! Each successful mutation of a game is written as one line after it has
//! been committed. Replaying the lines in order through [`Journal::recover`]
//! rebuilds every game's timeline with the same event ids.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TimelineError;
use crate::events::{Event, EventId};
use crate::logging::{log, obj, ts_epoch_ms, v_int, v_str, Domain, Level};
use crate::tick::Tick;
use crate::timeline::Timeline;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation")]
pub enum JournalEntry {
    /// An appended or inserted event, with the id it was given.
    #[serde(rename = "record")]
    Record { ts: u64, game: String, event: Event },
    #[serde(rename = "delete")]
    Delete { ts: u64, game: String, id: EventId },
    #[serde(rename = "move")]
    Move { ts: u64, game: String, id: EventId, tick: Tick },
}

impl JournalEntry {
    pub fn record(game: &str, event: Event) -> Self {
        JournalEntry::Record { ts: ts_epoch_ms(), game: game.to_string(), event }
    }

    pub fn delete(game: &str, id: EventId) -> Self {
        JournalEntry::Delete { ts: ts_epoch_ms(), game: game.to_string(), id }
    }

    pub fn move_to(game: &str, id: EventId, tick: Tick) -> Self {
        JournalEntry::Move { ts: ts_epoch_ms(), game: game.to_string(), id, tick }
    }

    pub fn game(&self) -> &str {
        match self {
            JournalEntry::Record { game, .. } | JournalEntry::Delete { game, .. } | JournalEntry::Move { game, .. } => {
                game
            }
        }
    }

    fn apply(&self, timeline: &mut Timeline) -> Result<(), TimelineError> {
        match self {
            JournalEntry::Record { event, .. } => timeline.insert_event(event.clone()).map(|_| ()),
            JournalEntry::Delete { id, .. } => timeline.delete(*id).map(|_| ()),
            JournalEntry::Move { id, tick, .. } => timeline.move_event(*id, *tick).map(|_| ()),
        }
    }
}

/// Timelines rebuilt from a journal.
#[derive(Debug, Clone, Default)]
pub struct Recovery {
    pub games: BTreeMap<String, Timeline>,
    /// Lines that could not be parsed or applied.
    pub skipped: usize,
}

#[derive(Debug)]
pub struct Journal {
    file: File,
    path: PathBuf,
}

impl Journal {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, entry: &JournalEntry) -> io::Result<()> {
        let line = serde_json::to_string(entry).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()
    }

    /// Every line of the journal; a missing file reads as empty.
    pub fn lines(path: impl AsRef<Path>) -> io::Result<Vec<String>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(path)?);
        reader.lines().collect()
    }

    pub fn recover(path: impl AsRef<Path>) -> io::Result<Recovery> {
        let mut recovery = Recovery::default();
        for (number, line) in Self::lines(path)?.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let outcome = serde_json::from_str::<JournalEntry>(line)
                .map_err(|e| e.to_string())
                .and_then(|entry| {
                    let timeline = recovery.games.entry(entry.game().to_string()).or_default();
                    entry.apply(timeline).map_err(|e| e.to_string())
                });
            if let Err(reason) = outcome {
                recovery.skipped += 1;
                log(
                    Level::Warn,
                    Domain::Archive,
                    "journal_line_skipped",
                    obj(&[("line", v_int(number as i64 + 1)), ("reason", v_str(&reason))]),
                );
            }
        }
        Ok(recovery)
    }

    /// Empties the journal, after its games were archived.
    pub fn truncate(&self) -> io::Result<()> {
        OpenOptions::new().write(true).truncate(true).open(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBody;
    use tempfile::TempDir;

    fn tick(v: i64) -> Tick {
        Tick::new(v).unwrap()
    }

    #[test]
    fn test_recover_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let recovery = Journal::recover(dir.path().join("absent.jsonl")).unwrap();
        assert!(recovery.games.is_empty());
        assert_eq!(recovery.skipped, 0);
    }

    #[test]
    fn test_recover_replays_edits_with_same_ids() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.jsonl");

        let mut timeline = Timeline::new();
        let mut journal = Journal::open(&path).unwrap();
        let started = timeline.append(EventBody::JamStarted, tick(1000)).unwrap();
        journal.append(&JournalEntry::record("g1", timeline.get(started.id).unwrap().clone())).unwrap();
        let expired = timeline.append(EventBody::JamExpired, tick(121_000)).unwrap();
        journal.append(&JournalEntry::record("g1", timeline.get(expired.id).unwrap().clone())).unwrap();
        timeline.delete(expired.id).unwrap();
        journal.append(&JournalEntry::delete("g1", expired.id)).unwrap();
        let moved = timeline.move_event(started.id, tick(2000)).unwrap();
        journal.append(&JournalEntry::move_to("g1", started.id, tick(2000))).unwrap();
        drop(journal);

        let recovery = Journal::recover(&path).unwrap();
        assert_eq!(recovery.skipped, 0);
        let recovered = &recovery.games["g1"];
        assert_eq!(recovered, &timeline);
        assert!(recovered.contains(moved.id));
    }

    #[test]
    fn test_garbage_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.jsonl");
        std::fs::write(&path, "not json\n{\"operation\":\"delete\",\"ts\":1,\"game\":\"g\",\"id\":{\"tick\":5,\"seq\":0}}\n")
            .unwrap();
        let recovery = Journal::recover(&path).unwrap();
        assert_eq!(recovery.skipped, 2);
    }

    #[test]
    fn test_truncate_empties_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.jsonl");
        let mut journal = Journal::open(&path).unwrap();
        journal.append(&JournalEntry::delete("g", EventId::new(tick(1), 0))).unwrap();
        journal.truncate().unwrap();
        assert!(Journal::lines(&path).unwrap().is_empty());
        journal.append(&JournalEntry::delete("g", EventId::new(tick(2), 1))).unwrap();
        assert_eq!(Journal::lines(&path).unwrap().len(), 1);
    }
}
