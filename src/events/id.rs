use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::tick::Tick;

/// Identifier of an event within a game.
///
/// Ids order by tick first and by insertion sequence second, so two events at
/// the same tick still have a total, reproducible order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId {
    tick: Tick,
    seq: u64,
}

impl EventId {
    pub const fn new(tick: Tick, seq: u64) -> Self {
        Self { tick, seq }
    }

    pub const fn tick(&self) -> Tick {
        self.tick
    }

    pub const fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.tick, self.seq)
    }
}

impl FromStr for EventId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tick, seq) = s
            .split_once('.')
            .ok_or_else(|| format!("event id {s:?} is not <tick>.<seq>"))?;
        let tick: i64 = tick.parse().map_err(|e| format!("bad tick in {s:?}: {e}"))?;
        let tick = Tick::new(tick).map_err(|e| e.to_string())?;
        let seq = seq.parse().map_err(|e| format!("bad sequence in {s:?}: {e}"))?;
        Ok(EventId::new(tick, seq))
    }
}

/// Mints event ids for one timeline.
///
/// The sequence only ever grows, so every minted id is distinct and an id
/// minted later sorts after any earlier id sharing its tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdSequence {
    next: u64,
}

impl IdSequence {
    pub fn mint(&mut self, tick: Tick) -> EventId {
        let id = EventId::new(tick, self.next);
        self.next += 1;
        id
    }

    /// Moves the sequence past an id that was created elsewhere.
    pub fn observe(&mut self, id: EventId) {
        self.next = self.next.max(id.seq() + 1);
    }

    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Gives back `id` if it was the last one minted.
    pub fn release(&mut self, id: EventId) {
        if id.seq() + 1 == self.next {
            self.next = id.seq();
        }
    }

    /// Ensures the next minted sequence is at least `next`.
    pub fn advance_to(&mut self, next: u64) {
        self.next = self.next.max(next);
    }
}
