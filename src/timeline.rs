//! The ordered, editable event log of one game.
//!
//! Every mutation reports the lowest tick whose derived state it may have
//! changed; the store recomputes from there.

use serde::{Deserialize, Serialize};

use crate::error::TimelineError;
use crate::events::{Capabilities, Event, EventBody, EventId, IdSequence};
use crate::tick::Tick;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    events: Vec<Event>,
    ids: IdSequence,
}

/// Result of an append, insert or move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    pub id: EventId,
    /// Lowest affected tick.
    pub from: Tick,
}

/// Result of a delete.
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    pub removed: Event,
    pub replacement: Option<EventId>,
    /// Lowest affected tick.
    pub from: Tick,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a timeline from persisted events, keeping their ids.
    pub fn from_events(events: impl IntoIterator<Item = Event>) -> Result<Self, TimelineError> {
        let mut timeline = Timeline::new();
        for event in events {
            timeline.insert_event(event)?;
        }
        Ok(timeline)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn first(&self) -> Option<&Event> {
        self.events.first()
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.binary_search_by(|e| e.id.cmp(&id)).ok().map(|i| &self.events[i])
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.get(id).is_some()
    }

    /// Events with a tick strictly greater than `tick`.
    pub fn events_after(&self, tick: Tick) -> &[Event] {
        let start = self.events.partition_point(|e| e.tick() <= tick);
        &self.events[start..]
    }

    /// Events with a tick less than or equal to `tick`.
    pub fn events_through(&self, tick: Tick) -> &[Event] {
        let end = self.events.partition_point(|e| e.tick() <= tick);
        &self.events[..end]
    }

    /// Events the user sees in an undo/history list.
    pub fn history(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| e.has(Capabilities::SHOWN_IN_HISTORY))
    }

    /// Sequence number the next minted id will carry.
    pub fn next_seq(&self) -> u64 {
        self.ids.peek()
    }

    /// Restores a persisted sequence so ids of deleted events are not reused.
    pub fn with_next_seq(mut self, next: u64) -> Self {
        self.ids.advance_to(next);
        self
    }

    /// Adds an event at the end of the timeline.
    pub fn append(&mut self, body: EventBody, tick: Tick) -> Result<Edit, TimelineError> {
        if let Some(last) = self.events.last() {
            if tick < last.tick() {
                return Err(TimelineError::AppendBeforeEnd { tick, last: last.tick() });
            }
        }
        let id = self.ids.mint(tick);
        self.events.push(Event::new(id, body));
        Ok(Edit { id, from: tick })
    }

    /// Adds an event at its own tick, after any event already at that tick.
    pub fn insert(&mut self, body: EventBody, tick: Tick) -> Result<Edit, TimelineError> {
        let id = self.ids.mint(tick);
        self.place(Event::new(id, body));
        Ok(Edit { id, from: tick })
    }

    /// Adds an event that already carries an id.
    pub fn insert_event(&mut self, event: Event) -> Result<Tick, TimelineError> {
        if self.contains(event.id) {
            return Err(TimelineError::DuplicateId(event.id));
        }
        self.ids.observe(event.id);
        let tick = event.tick();
        self.place(event);
        Ok(tick)
    }

    fn place(&mut self, event: Event) {
        let pos = self.events.partition_point(|e| e.id < event.id);
        self.events.insert(pos, event);
    }

    fn index_of(&self, id: EventId) -> Result<usize, TimelineError> {
        self.events
            .binary_search_by(|e| e.id.cmp(&id))
            .map_err(|_| TimelineError::NotFound(id))
    }

    /// Deletes an event.
    ///
    /// Always-persisted events are refused. Replace-on-delete events leave
    /// their replacement kind one tick earlier.
    pub fn delete(&mut self, id: EventId) -> Result<Removal, TimelineError> {
        let idx = self.index_of(id)?;
        let kind = self.events[idx].kind();
        if kind.has(Capabilities::ALWAYS_PERSISTED) {
            return Err(TimelineError::CannotDelete { id, kind });
        }

        let substitute = match kind.replacement() {
            Some(replacement) => {
                let tick = id.tick().sub_ticks(1)?;
                Some((EventBody::decode(replacement, None)?, tick))
            }
            None => None,
        };

        let removed = self.events.remove(idx);
        match substitute {
            Some((body, tick)) => {
                let edit = self.insert(body, tick)?;
                Ok(Removal { removed, replacement: Some(edit.id), from: tick })
            }
            None => Ok(Removal { removed, replacement: None, from: id.tick() }),
        }
    }

    /// Moves an event to a new tick under a fresh id. Always-persisted events
    /// are refused, as for `delete`.
    pub fn move_event(&mut self, id: EventId, tick: Tick) -> Result<Edit, TimelineError> {
        let idx = self.index_of(id)?;
        let kind = self.events[idx].kind();
        if kind.has(Capabilities::ALWAYS_PERSISTED) {
            return Err(TimelineError::CannotDelete { id, kind });
        }
        let mut event = self.events.remove(idx);
        event.origin = Some(event.display_id());
        event.id = self.ids.mint(tick);
        let new_id = event.id;
        self.place(event);
        Ok(Edit { id: new_id, from: id.tick().min(tick) })
    }

    /// Removes an event without capability checks and gives its id back.
    /// Used to roll back an append whose application failed.
    pub(crate) fn retract(&mut self, id: EventId) -> Option<Event> {
        let idx = self.index_of(id).ok()?;
        self.ids.release(id);
        Some(self.events.remove(idx))
    }
}
