//! Error types for the scoreboard engine.
//!
//! Every error here rejects the offending operation and leaves timeline and
//! derived state as they were.

use thiserror::Error;

use crate::events::{EventId, EventKind};
use crate::store::StateId;
use crate::tick::Tick;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TickError {
    #[error("tick value {0} is out of range")]
    OutOfRange(i128),
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("{0} requires a payload")]
    Missing(EventKind),
    #[error("{0} takes no payload")]
    Unexpected(EventKind),
    #[error("malformed {kind} payload: {source}")]
    Invalid {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown event kind {0:?}")]
    UnknownKind(String),
}

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("event {0} not found")]
    NotFound(EventId),
    #[error("event {id} ({kind}) is always persisted and cannot be deleted or moved")]
    CannotDelete { id: EventId, kind: EventKind },
    #[error("event {0} already exists")]
    DuplicateId(EventId),
    #[error("cannot append at tick {tick}: timeline already ends at tick {last}")]
    AppendBeforeEnd { tick: Tick, last: Tick },
    #[error(transparent)]
    Tick(#[from] TickError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("cyclical reducer dependencies among {0:?}")]
    CyclicalDependency(Vec<String>),
    #[error("{reducer} depends on {global}, which is updated by every event")]
    GlobalDependency { reducer: String, global: String },
    #[error("reducer for {0} registered twice")]
    DuplicateReducer(String),
    #[error("{reducer} depends on unregistered state {dependency}")]
    UnknownDependency { reducer: String, dependency: String },
}

#[derive(Debug, Error)]
pub enum ReduceError {
    #[error("{reducer} read {dependency} without declaring it")]
    UndeclaredDependency { reducer: &'static str, dependency: &'static str },
    #[error("state {0} holds a value of an unexpected type")]
    StateType(StateId),
    #[error("dependency state {0} has not been initialised")]
    MissingState(StateId),
    #[error("{reducer} failed on event {event}: {reason}")]
    Failed { reducer: &'static str, event: EventId, reason: String },
    #[error("cannot decode state {state}: {source}")]
    Decode {
        state: StateId,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    #[error(transparent)]
    Reduce(#[from] ReduceError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Tick(#[from] TickError),
    #[error("state {0} not found")]
    NotFound(StateId),
    #[error("no reducer owns state {0}")]
    UnknownState(String),
    #[error("cannot serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_)
                | StoreError::UnknownState(_)
                | StoreError::Timeline(TimelineError::NotFound(_))
        )
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Tick(#[from] TickError),
    #[error("game {0} not found")]
    GameNotFound(String),
    #[error("game {0} already exists")]
    GameExists(String),
    #[error("game {0} is no longer running")]
    Closed(String),
    /// The change was applied but is missing from the journal.
    #[error("game {game}: change applied but not journaled: {source}")]
    Journal {
        game: String,
        #[source]
        source: std::io::Error,
    },
}
