//! Events: identity, kind tags and typed payloads.

pub mod body;
pub mod id;
pub mod kind;

use serde::{Deserialize, Serialize};

pub use body::{
    ClockSet, EventBody, IntermissionStart, PenaltyCall, PenaltyRescind, Position, ScoreChange,
    SkaterPlacement, SkaterRemoval, TeamRef, TeamSide, TimeoutCaller, TimeoutStart,
};
pub use id::{EventId, IdSequence};
pub use kind::{Capabilities, EventKind, PayloadShape};

use crate::tick::Tick;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub body: EventBody,
    /// First id this event had before it was moved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<EventId>,
}

impl Event {
    pub fn new(id: EventId, body: EventBody) -> Self {
        Self { id, body, origin: None }
    }

    pub fn tick(&self) -> Tick {
        self.id.tick()
    }

    pub fn kind(&self) -> EventKind {
        self.body.kind()
    }

    pub fn has(&self, capability: Capabilities) -> bool {
        self.kind().has(capability)
    }

    /// Stable identity across moves.
    pub fn display_id(&self) -> EventId {
        self.origin.unwrap_or(self.id)
    }
}
