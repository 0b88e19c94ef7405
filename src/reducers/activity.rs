use serde::{Deserialize, Serialize};

use crate::error::ReduceError;
use crate::events::{Event, EventId, EventKind};
use crate::reducer::{ReduceContext, Reducer, Scope, State};

/// Sees every event of the game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityState {
    pub events: u64,
    pub last_event: Option<EventId>,
    pub last_kind: Option<EventKind>,
}

impl State for ActivityState {
    const NAME: &'static str = "activity";
}

pub struct Activity;

impl Reducer for Activity {
    type State = ActivityState;

    fn scope(&self) -> Scope {
        Scope::Global
    }

    fn handles(&self, _kind: EventKind) -> bool {
        true
    }

    fn initial_state(&self) -> ActivityState {
        ActivityState::default()
    }

    fn reduce(&self, state: &ActivityState, event: &Event, _ctx: &ReduceContext<'_>) -> Result<ActivityState, ReduceError> {
        Ok(ActivityState {
            events: state.events + 1,
            last_event: Some(event.display_id()),
            last_kind: Some(event.kind()),
        })
    }
}
