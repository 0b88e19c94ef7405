use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{seconds_to_ticks, ClockState};
use crate::error::ReduceError;
use crate::events::{Event, EventBody, EventKind};
use crate::reducer::{ReduceContext, Reducer, State};
use crate::rules::Ruleset;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntermissionClockState {
    pub clock: ClockState,
}

impl State for IntermissionClockState {
    const NAME: &'static str = "intermission_clock";
}

pub struct IntermissionClock {
    rules: Arc<Ruleset>,
}

impl IntermissionClock {
    pub fn new(rules: Arc<Ruleset>) -> Self {
        Self { rules }
    }
}

impl Reducer for IntermissionClock {
    type State = IntermissionClockState;

    fn handles(&self, kind: EventKind) -> bool {
        matches!(
            kind,
            EventKind::IntermissionStarted | EventKind::IntermissionEnded | EventKind::IntermissionClockSet
        )
    }

    fn initial_state(&self) -> IntermissionClockState {
        IntermissionClockState { clock: ClockState::with_duration(Some(self.rules.intermission_ticks())) }
    }

    fn reduce(
        &self,
        state: &IntermissionClockState,
        event: &Event,
        _ctx: &ReduceContext<'_>,
    ) -> Result<IntermissionClockState, ReduceError> {
        let tick = event.tick();
        let mut next = state.clone();
        match &event.body {
            EventBody::IntermissionStarted(start) => {
                let duration = match start.duration_seconds {
                    Some(seconds) => seconds_to_ticks(seconds),
                    None => self.rules.intermission_ticks(),
                };
                next.clock.reset(tick, Some(duration));
                next.clock.start(tick);
            }
            EventBody::IntermissionEnded => next.clock.stop(tick),
            EventBody::IntermissionClockSet(set) => next.clock.set_remaining(tick, set.seconds_remaining),
            _ => {}
        }
        next.clock.refresh(tick);
        Ok(next)
    }
}
