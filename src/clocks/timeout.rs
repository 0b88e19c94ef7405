use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ClockState;
use crate::error::ReduceError;
use crate::events::{Event, EventBody, EventKind, TimeoutCaller};
use crate::reducer::{ReduceContext, Reducer, State};
use crate::rules::Ruleset;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutClockState {
    pub clock: ClockState,
    pub caller: Option<TimeoutCaller>,
}

impl State for TimeoutClockState {
    const NAME: &'static str = "timeout_clock";
}

pub struct TimeoutClock {
    rules: Arc<Ruleset>,
}

impl TimeoutClock {
    pub fn new(rules: Arc<Ruleset>) -> Self {
        Self { rules }
    }

    fn duration_for(&self, caller: Option<TimeoutCaller>) -> Option<i64> {
        match caller {
            Some(TimeoutCaller::Team(_)) | Some(TimeoutCaller::Review(_)) => Some(self.rules.team_timeout_ticks()),
            Some(TimeoutCaller::Official) | None => None,
        }
    }
}

impl Reducer for TimeoutClock {
    type State = TimeoutClockState;

    fn handles(&self, kind: EventKind) -> bool {
        matches!(kind, EventKind::TimeoutStarted | EventKind::TimeoutEnded)
    }

    fn initial_state(&self) -> TimeoutClockState {
        TimeoutClockState::default()
    }

    fn reduce(
        &self,
        state: &TimeoutClockState,
        event: &Event,
        _ctx: &ReduceContext<'_>,
    ) -> Result<TimeoutClockState, ReduceError> {
        let tick = event.tick();
        let mut next = state.clone();
        match &event.body {
            EventBody::TimeoutStarted(start) => {
                next.clock.reset(tick, self.duration_for(start.caller));
                next.clock.start(tick);
                next.caller = start.caller;
            }
            EventBody::TimeoutEnded => next.clock.stop(tick),
            _ => {}
        }
        next.clock.refresh(tick);
        Ok(next)
    }
}
