use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ClockState;
use crate::error::ReduceError;
use crate::events::{Event, EventBody, EventKind};
use crate::reducer::{ReduceContext, Reducer, State};
use crate::rules::Ruleset;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JamClockState {
    pub clock: ClockState,
    /// Whether the running jam may still end by itself at its duration.
    pub auto_expiry_enabled: bool,
}

impl Default for JamClockState {
    fn default() -> Self {
        Self { clock: ClockState::default(), auto_expiry_enabled: true }
    }
}

impl State for JamClockState {
    const NAME: &'static str = "jam_clock";
}

pub struct JamClock {
    rules: Arc<Ruleset>,
}

impl JamClock {
    pub fn new(rules: Arc<Ruleset>) -> Self {
        Self { rules }
    }
}

impl Reducer for JamClock {
    type State = JamClockState;

    fn handles(&self, kind: EventKind) -> bool {
        matches!(
            kind,
            EventKind::JamStarted
                | EventKind::JamEnded
                | EventKind::JamExpired
                | EventKind::JamClockSet
                | EventKind::JamAutoExpiryDisabled
        )
    }

    fn initial_state(&self) -> JamClockState {
        JamClockState { clock: ClockState::with_duration(Some(self.rules.jam_ticks())), ..Default::default() }
    }

    fn reduce(&self, state: &JamClockState, event: &Event, _ctx: &ReduceContext<'_>) -> Result<JamClockState, ReduceError> {
        let tick = event.tick();
        let mut next = state.clone();
        match &event.body {
            EventBody::JamStarted => {
                next.clock.reset(tick, Some(self.rules.jam_ticks()));
                next.clock.start(tick);
                next.auto_expiry_enabled = true;
            }
            EventBody::JamEnded | EventBody::JamExpired => next.clock.stop(tick),
            EventBody::JamClockSet(set) => next.clock.set_remaining(tick, set.seconds_remaining),
            EventBody::JamAutoExpiryDisabled => next.auto_expiry_enabled = false,
            _ => {}
        }
        next.clock.refresh(tick);
        Ok(next)
    }
}
