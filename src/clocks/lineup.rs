use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ClockState;
use crate::error::ReduceError;
use crate::events::{Event, EventBody, EventKind};
use crate::reducer::{ReduceContext, Reducer, State};
use crate::reducers::GameStageState;
use crate::rules::Ruleset;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineupClockState {
    pub clock: ClockState,
}

impl State for LineupClockState {
    const NAME: &'static str = "lineup_clock";
}

/// Time between jams.
pub struct LineupClock {
    rules: Arc<Ruleset>,
}

impl LineupClock {
    pub fn new(rules: Arc<Ruleset>) -> Self {
        Self { rules }
    }
}

impl Reducer for LineupClock {
    type State = LineupClockState;

    fn dependencies(&self) -> &'static [&'static str] {
        &[GameStageState::NAME]
    }

    fn handles(&self, kind: EventKind) -> bool {
        matches!(
            kind,
            EventKind::JamStarted
                | EventKind::JamEnded
                | EventKind::JamExpired
                | EventKind::TimeoutStarted
                | EventKind::TimeoutEnded
                | EventKind::PeriodEnded
        )
    }

    fn initial_state(&self) -> LineupClockState {
        LineupClockState { clock: ClockState::with_duration(Some(self.rules.lineup_ticks())) }
    }

    fn reduce(
        &self,
        state: &LineupClockState,
        event: &Event,
        ctx: &ReduceContext<'_>,
    ) -> Result<LineupClockState, ReduceError> {
        let tick = event.tick();
        let mut next = state.clone();
        match &event.body {
            EventBody::JamEnded | EventBody::JamExpired => self.restart(&mut next, event),
            EventBody::TimeoutEnded => {
                if ctx.get::<GameStageState>()?.period_active {
                    self.restart(&mut next, event);
                }
            }
            EventBody::JamStarted | EventBody::TimeoutStarted(_) | EventBody::PeriodEnded => next.clock.stop(tick),
            _ => {}
        }
        next.clock.refresh(tick);
        Ok(next)
    }
}

impl LineupClock {
    fn restart(&self, state: &mut LineupClockState, event: &Event) {
        state.clock.reset(event.tick(), Some(self.rules.lineup_ticks()));
        state.clock.start(event.tick());
    }
}
