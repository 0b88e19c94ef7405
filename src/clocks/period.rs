use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ClockState;
use crate::error::ReduceError;
use crate::events::{Capabilities, Event, EventBody, EventKind};
use crate::reducer::{ReduceContext, Reducer, State};
use crate::reducers::GameStageState;
use crate::rules::Ruleset;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodClockState {
    pub clock: ClockState,
    /// Period the clock currently measures; 0 before the first jam.
    pub number: u32,
}

impl State for PeriodClockState {
    const NAME: &'static str = "period_clock";
}

pub struct PeriodClock {
    rules: Arc<Ruleset>,
}

impl PeriodClock {
    pub fn new(rules: Arc<Ruleset>) -> Self {
        Self { rules }
    }
}

impl Reducer for PeriodClock {
    type State = PeriodClockState;

    fn dependencies(&self) -> &'static [&'static str] {
        &[GameStageState::NAME]
    }

    fn handles(&self, kind: EventKind) -> bool {
        kind.has(Capabilities::PERIOD_CLOCK_ALIGNED) || kind == EventKind::PeriodClockSet
    }

    fn initial_state(&self) -> PeriodClockState {
        PeriodClockState { clock: ClockState::with_duration(Some(self.rules.period_ticks())), number: 0 }
    }

    fn reduce(
        &self,
        state: &PeriodClockState,
        event: &Event,
        ctx: &ReduceContext<'_>,
    ) -> Result<PeriodClockState, ReduceError> {
        let tick = event.tick();
        let mut next = state.clone();
        if event.has(Capabilities::PERIOD_CLOCK_ALIGNED) {
            next.clock.align(tick);
        }
        match &event.body {
            EventBody::JamStarted => {
                let stage = ctx.get::<GameStageState>()?;
                if stage.period != next.number {
                    next.clock.reset(tick, Some(self.rules.period_ticks()));
                    next.number = stage.period;
                }
                next.clock.start(tick);
            }
            EventBody::TimeoutStarted(_) | EventBody::PeriodEnded => next.clock.stop(tick),
            EventBody::PeriodClockSet(set) => next.clock.set_remaining(tick, set.seconds_remaining),
            _ => {}
        }
        next.clock.refresh(tick);
        Ok(next)
    }
}
