use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::GameStageState;
use crate::error::ReduceError;
use crate::events::{Event, EventBody, EventKind, TimeoutCaller};
use crate::reducer::{ReduceContext, Reducer, State};
use crate::rules::Ruleset;

/// Timeout and official review allowances of one team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamTimeoutsState {
    pub timeouts_remaining: u32,
    pub reviews_remaining: u32,
    /// Period the review allowance applies to.
    pub period: u32,
    pub timeouts_taken: u32,
    pub reviews_taken: u32,
}

impl State for TeamTimeoutsState {
    const NAME: &'static str = "team_timeouts";
}

pub struct TeamTimeouts {
    rules: Arc<Ruleset>,
}

impl TeamTimeouts {
    pub fn new(rules: Arc<Ruleset>) -> Self {
        Self { rules }
    }
}

impl Reducer for TeamTimeouts {
    type State = TeamTimeoutsState;

    fn dependencies(&self) -> &'static [&'static str] {
        &[GameStageState::NAME]
    }

    fn handles(&self, kind: EventKind) -> bool {
        matches!(kind, EventKind::TimeoutStarted | EventKind::OfficialReviewRetained)
    }

    fn keyed(&self) -> bool {
        true
    }

    fn key(&self, event: &Event) -> Option<String> {
        event.body.team().map(|t| t.to_string())
    }

    fn initial_state(&self) -> TeamTimeoutsState {
        TeamTimeoutsState {
            timeouts_remaining: self.rules.team_timeouts,
            reviews_remaining: self.rules.reviews_per_period,
            ..Default::default()
        }
    }

    fn reduce(
        &self,
        state: &TeamTimeoutsState,
        event: &Event,
        ctx: &ReduceContext<'_>,
    ) -> Result<TeamTimeoutsState, ReduceError> {
        let period = ctx.get::<GameStageState>()?.period;
        let mut next = state.clone();
        if next.period != period {
            next.period = period;
            next.reviews_remaining = self.rules.reviews_per_period;
        }
        match &event.body {
            EventBody::TimeoutStarted(start) => match start.caller {
                Some(TimeoutCaller::Team(_)) => {
                    next.timeouts_remaining = next.timeouts_remaining.saturating_sub(1);
                    next.timeouts_taken += 1;
                }
                Some(TimeoutCaller::Review(_)) => {
                    next.reviews_remaining = next.reviews_remaining.saturating_sub(1);
                    next.reviews_taken += 1;
                }
                _ => {}
            },
            EventBody::OfficialReviewRetained(_) => {
                next.reviews_remaining = (next.reviews_remaining + 1).min(self.rules.reviews_per_period);
            }
            _ => {}
        }
        Ok(next)
    }
}
