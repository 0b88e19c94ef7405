use serde::{Deserialize, Serialize};

use super::GameStageState;
use crate::error::ReduceError;
use crate::events::{Event, EventBody, EventKind};
use crate::reducer::{ReduceContext, Reducer, State};

/// Points of one team, kept per team side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamScoreState {
    pub total: i64,
    /// Points scored in `jam`.
    pub jam_points: i64,
    pub jam: u32,
}

impl State for TeamScoreState {
    const NAME: &'static str = "team_score";
}

pub struct TeamScore;

impl Reducer for TeamScore {
    type State = TeamScoreState;

    fn dependencies(&self) -> &'static [&'static str] {
        &[GameStageState::NAME]
    }

    fn handles(&self, kind: EventKind) -> bool {
        matches!(kind, EventKind::ScoreModifiedRelative | EventKind::ScoreSet)
    }

    fn keyed(&self) -> bool {
        true
    }

    fn key(&self, event: &Event) -> Option<String> {
        event.body.team().map(|t| t.to_string())
    }

    fn initial_state(&self) -> TeamScoreState {
        TeamScoreState::default()
    }

    fn reduce(&self, state: &TeamScoreState, event: &Event, ctx: &ReduceContext<'_>) -> Result<TeamScoreState, ReduceError> {
        let jam = ctx.get::<GameStageState>()?.jam;
        let mut next = state.clone();
        if next.jam != jam {
            next.jam = jam;
            next.jam_points = 0;
        }
        match &event.body {
            EventBody::ScoreModifiedRelative(change) => {
                next.total += i64::from(change.points);
                next.jam_points += i64::from(change.points);
            }
            EventBody::ScoreSet(change) => {
                let delta = i64::from(change.points) - next.total;
                next.total = i64::from(change.points);
                next.jam_points += delta;
            }
            _ => {}
        }
        if next.total < 0 {
            return Err(ReduceError::Failed {
                reducer: TeamScoreState::NAME,
                event: event.id,
                reason: format!("score would drop to {}", next.total),
            });
        }
        Ok(next)
    }
}
