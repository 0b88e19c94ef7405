use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::GameStageState;
use crate::error::ReduceError;
use crate::events::{Event, EventBody, EventId, EventKind};
use crate::reducer::{ReduceContext, Reducer, State};
use crate::rules::Ruleset;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyRecord {
    /// Id of the assessing event; rescinds refer to it.
    pub id: EventId,
    pub skater_number: String,
    pub code: String,
    pub period: u32,
    pub jam: u32,
}

/// Penalties of one team, in assessment order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltySheetState {
    pub penalties: Vec<PenaltyRecord>,
    /// Skaters that reached the penalty limit.
    pub fouled_out: Vec<String>,
}

impl PenaltySheetState {
    pub fn count_for(&self, skater_number: &str) -> usize {
        self.penalties.iter().filter(|p| p.skater_number == skater_number).count()
    }
}

impl State for PenaltySheetState {
    const NAME: &'static str = "penalty_sheet";
}

pub struct PenaltySheet {
    rules: Arc<Ruleset>,
}

impl PenaltySheet {
    pub fn new(rules: Arc<Ruleset>) -> Self {
        Self { rules }
    }

    fn refresh_fouled_out(&self, state: &mut PenaltySheetState) {
        let limit = self.rules.penalty_limit as usize;
        let mut out: Vec<String> = state
            .penalties
            .iter()
            .map(|p| p.skater_number.clone())
            .filter(|s| limit > 0 && state.count_for(s) >= limit)
            .collect();
        out.sort();
        out.dedup();
        state.fouled_out = out;
    }
}

impl Reducer for PenaltySheet {
    type State = PenaltySheetState;

    fn dependencies(&self) -> &'static [&'static str] {
        &[GameStageState::NAME]
    }

    fn handles(&self, kind: EventKind) -> bool {
        matches!(kind, EventKind::PenaltyAssessed | EventKind::PenaltyRescinded)
    }

    fn keyed(&self) -> bool {
        true
    }

    fn key(&self, event: &Event) -> Option<String> {
        event.body.team().map(|t| t.to_string())
    }

    fn initial_state(&self) -> PenaltySheetState {
        PenaltySheetState::default()
    }

    fn reduce(
        &self,
        state: &PenaltySheetState,
        event: &Event,
        ctx: &ReduceContext<'_>,
    ) -> Result<PenaltySheetState, ReduceError> {
        let mut next = state.clone();
        match &event.body {
            EventBody::PenaltyAssessed(call) => {
                let stage = ctx.get::<GameStageState>()?;
                next.penalties.push(PenaltyRecord {
                    id: event.id,
                    skater_number: call.skater_number.clone(),
                    code: call.code.clone(),
                    period: stage.period,
                    jam: stage.jam,
                });
            }
            // A rescind for a penalty that is gone (deleted or moved) is a no-op.
            EventBody::PenaltyRescinded(rescind) => next.penalties.retain(|p| p.id != rescind.penalty),
            _ => {}
        }
        self.refresh_fouled_out(&mut next);
        Ok(next)
    }
}
