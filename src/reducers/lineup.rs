use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::GameStageState;
use crate::error::ReduceError;
use crate::events::{Event, EventBody, EventKind, Position};
use crate::reducer::{ReduceContext, Reducer, State};

/// Skaters fielded by one team in the current jam.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineupState {
    pub jam: u32,
    pub skaters: BTreeMap<String, Position>,
}

impl LineupState {
    pub fn skater_in(&self, position: Position) -> Option<&str> {
        self.skaters.iter().find(|(_, p)| **p == position).map(|(s, _)| s.as_str())
    }
}

impl State for LineupState {
    const NAME: &'static str = "lineup";
}

pub struct Lineup;

impl Reducer for Lineup {
    type State = LineupState;

    fn dependencies(&self) -> &'static [&'static str] {
        &[GameStageState::NAME]
    }

    fn handles(&self, kind: EventKind) -> bool {
        matches!(kind, EventKind::SkaterAddedToJam | EventKind::SkaterRemovedFromJam)
    }

    fn keyed(&self) -> bool {
        true
    }

    fn key(&self, event: &Event) -> Option<String> {
        event.body.team().map(|t| t.to_string())
    }

    fn initial_state(&self) -> LineupState {
        LineupState::default()
    }

    fn reduce(&self, state: &LineupState, event: &Event, ctx: &ReduceContext<'_>) -> Result<LineupState, ReduceError> {
        let stage = ctx.get::<GameStageState>()?;
        // Lineups are entered before the jam they belong to starts.
        let jam = if stage.jam_running { stage.jam } else { stage.jam + 1 };
        let mut next = state.clone();
        if next.jam != jam {
            next.jam = jam;
            next.skaters.clear();
        }
        match &event.body {
            EventBody::SkaterAddedToJam(placement) => {
                // One jammer and one pivot per team.
                if placement.position != Position::Blocker {
                    next.skaters.retain(|_, p| *p != placement.position);
                }
                next.skaters.insert(placement.skater_number.clone(), placement.position);
            }
            EventBody::SkaterRemovedFromJam(removal) => {
                next.skaters.remove(&removal.skater_number);
            }
            _ => {}
        }
        Ok(next)
    }
}
