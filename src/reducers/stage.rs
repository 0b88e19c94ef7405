use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ReduceError;
use crate::events::{Event, EventBody, EventKind};
use crate::reducer::{ReduceContext, Reducer, State};
use crate::rules::Ruleset;
use crate::tick::Tick;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    PreGame,
    Lineup,
    Jam,
    Timeout,
    Intermission,
    BetweenPeriods,
    Final,
}

/// Where the game stands: period and jam numbering plus what is running.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStageState {
    pub phase: Phase,
    pub started: bool,
    pub period: u32,
    pub period_active: bool,
    /// Jams in the whole game.
    pub jam: u32,
    /// Jams in the current period.
    pub period_jam: u32,
    pub jam_running: bool,
    pub timeout_running: bool,
    pub intermission_running: bool,
    pub last_jam_ended: Option<Tick>,
}

impl State for GameStageState {
    const NAME: &'static str = "game_stage";
}

pub struct GameStage {
    rules: Arc<Ruleset>,
}

impl GameStage {
    pub fn new(rules: Arc<Ruleset>) -> Self {
        Self { rules }
    }

    fn resting_phase(&self, state: &GameStageState) -> Phase {
        if state.period_active {
            Phase::Lineup
        } else if state.period == 0 {
            Phase::PreGame
        } else if state.period >= self.rules.period_count {
            Phase::Final
        } else {
            Phase::BetweenPeriods
        }
    }
}

impl Reducer for GameStage {
    type State = GameStageState;

    fn handles(&self, kind: EventKind) -> bool {
        matches!(
            kind,
            EventKind::GameStarted
                | EventKind::JamStarted
                | EventKind::JamEnded
                | EventKind::JamExpired
                | EventKind::PeriodEnded
                | EventKind::TimeoutStarted
                | EventKind::TimeoutEnded
                | EventKind::IntermissionStarted
                | EventKind::IntermissionEnded
        )
    }

    fn initial_state(&self) -> GameStageState {
        GameStageState::default()
    }

    fn reduce(&self, state: &GameStageState, event: &Event, _ctx: &ReduceContext<'_>) -> Result<GameStageState, ReduceError> {
        let mut next = state.clone();
        match &event.body {
            EventBody::GameStarted => next.started = true,
            EventBody::JamStarted => {
                if !next.period_active {
                    next.period += 1;
                    next.period_active = true;
                    next.period_jam = 0;
                    next.intermission_running = false;
                }
                next.started = true;
                next.jam += 1;
                next.period_jam += 1;
                next.jam_running = true;
                next.timeout_running = false;
            }
            EventBody::JamEnded | EventBody::JamExpired => {
                if next.jam_running {
                    next.jam_running = false;
                    next.last_jam_ended = Some(event.tick());
                }
            }
            EventBody::TimeoutStarted(_) => next.timeout_running = true,
            EventBody::TimeoutEnded => next.timeout_running = false,
            EventBody::PeriodEnded => {
                if next.jam_running {
                    next.last_jam_ended = Some(event.tick());
                }
                next.period_active = false;
                next.jam_running = false;
                next.timeout_running = false;
            }
            EventBody::IntermissionStarted(_) => next.intermission_running = true,
            EventBody::IntermissionEnded => next.intermission_running = false,
            _ => {}
        }
        next.phase = if next.jam_running {
            Phase::Jam
        } else if next.timeout_running {
            Phase::Timeout
        } else if next.intermission_running {
            Phase::Intermission
        } else {
            self.resting_phase(&next)
        };
        Ok(next)
    }
}
