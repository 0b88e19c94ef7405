//! Events implied by running clocks.
//!
//! Nothing here mutates state: [`derive`] only reports what should be
//! appended, and `Game::advance_to` decides to append it.

use crate::clocks::{IntermissionClockState, JamClockState, PeriodClockState};
use crate::events::EventBody;
use crate::reducers::GameStageState;
use crate::rules::{PeriodEndBehavior, Ruleset};
use crate::store::StateMap;
use crate::tick::Tick;

/// Events due at or before `now`, each with the tick it belongs at, sorted
/// by tick.
pub fn derive(states: &StateMap, rules: &Ruleset, now: Tick) -> Vec<(EventBody, Tick)> {
    let mut due = Vec::new();
    let stage = states.typed::<GameStageState>();

    if let Some(jam) = states.typed::<JamClockState>() {
        if jam.auto_expiry_enabled && stage.map_or(true, |s| s.jam_running) {
            if let Some(at) = jam.clock.expires_at().filter(|at| *at <= now) {
                due.push((EventBody::JamExpired, at));
            }
        }
    }

    if rules.period_end == PeriodEndBehavior::Automatic {
        if let (Some(stage), Some(period)) = (stage, states.typed::<PeriodClockState>()) {
            let idle = stage.period_active && !stage.jam_running && !stage.timeout_running;
            if idle && period.clock.is_expired_at(now) {
                let ran_out = period.clock.expires_at().unwrap_or(period.clock.anchor);
                let at = stage.last_jam_ended.map_or(ran_out, |ended| ran_out.max(ended));
                due.push((EventBody::PeriodEnded, at.min(now)));
            }
        }
    }

    if let Some(intermission) = states.typed::<IntermissionClockState>() {
        if let Some(at) = intermission.clock.expires_at().filter(|at| *at <= now) {
            due.push((EventBody::IntermissionEnded, at));
        }
    }

    due.sort_by_key(|(_, at)| *at);
    due
}
