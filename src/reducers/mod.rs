//! The scoreboard's reducers and their registration order.

pub mod activity;
pub mod lineup;
pub mod penalties;
pub mod score;
pub mod stage;
pub mod timeouts;

use std::sync::Arc;

use crate::clocks::{IntermissionClock, JamClock, LineupClock, PeriodClock, TimeoutClock};
use crate::error::RegistryError;
use crate::reducer::ReducerRegistry;
use crate::rules::Ruleset;

pub use activity::{Activity, ActivityState};
pub use lineup::{Lineup, LineupState};
pub use penalties::{PenaltyRecord, PenaltySheet, PenaltySheetState};
pub use score::{TeamScore, TeamScoreState};
pub use stage::{GameStage, GameStageState, Phase};
pub use timeouts::{TeamTimeouts, TeamTimeoutsState};

/// Every reducer a scoreboard game runs.
pub fn default_registry(rules: &Arc<Ruleset>) -> Result<ReducerRegistry, RegistryError> {
    ReducerRegistry::builder()
        .register(GameStage::new(Arc::clone(rules)))
        .register(JamClock::new(Arc::clone(rules)))
        .register(PeriodClock::new(Arc::clone(rules)))
        .register(LineupClock::new(Arc::clone(rules)))
        .register(TimeoutClock::new(Arc::clone(rules)))
        .register(IntermissionClock::new(Arc::clone(rules)))
        .register(TeamScore)
        .register(PenaltySheet::new(Arc::clone(rules)))
        .register(Lineup)
        .register(TeamTimeouts::new(Arc::clone(rules)))
        .register(Activity)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clocks::{JamClockState, LineupClockState, PeriodClockState};
    use crate::events::{
        ClockSet, Event, EventBody, EventId, Position, ScoreChange, SkaterPlacement, TeamSide, TimeoutCaller,
        TimeoutStart,
    };
    use crate::reducer::State;
    use crate::store::{apply_event, StateMap};
    use crate::tick::Tick;

    struct Run {
        registry: ReducerRegistry,
        states: StateMap,
        seq: u64,
    }

    impl Run {
        fn new() -> Self {
            let registry = default_registry(&Arc::new(Ruleset::default())).unwrap();
            let states = StateMap::initial(&registry);
            Self { registry, states, seq: 0 }
        }

        fn apply(&mut self, tick: i64, body: EventBody) {
            let event = Event::new(EventId::new(Tick::new(tick).unwrap(), self.seq), body);
            self.seq += 1;
            apply_event(&self.registry, &mut self.states, &event).unwrap();
        }
    }

    #[test]
    fn test_default_registry_orders_stage_first() {
        let registry = default_registry(&Arc::new(Ruleset::default())).unwrap();
        let names = registry.names();
        let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();
        assert!(pos(GameStageState::NAME) < pos(PeriodClockState::NAME));
        assert!(pos(GameStageState::NAME) < pos(TeamScoreState::NAME));
        assert_eq!(names.len(), 11);
    }

    #[test]
    fn test_jam_clock_set_mid_jam() {
        let mut run = Run::new();
        run.apply(1000, EventBody::JamStarted);
        run.apply(5000, EventBody::JamClockSet(ClockSet { seconds_remaining: 30 }));
        run.apply(9000, EventBody::JamEnded);
        let jam = run.states.typed::<JamClockState>().unwrap();
        assert!(!jam.clock.running);
        assert_eq!(jam.clock.seconds_passed, 94);
    }

    #[test]
    fn test_period_and_lineup_follow_jams() {
        let mut run = Run::new();
        run.apply(0, EventBody::GameStarted);
        run.apply(1000, EventBody::JamStarted);
        run.apply(61_000, EventBody::JamEnded);
        let stage = run.states.typed::<GameStageState>().unwrap();
        assert_eq!((stage.period, stage.jam, stage.phase), (1, 1, Phase::Lineup));
        let period = run.states.typed::<PeriodClockState>().unwrap();
        assert!(period.clock.running);
        assert_eq!(period.clock.anchor, Tick::new(61_000).unwrap());
        assert_eq!(period.clock.seconds_passed, 60);
        assert!(run.states.typed::<LineupClockState>().unwrap().clock.running);

        run.apply(70_000, EventBody::TimeoutStarted(TimeoutStart { caller: Some(TimeoutCaller::Team(TeamSide::Home)) }));
        let period = run.states.typed::<PeriodClockState>().unwrap();
        assert!(!period.clock.running);
        assert_eq!(period.clock.seconds_passed, 69);
        let timeouts = run.states.typed_keyed::<TeamTimeoutsState>("home").unwrap();
        assert_eq!(timeouts.timeouts_remaining, 2);
    }

    #[test]
    fn test_keyed_states_are_independent() {
        let mut run = Run::new();
        run.apply(1000, EventBody::JamStarted);
        run.apply(2000, EventBody::ScoreModifiedRelative(ScoreChange { team: TeamSide::Home, points: 4 }));
        run.apply(3000, EventBody::ScoreModifiedRelative(ScoreChange { team: TeamSide::Away, points: 1 }));
        run.apply(4000, EventBody::ScoreSet(ScoreChange { team: TeamSide::Home, points: 10 }));
        assert_eq!(run.states.typed_keyed::<TeamScoreState>("home").unwrap().total, 10);
        assert_eq!(run.states.typed_keyed::<TeamScoreState>("away").unwrap().total, 1);
        assert_eq!(run.states.keys_of(TeamScoreState::NAME), vec!["away".to_string(), "home".to_string()]);
        assert_eq!(run.states.typed::<ActivityState>().unwrap().events, 4);
    }

    #[test]
    fn test_lineup_replaces_jammer() {
        let mut run = Run::new();
        let place = |n: &str, position| {
            EventBody::SkaterAddedToJam(SkaterPlacement { team: TeamSide::Away, skater_number: n.into(), position })
        };
        run.apply(100, place("12", Position::Jammer));
        run.apply(200, place("7", Position::Blocker));
        run.apply(300, place("99", Position::Jammer));
        let lineup = run.states.typed_keyed::<LineupState>("away").unwrap();
        assert_eq!(lineup.jam, 1);
        assert_eq!(lineup.skater_in(Position::Jammer), Some("99"));
        assert_eq!(lineup.skaters.len(), 2);
    }

    #[test]
    fn test_negative_score_fails() {
        let registry = default_registry(&Arc::new(Ruleset::default())).unwrap();
        let mut states = StateMap::initial(&registry);
        let event = Event::new(
            EventId::new(Tick::ZERO, 0),
            EventBody::ScoreModifiedRelative(ScoreChange { team: TeamSide::Home, points: -1 }),
        );
        assert!(apply_event(&registry, &mut states, &event).is_err());
    }
}
