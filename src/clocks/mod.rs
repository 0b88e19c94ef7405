//! Tick-driven clock state machines.
//!
//! A clock never reads wall time. Its value at any tick `q` is derived from
//! the ticks accumulated up to its anchor plus, while running, `q - anchor`.
//! Each clock reducer drives one [`ClockState`] from the event kinds it
//! handles.

pub mod automatic;
pub mod intermission;
pub mod jam;
pub mod lineup;
pub mod period;
pub mod timeout;

use serde::{Deserialize, Serialize};

use crate::tick::{Tick, TICKS_PER_SECOND};

pub use intermission::{IntermissionClock, IntermissionClockState};
pub use jam::{JamClock, JamClockState};
pub use lineup::{LineupClock, LineupClockState};
pub use period::{PeriodClock, PeriodClockState};
pub use timeout::{TimeoutClock, TimeoutClockState};

/// Whole seconds as ticks, clamped to `[0, i64::MAX]`.
pub fn seconds_to_ticks(seconds: i64) -> i64 {
    seconds.max(0).saturating_mul(TICKS_PER_SECOND)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockState {
    pub running: bool,
    /// Tick the running segment started at.
    pub anchor: Tick,
    /// Ticks accumulated before `anchor`.
    pub ticks_before_anchor: i64,
    /// Whole seconds passed as of the last applied event.
    pub seconds_passed: i64,
    pub expired: bool,
    /// Length of the clock in ticks; `None` counts up without limit.
    pub duration: Option<i64>,
}

impl ClockState {
    pub fn with_duration(duration: Option<i64>) -> Self {
        Self { duration, ..Self::default() }
    }

    pub fn ticks_passed_at(&self, q: Tick) -> i64 {
        if self.running {
            self.ticks_before_anchor.saturating_add(q.since(self.anchor).max(0))
        } else {
            self.ticks_before_anchor
        }
    }

    pub fn seconds_passed_at(&self, q: Tick) -> i64 {
        self.ticks_passed_at(q) / TICKS_PER_SECOND
    }

    pub fn ticks_remaining_at(&self, q: Tick) -> Option<i64> {
        self.duration.map(|d| (d - self.ticks_passed_at(q)).max(0))
    }

    /// Tick at which a running clock reaches its duration.
    pub fn expires_at(&self) -> Option<Tick> {
        if !self.running {
            return None;
        }
        let left = (self.duration? - self.ticks_before_anchor).max(0);
        self.anchor.add_ticks(left).ok()
    }

    pub fn is_expired_at(&self, q: Tick) -> bool {
        self.duration.is_some_and(|d| self.ticks_passed_at(q) >= d)
    }

    /// Folds the running segment up to `tick` into the accumulated ticks.
    fn fold(&mut self, tick: Tick) {
        if self.running {
            self.ticks_before_anchor = self.ticks_before_anchor.saturating_add(tick.since(self.anchor).max(0));
        }
        self.anchor = tick;
    }

    pub fn start(&mut self, tick: Tick) {
        self.fold(tick);
        self.running = true;
    }

    /// Stopping a stopped clock changes nothing.
    pub fn stop(&mut self, tick: Tick) {
        if !self.running {
            return;
        }
        self.fold(tick);
        self.running = false;
    }

    /// Re-anchors a running clock at `tick` without changing its value.
    pub fn align(&mut self, tick: Tick) {
        if self.running {
            self.fold(tick);
        }
    }

    /// Overrides the time left. A clock without a duration takes the value
    /// as its new duration.
    pub fn set_remaining(&mut self, tick: Tick, seconds_remaining: i64) {
        let remaining = seconds_to_ticks(seconds_remaining);
        match self.duration {
            Some(d) => self.ticks_before_anchor = (d - remaining).max(0),
            None => {
                self.duration = Some(remaining);
                self.ticks_before_anchor = 0;
            }
        }
        if self.running {
            self.anchor = tick;
        }
        self.expired = false;
    }

    pub fn set_passed(&mut self, tick: Tick, seconds_passed: i64) {
        self.ticks_before_anchor = seconds_to_ticks(seconds_passed);
        if self.running {
            self.anchor = tick;
        }
        self.expired = false;
    }

    /// Stopped clock at zero with a new duration.
    pub fn reset(&mut self, tick: Tick, duration: Option<i64>) {
        *self = Self { anchor: tick, duration, ..Self::default() };
    }

    /// Records the observable values as of `tick`. Expiry latches until the
    /// next reset or set.
    pub fn refresh(&mut self, tick: Tick) {
        self.seconds_passed = self.seconds_passed_at(tick);
        if self.is_expired_at(tick) {
            self.expired = true;
        }
    }
}
