//! Game time in ticks.
//!
//! A tick is one millisecond of elapsed game time since the game started.
//! Every arithmetic operation re-validates its result against
//! `[0, Tick::MAX]`, so a `Tick` value is always in range.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TickError;

/// Ticks per second of game time.
pub const TICKS_PER_SECOND: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Tick(i64);

/// Equality tolerance for tick comparisons.
///
/// Only simulations and tests compare with a non-zero variance; replay always
/// compares ticks exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Variance(u64);

impl Variance {
    pub const EXACT: Variance = Variance(0);

    pub const fn ticks(ticks: u64) -> Self {
        Variance(ticks)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Tick {
    pub const ZERO: Tick = Tick(0);
    pub const MAX: Tick = Tick(i64::MAX);

    pub fn new(value: i64) -> Result<Self, TickError> {
        Self::validate(value as i128)
    }

    pub fn from_seconds(seconds: i64) -> Result<Self, TickError> {
        Self::validate(seconds as i128 * TICKS_PER_SECOND as i128)
    }

    fn validate(value: i128) -> Result<Self, TickError> {
        if value < 0 || value > Self::MAX.0 as i128 {
            return Err(TickError::OutOfRange(value));
        }
        Ok(Tick(value as i64))
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// Whole seconds, rounded down.
    pub const fn as_seconds(self) -> i64 {
        self.0 / TICKS_PER_SECOND
    }

    pub fn checked_add(self, other: Tick) -> Result<Tick, TickError> {
        self.add_ticks(other.0)
    }

    pub fn checked_sub(self, other: Tick) -> Result<Tick, TickError> {
        self.sub_ticks(other.0)
    }

    pub fn add_ticks(self, ticks: i64) -> Result<Tick, TickError> {
        Self::validate(self.0 as i128 + ticks as i128)
    }

    pub fn sub_ticks(self, ticks: i64) -> Result<Tick, TickError> {
        Self::validate(self.0 as i128 - ticks as i128)
    }

    pub fn scale(self, factor: i64) -> Result<Tick, TickError> {
        Self::validate(self.0 as i128 * factor as i128)
    }

    /// Signed distance `self - earlier` in ticks.
    pub const fn since(self, earlier: Tick) -> i64 {
        self.0 - earlier.0
    }

    pub fn approx_eq(self, other: Tick, variance: Variance) -> bool {
        self.0.abs_diff(other.0) <= variance.0
    }
}

impl TryFrom<i64> for Tick {
    type Error = TickError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Tick::new(value)
    }
}

impl From<Tick> for i64 {
    fn from(tick: Tick) -> Self {
        tick.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
