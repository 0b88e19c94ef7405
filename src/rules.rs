//! Game rules consumed by the clock and team reducers.
//!
//! The ruleset is read-only input. Defaults follow the usual flat-track
//! roller derby rules.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::clocks::seconds_to_ticks;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodEndBehavior {
    /// The period ends once its clock has run out and no jam is running.
    Automatic,
    /// An official ends the period with an explicit event.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ruleset {
    pub period_count: u32,
    pub period_seconds: i64,
    pub jam_seconds: i64,
    pub lineup_seconds: i64,
    pub team_timeout_seconds: i64,
    pub intermission_seconds: i64,
    pub team_timeouts: u32,
    pub reviews_per_period: u32,
    pub penalty_limit: u32,
    pub period_end: PeriodEndBehavior,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            period_count: 2,
            period_seconds: 30 * 60,
            jam_seconds: 2 * 60,
            lineup_seconds: 30,
            team_timeout_seconds: 60,
            intermission_seconds: 15 * 60,
            team_timeouts: 3,
            reviews_per_period: 1,
            penalty_limit: 7,
            period_end: PeriodEndBehavior::Automatic,
        }
    }
}

impl Ruleset {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading ruleset {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing ruleset {}", path.display()))
    }

    pub fn period_ticks(&self) -> i64 {
        seconds_to_ticks(self.period_seconds)
    }

    pub fn jam_ticks(&self) -> i64 {
        seconds_to_ticks(self.jam_seconds)
    }

    pub fn lineup_ticks(&self) -> i64 {
        seconds_to_ticks(self.lineup_seconds)
    }

    pub fn team_timeout_ticks(&self) -> i64 {
        seconds_to_ticks(self.team_timeout_seconds)
    }

    pub fn intermission_ticks(&self) -> i64 {
        seconds_to_ticks(self.intermission_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(&path, r#"{"jam_seconds": 60, "period_end": "manual"}"#).unwrap();
        let rules = Ruleset::from_json_file(&path).unwrap();
        assert_eq!(rules.jam_ticks(), 60_000);
        assert_eq!(rules.period_end, PeriodEndBehavior::Manual);
        assert_eq!(rules.period_seconds, 1800);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(Ruleset::from_json_file(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_out_of_range_durations_saturate() {
        let rules = Ruleset { jam_seconds: i64::MAX, lineup_seconds: -30, ..Ruleset::default() };
        assert_eq!(rules.jam_ticks(), i64::MAX);
        assert_eq!(rules.lineup_ticks(), 0);
    }
}
