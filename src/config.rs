//! Process configuration and the explicit per-game context.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::rules::Ruleset;
use crate::store::KeyFramePolicy;

#[derive(Debug, Clone)]
pub struct ScoreboardConfig {
    pub keyframes: KeyFramePolicy,
    pub ruleset_path: Option<PathBuf>,
    pub archive_path: String,
    pub journal_path: Option<PathBuf>,
}

impl Default for ScoreboardConfig {
    fn default() -> Self {
        Self {
            keyframes: KeyFramePolicy::default(),
            ruleset_path: None,
            archive_path: "./scoreboard.sqlite".to_string(),
            journal_path: None,
        }
    }
}

impl ScoreboardConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            keyframes: KeyFramePolicy {
                enabled: std::env::var("KEYFRAMES_ENABLED")
                    .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                    .unwrap_or(defaults.keyframes.enabled),
                interval: std::env::var("KEYFRAME_INTERVAL")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.keyframes.interval),
                retain: std::env::var("KEYFRAME_RETAIN")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .or(defaults.keyframes.retain),
            },
            ruleset_path: std::env::var("RULESET_PATH").ok().map(PathBuf::from),
            archive_path: std::env::var("ARCHIVE_PATH").unwrap_or(defaults.archive_path),
            journal_path: std::env::var("JOURNAL_PATH").ok().map(PathBuf::from),
        }
    }

    pub fn load_ruleset(&self) -> Result<Ruleset> {
        match &self.ruleset_path {
            Some(path) => Ruleset::from_json_file(path),
            None => Ok(Ruleset::default()),
        }
    }

    pub fn game_context(&self) -> Result<GameContext> {
        Ok(GameContext::new(self.load_ruleset()?, self.keyframes.clone()))
    }
}

/// Everything a game needs besides its events, passed explicitly.
#[derive(Debug, Clone)]
pub struct GameContext {
    pub ruleset: Arc<Ruleset>,
    pub keyframes: KeyFramePolicy,
}

impl GameContext {
    pub fn new(ruleset: Ruleset, keyframes: KeyFramePolicy) -> Self {
        Self { ruleset: Arc::new(ruleset), keyframes }
    }
}

impl Default for GameContext {
    fn default() -> Self {
        Self::new(Ruleset::default(), KeyFramePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyframe_env_overrides() {
        let defaults = ScoreboardConfig::default();

        std::env::set_var("KEYFRAME_INTERVAL", "7");
        std::env::set_var("KEYFRAME_RETAIN", "3");
        let config = ScoreboardConfig::from_env();
        assert_eq!(config.keyframes.interval, 7);
        assert_eq!(config.keyframes.retain, Some(3));

        std::env::set_var("KEYFRAME_INTERVAL", "often");
        std::env::remove_var("KEYFRAME_RETAIN");
        let config = ScoreboardConfig::from_env();
        assert_eq!(config.keyframes.interval, defaults.keyframes.interval);
        assert_eq!(config.keyframes.retain, defaults.keyframes.retain);

        std::env::remove_var("KEYFRAME_INTERVAL");
    }
}
