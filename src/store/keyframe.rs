//! Periodic full-state snapshots keyed by tick.
//!
//! A keyframe at tick T holds the state after every event with tick <= T.
//! Frames are a pure cache: dropping any of them only costs replay time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{StateId, StateMap};
use crate::error::StoreError;
use crate::logging::{log, obj, v_int, Domain, Level};
use crate::reducer::ReducerRegistry;
use crate::tick::Tick;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFramePolicy {
    pub enabled: bool,
    /// Minimum number of applied events between two frames.
    pub interval: usize,
    /// Maximum number of frames kept; the oldest are evicted first.
    pub retain: Option<usize>,
}

impl Default for KeyFramePolicy {
    fn default() -> Self {
        Self { enabled: true, interval: 50, retain: None }
    }
}

impl KeyFramePolicy {
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::default() }
    }

    pub fn every(interval: usize) -> Self {
        Self { enabled: true, interval: interval.max(1), retain: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFrame {
    pub tick: Tick,
    pub states: BTreeMap<StateId, Value>,
}

impl KeyFrame {
    pub fn capture(tick: Tick, states: &StateMap) -> Result<Self, StoreError> {
        Ok(Self { tick, states: states.snapshot()? })
    }

    pub fn restore(&self, registry: &ReducerRegistry) -> Result<StateMap, StoreError> {
        StateMap::from_snapshot(registry, &self.states)
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyFrameCache {
    policy: KeyFramePolicy,
    frames: BTreeMap<Tick, KeyFrame>,
    since_last: usize,
}

impl KeyFrameCache {
    pub fn new(policy: KeyFramePolicy) -> Self {
        Self { policy, frames: BTreeMap::new(), since_last: 0 }
    }

    pub fn policy(&self) -> &KeyFramePolicy {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyFrame> {
        self.frames.values()
    }

    pub fn ticks(&self) -> Vec<Tick> {
        self.frames.keys().copied().collect()
    }

    /// Latest frame strictly before `tick`.
    pub fn latest_before(&self, tick: Tick) -> Option<&KeyFrame> {
        self.frames.range(..tick).next_back().map(|(_, f)| f)
    }

    /// Latest frame at or before `tick`.
    pub fn latest_at_or_before(&self, tick: Tick) -> Option<&KeyFrame> {
        self.frames.range(..=tick).next_back().map(|(_, f)| f)
    }

    /// Drops every frame at or after `tick`.
    pub fn invalidate_from(&mut self, tick: Tick) -> usize {
        let dropped = self.frames.split_off(&tick);
        if !dropped.is_empty() {
            log(
                Level::Debug,
                Domain::KeyFrame,
                "keyframes_invalidated",
                obj(&[("from_tick", v_int(tick.get())), ("dropped", v_int(dropped.len() as i64))]),
            );
        }
        dropped.len()
    }

    /// Restarts the applied-event count when replay restarts from a frame.
    pub fn reset_counter(&mut self) {
        self.since_last = 0;
    }

    /// Counts one applied event and reports whether a frame should be taken
    /// at its tick. `next` is the tick of the following timeline event.
    pub fn note_applied(&mut self, tick: Tick, next: Option<Tick>) -> bool {
        self.since_last += 1;
        let due = self.policy.enabled
            && self.since_last >= self.policy.interval.max(1)
            && next.map_or(true, |n| n > tick)
            && !self.frames.contains_key(&tick);
        if due {
            self.since_last = 0;
        }
        due
    }

    pub fn insert(&mut self, frame: KeyFrame) {
        self.frames.insert(frame.tick, frame);
        if let Some(retain) = self.policy.retain {
            while self.frames.len() > retain {
                if self.frames.pop_first().is_none() {
                    break;
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.since_last = 0;
    }

    /// Replaces all frames with persisted ones.
    pub fn load(&mut self, frames: impl IntoIterator<Item = KeyFrame>) {
        self.clear();
        for frame in frames {
            self.frames.insert(frame.tick, frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(t: i64) -> KeyFrame {
        KeyFrame { tick: Tick::new(t).unwrap(), states: BTreeMap::new() }
    }

    fn tick(t: i64) -> Tick {
        Tick::new(t).unwrap()
    }

    #[test]
    fn test_lookup_boundaries() {
        let mut cache = KeyFrameCache::new(KeyFramePolicy::every(1));
        cache.insert(frame(1000));
        cache.insert(frame(5000));
        assert_eq!(cache.latest_before(tick(5000)).map(|f| f.tick), Some(tick(1000)));
        assert_eq!(cache.latest_at_or_before(tick(5000)).map(|f| f.tick), Some(tick(5000)));
        assert!(cache.latest_before(tick(1000)).is_none());
    }

    #[test]
    fn test_invalidate_drops_at_and_after() {
        let mut cache = KeyFrameCache::new(KeyFramePolicy::every(1));
        for t in [1000, 2000, 3000] {
            cache.insert(frame(t));
        }
        assert_eq!(cache.invalidate_from(tick(2000)), 2);
        assert_eq!(cache.ticks(), vec![tick(1000)]);
    }

    #[test]
    fn test_capture_waits_for_interval_and_tick_boundary() {
        let mut cache = KeyFrameCache::new(KeyFramePolicy::every(2));
        assert!(!cache.note_applied(tick(10), Some(tick(20))));
        // Interval reached but the next event shares the tick.
        assert!(!cache.note_applied(tick(20), Some(tick(20))));
        assert!(cache.note_applied(tick(20), None));
    }

    #[test]
    fn test_retain_evicts_oldest() {
        let mut cache = KeyFrameCache::new(KeyFramePolicy { enabled: true, interval: 1, retain: Some(2) });
        for t in [1, 2, 3] {
            cache.insert(frame(t));
        }
        assert_eq!(cache.ticks(), vec![tick(2), tick(3)]);
    }

    #[test]
    fn test_disabled_never_captures() {
        let mut cache = KeyFrameCache::new(KeyFramePolicy::disabled());
        for t in 0..10 {
            assert!(!cache.note_applied(tick(t), None));
        }
    }
}
