//! Derived state: storage, the apply pass, keyframes and the per-game store.

pub mod game;
pub mod keyframe;
pub mod watch;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{ReduceError, StoreError};
use crate::events::Event;
use crate::reducer::{AnyState, ReduceContext, ReducerRegistry, State};

pub use game::Game;
pub use keyframe::{KeyFrame, KeyFrameCache, KeyFramePolicy};
pub use watch::{StateChange, WatchId, Watchers};

/// Address of one state instance: a reducer's state name plus, for keyed
/// reducers, the partition key. Written `name` or `name/key`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId {
    name: String,
    key: Option<String>,
}

impl StateId {
    pub fn unkeyed(name: impl Into<String>) -> Self {
        Self { name: name.into(), key: None }
    }

    pub fn keyed(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self { name: name.into(), key: Some(key.into()) }
    }

    pub fn of<S: State>(key: Option<&str>) -> Self {
        Self { name: S::NAME.to_string(), key: key.map(str::to_string) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}/{}", self.name, key),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for StateId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("empty state id".to_string());
        }
        Ok(match s.split_once('/') {
            Some((name, key)) => StateId::keyed(name, key),
            None => StateId::unkeyed(s),
        })
    }
}

impl Serialize for StateId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StateId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Every state instance of one game at one point of the timeline.
#[derive(Debug, Default)]
pub struct StateMap {
    states: BTreeMap<StateId, Box<dyn AnyState>>,
}

impl Clone for StateMap {
    fn clone(&self) -> Self {
        Self {
            states: self.states.iter().map(|(id, s)| (id.clone(), s.clone_state())).collect(),
        }
    }
}

impl StateMap {
    /// Initial values of every unkeyed reducer. Keyed instances are created
    /// on first use.
    pub fn initial(registry: &ReducerRegistry) -> Self {
        let mut map = StateMap::default();
        for reducer in registry.iter() {
            let info = reducer.info();
            if !info.keyed {
                map.states.insert(StateId::unkeyed(info.name), reducer.initial());
            }
        }
        map
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, id: &StateId) -> Option<&dyn AnyState> {
        self.states.get(id).map(|s| &**s)
    }

    pub fn typed<S: State>(&self) -> Option<&S> {
        self.get(&StateId::of::<S>(None))?.as_any().downcast_ref()
    }

    pub fn typed_keyed<S: State>(&self, key: &str) -> Option<&S> {
        self.get(&StateId::of::<S>(Some(key)))?.as_any().downcast_ref()
    }

    pub fn ids(&self) -> impl Iterator<Item = &StateId> {
        self.states.keys()
    }

    /// Keys observed so far for a keyed state.
    pub fn keys_of(&self, name: &str) -> Vec<String> {
        self.states
            .keys()
            .filter(|id| id.name() == name)
            .filter_map(|id| id.key().map(str::to_string))
            .collect()
    }

    pub(crate) fn insert(&mut self, id: StateId, state: Box<dyn AnyState>) {
        self.states.insert(id, state);
    }

    pub fn to_json(&self, id: &StateId) -> Result<Value, StoreError> {
        let state = self.get(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;
        Ok(state.to_json()?)
    }

    /// Serialized copy of every state.
    pub fn snapshot(&self) -> Result<BTreeMap<StateId, Value>, StoreError> {
        self.states
            .iter()
            .map(|(id, s)| Ok((id.clone(), s.to_json()?)))
            .collect()
    }

    pub fn from_snapshot(registry: &ReducerRegistry, values: &BTreeMap<StateId, Value>) -> Result<Self, StoreError> {
        let mut map = StateMap::default();
        for (id, value) in values {
            map.states.insert(id.clone(), registry.decode(id, value.clone())?);
        }
        Ok(map)
    }

    /// SHA-256 over the canonical JSON of every state, in id order.
    pub fn digest(&self) -> Result<String, StoreError> {
        let mut hasher = Sha256::new();
        for (id, state) in &self.states {
            hasher.update(id.to_string().as_bytes());
            hasher.update(b"=");
            hasher.update(serde_json::to_vec(&state.to_json()?)?);
            hasher.update(b"\n");
        }
        Ok(hex::encode(hasher.finalize()))
    }

    /// Ids whose value differs between `self` and `other`, including ids
    /// present in only one of them.
    pub fn changed_ids(&self, other: &StateMap) -> Vec<StateId> {
        let mut changed: Vec<StateId> = self
            .states
            .iter()
            .filter(|(id, s)| other.states.get(*id).map_or(true, |o| !s.same_as(&**o)))
            .map(|(id, _)| id.clone())
            .collect();
        changed.extend(other.states.keys().filter(|id| !self.states.contains_key(*id)).cloned());
        changed.sort();
        changed
    }
}

/// Applies one event to every interested reducer, in registry order.
///
/// Each reducer sees the states already committed earlier in the same pass.
pub fn apply_event(registry: &ReducerRegistry, states: &mut StateMap, event: &Event) -> Result<(), ReduceError> {
    for reducer in registry.iter() {
        let Some(slot) = reducer.slot(event) else {
            continue;
        };
        let info = reducer.info();
        let next = {
            let fresh;
            let prior: &dyn AnyState = match states.get(&slot) {
                Some(state) => state,
                None => {
                    fresh = reducer.initial();
                    fresh.as_ref()
                }
            };
            let ctx = ReduceContext::new(info.name, info.dependencies, states);
            reducer.reduce_dyn(&slot, prior, event, &ctx)?
        };
        states.insert(slot, next);
    }
    Ok(())
}
