//! Pure reducers: `(prior state, event) -> next state`.
//!
//! A reducer owns exactly one named state. It may read the states it declares
//! as dependencies, never write them. Keyed reducers keep one independent
//! state instance per key (team side), created lazily on first use.
//!
//! Reducers are registered explicitly in a [`registry::ReducerRegistry`],
//! which orders them so that every dependency is reduced first.

pub mod context;
pub mod registry;

use std::any::Any;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ReduceError;
use crate::events::{Event, EventKind};
use crate::store::StateId;

pub use context::ReduceContext;
pub use registry::{ReducerInfo, ReducerRegistry, RegistryBuilder};

/// A derived state value.
pub trait State: Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name the state is stored and read under.
    const NAME: &'static str;
}

/// Which events reach a reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only kinds accepted by [`Reducer::handles`].
    PerKind,
    /// Every event. No other reducer may depend on a global reducer.
    Global,
}

pub trait Reducer: Send + Sync + 'static {
    type State: State;

    fn dependencies(&self) -> &'static [&'static str] {
        &[]
    }

    fn scope(&self) -> Scope {
        Scope::PerKind
    }

    fn handles(&self, kind: EventKind) -> bool;

    /// Whether states are kept per key.
    fn keyed(&self) -> bool {
        false
    }

    /// Partition key of an event. Keyed reducers skip events without one.
    fn key(&self, _event: &Event) -> Option<String> {
        None
    }

    fn initial_state(&self) -> Self::State;

    fn reduce(&self, state: &Self::State, event: &Event, ctx: &ReduceContext<'_>) -> Result<Self::State, ReduceError>;
}

/// Object-safe view of a stored state.
pub trait AnyState: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn clone_state(&self) -> Box<dyn AnyState>;
    fn to_json(&self) -> serde_json::Result<Value>;
    fn same_as(&self, other: &dyn AnyState) -> bool;
}

impl<S: State> AnyState for S {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_state(&self) -> Box<dyn AnyState> {
        Box::new(self.clone())
    }

    fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    fn same_as(&self, other: &dyn AnyState) -> bool {
        other.as_any().downcast_ref::<S>().is_some_and(|o| o == self)
    }
}

/// Object-safe wrapper the store drives reducers through.
pub(crate) trait DynReducer: Send + Sync {
    fn info(&self) -> ReducerInfo;
    fn slot(&self, event: &Event) -> Option<StateId>;
    fn initial(&self) -> Box<dyn AnyState>;
    fn reduce_dyn(
        &self,
        id: &StateId,
        prior: &dyn AnyState,
        event: &Event,
        ctx: &ReduceContext<'_>,
    ) -> Result<Box<dyn AnyState>, ReduceError>;
    fn decode(&self, id: &StateId, value: Value) -> Result<Box<dyn AnyState>, ReduceError>;
}

pub(crate) struct Erased<R>(pub R);

impl<R: Reducer> DynReducer for Erased<R> {
    fn info(&self) -> ReducerInfo {
        ReducerInfo {
            name: R::State::NAME,
            dependencies: self.0.dependencies(),
            scope: self.0.scope(),
            keyed: self.0.keyed(),
        }
    }

    fn slot(&self, event: &Event) -> Option<StateId> {
        if self.0.scope() == Scope::PerKind && !self.0.handles(event.kind()) {
            return None;
        }
        if self.0.keyed() {
            self.0.key(event).map(|key| StateId::keyed(R::State::NAME, key))
        } else {
            Some(StateId::unkeyed(R::State::NAME))
        }
    }

    fn initial(&self) -> Box<dyn AnyState> {
        Box::new(self.0.initial_state())
    }

    fn reduce_dyn(
        &self,
        id: &StateId,
        prior: &dyn AnyState,
        event: &Event,
        ctx: &ReduceContext<'_>,
    ) -> Result<Box<dyn AnyState>, ReduceError> {
        let prior = prior
            .as_any()
            .downcast_ref::<R::State>()
            .ok_or_else(|| ReduceError::StateType(id.clone()))?;
        Ok(Box::new(self.0.reduce(prior, event, ctx)?))
    }

    fn decode(&self, id: &StateId, value: Value) -> Result<Box<dyn AnyState>, ReduceError> {
        let state: R::State =
            serde_json::from_value(value).map_err(|source| ReduceError::Decode { state: id.clone(), source })?;
        Ok(Box::new(state))
    }
}
