use crate::error::ReduceError;
use crate::reducer::State;
use crate::store::{StateId, StateMap};

/// Read access to already-committed dependency states during one apply pass.
///
/// Only declared dependencies can be read.
pub struct ReduceContext<'a> {
    reducer: &'static str,
    dependencies: &'static [&'static str],
    states: &'a StateMap,
}

impl<'a> ReduceContext<'a> {
    pub(crate) fn new(reducer: &'static str, dependencies: &'static [&'static str], states: &'a StateMap) -> Self {
        Self { reducer, dependencies, states }
    }

    pub fn reducer(&self) -> &'static str {
        self.reducer
    }

    fn check<S: State>(&self) -> Result<(), ReduceError> {
        if self.dependencies.contains(&S::NAME) {
            Ok(())
        } else {
            Err(ReduceError::UndeclaredDependency { reducer: self.reducer, dependency: S::NAME })
        }
    }

    /// An unkeyed dependency state.
    pub fn get<S: State>(&self) -> Result<&'a S, ReduceError> {
        self.check::<S>()?;
        let id = StateId::unkeyed(S::NAME);
        let state = self.states.get(&id).ok_or_else(|| ReduceError::MissingState(id.clone()))?;
        state.as_any().downcast_ref::<S>().ok_or(ReduceError::StateType(id))
    }

    /// One instance of a keyed dependency state, if it exists yet.
    pub fn get_keyed<S: State>(&self, key: &str) -> Result<Option<&'a S>, ReduceError> {
        self.check::<S>()?;
        let id = StateId::keyed(S::NAME, key);
        match self.states.get(&id) {
            Some(state) => state.as_any().downcast_ref::<S>().map(Some).ok_or(ReduceError::StateType(id)),
            None => Ok(None),
        }
    }
}
