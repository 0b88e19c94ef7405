use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use super::{AnyState, DynReducer, Erased, Reducer, Scope};
use crate::error::{RegistryError, StoreError};
use crate::events::Event;
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::store::StateId;

/// Static description of a registered reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducerInfo {
    pub name: &'static str,
    pub dependencies: &'static [&'static str],
    pub scope: Scope,
    pub keyed: bool,
}

/// Orders reducers so each one follows all of its dependencies.
///
/// Kahn-style rounds: every round places all not-yet-placed reducers whose
/// dependencies are already placed, in input order. A round that places
/// nothing means the remaining reducers form a cycle.
pub fn sort_reducers(infos: &[ReducerInfo]) -> Result<Vec<usize>, RegistryError> {
    let mut placed: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(infos.len());
    let mut remaining: Vec<usize> = (0..infos.len()).collect();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<usize>, Vec<usize>) = remaining
            .into_iter()
            .partition(|&i| infos[i].dependencies.iter().all(|d| placed.contains(d)));
        if ready.is_empty() {
            return Err(RegistryError::CyclicalDependency(
                blocked.iter().map(|&i| infos[i].name.to_string()).collect(),
            ));
        }
        for &i in &ready {
            placed.insert(infos[i].name);
        }
        order.extend(ready);
        remaining = blocked;
    }
    Ok(order)
}

/// Rejects dependency declarations that cannot be ordered meaningfully.
pub fn validate_dependencies(infos: &[ReducerInfo]) -> Result<(), RegistryError> {
    let mut names = HashSet::new();
    for info in infos {
        if !names.insert(info.name) {
            return Err(RegistryError::DuplicateReducer(info.name.to_string()));
        }
    }
    for info in infos {
        for dep in info.dependencies {
            if *dep == info.name {
                return Err(RegistryError::CyclicalDependency(vec![info.name.to_string()]));
            }
            let Some(target) = infos.iter().find(|i| i.name == *dep) else {
                return Err(RegistryError::UnknownDependency {
                    reducer: info.name.to_string(),
                    dependency: dep.to_string(),
                });
            };
            if target.scope == Scope::Global {
                return Err(RegistryError::GlobalDependency {
                    reducer: info.name.to_string(),
                    global: target.name.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<Arc<dyn DynReducer>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<R: Reducer>(mut self, reducer: R) -> Self {
        self.entries.push(Arc::new(Erased(reducer)));
        self
    }

    pub fn build(self) -> Result<ReducerRegistry, RegistryError> {
        let infos: Vec<ReducerInfo> = self.entries.iter().map(|r| r.info()).collect();
        validate_dependencies(&infos)?;
        let order = sort_reducers(&infos)?;
        let reducers: Vec<Arc<dyn DynReducer>> = order.iter().map(|&i| Arc::clone(&self.entries[i])).collect();
        log(
            Level::Debug,
            Domain::Reducer,
            "registry_built",
            obj(&[(
                "order",
                Value::Array(order.iter().map(|&i| v_str(infos[i].name)).collect()),
            )]),
        );
        Ok(ReducerRegistry { reducers })
    }
}

/// Reducers in evaluation order.
#[derive(Clone)]
pub struct ReducerRegistry {
    reducers: Vec<Arc<dyn DynReducer>>,
}

impl std::fmt::Debug for ReducerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ReducerRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// State names in evaluation order.
    pub fn names(&self) -> Vec<&'static str> {
        self.reducers.iter().map(|r| r.info().name).collect()
    }

    pub fn infos(&self) -> Vec<ReducerInfo> {
        self.reducers.iter().map(|r| r.info()).collect()
    }

    pub fn info(&self, name: &str) -> Option<ReducerInfo> {
        self.find(name).map(|r| r.info())
    }

    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn DynReducer>> {
        self.reducers.iter().find(|r| r.info().name == name)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<dyn DynReducer>> {
        self.reducers.iter()
    }

    pub(crate) fn initial(&self, name: &str) -> Option<Box<dyn AnyState>> {
        self.find(name).map(|r| r.initial())
    }

    pub(crate) fn decode(&self, id: &StateId, value: Value) -> Result<Box<dyn AnyState>, StoreError> {
        let reducer = self.find(id.name()).ok_or_else(|| StoreError::UnknownState(id.name().to_string()))?;
        Ok(reducer.decode(id, value)?)
    }

    /// State slots an event would update, in evaluation order.
    pub fn slots(&self, event: &Event) -> Vec<StateId> {
        self.reducers.iter().filter_map(|r| r.slot(event)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &'static str, deps: &'static [&'static str]) -> ReducerInfo {
        ReducerInfo { name, dependencies: deps, scope: Scope::PerKind, keyed: false }
    }

    fn names(infos: &[ReducerInfo], order: &[usize]) -> Vec<&'static str> {
        order.iter().map(|&i| infos[i].name).collect()
    }

    #[test]
    fn test_sort_places_dependencies_first() {
        let infos = [
            info("score", &["stage"]),
            info("period_clock", &["stage", "jam_clock"]),
            info("jam_clock", &[]),
            info("stage", &[]),
        ];
        let order = sort_reducers(&infos).unwrap();
        assert_eq!(names(&infos, &order), vec!["jam_clock", "stage", "score", "period_clock"]);
    }

    #[test]
    fn test_sort_is_stable_for_independent_reducers() {
        let infos = [info("c", &[]), info("a", &[]), info("b", &[])];
        let order = sort_reducers(&infos).unwrap();
        assert_eq!(names(&infos, &order), vec!["c", "a", "b"]);
        assert_eq!(sort_reducers(&infos).unwrap(), order);
    }

    #[test]
    fn test_sort_detects_cycle() {
        let infos = [info("a", &["c"]), info("b", &["a"]), info("c", &["b"]), info("d", &[])];
        match sort_reducers(&infos) {
            Err(RegistryError::CyclicalDependency(names)) => {
                assert_eq!(names, vec!["a", "b", "c"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_self_dependency() {
        let infos = [info("a", &["a"])];
        assert!(matches!(validate_dependencies(&infos), Err(RegistryError::CyclicalDependency(_))));
    }

    #[test]
    fn test_validate_rejects_global_dependency() {
        let infos = [
            ReducerInfo { name: "activity", dependencies: &[], scope: Scope::Global, keyed: false },
            info("score", &["activity"]),
        ];
        assert_eq!(
            validate_dependencies(&infos),
            Err(RegistryError::GlobalDependency { reducer: "score".into(), global: "activity".into() })
        );
    }

    #[test]
    fn test_validate_rejects_unknown_and_duplicate() {
        assert!(matches!(
            validate_dependencies(&[info("a", &["ghost"])]),
            Err(RegistryError::UnknownDependency { .. })
        ));
        assert!(matches!(
            validate_dependencies(&[info("a", &[]), info("a", &[])]),
            Err(RegistryError::DuplicateReducer(_))
        ));
    }
}
