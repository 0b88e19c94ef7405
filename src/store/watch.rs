//! Change callbacks fired after a successful commit.

use serde::Serialize;
use serde_json::Value;

use super::StateId;

/// One state whose value changed in a commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub game: String,
    pub state: StateId,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(u64);

type Callback = Box<dyn Fn(&StateChange) + Send + Sync>;

struct Watcher {
    id: WatchId,
    /// State name to match, or every state when `None`.
    filter: Option<String>,
    callback: Callback,
}

#[derive(Default)]
pub struct Watchers {
    next: u64,
    entries: Vec<Watcher>,
}

impl std::fmt::Debug for Watchers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchers").field("count", &self.entries.len()).finish()
    }
}

impl Watchers {
    pub fn add(&mut self, filter: Option<&str>, callback: impl Fn(&StateChange) + Send + Sync + 'static) -> WatchId {
        let id = WatchId(self.next);
        self.next += 1;
        self.entries.push(Watcher { id, filter: filter.map(str::to_string), callback: Box::new(callback) });
        id
    }

    pub fn remove(&mut self, id: WatchId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|w| w.id != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn notify(&self, change: &StateChange) {
        for watcher in &self.entries {
            if watcher.filter.as_deref().map_or(true, |name| name == change.state.name()) {
                (watcher.callback)(change);
            }
        }
    }
}
