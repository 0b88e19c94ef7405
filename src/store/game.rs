//! One game: its timeline, current derived state and keyframes.
//!
//! Every mutation goes through the timeline first and then recomputes from
//! the lowest tick it affected. Replay runs on a copy of the state; nothing is
//! committed, and the timeline is put back, unless every reducer succeeds.

use std::sync::Arc;

use serde_json::Value;

use super::keyframe::{KeyFrame, KeyFrameCache};
use super::watch::{StateChange, WatchId, Watchers};
use super::{apply_event, StateId, StateMap};
use crate::clocks::automatic;
use crate::config::GameContext;
use crate::error::{RegistryError, StoreError, TimelineError};
use crate::events::{Event, EventBody, EventId, EventKind};
use crate::logging::{log, log_audit, log_recompute, log_timeline_edit, obj, v_int, v_str, Domain, Level, ProfileScope};
use crate::reducer::{ReducerRegistry, State};
use crate::reducers::default_registry;
use crate::rules::Ruleset;
use crate::tick::Tick;
use crate::timeline::{Removal, Timeline};

/// Upper bound on automatic events appended by one `advance_to` call.
const MAX_AUTOMATIC_EVENTS: usize = 64;

pub struct Game {
    id: String,
    registry: Arc<ReducerRegistry>,
    rules: Arc<Ruleset>,
    timeline: Timeline,
    states: Arc<StateMap>,
    /// Last event reflected in `states`.
    applied: Option<EventId>,
    keyframes: KeyFrameCache,
    watchers: Watchers,
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("id", &self.id)
            .field("events", &self.timeline.len())
            .field("applied", &self.applied)
            .field("keyframes", &self.keyframes.len())
            .finish()
    }
}

struct Replayed {
    states: StateMap,
    frames: Vec<KeyFrame>,
    base: Option<Tick>,
    count: usize,
}

impl Game {
    pub fn new(id: impl Into<String>, registry: Arc<ReducerRegistry>, ctx: &GameContext) -> Self {
        let states = StateMap::initial(&registry);
        Self {
            id: id.into(),
            registry,
            rules: Arc::clone(&ctx.ruleset),
            timeline: Timeline::new(),
            states: Arc::new(states),
            applied: None,
            keyframes: KeyFrameCache::new(ctx.keyframes.clone()),
            watchers: Watchers::default(),
        }
    }

    /// A game running the standard scoreboard reducers.
    pub fn with_defaults(id: impl Into<String>, ctx: &GameContext) -> Result<Self, RegistryError> {
        let registry = default_registry(&ctx.ruleset)?;
        Ok(Self::new(id, Arc::new(registry), ctx))
    }

    /// Rebuilds a game from a persisted timeline and, optionally, keyframes
    /// saved alongside it. Frames at a tick with no event in `timeline` were
    /// taken from some other version of it and are dropped.
    pub fn restore(
        id: impl Into<String>,
        registry: Arc<ReducerRegistry>,
        ctx: &GameContext,
        timeline: Timeline,
        keyframes: Vec<KeyFrame>,
    ) -> Result<Self, StoreError> {
        let mut game = Self::new(id, registry, ctx);
        let offered = keyframes.len();
        let events = timeline.events();
        let frames: Vec<KeyFrame> = keyframes
            .into_iter()
            .filter(|frame| events.binary_search_by(|e| e.tick().cmp(&frame.tick)).is_ok())
            .collect();
        if frames.len() < offered {
            log(
                Level::Warn,
                Domain::Store,
                "stale_keyframes_dropped",
                obj(&[("game", v_str(&game.id)), ("dropped", v_int((offered - frames.len()) as i64))]),
            );
        }
        game.timeline = timeline;
        game.keyframes.load(frames);
        let from = match game.keyframes.iter().last() {
            Some(frame) => frame.tick.add_ticks(1)?,
            None => Tick::ZERO,
        };
        game.recompute(from)?;
        Ok(game)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn registry(&self) -> &Arc<ReducerRegistry> {
        &self.registry
    }

    pub fn rules(&self) -> &Arc<Ruleset> {
        &self.rules
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn keyframes(&self) -> &KeyFrameCache {
        &self.keyframes
    }

    pub fn states(&self) -> &StateMap {
        &self.states
    }

    /// Shared handle on the current state, for readers outside the game.
    pub fn shared_states(&self) -> Arc<StateMap> {
        Arc::clone(&self.states)
    }

    pub fn last_applied(&self) -> Option<EventId> {
        self.applied
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Appends an event at or after the end of the timeline.
    ///
    /// When the current state already reflects the whole timeline the event
    /// is applied incrementally; otherwise the game recomputes.
    pub fn append(&mut self, body: EventBody, tick: Tick) -> Result<EventId, StoreError> {
        let up_to_date = self.applied == self.timeline.last().map(|e| e.id);
        let edit = self.timeline.append(body, tick)?;
        self.keyframes.invalidate_from(tick);

        if !up_to_date {
            if let Err(err) = self.recompute(tick) {
                self.timeline.retract(edit.id);
                self.log_rejected("append", &err);
                return Err(err);
            }
            log_timeline_edit(&self.id, "append", &edit.id.to_string(), tick.get());
            return Ok(edit.id);
        }

        match self.apply_appended(edit.id) {
            Ok((next, frame)) => {
                if let Some(frame) = frame {
                    self.keyframes.insert(frame);
                }
                self.commit(next, Some(edit.id));
                log_timeline_edit(&self.id, "append", &edit.id.to_string(), tick.get());
                Ok(edit.id)
            }
            Err(err) => {
                self.timeline.retract(edit.id);
                self.log_rejected("append", &err);
                Err(err)
            }
        }
    }

    fn apply_appended(&mut self, id: EventId) -> Result<(StateMap, Option<KeyFrame>), StoreError> {
        let event = self.timeline.get(id).ok_or(TimelineError::NotFound(id))?;
        let mut next = (*self.states).clone();
        apply_event(&self.registry, &mut next, event)?;
        let frame = if self.keyframes.note_applied(event.tick(), None) {
            Some(KeyFrame::capture(event.tick(), &next)?)
        } else {
            None
        };
        Ok((next, frame))
    }

    /// Inserts an event at its tick, anywhere in the timeline.
    pub fn insert(&mut self, body: EventBody, tick: Tick) -> Result<EventId, StoreError> {
        self.edit("insert", |timeline| {
            let edit = timeline.insert(body, tick)?;
            Ok((edit.id, edit.id, edit.from))
        })
    }

    /// Appends when `tick` is at or past the end of the timeline, inserts
    /// otherwise.
    pub fn submit(&mut self, body: EventBody, tick: Tick) -> Result<EventId, StoreError> {
        let before_end = self.timeline.last().is_some_and(|last| tick < last.tick());
        if before_end {
            self.insert(body, tick)
        } else {
            self.append(body, tick)
        }
    }

    /// Decodes a raw payload for `kind` and submits it.
    pub fn submit_raw(&mut self, kind: EventKind, payload: Option<Value>, tick: Tick) -> Result<EventId, StoreError> {
        let body = EventBody::decode(kind, payload)?;
        self.submit(body, tick)
    }

    pub fn delete(&mut self, id: EventId) -> Result<Removal, StoreError> {
        self.edit("delete", |timeline| {
            let removal = timeline.delete(id)?;
            let from = removal.from;
            Ok((removal, id, from))
        })
    }

    /// Moves an event to `tick`; returns its new id.
    pub fn move_event(&mut self, id: EventId, tick: Tick) -> Result<EventId, StoreError> {
        self.edit("move", |timeline| {
            let edit = timeline.move_event(id, tick)?;
            Ok((edit.id, edit.id, edit.from))
        })
    }

    /// Runs a timeline change that reports the event it touched and the
    /// lowest affected tick, then recomputes from that tick.
    fn edit<T>(
        &mut self,
        operation: &str,
        change: impl FnOnce(&mut Timeline) -> Result<(T, EventId, Tick), TimelineError>,
    ) -> Result<T, StoreError> {
        let prior = self.timeline.clone();
        let (outcome, touched, from) = change(&mut self.timeline)?;
        if let Err(err) = self.recompute(from) {
            self.timeline = prior;
            self.log_rejected(operation, &err);
            return Err(err);
        }
        log_timeline_edit(&self.id, operation, &touched.to_string(), from.get());
        Ok(outcome)
    }

    fn log_rejected(&self, operation: &str, err: &StoreError) {
        log(
            Level::Warn,
            Domain::Store,
            "edit_rejected",
            obj(&[("game", v_str(&self.id)), ("operation", v_str(operation)), ("error", v_str(&err.to_string()))]),
        );
    }

    // -------------------------------------------------------------------------
    // Recompute
    // -------------------------------------------------------------------------

    /// Recomputes derived state for every event at or after `from`.
    ///
    /// Keyframes at or after `from` are dropped first. Replay starts from the
    /// latest remaining keyframe before `from`, or from the initial state.
    pub fn recompute(&mut self, from: Tick) -> Result<(), StoreError> {
        let _profile = ProfileScope::with_context("recompute", &[("from_tick", v_int(from.get()))]);
        self.keyframes.invalidate_from(from);
        let replayed = self.replay(from)?;
        for frame in replayed.frames {
            self.keyframes.insert(frame);
        }
        let last = self.timeline.last().map(|e| e.id);
        let changed = self.commit(replayed.states, last);
        log_recompute(&self.id, from.get(), replayed.base.map(Tick::get), replayed.count, changed);
        if let Ok(digest) = self.states.digest() {
            log_audit(&self.id, "recomputed", &digest, last.map(|id| id.to_string()).as_deref());
        }
        Ok(())
    }

    fn replay(&mut self, from: Tick) -> Result<Replayed, StoreError> {
        let (mut states, base) = match self.keyframes.latest_before(from) {
            Some(frame) => (frame.restore(&self.registry)?, Some(frame.tick)),
            None => (StateMap::initial(&self.registry), None),
        };
        let events = match base {
            Some(tick) => self.timeline.events_after(tick),
            None => self.timeline.events(),
        };

        self.keyframes.reset_counter();
        let mut frames = Vec::new();
        for (i, event) in events.iter().enumerate() {
            apply_event(&self.registry, &mut states, event)?;
            let next = events.get(i + 1).map(Event::tick);
            if self.keyframes.note_applied(event.tick(), next) {
                frames.push(KeyFrame::capture(event.tick(), &states)?);
            }
        }
        Ok(Replayed { states, frames, base, count: events.len() })
    }

    /// Drops every keyframe and replays the whole timeline.
    pub fn rebuild_keyframes(&mut self) -> Result<(), StoreError> {
        self.keyframes.clear();
        self.recompute(Tick::ZERO)
    }

    fn commit(&mut self, next: StateMap, applied: Option<EventId>) -> usize {
        let changed = next.changed_ids(&self.states);
        self.states = Arc::new(next);
        self.applied = applied;
        if !self.watchers.is_empty() {
            for id in &changed {
                let value = self.states.to_json(id).unwrap_or(Value::Null);
                self.watchers.notify(&StateChange { game: self.id.clone(), state: id.clone(), value });
            }
        }
        changed.len()
    }

    // -------------------------------------------------------------------------
    // Automatic events
    // -------------------------------------------------------------------------

    /// Adds every clock-derived event due at or before `now`.
    pub fn advance_to(&mut self, now: Tick) -> Result<Vec<EventId>, StoreError> {
        let mut added = Vec::new();
        for _ in 0..MAX_AUTOMATIC_EVENTS {
            let Some((body, tick)) = automatic::derive(&self.states, &self.rules, now).into_iter().next() else {
                return Ok(added);
            };
            log(
                Level::Info,
                Domain::Clock,
                "automatic_event",
                obj(&[("game", v_str(&self.id)), ("kind", v_str(body.kind().name())), ("tick", v_int(tick.get()))]),
            );
            added.push(self.submit(body, tick)?);
        }
        log(
            Level::Warn,
            Domain::Clock,
            "automatic_event_limit",
            obj(&[("game", v_str(&self.id)), ("now", v_int(now.get()))]),
        );
        Ok(added)
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    fn check_known(&self, name: &str) -> Result<(), StoreError> {
        match self.registry.info(name) {
            Some(_) => Ok(()),
            None => Err(StoreError::UnknownState(name.to_string())),
        }
    }

    pub fn read(&self, id: &StateId) -> Result<Value, StoreError> {
        self.check_known(id.name())?;
        self.states.to_json(id)
    }

    pub fn state(&self, name: &str) -> Result<Value, StoreError> {
        self.read(&StateId::unkeyed(name))
    }

    pub fn keyed_state(&self, name: &str, key: &str) -> Result<Value, StoreError> {
        self.read(&StateId::keyed(name, key))
    }

    pub fn get<S: State>(&self) -> Option<&S> {
        self.states.typed::<S>()
    }

    pub fn get_keyed<S: State>(&self, key: &str) -> Option<&S> {
        self.states.typed_keyed::<S>(key)
    }

    /// Every state as of `tick`, without touching the current state.
    pub fn states_at(&self, tick: Tick) -> Result<StateMap, StoreError> {
        let (mut states, base) = match self.keyframes.latest_at_or_before(tick) {
            Some(frame) => (frame.restore(&self.registry)?, Some(frame.tick)),
            None => (StateMap::initial(&self.registry), None),
        };
        let through = self.timeline.events_through(tick);
        let start = base.map_or(0, |b| through.partition_point(|e| e.tick() <= b));
        for event in &through[start..] {
            apply_event(&self.registry, &mut states, event)?;
        }
        Ok(states)
    }

    pub fn state_at(&self, id: &StateId, tick: Tick) -> Result<Value, StoreError> {
        self.check_known(id.name())?;
        self.states_at(tick)?.to_json(id)
    }

    pub fn digest(&self) -> Result<String, StoreError> {
        self.states.digest()
    }

    // -------------------------------------------------------------------------
    // Watchers
    // -------------------------------------------------------------------------

    /// Calls `callback` for every committed change of the named state, or of
    /// every state when `name` is `None`.
    pub fn watch(&mut self, name: Option<&str>, callback: impl Fn(&StateChange) + Send + Sync + 'static) -> WatchId {
        self.watchers.add(name, callback)
    }

    pub fn unwatch(&mut self, id: WatchId) -> bool {
        self.watchers.remove(id)
    }
}
