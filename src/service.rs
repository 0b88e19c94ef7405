//! Async front of the engine: one single-writer actor per game.
//!
//! Mutations travel to the game's actor over an mpsc channel and are applied
//! one at a time. After each command the actor publishes the committed state
//! on a watch channel, so readers never block the writer and always see a
//! whole state. Changed states fan out on a broadcast channel.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch, RwLock};

use crate::config::{GameContext, ScoreboardConfig};
use crate::error::{RegistryError, ServiceError, StoreError, TickError};
use crate::events::{EventBody, EventId, EventKind};
use crate::journal::{Journal, JournalEntry};
use crate::logging::{log, obj, v_int, v_str, Domain, Level};
use crate::reducer::ReducerRegistry;
use crate::reducers::default_registry;
use crate::store::{Game, KeyFrame, StateChange, StateId, StateMap};
use crate::tick::Tick;
use crate::timeline::Timeline;

const COMMAND_CHANNEL_SIZE: usize = 256;
const CHANGE_CHANNEL_SIZE: usize = 1024;

type SharedJournal = Arc<Mutex<Journal>>;
type Reply<T> = oneshot::Sender<Result<T, ServiceError>>;

enum Command {
    Submit { body: EventBody, tick: Tick, reply: Reply<EventId> },
    Delete { id: EventId, reply: Reply<Option<EventId>> },
    Move { id: EventId, tick: Tick, reply: Reply<EventId> },
    Advance { now: Tick, reply: Reply<Vec<EventId>> },
    StateAt { id: StateId, tick: Tick, reply: Reply<Value> },
    Snapshot { reply: Reply<(Timeline, Vec<KeyFrame>)> },
    Shutdown,
}

/// Cloneable handle on one running game.
#[derive(Clone, Debug)]
pub struct GameHandle {
    game: String,
    registry: Arc<ReducerRegistry>,
    started_at: DateTime<Utc>,
    commands: mpsc::Sender<Command>,
    states: watch::Receiver<Arc<StateMap>>,
    changes: broadcast::Sender<StateChange>,
}

impl GameHandle {
    /// Starts the actor that owns `game`.
    pub fn spawn(game: Game, started_at: DateTime<Utc>, journal: Option<SharedJournal>) -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (states_tx, states) = watch::channel(game.shared_states());
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);
        let handle = Self {
            game: game.id().to_string(),
            registry: Arc::clone(game.registry()),
            started_at,
            commands,
            states,
            changes: changes.clone(),
        };
        tokio::spawn(run_game(game, receiver, states_tx, changes, journal));
        handle
    }

    pub fn game(&self) -> &str {
        &self.game
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Game time elapsed since the game's start on the wall clock.
    pub fn now_tick(&self) -> Result<Tick, TickError> {
        Tick::new((Utc::now() - self.started_at).num_milliseconds().max(0))
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| ServiceError::Closed(self.game.clone()))?;
        response.await.map_err(|_| ServiceError::Closed(self.game.clone()))?
    }

    /// Decodes and adds an event; without a tick it lands at the current
    /// wall-clock tick.
    pub async fn submit(&self, kind: EventKind, payload: Option<Value>, tick: Option<Tick>) -> Result<EventId, ServiceError> {
        let body = EventBody::decode(kind, payload)?;
        self.submit_body(body, tick).await
    }

    pub async fn submit_body(&self, body: EventBody, tick: Option<Tick>) -> Result<EventId, ServiceError> {
        let tick = match tick {
            Some(tick) => tick,
            None => self.now_tick()?,
        };
        self.request(|reply| Command::Submit { body, tick, reply }).await
    }

    /// Deletes an event; returns the id of its replacement, if any.
    pub async fn delete(&self, id: EventId) -> Result<Option<EventId>, ServiceError> {
        self.request(|reply| Command::Delete { id, reply }).await
    }

    pub async fn move_event(&self, id: EventId, tick: Tick) -> Result<EventId, ServiceError> {
        self.request(|reply| Command::Move { id, tick, reply }).await
    }

    /// Adds the clock-derived events due by `now`, or by the wall clock.
    pub async fn advance(&self, now: Option<Tick>) -> Result<Vec<EventId>, ServiceError> {
        let now = match now {
            Some(now) => now,
            None => self.now_tick()?,
        };
        self.request(|reply| Command::Advance { now, reply }).await
    }

    pub async fn state_at(&self, name: &str, key: Option<&str>, tick: Tick) -> Result<Value, ServiceError> {
        let id = state_id(name, key);
        self.request(|reply| Command::StateAt { id, tick, reply }).await
    }

    /// Timeline and keyframes, for archiving.
    pub async fn snapshot(&self) -> Result<(Timeline, Vec<KeyFrame>), ServiceError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Current value of a state, read without going through the actor.
    pub fn read(&self, name: &str, key: Option<&str>) -> Result<Value, ServiceError> {
        if self.registry.info(name).is_none() {
            return Err(StoreError::UnknownState(name.to_string()).into());
        }
        let states = self.states();
        Ok(states.to_json(&state_id(name, key))?)
    }

    /// The last committed state.
    pub fn states(&self) -> Arc<StateMap> {
        Arc::clone(&self.states.borrow())
    }

    pub fn digest(&self) -> Result<String, ServiceError> {
        Ok(self.states().digest()?)
    }

    /// Receiver that observes every committed state.
    pub fn watch_states(&self) -> watch::Receiver<Arc<StateMap>> {
        self.states.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}

fn state_id(name: &str, key: Option<&str>) -> StateId {
    match key {
        Some(key) => StateId::keyed(name, key),
        None => StateId::unkeyed(name),
    }
}

/// Writes one entry. A failure means the change is live but would be lost
/// on recovery, so it is reported to the caller.
fn journal_write(journal: &Option<SharedJournal>, entry: JournalEntry) -> Result<(), ServiceError> {
    let Some(journal) = journal else {
        return Ok(());
    };
    let result = match journal.lock() {
        Ok(mut journal) => journal.append(&entry),
        Err(_) => Err(io::Error::new(io::ErrorKind::Other, "journal lock poisoned")),
    };
    result.map_err(|source| {
        log(
            Level::Error,
            Domain::Archive,
            "journal_write_failed",
            obj(&[("game", v_str(entry.game())), ("error", v_str(&source.to_string()))]),
        );
        ServiceError::Journal { game: entry.game().to_string(), source }
    })
}

fn journal_record(journal: &Option<SharedJournal>, game: &Game, id: EventId) -> Result<(), ServiceError> {
    match game.timeline().get(id) {
        Some(event) => journal_write(journal, JournalEntry::record(game.id(), event.clone())),
        None => Ok(()),
    }
}

async fn run_game(
    mut game: Game,
    mut commands: mpsc::Receiver<Command>,
    states: watch::Sender<Arc<StateMap>>,
    changes: broadcast::Sender<StateChange>,
    journal: Option<SharedJournal>,
) {
    game.watch(None, move |change| {
        // No subscribers is fine.
        let _ = changes.send(change.clone());
    });
    log(Level::Info, Domain::Service, "game_started", obj(&[("game", v_str(game.id()))]));

    while let Some(command) = commands.recv().await {
        match command {
            Command::Submit { body, tick, reply } => {
                let result = game
                    .submit(body, tick)
                    .map_err(ServiceError::from)
                    .and_then(|id| journal_record(&journal, &game, id).map(|()| id));
                states.send_replace(game.shared_states());
                let _ = reply.send(result);
            }
            Command::Delete { id, reply } => {
                let result = game.delete(id).map_err(ServiceError::from).and_then(|removal| {
                    journal_write(&journal, JournalEntry::delete(game.id(), id)).map(|()| removal.replacement)
                });
                states.send_replace(game.shared_states());
                let _ = reply.send(result);
            }
            Command::Move { id, tick, reply } => {
                let result = game.move_event(id, tick).map_err(ServiceError::from).and_then(|moved| {
                    journal_write(&journal, JournalEntry::move_to(game.id(), id, tick)).map(|()| moved)
                });
                states.send_replace(game.shared_states());
                let _ = reply.send(result);
            }
            Command::Advance { now, reply } => {
                let result = game.advance_to(now).map_err(ServiceError::from).and_then(|ids| {
                    for id in &ids {
                        journal_record(&journal, &game, *id)?;
                    }
                    Ok(ids)
                });
                states.send_replace(game.shared_states());
                let _ = reply.send(result);
            }
            Command::StateAt { id, tick, reply } => {
                let _ = reply.send(game.state_at(&id, tick).map_err(ServiceError::from));
            }
            Command::Snapshot { reply } => {
                let frames = game.keyframes().iter().cloned().collect();
                let _ = reply.send(Ok((game.timeline().clone(), frames)));
            }
            Command::Shutdown => break,
        }
    }
    log(
        Level::Info,
        Domain::Service,
        "game_stopped",
        obj(&[("game", v_str(game.id())), ("events", v_int(game.timeline().len() as i64))]),
    );
}

/// Every running game of one process.
pub struct Scoreboard {
    ctx: GameContext,
    registry: Arc<ReducerRegistry>,
    journal: Option<SharedJournal>,
    games: RwLock<HashMap<String, GameHandle>>,
}

impl Scoreboard {
    pub fn new(ctx: GameContext) -> Result<Self, RegistryError> {
        let registry = Arc::new(default_registry(&ctx.ruleset)?);
        Ok(Self { ctx, registry, journal: None, games: RwLock::new(HashMap::new()) })
    }

    /// Journals every later mutation to `journal`.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(Arc::new(Mutex::new(journal)));
        self
    }

    /// Builds a scoreboard from the environment, resuming every game found
    /// in the configured journal.
    pub async fn from_config(config: &ScoreboardConfig) -> anyhow::Result<Self> {
        let mut board = Self::new(config.game_context()?)?;
        if let Some(path) = &config.journal_path {
            let recovery = Journal::recover(path)?;
            for (game, timeline) in recovery.games {
                board.restore_game(&game, timeline, Vec::new()).await?;
            }
            board = board.with_journal(Journal::open(path)?);
        }
        Ok(board)
    }

    pub fn context(&self) -> &GameContext {
        &self.ctx
    }

    /// Starts a new game and records its `GameStarted` event at tick 0.
    pub async fn open_game(&self, id: &str) -> Result<GameHandle, ServiceError> {
        let mut games = self.games.write().await;
        if games.contains_key(id) {
            return Err(ServiceError::GameExists(id.to_string()));
        }
        let mut game = Game::new(id, Arc::clone(&self.registry), &self.ctx);
        let started = game.append(EventBody::GameStarted, Tick::ZERO)?;
        journal_record(&self.journal, &game, started)?;
        let handle = GameHandle::spawn(game, Utc::now(), self.journal.clone());
        games.insert(id.to_string(), handle.clone());
        Ok(handle)
    }

    /// Resumes a game from a persisted timeline. Its wall clock continues
    /// from the last event.
    pub async fn restore_game(
        &self,
        id: &str,
        timeline: Timeline,
        keyframes: Vec<KeyFrame>,
    ) -> Result<GameHandle, ServiceError> {
        let mut games = self.games.write().await;
        if games.contains_key(id) {
            return Err(ServiceError::GameExists(id.to_string()));
        }
        let last = timeline.last().map_or(0, |e| e.tick().get());
        let game = Game::restore(id, Arc::clone(&self.registry), &self.ctx, timeline, keyframes)?;
        let handle = GameHandle::spawn(game, Utc::now() - Duration::milliseconds(last), self.journal.clone());
        games.insert(id.to_string(), handle.clone());
        log(Level::Info, Domain::Service, "game_restored", obj(&[("game", v_str(id)), ("last_tick", v_int(last))]));
        Ok(handle)
    }

    pub async fn game(&self, id: &str) -> Result<GameHandle, ServiceError> {
        self.games.read().await.get(id).cloned().ok_or_else(|| ServiceError::GameNotFound(id.to_string()))
    }

    pub async fn games(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.games.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn close_game(&self, id: &str) -> Result<(), ServiceError> {
        let handle = self.games.write().await.remove(id).ok_or_else(|| ServiceError::GameNotFound(id.to_string()))?;
        handle.shutdown().await;
        Ok(())
    }

    pub async fn submit(
        &self,
        game: &str,
        kind: EventKind,
        payload: Option<Value>,
        tick: Option<Tick>,
    ) -> Result<EventId, ServiceError> {
        self.game(game).await?.submit(kind, payload, tick).await
    }

    pub async fn delete(&self, game: &str, id: EventId) -> Result<Option<EventId>, ServiceError> {
        self.game(game).await?.delete(id).await
    }

    pub async fn move_event(&self, game: &str, id: EventId, tick: Tick) -> Result<EventId, ServiceError> {
        self.game(game).await?.move_event(id, tick).await
    }

    pub async fn read(&self, game: &str, name: &str, key: Option<&str>) -> Result<Value, ServiceError> {
        self.game(game).await?.read(name, key)
    }

    pub async fn subscribe(&self, game: &str) -> Result<broadcast::Receiver<StateChange>, ServiceError> {
        Ok(self.game(game).await?.subscribe())
    }
}
