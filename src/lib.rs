//! Event-sourced state engine for a live roller-derby scoreboard.
//!
//! A game is an ordered [`timeline::Timeline`] of events. Registered
//! reducers fold it into derived states held by a [`store::Game`], which
//! recomputes from the nearest keyframe whenever history is edited.

pub mod archive;
pub mod clocks;
pub mod config;
pub mod error;
pub mod events;
pub mod journal;
pub mod logging;
pub mod reducer;
pub mod reducers;
pub mod rules;
pub mod service;
pub mod store;
pub mod tick;
pub mod timeline;

pub use error::{PayloadError, ReduceError, RegistryError, ServiceError, StoreError, TickError, TimelineError};
pub use events::{Event, EventBody, EventId, EventKind};
pub use store::{Game, StateId, StateMap};
pub use tick::Tick;
