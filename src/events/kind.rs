use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PayloadError;

/// Behavioral tags carried by an event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    /// Applying the event re-anchors the period clock.
    pub const PERIOD_CLOCK_ALIGNED: Capabilities = Capabilities(1);
    /// Deleting the event leaves its replacement kind one tick earlier.
    pub const REPLACE_ON_DELETE: Capabilities = Capabilities(1 << 1);
    /// The event can never be deleted.
    pub const ALWAYS_PERSISTED: Capabilities = Capabilities(1 << 2);
    /// The event is listed in user-facing history; no effect on replay.
    pub const SHOWN_IN_HISTORY: Capabilities = Capabilities(1 << 3);

    pub const fn union(self, other: Capabilities) -> Capabilities {
        Capabilities(self.0 | other.0)
    }

    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        self.union(rhs)
    }
}

/// Whether a kind carries a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    Empty,
    Optional,
    Required,
}

macro_rules! event_kinds {
    ($($kind:ident),+ $(,)?) => {
        /// Closed set of event kinds.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum EventKind {
            $($kind),+
        }

        impl EventKind {
            pub const ALL: &'static [EventKind] = &[$(EventKind::$kind),+];

            pub const fn name(self) -> &'static str {
                match self {
                    $(EventKind::$kind => stringify!($kind)),+
                }
            }
        }
    };
}

event_kinds!(
    GameStarted,
    JamStarted,
    JamEnded,
    JamExpired,
    JamAutoExpiryDisabled,
    JamClockSet,
    PeriodClockSet,
    PeriodEnded,
    TimeoutStarted,
    TimeoutEnded,
    OfficialReviewRetained,
    IntermissionStarted,
    IntermissionEnded,
    IntermissionClockSet,
    ScoreModifiedRelative,
    ScoreSet,
    PenaltyAssessed,
    PenaltyRescinded,
    SkaterAddedToJam,
    SkaterRemovedFromJam,
);

impl EventKind {
    pub const fn capabilities(self) -> Capabilities {
        const ALIGNED: Capabilities = Capabilities::PERIOD_CLOCK_ALIGNED;
        const HISTORY: Capabilities = Capabilities::SHOWN_IN_HISTORY;
        match self {
            EventKind::GameStarted => Capabilities::ALWAYS_PERSISTED,
            EventKind::JamStarted
            | EventKind::JamEnded
            | EventKind::PeriodEnded
            | EventKind::TimeoutStarted
            | EventKind::TimeoutEnded => ALIGNED.union(HISTORY),
            EventKind::JamExpired => ALIGNED.union(Capabilities::REPLACE_ON_DELETE),
            EventKind::IntermissionEnded => Capabilities::NONE,
            EventKind::JamAutoExpiryDisabled
            | EventKind::JamClockSet
            | EventKind::PeriodClockSet
            | EventKind::OfficialReviewRetained
            | EventKind::IntermissionStarted
            | EventKind::IntermissionClockSet
            | EventKind::ScoreModifiedRelative
            | EventKind::ScoreSet
            | EventKind::PenaltyAssessed
            | EventKind::PenaltyRescinded
            | EventKind::SkaterAddedToJam
            | EventKind::SkaterRemovedFromJam => HISTORY,
        }
    }

    pub const fn has(self, capability: Capabilities) -> bool {
        self.capabilities().contains(capability)
    }

    /// Kind substituted when an event of this kind is deleted.
    pub const fn replacement(self) -> Option<EventKind> {
        match self {
            EventKind::JamExpired => Some(EventKind::JamAutoExpiryDisabled),
            _ => None,
        }
    }

    pub const fn payload_shape(self) -> PayloadShape {
        match self {
            EventKind::TimeoutStarted | EventKind::IntermissionStarted => PayloadShape::Optional,
            EventKind::JamClockSet
            | EventKind::PeriodClockSet
            | EventKind::IntermissionClockSet
            | EventKind::OfficialReviewRetained
            | EventKind::ScoreModifiedRelative
            | EventKind::ScoreSet
            | EventKind::PenaltyAssessed
            | EventKind::PenaltyRescinded
            | EventKind::SkaterAddedToJam
            | EventKind::SkaterRemovedFromJam => PayloadShape::Required,
            _ => PayloadShape::Empty,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| PayloadError::UnknownKind(s.to_string()))
    }
}
