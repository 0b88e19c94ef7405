use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::EventId;
use super::kind::{EventKind, PayloadShape};
use crate::error::PayloadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamSide {
    Home,
    Away,
}

impl TeamSide {
    pub const BOTH: [TeamSide; 2] = [TeamSide::Home, TeamSide::Away];

    pub const fn as_str(self) -> &'static str {
        match self {
            TeamSide::Home => "home",
            TeamSide::Away => "away",
        }
    }
}

impl fmt::Display for TeamSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Jammer,
    Pivot,
    Blocker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutCaller {
    Official,
    Team(TeamSide),
    Review(TeamSide),
}

impl TimeoutCaller {
    pub const fn team(self) -> Option<TeamSide> {
        match self {
            TimeoutCaller::Official => None,
            TimeoutCaller::Team(side) | TimeoutCaller::Review(side) => Some(side),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSet {
    pub seconds_remaining: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeoutStart {
    #[serde(default)]
    pub caller: Option<TimeoutCaller>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntermissionStart {
    #[serde(default)]
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub team: TeamSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreChange {
    pub team: TeamSide,
    pub points: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyCall {
    pub team: TeamSide,
    pub skater_number: String,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyRescind {
    pub team: TeamSide,
    pub penalty: EventId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkaterPlacement {
    pub team: TeamSide,
    pub skater_number: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkaterRemoval {
    pub team: TeamSide,
    pub skater_number: String,
}

/// Typed body of an event, one variant per [`EventKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum EventBody {
    GameStarted,
    JamStarted,
    JamEnded,
    JamExpired,
    JamAutoExpiryDisabled,
    JamClockSet(ClockSet),
    PeriodClockSet(ClockSet),
    PeriodEnded,
    TimeoutStarted(TimeoutStart),
    TimeoutEnded,
    OfficialReviewRetained(TeamRef),
    IntermissionStarted(IntermissionStart),
    IntermissionEnded,
    IntermissionClockSet(ClockSet),
    ScoreModifiedRelative(ScoreChange),
    ScoreSet(ScoreChange),
    PenaltyAssessed(PenaltyCall),
    PenaltyRescinded(PenaltyRescind),
    SkaterAddedToJam(SkaterPlacement),
    SkaterRemovedFromJam(SkaterRemoval),
}

impl EventBody {
    pub fn kind(&self) -> EventKind {
        match self {
            EventBody::GameStarted => EventKind::GameStarted,
            EventBody::JamStarted => EventKind::JamStarted,
            EventBody::JamEnded => EventKind::JamEnded,
            EventBody::JamExpired => EventKind::JamExpired,
            EventBody::JamAutoExpiryDisabled => EventKind::JamAutoExpiryDisabled,
            EventBody::JamClockSet(_) => EventKind::JamClockSet,
            EventBody::PeriodClockSet(_) => EventKind::PeriodClockSet,
            EventBody::PeriodEnded => EventKind::PeriodEnded,
            EventBody::TimeoutStarted(_) => EventKind::TimeoutStarted,
            EventBody::TimeoutEnded => EventKind::TimeoutEnded,
            EventBody::OfficialReviewRetained(_) => EventKind::OfficialReviewRetained,
            EventBody::IntermissionStarted(_) => EventKind::IntermissionStarted,
            EventBody::IntermissionEnded => EventKind::IntermissionEnded,
            EventBody::IntermissionClockSet(_) => EventKind::IntermissionClockSet,
            EventBody::ScoreModifiedRelative(_) => EventKind::ScoreModifiedRelative,
            EventBody::ScoreSet(_) => EventKind::ScoreSet,
            EventBody::PenaltyAssessed(_) => EventKind::PenaltyAssessed,
            EventBody::PenaltyRescinded(_) => EventKind::PenaltyRescinded,
            EventBody::SkaterAddedToJam(_) => EventKind::SkaterAddedToJam,
            EventBody::SkaterRemovedFromJam(_) => EventKind::SkaterRemovedFromJam,
        }
    }

    /// Builds a body from a kind tag and an optional raw payload.
    ///
    /// Kinds without a payload accept `None`, `null` or `{}`. Kinds with an
    /// optional payload fall back to its default.
    pub fn decode(kind: EventKind, payload: Option<Value>) -> Result<EventBody, PayloadError> {
        let payload = match payload {
            Some(Value::Null) => None,
            other => other,
        };
        let payload = match (kind.payload_shape(), payload) {
            (PayloadShape::Empty, None) => None,
            (PayloadShape::Empty, Some(Value::Object(map))) if map.is_empty() => None,
            (PayloadShape::Empty, Some(_)) => return Err(PayloadError::Unexpected(kind)),
            (PayloadShape::Optional, None) => Some(Value::Object(Map::new())),
            (PayloadShape::Required, None) => return Err(PayloadError::Missing(kind)),
            (_, Some(value)) => Some(value),
        };

        let mut tagged = Map::new();
        tagged.insert("kind".to_string(), Value::String(kind.name().to_string()));
        if let Some(value) = payload {
            tagged.insert("payload".to_string(), value);
        }
        serde_json::from_value(Value::Object(tagged)).map_err(|source| PayloadError::Invalid { kind, source })
    }

    /// The raw payload, or `None` for payload-less kinds.
    pub fn payload(&self) -> Option<Value> {
        let value = serde_json::to_value(self).ok()?;
        match value {
            Value::Object(mut map) => map.remove("payload"),
            _ => None,
        }
    }

    /// Team the event concerns, if it concerns exactly one.
    pub fn team(&self) -> Option<TeamSide> {
        match self {
            EventBody::ScoreModifiedRelative(c) | EventBody::ScoreSet(c) => Some(c.team),
            EventBody::PenaltyAssessed(p) => Some(p.team),
            EventBody::PenaltyRescinded(p) => Some(p.team),
            EventBody::SkaterAddedToJam(p) => Some(p.team),
            EventBody::SkaterRemovedFromJam(p) => Some(p.team),
            EventBody::OfficialReviewRetained(r) => Some(r.team),
            EventBody::TimeoutStarted(t) => t.caller.and_then(TimeoutCaller::team),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_payload_kind() {
        let body = EventBody::decode(EventKind::JamClockSet, Some(json!({"seconds_remaining": 30}))).unwrap();
        assert_eq!(body, EventBody::JamClockSet(ClockSet { seconds_remaining: 30 }));
        assert_eq!(body.kind(), EventKind::JamClockSet);
        assert_eq!(body.payload(), Some(json!({"seconds_remaining": 30})));
    }

    #[test]
    fn test_decode_rejects_missing_and_malformed() {
        assert!(matches!(
            EventBody::decode(EventKind::ScoreSet, None),
            Err(PayloadError::Missing(EventKind::ScoreSet))
        ));
        assert!(matches!(
            EventBody::decode(EventKind::ScoreSet, Some(json!({"team": "home"}))),
            Err(PayloadError::Invalid { kind: EventKind::ScoreSet, .. })
        ));
        assert!(matches!(
            EventBody::decode(EventKind::ScoreSet, Some(json!({"team": "visitors", "points": 4}))),
            Err(PayloadError::Invalid { .. })
        ));
        assert!(matches!(
            EventBody::decode(EventKind::JamStarted, Some(json!({"x": 1}))),
            Err(PayloadError::Unexpected(EventKind::JamStarted))
        ));
    }

    #[test]
    fn test_decode_empty_and_optional() {
        assert_eq!(EventBody::decode(EventKind::JamStarted, None).unwrap(), EventBody::JamStarted);
        assert_eq!(EventBody::decode(EventKind::JamStarted, Some(json!({}))).unwrap(), EventBody::JamStarted);
        assert_eq!(
            EventBody::decode(EventKind::TimeoutStarted, None).unwrap(),
            EventBody::TimeoutStarted(TimeoutStart { caller: None })
        );
        let review = EventBody::decode(EventKind::TimeoutStarted, Some(json!({"caller": {"review": "away"}}))).unwrap();
        assert_eq!(review.team(), Some(TeamSide::Away));
        assert_eq!(EventBody::JamStarted.payload(), None);
    }

    #[test]
    fn test_kind_matches_every_variant_tag() {
        for kind in EventKind::ALL {
            if kind.payload_shape() != PayloadShape::Required {
                let body = EventBody::decode(*kind, None).unwrap();
                assert_eq!(body.kind(), *kind);
            }
        }
    }
}
