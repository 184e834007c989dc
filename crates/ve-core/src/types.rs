use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Terrain {
    pub width: u32,
    pub height: u32,
}

impl Terrain {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Event kinds understood by the runtime, keyed by their three-letter wire code.
///
/// Unrecognized codes are kept as `Unknown` so a typo in a behavior script
/// shows up in logs instead of silently becoming a real kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    EntityUpdate,
    Chat,
    Particle,
    Direction,
    Location,
    Spawn,
    Delete,
    Sound,
    Error,
    Unknown(String),
}

impl EventKind {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "epu" => Self::EntityUpdate,
            "cha" => Self::Chat,
            "par" => Self::Particle,
            "dir" => Self::Direction,
            "loc" => Self::Location,
            "spa" => Self::Spawn,
            "del" => Self::Delete,
            "snd" => Self::Sound,
            "err" => Self::Error,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::EntityUpdate => "epu",
            Self::Chat => "cha",
            Self::Particle => "par",
            Self::Direction => "dir",
            Self::Location => "loc",
            Self::Spawn => "spa",
            Self::Delete => "del",
            Self::Sound => "snd",
            Self::Error => "err",
            Self::Unknown(code) => code.as_str(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        Self::from_code(&value)
    }
}

impl From<EventKind> for String {
    fn from(value: EventKind) -> Self {
        value.code().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl Event {
    pub fn new(kind: EventKind, body: impl Into<String>, origin: Option<String>) -> Self {
        Self {
            kind,
            body: body.into(),
            origin,
        }
    }

    pub fn is_from(&self, entity_id: &str) -> bool {
        self.origin.as_deref() == Some(entity_id)
    }
}

#[cfg(test)]
mod types_tests {
    use super::*;

    #[test]
    fn event_kind_codes_map_both_ways() {
        for code in ["epu", "cha", "par", "dir", "loc", "spa", "del", "snd", "err"] {
            let kind = EventKind::from_code(code);
            assert!(kind.is_known(), "{code} should be a known kind");
            assert_eq!(kind.code(), code);
        }
    }

    #[test]
    fn unknown_event_kind_keeps_raw_code() {
        let kind = EventKind::from_code("xyz");
        assert_eq!(kind, EventKind::Unknown("xyz".to_string()));
        assert_eq!(kind.to_string(), "xyz");
        assert!(!kind.is_known());
    }

    #[test]
    fn event_serializes_kind_as_code() {
        let event = Event::new(EventKind::Particle, "1 2 blue", Some("e1".to_string()));
        let json = serde_json::to_string(&event).expect("event should serialize");
        assert_eq!(json, r#"{"kind":"par","body":"1 2 blue","origin":"e1"}"#);

        let parsed: Event = serde_json::from_str(r#"{"kind":"cha","body":"hi"}"#)
            .expect("event should deserialize");
        assert_eq!(parsed.kind, EventKind::Chat);
        assert_eq!(parsed.origin, None);
    }

    #[test]
    fn event_origin_check() {
        let event = Event::new(EventKind::Chat, "hi", Some("e7".to_string()));
        assert!(event.is_from("e7"));
        assert!(!event.is_from("e8"));
        assert!(!Event::new(EventKind::Chat, "hi", None).is_from("e7"));
    }
}
