//! Core types for the catch-up subscription engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Event type used by the store for link events.
pub const LINK_EVENT_TYPE: &str = "$>";

/// Position in the store (per-stream event number, or a global position
/// when subscribed to the whole store). Totally ordered.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Position(pub u64);

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos({})", self.0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Position {
    pub fn next(self) -> Self {
        Position(self.0 + 1)
    }
}

/// Unique 128-bit identifier for an event.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub [u8; 16]);

impl EventId {
    pub fn from_u128(value: u128) -> Self {
        EventId(value.to_be_bytes())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> std::result::Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(EventId(arr))
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_micros() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// What a subscription covers: a single stream or the whole store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamSelector {
    /// Events of one named stream.
    Stream(String),
    /// Every event appended to the store.
    All,
}

impl StreamSelector {
    pub fn stream(name: impl Into<String>) -> Self {
        StreamSelector::Stream(name.into())
    }
}

impl fmt::Display for StreamSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSelector::Stream(name) => write!(f, "{}", name),
            StreamSelector::All => write!(f, "$all"),
        }
    }
}

/// Immutable snapshot of a stored event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventRecord {
    /// The stream this event belongs to.
    pub stream_id: String,

    /// Unique identifier of this event.
    pub event_id: EventId,

    /// The number of this event in its stream.
    pub event_number: u64,

    /// Application-defined event type.
    pub event_type: String,

    /// Event payload (possibly empty).
    pub data: Vec<u8>,

    /// Event metadata (possibly empty).
    pub metadata: Vec<u8>,

    /// Whether the payload is internally marked as JSON.
    pub is_json: bool,

    /// When the event was created, if the store reported it.
    pub created: Option<Timestamp>,
}

impl EventRecord {
    /// Whether this record is a link to an event elsewhere.
    pub fn is_link(&self) -> bool {
        self.event_type == LINK_EVENT_TYPE
    }
}

/// An event record plus its optional link resolution.
///
/// When the original record is a link event and link resolution is enabled,
/// the effective record is the link's target; otherwise it is the original
/// record itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolvedEvent {
    /// The effective record (target if resolved, else the original).
    event: EventRecord,

    /// The original link record, present only when resolution happened.
    link: Option<EventRecord>,
}

impl ResolvedEvent {
    /// An event delivered as-is, with no link resolution.
    pub fn unresolved(record: EventRecord) -> Self {
        Self {
            event: record,
            link: None,
        }
    }

    /// A link event resolved to its target.
    pub fn resolved(link: EventRecord, target: EventRecord) -> Self {
        Self {
            event: target,
            link: Some(link),
        }
    }

    /// The effective record.
    pub fn record(&self) -> &EventRecord {
        &self.event
    }

    /// The link record, if this event was resolved.
    pub fn link(&self) -> Option<&EventRecord> {
        self.link.as_ref()
    }

    /// The record as it appeared in the stream: the link if resolution
    /// happened, else the effective record.
    pub fn original_record(&self) -> &EventRecord {
        self.link.as_ref().unwrap_or(&self.event)
    }

    /// Whether link resolution happened.
    pub fn is_resolved(&self) -> bool {
        self.link.is_some()
    }
}
