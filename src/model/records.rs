use super::position::LogPosition;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Single event as stored in a stream of the event store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub stream_id: String,
    pub event_number: i32,
    pub event_id: Uuid,
    pub event_type: String,
    pub data: Vec<u8>,
    pub metadata: Vec<u8>,
    pub timestamp_ms: u64,
    pub log_position: i64,
    pub is_json: bool,
}

impl EventRecord {
    /// Creates a record with empty payloads and a fresh event id.
    pub fn new(stream_id: impl Into<String>, event_number: i32, event_type: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            event_number,
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            data: Vec::new(),
            metadata: Vec::new(),
            timestamp_ms: 0,
            log_position: 0,
            is_json: false,
        }
    }

    /// Replaces the data payload.
    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    /// Replaces the metadata payload.
    pub fn with_metadata(mut self, metadata: impl Into<Vec<u8>>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Sets the scalar position the record occupies in the log.
    pub fn with_log_position(mut self, log_position: i64) -> Self {
        self.log_position = log_position;
        self
    }

    /// Sets the record timestamp.
    pub fn with_timestamp_ms(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    /// Overrides the generated event id.
    pub fn with_event_id(mut self, event_id: Uuid) -> Self {
        self.event_id = event_id;
        self
    }

    /// Marks the data payload as JSON.
    pub fn as_json(mut self) -> Self {
        self.is_json = true;
        self
    }
}

/// Event paired with the link entry that referenced it, if it was reached
/// through an index stream, plus the log position when the source read
/// supplies one directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEvent {
    pub event: EventRecord,
    pub link: Option<EventRecord>,
    pub position: Option<LogPosition>,
}

impl ResolvedEvent {
    /// An event read without link resolution.
    pub fn unlinked(event: EventRecord) -> Self {
        Self {
            event,
            link: None,
            position: None,
        }
    }

    /// An original event together with the link that pointed at it.
    pub fn linked(event: EventRecord, link: EventRecord) -> Self {
        Self {
            event,
            link: Some(link),
            position: None,
        }
    }

    /// Attaches the log position reported by the source read.
    pub fn at(mut self, position: LogPosition) -> Self {
        self.position = Some(position);
        self
    }

    /// The record whose stream ordering drives this event (the link when
    /// present, the event itself otherwise).
    pub fn position_event(&self) -> &EventRecord {
        self.link.as_ref().unwrap_or(&self.event)
    }
}

/// Buffered event awaiting the position-ordered merge.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub resolved: ResolvedEvent,
    pub position: LogPosition,
    pub progress: f32,
}
