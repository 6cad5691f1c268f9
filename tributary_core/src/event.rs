//! This module defines the committed event records handed to a reader by the log gateway,
//! the `EventRecordBuilder` used to create them, and the two-part `LogPosition` used to order
//! events across streams.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A location in the global commit log.
///
/// Events written as part of a transaction become visible at their commit position, but were
/// prepared earlier. Events read from a single stream only know where they were prepared, so
/// their `commit` part is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogPosition {
    /// Position of the commit record, if known.
    pub commit: Option<u64>,
    /// Position of the prepare record.
    pub prepare: u64,
}

impl LogPosition {
    /// Creates a fully resolved position.
    pub fn new(commit: u64, prepare: u64) -> Self {
        Self {
            commit: Some(commit),
            prepare,
        }
    }

    /// Creates a position that only knows where the event was prepared.
    pub fn prepare_only(prepare: u64) -> Self {
        Self {
            commit: None,
            prepare,
        }
    }

    /// The position used to interleave this event with events of other streams.
    pub fn ordering_position(&self) -> u64 {
        self.commit.unwrap_or(self.prepare)
    }
}

/// A committed event as stored in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event ID
    pub event_id: Uuid,

    /// The stream this record was written to
    pub stream_id: String,

    /// Zero-based sequence index of the record within its stream
    pub event_number: u64,

    /// Where the record was prepared in the global log
    pub log_position: u64,

    /// Event type
    ///
    /// The type of this event in PascalCase, like `OrganisationCreated` or `StudyCurated`.
    /// Link records use `$>`.
    pub event_type: String,

    /// Raw payload
    pub data: Vec<u8>,

    /// Raw metadata
    pub metadata: Vec<u8>,

    /// Whether `data` and `metadata` hold JSON
    pub is_json: bool,

    /// The time at which this event was written
    pub created_at: DateTime<Utc>,
}

impl EventRecord {
    /// Creates a new `EventRecordBuilder` instance.
    pub fn builder() -> EventRecordBuilder {
        EventRecordBuilder::new()
    }

    /// Converts `self` into an `EventRecordBuilder`.
    pub fn into_builder(self) -> EventRecordBuilder {
        self.into()
    }
}

impl From<EventRecord> for EventRecordBuilder {
    fn from(record: EventRecord) -> Self {
        Self {
            event_id: Some(record.event_id),
            stream_id: Some(record.stream_id),
            event_number: Some(record.event_number),
            log_position: Some(record.log_position),
            event_type: Some(record.event_type),
            data: record.data,
            metadata: record.metadata,
            is_json: record.is_json,
            created_at: Some(record.created_at),
        }
    }
}

/// Builder for `EventRecord`
#[derive(Debug, Default)]
pub struct EventRecordBuilder {
    /// The event ID.
    pub event_id: Option<Uuid>,
    /// The stream ID
    pub stream_id: Option<String>,
    /// The sequence number of the event within its stream.
    pub event_number: Option<u64>,
    /// The prepare position of the event in the log.
    pub log_position: Option<u64>,
    /// The event type.
    pub event_type: Option<String>,
    /// The raw payload.
    pub data: Vec<u8>,
    /// The raw metadata.
    pub metadata: Vec<u8>,
    /// Whether the payload is JSON.
    pub is_json: bool,
    /// The time at which this event was written.
    pub created_at: Option<DateTime<Utc>>,
}

impl EventRecordBuilder {
    /// Creates a new `EventRecordBuilder` instance with all fields unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ID for the event.
    pub fn event_id(mut self, event_id: Uuid) -> Self {
        self.event_id = Some(event_id);
        self
    }

    /// Sets the stream ID for the event.
    pub fn stream_id(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = Some(stream_id.into());
        self
    }

    /// Sets the event number within the stream.
    pub fn event_number(mut self, event_number: u64) -> Self {
        self.event_number = Some(event_number);
        self
    }

    /// Sets the prepare position in the log.
    pub fn log_position(mut self, log_position: u64) -> Self {
        self.log_position = Some(log_position);
        self
    }

    /// Sets the event type for the event.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the raw payload.
    pub fn data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    /// Sets the raw metadata.
    pub fn metadata(mut self, metadata: impl Into<Vec<u8>>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Marks the payload as JSON.
    pub fn json(mut self, is_json: bool) -> Self {
        self.is_json = is_json;
        self
    }

    /// Sets the creation timestamp for the event.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Builds the `EventRecord` from the `EventRecordBuilder`.
    ///
    /// # Errors
    ///
    /// Returns an error if `stream_id`, `event_number`, `log_position` or `event_type` are not set.
    pub fn build(self) -> Result<EventRecord, EventRecordBuilderError> {
        Ok(EventRecord {
            event_id: self.event_id.unwrap_or_else(Uuid::new_v4),
            stream_id: self
                .stream_id
                .ok_or(EventRecordBuilderError::StreamIdMissing)?,
            event_number: self
                .event_number
                .ok_or(EventRecordBuilderError::EventNumberMissing)?,
            log_position: self
                .log_position
                .ok_or(EventRecordBuilderError::LogPositionMissing)?,
            event_type: self
                .event_type
                .ok_or(EventRecordBuilderError::EventTypeMissing)?,
            data: self.data,
            metadata: self.metadata,
            is_json: self.is_json,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        })
    }
}

/// Errors that can occur when building an `EventRecord`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventRecordBuilderError {
    /// The stream ID is missing.
    #[error("Event stream ID is required")]
    StreamIdMissing,
    /// The event number is missing.
    #[error("Event number is required")]
    EventNumberMissing,
    /// The log position is missing.
    #[error("Event log position is required")]
    LogPositionMissing,
    /// The event type is missing.
    #[error("Event type is required")]
    EventTypeMissing,
}

/// An event returned by a stream read.
///
/// When the stream being read contains link records (`$>`) and link resolution is enabled,
/// `event` is the record the link points at and `link` is the link itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEvent {
    /// The target record.
    pub event: EventRecord,
    /// The link record that was read, if `event` was reached through one.
    pub link: Option<EventRecord>,
    /// The commit-aware position of the original record, when the gateway knows it.
    pub original_position: Option<LogPosition>,
}

impl ResolvedEvent {
    /// Wraps a plain record read directly from its own stream.
    pub fn new(event: EventRecord) -> Self {
        Self {
            event,
            link: None,
            original_position: None,
        }
    }

    /// Wraps a record reached through a link.
    pub fn linked(event: EventRecord, link: EventRecord) -> Self {
        Self {
            event,
            link: Some(link),
            original_position: None,
        }
    }

    /// Attaches a commit-aware position.
    pub fn with_position(mut self, position: LogPosition) -> Self {
        self.original_position = Some(position);
        self
    }

    /// The record that lives in the stream being read: the link if present, otherwise the event.
    pub fn original_event(&self) -> &EventRecord {
        self.link.as_ref().unwrap_or(&self.event)
    }

    /// The event number of the original record in the stream being read.
    pub fn original_event_number(&self) -> u64 {
        self.original_event().event_number
    }

    /// The position of the original record in the global log.
    pub fn original_position(&self) -> LogPosition {
        self.original_position
            .unwrap_or_else(|| LogPosition::prepare_only(self.original_event().log_position))
    }
}
