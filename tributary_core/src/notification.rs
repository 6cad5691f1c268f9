//! Notifications published by a reader, and the pure functions that build them.
//!
//! Every notification carries the id of the reader that produced it. Those that advance the
//! reader's safe join position never move it backwards: each builder takes the highest position
//! the reader has already published (the *floor*) and never reports anything below it.

use crate::event::{LogPosition, ResolvedEvent};
use crate::token::ReaderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where the payload of a linked event actually lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTarget {
    /// Stream of the target record.
    pub stream_id: String,
    /// Event number of the target record in its own stream.
    pub event_number: u64,
}

/// One event handed downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributedEvent {
    /// The reader that read the event.
    pub reader_id: ReaderId,
    /// The stream being read.
    pub stream_id: String,
    /// Event number within the stream being read.
    pub event_number: u64,
    /// Event ID of the payload record.
    pub event_id: Uuid,
    /// Event type of the payload record.
    pub event_type: String,
    /// Raw payload.
    pub data: Vec<u8>,
    /// Raw metadata.
    pub metadata: Vec<u8>,
    /// Whether the payload is JSON.
    pub is_json: bool,
    /// When the payload record was written.
    pub created_at: DateTime<Utc>,
    /// Set when the event was reached through a link record.
    pub target: Option<EventTarget>,
    /// Position of the event in the global log.
    pub position: LogPosition,
    /// No event positioned below this can still arrive from the same reader.
    pub safe_join_position: u64,
    /// How far through the stream this event is, in percent.
    pub progress: f32,
}

/// Output of a reader, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReaderNotification {
    /// An event, in stream order.
    Event(DistributedEvent),
    /// The reader has caught up with the tail of the log and is waiting for new writes.
    Idle {
        /// The reader that is idle.
        reader_id: ReaderId,
        /// Tail position observed by the read that found nothing new.
        safe_join_position: u64,
        /// When the reader went idle.
        at: DateTime<Utc>,
    },
    /// A stop-on-eof reader reached the end of its stream and stopped.
    Eof {
        /// The reader that stopped.
        reader_id: ReaderId,
        /// Tail position observed by the final read.
        safe_join_position: u64,
    },
    /// The stream was deleted; the reader has stopped.
    Deleted {
        /// The reader that stopped.
        reader_id: ReaderId,
        /// The deleted stream.
        stream_id: String,
        /// The last event number the reader delivered, if any.
        last_event_number: Option<u64>,
        /// Safe join position at the time of deletion.
        safe_join_position: u64,
    },
    /// The reader hit an unrecoverable error and has stopped.
    Faulted {
        /// The reader that faulted.
        reader_id: ReaderId,
        /// What went wrong.
        detail: String,
    },
}

impl ReaderNotification {
    /// The reader that published this notification.
    pub fn reader_id(&self) -> ReaderId {
        match self {
            ReaderNotification::Event(event) => event.reader_id,
            ReaderNotification::Idle { reader_id, .. }
            | ReaderNotification::Eof { reader_id, .. }
            | ReaderNotification::Deleted { reader_id, .. }
            | ReaderNotification::Faulted { reader_id, .. } => *reader_id,
        }
    }

    /// The safe join position carried by this notification, if it carries one.
    pub fn safe_join_position(&self) -> Option<u64> {
        match self {
            ReaderNotification::Event(event) => Some(event.safe_join_position),
            ReaderNotification::Idle {
                safe_join_position, ..
            }
            | ReaderNotification::Eof {
                safe_join_position, ..
            }
            | ReaderNotification::Deleted {
                safe_join_position, ..
            } => Some(*safe_join_position),
            ReaderNotification::Faulted { .. } => None,
        }
    }

    /// Whether the reader publishes nothing after this.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReaderNotification::Eof { .. }
                | ReaderNotification::Deleted { .. }
                | ReaderNotification::Faulted { .. }
        )
    }
}

/// Builds the notification for one accepted event.
///
/// `last_event_number` is the stream's last event number as reported with the page; it only
/// feeds `progress`.
pub fn event_notification(
    reader_id: ReaderId,
    event: &ResolvedEvent,
    safe_join_floor: u64,
    last_event_number: Option<u64>,
) -> DistributedEvent {
    let original = event.original_event();
    let position = event.original_position();
    let target = event.link.as_ref().map(|_| EventTarget {
        stream_id: event.event.stream_id.clone(),
        event_number: event.event.event_number,
    });

    DistributedEvent {
        reader_id,
        stream_id: original.stream_id.clone(),
        event_number: original.event_number,
        event_id: event.event.event_id,
        event_type: event.event.event_type.clone(),
        data: event.event.data.clone(),
        metadata: event.event.metadata.clone(),
        is_json: event.event.is_json,
        created_at: event.event.created_at,
        target,
        position,
        safe_join_position: position.ordering_position().max(safe_join_floor),
        progress: progress(original.event_number, last_event_number),
    }
}

/// Builds the notification published when a read finds the stream caught up.
pub fn idle_notification(
    reader_id: ReaderId,
    tail_position: u64,
    safe_join_floor: u64,
    at: DateTime<Utc>,
) -> ReaderNotification {
    ReaderNotification::Idle {
        reader_id,
        safe_join_position: tail_position.max(safe_join_floor),
        at,
    }
}

/// Builds the notification published when a stop-on-eof reader finishes.
pub fn eof_notification(
    reader_id: ReaderId,
    tail_position: u64,
    safe_join_floor: u64,
) -> ReaderNotification {
    ReaderNotification::Eof {
        reader_id,
        safe_join_position: tail_position.max(safe_join_floor),
    }
}

/// Builds the notification published when the stream turns out to be deleted.
pub fn deleted_notification(
    reader_id: ReaderId,
    stream_id: &str,
    last_event_number: Option<u64>,
    safe_join_floor: u64,
) -> ReaderNotification {
    ReaderNotification::Deleted {
        reader_id,
        stream_id: stream_id.to_string(),
        last_event_number,
        safe_join_position: safe_join_floor,
    }
}

/// Builds the notification published when the reader faults.
pub fn faulted_notification(reader_id: ReaderId, detail: impl Into<String>) -> ReaderNotification {
    ReaderNotification::Faulted {
        reader_id,
        detail: detail.into(),
    }
}

fn progress(event_number: u64, last_event_number: Option<u64>) -> f32 {
    match last_event_number {
        Some(last) if last > 0 => (100.0 * event_number as f32 / last as f32).min(100.0),
        _ => 100.0,
    }
}
