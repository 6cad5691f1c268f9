//! Classification of read replies.
//!
//! [`classify`] decides what a reply means for the reader: deliver a page and read on, back off,
//! announce idleness at the tail, or stop. It does no bookkeeping of its own.

use crate::event::ResolvedEvent;
use crate::message::{ReadStreamCompleted, ReadStreamResult};

/// What a read reply means for the reader.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadClassification {
    /// A page to deliver, possibly empty.
    Batch {
        /// Events in delivery order.
        events: Vec<ResolvedEvent>,
        /// Whether the next read should be issued right away rather than after a delay.
        continue_immediately: bool,
    },
    /// Nothing new; the reader is caught up with the tail.
    Idle {
        /// Tail of the log when the read was served.
        tail_position: u64,
    },
    /// The stream has not been created yet.
    NotFound {
        /// Tail of the log when the read was served.
        tail_position: u64,
    },
    /// The stream was deleted.
    Deleted {
        /// Last event number reported for the stream, if any.
        last_event_number: Option<u64>,
    },
    /// The reply cannot be acted upon.
    Error(String),
}

/// Classifies a read reply.
///
/// A successful page with events always continues immediately, even when it reached the end of
/// the stream: the follow-up read is the one that observes the tail and reports idleness. An
/// empty page that is not at the end of the stream is a gap; the reader reads on immediately when
/// the gap moved the cursor forward and backs off when it did not.
pub fn classify(response: &ReadStreamCompleted) -> ReadClassification {
    match &response.result {
        ReadStreamResult::Success => classify_page(response),
        ReadStreamResult::NoStream => ReadClassification::NotFound {
            tail_position: response.tail_position,
        },
        ReadStreamResult::StreamDeleted => ReadClassification::Deleted {
            last_event_number: response.last_event_number,
        },
        ReadStreamResult::AccessDenied => ReadClassification::Error(format!(
            "access denied reading stream '{}'",
            response.stream_id
        )),
        ReadStreamResult::Error(detail) => ReadClassification::Error(format!(
            "error reading stream '{}': {}",
            response.stream_id, detail
        )),
    }
}

fn classify_page(response: &ReadStreamCompleted) -> ReadClassification {
    if let Err(detail) = validate_page(response) {
        return ReadClassification::Error(detail);
    }

    if response.events.is_empty() {
        if response.is_end_of_stream {
            return ReadClassification::Idle {
                tail_position: response.tail_position,
            };
        }
        return ReadClassification::Batch {
            events: Vec::new(),
            continue_immediately: response.next_event_number > response.from_event_number,
        };
    }

    ReadClassification::Batch {
        events: response.events.clone(),
        continue_immediately: true,
    }
}

fn validate_page(response: &ReadStreamCompleted) -> Result<(), String> {
    let stream_id = &response.stream_id;
    if response.next_event_number < response.from_event_number {
        return Err(format!(
            "malformed page for '{}': next event number {} is behind requested {}",
            stream_id, response.next_event_number, response.from_event_number
        ));
    }

    let mut previous: Option<u64> = None;
    for event in &response.events {
        let number = event.original_event_number();
        match previous {
            None if number < response.from_event_number => {
                return Err(format!(
                    "malformed page for '{}': event {} precedes requested {}",
                    stream_id, number, response.from_event_number
                ));
            }
            Some(prev) if number != prev + 1 => {
                return Err(format!(
                    "event number gap in '{}': {} followed by {}",
                    stream_id, prev, number
                ));
            }
            _ => {}
        }
        previous = Some(number);
    }

    if let Some(last) = previous
        && response.next_event_number <= last
    {
        return Err(format!(
            "malformed page for '{}': next event number {} does not follow last event {}",
            stream_id, response.next_event_number, last
        ));
    }

    Ok(())
}
