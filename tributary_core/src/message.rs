//! Messages exchanged between a reader and its collaborators.
//!
//! A reader issues [`ReadForward`] requests and receives [`ReadStreamCompleted`] replies; both,
//! together with timer ticks and lifecycle requests, reach the reader as a [`ReaderMessage`].

use crate::event::ResolvedEvent;
use crate::token::CorrelationToken;

/// A bounded forward read of one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadForward {
    /// Token the reply must carry back.
    pub token: CorrelationToken,
    /// The stream to read.
    pub stream_id: String,
    /// First event number to return.
    pub from_event_number: u64,
    /// Maximum number of events in the page.
    pub max_count: u32,
    /// Whether link records should be resolved to the events they point at.
    pub resolve_links: bool,
}

/// Outcome of a stream read as reported by the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStreamResult {
    /// The page was read.
    Success,
    /// The stream has never been written to.
    NoStream,
    /// The stream was deleted.
    StreamDeleted,
    /// The storage layer refused the read.
    AccessDenied,
    /// Any other failure.
    Error(String),
}

/// Reply to a [`ReadForward`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReadStreamCompleted {
    /// Token copied from the request.
    pub token: CorrelationToken,
    /// The stream that was read.
    pub stream_id: String,
    /// First event number that was requested.
    pub from_event_number: u64,
    /// Outcome of the read.
    pub result: ReadStreamResult,
    /// The page, in ascending event number order.
    pub events: Vec<ResolvedEvent>,
    /// Event number the next read should start from.
    pub next_event_number: u64,
    /// Number of the last event currently in the stream, if any.
    pub last_event_number: Option<u64>,
    /// Whether the page reached the end of the stream.
    pub is_end_of_stream: bool,
    /// Position of the last commit in the log when the read was served.
    pub tail_position: u64,
}

impl ReadStreamCompleted {
    /// A successful page.
    pub fn success(
        request: &ReadForward,
        events: Vec<ResolvedEvent>,
        next_event_number: u64,
        last_event_number: Option<u64>,
        is_end_of_stream: bool,
        tail_position: u64,
    ) -> Self {
        Self {
            token: request.token,
            stream_id: request.stream_id.clone(),
            from_event_number: request.from_event_number,
            result: ReadStreamResult::Success,
            events,
            next_event_number,
            last_event_number,
            is_end_of_stream,
            tail_position,
        }
    }

    /// A reply that carries no events.
    pub fn failed(request: &ReadForward, result: ReadStreamResult, tail_position: u64) -> Self {
        Self {
            token: request.token,
            stream_id: request.stream_id.clone(),
            from_event_number: request.from_event_number,
            result,
            events: Vec::new(),
            next_event_number: request.from_event_number,
            last_event_number: None,
            is_end_of_stream: true,
            tail_position,
        }
    }
}

/// Everything a reader reacts to, delivered one at a time in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderMessage {
    /// A read issued by the reader has completed.
    ReadCompleted(ReadStreamCompleted),
    /// A delay scheduled by the reader has elapsed.
    TimerFired(CorrelationToken),
    /// Stop reading until resumed.
    Pause,
    /// Continue reading after a pause.
    Resume,
    /// Stop reading for good.
    Stop,
}
