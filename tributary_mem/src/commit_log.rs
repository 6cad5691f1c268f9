use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use tributary_core::event::EventRecordBuilderError;
use tributary_core::prelude::*;

/// Event type of a link record. Its data is `{event_number}@{stream_id}` of the target.
pub const LINK_EVENT_TYPE: &str = "$>";

/// An event to be appended to a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedEvent {
    event_type: String,
    data: Vec<u8>,
    metadata: Vec<u8>,
    is_json: bool,
}

impl ProposedEvent {
    /// Creates an event with the given type and payload and no metadata.
    pub fn new(event_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
            metadata: Vec::new(),
            is_json: false,
        }
    }

    /// Sets the metadata.
    pub fn metadata(mut self, metadata: impl Into<Vec<u8>>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Marks the payload and metadata as JSON.
    pub fn json(mut self) -> Self {
        self.is_json = true;
        self
    }

    /// A link record pointing at `event_number` of `stream_id`.
    pub fn link_to(stream_id: &str, event_number: u64) -> Self {
        Self::new(LINK_EVENT_TYPE, format!("{}@{}", event_number, stream_id))
    }
}

/// The version a stream must be at for an append to succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Append regardless of the stream's current version.
    Any,
    /// The stream must not exist yet.
    NoStream,
    /// The stream's last event number must be this.
    Exact(u64),
}

/// Errors returned by the InMemoryLog
#[derive(Debug, thiserror::Error)]
pub enum InMemoryLogError {
    /// The stream is not at the expected version.
    #[error("Stream '{stream_id}' is at version {actual:?}, expected {expected:?}")]
    VersionMismatch {
        /// The stream appended to.
        stream_id: String,
        /// What the append expected.
        expected: ExpectedVersion,
        /// The stream's last event number.
        actual: Option<u64>,
    },
    /// The stream was deleted.
    #[error("Stream '{0}' has been deleted")]
    StreamDeleted(String),
    /// The stream does not exist.
    #[error("Stream '{0}' does not exist")]
    StreamNotFound(String),
    /// A record could not be built.
    #[error("Error building event record: {0}")]
    Record(#[from] EventRecordBuilderError),
}

#[derive(Debug, Default)]
struct StreamData {
    events: Vec<EventRecord>,
    deleted: bool,
}

impl StreamData {
    fn last_event_number(&self) -> Option<u64> {
        (self.events.len() as u64).checked_sub(1)
    }
}

/// The in-memory data store.
#[derive(Debug, Default)]
struct LogData {
    streams: HashMap<String, StreamData>,
    denied: HashSet<String>,
    tail_position: u64,
}

impl LogData {
    fn resolve(&self, record: &EventRecord, resolve_links: bool) -> ResolvedEvent {
        let position = LogPosition::new(record.log_position, record.log_position);
        if !resolve_links || record.event_type != LINK_EVENT_TYPE {
            return ResolvedEvent::new(record.clone()).with_position(position);
        }
        match self.link_target(record) {
            Some(target) => {
                ResolvedEvent::linked(target.clone(), record.clone()).with_position(position)
            }
            None => {
                log::debug!(
                    "Link {}#{} points at a missing event, delivering it unresolved",
                    record.stream_id,
                    record.event_number
                );
                ResolvedEvent::new(record.clone()).with_position(position)
            }
        }
    }

    fn link_target(&self, link: &EventRecord) -> Option<&EventRecord> {
        let (event_number, stream_id) = parse_link(&link.data)?;
        let stream = self.streams.get(stream_id)?;
        if stream.deleted {
            return None;
        }
        stream.events.get(usize::try_from(event_number).ok()?)
    }
}

fn parse_link(data: &[u8]) -> Option<(u64, &str)> {
    let (event_number, stream_id) = std::str::from_utf8(data).ok()?.split_once('@')?;
    Some((event_number.parse().ok()?, stream_id))
}

/// An in-memory commit log.
///
/// Every appended event gets the next position of a single log-wide counter, so events of
/// different streams are totally ordered. Useful for testing and development; nothing is
/// persisted.
#[derive(Clone, Debug, Default)]
pub struct InMemoryLog {
    data: Arc<Mutex<LogData>>,
}

impl InMemoryLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        log::debug!("Creating a new InMemoryLog");
        Self::default()
    }

    /// Appends `events` to `stream_id` and returns the stream's new last event number.
    ///
    /// # Errors
    ///
    /// Fails if the stream is deleted or not at `expected`. A failed or empty append leaves the
    /// log untouched.
    pub async fn append(
        &self,
        stream_id: &str,
        expected: ExpectedVersion,
        events: Vec<ProposedEvent>,
    ) -> Result<Option<u64>, InMemoryLogError> {
        let mut data = self.data.lock().await;
        let data = &mut *data;
        let existing = data.streams.get(stream_id);

        if existing.is_some_and(|stream| stream.deleted) {
            return Err(InMemoryLogError::StreamDeleted(stream_id.to_string()));
        }
        let actual = existing.and_then(StreamData::last_event_number);
        let matches = match expected {
            ExpectedVersion::Any => true,
            ExpectedVersion::NoStream => actual.is_none(),
            ExpectedVersion::Exact(version) => actual == Some(version),
        };
        if !matches {
            log::debug!(
                "Version mismatch appending to '{}': expected {:?}, actual {:?}",
                stream_id,
                expected,
                actual
            );
            return Err(InMemoryLogError::VersionMismatch {
                stream_id: stream_id.to_string(),
                expected,
                actual,
            });
        }
        if events.is_empty() {
            return Ok(actual);
        }

        let first_event_number = actual.map_or(0, |last| last + 1);
        let created_at = Utc::now();
        let mut records = Vec::with_capacity(events.len());
        for (offset, event) in (0u64..).zip(events) {
            records.push(
                EventRecord::builder()
                    .event_id(Uuid::new_v4())
                    .stream_id(stream_id)
                    .event_number(first_event_number + offset)
                    .log_position(data.tail_position + 1 + offset)
                    .event_type(event.event_type)
                    .data(event.data)
                    .metadata(event.metadata)
                    .json(event.is_json)
                    .created_at(created_at)
                    .build()?,
            );
        }

        // the stream only comes into existence with its first record
        let stream = data.streams.entry(stream_id.to_string()).or_default();
        data.tail_position += records.len() as u64;
        stream.events.extend(records);

        log::debug!(
            "Appended to '{}', last event number {:?}, tail position {}",
            stream_id,
            stream.last_event_number(),
            data.tail_position
        );
        Ok(stream.last_event_number())
    }

    /// Deletes `stream_id`. Reads of the stream report it as deleted from now on.
    ///
    /// # Errors
    ///
    /// Fails if the stream does not exist.
    pub async fn delete_stream(&self, stream_id: &str) -> Result<(), InMemoryLogError> {
        let mut data = self.data.lock().await;
        let stream = data
            .streams
            .get_mut(stream_id)
            .ok_or_else(|| InMemoryLogError::StreamNotFound(stream_id.to_string()))?;
        stream.deleted = true;
        log::debug!("Deleted stream '{}'", stream_id);
        Ok(())
    }

    /// Makes every read of `stream_id` fail with an access denied result.
    pub async fn deny_access(&self, stream_id: &str) {
        self.data.lock().await.denied.insert(stream_id.to_string());
    }

    /// Position of the last event appended to any stream.
    pub async fn tail_position(&self) -> u64 {
        self.data.lock().await.tail_position
    }
}

#[async_trait]
impl LogReadGateway for InMemoryLog {
    async fn read_forward(&self, request: ReadForward) -> ReadStreamCompleted {
        log::debug!(
            "Reading '{}' forward from {} (max {})",
            request.stream_id,
            request.from_event_number,
            request.max_count
        );
        let data = self.data.lock().await;
        let tail_position = data.tail_position;

        if data.denied.contains(&request.stream_id) {
            return ReadStreamCompleted::failed(
                &request,
                ReadStreamResult::AccessDenied,
                tail_position,
            );
        }
        let Some(stream) = data.streams.get(&request.stream_id) else {
            return ReadStreamCompleted::failed(&request, ReadStreamResult::NoStream, tail_position);
        };
        if stream.deleted {
            let mut response = ReadStreamCompleted::failed(
                &request,
                ReadStreamResult::StreamDeleted,
                tail_position,
            );
            response.last_event_number = stream.last_event_number();
            return response;
        }

        let len = stream.events.len() as u64;
        let start = request.from_event_number.min(len);
        let end = start.saturating_add(u64::from(request.max_count)).min(len);
        let events = stream.events[start as usize..end as usize]
            .iter()
            .map(|record| data.resolve(record, request.resolve_links))
            .collect();

        ReadStreamCompleted::success(
            &request,
            events,
            end.max(request.from_event_number),
            stream.last_event_number(),
            end >= len,
            tail_position,
        )
    }
}
