//! The stream event reader.
//!
//! [`StreamEventReader`] pages forward through one stream and republishes every event it reads,
//! in order, through its [`ReaderBus`]. It is a plain state machine: every method runs to
//! completion without blocking, and the only things it waits on are the single read or timer it
//! has outstanding, whose replies come back as [`ReaderMessage`]s.
//!
//! ```text
//!            start            pause
//! Starting ---------> Reading -------> Paused
//!                      ^  |  <-------
//!                      |  |   resume
//!       next read /    |  |
//!       timer tick ----+  +---> Stopped  (stop, stream deleted, eof with stop_on_eof)
//!                         +---> Faulted  (unreadable stream or malformed reply)
//! ```

use crate::bus::{ReaderBus, TimerHandle};
use crate::classify::{ReadClassification, classify};
use crate::config::ReaderConfig;
use crate::error::ReaderError;
use crate::event::ResolvedEvent;
use crate::message::{ReadForward, ReadStreamCompleted, ReaderMessage};
use crate::notification::{
    ReaderNotification, deleted_notification, eof_notification, event_notification,
    faulted_notification, idle_notification,
};
use crate::token::{CorrelationToken, ReaderId};
use log::{debug, error, info, warn};
use std::mem;

/// Lifecycle state of a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Created but not started yet.
    Starting,
    /// Started, then paused by its owner.
    Paused,
    /// Reading, or waiting to read again after a delay.
    Reading,
    /// Stopped for good, either by its owner or because the stream was deleted.
    Stopped,
    /// Stopped for good after an unrecoverable error.
    Faulted,
}

impl ReaderState {
    /// Whether the reader will never act again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReaderState::Stopped | ReaderState::Faulted)
    }
}

/// Where the next read starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCursor {
    /// The stream being read.
    pub stream_id: String,
    /// Event number the next read starts from.
    pub next_event_number: u64,
    /// Page size.
    pub max_count: u32,
}

/// The one thing a reader can be waiting for.
#[derive(Debug)]
enum Outstanding {
    Nothing,
    Read(CorrelationToken),
    Timer(TimerHandle),
}

/// Reads one stream forward and republishes its events in order.
#[derive(Debug)]
pub struct StreamEventReader<B: ReaderBus> {
    reader_id: ReaderId,
    cursor: ReadCursor,
    config: ReaderConfig,
    state: ReaderState,
    outstanding: Outstanding,
    safe_join_position: u64,
    last_delivered: Option<u64>,
    unproductive_reads: u32,
    bus: B,
}

impl<B: ReaderBus> StreamEventReader<B> {
    /// Creates a reader for `stream_id` with a fresh reader id.
    pub fn new(stream_id: impl Into<String>, config: ReaderConfig, bus: B) -> Self {
        Self::with_reader_id(ReaderId::new(), stream_id, config, bus)
    }

    /// Creates a reader for `stream_id` identified by `reader_id`.
    pub fn with_reader_id(
        reader_id: ReaderId,
        stream_id: impl Into<String>,
        config: ReaderConfig,
        bus: B,
    ) -> Self {
        let cursor = ReadCursor {
            stream_id: stream_id.into(),
            next_event_number: 0,
            max_count: config.max_count,
        };
        Self {
            reader_id,
            cursor,
            config,
            state: ReaderState::Starting,
            outstanding: Outstanding::Nothing,
            safe_join_position: 0,
            last_delivered: None,
            unproductive_reads: 0,
            bus,
        }
    }

    /// The id stamped on every notification of this reader.
    pub fn reader_id(&self) -> ReaderId {
        self.reader_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Current read cursor.
    pub fn cursor(&self) -> &ReadCursor {
        &self.cursor
    }

    /// Highest safe join position published so far.
    pub fn safe_join_position(&self) -> u64 {
        self.safe_join_position
    }

    /// Event number of the last event published, if any.
    pub fn last_delivered(&self) -> Option<u64> {
        self.last_delivered
    }

    /// The bus this reader talks through.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutable access to the bus.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Disposes of the reader, cancelling any pending timer, and returns its bus.
    pub fn into_bus(self) -> B {
        if let Outstanding::Timer(handle) = self.outstanding {
            handle.cancel();
        }
        self.bus
    }

    /// Starts reading from `from_event_number`.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::AlreadyStarted`] unless the reader is still in
    /// [`ReaderState::Starting`].
    pub fn start(&mut self, from_event_number: u64) -> Result<(), ReaderError> {
        if self.state != ReaderState::Starting {
            return Err(ReaderError::AlreadyStarted(self.cursor.stream_id.clone()));
        }
        info!(
            "{} starting on '{}' from event {}",
            self.reader_id, self.cursor.stream_id, from_event_number
        );
        self.cursor.next_event_number = from_event_number;
        self.state = ReaderState::Reading;
        self.request_read();
        Ok(())
    }

    /// Stops reading until resumed. The reply to a read already in flight will be ignored, and a
    /// pending delay is cancelled.
    ///
    /// Pausing a reader that is not reading does nothing.
    pub fn pause(&mut self) {
        if self.state != ReaderState::Reading {
            debug!("{} ignoring pause while {:?}", self.reader_id, self.state);
            return;
        }
        self.abandon_outstanding();
        self.state = ReaderState::Paused;
        debug!(
            "{} paused at event {}",
            self.reader_id, self.cursor.next_event_number
        );
    }

    /// Continues reading from the cursor after a pause, with a fresh read.
    ///
    /// Resuming a stopped or faulted reader does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::NotStarted`] if the reader was never started and
    /// [`ReaderError::NotPaused`] if it is already reading.
    pub fn resume(&mut self) -> Result<(), ReaderError> {
        if !self.ensure_resumable()? {
            return Ok(());
        }
        self.state = ReaderState::Reading;
        debug!(
            "{} resumed at event {}",
            self.reader_id, self.cursor.next_event_number
        );
        self.request_read();
        Ok(())
    }

    /// Like [`resume`](Self::resume), but repositions the cursor to `event_number` first.
    ///
    /// # Errors
    ///
    /// Same as [`resume`](Self::resume).
    pub fn resume_from(&mut self, event_number: u64) -> Result<(), ReaderError> {
        if !self.ensure_resumable()? {
            return Ok(());
        }
        info!(
            "{} repositioned on '{}' from event {} to {}",
            self.reader_id, self.cursor.stream_id, self.cursor.next_event_number, event_number
        );
        self.cursor.next_event_number = event_number;
        self.last_delivered = event_number.checked_sub(1);
        self.unproductive_reads = 0;
        self.resume()
    }

    /// Stops the reader for good. Nothing is published.
    pub fn stop(&mut self) {
        if self.state.is_terminal() {
            debug!("{} already {:?}", self.reader_id, self.state);
            return;
        }
        self.abandon_outstanding();
        self.state = ReaderState::Stopped;
        info!("{} stopped on '{}'", self.reader_id, self.cursor.stream_id);
    }

    /// Dispatches one inbound message.
    ///
    /// # Errors
    ///
    /// Only [`ReaderMessage::Resume`] can fail; see [`resume`](Self::resume).
    pub fn handle(&mut self, message: ReaderMessage) -> Result<(), ReaderError> {
        match message {
            ReaderMessage::ReadCompleted(response) => self.handle_read_completed(response),
            ReaderMessage::TimerFired(token) => self.handle_timer_fired(token),
            ReaderMessage::Pause => self.pause(),
            ReaderMessage::Resume => return self.resume(),
            ReaderMessage::Stop => self.stop(),
        }
        Ok(())
    }

    /// Acts on the reply to the outstanding read. Replies to any other request are dropped.
    pub fn handle_read_completed(&mut self, response: ReadStreamCompleted) {
        if self.state != ReaderState::Reading {
            debug!(
                "{} dropping read reply {} while {:?}",
                self.reader_id, response.token, self.state
            );
            return;
        }
        match self.outstanding {
            Outstanding::Read(token) if token == response.token => {}
            _ => {
                debug!(
                    "{} dropping stale read reply {}",
                    self.reader_id, response.token
                );
                return;
            }
        }
        self.outstanding = Outstanding::Nothing;

        match classify(&response) {
            ReadClassification::Batch {
                events,
                continue_immediately,
            } => {
                let delivered = !events.is_empty();
                if !self.deliver(&events, response.last_event_number) {
                    return;
                }
                self.cursor.next_event_number = response.next_event_number;
                if delivered {
                    self.unproductive_reads = 0;
                }
                if continue_immediately {
                    self.request_read();
                } else {
                    debug!(
                        "{} made no progress on '{}' at event {}, backing off",
                        self.reader_id, self.cursor.stream_id, self.cursor.next_event_number
                    );
                    self.schedule_read();
                }
            }
            ReadClassification::Idle { tail_position } => {
                self.cursor.next_event_number = response.next_event_number;
                self.caught_up(tail_position);
            }
            ReadClassification::NotFound { tail_position } => {
                debug!(
                    "{} stream '{}' does not exist yet",
                    self.reader_id, self.cursor.stream_id
                );
                self.caught_up(tail_position);
            }
            ReadClassification::Deleted { last_event_number } => {
                info!(
                    "{} stream '{}' was deleted",
                    self.reader_id, self.cursor.stream_id
                );
                self.bus.publish(deleted_notification(
                    self.reader_id,
                    &self.cursor.stream_id,
                    last_event_number.or(self.last_delivered),
                    self.safe_join_position,
                ));
                self.state = ReaderState::Stopped;
            }
            ReadClassification::Error(detail) => self.fault(detail),
        }
    }

    /// Issues the next read when the outstanding delay elapses. Other ticks are dropped.
    pub fn handle_timer_fired(&mut self, token: CorrelationToken) {
        if self.state != ReaderState::Reading {
            debug!(
                "{} dropping timer tick {} while {:?}",
                self.reader_id, token, self.state
            );
            return;
        }
        match &self.outstanding {
            Outstanding::Timer(handle) if handle.token() == token => {}
            _ => {
                debug!("{} dropping stale timer tick {}", self.reader_id, token);
                return;
            }
        }
        self.outstanding = Outstanding::Nothing;
        self.request_read();
    }

    /// Publishes one notification per event. Returns `false` if the page would repeat or rewind
    /// already delivered events, in which case the reader has faulted.
    ///
    /// A page may start above the cursor: event numbers removed by truncation or scavenging are
    /// simply absent from the log, so only gaps inside a page (rejected by `classify`) and
    /// repeats are faults.
    fn deliver(&mut self, events: &[ResolvedEvent], last_event_number: Option<u64>) -> bool {
        if let (Some(first), Some(last)) = (events.first(), self.last_delivered) {
            let number = first.original_event_number();
            if number <= last {
                self.fault(format!(
                    "event {} of '{}' was already delivered (last delivered {})",
                    number, self.cursor.stream_id, last
                ));
                return false;
            }
        }

        for event in events {
            let notification = event_notification(
                self.reader_id,
                event,
                self.safe_join_position,
                last_event_number,
            );
            if notification.safe_join_position > notification.position.ordering_position() {
                warn!(
                    "{} event {} of '{}' is positioned at {} below safe join position {}",
                    self.reader_id,
                    notification.event_number,
                    self.cursor.stream_id,
                    notification.position.ordering_position(),
                    self.safe_join_position
                );
            }
            self.safe_join_position = notification.safe_join_position;
            self.last_delivered = Some(notification.event_number);
            self.bus.publish(ReaderNotification::Event(notification));
        }
        true
    }

    fn caught_up(&mut self, tail_position: u64) {
        if self.config.stop_on_eof {
            let notification =
                eof_notification(self.reader_id, tail_position, self.safe_join_position);
            self.advance_safe_join(&notification);
            self.bus.publish(notification);
            self.state = ReaderState::Stopped;
            info!(
                "{} reached the end of '{}' and stopped",
                self.reader_id, self.cursor.stream_id
            );
            return;
        }

        let notification = idle_notification(
            self.reader_id,
            tail_position,
            self.safe_join_position,
            self.bus.now(),
        );
        self.advance_safe_join(&notification);
        self.bus.publish(notification);
        self.schedule_read();
    }

    fn advance_safe_join(&mut self, notification: &ReaderNotification) {
        if let Some(position) = notification.safe_join_position() {
            self.safe_join_position = self.safe_join_position.max(position);
        }
    }

    fn fault(&mut self, detail: String) {
        error!("{} faulted: {}", self.reader_id, detail);
        self.abandon_outstanding();
        self.bus
            .publish(faulted_notification(self.reader_id, detail));
        self.state = ReaderState::Faulted;
    }

    /// `Ok(true)` if the reader is paused, `Ok(false)` if it is terminal.
    fn ensure_resumable(&self) -> Result<bool, ReaderError> {
        match self.state {
            ReaderState::Paused => Ok(true),
            ReaderState::Starting => Err(ReaderError::NotStarted(self.cursor.stream_id.clone())),
            ReaderState::Reading => Err(ReaderError::NotPaused(self.cursor.stream_id.clone())),
            ReaderState::Stopped | ReaderState::Faulted => {
                debug!("{} ignoring resume while {:?}", self.reader_id, self.state);
                Ok(false)
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.state == ReaderState::Reading && matches!(self.outstanding, Outstanding::Nothing)
    }

    fn request_read(&mut self) {
        if !self.is_idle() {
            warn!(
                "{} refusing to read '{}' while {:?} with {:?} outstanding",
                self.reader_id, self.cursor.stream_id, self.state, self.outstanding
            );
            return;
        }
        let token = CorrelationToken::new();
        self.outstanding = Outstanding::Read(token);
        debug!(
            "{} reading '{}' from event {} ({})",
            self.reader_id, self.cursor.stream_id, self.cursor.next_event_number, token
        );
        self.bus.read_forward(ReadForward {
            token,
            stream_id: self.cursor.stream_id.clone(),
            from_event_number: self.cursor.next_event_number,
            max_count: self.cursor.max_count,
            resolve_links: self.config.resolve_links,
        });
    }

    fn schedule_read(&mut self) {
        if !self.is_idle() {
            warn!(
                "{} refusing to schedule a read while {:?} with {:?} outstanding",
                self.reader_id, self.state, self.outstanding
            );
            return;
        }
        let delay = self.config.backoff.delay(self.unproductive_reads);
        self.unproductive_reads = self.unproductive_reads.saturating_add(1);
        let token = CorrelationToken::new();
        debug!(
            "{} reading '{}' again in {:?} ({})",
            self.reader_id, self.cursor.stream_id, delay, token
        );
        let handle = self.bus.schedule(delay, token);
        self.outstanding = Outstanding::Timer(handle);
    }

    fn abandon_outstanding(&mut self) {
        if let Outstanding::Timer(handle) = mem::replace(&mut self.outstanding, Outstanding::Nothing)
        {
            handle.cancel();
        }
    }
}
