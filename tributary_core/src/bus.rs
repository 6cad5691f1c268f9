//! This module defines the seams between a reader and the outside world: the `ReaderBus` through
//! which a reader issues reads, schedules delays and publishes notifications, the `TimerHandle`
//! returned for every scheduled delay, and the asynchronous `LogReadGateway` that serves reads.

use crate::message::{ReadForward, ReadStreamCompleted};
use crate::notification::ReaderNotification;
use crate::token::CorrelationToken;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Outbound side of a reader.
///
/// Every method is fire-and-forget: replies to `read_forward` and `schedule` come back to the
/// reader later as [`ReaderMessage`](crate::message::ReaderMessage)s carrying the same token.
pub trait ReaderBus {
    /// Requests a page of events.
    fn read_forward(&mut self, request: ReadForward);

    /// Requests a `TimerFired(token)` message after `delay`.
    fn schedule(&mut self, delay: Duration, token: CorrelationToken) -> TimerHandle;

    /// Hands a notification to the consumer.
    fn publish(&mut self, notification: ReaderNotification);

    /// Current time, used to stamp idle notifications.
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A scheduled delay.
///
/// Dropping the handle leaves the timer running; the tick is then ignored by token. Calling
/// [`cancel`](Self::cancel) stops the tick from being delivered at all, when the timer service
/// supports it.
pub struct TimerHandle {
    token: CorrelationToken,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    /// A handle for a timer that cannot be cancelled.
    pub fn detached(token: CorrelationToken) -> Self {
        Self {
            token,
            cancel: None,
        }
    }

    /// A handle that runs `cancel` when the timer is cancelled.
    pub fn with_cancel(token: CorrelationToken, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            token,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// The token the tick will carry.
    pub fn token(&self) -> CorrelationToken {
        self.token
    }

    /// Cancels the timer.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("token", &self.token)
            .field("cancel", &self.cancel.as_ref().map(|_| "Some(<cancel>)"))
            .finish()
    }
}

/// Serves bounded forward reads of a stream.
///
/// Implementations are expected to have already authorised the read.
#[async_trait]
pub trait LogReadGateway: Send + Sync {
    /// Reads one page. Failures are reported through
    /// [`ReadStreamResult`](crate::message::ReadStreamResult), never as a panic.
    async fn read_forward(&self, request: ReadForward) -> ReadStreamCompleted;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn cancel_runs_the_callback_once() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let token = CorrelationToken::new();
        let handle = TimerHandle::with_cancel(token, move || flag.store(true, Ordering::SeqCst));
        assert_eq!(handle.token(), token);
        handle.cancel();
        assert!(cancelled.load(Ordering::SeqCst));
    }

    struct EmptyLog {
        tail_position: u64,
    }

    #[async_trait]
    impl LogReadGateway for EmptyLog {
        async fn read_forward(&self, request: ReadForward) -> ReadStreamCompleted {
            ReadStreamCompleted::success(
                &request,
                Vec::new(),
                request.from_event_number,
                None,
                true,
                self.tail_position,
            )
        }
    }

    #[tokio::test]
    async fn gateway_replies_carry_the_request_token() {
        let gateway: Box<dyn LogReadGateway> = Box::new(EmptyLog { tail_position: 400 });
        let request = ReadForward {
            token: CorrelationToken::new(),
            stream_id: "stream".to_string(),
            from_event_number: 12,
            max_count: 10,
            resolve_links: true,
        };

        let response = gateway.read_forward(request.clone()).await;

        assert_eq!(response.token, request.token);
        assert_eq!(response.from_event_number, 12);
        assert_eq!(response.next_event_number, 12);
        assert_eq!(response.tail_position, 400);
        assert!(response.is_end_of_stream);
    }

    #[test]
    fn detached_handle_cancels_quietly() {
        let handle = TimerHandle::detached(CorrelationToken::new());
        assert!(format!("{handle:?}").contains("None"));
        handle.cancel();
    }
}
