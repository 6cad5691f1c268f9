use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use tributary_core::prelude::*;

/// A [`ReaderBus`] backed by the tokio runtime.
///
/// Reads are served by a [`LogReadGateway`] on spawned tasks, timers are `tokio::time::sleep`
/// tasks, and both report back by posting a [`ReaderMessage`] to the reader's inbox.
/// Notifications go to an unbounded channel. Must be used from within a tokio runtime.
pub struct TokioReaderBus<G: LogReadGateway> {
    gateway: Arc<G>,
    inbox: UnboundedSender<ReaderMessage>,
    notifications: UnboundedSender<ReaderNotification>,
}

impl<G: LogReadGateway> TokioReaderBus<G> {
    /// Creates a bus that reads through `gateway`, replies on `inbox`, and publishes on
    /// `notifications`.
    pub fn new(
        gateway: Arc<G>,
        inbox: UnboundedSender<ReaderMessage>,
        notifications: UnboundedSender<ReaderNotification>,
    ) -> Self {
        Self {
            gateway,
            inbox,
            notifications,
        }
    }
}

impl<G: LogReadGateway> fmt::Debug for TokioReaderBus<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioReaderBus")
            .field("inbox_closed", &self.inbox.is_closed())
            .field("notifications_closed", &self.notifications.is_closed())
            .finish()
    }
}

impl<G: LogReadGateway + 'static> ReaderBus for TokioReaderBus<G> {
    fn read_forward(&mut self, request: ReadForward) {
        let gateway = self.gateway.clone();
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            let token = request.token;
            let response = gateway.read_forward(request).await;
            if inbox.send(ReaderMessage::ReadCompleted(response)).is_err() {
                log::debug!("Reader is gone, dropping read reply {}", token);
            }
        });
    }

    fn schedule(&mut self, delay: Duration, token: CorrelationToken) -> TimerHandle {
        let inbox = self.inbox.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if inbox.send(ReaderMessage::TimerFired(token)).is_err() {
                log::debug!("Reader is gone, dropping timer tick {}", token);
            }
        });
        let abort = task.abort_handle();
        TimerHandle::with_cancel(token, move || abort.abort())
    }

    fn publish(&mut self, notification: ReaderNotification) {
        if self.notifications.send(notification).is_err() {
            log::debug!("No one is listening, dropping notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit_log::{ExpectedVersion, InMemoryLog, ProposedEvent};
    use tokio::sync::mpsc;

    fn bus(
        log: InMemoryLog,
    ) -> (
        TokioReaderBus<InMemoryLog>,
        mpsc::UnboundedReceiver<ReaderMessage>,
        mpsc::UnboundedReceiver<ReaderNotification>,
    ) {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (notifications_tx, notifications_rx) = mpsc::unbounded_channel();
        (
            TokioReaderBus::new(Arc::new(log), inbox_tx, notifications_tx),
            inbox_rx,
            notifications_rx,
        )
    }

    #[tokio::test]
    async fn read_reply_is_posted_to_the_inbox() {
        let log = InMemoryLog::new();
        log.append("s", ExpectedVersion::Any, vec![ProposedEvent::new("Tick", b"1".to_vec())])
            .await
            .unwrap();
        let (mut bus, mut inbox, _notifications) = bus(log);
        let token = CorrelationToken::new();

        bus.read_forward(ReadForward {
            token,
            stream_id: "s".to_string(),
            from_event_number: 0,
            max_count: 10,
            resolve_links: true,
        });

        match inbox.recv().await {
            Some(ReaderMessage::ReadCompleted(response)) => {
                assert_eq!(response.token, token);
                assert_eq!(response.events.len(), 1);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_after_the_delay() {
        let (mut bus, mut inbox, _notifications) = bus(InMemoryLog::new());
        let token = CorrelationToken::new();
        let started = tokio::time::Instant::now();

        let _handle = bus.schedule(Duration::from_millis(250), token);

        assert_eq!(inbox.recv().await, Some(ReaderMessage::TimerFired(token)));
        assert!(started.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (mut bus, mut inbox, _notifications) = bus(InMemoryLog::new());

        bus.schedule(Duration::from_millis(250), CorrelationToken::new())
            .cancel();
        let kept = CorrelationToken::new();
        let _handle = bus.schedule(Duration::from_secs(1), kept);

        assert_eq!(inbox.recv().await, Some(ReaderMessage::TimerFired(kept)));
    }

    #[tokio::test]
    async fn publish_without_listener_is_dropped() {
        let (mut bus, _inbox, notifications) = bus(InMemoryLog::new());
        drop(notifications);

        bus.publish(ReaderNotification::Faulted {
            reader_id: ReaderId::new(),
            detail: "boom".to_string(),
        });
    }
}
