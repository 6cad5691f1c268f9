use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tributary_core::prelude::*;
use tributary_mem::{
    ExpectedVersion, InMemoryLog, NotificationStream, ProposedEvent, ReaderHandle,
    ReaderHandleError, spawn_reader,
};

fn setup() -> Arc<InMemoryLog> {
    let _ = env_logger::builder().is_test(true).try_init();
    Arc::new(InMemoryLog::new())
}

fn ticks(count: usize) -> Vec<ProposedEvent> {
    (0..count)
        .map(|i| ProposedEvent::new("Tick", vec![i as u8]))
        .collect()
}

fn spawn(
    log: &Arc<InMemoryLog>,
    stream_id: &str,
    config: ReaderConfig,
) -> (ReaderHandle, NotificationStream) {
    spawn_reader(log.clone(), stream_id, 0, config).unwrap()
}

async fn next_notification(notifications: &mut NotificationStream) -> Option<ReaderNotification> {
    tokio::time::timeout(Duration::from_secs(10), notifications.next())
        .await
        .expect("Timed out waiting for a notification")
}

/// Next notification that is not an idle notification.
async fn next_active(notifications: &mut NotificationStream) -> Option<ReaderNotification> {
    loop {
        match next_notification(notifications).await {
            Some(ReaderNotification::Idle { .. }) => continue,
            other => return other,
        }
    }
}

async fn next_event(notifications: &mut NotificationStream) -> DistributedEvent {
    match next_active(notifications).await {
        Some(ReaderNotification::Event(event)) => event,
        other => panic!("Expected an event, got {:?}", other),
    }
}

async fn next_idle(notifications: &mut NotificationStream) -> u64 {
    match next_notification(notifications).await {
        Some(ReaderNotification::Idle {
            safe_join_position, ..
        }) => safe_join_position,
        other => panic!("Expected an idle notification, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn tails_a_stream_and_picks_up_new_events() {
    let log = setup();
    log.append("s", ExpectedVersion::NoStream, ticks(3))
        .await
        .unwrap();
    let (_handle, mut notifications) = spawn(
        &log,
        "s",
        ReaderConfig {
            max_count: 2,
            ..Default::default()
        },
    );

    for expected in 0..3 {
        let event = next_event(&mut notifications).await;
        assert_eq!(event.event_number, expected);
        assert_eq!(event.data, vec![expected as u8]);
        assert_eq!(event.safe_join_position, expected + 1);
    }
    assert_eq!(next_idle(&mut notifications).await, 3);

    log.append("other", ExpectedVersion::Any, ticks(1))
        .await
        .unwrap();
    log.append("s", ExpectedVersion::Exact(2), ticks(2))
        .await
        .unwrap();

    let event = next_event(&mut notifications).await;
    assert_eq!(event.event_number, 3);
    assert_eq!(event.position, LogPosition::new(5, 5));
    assert_eq!(next_event(&mut notifications).await.event_number, 4);
    assert_eq!(next_idle(&mut notifications).await, 6);
}

#[tokio::test(start_paused = true)]
async fn paused_reader_publishes_nothing_until_resumed() {
    let log = setup();
    log.append("s", ExpectedVersion::Any, ticks(1))
        .await
        .unwrap();
    let (handle, mut notifications) = spawn(&log, "s", ReaderConfig::default());
    assert_eq!(next_event(&mut notifications).await.event_number, 0);
    next_idle(&mut notifications).await;

    assert_eq!(handle.pause().await.unwrap(), ReaderState::Paused);
    assert_eq!(handle.pause().await.unwrap(), ReaderState::Paused);
    log.append("s", ExpectedVersion::Any, ticks(1))
        .await
        .unwrap();

    let quiet = tokio::time::timeout(Duration::from_secs(5), next_active(&mut notifications)).await;
    assert!(quiet.is_err(), "Paused reader published {:?}", quiet);

    assert_eq!(handle.resume().await.unwrap(), ReaderState::Reading);
    assert_eq!(next_event(&mut notifications).await.event_number, 1);
}

#[tokio::test(start_paused = true)]
async fn resume_from_replays_from_the_given_event() {
    let log = setup();
    log.append("s", ExpectedVersion::Any, ticks(3))
        .await
        .unwrap();
    let (handle, mut notifications) = spawn(&log, "s", ReaderConfig::default());
    for _ in 0..3 {
        next_event(&mut notifications).await;
    }

    assert!(matches!(
        handle.resume_from(1).await,
        Err(ReaderHandleError::Reader(ReaderError::NotPaused(_)))
    ));
    handle.pause().await.unwrap();
    handle.resume_from(1).await.unwrap();

    assert_eq!(next_event(&mut notifications).await.event_number, 1);
    assert_eq!(next_event(&mut notifications).await.event_number, 2);
}

#[tokio::test(start_paused = true)]
async fn deleted_stream_ends_the_notifications() {
    let log = setup();
    log.append("s", ExpectedVersion::Any, ticks(2))
        .await
        .unwrap();
    let (handle, mut notifications) = spawn(&log, "s", ReaderConfig::default());
    next_event(&mut notifications).await;
    next_event(&mut notifications).await;

    log.delete_stream("s").await.unwrap();

    match next_active(&mut notifications).await {
        Some(ReaderNotification::Deleted {
            stream_id,
            last_event_number,
            safe_join_position,
            ..
        }) => {
            assert_eq!(stream_id, "s");
            assert_eq!(last_event_number, Some(1));
            assert_eq!(safe_join_position, 2);
        }
        other => panic!("Expected a deleted notification, got {:?}", other),
    }
    assert_eq!(next_notification(&mut notifications).await, None);
    handle.join().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_on_eof_reads_to_the_end_and_stops() {
    let log = setup();
    log.append("s", ExpectedVersion::Any, ticks(2))
        .await
        .unwrap();
    let (handle, mut notifications) = spawn(
        &log,
        "s",
        ReaderConfig {
            stop_on_eof: true,
            ..Default::default()
        },
    );

    next_event(&mut notifications).await;
    next_event(&mut notifications).await;
    assert!(matches!(
        next_notification(&mut notifications).await,
        Some(ReaderNotification::Eof {
            safe_join_position: 2,
            ..
        })
    ));
    assert_eq!(next_notification(&mut notifications).await, None);
    assert!(matches!(
        handle.state().await,
        Err(ReaderHandleError::Disconnected(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn missing_stream_is_read_once_created() {
    let log = setup();
    log.append("elsewhere", ExpectedVersion::Any, ticks(4))
        .await
        .unwrap();
    let (_handle, mut notifications) = spawn(&log, "s", ReaderConfig::default());

    assert_eq!(next_idle(&mut notifications).await, 4);

    log.append("s", ExpectedVersion::NoStream, ticks(1))
        .await
        .unwrap();
    let event = next_event(&mut notifications).await;
    assert_eq!(event.event_number, 0);
    assert_eq!(event.safe_join_position, 5);
}

#[tokio::test]
async fn access_denied_faults_the_reader() {
    let log = setup();
    log.append("s", ExpectedVersion::Any, ticks(1))
        .await
        .unwrap();
    log.deny_access("s").await;
    let (handle, mut notifications) = spawn(&log, "s", ReaderConfig::default());

    assert!(matches!(
        next_notification(&mut notifications).await,
        Some(ReaderNotification::Faulted { detail, .. }) if detail.contains("access denied")
    ));
    assert_eq!(next_notification(&mut notifications).await, None);
    handle.join().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn linked_events_carry_their_target() {
    let log = setup();
    log.append("orders-1", ExpectedVersion::Any, ticks(2))
        .await
        .unwrap();
    log.append(
        "all-orders",
        ExpectedVersion::Any,
        vec![ProposedEvent::link_to("orders-1", 1)],
    )
    .await
    .unwrap();
    let (_handle, mut notifications) = spawn(&log, "all-orders", ReaderConfig::default());

    let event = next_event(&mut notifications).await;
    assert_eq!(event.stream_id, "all-orders");
    assert_eq!(event.event_number, 0);
    assert_eq!(event.data, vec![1]);
    assert_eq!(
        event.target,
        Some(EventTarget {
            stream_id: "orders-1".to_string(),
            event_number: 1,
        })
    );
    assert_eq!(event.safe_join_position, 3);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_the_reader() {
    let log = setup();
    let (handle, mut notifications) = spawn(&log, "s", ReaderConfig::default());
    next_idle(&mut notifications).await;

    drop(handle);

    assert_eq!(next_active(&mut notifications).await, None);
}

#[tokio::test(start_paused = true)]
async fn readers_of_different_streams_run_independently() {
    let log = setup();
    log.append("a", ExpectedVersion::Any, ticks(2))
        .await
        .unwrap();
    log.append("b", ExpectedVersion::Any, ticks(1))
        .await
        .unwrap();
    let (a, mut a_notifications) = spawn(&log, "a", ReaderConfig::default());
    let (b, mut b_notifications) = spawn(&log, "b", ReaderConfig::default());
    assert_ne!(a.reader_id(), b.reader_id());

    let first = next_event(&mut a_notifications).await;
    let second = next_event(&mut a_notifications).await;
    let only = next_event(&mut b_notifications).await;

    assert_eq!(first.reader_id, a.reader_id());
    assert_eq!(only.reader_id, b.reader_id());
    assert_eq!(
        [first.safe_join_position, second.safe_join_position, only.safe_join_position],
        [1, 2, 3]
    );

    b.stop().await.unwrap();
    assert_eq!(next_active(&mut b_notifications).await, None);
    assert_eq!(a.state().await.unwrap(), ReaderState::Reading);
}
