use std::sync::Arc;
use std::time::Duration;

use tokio_stream::StreamExt;
use tributary::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let log = Arc::new(InMemoryLog::new());
    log.append(
        "orders-1",
        ExpectedVersion::NoStream,
        vec![
            ProposedEvent::new("OrderPlaced", br#"{"total":42}"#.to_vec()).json(),
            ProposedEvent::new("OrderPaid", br#"{"total":42}"#.to_vec()).json(),
        ],
    )
    .await?;

    let config = ReaderConfig {
        max_count: 50,
        backoff: BackoffPolicy::exponential(Duration::from_millis(100), Duration::from_secs(2)),
        ..Default::default()
    };
    let (handle, mut notifications) = spawn_reader(log.clone(), "orders-1", 0, config)?;

    let writer = {
        let log = log.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            log.append(
                "orders-1",
                ExpectedVersion::Exact(1),
                vec![ProposedEvent::new("OrderShipped", br#"{"carrier":"post"}"#.to_vec()).json()],
            )
            .await
        })
    };

    let mut seen = 0;
    while let Some(notification) = notifications.next().await {
        match notification {
            ReaderNotification::Event(event) => {
                seen += 1;
                println!(
                    "#{} {} ({}%) safe to join at {}",
                    event.event_number, event.event_type, event.progress, event.safe_join_position
                );
                if seen == 3 {
                    handle.stop().await?;
                }
            }
            ReaderNotification::Idle {
                safe_join_position,
                at,
                ..
            } => println!("caught up at {} ({})", safe_join_position, at),
            other => println!("{:?}", other),
        }
    }

    writer.await??;
    handle.join().await?;
    Ok(())
}
