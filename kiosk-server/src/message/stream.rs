//! Per-connection lifecycle of the order stream
//!
//! OPEN: register, queue `connected`, start the heartbeat task.
//! CLOSED: the client went away (body dropped), a heartbeat write failed,
//! or the bus shut down. Every path ends in the idempotent unregister.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use futures::Stream;
use shared::order::OrderEvent;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{ChannelId, EventBus, EventChannel, MpscChannel};

/// Owned by the response body; closes the connection when dropped
pub struct StreamGuard {
    bus: Arc<EventBus>,
    id: ChannelId,
    heartbeat: CancellationToken,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.heartbeat.cancel();
        if self.bus.unregister(self.id) {
            tracing::info!(channel_id = self.id, "Order stream closed by client");
        }
    }
}

/// Register a new subscriber and return its frame stream
///
/// The stream yields `data:` frames until the subscriber is removed from
/// the bus; dropping it closes the connection.
pub fn open_stream(
    bus: Arc<EventBus>,
    capacity: usize,
    heartbeat_interval: Duration,
) -> (ChannelId, impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static) {
    let (channel, rx) = MpscChannel::bounded(capacity);

    // 注册前先入队 connected, 保证它是第一帧
    match OrderEvent::connected().to_frame() {
        Ok(frame) => {
            if let Err(e) = channel.try_send(Bytes::from(frame)) {
                tracing::warn!(reason = %e, "Failed to queue connected event");
            }
        }
        Err(e) => tracing::error!(error = %e, "Failed to serialize connected event"),
    }
    let id = bus.register(Arc::new(channel));

    let heartbeat = bus.shutdown_token().child_token();
    tokio::spawn(run_heartbeat(
        bus.clone(),
        id,
        heartbeat_interval,
        heartbeat.clone(),
    ));

    tracing::info!(
        channel_id = id,
        subscribers = bus.subscriber_count(),
        "Order stream opened"
    );

    let guard = StreamGuard { bus, id, heartbeat };
    let stream = futures::stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let frame = rx.recv().await;
        frame.map(|frame| (Ok::<_, Infallible>(frame), (rx, guard)))
    });

    (id, stream)
}

async fn run_heartbeat(
    bus: Arc<EventBus>,
    id: ChannelId,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let event = OrderEvent::heartbeat(shared::util::now_millis());
                if let Err(e) = bus.send_to(id, &event) {
                    // send_to 已移除该订阅者
                    tracing::debug!(channel_id = id, reason = %e, "Heartbeat failed, closing stream");
                    token.cancel();
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn parse(frame: &Bytes) -> OrderEvent {
        let text = std::str::from_utf8(frame).unwrap();
        let json = text
            .strip_prefix("data: ")
            .and_then(|s| s.strip_suffix("\n\n"))
            .unwrap();
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_connected_then_heartbeats() {
        let bus = Arc::new(EventBus::new());
        let (id, stream) = open_stream(bus.clone(), 8, Duration::from_secs(30));
        let mut stream = Box::pin(stream);
        assert!(bus.is_registered(id));

        let first = stream.next().await.unwrap().unwrap();
        assert!(matches!(parse(&first), OrderEvent::Connected { .. }));

        // Paused clock auto-advances to the next tick
        let second = stream.next().await.unwrap().unwrap();
        assert!(matches!(parse(&second), OrderEvent::Heartbeat { .. }));
        let third = stream.next().await.unwrap().unwrap();
        assert!(matches!(parse(&third), OrderEvent::Heartbeat { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_unregisters_and_stops_heartbeat() {
        let bus = Arc::new(EventBus::new());
        let (id, stream) = open_stream(bus.clone(), 8, Duration::from_secs(30));
        assert_eq!(bus.subscriber_count(), 1);

        drop(stream);
        assert!(!bus.is_registered(id));

        // Heartbeat task exits without re-registering anything
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_reader_is_disconnected_on_overflow() {
        let bus = Arc::new(EventBus::new());
        // connected 帧占满唯一的槽位
        let (id, stream) = open_stream(bus.clone(), 1, Duration::from_secs(30));
        let mut stream = Box::pin(stream);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(!bus.is_registered(id));

        // Queued frame still drains, then the stream ends
        let first = stream.next().await.unwrap().unwrap();
        assert!(matches!(parse(&first), OrderEvent::Connected { .. }));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_published_event_arrives_in_order() {
        let bus = Arc::new(EventBus::new());
        let (_id, stream) = open_stream(bus.clone(), 8, Duration::from_secs(30));
        let mut stream = Box::pin(stream);

        let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        for order_id in 1..=3 {
            bus.publish(&OrderEvent::OrderFulfilled {
                order_id,
                order_number: format!("24153{:03}", order_id),
                date,
            });
        }

        let _connected = stream.next().await.unwrap().unwrap();
        for expected in 1..=3 {
            let frame = stream.next().await.unwrap().unwrap();
            assert_eq!(parse(&frame).order_id(), Some(expected));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_connected_is_first_under_concurrent_publish() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let bus = Arc::new(EventBus::new());
        let stop = Arc::new(AtomicBool::new(false));
        let publisher = {
            let bus = bus.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
                let mut order_id = 0;
                while !stop.load(Ordering::Relaxed) {
                    order_id += 1;
                    bus.publish(&OrderEvent::OrderFulfilled {
                        order_id,
                        order_number: "24153001".to_string(),
                        date,
                    });
                }
            })
        };

        for _ in 0..500 {
            let (_id, stream) = open_stream(bus.clone(), 4, Duration::from_secs(30));
            let mut stream = Box::pin(stream);
            let first = stream.next().await.unwrap().unwrap();
            assert!(matches!(parse(&first), OrderEvent::Connected { .. }));
        }

        stop.store(true, Ordering::Relaxed);
        publisher.join().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_ends_stream() {
        let bus = Arc::new(EventBus::new());
        let (_id, stream) = open_stream(bus.clone(), 8, Duration::from_secs(30));
        let mut stream = Box::pin(stream);
        let _connected = stream.next().await.unwrap().unwrap();

        bus.shutdown();
        assert!(stream.next().await.is_none());
    }
}
