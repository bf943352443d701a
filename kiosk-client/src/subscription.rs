//! Live order stream subscription
//!
//! One background task owns the `GET /api/orders/events` response and
//! forwards decoded events over an mpsc channel, so the owner consumes
//! them from a single place. The task never reconnects: after `Closed`
//! the owner decides whether to open a new subscription.

use chrono::NaiveDate;
use futures::StreamExt;
use reqwest::Client;
use shared::order::OrderEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::sse::SseDecoder;
use crate::{ClientConfig, ClientResult};

const EVENT_BUFFER: usize = 64;

/// What the subscription task reports to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// Server accepted the stream
    Opened,
    /// One decoded frame (liveness frames included)
    Event(OrderEvent),
    /// Stream is over; `reason` is `None` when the server ended it cleanly
    Closed { reason: Option<String> },
}

/// Handle to one open event stream
#[derive(Debug)]
pub struct OrderSubscription {
    date: NaiveDate,
    rx: mpsc::Receiver<SubscriptionEvent>,
    task: JoinHandle<()>,
}

impl OrderSubscription {
    /// Open the stream for the view showing `date`
    ///
    /// Must be called inside a tokio runtime. The date is not sent to the
    /// server: every subscriber receives every event and filtering happens
    /// in [`crate::OrderFeed`].
    pub fn open(config: &ClientConfig, date: NaiveDate) -> ClientResult<Self> {
        // No total timeout: it would cut the stream
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;
        let url = config.url("/api/orders/events");
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        tracing::debug!(%url, %date, "Opening order stream");
        let task = tokio::spawn(run_stream(client, url, tx));

        Ok(Self { date, rx, task })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Next event; `None` once the task is gone and everything was received
    pub async fn next(&mut self) -> Option<SubscriptionEvent> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`Self::next`]
    pub fn try_next(&mut self) -> Option<SubscriptionEvent> {
        self.rx.try_recv().ok()
    }

    /// Abort the stream task, which drops the connection
    pub fn close(self) {
        self.task.abort();
    }
}

impl Drop for OrderSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_stream(client: Client, url: String, tx: mpsc::Sender<SubscriptionEvent>) {
    let response = match client
        .get(&url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            let reason = format!("unexpected status {}", response.status());
            tracing::warn!(%url, %reason, "Order stream rejected");
            let _ = tx.send(SubscriptionEvent::Closed { reason: Some(reason) }).await;
            return;
        }
        Err(e) => {
            tracing::warn!(%url, error = %e, "Order stream connect failed");
            let _ = tx
                .send(SubscriptionEvent::Closed {
                    reason: Some(e.to_string()),
                })
                .await;
            return;
        }
    };

    if tx.send(SubscriptionEvent::Opened).await.is_err() {
        return;
    }

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();
    let reason = loop {
        match body.next().await {
            Some(Ok(chunk)) => {
                for payload in decoder.feed(&chunk) {
                    match serde_json::from_str::<OrderEvent>(&payload) {
                        Ok(event) => {
                            if tx.send(SubscriptionEvent::Event(event)).await.is_err() {
                                // 接收端已关闭
                                return;
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "Skipping undecodable frame"),
                    }
                }
            }
            Some(Err(e)) => break Some(e.to_string()),
            None => break None,
        }
    };

    tracing::info!(reason = ?reason, "Order stream closed");
    let _ = tx.send(SubscriptionEvent::Closed { reason }).await;
}
