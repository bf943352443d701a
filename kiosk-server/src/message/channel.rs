//! Bounded mpsc channel backing one stream connection

use axum::body::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::{ChannelError, EventChannel};

/// Sender half registered with the [`EventBus`](super::EventBus)
#[derive(Debug, Clone)]
pub struct MpscChannel {
    tx: mpsc::Sender<Bytes>,
}

impl MpscChannel {
    /// Create a channel holding at most `capacity` unsent frames
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl EventChannel for MpscChannel {
    fn try_send(&self, frame: Bytes) -> Result<(), ChannelError> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => ChannelError::Full,
            TrySendError::Closed(_) => ChannelError::Closed,
        })
    }
}
