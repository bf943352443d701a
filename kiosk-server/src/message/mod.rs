//! Order event fan-out
//!
//! ```text
//! ┌──────────────┐  publish()   ┌──────────────────────────────┐
//! │ OrderService │ ───────────▶ │ EventBus                     │
//! └──────────────┘              │  DashMap<ChannelId, channel> │
//!                               └──────────────┬───────────────┘
//!                                              │ try_send(frame)
//!                          ┌───────────────────┼───────────────────┐
//!                          ▼                   ▼                   ▼
//!                    MpscChannel         MpscChannel         MpscChannel
//!                          │                   │                   │
//!                     SSE body            SSE body            SSE body
//! ```
//!
//! Each subscriber owns a bounded FIFO queue. A full or closed queue is a
//! write failure and removes the subscriber.

pub mod bus;
pub mod channel;
pub mod stream;

use axum::body::Bytes;
use thiserror::Error;

pub use bus::{EventBus, PublishReport};
pub use channel::MpscChannel;
pub use stream::{StreamGuard, open_stream};

/// Registry key of one subscriber
pub type ChannelId = u64;

/// Why a frame could not be queued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Outstanding frames reached the channel bound
    #[error("channel is full")]
    Full,
    /// Receiving side is gone
    #[error("channel is closed")]
    Closed,
}

/// Write side of one subscriber connection
///
/// `try_send` must not wait for the subscriber.
pub trait EventChannel: Send + Sync {
    fn try_send(&self, frame: Bytes) -> Result<(), ChannelError>;
}
