//! Kiosk Client - order queue subscriber for the pharmacy kiosk server
//!
//! - [`HttpClient`]: plain fetch of the order endpoints
//! - [`OrderSubscription`]: one live `GET /api/orders/events` stream
//! - [`OrderFeed`]: local order list that merges stream events

pub mod config;
pub mod error;
pub mod feed;
pub mod http;
pub mod sse;
pub mod subscription;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use feed::{HIGHLIGHT_TTL, MergeOutcome, OrderFeed};
pub use http::HttpClient;
pub use sse::SseDecoder;
pub use subscription::{OrderSubscription, SubscriptionEvent};

// Re-export shared types for convenience
pub use shared::order::{OrderDto, OrderEvent, OrderItemDto, OrderItemInput, OrderItemsRequest};
