//! Shared types for the pharmacy kiosk
//!
//! Error codes and response envelopes, order wire contracts and business
//! time helpers used by both the server and the client.

pub mod error;
pub mod order;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use order::{OrderDto, OrderEvent};
