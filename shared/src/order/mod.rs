//! Order wire contracts
//!
//! - DTOs: committed orders as seen by the kiosk and the back office
//! - Events: notifications pushed over the order stream

pub mod dto;
pub mod event;

// Re-exports
pub use dto::{OrderDto, OrderItemDto, OrderItemInput, OrderItemsRequest};
pub use event::OrderEvent;
