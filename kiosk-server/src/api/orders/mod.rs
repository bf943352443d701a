//! Order API Module
//!
//! Mutations publish to the event bus after commit; `/events` streams them.

mod events;
mod handler;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::core::ServerState;

pub use handler::OrderId;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create).get(handler::list))
        .route("/events", get(events::stream))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/items", put(handler::replace_items))
        .route("/{id}/fulfill", post(handler::fulfill))
}
