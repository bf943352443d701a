//! Order event stream (Server-Sent Events)

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};

use crate::core::ServerState;
use crate::message::open_stream;

/// `GET /api/orders/events`
///
/// Every subscriber receives every event; date filtering is the client's job.
pub async fn stream(State(state): State<ServerState>) -> Response {
    let (_id, frames) = open_stream(
        state.bus.clone(),
        state.config.channel_capacity,
        state.config.heartbeat_interval(),
    );

    let mut response = Body::from_stream(frames).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    // 关闭 nginx 缓冲
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}
