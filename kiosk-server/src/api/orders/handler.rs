//! Order API Handlers

use axum::{
    Json,
    extract::{
        FromRequestParts, Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, request::Parts},
};
use serde::Deserialize;
use shared::order::{OrderDto, OrderItemsRequest};

use crate::core::ServerState;
use crate::utils::{AppError, AppResult, ErrorCode};

/// Positive numeric order id from the path
///
/// Malformed ids are rejected as `InvalidRequest` instead of axum's
/// plain-text rejection.
#[derive(Debug, Clone, Copy)]
pub struct OrderId(pub i64);

impl<S: Send + Sync> FromRequestParts<S> for OrderId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::invalid_request(e.body_text()))?;

        raw.parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .map(OrderId)
            .ok_or_else(|| {
                AppError::invalid_request(format!("Invalid order id: {raw}")).with_detail("id", raw)
            })
    }
}

fn body(payload: Result<Json<OrderItemsRequest>, JsonRejection>) -> AppResult<OrderItemsRequest> {
    payload
        .map(|Json(req)| req)
        .map_err(|e| AppError::with_message(ErrorCode::InvalidFormat, e.body_text()))
}

/// Query params for listing orders
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// YYYY-MM-DD, 默认今天 (营业时区)
    pub date: Option<String>,
}

/// Create an order
pub async fn create(
    State(state): State<ServerState>,
    payload: Result<Json<OrderItemsRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<OrderDto>)> {
    let order = state.orders.create_order(body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Replace all items of an unfulfilled order
pub async fn replace_items(
    State(state): State<ServerState>,
    OrderId(id): OrderId,
    payload: Result<Json<OrderItemsRequest>, JsonRejection>,
) -> AppResult<Json<OrderDto>> {
    let order = state.orders.replace_items(id, body(payload)?).await?;
    Ok(Json(order))
}

/// Mark an order fulfilled (no body, idempotent)
pub async fn fulfill(
    State(state): State<ServerState>,
    OrderId(id): OrderId,
) -> AppResult<Json<OrderDto>> {
    let order = state.orders.fulfill_order(id).await?;
    Ok(Json(order))
}

/// Get order by id
pub async fn get_by_id(
    State(state): State<ServerState>,
    OrderId(id): OrderId,
) -> AppResult<Json<OrderDto>> {
    let order = state.orders.get_order(id).await?;
    Ok(Json(order))
}

/// List the orders of one business day, newest first
pub async fn list(
    State(state): State<ServerState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<Json<Vec<OrderDto>>> {
    let Query(query) =
        query.map_err(|e| AppError::with_message(ErrorCode::InvalidFormat, e.body_text()))?;
    let date = match query.date.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(shared::util::parse_date(raw).ok_or_else(|| {
            AppError::with_message(ErrorCode::InvalidFormat, format!("Invalid date format: {raw}"))
        })?),
    };
    let orders = state.orders.list_orders(date).await?;
    Ok(Json(orders))
}
