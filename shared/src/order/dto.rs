//! Order wire types
//!
//! JSON field names are camelCase, prices are decimal strings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One line of an order, joined with the current product record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemDto {
    pub barcode: String,
    pub name: String,
    pub quantity: i64,
    /// 当前商品价格 (非下单时快照)
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
}

/// Committed order as returned by the API and carried by events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    pub id: i64,
    /// `YYDDDSSS`
    pub order_number: String,
    pub created_at: DateTime<Utc>,
    pub is_fulfilled: bool,
    pub items: Vec<OrderItemDto>,
}

impl OrderDto {
    /// Total quantity over all lines
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// Requested line: product barcode and quantity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemInput {
    pub barcode: String,
    pub quantity: i64,
}

impl OrderItemInput {
    pub fn new(barcode: impl Into<String>, quantity: i64) -> Self {
        Self {
            barcode: barcode.into(),
            quantity,
        }
    }
}

/// Body of create-order and replace-items requests
///
/// `items` defaults to empty so a missing field is reported as an
/// empty order rather than a JSON rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemsRequest {
    #[serde(default)]
    pub items: Vec<OrderItemInput>,
}

impl OrderItemsRequest {
    pub fn new(items: Vec<OrderItemInput>) -> Self {
        Self { items }
    }
}
