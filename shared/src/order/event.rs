//! Order events pushed to live subscribers
//!
//! Events are transient: they are never stored, and a subscriber that is
//! not connected when an event is published never sees it.

use super::dto::OrderDto;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Event carried by one `data:` frame of the order stream
///
/// `connected` and `heartbeat` only signal liveness; the other three
/// describe committed order state. `date` is the business date the
/// subscriber filters on (`YYYY-MM-DD`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Connected {
        message: String,
    },
    Heartbeat {
        /// Unix millis
        timestamp: i64,
    },
    NewOrder {
        order: OrderDto,
        date: NaiveDate,
    },
    OrderUpdated {
        order: OrderDto,
        date: NaiveDate,
    },
    OrderFulfilled {
        #[serde(rename = "orderId")]
        order_id: i64,
        #[serde(rename = "orderNumber")]
        order_number: String,
        date: NaiveDate,
    },
}

impl OrderEvent {
    pub fn connected() -> Self {
        Self::Connected {
            message: "Connected to order stream".to_string(),
        }
    }

    pub fn heartbeat(timestamp: i64) -> Self {
        Self::Heartbeat { timestamp }
    }

    /// True for events that never reach merge logic
    pub fn is_liveness(&self) -> bool {
        matches!(self, Self::Connected { .. } | Self::Heartbeat { .. })
    }

    /// Wire name of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Heartbeat { .. } => "heartbeat",
            Self::NewOrder { .. } => "new_order",
            Self::OrderUpdated { .. } => "order_updated",
            Self::OrderFulfilled { .. } => "order_fulfilled",
        }
    }

    /// Order id the event refers to, if any
    pub fn order_id(&self) -> Option<i64> {
        match self {
            Self::NewOrder { order, .. } | Self::OrderUpdated { order, .. } => Some(order.id),
            Self::OrderFulfilled { order_id, .. } => Some(*order_id),
            _ => None,
        }
    }

    /// Serialize as one SSE frame: `data: <json>\n\n`
    pub fn to_frame(&self) -> serde_json::Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!("data: {}\n\n", json))
    }
}
