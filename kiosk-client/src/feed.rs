//! Local order list fed by the event stream
//!
//! ```text
//! SubscriptionEvent ──▶ OrderFeed::handle ──▶ connected flag
//!                              │
//!                              ▼
//!                       OrderFeed::apply ──▶ orders (newest first)
//!                                        └─▶ highlights: id → expiry
//! ```
//!
//! Events arrive in delivery order, which under concurrent writers is not
//! commit order. Every rule below is a no-op when its target is missing or
//! already present, so late or repeated events never corrupt the list.
//!
//! All methods take `now` from the caller, which keeps the highlight
//! timers testable without sleeping.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use shared::order::{OrderDto, OrderEvent};

use crate::SubscriptionEvent;

/// How long a newly streamed order stays highlighted
pub const HIGHLIGHT_TTL: Duration = Duration::from_secs(5);

/// What [`OrderFeed::apply`] did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// `new_order` prepended and highlighted
    Inserted,
    /// `order_updated` replaced the local entry
    Replaced,
    /// `order_fulfilled` set the flag on the local entry
    MarkedFulfilled,
    /// `new_order` tagged with a different day than the view
    OtherDate,
    /// `new_order` for an id already in the list
    Duplicate,
    /// update or fulfil for an id not in the list
    Unknown,
    /// `connected` / `heartbeat`, never merged
    Liveness,
}

/// Order list of one business day plus stream liveness
#[derive(Debug, Clone)]
pub struct OrderFeed {
    date: NaiveDate,
    orders: Vec<OrderDto>,
    highlights: HashMap<i64, Instant>,
    connected: bool,
}

impl OrderFeed {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            orders: Vec::new(),
            highlights: HashMap::new(),
            connected: false,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Switch the view to another day; the list and highlights start empty
    pub fn set_date(&mut self, date: NaiveDate) {
        if self.date != date {
            self.date = date;
            self.orders.clear();
            self.highlights.clear();
        }
    }

    /// Orders, newest first
    pub fn orders(&self) -> &[OrderDto] {
        &self.orders
    }

    pub fn get(&self, id: i64) -> Option<&OrderDto> {
        self.orders.iter().find(|o| o.id == id)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Load a fetched snapshot (initial load or manual refresh)
    ///
    /// Highlights survive for ids that are still present.
    pub fn replace_all(&mut self, orders: Vec<OrderDto>) {
        self.orders = orders;
        let orders = &self.orders;
        self.highlights
            .retain(|id, _| orders.iter().any(|o| o.id == *id));
    }

    /// Track liveness and merge order events
    ///
    /// Returns `None` for `Opened` / `Closed`.
    pub fn handle(&mut self, event: SubscriptionEvent, now: Instant) -> Option<MergeOutcome> {
        match event {
            SubscriptionEvent::Opened => {
                self.connected = true;
                None
            }
            SubscriptionEvent::Closed { .. } => {
                self.connected = false;
                None
            }
            SubscriptionEvent::Event(event) => Some(self.apply(event, now)),
        }
    }

    /// Merge one stream event into the list
    pub fn apply(&mut self, event: OrderEvent, now: Instant) -> MergeOutcome {
        match event {
            OrderEvent::Connected { .. } | OrderEvent::Heartbeat { .. } => {
                self.connected = true;
                MergeOutcome::Liveness
            }
            OrderEvent::NewOrder { order, date } => {
                if date != self.date {
                    return MergeOutcome::OtherDate;
                }
                if self.position(order.id).is_some() {
                    return MergeOutcome::Duplicate;
                }
                self.highlights.insert(order.id, now + HIGHLIGHT_TTL);
                self.orders.insert(0, order);
                MergeOutcome::Inserted
            }
            OrderEvent::OrderUpdated { order, .. } => match self.position(order.id) {
                Some(idx) => {
                    self.orders[idx] = order;
                    MergeOutcome::Replaced
                }
                None => MergeOutcome::Unknown,
            },
            OrderEvent::OrderFulfilled { order_id, .. } => match self.position(order_id) {
                Some(idx) => {
                    self.orders[idx].is_fulfilled = true;
                    MergeOutcome::MarkedFulfilled
                }
                None => MergeOutcome::Unknown,
            },
        }
    }

    /// Whether `id` is still inside its highlight window
    pub fn is_new(&self, id: i64, now: Instant) -> bool {
        self.highlights.get(&id).is_some_and(|expiry| *expiry > now)
    }

    /// Drop expired highlights, returning how many were cleared
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.highlights.len();
        self.highlights.retain(|_, expiry| *expiry > now);
        before - self.highlights.len()
    }

    /// Earliest pending highlight expiry, for scheduling the next sweep
    pub fn next_expiry(&self) -> Option<Instant> {
        self.highlights.values().min().copied()
    }

    fn position(&self, id: i64) -> Option<usize> {
        self.orders.iter().position(|o| o.id == id)
    }
}
