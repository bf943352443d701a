//! Daily sequence behaviour, including concurrent creates
//!
//! Policy: numbers come from a serialized per-day counter, so concurrent
//! creates on the same day never share an order number.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use kiosk_server::db::DbService;
use kiosk_server::{EventBus, OrderService};
use shared::error::ErrorCode;
use shared::order::{OrderItemInput, OrderItemsRequest};

fn one_item() -> OrderItemsRequest {
    OrderItemsRequest::new(vec![OrderItemInput::new("123", 2)])
}

#[tokio::test]
async fn first_order_on_june_first_2024() {
    let state = common::test_state().await;
    // 2024-06-01 09:30 Beirut
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 6, 30, 0).unwrap();

    let order = state.orders.create_order_at(one_item(), now).await.unwrap();
    assert_eq!(order.order_number, "24153001");
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 2);
}

#[tokio::test]
async fn late_evening_utc_counts_toward_next_beirut_day() {
    let state = common::test_state().await;
    // 2024-05-31 21:30 UTC = 2024-06-01 00:30 Beirut
    let now = Utc.with_ymd_and_hms(2024, 5, 31, 21, 30, 0).unwrap();

    let order = state.orders.create_order_at(one_item(), now).await.unwrap();
    assert_eq!(order.order_number, "24153001");
}

#[tokio::test]
async fn sequence_restarts_each_day() {
    let state = common::test_state().await;
    let day1 = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    let day2 = Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).unwrap();

    let numbers = [
        state.orders.create_order_at(one_item(), day1).await.unwrap(),
        state.orders.create_order_at(one_item(), day1).await.unwrap(),
        state.orders.create_order_at(one_item(), day2).await.unwrap(),
    ]
    .map(|o| o.order_number);
    assert_eq!(numbers, ["24153001", "24153002", "24154001"]);
}

#[tokio::test]
async fn thousandth_order_of_a_day_is_rejected() {
    let state = common::test_state().await;
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();

    sqlx::query("INSERT INTO daily_sequence (business_date, last_value) VALUES ('2024-06-01', 999)")
        .execute(&state.pool)
        .await
        .unwrap();

    let err = state.orders.create_order_at(one_item(), now).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::DailySequenceExhausted);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&state.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_get_unique_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("kiosk.db");
    let db = DbService::new(&db_path.to_string_lossy()).await.unwrap();
    common::seed_catalog(&db.pool).await;

    let service = OrderService::new(db.pool.clone(), Arc::new(EventBus::new()));
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.create_order_at(one_item(), now).await })
        })
        .collect();

    let mut numbers = HashSet::new();
    for handle in handles {
        let order = handle.await.unwrap().unwrap();
        assert!(numbers.insert(order.order_number.clone()), "duplicate {}", order.order_number);
    }

    let expected: HashSet<String> = (1..=20).map(|seq| format!("24153{seq:03}")).collect();
    assert_eq!(numbers, expected);
}
