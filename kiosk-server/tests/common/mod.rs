//! Shared helpers for integration tests

#![allow(dead_code)]

use kiosk_server::db::DbService;
use kiosk_server::db::repository::product::{self, Product};
use kiosk_server::{Config, ServerState};
use rust_decimal::Decimal;
use std::str::FromStr;

/// In-memory state with a small catalog: "123" (no stock), "555" (stock 10)
pub async fn test_state() -> ServerState {
    let db = DbService::in_memory().await.unwrap();
    seed_catalog(&db.pool).await;
    let config = Config::with_overrides(std::env::temp_dir().to_string_lossy(), 0);
    ServerState::new(config, db.pool)
}

pub async fn seed_catalog(pool: &sqlx::SqlitePool) {
    product::upsert(
        pool,
        &Product::new("123", "Paracetamol 500mg", Decimal::from_str("4.50").unwrap())
            .with_sale_price(Decimal::from_str("3.99").unwrap()),
    )
    .await
    .unwrap();
    product::upsert(
        pool,
        &Product::new("555", "Vitamin C 1000mg", Decimal::from_str("8.00").unwrap()).with_stock(10),
    )
    .await
    .unwrap();
}

/// Split `data:` frames out of a raw SSE buffer, leaving any partial frame
pub fn drain_frames(buf: &mut String) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    while let Some(end) = buf.find("\n\n") {
        let frame: String = buf.drain(..end + 2).collect();
        if let Some(json) = frame.trim_end().strip_prefix("data: ") {
            out.push(serde_json::from_str(json).unwrap());
        }
    }
    out
}
