//! Order Repository
//!
//! Item prices are not stored on `order_item`; reads join the current
//! product record.

use super::product::parse_price;
use super::{RepoError, RepoResult};
use chrono::{DateTime, NaiveDate};
use shared::order::{OrderDto, OrderItemDto, OrderItemInput};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;

/// Raw `orders` row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub order_number: String,
    pub created_at: i64,
    pub business_date: String,
    pub is_fulfilled: bool,
    pub fulfilled_at: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    order_id: i64,
    barcode: String,
    name: String,
    quantity: i64,
    price: String,
    sale_price: Option<String>,
}

impl TryFrom<ItemRow> for OrderItemDto {
    type Error = RepoError;

    fn try_from(row: ItemRow) -> RepoResult<Self> {
        Ok(Self {
            price: parse_price(&row.price)?,
            sale_price: row.sale_price.as_deref().map(parse_price).transpose()?,
            barcode: row.barcode,
            name: row.name,
            quantity: row.quantity,
        })
    }
}

const ORDER_COLUMNS: &str =
    "id, order_number, created_at, business_date, is_fulfilled, fulfilled_at";

// 商品被删除后仍能读出订单: 名称退回条码, 价格为 0
const ITEM_SELECT: &str = "SELECT oi.order_id, oi.barcode, COALESCE(p.name, oi.barcode) AS name, \
     oi.quantity, COALESCE(p.price, '0') AS price, p.sale_price \
     FROM order_item oi LEFT JOIN product p ON p.barcode = oi.barcode";

fn to_dto(row: OrderRow, items: Vec<OrderItemDto>) -> RepoResult<OrderDto> {
    let created_at = DateTime::from_timestamp_millis(row.created_at).ok_or_else(|| {
        RepoError::Database(format!(
            "Order {} has invalid created_at {}",
            row.id, row.created_at
        ))
    })?;
    Ok(OrderDto {
        id: row.id,
        order_number: row.order_number,
        created_at,
        is_fulfilled: row.is_fulfilled,
        items,
    })
}

// ========== Writes (inside a transaction) ==========

/// Atomically advance the counter of `business_date` and return the new value
///
/// The first call of a day seeds the counter with the number of orders
/// already created in `[start, end)`, so it continues from existing data.
/// This statement takes SQLite's write lock, so concurrent creates are
/// serialized here.
pub async fn next_daily_sequence(
    conn: &mut SqliteConnection,
    business_date: NaiveDate,
    start: i64,
    end: i64,
) -> RepoResult<i64> {
    let value: i64 = sqlx::query_scalar(
        "INSERT INTO daily_sequence (business_date, last_value) \
         VALUES (?1, (SELECT COUNT(*) FROM orders WHERE created_at >= ?2 AND created_at < ?3) + 1) \
         ON CONFLICT(business_date) DO UPDATE SET last_value = last_value + 1 \
         RETURNING last_value",
    )
    .bind(business_date.to_string())
    .bind(start)
    .bind(end)
    .fetch_one(&mut *conn)
    .await?;
    Ok(value)
}

pub async fn insert_order(
    conn: &mut SqliteConnection,
    order_number: &str,
    created_at: i64,
    business_date: NaiveDate,
) -> RepoResult<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO orders (order_number, created_at, business_date, is_fulfilled) \
         VALUES (?1, ?2, ?3, 0) RETURNING id",
    )
    .bind(order_number)
    .bind(created_at)
    .bind(business_date.to_string())
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

pub async fn insert_items(
    conn: &mut SqliteConnection,
    order_id: i64,
    items: &[OrderItemInput],
) -> RepoResult<()> {
    for item in items {
        sqlx::query("INSERT INTO order_item (order_id, barcode, quantity) VALUES (?1, ?2, ?3)")
            .bind(order_id)
            .bind(&item.barcode)
            .bind(item.quantity)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn delete_items(conn: &mut SqliteConnection, order_id: i64) -> RepoResult<u64> {
    let result = sqlx::query("DELETE FROM order_item WHERE order_id = ?")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Bump `updated_at` of an unfulfilled order
///
/// Returns false when the order is missing or already fulfilled. Used as
/// the first statement of an items replace so the transaction holds the
/// write lock before it reads anything.
pub async fn touch_open_order(
    conn: &mut SqliteConnection,
    order_id: i64,
    now: i64,
) -> RepoResult<bool> {
    let result = sqlx::query("UPDATE orders SET updated_at = ?1 WHERE id = ?2 AND is_fulfilled = 0")
        .bind(now)
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Flip `is_fulfilled` false → true
///
/// Returns true only for the call that performed the transition.
pub async fn mark_fulfilled(
    conn: &mut SqliteConnection,
    order_id: i64,
    now: i64,
) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE orders SET is_fulfilled = 1, fulfilled_at = ?1, updated_at = ?1 \
         WHERE id = ?2 AND is_fulfilled = 0",
    )
    .bind(now)
    .bind(order_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

// ========== Reads ==========

pub async fn find_row(conn: &mut SqliteConnection, order_id: i64) -> RepoResult<Option<OrderRow>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"
    ))
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// One order with its items joined to the catalog
pub async fn find_order(
    conn: &mut SqliteConnection,
    order_id: i64,
) -> RepoResult<Option<OrderDto>> {
    let Some(row) = find_row(conn, order_id).await? else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, ItemRow>(&format!(
        "{ITEM_SELECT} WHERE oi.order_id = ? ORDER BY oi.id"
    ))
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(OrderItemDto::try_from)
    .collect::<RepoResult<Vec<_>>>()?;

    to_dto(row, items).map(Some)
}

pub async fn get_order(pool: &SqlitePool, order_id: i64) -> RepoResult<Option<OrderDto>> {
    let mut conn = pool.acquire().await?;
    find_order(&mut conn, order_id).await
}

/// Orders of one business day, newest first
pub async fn list_by_business_date(
    pool: &SqlitePool,
    business_date: NaiveDate,
) -> RepoResult<Vec<OrderDto>> {
    let date = business_date.to_string();

    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE business_date = ? ORDER BY id DESC"
    ))
    .bind(&date)
    .fetch_all(pool)
    .await?;

    let item_rows = sqlx::query_as::<_, ItemRow>(&format!(
        "{ITEM_SELECT} WHERE oi.order_id IN (SELECT id FROM orders WHERE business_date = ?) \
         ORDER BY oi.id"
    ))
    .bind(&date)
    .fetch_all(pool)
    .await?;

    let mut items_by_order: HashMap<i64, Vec<OrderItemDto>> = HashMap::new();
    for item in item_rows {
        let order_id = item.order_id;
        items_by_order
            .entry(order_id)
            .or_default()
            .push(OrderItemDto::try_from(item)?);
    }

    rows.into_iter()
        .map(|row| {
            let items = items_by_order.remove(&row.id).unwrap_or_default();
            to_dto(row, items)
        })
        .collect()
}

/// Number of orders created in `[start, end)` (Unix millis)
pub async fn count_between(pool: &SqlitePool, start: i64, end: i64) -> RepoResult<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE created_at >= ? AND created_at < ?")
            .bind(start)
            .bind(end)
            .fetch_one(pool)
            .await?;
    Ok(count)
}
