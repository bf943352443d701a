//! Product Repository
//!
//! The catalog itself is maintained elsewhere; orders only read names and
//! prices from it and deduct stock on fulfillment.

use super::{RepoError, RepoResult};
use rust_decimal::Decimal;
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;

/// Product as stored in the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub barcode: String,
    pub name: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    /// `None` when the product does not track stock
    pub stock: Option<i64>,
}

impl Product {
    pub fn new(barcode: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            barcode: barcode.into(),
            name: name.into(),
            price,
            sale_price: None,
            stock: None,
        }
    }

    pub fn with_sale_price(mut self, sale_price: Decimal) -> Self {
        self.sale_price = Some(sale_price);
        self
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = Some(stock);
        self
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    barcode: String,
    name: String,
    price: String,
    sale_price: Option<String>,
    stock: Option<i64>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepoError;

    fn try_from(row: ProductRow) -> RepoResult<Self> {
        Ok(Self {
            price: parse_price(&row.price)?,
            sale_price: row.sale_price.as_deref().map(parse_price).transpose()?,
            barcode: row.barcode,
            name: row.name,
            stock: row.stock,
        })
    }
}

/// Prices are stored as decimal text
pub(crate) fn parse_price(raw: &str) -> RepoResult<Decimal> {
    Decimal::from_str(raw.trim())
        .map_err(|e| RepoError::Database(format!("Invalid stored price '{raw}': {e}")))
}

pub async fn find_by_barcode(pool: &SqlitePool, barcode: &str) -> RepoResult<Option<Product>> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT barcode, name, price, sale_price, stock FROM product WHERE barcode = ?",
    )
    .bind(barcode)
    .fetch_optional(pool)
    .await?;
    row.map(Product::try_from).transpose()
}

/// Insert or replace a catalog entry (seeding and tests)
pub async fn upsert(pool: &SqlitePool, product: &Product) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO product (barcode, name, price, sale_price, stock) VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT(barcode) DO UPDATE SET name = ?2, price = ?3, sale_price = ?4, stock = ?5",
    )
    .bind(&product.barcode)
    .bind(&product.name)
    .bind(product.price.to_string())
    .bind(product.sale_price.map(|p| p.to_string()))
    .bind(product.stock)
    .execute(pool)
    .await?;
    Ok(())
}

/// Barcodes from `barcodes` that have no catalog entry, in input order
pub async fn missing_barcodes(
    conn: &mut SqliteConnection,
    barcodes: &[&str],
) -> RepoResult<Vec<String>> {
    let mut missing = Vec::new();
    for barcode in barcodes {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM product WHERE barcode = ?")
            .bind(*barcode)
            .fetch_optional(&mut *conn)
            .await?;
        if exists.is_none() && !missing.iter().any(|m: &String| m.as_str() == *barcode) {
            missing.push(barcode.to_string());
        }
    }
    Ok(missing)
}

/// Subtract an order's quantities from tracked stock, floored at zero
pub async fn deduct_stock_for_order(conn: &mut SqliteConnection, order_id: i64) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE product SET stock = MAX(0, stock - ( \
             SELECT COALESCE(SUM(oi.quantity), 0) FROM order_item oi \
             WHERE oi.order_id = ?1 AND oi.barcode = product.barcode)) \
         WHERE stock IS NOT NULL \
           AND barcode IN (SELECT barcode FROM order_item WHERE order_id = ?1)",
    )
    .bind(order_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}
