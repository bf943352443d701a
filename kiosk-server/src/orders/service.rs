//! 订单写操作: 创建 / 替换商品 / 完成
//!
//! 每个操作在一个事务里完成, 提交之后才发布事件。事务的第一条语句
//! 总是写操作, 让 SQLite 立即拿到写锁。

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use shared::error::{AppError, AppResult, ErrorCode};
use shared::order::{OrderDto, OrderEvent, OrderItemInput, OrderItemsRequest};
use shared::util::{business_date, business_day_bounds};
use sqlx::{SqliteConnection, SqlitePool};

use super::number::{MAX_DAILY_SEQUENCE, format_order_number};
use crate::db::repository::{order, product};
use crate::message::EventBus;

/// Largest quantity accepted on one order line
///
/// Keeps stock arithmetic on fulfill far from integer overflow.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

fn db_err(e: sqlx::Error) -> AppError {
    AppError::database(e.to_string())
}

/// Reject empty lists, blank barcodes and quantities outside `1..=MAX_ITEM_QUANTITY`
pub fn validate_items(items: &[OrderItemInput]) -> AppResult<()> {
    if items.is_empty() {
        return Err(AppError::new(ErrorCode::OrderEmpty));
    }
    for (index, item) in items.iter().enumerate() {
        if item.barcode.trim().is_empty() {
            return Err(AppError::with_message(
                ErrorCode::RequiredField,
                format!("items[{index}].barcode is required"),
            )
            .with_detail("field", format!("items[{index}].barcode")));
        }
        if !(1..=MAX_ITEM_QUANTITY).contains(&item.quantity) {
            return Err(AppError::with_message(
                ErrorCode::InvalidQuantity,
                format!(
                    "Quantity of {} must be between 1 and {MAX_ITEM_QUANTITY}, got {}",
                    item.barcode, item.quantity
                ),
            )
            .with_detail("field", format!("items[{index}].quantity"))
            .with_detail("max", MAX_ITEM_QUANTITY));
        }
    }
    Ok(())
}

async fn ensure_products_exist(
    conn: &mut SqliteConnection,
    items: &[OrderItemInput],
) -> AppResult<()> {
    let barcodes: Vec<&str> = items.iter().map(|i| i.barcode.as_str()).collect();
    let missing = product::missing_barcodes(conn, &barcodes).await?;
    if missing.is_empty() {
        return Ok(());
    }
    Err(AppError::with_message(
        ErrorCode::ProductNotFound,
        format!("Unknown product barcode: {}", missing.join(", ")),
    )
    .with_detail("barcodes", missing))
}

async fn load_committed(conn: &mut SqliteConnection, order_id: i64) -> AppResult<OrderDto> {
    order::find_order(conn, order_id)
        .await?
        .ok_or_else(|| AppError::internal(format!("Order {order_id} vanished inside its transaction")))
}

/// Order mutation handlers
///
/// Cheap to clone; shares the pool and the event bus.
#[derive(Debug, Clone)]
pub struct OrderService {
    pool: SqlitePool,
    bus: Arc<EventBus>,
}

impl OrderService {
    pub fn new(pool: SqlitePool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    // ========== Create ==========

    pub async fn create_order(&self, req: OrderItemsRequest) -> AppResult<OrderDto> {
        self.create_order_at(req, Utc::now()).await
    }

    /// Create an order as of `now`
    ///
    /// Publishes `new_order` tagged with the business date of `now`.
    pub async fn create_order_at(
        &self,
        req: OrderItemsRequest,
        now: DateTime<Utc>,
    ) -> AppResult<OrderDto> {
        validate_items(&req.items)?;

        let date = business_date(now);
        let (start, end) = business_day_bounds(date);

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let sequence = order::next_daily_sequence(&mut tx, date, start, end).await?;
        if sequence > MAX_DAILY_SEQUENCE {
            tracing::warn!(%date, sequence, "Daily order numbers exhausted");
        }
        let order_number = format_order_number(date, sequence)?;

        ensure_products_exist(&mut tx, &req.items).await?;

        let order_id =
            order::insert_order(&mut tx, &order_number, now.timestamp_millis(), date).await?;
        order::insert_items(&mut tx, order_id, &req.items).await?;
        let created = load_committed(&mut tx, order_id).await?;

        tx.commit().await.map_err(db_err)?;

        tracing::info!(
            order_id,
            order_number = %created.order_number,
            items = created.items.len(),
            "Order created"
        );

        self.bus.publish(&OrderEvent::NewOrder {
            order: created.clone(),
            date,
        });

        Ok(created)
    }

    // ========== Replace items ==========

    pub async fn replace_items(&self, order_id: i64, req: OrderItemsRequest) -> AppResult<OrderDto> {
        self.replace_items_at(order_id, req, Utc::now()).await
    }

    /// Replace the whole item list of an unfulfilled order
    pub async fn replace_items_at(
        &self,
        order_id: i64,
        req: OrderItemsRequest,
        now: DateTime<Utc>,
    ) -> AppResult<OrderDto> {
        validate_items(&req.items)?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        if !order::touch_open_order(&mut tx, order_id, now.timestamp_millis()).await? {
            return Err(match order::find_row(&mut tx, order_id).await? {
                None => AppError::order_not_found(order_id),
                Some(row) => AppError::order_already_fulfilled(&row.order_number),
            });
        }

        ensure_products_exist(&mut tx, &req.items).await?;

        order::delete_items(&mut tx, order_id).await?;
        order::insert_items(&mut tx, order_id, &req.items).await?;
        let updated = load_committed(&mut tx, order_id).await?;

        tx.commit().await.map_err(db_err)?;

        tracing::info!(
            order_id,
            order_number = %updated.order_number,
            items = updated.items.len(),
            "Order items replaced"
        );

        self.bus.publish(&OrderEvent::OrderUpdated {
            order: updated.clone(),
            date: business_date(updated.created_at),
        });

        Ok(updated)
    }

    // ========== Fulfill ==========

    pub async fn fulfill_order(&self, order_id: i64) -> AppResult<OrderDto> {
        self.fulfill_order_at(order_id, Utc::now()).await
    }

    /// Mark an order fulfilled
    ///
    /// Idempotent: stock is deducted only by the call that flips the flag,
    /// later calls change nothing but still publish `order_fulfilled`.
    pub async fn fulfill_order_at(&self, order_id: i64, now: DateTime<Utc>) -> AppResult<OrderDto> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let transitioned = order::mark_fulfilled(&mut tx, order_id, now.timestamp_millis()).await?;
        if transitioned {
            let products = product::deduct_stock_for_order(&mut tx, order_id).await?;
            tracing::debug!(order_id, products, "Stock deducted");
        } else if order::find_row(&mut tx, order_id).await?.is_none() {
            return Err(AppError::order_not_found(order_id));
        }

        let fulfilled = load_committed(&mut tx, order_id).await?;

        tx.commit().await.map_err(db_err)?;

        if transitioned {
            tracing::info!(order_id, order_number = %fulfilled.order_number, "Order fulfilled");
        } else {
            tracing::debug!(order_id, "Order already fulfilled");
        }

        self.bus.publish(&OrderEvent::OrderFulfilled {
            order_id,
            order_number: fulfilled.order_number.clone(),
            date: business_date(fulfilled.created_at),
        });

        Ok(fulfilled)
    }

    // ========== Reads ==========

    pub async fn get_order(&self, order_id: i64) -> AppResult<OrderDto> {
        order::get_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| AppError::order_not_found(order_id))
    }

    /// Orders of a business day, newest first (default: today)
    pub async fn list_orders(&self, date: Option<NaiveDate>) -> AppResult<Vec<OrderDto>> {
        let date = date.unwrap_or_else(shared::util::today);
        Ok(order::list_by_business_date(&self.pool, date).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::db::repository::product::Product;
    use crate::message::MpscChannel;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use tokio::sync::mpsc;

    /// 2024-06-01 10:00 Beirut
    fn june_1() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap()
    }

    async fn setup() -> (OrderService, mpsc::Receiver<axum::body::Bytes>) {
        let pool = DbService::in_memory().await.unwrap().pool;
        for (barcode, name, stock) in [("123", "Paracetamol 500mg", None), ("555", "Vitamin C", Some(10))] {
            let mut p = Product::new(barcode, name, Decimal::new(450, 2));
            p.stock = stock;
            product::upsert(&pool, &p).await.unwrap();
        }
        let bus = Arc::new(EventBus::new());
        let (channel, rx) = MpscChannel::bounded(32);
        bus.register(Arc::new(channel));
        (OrderService::new(pool, bus), rx)
    }

    fn items(list: &[(&str, i64)]) -> OrderItemsRequest {
        OrderItemsRequest::new(list.iter().map(|(b, q)| OrderItemInput::new(*b, *q)).collect())
    }

    fn next_event(rx: &mut mpsc::Receiver<axum::body::Bytes>) -> Option<OrderEvent> {
        let frame = rx.try_recv().ok()?;
        let text = std::str::from_utf8(&frame).unwrap();
        let json = text.strip_prefix("data: ").unwrap().trim_end();
        Some(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_validate_items() {
        assert_eq!(
            validate_items(&[]).unwrap_err().code,
            ErrorCode::OrderEmpty
        );
        assert_eq!(
            validate_items(&[OrderItemInput::new("123", 0)]).unwrap_err().code,
            ErrorCode::InvalidQuantity
        );
        assert_eq!(
            validate_items(&[OrderItemInput::new("123", -2)]).unwrap_err().code,
            ErrorCode::InvalidQuantity
        );
        assert_eq!(
            validate_items(&[OrderItemInput::new("  ", 1)]).unwrap_err().code,
            ErrorCode::RequiredField
        );
        assert!(validate_items(&[OrderItemInput::new("123", 1)]).is_ok());
        assert!(validate_items(&[OrderItemInput::new("123", MAX_ITEM_QUANTITY)]).is_ok());
        assert_eq!(
            validate_items(&[OrderItemInput::new("123", MAX_ITEM_QUANTITY + 1)])
                .unwrap_err()
                .code,
            ErrorCode::InvalidQuantity
        );
    }

    #[tokio::test]
    async fn test_huge_quantities_never_block_fulfill() {
        let (service, mut rx) = setup().await;

        let err = service
            .create_order_at(items(&[("555", i64::MAX), ("555", i64::MAX)]), june_1())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidQuantity);
        assert!(next_event(&mut rx).is_none());

        let order = service
            .create_order_at(
                items(&[
                    ("555", MAX_ITEM_QUANTITY),
                    ("555", MAX_ITEM_QUANTITY),
                    ("123", MAX_ITEM_QUANTITY),
                ]),
                june_1(),
            )
            .await
            .unwrap();
        assert_eq!(order.order_number, "24153001");

        let fulfilled = service.fulfill_order_at(order.id, june_1()).await.unwrap();
        assert!(fulfilled.is_fulfilled);
        assert!(service.get_order(order.id).await.unwrap().is_fulfilled);

        let vitamin = product::find_by_barcode(&service.pool, "555").await.unwrap().unwrap();
        assert_eq!(vitamin.stock, Some(0));
    }

    #[tokio::test]
    async fn test_create_first_order_of_day() {
        let (service, mut rx) = setup().await;

        let order = service
            .create_order_at(items(&[("123", 2)]), june_1())
            .await
            .unwrap();
        assert_eq!(order.order_number, "24153001");
        assert_eq!(order.items[0].name, "Paracetamol 500mg");
        assert_eq!(order.items[0].quantity, 2);

        match next_event(&mut rx) {
            Some(OrderEvent::NewOrder { order: event_order, date }) => {
                assert_eq!(event_order, order);
                assert_eq!(date.to_string(), "2024-06-01");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let second = service
            .create_order_at(items(&[("555", 1)]), june_1())
            .await
            .unwrap();
        assert_eq!(second.order_number, "24153002");
    }

    #[tokio::test]
    async fn test_invalid_create_publishes_nothing() {
        let (service, mut rx) = setup().await;

        let err = service
            .create_order_at(items(&[]), june_1())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderEmpty);

        let err = service
            .create_order_at(items(&[("123", 1), ("404", 1)]), june_1())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProductNotFound);
        assert!(next_event(&mut rx).is_none());

        // 被回滚的请求不消耗序号
        let order = service
            .create_order_at(items(&[("123", 1)]), june_1())
            .await
            .unwrap();
        assert_eq!(order.order_number, "24153001");
    }

    #[tokio::test]
    async fn test_replace_items() {
        let (service, mut rx) = setup().await;
        let order = service
            .create_order_at(items(&[("123", 2)]), june_1())
            .await
            .unwrap();
        next_event(&mut rx);

        let updated = service
            .replace_items_at(order.id, items(&[("555", 3), ("123", 1)]), june_1())
            .await
            .unwrap();
        assert_eq!(updated.order_number, order.order_number);
        assert_eq!(
            updated.items.iter().map(|i| (i.barcode.as_str(), i.quantity)).collect::<Vec<_>>(),
            vec![("555", 3), ("123", 1)]
        );

        match next_event(&mut rx) {
            Some(OrderEvent::OrderUpdated { order: event_order, date }) => {
                assert_eq!(event_order, updated);
                assert_eq!(date.to_string(), "2024-06-01");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_replace_items_errors() {
        let (service, mut rx) = setup().await;

        let err = service
            .replace_items_at(42, items(&[("123", 1)]), june_1())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderNotFound);

        let order = service
            .create_order_at(items(&[("123", 2)]), june_1())
            .await
            .unwrap();
        service.fulfill_order_at(order.id, june_1()).await.unwrap();
        next_event(&mut rx);
        next_event(&mut rx);

        let err = service
            .replace_items_at(order.id, items(&[("123", 5)]), june_1())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderAlreadyFulfilled);
        assert_eq!(err.message, "Order 24153001 is already fulfilled");
        assert!(next_event(&mut rx).is_none());

        // Items untouched
        let stored = service.get_order(order.id).await.unwrap();
        assert_eq!(stored.items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_fulfill_is_idempotent_and_deducts_once() {
        let (service, mut rx) = setup().await;
        let order = service
            .create_order_at(items(&[("555", 4)]), june_1())
            .await
            .unwrap();
        next_event(&mut rx);

        let first = service.fulfill_order_at(order.id, june_1()).await.unwrap();
        assert!(first.is_fulfilled);
        let again = service.fulfill_order_at(order.id, june_1()).await.unwrap();
        assert!(again.is_fulfilled);

        let vitamin = product::find_by_barcode(&service.pool, "555").await.unwrap().unwrap();
        assert_eq!(vitamin.stock, Some(6));

        for _ in 0..2 {
            match next_event(&mut rx) {
                Some(OrderEvent::OrderFulfilled { order_id, order_number, date }) => {
                    assert_eq!(order_id, order.id);
                    assert_eq!(order_number, "24153001");
                    assert_eq!(date.to_string(), "2024-06-01");
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }

        let err = service.fulfill_order_at(999, june_1()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderNotFound);
        assert!(next_event(&mut rx).is_none());
    }

    #[tokio::test]
    async fn test_list_orders_by_date() {
        let (service, _rx) = setup().await;
        let a = service.create_order_at(items(&[("123", 1)]), june_1()).await.unwrap();
        let b = service.create_order_at(items(&[("123", 1)]), june_1()).await.unwrap();

        let orders = service
            .list_orders(NaiveDate::from_ymd_opt(2024, 6, 1))
            .await
            .unwrap();
        assert_eq!(orders.iter().map(|o| o.id).collect::<Vec<_>>(), vec![b.id, a.id]);

        let err = service.get_order(12345).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderNotFound);
    }
}
