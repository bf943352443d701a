// kiosk-client/tests/live_server.rs
// 对真实 kiosk-server 的集成测试

use std::str::FromStr;
use std::time::{Duration, Instant};

use kiosk_client::{
    ClientConfig, ClientError, HttpClient, MergeOutcome, OrderFeed, OrderItemInput,
    OrderItemsRequest, OrderSubscription, SubscriptionEvent,
};
use kiosk_server::ServerState;
use kiosk_server::core::{Config, build_app};
use kiosk_server::db::DbService;
use kiosk_server::db::repository::product::{self, Product};
use rust_decimal::Decimal;
use tokio::net::TcpListener;

async fn spawn_server() -> (ServerState, ClientConfig) {
    let db = DbService::in_memory().await.unwrap();
    product::upsert(
        &db.pool,
        &Product::new("123", "Paracetamol 500mg", Decimal::from_str("4.50").unwrap()),
    )
    .await
    .unwrap();
    product::upsert(
        &db.pool,
        &Product::new("555", "Vitamin C 1000mg", Decimal::from_str("8.00").unwrap()),
    )
    .await
    .unwrap();

    let config = Config::with_overrides(std::env::temp_dir().to_string_lossy(), 0);
    let state = ServerState::new(config, db.pool);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (state, ClientConfig::new(format!("http://{addr}")).with_timeout(5))
}

async fn next_event(sub: &mut OrderSubscription) -> SubscriptionEvent {
    tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .expect("timed out waiting for the stream")
        .expect("subscription task ended")
}

fn items(barcode: &str, quantity: i64) -> OrderItemsRequest {
    OrderItemsRequest::new(vec![OrderItemInput::new(barcode, quantity)])
}

#[tokio::test]
async fn http_client_round_trip() {
    let (_state, config) = spawn_server().await;
    let client = HttpClient::new(&config).unwrap();

    let created = client.create_order(&items("123", 2)).await.unwrap();
    assert_eq!(created.order_number.len(), 8);
    assert_eq!(created.items[0].name, "Paracetamol 500mg");

    let updated = client.replace_items(created.id, &items("555", 1)).await.unwrap();
    assert_eq!(updated.items[0].barcode, "555");

    let fetched = client.get_order(created.id).await.unwrap();
    assert_eq!(fetched, updated);

    let fulfilled = client.fulfill_order(created.id).await.unwrap();
    assert!(fulfilled.is_fulfilled);

    let listed = client.list_orders(None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].is_fulfilled);
}

#[tokio::test]
async fn http_client_maps_error_bodies() {
    let (_state, config) = spawn_server().await;
    let client = HttpClient::new(&config).unwrap();

    let err = client.create_order(&items("123", 0)).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)), "{err:?}");

    let err = client.fulfill_order(404).await.unwrap_err();
    assert!(err.is_not_found(), "{err:?}");

    let order = client.create_order(&items("123", 1)).await.unwrap();
    client.fulfill_order(order.id).await.unwrap();
    let err = client.replace_items(order.id, &items("123", 2)).await.unwrap_err();
    assert!(err.is_conflict(), "{err:?}");
    assert!(err.to_string().contains("already fulfilled"));
}

#[tokio::test]
async fn subscription_feeds_the_local_list() {
    let (state, config) = spawn_server().await;
    let client = HttpClient::new(&config).unwrap();
    let today = shared::util::today();

    let mut sub = OrderSubscription::open(&config, today).unwrap();
    let mut feed = OrderFeed::new(sub.date());

    assert_eq!(feed.handle(next_event(&mut sub).await, Instant::now()), None);
    assert!(feed.is_connected());
    let outcome = feed.handle(next_event(&mut sub).await, Instant::now());
    assert_eq!(outcome, Some(MergeOutcome::Liveness));

    let order = client.create_order(&items("123", 2)).await.unwrap();
    let now = Instant::now();
    let outcome = feed.handle(next_event(&mut sub).await, now);
    assert_eq!(outcome, Some(MergeOutcome::Inserted));
    assert!(feed.is_new(order.id, now));
    assert_eq!(feed.orders()[0], order);

    client.replace_items(order.id, &items("555", 3)).await.unwrap();
    let outcome = feed.handle(next_event(&mut sub).await, Instant::now());
    assert_eq!(outcome, Some(MergeOutcome::Replaced));
    assert_eq!(feed.get(order.id).unwrap().items[0].quantity, 3);

    client.fulfill_order(order.id).await.unwrap();
    let outcome = feed.handle(next_event(&mut sub).await, Instant::now());
    assert_eq!(outcome, Some(MergeOutcome::MarkedFulfilled));
    assert!(feed.get(order.id).unwrap().is_fulfilled);

    assert_eq!(state.bus.subscriber_count(), 1);
    sub.close();
    // 服务端在下一次写入或 body drop 时注销
    tokio::time::timeout(Duration::from_secs(5), async {
        while state.bus.subscriber_count() > 0 {
            state.bus.publish(&shared::order::OrderEvent::heartbeat(0));
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("server kept the closed subscriber");
}

#[tokio::test]
async fn server_shutdown_closes_the_subscription() {
    let (state, config) = spawn_server().await;
    let mut sub = OrderSubscription::open(&config, shared::util::today()).unwrap();
    let mut feed = OrderFeed::new(sub.date());

    feed.handle(next_event(&mut sub).await, Instant::now());
    feed.handle(next_event(&mut sub).await, Instant::now());
    assert!(feed.is_connected());

    state.bus.shutdown();
    let closed = next_event(&mut sub).await;
    assert!(matches!(closed, SubscriptionEvent::Closed { .. }), "{closed:?}");
    feed.handle(closed, Instant::now());
    assert!(!feed.is_connected());
}

#[tokio::test]
async fn unreachable_server_reports_closed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig::new(format!("http://{addr}")).with_connect_timeout(2);
    let mut sub = OrderSubscription::open(&config, shared::util::today()).unwrap();
    match next_event(&mut sub).await {
        SubscriptionEvent::Closed { reason } => assert!(reason.is_some()),
        other => panic!("expected Closed, got {other:?}"),
    }
}
