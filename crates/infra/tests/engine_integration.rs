//! End-to-end tests: the full engine wired to a real SQLite database and
//! wiremock marketplaces, suppliers, and classifier.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use shopsync_core::{
    CredentialService, ListingRepository, MarketplaceRegistry, OrderRouter, ProductRepository,
    ReconcileService, StoreRepository, SupplierRegistry, SyncEngine, SyncLedger,
};
use shopsync_domain::{
    Credential, CredentialConfig, Destination, FulfillmentStatus, LedgerStatus, Listing,
    ListingStatus, MarketplaceOrderPayload, OperationType, Platform, Product, ReconcileConfig,
    RoutingConfig, Store, StoreStatus, Supplier, SyncError,
};
use shopsync_infra::{
    ClassifierClient, CjSupplier, CredentialRepositorySql, DbManager, EbayClient, HttpClient,
    LedgerRepositorySql, ListingRepositorySql, OrderRepositorySql, ProductRepositorySql,
    StoreRepositorySql,
};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    engine: Arc<SyncEngine>,
    stores: Arc<StoreRepositorySql>,
    credentials: Arc<CredentialRepositorySql>,
    products: Arc<ProductRepositorySql>,
    listings: Arc<ListingRepositorySql>,
    orders: Arc<OrderRepositorySql>,
    ledger: Arc<LedgerRepositorySql>,
    _temp_dir: TempDir,
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

async fn harness(server: &MockServer) -> Harness {
    init_tracing();
    let temp_dir = TempDir::new().expect("temp dir created");
    let db = DbManager::new(temp_dir.path().join("engine.db"), 4).expect("manager created");
    db.run_migrations().expect("migrations applied");
    let db = Arc::new(db);

    let stores = Arc::new(StoreRepositorySql::new(Arc::clone(&db)));
    let credentials = Arc::new(CredentialRepositorySql::new(Arc::clone(&db)));
    let products = Arc::new(ProductRepositorySql::new(Arc::clone(&db)));
    let listings = Arc::new(ListingRepositorySql::new(Arc::clone(&db)));
    let orders = Arc::new(OrderRepositorySql::new(Arc::clone(&db), 120));
    let ledger = Arc::new(LedgerRepositorySql::new(Arc::clone(&db), 120));

    let http = HttpClient::builder()
        .base_backoff(Duration::from_millis(5))
        .max_attempts(2)
        .build()
        .expect("http client");

    let ebay = EbayClient::new(http.clone(), "app-id", "app-secret")
        .with_base_urls(format!("{}/identity/v1/oauth2/token", server.uri()), server.uri());
    let marketplaces =
        Arc::new(MarketplaceRegistry::new().with_client(Platform::Ebay, Arc::new(ebay)));

    let cj = CjSupplier::new(http.clone(), "cj-key").with_base_url(server.uri());
    let suppliers = Arc::new(SupplierRegistry::new().with_client(Arc::new(cj)));

    let classifier = Arc::new(ClassifierClient::new(http, server.uri()));

    let ledger_port: Arc<dyn SyncLedger> = Arc::clone(&ledger) as Arc<dyn SyncLedger>;
    let credential_service = Arc::new(CredentialService::new(
        Arc::clone(&stores) as Arc<dyn StoreRepository>,
        Arc::clone(&credentials) as _,
        Arc::clone(&ledger_port),
        Arc::clone(&marketplaces),
        CredentialConfig { refresh_timeout_secs: 5, ..CredentialConfig::default() },
    ));
    let reconciler = Arc::new(ReconcileService::new(
        Arc::clone(&products) as _,
        Arc::clone(&listings) as _,
        Arc::clone(&stores) as _,
        Arc::clone(&credential_service),
        Arc::clone(&marketplaces),
        Arc::clone(&suppliers),
        Arc::clone(&ledger_port),
        ReconcileConfig { supplier_timeout_secs: 5, ..ReconcileConfig::default() },
    ));
    let router = Arc::new(OrderRouter::new(
        Arc::clone(&orders) as _,
        Arc::clone(&products) as _,
        suppliers,
        classifier,
        ledger_port,
        RoutingConfig {
            classifier_timeout_secs: 2,
            placement_timeout_secs: 5,
            ..RoutingConfig::default()
        },
    ));

    let engine = Arc::new(SyncEngine::new(credential_service, reconciler, router));
    Harness { engine, stores, credentials, products, listings, orders, ledger, _temp_dir: temp_dir }
}

fn store() -> Store {
    Store {
        id: "store-1".into(),
        platform: Platform::Ebay,
        status: StoreStatus::Active,
        daily_listing_quota: 100,
        quota_reset_at: None,
    }
}

fn credential_expiring_in(secs: i64) -> Credential {
    let now = Utc::now();
    Credential {
        store_id: "store-1".into(),
        access_token: "stale-access".into(),
        refresh_token: "refresh".into(),
        access_expires_at: now + ChronoDuration::seconds(secs),
        refresh_expires_at: now + ChronoDuration::days(540),
    }
}

fn product() -> Product {
    Product {
        sku: "sku-1".into(),
        supplier: Supplier::Cj,
        supplier_sku: "cj-sku-1".into(),
        cost_cents: 450,
        supplier_stock: 10,
        active: true,
    }
}

fn listing(id: &str, quantity: i64) -> Listing {
    Listing {
        id: id.to_string(),
        store_id: "store-1".into(),
        product_sku: "sku-1".into(),
        marketplace_listing_id: format!("mkt-{id}"),
        published_quantity: quantity,
        status: ListingStatus::Active,
    }
}

fn order_payload(id: &str) -> MarketplaceOrderPayload {
    MarketplaceOrderPayload {
        marketplace_order_id: id.to_string(),
        store_id: "store-1".into(),
        listing_id: "l1".into(),
        product_sku: "sku-1".into(),
        quantity: 2,
        total_cents: 4_999,
        currency: "USD".into(),
        destination: Destination {
            name: "Jane Doe".into(),
            address_line: "1 Main St".into(),
            city: "Springfield".into(),
            postal_code: "12345".into(),
            country_code: "US".into(),
        },
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn credential_sweep_refreshes_and_records_the_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/v1/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-access",
            "expires_in": 7200,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server).await;
    h.stores.upsert_store(&store()).await.unwrap();
    let stale = credential_expiring_in(600); // inside the lookahead window
    shopsync_core::CredentialRepository::replace(h.credentials.as_ref(), &stale).await.unwrap();

    let report = h.engine.refresh_credentials().await.unwrap();

    assert_eq!(report.due, 1);
    assert_eq!(report.refreshed, 1);
    assert_eq!(report.failed, 0);

    let current = shopsync_core::CredentialRepository::current(h.credentials.as_ref(), "store-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.access_token, "fresh-access");
    // eBay did not rotate the refresh token, so the old one is kept.
    assert_eq!(current.refresh_token, "refresh");

    let key = format!("store-1:{}", stale.access_expires_at.timestamp());
    let entry =
        h.ledger.find(OperationType::CredentialRefresh, &key).await.unwrap().unwrap();
    assert_eq!(entry.status, LedgerStatus::Completed);
}

#[tokio::test(flavor = "multi_thread")]
async fn dead_refresh_token_deactivates_the_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant"
        })))
        .mount(&server)
        .await;

    let h = harness(&server).await;
    h.stores.upsert_store(&store()).await.unwrap();
    shopsync_core::CredentialRepository::replace(h.credentials.as_ref(), &credential_expiring_in(60))
        .await
        .unwrap();

    let err = h.engine.credentials().ensure_valid("store-1").await.unwrap_err();
    assert!(matches!(err, SyncError::CredentialExpired(_)));

    let stored = h.stores.get_store("store-1").await.unwrap();
    assert_eq!(stored.status, StoreStatus::Inactive);
}

#[tokio::test(flavor = "multi_thread")]
async fn stock_drop_corrects_every_oversold_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/product/stock/queryBySku"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200,
            "data": { "storageNum": 3 }
        })))
        .mount(&server)
        .await;
    // Two oversold listings, two corrections pushed to eBay.
    Mock::given(method("POST"))
        .and(path("/sell/inventory/v1/bulk_update_price_quantity"))
        .and(body_string_contains("\"quantity\":3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "responses": [{ "statusCode": 200 }]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let h = harness(&server).await;
    h.stores.upsert_store(&store()).await.unwrap();
    shopsync_core::CredentialRepository::replace(
        h.credentials.as_ref(),
        &credential_expiring_in(86_400),
    )
    .await
    .unwrap();
    h.products.upsert_product(&product()).await.unwrap();
    h.listings.insert_listing(&listing("l1", 10)).await.unwrap();
    h.listings.insert_listing(&listing("l2", 8)).await.unwrap();

    let report = h.engine.reconcile_inventory(Some("sku-1")).await.unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.failed, 0);

    let stored = h.products.get_product("sku-1").await.unwrap();
    assert_eq!(stored.supplier_stock, 3);

    let listings = h.listings.list_for_product("sku-1").await.unwrap();
    assert!(listings.iter().all(|l| l.published_quantity == 3));
}

#[tokio::test(flavor = "multi_thread")]
async fn replayed_orders_place_exactly_one_supplier_order() {
    let server = MockServer::start().await;
    // Classifier is down; the router falls back to the bound supplier.
    Mock::given(method("POST"))
        .and(path("/classify"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/shopping/order/createOrder"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200,
            "data": { "orderId": "cj-789" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server).await;
    h.stores.upsert_store(&store()).await.unwrap();
    h.products.upsert_product(&product()).await.unwrap();

    let first = h.engine.process_order(order_payload("mo-1")).await.unwrap();
    assert_eq!(first.supplier, Some(Supplier::Cj));
    assert_eq!(first.supplier_order_ref.as_deref(), Some("cj-789"));
    assert_eq!(first.status, FulfillmentStatus::Processing);
    assert!(first.fallback_used);

    // Same payload again: the recorded outcome comes back, no new placement.
    let replay = h.engine.process_order(order_payload("mo-1")).await.unwrap();
    assert_eq!(replay, first);

    let stored = shopsync_core::OrderRepository::find_by_marketplace_id(h.orders.as_ref(), "mo-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, FulfillmentStatus::Processing);
    assert_eq!(stored.supplier_order_ref.as_deref(), Some("cj-789"));
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_placement_is_recorded_and_not_retried_on_replay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/classify"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/shopping/order/createOrder"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
            "code": 422,
            "message": "address rejected"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server).await;
    h.stores.upsert_store(&store()).await.unwrap();
    h.products.upsert_product(&product()).await.unwrap();

    let first = h.engine.process_order(order_payload("mo-2")).await.unwrap();
    assert_eq!(first.status, FulfillmentStatus::Error);
    assert!(first.supplier_order_ref.is_none());

    let replay = h.engine.process_order(order_payload("mo-2")).await.unwrap();
    assert_eq!(replay, first);

    let entry = h.ledger.find(OperationType::OrderRouting, "mo-2").await.unwrap().unwrap();
    assert_eq!(entry.status, LedgerStatus::Failed);
}
