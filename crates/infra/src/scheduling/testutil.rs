//! Shared fixtures for scheduler tests: an engine wired to inert
//! in-memory implementations of every port.

use std::sync::Arc;

use async_trait::async_trait;
use shopsync_core::{
    CredentialRepository, CredentialService, ListingRepository, MarketplaceRegistry, OrderRepository,
    OrderRouter, ProductRepository, ReconcileService, Reservation, StoreRepository,
    SupplierClassifier, SupplierRegistry, SyncEngine, SyncLedger,
};
use shopsync_domain::{
    Credential, CredentialConfig, FulfillmentStatus, LedgerStatus, Listing, ListingStatus,
    OperationType, Order, OrderContext, Product, ReconcileConfig, Result, RoutingConfig, Store,
    StoreStatus, Supplier, SupplierSuggestion, SyncError,
};

pub(crate) struct EmptyStores;

#[async_trait]
impl StoreRepository for EmptyStores {
    async fn get_store(&self, store_id: &str) -> Result<Store> {
        Err(SyncError::NotFound(format!("store {store_id} does not exist")))
    }

    async fn list_active_stores(&self) -> Result<Vec<Store>> {
        Ok(Vec::new())
    }

    async fn set_store_status(&self, _store_id: &str, _status: StoreStatus) -> Result<()> {
        Ok(())
    }
}

pub(crate) struct EmptyCredentials;

#[async_trait]
impl CredentialRepository for EmptyCredentials {
    async fn current(&self, _store_id: &str) -> Result<Option<Credential>> {
        Ok(None)
    }

    async fn replace(&self, _credential: &Credential) -> Result<()> {
        Ok(())
    }
}

pub(crate) struct EmptyProducts;

#[async_trait]
impl ProductRepository for EmptyProducts {
    async fn get_product(&self, sku: &str) -> Result<Product> {
        Err(SyncError::NotFound(format!("product {sku} does not exist")))
    }

    async fn list_active_skus(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn update_supplier_stock(&self, _sku: &str, _stock: i64) -> Result<()> {
        Ok(())
    }
}

pub(crate) struct EmptyListings;

#[async_trait]
impl ListingRepository for EmptyListings {
    async fn list_for_product(&self, _sku: &str) -> Result<Vec<Listing>> {
        Ok(Vec::new())
    }

    async fn update_published_quantity(&self, _listing_id: &str, _quantity: i64) -> Result<()> {
        Ok(())
    }

    async fn set_listing_status(&self, _listing_id: &str, _status: ListingStatus) -> Result<()> {
        Ok(())
    }
}

pub(crate) struct EmptyOrders;

#[async_trait]
impl OrderRepository for EmptyOrders {
    async fn insert_pending_with_reservation(&self, _order: &Order) -> Result<Reservation> {
        Ok(Reservation::Acquired)
    }

    async fn find_by_marketplace_id(&self, _marketplace_order_id: &str) -> Result<Option<Order>> {
        Ok(None)
    }

    async fn set_supplier_reference(
        &self,
        _marketplace_order_id: &str,
        _supplier: Supplier,
        _supplier_order_ref: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn set_order_status(
        &self,
        _marketplace_order_id: &str,
        _status: FulfillmentStatus,
    ) -> Result<()> {
        Ok(())
    }
}

pub(crate) struct NoopLedger;

#[async_trait]
impl SyncLedger for NoopLedger {
    async fn reserve(&self, _op: OperationType, _key: &str) -> Result<Reservation> {
        Ok(Reservation::Acquired)
    }

    async fn commit(
        &self,
        _op: OperationType,
        _key: &str,
        _status: LedgerStatus,
        _result_json: Option<String>,
    ) -> Result<()> {
        Ok(())
    }
}

pub(crate) struct NoopClassifier;

#[async_trait]
impl SupplierClassifier for NoopClassifier {
    async fn suggest_supplier(&self, _context: &OrderContext) -> Result<SupplierSuggestion> {
        Err(SyncError::Transient("classifier unavailable".into()))
    }
}

/// Engine with no stores, no products and no pending orders. Scheduler
/// loops tick against it without doing any work.
pub(crate) fn idle_engine() -> Arc<SyncEngine> {
    let stores: Arc<dyn StoreRepository> = Arc::new(EmptyStores);
    let ledger: Arc<dyn SyncLedger> = Arc::new(NoopLedger);
    let marketplaces = Arc::new(MarketplaceRegistry::new());
    let suppliers = Arc::new(SupplierRegistry::new());

    let credentials = Arc::new(CredentialService::new(
        Arc::clone(&stores),
        Arc::new(EmptyCredentials),
        Arc::clone(&ledger),
        Arc::clone(&marketplaces),
        CredentialConfig::default(),
    ));
    let reconciler = Arc::new(ReconcileService::new(
        Arc::new(EmptyProducts),
        Arc::new(EmptyListings),
        Arc::clone(&stores),
        Arc::clone(&credentials),
        Arc::clone(&marketplaces),
        Arc::clone(&suppliers),
        Arc::clone(&ledger),
        ReconcileConfig::default(),
    ));
    let router = Arc::new(OrderRouter::new(
        Arc::new(EmptyOrders),
        Arc::new(EmptyProducts),
        suppliers,
        Arc::new(NoopClassifier),
        ledger,
        RoutingConfig::default(),
    ));

    Arc::new(SyncEngine::new(credentials, reconciler, router))
}
