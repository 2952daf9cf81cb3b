//! External client capabilities
//!
//! Marketplace, supplier, and classifier endpoints are modeled as small
//! capability traits with one implementation per remote system, selected
//! by a registry lookup on platform or supplier name.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shopsync_domain::{
    Credential, Destination, MarketplaceOrderPayload, OrderContext, Platform, Result, Supplier,
    SupplierSuggestion, TokenRefresh,
};

/// Capability interface for one marketplace platform.
#[async_trait]
pub trait MarketplaceClient: Send + Sync {
    /// Exchange a refresh token for a new token pair.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefresh>;

    /// Push a corrective quantity update to a published listing.
    async fn update_listing_quantity(
        &self,
        credential: &Credential,
        marketplace_listing_id: &str,
        quantity: i64,
    ) -> Result<()>;

    /// Fetch orders created since the given instant.
    async fn get_new_orders(
        &self,
        credential: &Credential,
        since: DateTime<Utc>,
    ) -> Result<Vec<MarketplaceOrderPayload>>;
}

/// Capability interface for one upstream supplier.
#[async_trait]
pub trait SupplierClient: Send + Sync {
    /// The supplier this client talks to.
    fn supplier(&self) -> Supplier;

    /// Current sellable stock for a supplier SKU.
    async fn get_stock(&self, supplier_sku: &str) -> Result<i64>;

    /// Place a fulfillment order; returns the supplier's order reference.
    async fn place_order(
        &self,
        supplier_sku: &str,
        quantity: i64,
        destination: &Destination,
    ) -> Result<String>;
}

/// Advisory supplier classifier. Best effort, never authoritative: callers
/// fall back to the product's bound supplier on any failure.
#[async_trait]
pub trait SupplierClassifier: Send + Sync {
    async fn suggest_supplier(&self, context: &OrderContext) -> Result<SupplierSuggestion>;
}

/// Marketplace clients keyed by platform.
#[derive(Default)]
pub struct MarketplaceRegistry {
    clients: HashMap<Platform, Arc<dyn MarketplaceClient>>,
}

impl MarketplaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_client(mut self, platform: Platform, client: Arc<dyn MarketplaceClient>) -> Self {
        self.clients.insert(platform, client);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn MarketplaceClient>> {
        self.clients.get(&platform).map(Arc::clone)
    }
}

/// Supplier clients keyed by supplier name.
#[derive(Default)]
pub struct SupplierRegistry {
    clients: HashMap<Supplier, Arc<dyn SupplierClient>>,
}

impl SupplierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_client(mut self, client: Arc<dyn SupplierClient>) -> Self {
        self.clients.insert(client.supplier(), client);
        self
    }

    pub fn get(&self, supplier: Supplier) -> Option<Arc<dyn SupplierClient>> {
        self.clients.get(&supplier).map(Arc::clone)
    }

    pub fn contains(&self, supplier: Supplier) -> bool {
        self.clients.contains_key(&supplier)
    }
}
