//! Persistence ports for products and listings.

use async_trait::async_trait;
use shopsync_domain::{Listing, ListingStatus, Product, Result};

/// Product catalog access.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn get_product(&self, sku: &str) -> Result<Product>;

    /// SKUs of every active product, in stable order.
    async fn list_active_skus(&self) -> Result<Vec<String>>;

    /// Persist the freshly observed supplier stock figure.
    async fn update_supplier_stock(&self, sku: &str, stock: i64) -> Result<()>;
}

/// Listing access across all stores.
#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// Every listing projecting the given product, across all stores.
    async fn list_for_product(&self, sku: &str) -> Result<Vec<Listing>>;

    async fn update_published_quantity(&self, listing_id: &str, quantity: i64) -> Result<()>;

    async fn set_listing_status(&self, listing_id: &str, status: ListingStatus) -> Result<()>;
}
