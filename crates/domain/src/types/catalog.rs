//! Products, suppliers and marketplace listings

use serde::{Deserialize, Serialize};

/// Upstream supplier of physical stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Supplier {
    Amazon,
    Cj,
    Eprolo,
}

crate::impl_status_conversions!(Supplier {
    Amazon => "amazon",
    Cj => "cj",
    Eprolo => "eprolo",
});

impl Supplier {
    /// All known suppliers, used to validate classifier suggestions.
    pub const ALL: [Supplier; 3] = [Supplier::Amazon, Supplier::Cj, Supplier::Eprolo];
}

/// A sourceable item. Never deleted, only deactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub sku: String,
    /// Supplier this product is bound to (default routing target).
    pub supplier: Supplier,
    pub supplier_sku: String,
    pub cost_cents: i64,
    /// Last known supplier stock, updated by the reconciler.
    pub supplier_stock: i64,
    pub active: bool,
}

/// Listing lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Ended,
    Sold,
    Error,
}

crate::impl_status_conversions!(ListingStatus {
    Active => "active",
    Ended => "ended",
    Sold => "sold",
    Error => "error",
});

/// Projection of one product onto one store. Unique per (store, product).
///
/// Invariant: `published_quantity` must never exceed the product's last
/// known supplier stock; the reconciler enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub store_id: String,
    pub product_sku: String,
    pub marketplace_listing_id: String,
    pub published_quantity: i64,
    pub status: ListingStatus,
}

/// Outcome of reconciling a single product against its supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReconcileResult {
    /// Supplier stock matches the stored figure; nothing written.
    Unchanged { stock: i64 },
    /// Stock changed; listings were corrected where needed.
    Updated {
        previous_stock: i64,
        current_stock: i64,
        listings_corrected: usize,
        listings_errored: usize,
    },
    /// Product not eligible for reconciliation (e.g. inactive).
    Skipped { reason: String },
}
