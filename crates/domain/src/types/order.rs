//! Marketplace orders and routing results

use serde::{Deserialize, Serialize};

use super::catalog::Supplier;

/// Order fulfillment state machine.
///
/// `pending -> processing -> shipped -> delivered`, with `pending ->
/// cancelled` and `pending/processing -> error` as exceptional transitions.
/// No transition skips a state; `error` is terminal until externally
/// cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Error,
}

crate::impl_status_conversions!(FulfillmentStatus {
    Pending => "pending",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
    Error => "error",
});

impl FulfillmentStatus {
    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition(self, next: FulfillmentStatus) -> bool {
        use FulfillmentStatus::{Cancelled, Delivered, Error, Pending, Processing, Shipped};
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Pending, Error)
                | (Processing, Error)
        )
    }

    /// Terminal states admit no further automatic transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Error)
    }
}

/// Shipping destination for a supplier order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub name: String,
    pub address_line: String,
    pub city: String,
    pub postal_code: String,
    pub country_code: String,
}

/// A marketplace sale. Created once per unique marketplace order id; the
/// supplier order reference is set exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub marketplace_order_id: String,
    pub store_id: String,
    pub listing_id: String,
    pub product_sku: String,
    pub quantity: i64,
    pub total_cents: i64,
    pub currency: String,
    pub status: FulfillmentStatus,
    pub supplier: Option<Supplier>,
    pub supplier_order_ref: Option<String>,
    pub destination: Destination,
}

/// Inbound order payload as delivered by a marketplace webhook or poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceOrderPayload {
    pub marketplace_order_id: String,
    pub store_id: String,
    pub listing_id: String,
    pub product_sku: String,
    pub quantity: i64,
    pub total_cents: i64,
    pub currency: String,
    pub destination: Destination,
}

impl MarketplaceOrderPayload {
    /// Build the pending order row persisted on first observation.
    pub fn into_pending_order(self) -> Order {
        Order {
            marketplace_order_id: self.marketplace_order_id,
            store_id: self.store_id,
            listing_id: self.listing_id,
            product_sku: self.product_sku,
            quantity: self.quantity,
            total_cents: self.total_cents,
            currency: self.currency,
            status: FulfillmentStatus::Pending,
            supplier: None,
            supplier_order_ref: None,
            destination: self.destination,
        }
    }
}

/// Context handed to the supplier classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderContext {
    pub product_sku: String,
    pub supplier_sku: String,
    pub quantity: i64,
    pub destination_country: String,
}

/// Advisory supplier suggestion returned by the classifier. The supplier
/// name is raw and validated against [`Supplier`] by the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierSuggestion {
    pub supplier: String,
    pub reason: Option<String>,
    pub estimated_cost_cents: Option<i64>,
    pub estimated_days: Option<i64>,
}

/// Durable outcome of routing one marketplace order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingResult {
    pub marketplace_order_id: String,
    pub supplier: Option<Supplier>,
    pub supplier_order_ref: Option<String>,
    pub status: FulfillmentStatus,
    /// True when the classifier was unavailable or rejected and the
    /// product's bound supplier was used instead.
    pub fallback_used: bool,
}
