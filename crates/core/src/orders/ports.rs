//! Persistence port for marketplace orders.

use async_trait::async_trait;
use shopsync_domain::{FulfillmentStatus, Order, Result, Supplier};

use crate::ledger::Reservation;

/// Order row access. All writes key on the marketplace order id.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert the pending order row and reserve its routing ledger entry in
    /// one transaction. Duplicate deliveries surface through the returned
    /// [`Reservation`] without creating a second row.
    async fn insert_pending_with_reservation(&self, order: &Order) -> Result<Reservation>;

    async fn find_by_marketplace_id(&self, marketplace_order_id: &str) -> Result<Option<Order>>;

    /// Set the supplier order reference and move the order to processing.
    /// The reference is written at most once; a second write is a conflict.
    async fn set_supplier_reference(
        &self,
        marketplace_order_id: &str,
        supplier: Supplier,
        supplier_order_ref: &str,
    ) -> Result<()>;

    /// Transition the order's fulfillment status. Implementations reject
    /// transitions [`FulfillmentStatus::can_transition`] does not permit.
    async fn set_order_status(
        &self,
        marketplace_order_id: &str,
        status: FulfillmentStatus,
    ) -> Result<()>;
}
