//! Order routing service
//!
//! Each inbound marketplace order is routed exactly once: the order row
//! and its ledger reservation are created atomically, a supplier is
//! chosen (classifier first, bound supplier as fallback), the supplier
//! order is placed, and the outcome is committed. Replays return the
//! committed outcome instead of placing a second supplier order.

use std::sync::Arc;
use std::time::Duration;

use shopsync_common::{run_with_retry, RetryConfig};
use shopsync_domain::{
    FulfillmentStatus, LedgerStatus, MarketplaceOrderPayload, OperationType, OrderContext,
    Product, Result, RoutingConfig, RoutingResult, Supplier, SyncError,
};
use tracing::{debug, error, info, instrument, warn};

use crate::clients::{SupplierClassifier, SupplierRegistry};
use crate::inventory::ports::ProductRepository;
use crate::ledger::{Reservation, SyncLedger};
use crate::orders::ports::OrderRepository;

/// Routes marketplace orders to supplier orders, idempotently.
pub struct OrderRouter {
    orders: Arc<dyn OrderRepository>,
    products: Arc<dyn ProductRepository>,
    suppliers: Arc<SupplierRegistry>,
    classifier: Arc<dyn SupplierClassifier>,
    ledger: Arc<dyn SyncLedger>,
    config: RoutingConfig,
}

impl OrderRouter {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        products: Arc<dyn ProductRepository>,
        suppliers: Arc<SupplierRegistry>,
        classifier: Arc<dyn SupplierClassifier>,
        ledger: Arc<dyn SyncLedger>,
        config: RoutingConfig,
    ) -> Self {
        Self { orders, products, suppliers, classifier, ledger, config }
    }

    /// Route one inbound order. Safe to call any number of times with the
    /// same marketplace order id.
    #[instrument(skip(self, payload), fields(order_id = %payload.marketplace_order_id))]
    pub async fn route_order(&self, payload: MarketplaceOrderPayload) -> Result<RoutingResult> {
        if payload.quantity <= 0 {
            return Err(SyncError::Validation(format!(
                "order {} has non-positive quantity {}",
                payload.marketplace_order_id, payload.quantity
            )));
        }

        let order_id = payload.marketplace_order_id.clone();
        let order = payload.clone().into_pending_order();
        match self.orders.insert_pending_with_reservation(&order).await? {
            Reservation::Acquired => {}
            Reservation::Completed { result_json: Some(json), .. } => {
                debug!("duplicate delivery, returning recorded outcome");
                let prior: RoutingResult = serde_json::from_str(&json).map_err(|err| {
                    SyncError::Internal(format!(
                        "recorded routing outcome for {order_id} is unreadable: {err}"
                    ))
                })?;
                return Ok(prior);
            }
            Reservation::Completed { result_json: None, .. } => {
                // Terminal entry without a payload; rebuild from the row.
                let existing =
                    self.orders.find_by_marketplace_id(&order_id).await?.ok_or_else(|| {
                        SyncError::Internal(format!(
                            "routing for {order_id} is recorded but the order row is missing"
                        ))
                    })?;
                return Ok(RoutingResult {
                    marketplace_order_id: order_id,
                    supplier: existing.supplier,
                    supplier_order_ref: existing.supplier_order_ref,
                    status: existing.status,
                    fallback_used: false,
                });
            }
            Reservation::InFlight => {
                return Err(SyncError::Conflict(format!(
                    "routing for order {order_id} is already in flight"
                )));
            }
        }

        let product = self.products.get_product(&payload.product_sku).await?;
        let (supplier, fallback_used) = self.choose_supplier(&payload, &product).await;

        match self.place_supplier_order(&payload, &product, supplier).await {
            Ok(supplier_order_ref) => {
                self.orders
                    .set_supplier_reference(&order_id, supplier, &supplier_order_ref)
                    .await?;
                let result = RoutingResult {
                    marketplace_order_id: order_id.clone(),
                    supplier: Some(supplier),
                    supplier_order_ref: Some(supplier_order_ref),
                    status: FulfillmentStatus::Processing,
                    fallback_used,
                };
                self.commit_outcome(&order_id, LedgerStatus::Completed, &result).await?;
                info!(supplier = %supplier, fallback_used, "order routed");
                Ok(result)
            }
            Err(err) => {
                error!(error = %err, "supplier order placement failed, order needs review");
                self.orders.set_order_status(&order_id, FulfillmentStatus::Error).await?;
                let result = RoutingResult {
                    marketplace_order_id: order_id.clone(),
                    supplier: Some(supplier),
                    supplier_order_ref: None,
                    status: FulfillmentStatus::Error,
                    fallback_used,
                };
                self.commit_outcome(&order_id, LedgerStatus::Failed, &result).await?;
                Ok(result)
            }
        }
    }

    /// Ask the classifier for a supplier; fall back to the product's bound
    /// supplier on timeout, failure, or an unusable suggestion.
    async fn choose_supplier(
        &self,
        payload: &MarketplaceOrderPayload,
        product: &Product,
    ) -> (Supplier, bool) {
        let context = OrderContext {
            product_sku: product.sku.clone(),
            supplier_sku: product.supplier_sku.clone(),
            quantity: payload.quantity,
            destination_country: payload.destination.country_code.clone(),
        };
        let call_timeout = Duration::from_secs(self.config.classifier_timeout_secs);

        match tokio::time::timeout(call_timeout, self.classifier.suggest_supplier(&context)).await {
            Ok(Ok(suggestion)) => match suggestion.supplier.parse::<Supplier>() {
                Ok(suggested) if self.suppliers.contains(suggested) => (suggested, false),
                Ok(suggested) => {
                    warn!(supplier = %suggested, "no client for suggested supplier, using bound");
                    (product.supplier, true)
                }
                Err(_) => {
                    warn!(supplier = %suggestion.supplier, "unknown supplier suggested, using bound");
                    (product.supplier, true)
                }
            },
            Ok(Err(err)) => {
                warn!(error = %err, "classifier call failed, using bound supplier");
                (product.supplier, true)
            }
            Err(_) => {
                warn!("classifier call timed out, using bound supplier");
                (product.supplier, true)
            }
        }
    }

    async fn place_supplier_order(
        &self,
        payload: &MarketplaceOrderPayload,
        product: &Product,
        supplier: Supplier,
    ) -> Result<String> {
        let client = self.suppliers.get(supplier).ok_or_else(|| {
            SyncError::Config(format!("no supplier client registered for {supplier}"))
        })?;

        let retry_config = RetryConfig {
            max_attempts: self.config.place_order_max_attempts,
            ..RetryConfig::default()
        };
        let call_timeout = Duration::from_secs(self.config.placement_timeout_secs);

        run_with_retry(&retry_config, SyncError::is_transient, || {
            let client = Arc::clone(&client);
            let supplier_sku = product.supplier_sku.clone();
            let destination = payload.destination.clone();
            let quantity = payload.quantity;
            async move {
                match tokio::time::timeout(
                    call_timeout,
                    client.place_order(&supplier_sku, quantity, &destination),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        Err(SyncError::Transient("supplier order placement timed out".into()))
                    }
                }
            }
        })
        .await
        .map_err(shopsync_common::RetryError::into_inner)
    }

    async fn commit_outcome(
        &self,
        order_id: &str,
        status: LedgerStatus,
        result: &RoutingResult,
    ) -> Result<()> {
        let json = serde_json::to_string(result).map_err(|err| {
            SyncError::Internal(format!("routing outcome for {order_id} is unserializable: {err}"))
        })?;
        self.ledger.commit(OperationType::OrderRouting, order_id, status, Some(json)).await
    }
}
