//! Synchronization engine facade
//!
//! Bundles the three services behind the trigger entry points the
//! schedulers and webhook host call. Construction wiring lives in the
//! infrastructure crate.

use std::sync::Arc;

use shopsync_domain::{MarketplaceOrderPayload, Result, RoutingResult};

use crate::credentials::service::{CredentialService, RefreshSweepReport};
use crate::inventory::service::{ReconcileService, ReconcileSweepReport};
use crate::orders::service::OrderRouter;

/// Entry points for the multi-store synchronization engine.
pub struct SyncEngine {
    credentials: Arc<CredentialService>,
    reconciler: Arc<ReconcileService>,
    router: Arc<OrderRouter>,
}

impl SyncEngine {
    pub fn new(
        credentials: Arc<CredentialService>,
        reconciler: Arc<ReconcileService>,
        router: Arc<OrderRouter>,
    ) -> Self {
        Self { credentials, reconciler, router }
    }

    /// Proactively refresh credentials that expire soon.
    pub async fn refresh_credentials(&self) -> Result<RefreshSweepReport> {
        self.credentials.refresh_due().await
    }

    /// Reconcile one product, or sweep the whole active catalog.
    pub async fn reconcile_inventory(&self, sku: Option<&str>) -> Result<ReconcileSweepReport> {
        match sku {
            Some(sku) => {
                let result = self.reconciler.reconcile(sku).await?;
                Ok(ReconcileSweepReport::from_single(&result))
            }
            None => self.reconciler.reconcile_all().await,
        }
    }

    /// Route one inbound marketplace order, idempotently.
    pub async fn process_order(&self, payload: MarketplaceOrderPayload) -> Result<RoutingResult> {
        self.router.route_order(payload).await
    }

    pub fn credentials(&self) -> &Arc<CredentialService> {
        &self.credentials
    }

    pub fn reconciler(&self) -> &Arc<ReconcileService> {
        &self.reconciler
    }

    pub fn router(&self) -> &Arc<OrderRouter> {
        &self.router
    }
}
