//! Inventory reconciliation service
//!
//! Pulls the supplier's current stock for each product and pushes
//! corrective quantity updates to every affected listing. The hard rule:
//! a published quantity may never exceed the last known supplier stock.
//! Decrease corrections are mandatory and also repair listings already in
//! the error state; opportunistic increases touch only healthy listings.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::json;
use shopsync_common::{run_with_retry, RetryConfig, RetryError};
use shopsync_domain::{
    LedgerStatus, Listing, ListingStatus, OperationType, ReconcileConfig, ReconcileResult, Result,
    SyncError,
};
use tracing::{debug, error, info, instrument, warn};

use crate::clients::{MarketplaceRegistry, SupplierRegistry};
use crate::credentials::service::CredentialService;
use crate::credentials::ports::StoreRepository;
use crate::inventory::ports::{ListingRepository, ProductRepository};
use crate::ledger::{Reservation, SyncLedger};

/// Outcome counts for one reconciliation sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileSweepReport {
    pub products: usize,
    pub unchanged: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ReconcileSweepReport {
    /// Report for a single on-demand reconciliation.
    pub fn from_single(result: &ReconcileResult) -> Self {
        let mut report = Self { products: 1, ..Self::default() };
        match result {
            ReconcileResult::Unchanged { .. } => report.unchanged = 1,
            ReconcileResult::Updated { .. } => report.updated = 1,
            ReconcileResult::Skipped { .. } => report.skipped = 1,
        }
        report
    }
}

/// Keeps published listing quantities consistent with supplier stock.
pub struct ReconcileService {
    products: Arc<dyn ProductRepository>,
    listings: Arc<dyn ListingRepository>,
    stores: Arc<dyn StoreRepository>,
    credentials: Arc<CredentialService>,
    marketplaces: Arc<MarketplaceRegistry>,
    suppliers: Arc<SupplierRegistry>,
    ledger: Arc<dyn SyncLedger>,
    config: ReconcileConfig,
}

impl ReconcileService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        products: Arc<dyn ProductRepository>,
        listings: Arc<dyn ListingRepository>,
        stores: Arc<dyn StoreRepository>,
        credentials: Arc<CredentialService>,
        marketplaces: Arc<MarketplaceRegistry>,
        suppliers: Arc<SupplierRegistry>,
        ledger: Arc<dyn SyncLedger>,
        config: ReconcileConfig,
    ) -> Self {
        Self { products, listings, stores, credentials, marketplaces, suppliers, ledger, config }
    }

    /// Reconcile one product against its supplier.
    #[instrument(skip(self), fields(sku = %sku))]
    pub async fn reconcile(&self, sku: &str) -> Result<ReconcileResult> {
        let product = self.products.get_product(sku).await?;
        if !product.active {
            return Ok(ReconcileResult::Skipped { reason: "product is inactive".into() });
        }

        let supplier = self.suppliers.get(product.supplier).ok_or_else(|| {
            SyncError::Config(format!("no supplier client registered for {}", product.supplier))
        })?;

        let retry_config = RetryConfig {
            max_attempts: self.config.update_max_attempts,
            ..RetryConfig::default()
        };
        let call_timeout = Duration::from_secs(self.config.supplier_timeout_secs);
        let supplier_sku = product.supplier_sku.clone();

        let stock = run_with_retry(&retry_config, SyncError::is_transient, || {
            let supplier = Arc::clone(&supplier);
            let supplier_sku = supplier_sku.clone();
            async move {
                match tokio::time::timeout(call_timeout, supplier.get_stock(&supplier_sku)).await {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::Transient("supplier stock lookup timed out".into())),
                }
            }
        })
        .await
        .map_err(RetryError::into_inner)?;

        if stock < 0 {
            return Err(SyncError::Validation(format!(
                "supplier reported negative stock {stock} for {sku}"
            )));
        }

        let previous = product.supplier_stock;
        if stock == previous {
            return Ok(ReconcileResult::Unchanged { stock });
        }

        // Persist the observed figure before touching listings so a partial
        // failure still leaves the next sweep working from fresh data.
        self.products.update_supplier_stock(sku, stock).await?;

        let decreased = stock < previous;
        let mut corrected = 0;
        let mut errored = 0;

        for listing in self.listings.list_for_product(sku).await? {
            let oversold = listing.published_quantity > stock;
            let must_correct =
                oversold && matches!(listing.status, ListingStatus::Active | ListingStatus::Error);
            let opportunistic = !decreased
                && listing.status == ListingStatus::Active
                && listing.published_quantity < stock;
            if !must_correct && !opportunistic {
                continue;
            }

            match self.push_listing_quantity(&listing, stock).await {
                Ok(()) => corrected += 1,
                Err(SyncError::Conflict(_)) => {
                    debug!(listing_id = %listing.id, "listing update already owned elsewhere");
                }
                Err(err) => {
                    warn!(listing_id = %listing.id, error = %err, "listing correction failed");
                    if let Err(mark_err) =
                        self.listings.set_listing_status(&listing.id, ListingStatus::Error).await
                    {
                        error!(listing_id = %listing.id, error = %mark_err,
                            "failed to mark listing as errored");
                    }
                    errored += 1;
                }
            }
        }

        info!(previous, stock, corrected, errored, "product reconciled");
        Ok(ReconcileResult::Updated {
            previous_stock: previous,
            current_stock: stock,
            listings_corrected: corrected,
            listings_errored: errored,
        })
    }

    /// Reconcile every active product with bounded concurrency.
    #[instrument(skip(self))]
    pub async fn reconcile_all(&self) -> Result<ReconcileSweepReport> {
        let skus = self.products.list_active_skus().await?;
        let mut report = ReconcileSweepReport { products: skus.len(), ..Default::default() };

        let mut results = stream::iter(skus.into_iter().map(|sku| async move {
            let result = self.reconcile(&sku).await;
            (sku, result)
        }))
        .buffer_unordered(self.config.max_concurrency.max(1));

        while let Some((sku, result)) = results.next().await {
            match result {
                Ok(ReconcileResult::Unchanged { .. }) => report.unchanged += 1,
                Ok(ReconcileResult::Updated { .. }) => report.updated += 1,
                Ok(ReconcileResult::Skipped { .. }) => report.skipped += 1,
                Err(err) => {
                    warn!(sku = %sku, error = %err, "product reconciliation failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            products = report.products,
            updated = report.updated,
            failed = report.failed,
            "reconciliation sweep finished"
        );
        Ok(report)
    }

    /// Push one corrective quantity to the marketplace, guarded by a ledger
    /// reservation on `(listing, target quantity)`. Completed writes are
    /// skipped; a recorded failure is retried, since a correction stays
    /// mandatory until a write for its quantity has actually succeeded.
    async fn push_listing_quantity(&self, listing: &Listing, quantity: i64) -> Result<()> {
        let key = format!("{}:{quantity}", listing.id);
        match self.ledger.reserve(OperationType::ListingUpdate, &key).await? {
            Reservation::Acquired => {}
            Reservation::Completed { status: LedgerStatus::Completed, .. } => return Ok(()),
            Reservation::Completed { .. } => {
                debug!(%key, "retrying a previously failed listing update");
            }
            Reservation::InFlight => {
                return Err(SyncError::Conflict(format!("listing update {key} is in flight")));
            }
        }

        let outcome = self.send_quantity_update(listing, quantity).await;
        match outcome {
            Ok(()) => {
                self.listings.update_published_quantity(&listing.id, quantity).await?;
                if listing.status == ListingStatus::Error {
                    // A successful write clears the error state.
                    self.listings.set_listing_status(&listing.id, ListingStatus::Active).await?;
                }
                self.ledger
                    .commit(OperationType::ListingUpdate, &key, LedgerStatus::Completed, None)
                    .await?;
                Ok(())
            }
            Err(err) => {
                let result = json!({ "error": err.to_string() });
                self.ledger
                    .commit(
                        OperationType::ListingUpdate,
                        &key,
                        LedgerStatus::Failed,
                        Some(result.to_string()),
                    )
                    .await?;
                Err(err)
            }
        }
    }

    async fn send_quantity_update(&self, listing: &Listing, quantity: i64) -> Result<()> {
        let store = self.stores.get_store(&listing.store_id).await?;
        let credential = self.credentials.ensure_valid(&store.id).await?;
        let client = self.marketplaces.get(store.platform).ok_or_else(|| {
            SyncError::Config(format!("no marketplace client registered for {}", store.platform))
        })?;

        let retry_config = RetryConfig {
            max_attempts: self.config.update_max_attempts,
            ..RetryConfig::default()
        };
        run_with_retry(&retry_config, SyncError::is_transient, || {
            let client = Arc::clone(&client);
            let credential = credential.clone();
            let listing_id = listing.marketplace_listing_id.clone();
            async move {
                client.update_listing_quantity(&credential, &listing_id, quantity).await
            }
        })
        .await
        .map_err(RetryError::into_inner)
    }
}
