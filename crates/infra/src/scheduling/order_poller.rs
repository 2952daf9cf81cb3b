//! Marketplace order polling loop.
//!
//! On every tick the poller asks each active store's marketplace for
//! orders created since the previous tick and feeds them through the
//! engine. The routing ledger makes delivery at-least-once safe, so a
//! payload seen twice surfaces as a conflict and is absorbed here.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use shopsync_core::{CredentialService, MarketplaceRegistry, StoreRepository, SyncEngine};
use shopsync_domain::SyncError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::error::{SchedulerError, SchedulerResult};
use super::JOIN_TIMEOUT;

type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Outcome of one polling pass over all active stores.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub stores: usize,
    pub fetched: usize,
    pub routed: usize,
    pub conflicts: usize,
    pub failures: usize,
}

struct PollContext {
    stores: Arc<dyn StoreRepository>,
    credentials: Arc<CredentialService>,
    marketplaces: Arc<MarketplaceRegistry>,
    engine: Arc<SyncEngine>,
    fetch_timeout: Duration,
}

pub struct OrderPoller {
    stores: Arc<dyn StoreRepository>,
    credentials: Arc<CredentialService>,
    marketplaces: Arc<MarketplaceRegistry>,
    engine: Arc<SyncEngine>,
    interval: Duration,
    fetch_timeout: Duration,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl OrderPoller {
    pub fn new(
        stores: Arc<dyn StoreRepository>,
        credentials: Arc<CredentialService>,
        marketplaces: Arc<MarketplaceRegistry>,
        engine: Arc<SyncEngine>,
        interval: Duration,
    ) -> Self {
        Self {
            stores,
            credentials,
            marketplaces,
            engine,
            interval,
            fetch_timeout: Duration::from_secs(60),
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!(interval_secs = self.interval.as_secs(), "starting order poller");

        self.cancellation_token = CancellationToken::new();

        let context = PollContext {
            stores: Arc::clone(&self.stores),
            credentials: Arc::clone(&self.credentials),
            marketplaces: Arc::clone(&self.marketplaces),
            engine: Arc::clone(&self.engine),
            fetch_timeout: self.fetch_timeout,
        };
        let interval = self.interval;
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::poll_loop(context, interval, cancel).await;
        });
        *self.task_handle.lock().await = Some(handle);

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("stopping order poller");
        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            tokio::time::timeout(JOIN_TIMEOUT, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: JOIN_TIMEOUT, source })??;
        }

        info!("order poller stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    async fn poll_loop(context: PollContext, interval: Duration, cancel: CancellationToken) {
        // Orders created before the poller starts are assumed handled by
        // the previous run; the ledger absorbs any overlap regardless.
        let mut since = Utc::now();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("order poll loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let tick_started = Utc::now();
                    let report = Self::poll_stores(&context, since).await;
                    if report.fetched > 0 || report.failures > 0 {
                        info!(
                            stores = report.stores,
                            fetched = report.fetched,
                            routed = report.routed,
                            conflicts = report.conflicts,
                            failures = report.failures,
                            "order poll completed"
                        );
                    } else {
                        debug!(stores = report.stores, "order poll found nothing new");
                    }
                    since = tick_started;
                }
            }
        }
    }

    async fn poll_stores(context: &PollContext, since: DateTime<Utc>) -> PollReport {
        let mut report = PollReport::default();

        let stores = match context.stores.list_active_stores().await {
            Ok(stores) => stores,
            Err(err) => {
                error!(error = %err, "order poll cannot list stores");
                report.failures += 1;
                return report;
            }
        };
        report.stores = stores.len();

        for store in stores {
            let credential = match context.credentials.ensure_valid(&store.id).await {
                Ok(credential) => credential,
                Err(SyncError::Conflict(_)) => {
                    // Another trigger owns the refresh; pick the store up
                    // again next tick.
                    debug!(store_id = %store.id, "credential refresh in flight, skipping store");
                    continue;
                }
                Err(err) => {
                    warn!(store_id = %store.id, error = %err, "skipping store without a usable credential");
                    report.failures += 1;
                    continue;
                }
            };

            let Some(client) = context.marketplaces.get(store.platform) else {
                warn!(store_id = %store.id, platform = %store.platform, "no marketplace client registered");
                report.failures += 1;
                continue;
            };

            let payloads = match tokio::time::timeout(
                context.fetch_timeout,
                client.get_new_orders(&credential, since),
            )
            .await
            {
                Ok(Ok(payloads)) => payloads,
                Ok(Err(err)) => {
                    warn!(store_id = %store.id, error = %err, "order fetch failed");
                    report.failures += 1;
                    continue;
                }
                Err(_) => {
                    warn!(store_id = %store.id, "order fetch timed out");
                    report.failures += 1;
                    continue;
                }
            };

            report.fetched += payloads.len();
            for payload in payloads {
                let order_id = payload.marketplace_order_id.clone();
                match context.engine.process_order(payload).await {
                    Ok(result) => {
                        debug!(order_id = %order_id, supplier = ?result.supplier, "order routed");
                        report.routed += 1;
                    }
                    Err(SyncError::Conflict(_)) => {
                        debug!(order_id = %order_id, "order already in flight");
                        report.conflicts += 1;
                    }
                    Err(err) => {
                        warn!(order_id = %order_id, error = %err, "order routing failed");
                        report.failures += 1;
                    }
                }
            }
        }

        report
    }
}

impl Drop for OrderPoller {
    fn drop(&mut self) {
        if !self.cancellation_token.is_cancelled() {
            warn!("order poller dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}
