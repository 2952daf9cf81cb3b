//! Credential refresh service
//!
//! Keeps access tokens valid ahead of use. Refreshes are serialized twice:
//! a per-store async mutex collapses concurrent local callers, and a sync
//! ledger reservation keyed on the superseded access expiry guarantees
//! each token generation is refreshed at most once across triggers.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::json;
use shopsync_common::{run_with_retry, RetryConfig};
use shopsync_domain::{
    Credential, CredentialConfig, LedgerStatus, OperationType, Result, Store, StoreStatus,
    SyncError,
};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::clients::MarketplaceRegistry;
use crate::credentials::ports::{CredentialRepository, StoreRepository};
use crate::ledger::{Reservation, SyncLedger};

/// Outcome counts for one proactive refresh sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefreshSweepReport {
    /// Stores whose access token fell inside the lookahead window.
    pub due: usize,
    pub refreshed: usize,
    /// Refreshes already owned by another trigger.
    pub in_flight: usize,
    /// Stores deactivated because their refresh token expired.
    pub deactivated: usize,
    pub failed: usize,
}

/// Single entry point for marketplace authentication.
pub struct CredentialService {
    stores: Arc<dyn StoreRepository>,
    credentials: Arc<dyn CredentialRepository>,
    ledger: Arc<dyn SyncLedger>,
    marketplaces: Arc<MarketplaceRegistry>,
    config: CredentialConfig,
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CredentialService {
    pub fn new(
        stores: Arc<dyn StoreRepository>,
        credentials: Arc<dyn CredentialRepository>,
        ledger: Arc<dyn SyncLedger>,
        marketplaces: Arc<MarketplaceRegistry>,
        config: CredentialConfig,
    ) -> Self {
        Self { stores, credentials, ledger, marketplaces, config, refresh_locks: DashMap::new() }
    }

    /// Return a credential valid for at least the configured safety margin,
    /// refreshing it first if necessary.
    ///
    /// Errors: [`SyncError::CredentialExpired`] when the refresh token is
    /// dead (the store is deactivated as a side effect),
    /// [`SyncError::Conflict`] when another trigger owns the refresh.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn ensure_valid(&self, store_id: &str) -> Result<Credential> {
        self.ensure_valid_within(store_id, self.config.safety_margin_secs).await
    }

    /// Like [`ensure_valid`](Self::ensure_valid) with an explicit freshness
    /// margin. The sweep passes the lookahead window here so tokens are
    /// renewed well before on-demand callers would need them.
    async fn ensure_valid_within(&self, store_id: &str, margin_secs: i64) -> Result<Credential> {
        let lock = self.refresh_lock(store_id);
        let _guard = lock.lock().await;

        let store = self.stores.get_store(store_id).await?;
        if store.status == StoreStatus::Inactive {
            return Err(SyncError::CredentialExpired(format!(
                "store {store_id} is inactive and must be re-onboarded"
            )));
        }

        let current = self.credentials.current(store_id).await?.ok_or_else(|| {
            SyncError::NotFound(format!("no credential on file for store {store_id}"))
        })?;

        if current.access_valid_for(margin_secs) {
            return Ok(current);
        }

        if current.is_refresh_expired() {
            self.stores.set_store_status(store_id, StoreStatus::Inactive).await?;
            warn!(store_id, "refresh token expired, store deactivated");
            return Err(SyncError::CredentialExpired(format!(
                "refresh token for store {store_id} has expired"
            )));
        }

        // One refresh per token generation: the key embeds the expiry of
        // the access token being superseded.
        let key = format!("{store_id}:{}", current.access_expires_at.timestamp());
        match self.ledger.reserve(OperationType::CredentialRefresh, &key).await? {
            Reservation::Acquired => self.refresh_credential(&store, current, &key).await,
            Reservation::Completed { status: LedgerStatus::Completed, .. } => {
                // Another trigger refreshed this generation; re-read the row.
                let fresh = self.credentials.current(store_id).await?.ok_or_else(|| {
                    SyncError::Internal(format!(
                        "refresh recorded for store {store_id} but no credential row exists"
                    ))
                })?;
                if fresh.access_valid_for(0) {
                    Ok(fresh)
                } else {
                    Err(SyncError::Transient(format!(
                        "recorded refresh for store {store_id} is already stale"
                    )))
                }
            }
            Reservation::Completed { .. } => Err(SyncError::CredentialExpired(format!(
                "credential refresh for store {store_id} previously failed"
            ))),
            Reservation::InFlight => Err(SyncError::Conflict(format!(
                "credential refresh for store {store_id} is already in flight"
            ))),
        }
    }

    /// Proactively refresh every store whose access token expires within
    /// the lookahead window. Inactive stores are never considered.
    #[instrument(skip(self))]
    pub async fn refresh_due(&self) -> Result<RefreshSweepReport> {
        let stores = self.stores.list_active_stores().await?;
        let mut report = RefreshSweepReport::default();

        for store in stores {
            let Some(credential) = self.credentials.current(&store.id).await? else {
                continue;
            };
            if credential.access_valid_for(self.config.lookahead_secs) {
                continue;
            }
            report.due += 1;
            match self.ensure_valid_within(&store.id, self.config.lookahead_secs).await {
                Ok(_) => report.refreshed += 1,
                Err(SyncError::Conflict(_)) => report.in_flight += 1,
                Err(SyncError::CredentialExpired(_)) => report.deactivated += 1,
                Err(err) => {
                    warn!(store_id = %store.id, error = %err, "credential refresh failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            due = report.due,
            refreshed = report.refreshed,
            deactivated = report.deactivated,
            failed = report.failed,
            "credential sweep finished"
        );
        Ok(report)
    }

    async fn refresh_credential(
        &self,
        store: &Store,
        current: Credential,
        key: &str,
    ) -> Result<Credential> {
        let client = self.marketplaces.get(store.platform).ok_or_else(|| {
            SyncError::Config(format!("no marketplace client registered for {}", store.platform))
        })?;

        let retry_config =
            RetryConfig { max_attempts: self.config.refresh_max_attempts, ..RetryConfig::default() };
        let call_timeout = Duration::from_secs(self.config.refresh_timeout_secs);
        let refresh_token = current.refresh_token.clone();

        let outcome = run_with_retry(&retry_config, SyncError::is_transient, || {
            let client = Arc::clone(&client);
            let refresh_token = refresh_token.clone();
            async move {
                match tokio::time::timeout(call_timeout, client.refresh_token(&refresh_token)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::Transient("token refresh call timed out".into())),
                }
            }
        })
        .await;

        match outcome {
            Ok(refreshed) => {
                let credential = Credential {
                    store_id: store.id.clone(),
                    access_token: refreshed.access_token,
                    refresh_token: refreshed.refresh_token.unwrap_or(current.refresh_token),
                    access_expires_at: refreshed.access_expires_at,
                    refresh_expires_at: refreshed
                        .refresh_expires_at
                        .unwrap_or(current.refresh_expires_at),
                };
                self.credentials.replace(&credential).await?;
                let result = json!({ "access_expires_at": credential.access_expires_at });
                self.ledger
                    .commit(
                        OperationType::CredentialRefresh,
                        key,
                        LedgerStatus::Completed,
                        Some(result.to_string()),
                    )
                    .await?;
                info!(store_id = %store.id, "access token refreshed");
                Ok(credential)
            }
            Err(err) => {
                let err = err.into_inner();
                if matches!(err, SyncError::CredentialExpired(_)) {
                    // The platform rejected the refresh token outright.
                    self.stores.set_store_status(&store.id, StoreStatus::Inactive).await?;
                    let result = json!({ "error": err.to_string() });
                    self.ledger
                        .commit(
                            OperationType::CredentialRefresh,
                            key,
                            LedgerStatus::Failed,
                            Some(result.to_string()),
                        )
                        .await?;
                    warn!(store_id = %store.id, "refresh token rejected, store deactivated");
                } else {
                    // Transient exhaustion leaves the reservation pending so
                    // a later sweep can re-claim it once the lease expires.
                    warn!(store_id = %store.id, error = %err, "token refresh attempts exhausted");
                }
                Err(err)
            }
        }
    }

    fn refresh_lock(&self, store_id: &str) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(store_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
