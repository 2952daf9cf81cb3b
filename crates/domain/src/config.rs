//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub credentials: CredentialConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "shopsync.db".to_string(), pool_size: 8 }
    }
}

/// Credential refresher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Refresh when the access token expires within this many seconds.
    pub safety_margin_secs: i64,
    /// Sweep lookahead window in seconds.
    pub lookahead_secs: i64,
    /// Attempt ceiling for the token-refresh call.
    pub refresh_max_attempts: u32,
    /// Per-call timeout for the token-refresh endpoint.
    pub refresh_timeout_secs: u64,
    /// Sweep interval in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            safety_margin_secs: constants::DEFAULT_SAFETY_MARGIN_SECS,
            lookahead_secs: constants::DEFAULT_LOOKAHEAD_SECS,
            refresh_max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            refresh_timeout_secs: 15,
            sweep_interval_secs: 900,
        }
    }
}

/// Inventory reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Products reconciled in flight at once during a sweep.
    pub max_concurrency: usize,
    /// Sweep interval in seconds.
    pub sweep_interval_secs: u64,
    /// Attempt ceiling for marketplace quantity updates.
    pub update_max_attempts: u32,
    /// Per-call timeout for supplier stock lookups.
    pub supplier_timeout_secs: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_concurrency: constants::DEFAULT_RECONCILE_CONCURRENCY,
            sweep_interval_secs: 900,
            update_max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            supplier_timeout_secs: 20,
        }
    }
}

/// Order router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Timeout for the advisory supplier classifier call.
    pub classifier_timeout_secs: u64,
    /// Attempt ceiling for supplier order placement.
    pub place_order_max_attempts: u32,
    /// Per-call timeout for supplier order placement.
    pub placement_timeout_secs: u64,
    /// Interval for polling marketplaces for new orders.
    pub poll_interval_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            classifier_timeout_secs: constants::DEFAULT_CLASSIFIER_TIMEOUT_SECS,
            place_order_max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            placement_timeout_secs: 30,
            poll_interval_secs: 300,
        }
    }
}

/// Sync ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Seconds before a pending reservation can be re-claimed.
    pub lease_secs: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { lease_secs: constants::DEFAULT_LEDGER_LEASE_SECS }
    }
}
