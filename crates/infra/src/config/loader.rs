//! Configuration loader.
//!
//! Every setting has a sensible default, so loading never fails on a
//! missing value, only on a malformed one.
//!
//! ## Loading Strategy
//! 1. If any `SHOPSYNC_*` variable is set, overlay the environment on
//!    the defaults.
//! 2. Otherwise load the first config file found (TOML or JSON).
//! 3. Otherwise run on the built-in defaults.
//!
//! ## Environment Variables
//! - `SHOPSYNC_DB_PATH`: Database file path
//! - `SHOPSYNC_DB_POOL_SIZE`: Connection pool size
//! - `SHOPSYNC_CREDENTIAL_SWEEP_INTERVAL`: Credential sweep interval in seconds
//! - `SHOPSYNC_CREDENTIAL_LOOKAHEAD`: Refresh lookahead window in seconds
//! - `SHOPSYNC_RECONCILE_INTERVAL`: Reconcile sweep interval in seconds
//! - `SHOPSYNC_RECONCILE_CONCURRENCY`: Products reconciled concurrently
//! - `SHOPSYNC_ORDER_POLL_INTERVAL`: Marketplace order poll interval in seconds
//! - `SHOPSYNC_LEDGER_LEASE_SECS`: Pending reservation lease in seconds
//!
//! ## File Locations
//! Probes `./config.{toml,json}` and `./shopsync.{toml,json}`, then the
//! same names up to two parent directories, then next to the executable.

use std::path::{Path, PathBuf};

use shopsync_domain::{Config, Result, SyncError};

/// Load configuration with automatic fallback strategy.
///
/// # Errors
/// Returns [`SyncError::Config`] when a present value cannot be parsed.
pub fn load() -> Result<Config> {
    if env_is_configured() {
        let config = load_from_env()?;
        tracing::info!("configuration loaded from environment variables");
        return Ok(config);
    }

    match probe_config_paths() {
        Some(path) => load_from_file(Some(path)),
        None => {
            tracing::info!("no configuration found, using defaults");
            Ok(Config::default())
        }
    }
}

fn env_is_configured() -> bool {
    std::env::vars().any(|(key, _)| key.starts_with("SHOPSYNC_"))
}

/// Overlay `SHOPSYNC_*` environment variables on the default config.
///
/// # Errors
/// Returns [`SyncError::Config`] when a set variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    if let Ok(path) = std::env::var("SHOPSYNC_DB_PATH") {
        config.database.path = path;
    }
    if let Some(pool_size) = env_parse("SHOPSYNC_DB_POOL_SIZE")? {
        config.database.pool_size = pool_size;
    }
    if let Some(interval) = env_parse("SHOPSYNC_CREDENTIAL_SWEEP_INTERVAL")? {
        config.credentials.sweep_interval_secs = interval;
    }
    if let Some(lookahead) = env_parse("SHOPSYNC_CREDENTIAL_LOOKAHEAD")? {
        config.credentials.lookahead_secs = lookahead;
    }
    if let Some(interval) = env_parse("SHOPSYNC_RECONCILE_INTERVAL")? {
        config.reconcile.sweep_interval_secs = interval;
    }
    if let Some(concurrency) = env_parse("SHOPSYNC_RECONCILE_CONCURRENCY")? {
        config.reconcile.max_concurrency = concurrency;
    }
    if let Some(interval) = env_parse("SHOPSYNC_ORDER_POLL_INTERVAL")? {
        config.routing.poll_interval_secs = interval;
    }
    if let Some(lease) = env_parse("SHOPSYNC_LEDGER_LEASE_SECS")? {
        config.ledger.lease_secs = lease;
    }

    Ok(config)
}

/// Load configuration from a file.
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns [`SyncError::Config`] when the file is missing, the format is
/// unsupported or parsing fails.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SyncError::Config(format!("config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            SyncError::Config("no config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SyncError::Config(format!("failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SyncError::Config(format!("invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SyncError::Config(format!("invalid JSON format: {e}"))),
        _ => Err(SyncError::Config(format!("unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a config file.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.toml"),
            cwd.join("config.json"),
            cwd.join("shopsync.toml"),
            cwd.join("shopsync.json"),
            cwd.join("../config.toml"),
            cwd.join("../config.json"),
            cwd.join("../../config.toml"),
            cwd.join("../../config.json"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.toml"),
                exe_dir.join("config.json"),
                exe_dir.join("shopsync.toml"),
                exe_dir.join("shopsync.json"),
            ]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| SyncError::Config(format!("invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}
