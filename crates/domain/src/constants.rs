//! Domain constants and default tunables

/// Refresh a credential when its access token expires within this margin.
pub const DEFAULT_SAFETY_MARGIN_SECS: i64 = 300;

/// Credential sweep lookahead: refresh every active store whose access
/// token expires within this window.
pub const DEFAULT_LOOKAHEAD_SECS: i64 = 3600;

/// Attempt ceiling for outbound API calls (token refresh, listing updates,
/// supplier order placement).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Bounded concurrency for the inventory reconciliation sweep.
pub const DEFAULT_RECONCILE_CONCURRENCY: usize = 8;

/// How long a pending ledger reservation blocks rival claimants before it
/// can be re-claimed (covers cancelled in-flight operations).
pub const DEFAULT_LEDGER_LEASE_SECS: i64 = 120;

/// Classifier calls are advisory; they get a short, configurable timeout.
pub const DEFAULT_CLASSIFIER_TIMEOUT_SECS: u64 = 10;

/// eBay OAuth token endpoint.
pub const EBAY_TOKEN_ENDPOINT: &str = "https://api.ebay.com/identity/v1/oauth2/token";

/// Amazon LWA token endpoint.
pub const AMAZON_TOKEN_ENDPOINT: &str = "https://api.amazon.com/auth/o2/token";
