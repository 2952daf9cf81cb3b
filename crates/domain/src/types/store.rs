//! Marketplace seller accounts and their OAuth credentials

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Marketplace platform a store sells on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ebay,
    Amazon,
}

crate::impl_status_conversions!(Platform {
    Ebay => "ebay",
    Amazon => "amazon",
});

/// Store lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    Active,
    Paused,
    Inactive,
}

crate::impl_status_conversions!(StoreStatus {
    Active => "active",
    Paused => "paused",
    Inactive => "inactive",
});

/// A marketplace seller account. Owns zero or one current [`Credential`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub platform: Platform,
    pub status: StoreStatus,
    /// Daily listing-count quota. Modeled but not enforced by any sync path.
    pub daily_listing_quota: i64,
    pub quota_reset_at: Option<DateTime<Utc>>,
}

/// OAuth token pair bound to exactly one store.
///
/// At most one credential per store is current; superseding it is atomic
/// (the old pair becomes unusable in the same transaction).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub store_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl Credential {
    /// Whether the access token stays valid for at least `margin_secs` more
    /// seconds.
    pub fn access_valid_for(&self, margin_secs: i64) -> bool {
        self.access_expires_at > Utc::now() + Duration::seconds(margin_secs)
    }

    /// Whether the refresh token itself has expired. When it has, the store
    /// must be re-onboarded manually.
    pub fn is_refresh_expired(&self) -> bool {
        self.refresh_expires_at <= Utc::now()
    }
}

/// Result of a token-refresh call against a marketplace.
///
/// Platforms that do not rotate the refresh token return `None` for it; the
/// caller keeps the previous refresh token and its expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRefresh {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
}
