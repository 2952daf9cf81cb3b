//! Persistence ports for stores and their OAuth credentials.

use async_trait::async_trait;
use shopsync_domain::{Credential, Result, Store, StoreStatus};

/// Store registry access.
#[async_trait]
pub trait StoreRepository: Send + Sync {
    async fn get_store(&self, store_id: &str) -> Result<Store>;

    /// Stores in the active state, eligible for background sweeps.
    async fn list_active_stores(&self) -> Result<Vec<Store>>;

    async fn set_store_status(&self, store_id: &str, status: StoreStatus) -> Result<()>;
}

/// Credential row access. One credential per store.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn current(&self, store_id: &str) -> Result<Option<Credential>>;

    /// Swap in a new token pair atomically; partial writes must never be
    /// observable.
    async fn replace(&self, credential: &Credential) -> Result<()>;
}
