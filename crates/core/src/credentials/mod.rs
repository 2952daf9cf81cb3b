//! Credential lifecycle: store/credential ports and the refresh service.

pub mod ports;
pub mod service;

pub use ports::{CredentialRepository, StoreRepository};
pub use service::{CredentialService, RefreshSweepReport};
