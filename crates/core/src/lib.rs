//! # ShopSync Core
//!
//! Port interfaces and business services for the multi-store
//! synchronization engine: credential refresh, inventory reconciliation,
//! and order routing, all linearized through the sync ledger.
//!
//! ## Architecture
//! - Ports (repository and external-client traits) live next to the
//!   service that owns them; implementations live in `shopsync-infra`.
//! - Components depend on the sync ledger and on each other only through
//!   persisted state; the credential service is the single shared entry
//!   point for marketplace authentication.

pub mod clients;
pub mod credentials;
pub mod engine;
pub mod inventory;
pub mod ledger;
pub mod orders;

pub use clients::{
    MarketplaceClient, MarketplaceRegistry, SupplierClassifier, SupplierClient, SupplierRegistry,
};
pub use credentials::ports::{CredentialRepository, StoreRepository};
pub use credentials::service::{CredentialService, RefreshSweepReport};
pub use engine::SyncEngine;
pub use inventory::ports::{ListingRepository, ProductRepository};
pub use inventory::service::{ReconcileService, ReconcileSweepReport};
pub use ledger::{Reservation, SyncLedger};
pub use orders::ports::OrderRepository;
pub use orders::service::OrderRouter;
