//! Inventory reconciliation: catalog ports and the reconcile service.

pub mod ports;
pub mod service;

pub use ports::{ListingRepository, ProductRepository};
pub use service::{ReconcileService, ReconcileSweepReport};
