//! # ShopSync Infrastructure
//!
//! Adapters behind the core ports: SQLite repositories, marketplace and
//! supplier HTTP clients, the advisory classifier client, interval
//! schedulers, and configuration loading.

pub mod classifier;
pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod marketplace;
pub mod scheduling;
pub mod suppliers;

pub use classifier::ClassifierClient;
pub use config::load;
pub use database::{
    CredentialRepositorySql, DbManager, LedgerRepositorySql, ListingRepositorySql,
    OrderRepositorySql, ProductRepositorySql, StoreRepositorySql,
};
pub use errors::InfraError;
pub use http::HttpClient;
pub use marketplace::{AmazonClient, EbayClient};
pub use scheduling::{
    CredentialScheduler, OrderPoller, ReconcileScheduler, SchedulerError, SchedulerResult,
};
pub use suppliers::{AmazonSupplier, CjSupplier, EproloSupplier};
