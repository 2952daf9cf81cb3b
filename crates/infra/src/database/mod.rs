//! SQLite persistence: connection manager and one repository per table.

mod credential_repository;
mod ledger_repository;
mod listing_repository;
pub mod manager;
mod order_repository;
mod product_repository;
mod store_repository;

pub use credential_repository::CredentialRepositorySql;
pub use ledger_repository::LedgerRepositorySql;
pub use listing_repository::ListingRepositorySql;
pub use manager::DbManager;
pub use order_repository::OrderRepositorySql;
pub use product_repository::ProductRepositorySql;
pub use store_repository::StoreRepositorySql;
