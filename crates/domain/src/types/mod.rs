//! Domain data types

pub mod catalog;
pub mod ledger;
pub mod order;
pub mod store;

pub use catalog::*;
pub use ledger::*;
pub use order::*;
pub use store::*;
