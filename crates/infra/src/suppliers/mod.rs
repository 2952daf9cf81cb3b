//! Supplier adapters. Each client speaks one supplier's API and reports
//! which [`shopsync_domain::Supplier`] it serves so the registry can key
//! fulfilment by supplier.

pub mod amazon;
pub mod cj;
pub mod eprolo;

pub use amazon::AmazonSupplier;
pub use cj::CjSupplier;
pub use eprolo::EproloSupplier;

use reqwest::StatusCode;
use shopsync_domain::SyncError;

pub(crate) fn map_supplier_error(supplier: &str, status: StatusCode, body: &str) -> SyncError {
    match status.as_u16() {
        401 | 403 => SyncError::CredentialExpired(format!("{supplier}: HTTP {status}")),
        404 => SyncError::NotFound(format!("{supplier}: HTTP {status}")),
        429 => SyncError::Transient(format!("{supplier}: HTTP {status}")),
        500..=599 => SyncError::Transient(format!("{supplier}: HTTP {status}")),
        _ => SyncError::Validation(format!("{supplier}: HTTP {status}: {body}")),
    }
}
