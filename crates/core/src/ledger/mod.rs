//! Sync ledger port
//!
//! The ledger linearizes operations that share an idempotency key: only one
//! caller gets `Acquired` and executes the side effect; everyone else sees
//! the prior terminal result or an in-flight marker. Cancelled operations
//! leave their entry `pending`, which rival claimants may take over once
//! the configured lease expires.

use async_trait::async_trait;
use shopsync_domain::{LedgerStatus, OperationType, Result};

/// Outcome of a check-and-reserve against the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    /// The caller owns the reservation and must execute then commit.
    Acquired,
    /// A terminal result already exists (completed or failed).
    Completed { status: LedgerStatus, result_json: Option<String> },
    /// Another caller holds a live pending reservation.
    InFlight,
}

/// Durable record of in-flight and completed operations.
#[async_trait]
pub trait SyncLedger: Send + Sync {
    /// Atomically check-and-reserve `(op, key)`. Compare-and-set semantics:
    /// exactly one concurrent caller receives [`Reservation::Acquired`].
    async fn reserve(&self, op: OperationType, key: &str) -> Result<Reservation>;

    /// Record the terminal outcome of a reserved operation.
    async fn commit(
        &self,
        op: OperationType,
        key: &str,
        status: LedgerStatus,
        result_json: Option<String>,
    ) -> Result<()>;
}
