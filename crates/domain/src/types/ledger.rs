//! Sync ledger rows
//!
//! Every externally visible side effect (token refresh, stock write,
//! supplier order placement) is preceded by a ledger check-and-reserve and
//! followed by a commit. The ledger is what makes retries safe.

use serde::{Deserialize, Serialize};

/// Kind of operation recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    CredentialRefresh,
    ListingUpdate,
    OrderRouting,
}

crate::impl_status_conversions!(OperationType {
    CredentialRefresh => "credential_refresh",
    ListingUpdate => "listing_update",
    OrderRouting => "order_routing",
});

/// Ledger entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    Pending,
    Completed,
    Failed,
}

crate::impl_status_conversions!(LedgerStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
});

/// Durable record keyed by `(operation type, idempotency key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub op_type: OperationType,
    pub idempotency_key: String,
    pub status: LedgerStatus,
    pub result_json: Option<String>,
    pub attempts: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn operation_type_round_trips() {
        for op in [
            OperationType::CredentialRefresh,
            OperationType::ListingUpdate,
            OperationType::OrderRouting,
        ] {
            assert_eq!(OperationType::from_str(&op.to_string()).unwrap(), op);
        }
    }

    #[test]
    fn ledger_status_round_trips() {
        assert_eq!(LedgerStatus::from_str("completed").unwrap(), LedgerStatus::Completed);
        assert_eq!(LedgerStatus::Pending.to_string(), "pending");
    }
}
