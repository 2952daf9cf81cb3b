//! SQLite-backed sync ledger.
//!
//! `reserve` is a compare-and-set built from two guarded statements:
//! `INSERT OR IGNORE` claims a fresh key, and for keys whose pending
//! reservation has outlived its lease, an `UPDATE ... WHERE updated_at = ?`
//! re-claims the row so exactly one rival wins.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use shopsync_core::{Reservation, SyncLedger};
use shopsync_domain::{LedgerEntry, LedgerStatus, OperationType, Result, SyncError};
use tokio::task;

use super::manager::{map_join_error, map_sql_error, DbManager};

pub struct LedgerRepositorySql {
    db: Arc<DbManager>,
    lease_secs: i64,
}

impl LedgerRepositorySql {
    pub fn new(db: Arc<DbManager>, lease_secs: i64) -> Self {
        Self { db, lease_secs }
    }

    /// Fetch one entry, mostly for diagnostics and tests.
    pub async fn find(&self, op: OperationType, key: &str) -> Result<Option<LedgerEntry>> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();

        task::spawn_blocking(move || -> Result<Option<LedgerEntry>> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT op_type, idempotency_key, status, result_json, attempts,
                        created_at, updated_at
                 FROM ledger_entries WHERE op_type = ?1 AND idempotency_key = ?2",
                params![op.to_string(), key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                    ))
                },
            )
            .optional()
            .map_err(map_sql_error)?
            .map(|(op_raw, key, status_raw, result_json, attempts, created_at, updated_at)| {
                Ok(LedgerEntry {
                    op_type: parse_op(&op_raw)?,
                    idempotency_key: key,
                    status: parse_status(&status_raw)?,
                    result_json,
                    attempts,
                    created_at,
                    updated_at,
                })
            })
            .transpose()
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl SyncLedger for LedgerRepositorySql {
    async fn reserve(&self, op: OperationType, key: &str) -> Result<Reservation> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();
        let lease_secs = self.lease_secs;

        task::spawn_blocking(move || -> Result<Reservation> {
            let conn = db.get_connection()?;
            reserve_entry(&conn, op, &key, lease_secs)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn commit(
        &self,
        op: OperationType,
        key: &str,
        status: LedgerStatus,
        result_json: Option<String>,
    ) -> Result<()> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            commit_entry(&conn, op, &key, status, result_json.as_deref())
        })
        .await
        .map_err(map_join_error)?
    }
}

/// Check-and-reserve against an open connection. Shared with the order
/// repository, which runs it inside the order-insert transaction.
pub(crate) fn reserve_entry(
    conn: &Connection,
    op: OperationType,
    key: &str,
    lease_secs: i64,
) -> Result<Reservation> {
    let now = Utc::now().timestamp();

    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO ledger_entries
                 (op_type, idempotency_key, status, attempts, created_at, updated_at)
             VALUES (?1, ?2, 'pending', 1, ?3, ?3)",
            params![op.to_string(), key, now],
        )
        .map_err(map_sql_error)?;
    if inserted == 1 {
        return Ok(Reservation::Acquired);
    }

    let (status_raw, result_json, updated_at): (String, Option<String>, i64) = conn
        .query_row(
            "SELECT status, result_json, updated_at FROM ledger_entries
             WHERE op_type = ?1 AND idempotency_key = ?2",
            params![op.to_string(), key],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .map_err(map_sql_error)?;

    match parse_status(&status_raw)? {
        LedgerStatus::Pending => {
            if now - updated_at >= lease_secs {
                // The guard on updated_at lets exactly one claimant win.
                let claimed = conn
                    .execute(
                        "UPDATE ledger_entries
                         SET updated_at = ?1, attempts = attempts + 1
                         WHERE op_type = ?2 AND idempotency_key = ?3
                           AND status = 'pending' AND updated_at = ?4",
                        params![now, op.to_string(), key, updated_at],
                    )
                    .map_err(map_sql_error)?;
                if claimed == 1 {
                    return Ok(Reservation::Acquired);
                }
            }
            Ok(Reservation::InFlight)
        }
        status => Ok(Reservation::Completed { status, result_json }),
    }
}

pub(crate) fn commit_entry(
    conn: &Connection,
    op: OperationType,
    key: &str,
    status: LedgerStatus,
    result_json: Option<&str>,
) -> Result<()> {
    let now = Utc::now().timestamp();
    let updated = conn
        .execute(
            "UPDATE ledger_entries
             SET status = ?1, result_json = ?2, updated_at = ?3
             WHERE op_type = ?4 AND idempotency_key = ?5",
            params![status.to_string(), result_json, now, op.to_string(), key],
        )
        .map_err(map_sql_error)?;
    if updated == 0 {
        return Err(SyncError::NotFound(format!("no ledger entry for {op}:{key}")));
    }
    Ok(())
}

fn parse_status(raw: &str) -> Result<LedgerStatus> {
    raw.parse::<LedgerStatus>()
        .map_err(|err| SyncError::Database(format!("invalid ledger status: {err}")))
}

fn parse_op(raw: &str) -> Result<OperationType> {
    raw.parse::<OperationType>()
        .map_err(|err| SyncError::Database(format!("invalid operation type: {err}")))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn setup() -> (LedgerRepositorySql, Arc<DbManager>, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = DbManager::new(temp_dir.path().join("test.db"), 4).expect("manager created");
        manager.run_migrations().expect("migrations applied");
        let manager = Arc::new(manager);
        (LedgerRepositorySql::new(Arc::clone(&manager), 120), manager, temp_dir)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn first_reserve_is_acquired_second_is_in_flight() {
        let (repo, _manager, _dir) = setup().await;

        let first = repo.reserve(OperationType::OrderRouting, "mo-1").await.unwrap();
        assert_eq!(first, Reservation::Acquired);

        let second = repo.reserve(OperationType::OrderRouting, "mo-1").await.unwrap();
        assert_eq!(second, Reservation::InFlight);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn committed_entries_replay_their_result() {
        let (repo, _manager, _dir) = setup().await;

        repo.reserve(OperationType::OrderRouting, "mo-1").await.unwrap();
        repo.commit(
            OperationType::OrderRouting,
            "mo-1",
            LedgerStatus::Completed,
            Some(r#"{"ok":true}"#.to_string()),
        )
        .await
        .unwrap();

        let replay = repo.reserve(OperationType::OrderRouting, "mo-1").await.unwrap();
        assert_eq!(
            replay,
            Reservation::Completed {
                status: LedgerStatus::Completed,
                result_json: Some(r#"{"ok":true}"#.to_string()),
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn keys_are_scoped_per_operation_type() {
        let (repo, _manager, _dir) = setup().await;

        assert_eq!(
            repo.reserve(OperationType::OrderRouting, "key").await.unwrap(),
            Reservation::Acquired
        );
        assert_eq!(
            repo.reserve(OperationType::ListingUpdate, "key").await.unwrap(),
            Reservation::Acquired
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn expired_pending_lease_can_be_reclaimed_once() {
        let (repo, manager, _dir) = setup().await;

        repo.reserve(OperationType::CredentialRefresh, "store-1:100").await.unwrap();

        // Age the reservation past the lease.
        let conn = manager.get_connection().unwrap();
        conn.execute(
            "UPDATE ledger_entries SET updated_at = updated_at - 600",
            [],
        )
        .unwrap();
        drop(conn);

        let reclaimed = repo.reserve(OperationType::CredentialRefresh, "store-1:100").await.unwrap();
        assert_eq!(reclaimed, Reservation::Acquired);

        // The re-claim refreshed the lease, so a rival is held off again.
        let rival = repo.reserve(OperationType::CredentialRefresh, "store-1:100").await.unwrap();
        assert_eq!(rival, Reservation::InFlight);

        let entry = repo.find(OperationType::CredentialRefresh, "store-1:100").await.unwrap();
        assert_eq!(entry.unwrap().attempts, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_reserves_admit_exactly_one_winner() {
        let (repo, _manager, _dir) = setup().await;
        let repo = Arc::new(repo);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.reserve(OperationType::ListingUpdate, "l1:3").await
            }));
        }

        let mut acquired = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == Reservation::Acquired {
                acquired += 1;
            }
        }
        assert_eq!(acquired, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn commit_without_reservation_is_not_found() {
        let (repo, _manager, _dir) = setup().await;

        let err = repo
            .commit(OperationType::OrderRouting, "missing", LedgerStatus::Completed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }
}
