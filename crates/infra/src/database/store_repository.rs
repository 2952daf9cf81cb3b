//! SQLite-backed store registry.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use shopsync_core::StoreRepository;
use shopsync_domain::{Platform, Result, Store, StoreStatus, SyncError};
use tokio::task;

use super::manager::{map_join_error, map_sql_error, DbManager};

pub struct StoreRepositorySql {
    db: Arc<DbManager>,
}

impl StoreRepositorySql {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert or update a store row. Used by onboarding tooling and tests.
    pub async fn upsert_store(&self, store: &Store) -> Result<()> {
        let db = Arc::clone(&self.db);
        let store = store.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO stores (id, platform, status, daily_listing_quota, quota_reset_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                     platform = excluded.platform,
                     status = excluded.status,
                     daily_listing_quota = excluded.daily_listing_quota,
                     quota_reset_at = excluded.quota_reset_at",
                params![
                    store.id,
                    store.platform.to_string(),
                    store.status.to_string(),
                    store.daily_listing_quota,
                    store.quota_reset_at.map(|at| at.timestamp()),
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl StoreRepository for StoreRepositorySql {
    async fn get_store(&self, store_id: &str) -> Result<Store> {
        let db = Arc::clone(&self.db);
        let store_id = store_id.to_string();

        task::spawn_blocking(move || -> Result<Store> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT id, platform, status, daily_listing_quota, quota_reset_at
                 FROM stores WHERE id = ?1",
                params![store_id],
                map_store_row,
            )
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_active_stores(&self) -> Result<Vec<Store>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<Store>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT id, platform, status, daily_listing_quota, quota_reset_at
                     FROM stores WHERE status = 'active' ORDER BY id",
                )
                .map_err(map_sql_error)?;
            let rows = stmt.query_map([], map_store_row).map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set_store_status(&self, store_id: &str, status: StoreStatus) -> Result<()> {
        let db = Arc::clone(&self.db);
        let store_id = store_id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let updated = conn
                .execute(
                    "UPDATE stores SET status = ?1 WHERE id = ?2",
                    params![status.to_string(), store_id],
                )
                .map_err(map_sql_error)?;
            if updated == 0 {
                return Err(SyncError::NotFound(format!("store {store_id} does not exist")));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_store_row(row: &Row<'_>) -> rusqlite::Result<Store> {
    let platform_raw: String = row.get(1)?;
    let status_raw: String = row.get(2)?;
    let quota_reset_at: Option<i64> = row.get(4)?;
    Ok(Store {
        id: row.get(0)?,
        platform: parse_text_column(1, &platform_raw)?,
        status: parse_text_column(2, &status_raw)?,
        daily_listing_quota: row.get(3)?,
        quota_reset_at: quota_reset_at.and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
    })
}

pub(crate) fn parse_text_column<T: std::str::FromStr>(
    index: usize,
    raw: &str,
) -> rusqlite::Result<T> {
    raw.parse::<T>().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            format!("unrecognised value '{raw}'").into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn setup() -> (StoreRepositorySql, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = DbManager::new(temp_dir.path().join("test.db"), 4).expect("manager created");
        manager.run_migrations().expect("migrations applied");
        (StoreRepositorySql::new(Arc::new(manager)), temp_dir)
    }

    fn store(id: &str, status: StoreStatus) -> Store {
        Store {
            id: id.to_string(),
            platform: Platform::Ebay,
            status,
            daily_listing_quota: 100,
            quota_reset_at: None,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_and_get_round_trip() {
        let (repo, _dir) = setup().await;
        let expected = store("store-1", StoreStatus::Active);

        repo.upsert_store(&expected).await.unwrap();
        let actual = repo.get_store("store-1").await.unwrap();

        assert_eq!(actual, expected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn only_active_stores_are_listed_for_sweeps() {
        let (repo, _dir) = setup().await;
        repo.upsert_store(&store("store-1", StoreStatus::Active)).await.unwrap();
        repo.upsert_store(&store("store-2", StoreStatus::Paused)).await.unwrap();
        repo.upsert_store(&store("store-3", StoreStatus::Inactive)).await.unwrap();

        let active = repo.list_active_stores().await.unwrap();

        let ids: Vec<&str> = active.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["store-1"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn status_update_round_trips() {
        let (repo, _dir) = setup().await;
        repo.upsert_store(&store("store-1", StoreStatus::Active)).await.unwrap();

        repo.set_store_status("store-1", StoreStatus::Inactive).await.unwrap();

        assert_eq!(repo.get_store("store-1").await.unwrap().status, StoreStatus::Inactive);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_store_is_not_found() {
        let (repo, _dir) = setup().await;

        let err = repo.get_store("absent").await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));

        let err = repo.set_store_status("absent", StoreStatus::Paused).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }
}
