//! SQLite-backed credential store.
//!
//! One row per store; `replace` is a single upsert, so a superseded token
//! pair disappears in the same statement that writes the new one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use shopsync_core::CredentialRepository;
use shopsync_domain::{Credential, Result};
use tokio::task;

use super::manager::{map_join_error, map_sql_error, DbManager};

pub struct CredentialRepositorySql {
    db: Arc<DbManager>,
}

impl CredentialRepositorySql {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialRepository for CredentialRepositorySql {
    async fn current(&self, store_id: &str) -> Result<Option<Credential>> {
        let db = Arc::clone(&self.db);
        let store_id = store_id.to_string();

        task::spawn_blocking(move || -> Result<Option<Credential>> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT store_id, access_token, refresh_token,
                        access_expires_at, refresh_expires_at
                 FROM credentials WHERE store_id = ?1",
                params![store_id],
                map_credential_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn replace(&self, credential: &Credential) -> Result<()> {
        let db = Arc::clone(&self.db);
        let credential = credential.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO credentials
                     (store_id, access_token, refresh_token,
                      access_expires_at, refresh_expires_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(store_id) DO UPDATE SET
                     access_token = excluded.access_token,
                     refresh_token = excluded.refresh_token,
                     access_expires_at = excluded.access_expires_at,
                     refresh_expires_at = excluded.refresh_expires_at,
                     updated_at = excluded.updated_at",
                params![
                    credential.store_id,
                    credential.access_token,
                    credential.refresh_token,
                    credential.access_expires_at.timestamp(),
                    credential.refresh_expires_at.timestamp(),
                    Utc::now().timestamp(),
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_credential_row(row: &Row<'_>) -> rusqlite::Result<Credential> {
    let access_expires_at: i64 = row.get(3)?;
    let refresh_expires_at: i64 = row.get(4)?;
    Ok(Credential {
        store_id: row.get(0)?,
        access_token: row.get(1)?,
        refresh_token: row.get(2)?,
        access_expires_at: timestamp_column(3, access_expires_at)?,
        refresh_expires_at: timestamp_column(4, refresh_expires_at)?,
    })
}

fn timestamp_column(index: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Integer,
            format!("timestamp {secs} out of range").into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use shopsync_domain::{Platform, Store, StoreStatus};
    use tempfile::TempDir;

    use super::super::store_repository::StoreRepositorySql;
    use super::*;
    use shopsync_core::StoreRepository;

    async fn setup() -> (CredentialRepositorySql, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = DbManager::new(temp_dir.path().join("test.db"), 4).expect("manager created");
        manager.run_migrations().expect("migrations applied");
        let manager = Arc::new(manager);

        let stores = StoreRepositorySql::new(Arc::clone(&manager));
        stores
            .upsert_store(&Store {
                id: "store-1".into(),
                platform: Platform::Ebay,
                status: StoreStatus::Active,
                daily_listing_quota: 100,
                quota_reset_at: None,
            })
            .await
            .expect("store seeded");
        let _ = stores.get_store("store-1").await.expect("store readable");

        (CredentialRepositorySql::new(manager), temp_dir)
    }

    fn credential(access_token: &str) -> Credential {
        let now = Utc::now();
        Credential {
            store_id: "store-1".into(),
            access_token: access_token.to_string(),
            refresh_token: "refresh".into(),
            access_expires_at: now + ChronoDuration::seconds(7200),
            refresh_expires_at: now + ChronoDuration::days(540),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_credential_is_none() {
        let (repo, _dir) = setup().await;
        assert!(repo.current("store-1").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replace_swaps_the_whole_pair() {
        let (repo, _dir) = setup().await;

        repo.replace(&credential("first")).await.unwrap();
        repo.replace(&credential("second")).await.unwrap();

        let current = repo.current("store-1").await.unwrap().unwrap();
        assert_eq!(current.access_token, "second");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn expiry_instants_survive_the_round_trip() {
        let (repo, _dir) = setup().await;
        let original = credential("token");

        repo.replace(&original).await.unwrap();
        let stored = repo.current("store-1").await.unwrap().unwrap();

        // Second precision is what the schema stores.
        assert_eq!(
            stored.access_expires_at.timestamp(),
            original.access_expires_at.timestamp()
        );
        assert_eq!(
            stored.refresh_expires_at.timestamp(),
            original.refresh_expires_at.timestamp()
        );
    }
}
