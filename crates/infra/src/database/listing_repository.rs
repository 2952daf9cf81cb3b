//! SQLite-backed listing projections.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Row};
use shopsync_core::ListingRepository;
use shopsync_domain::{Listing, ListingStatus, Result, SyncError};
use tokio::task;

use super::manager::{map_join_error, map_sql_error, DbManager};
use super::store_repository::parse_text_column;

pub struct ListingRepositorySql {
    db: Arc<DbManager>,
}

impl ListingRepositorySql {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert a listing row. The schema enforces one listing per
    /// (store, product) pair.
    pub async fn insert_listing(&self, listing: &Listing) -> Result<()> {
        let db = Arc::clone(&self.db);
        let listing = listing.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO listings
                     (id, store_id, product_sku, marketplace_listing_id,
                      published_quantity, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    listing.id,
                    listing.store_id,
                    listing.product_sku,
                    listing.marketplace_listing_id,
                    listing.published_quantity,
                    listing.status.to_string(),
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
impl ListingRepository for ListingRepositorySql {
    async fn list_for_product(&self, sku: &str) -> Result<Vec<Listing>> {
        let db = Arc::clone(&self.db);
        let sku = sku.to_string();

        task::spawn_blocking(move || -> Result<Vec<Listing>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT id, store_id, product_sku, marketplace_listing_id,
                            published_quantity, status
                     FROM listings WHERE product_sku = ?1 ORDER BY id",
                )
                .map_err(map_sql_error)?;
            let rows = stmt.query_map(params![sku], map_listing_row).map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_published_quantity(&self, listing_id: &str, quantity: i64) -> Result<()> {
        let db = Arc::clone(&self.db);
        let listing_id = listing_id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let updated = conn
                .execute(
                    "UPDATE listings SET published_quantity = ?1 WHERE id = ?2",
                    params![quantity, listing_id],
                )
                .map_err(map_sql_error)?;
            if updated == 0 {
                return Err(SyncError::NotFound(format!("listing {listing_id} does not exist")));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set_listing_status(&self, listing_id: &str, status: ListingStatus) -> Result<()> {
        let db = Arc::clone(&self.db);
        let listing_id = listing_id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let updated = conn
                .execute(
                    "UPDATE listings SET status = ?1 WHERE id = ?2",
                    params![status.to_string(), listing_id],
                )
                .map_err(map_sql_error)?;
            if updated == 0 {
                return Err(SyncError::NotFound(format!("listing {listing_id} does not exist")));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_listing_row(row: &Row<'_>) -> rusqlite::Result<Listing> {
    let status_raw: String = row.get(5)?;
    Ok(Listing {
        id: row.get(0)?,
        store_id: row.get(1)?,
        product_sku: row.get(2)?,
        marketplace_listing_id: row.get(3)?,
        published_quantity: row.get(4)?,
        status: parse_text_column(5, &status_raw)?,
    })
}

#[cfg(test)]
mod tests {
    use shopsync_domain::{Platform, Product, Store, StoreStatus, Supplier};
    use tempfile::TempDir;

    use super::super::product_repository::ProductRepositorySql;
    use super::super::store_repository::StoreRepositorySql;
    use super::*;

    async fn setup() -> (ListingRepositorySql, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = DbManager::new(temp_dir.path().join("test.db"), 4).expect("manager created");
        manager.run_migrations().expect("migrations applied");
        let manager = Arc::new(manager);

        StoreRepositorySql::new(Arc::clone(&manager))
            .upsert_store(&Store {
                id: "store-1".into(),
                platform: Platform::Ebay,
                status: StoreStatus::Active,
                daily_listing_quota: 100,
                quota_reset_at: None,
            })
            .await
            .expect("store seeded");
        ProductRepositorySql::new(Arc::clone(&manager))
            .upsert_product(&Product {
                sku: "sku-1".into(),
                supplier: Supplier::Cj,
                supplier_sku: "cj-1".into(),
                cost_cents: 500,
                supplier_stock: 10,
                active: true,
            })
            .await
            .expect("product seeded");

        (ListingRepositorySql::new(manager), temp_dir)
    }

    fn listing(id: &str) -> Listing {
        Listing {
            id: id.to_string(),
            store_id: "store-1".into(),
            product_sku: "sku-1".into(),
            marketplace_listing_id: format!("mkt-{id}"),
            published_quantity: 10,
            status: ListingStatus::Active,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn insert_and_list_round_trip() {
        let (repo, _dir) = setup().await;
        let expected = listing("l1");

        repo.insert_listing(&expected).await.unwrap();

        assert_eq!(repo.list_for_product("sku-1").await.unwrap(), [expected]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn duplicate_store_product_pair_is_a_conflict() {
        let (repo, _dir) = setup().await;
        repo.insert_listing(&listing("l1")).await.unwrap();

        let err = repo.insert_listing(&listing("l2")).await.unwrap_err();
        assert!(matches!(err, SyncError::Conflict(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn quantity_and_status_updates_persist() {
        let (repo, _dir) = setup().await;
        repo.insert_listing(&listing("l1")).await.unwrap();

        repo.update_published_quantity("l1", 3).await.unwrap();
        repo.set_listing_status("l1", ListingStatus::Error).await.unwrap();

        let rows = repo.list_for_product("sku-1").await.unwrap();
        assert_eq!(rows[0].published_quantity, 3);
        assert_eq!(rows[0].status, ListingStatus::Error);
    }
}
