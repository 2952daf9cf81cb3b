//! SQLite-backed product catalog.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Row};
use shopsync_core::ProductRepository;
use shopsync_domain::{Product, Result, SyncError};
use tokio::task;

use super::manager::{map_join_error, map_sql_error, DbManager};
use super::store_repository::parse_text_column;

pub struct ProductRepositorySql {
    db: Arc<DbManager>,
}

impl ProductRepositorySql {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert or update a product row. Used by catalog tooling and tests.
    pub async fn upsert_product(&self, product: &Product) -> Result<()> {
        let db = Arc::clone(&self.db);
        let product = product.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO products
                     (sku, supplier, supplier_sku, cost_cents, supplier_stock, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(sku) DO UPDATE SET
                     supplier = excluded.supplier,
                     supplier_sku = excluded.supplier_sku,
                     cost_cents = excluded.cost_cents,
                     supplier_stock = excluded.supplier_stock,
                     active = excluded.active",
                params![
                    product.sku,
                    product.supplier.to_string(),
                    product.supplier_sku,
                    product.cost_cents,
                    product.supplier_stock,
                    i64::from(product.active),
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
impl ProductRepository for ProductRepositorySql {
    async fn get_product(&self, sku: &str) -> Result<Product> {
        let db = Arc::clone(&self.db);
        let sku = sku.to_string();

        task::spawn_blocking(move || -> Result<Product> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT sku, supplier, supplier_sku, cost_cents, supplier_stock, active
                 FROM products WHERE sku = ?1",
                params![sku],
                map_product_row,
            )
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_active_skus(&self) -> Result<Vec<String>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<String>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare("SELECT sku FROM products WHERE active = 1 ORDER BY sku")
                .map_err(map_sql_error)?;
            let rows = stmt.query_map([], |row| row.get(0)).map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_supplier_stock(&self, sku: &str, stock: i64) -> Result<()> {
        let db = Arc::clone(&self.db);
        let sku = sku.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let updated = conn
                .execute(
                    "UPDATE products SET supplier_stock = ?1 WHERE sku = ?2",
                    params![stock, sku],
                )
                .map_err(map_sql_error)?;
            if updated == 0 {
                return Err(SyncError::NotFound(format!("product {sku} does not exist")));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_product_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    let supplier_raw: String = row.get(1)?;
    let active: i64 = row.get(5)?;
    Ok(Product {
        sku: row.get(0)?,
        supplier: parse_text_column(1, &supplier_raw)?,
        supplier_sku: row.get(2)?,
        cost_cents: row.get(3)?,
        supplier_stock: row.get(4)?,
        active: active != 0,
    })
}
