//! SQLite-backed order store.
//!
//! The pending order row and its routing ledger reservation are written in
//! one transaction, so an order can never exist without its idempotency
//! record or vice versa.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use shopsync_core::{OrderRepository, Reservation};
use shopsync_domain::{
    Destination, FulfillmentStatus, OperationType, Order, Result, Supplier, SyncError,
};
use tokio::task;

use super::ledger_repository::reserve_entry;
use super::manager::{map_join_error, map_sql_error, DbManager};
use super::store_repository::parse_text_column;

pub struct OrderRepositorySql {
    db: Arc<DbManager>,
    lease_secs: i64,
}

impl OrderRepositorySql {
    pub fn new(db: Arc<DbManager>, lease_secs: i64) -> Self {
        Self { db, lease_secs }
    }
}

#[async_trait]
impl OrderRepository for OrderRepositorySql {
    async fn insert_pending_with_reservation(&self, order: &Order) -> Result<Reservation> {
        let db = Arc::clone(&self.db);
        let order = order.clone();
        let lease_secs = self.lease_secs;

        task::spawn_blocking(move || -> Result<Reservation> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;

            let reservation = reserve_entry(
                &tx,
                OperationType::OrderRouting,
                &order.marketplace_order_id,
                lease_secs,
            )?;
            if reservation == Reservation::Acquired {
                let destination_json =
                    serde_json::to_string(&order.destination).map_err(|err| {
                        SyncError::Internal(format!("destination is unserializable: {err}"))
                    })?;
                let now = Utc::now().timestamp();
                // OR IGNORE: a re-claimed lease finds the row already there.
                tx.execute(
                    "INSERT OR IGNORE INTO orders
                         (marketplace_order_id, store_id, listing_id, product_sku,
                          quantity, total_cents, currency, status, supplier,
                          supplier_order_ref, destination_json, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
                    params![
                        order.marketplace_order_id,
                        order.store_id,
                        order.listing_id,
                        order.product_sku,
                        order.quantity,
                        order.total_cents,
                        order.currency,
                        order.status.to_string(),
                        order.supplier.map(|s| s.to_string()),
                        order.supplier_order_ref,
                        destination_json,
                        now,
                    ],
                )
                .map_err(map_sql_error)?;
            }

            tx.commit().map_err(map_sql_error)?;
            Ok(reservation)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_by_marketplace_id(&self, marketplace_order_id: &str) -> Result<Option<Order>> {
        let db = Arc::clone(&self.db);
        let id = marketplace_order_id.to_string();

        task::spawn_blocking(move || -> Result<Option<Order>> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT marketplace_order_id, store_id, listing_id, product_sku,
                        quantity, total_cents, currency, status, supplier,
                        supplier_order_ref, destination_json
                 FROM orders WHERE marketplace_order_id = ?1",
                params![id],
                map_order_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set_supplier_reference(
        &self,
        marketplace_order_id: &str,
        supplier: Supplier,
        supplier_order_ref: &str,
    ) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = marketplace_order_id.to_string();
        let reference = supplier_order_ref.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            // The IS NULL guard makes the reference write-once.
            let updated = conn
                .execute(
                    "UPDATE orders
                     SET supplier = ?1, supplier_order_ref = ?2,
                         status = 'processing', updated_at = ?3
                     WHERE marketplace_order_id = ?4 AND supplier_order_ref IS NULL",
                    params![supplier.to_string(), reference, Utc::now().timestamp(), id],
                )
                .map_err(map_sql_error)?;
            if updated == 1 {
                return Ok(());
            }

            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM orders WHERE marketplace_order_id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_sql_error)?;
            match exists {
                Some(_) => Err(SyncError::Conflict(format!(
                    "order {id} already has a supplier reference"
                ))),
                None => Err(SyncError::NotFound(format!("order {id} does not exist"))),
            }
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set_order_status(
        &self,
        marketplace_order_id: &str,
        status: FulfillmentStatus,
    ) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = marketplace_order_id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;

            let current_raw: String = tx
                .query_row(
                    "SELECT status FROM orders WHERE marketplace_order_id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_sql_error)?
                .ok_or_else(|| SyncError::NotFound(format!("order {id} does not exist")))?;
            let current = current_raw
                .parse::<FulfillmentStatus>()
                .map_err(|err| SyncError::Database(format!("invalid order status: {err}")))?;

            if !current.can_transition(status) {
                return Err(SyncError::Conflict(format!(
                    "order {id} cannot move from {current} to {status}"
                )));
            }

            tx.execute(
                "UPDATE orders SET status = ?1, updated_at = ?2
                 WHERE marketplace_order_id = ?3",
                params![status.to_string(), Utc::now().timestamp(), id],
            )
            .map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_order_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    let status_raw: String = row.get(7)?;
    let supplier_raw: Option<String> = row.get(8)?;
    let destination_json: String = row.get(10)?;

    let supplier = match supplier_raw {
        Some(raw) => Some(parse_text_column::<Supplier>(8, &raw)?),
        None => None,
    };
    let destination: Destination = serde_json::from_str(&destination_json).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            10,
            rusqlite::types::Type::Text,
            Box::new(err),
        )
    })?;

    Ok(Order {
        marketplace_order_id: row.get(0)?,
        store_id: row.get(1)?,
        listing_id: row.get(2)?,
        product_sku: row.get(3)?,
        quantity: row.get(4)?,
        total_cents: row.get(5)?,
        currency: row.get(6)?,
        status: parse_text_column(7, &status_raw)?,
        supplier,
        supplier_order_ref: row.get(9)?,
        destination,
    })
}
