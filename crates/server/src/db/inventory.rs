//! Factory inventory repository.
//!
//! Quantity changes are conditional single-statement updates that recompute
//! `status` from the resulting quantity, so concurrent decrements can never
//! drive a row below zero or leave a stale status behind.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use aquacycle_core::{InventoryItemId, StockStatus, stock::stock_status};

use super::{RepositoryError, stock_status_sql};
use crate::models::{InventoryItem, StockMove};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct InventoryItemRow {
    id: InventoryItemId,
    name: String,
    quantity: i32,
    unit: String,
    min_stock_level: i32,
    max_stock_level: i32,
    status: StockStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<InventoryItemRow> for InventoryItem {
    fn from(row: InventoryItemRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            quantity: row.quantity,
            unit: row.unit,
            min_stock_level: row.min_stock_level,
            max_stock_level: row.max_stock_level,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields of a new factory item.
#[derive(Debug, Clone)]
pub struct NewInventoryItem {
    pub name: String,
    pub quantity: i32,
    pub unit: String,
    pub min_stock_level: i32,
    pub max_stock_level: i32,
}

/// Complete editable state of a factory item.
#[derive(Debug, Clone)]
pub struct InventoryLevels {
    pub quantity: i32,
    pub unit: String,
    pub min_stock_level: i32,
    pub max_stock_level: i32,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the factory ledger.
pub struct InventoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> InventoryRepository<'a> {
    /// Create a new inventory repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List factory items, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<StockStatus>,
    ) -> Result<Vec<InventoryItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, InventoryItemRow>(
            r"
            SELECT * FROM inventory_items
            WHERE $1::text IS NULL OR status = $1
            ORDER BY name
            ",
        )
        .bind(status)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Items at or below their minimum level, emptiest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self) -> Result<Vec<InventoryItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, InventoryItemRow>(
            r"
            SELECT * FROM inventory_items
            WHERE status <> 'In Stock'
            ORDER BY quantity, name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a factory item by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: InventoryItemId) -> Result<Option<InventoryItem>, RepositoryError> {
        let row = sqlx::query_as::<_, InventoryItemRow>("SELECT * FROM inventory_items WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Add a catalog item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if an item with the same name exists.
    pub async fn create(&self, item: &NewInventoryItem) -> Result<InventoryItem, RepositoryError> {
        let row = sqlx::query_as::<_, InventoryItemRow>(
            r"
            INSERT INTO inventory_items
                (name, quantity, unit, min_stock_level, max_stock_level, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(&item.name)
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(item.min_stock_level)
        .bind(item.max_stock_level)
        .bind(stock_status(item.quantity, item.min_stock_level))
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique(e, "inventory item already exists"))?;

        Ok(row.into())
    }

    /// Overwrite quantity, unit and thresholds.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(
        &self,
        id: InventoryItemId,
        levels: &InventoryLevels,
    ) -> Result<Option<InventoryItem>, RepositoryError> {
        let row = sqlx::query_as::<_, InventoryItemRow>(
            r"
            UPDATE inventory_items
            SET quantity = $2, unit = $3, min_stock_level = $4, max_stock_level = $5,
                status = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(levels.quantity)
        .bind(&levels.unit)
        .bind(levels.min_stock_level)
        .bind(levels.max_stock_level)
        .bind(stock_status(levels.quantity, levels.min_stock_level))
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Apply a signed delta, refusing to go below zero.
    ///
    /// Returns `None` if the item does not exist or the delta would make the
    /// quantity negative.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn adjust(
        &self,
        id: InventoryItemId,
        delta: i32,
    ) -> Result<Option<InventoryItem>, RepositoryError> {
        let row = sqlx::query_as::<_, InventoryItemRow>(concat!(
            "UPDATE inventory_items SET quantity = quantity + $2, status = ",
            stock_status_sql!("quantity + $2", "min_stock_level"),
            ", updated_at = NOW() WHERE id = $1 AND quantity + $2 >= 0 RETURNING *"
        ))
        .bind(id)
        .bind(delta)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Delete a catalog item. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: InventoryItemId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM inventory_items WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Lock the named items and return their quantities.
///
/// Names with no factory row are absent from the map.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_quantities(
    conn: &mut PgConnection,
    names: &[String],
) -> Result<HashMap<String, i32>, RepositoryError> {
    let rows: Vec<(String, i32)> = sqlx::query_as(
        r"
        SELECT name, quantity FROM inventory_items
        WHERE name = ANY($1)
        ORDER BY name
        FOR UPDATE
        ",
    )
    .bind(names)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Take `quantity` units of `name` if that many are on hand.
///
/// Returns `None` if the item is missing or short; nothing is written then.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn decrement(
    conn: &mut PgConnection,
    name: &str,
    quantity: i32,
) -> Result<Option<StockMove>, RepositoryError> {
    let moved = sqlx::query_as::<_, StockMove>(concat!(
        "UPDATE inventory_items SET quantity = quantity - $2, status = ",
        stock_status_sql!("quantity - $2", "min_stock_level"),
        ", updated_at = NOW() WHERE name = $1 AND quantity >= $2 ",
        "RETURNING quantity + $2 AS before, quantity AS after"
    ))
    .bind(name)
    .bind(quantity)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(moved)
}

/// Current quantity of `name`, if the item exists.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn on_hand(conn: &mut PgConnection, name: &str) -> Result<Option<i32>, RepositoryError> {
    let quantity = sqlx::query_scalar("SELECT quantity FROM inventory_items WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(quantity)
}
