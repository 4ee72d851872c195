//! Branch inventory repository.
//!
//! Branch rows are created lazily: crediting an item a branch has never held
//! inserts the row, copying unit and thresholds from the factory catalog or
//! falling back to the catalog defaults.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use aquacycle_core::{
    BranchId, BranchInventoryItemId, StockStatus,
    stock::{DEFAULT_MAX_STOCK_LEVEL, DEFAULT_MIN_STOCK_LEVEL, DEFAULT_UNIT, stock_status},
};

use super::{RepositoryError, stock_status_sql};
use crate::models::{BranchInventoryItem, StockMove};

#[derive(Debug, sqlx::FromRow)]
struct BranchInventoryRow {
    id: BranchInventoryItemId,
    branch_id: BranchId,
    name: String,
    quantity: i32,
    unit: String,
    min_stock_level: i32,
    max_stock_level: i32,
    status: StockStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BranchInventoryRow> for BranchInventoryItem {
    fn from(row: BranchInventoryRow) -> Self {
        Self {
            id: row.id,
            branch_id: row.branch_id,
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

/// Repository for per-branch ledgers.
pub struct BranchInventoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BranchInventoryRepository<'a> {
    /// Create a new branch inventory repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a branch's ledger.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, branch_id: BranchId) -> Result<Vec<BranchInventoryItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, BranchInventoryRow>(
            "SELECT * FROM branch_inventory_items WHERE branch_id = $1 ORDER BY name",
        )
        .bind(branch_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get one branch row by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        id: BranchInventoryItemId,
    ) -> Result<Option<BranchInventoryItem>, RepositoryError> {
        let row = sqlx::query_as::<_, BranchInventoryRow>(
            "SELECT * FROM branch_inventory_items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Overwrite quantity and thresholds of a branch row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_levels(
        &self,
        id: BranchInventoryItemId,
        quantity: i32,
        min_stock_level: i32,
        max_stock_level: i32,
    ) -> Result<Option<BranchInventoryItem>, RepositoryError> {
        let row = sqlx::query_as::<_, BranchInventoryRow>(
            r"
            UPDATE branch_inventory_items
            SET quantity = $2, min_stock_level = $3, max_stock_level = $4,
                status = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(quantity)
        .bind(min_stock_level)
        .bind(max_stock_level)
        .bind(stock_status(quantity, min_stock_level))
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Delete a branch row. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: BranchInventoryItemId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM branch_inventory_items WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Give a branch a zero-quantity row for every catalog item it lacks.
    ///
    /// Existing rows are left untouched, so calling this twice is harmless.
    /// Returns the number of rows created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn initialize(&self, branch_id: BranchId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO branch_inventory_items
                (branch_id, name, quantity, unit, min_stock_level, max_stock_level, status)
            SELECT $1, f.name, 0, f.unit, f.min_stock_level, f.max_stock_level, 'Out of Stock'
            FROM inventory_items f
            ON CONFLICT (branch_id, name) DO NOTHING
            ",
        )
        .bind(branch_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Copy unit and thresholds from the catalog into a branch ledger.
    ///
    /// Missing rows are created at zero; quantities are never touched.
    /// Returns the number of rows inserted or updated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn sync_from_catalog(&self, branch_id: BranchId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(concat!(
            "INSERT INTO branch_inventory_items ",
            "(branch_id, name, quantity, unit, min_stock_level, max_stock_level, status) ",
            "SELECT $1, f.name, 0, f.unit, f.min_stock_level, f.max_stock_level, 'Out of Stock' ",
            "FROM inventory_items f ",
            "ON CONFLICT (branch_id, name) DO UPDATE SET ",
            "unit = EXCLUDED.unit, ",
            "min_stock_level = EXCLUDED.min_stock_level, ",
            "max_stock_level = EXCLUDED.max_stock_level, ",
            "status = ",
            stock_status_sql!("branch_inventory_items.quantity", "EXCLUDED.min_stock_level"),
            ", updated_at = NOW()"
        ))
        .bind(branch_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Add `quantity` units of `name` to a branch, creating the row if needed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the upsert fails.
pub async fn credit(
    conn: &mut PgConnection,
    branch_id: BranchId,
    name: &str,
    quantity: i32,
) -> Result<StockMove, RepositoryError> {
    let moved = sqlx::query_as::<_, StockMove>(concat!(
        "INSERT INTO branch_inventory_items ",
        "(branch_id, name, quantity, unit, min_stock_level, max_stock_level, status) ",
        "SELECT $1::int4, $2::text, $3::int4, ",
        "COALESCE(f.unit, $4::text), ",
        "COALESCE(f.min_stock_level, $5::int4), ",
        "COALESCE(f.max_stock_level, $6::int4), ",
        stock_status_sql!("$3::int4", "COALESCE(f.min_stock_level, $5::int4)"),
        " FROM (SELECT 1) AS seed LEFT JOIN inventory_items f ON f.name = $2::text ",
        "ON CONFLICT (branch_id, name) DO UPDATE SET ",
        "quantity = branch_inventory_items.quantity + EXCLUDED.quantity, ",
        "status = ",
        stock_status_sql!(
            "branch_inventory_items.quantity + EXCLUDED.quantity",
            "branch_inventory_items.min_stock_level"
        ),
        ", updated_at = NOW() ",
        "RETURNING quantity - $3::int4 AS before, quantity AS after"
    ))
    .bind(branch_id)
    .bind(name)
    .bind(quantity)
    .bind(DEFAULT_UNIT)
    .bind(DEFAULT_MIN_STOCK_LEVEL)
    .bind(DEFAULT_MAX_STOCK_LEVEL)
    .fetch_one(&mut *conn)
    .await?;

    Ok(moved)
}

/// Take `quantity` units of `name` from a branch if that many are on hand.
///
/// Returns `None` if the row is missing or short.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn debit(
    conn: &mut PgConnection,
    branch_id: BranchId,
    name: &str,
    quantity: i32,
) -> Result<Option<StockMove>, RepositoryError> {
    let moved = sqlx::query_as::<_, StockMove>(concat!(
        "UPDATE branch_inventory_items SET quantity = quantity - $3, status = ",
        stock_status_sql!("quantity - $3", "min_stock_level"),
        ", updated_at = NOW() WHERE branch_id = $1 AND name = $2 AND quantity >= $3 ",
        "RETURNING quantity + $3 AS before, quantity AS after"
    ))
    .bind(branch_id)
    .bind(name)
    .bind(quantity)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(moved)
}

/// Current quantity of `name` at a branch, if the row exists.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn on_hand(
    conn: &mut PgConnection,
    branch_id: BranchId,
    name: &str,
) -> Result<Option<i32>, RepositoryError> {
    let quantity = sqlx::query_scalar(
        "SELECT quantity FROM branch_inventory_items WHERE branch_id = $1 AND name = $2",
    )
    .bind(branch_id)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(quantity)
}
