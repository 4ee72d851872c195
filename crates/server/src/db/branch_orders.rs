//! Branch order repository.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use aquacycle_core::{
    BranchId, BranchOrderId, DriverId, OrderId, OrderStatus,
    order::labels,
    stock::{LineItem, total_quantity},
};

use super::RepositoryError;
use crate::models::BranchOrder;

#[derive(Debug, sqlx::FromRow)]
struct BranchOrderRow {
    id: BranchOrderId,
    order_number: String,
    branch_id: BranchId,
    items: Json<Vec<LineItem>>,
    total_quantity: i32,
    status: OrderStatus,
    factory_order_id: Option<OrderId>,
    assigned_driver_id: Option<DriverId>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BranchOrderRow> for BranchOrder {
    fn from(row: BranchOrderRow) -> Self {
        Self {
            id: row.id,
            order_number: row.order_number,
            branch_id: row.branch_id,
            items: row.items.0,
            total_quantity: row.total_quantity,
            status: row.status,
            factory_order_id: row.factory_order_id,
            assigned_driver: row.assigned_driver_id,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for branch orders.
pub struct BranchOrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BranchOrderRepository<'a> {
    /// Create a new branch order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List branch orders, newest first, optionally for one branch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        branch_id: Option<BranchId>,
        status: Option<OrderStatus>,
    ) -> Result<Vec<BranchOrder>, RepositoryError> {
        let rows = sqlx::query_as::<_, BranchOrderRow>(
            r"
            SELECT * FROM branch_orders
            WHERE ($1::int4 IS NULL OR branch_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(branch_id)
        .bind(status)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Branch orders in any of `statuses`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_in(
        &self,
        statuses: &[OrderStatus],
    ) -> Result<Vec<BranchOrder>, RepositoryError> {
        let rows = sqlx::query_as::<_, BranchOrderRow>(
            "SELECT * FROM branch_orders WHERE status = ANY($1) ORDER BY created_at, id",
        )
        .bind(labels(statuses))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a branch order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: BranchOrderId) -> Result<Option<BranchOrder>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, id).await
    }

    /// Delete a branch order that is in one of `deletable` statuses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_in(
        &self,
        id: BranchOrderId,
        deletable: &[OrderStatus],
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM branch_orders WHERE id = $1 AND status = ANY($2)")
            .bind(id)
            .bind(labels(deletable))
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Get a branch order by ID on an existing connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(
    conn: &mut PgConnection,
    id: BranchOrderId,
) -> Result<Option<BranchOrder>, RepositoryError> {
    let row = sqlx::query_as::<_, BranchOrderRow>("SELECT * FROM branch_orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(Into::into))
}

/// Insert a pending branch order.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the order number is taken.
pub async fn insert(
    conn: &mut PgConnection,
    order_number: &str,
    branch_id: BranchId,
    items: &[LineItem],
    notes: Option<&str>,
) -> Result<BranchOrder, RepositoryError> {
    let row = sqlx::query_as::<_, BranchOrderRow>(
        r"
        INSERT INTO branch_orders (order_number, branch_id, items, total_quantity, notes)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        ",
    )
    .bind(order_number)
    .bind(branch_id)
    .bind(Json(items))
    .bind(total_quantity(items))
    .bind(notes)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| RepositoryError::on_unique(e, "order number already exists"))?;

    Ok(row.into())
}

/// Point a branch order at its factory order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn link_factory_order(
    conn: &mut PgConnection,
    id: BranchOrderId,
    factory_order_id: OrderId,
) -> Result<BranchOrder, RepositoryError> {
    let row = sqlx::query_as::<_, BranchOrderRow>(
        "UPDATE branch_orders SET factory_order_id = $2 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(factory_order_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    Ok(row.into())
}

/// Move a branch order to `next` if its status is one of `expected`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn transition(
    conn: &mut PgConnection,
    id: BranchOrderId,
    expected: &[OrderStatus],
    next: OrderStatus,
) -> Result<Option<BranchOrder>, RepositoryError> {
    let row = sqlx::query_as::<_, BranchOrderRow>(
        r"
        UPDATE branch_orders SET status = $3, updated_at = NOW()
        WHERE id = $1 AND status = ANY($2)
        RETURNING *
        ",
    )
    .bind(id)
    .bind(labels(expected))
    .bind(next)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Copy a factory order's status onto its branch order.
///
/// Returns the branch order only when its status actually changed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn mirror_status(
    conn: &mut PgConnection,
    id: BranchOrderId,
    status: OrderStatus,
) -> Result<Option<BranchOrder>, RepositoryError> {
    let row = sqlx::query_as::<_, BranchOrderRow>(
        r"
        UPDATE branch_orders SET status = $2, updated_at = NOW()
        WHERE id = $1 AND status <> $2
        RETURNING *
        ",
    )
    .bind(id)
    .bind(status)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Record the driver carrying an open branch order.
///
/// Returns `None` if the order is missing or already delivered or cancelled.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn assign_driver(
    conn: &mut PgConnection,
    id: BranchOrderId,
    driver_id: DriverId,
) -> Result<Option<BranchOrder>, RepositoryError> {
    let row = sqlx::query_as::<_, BranchOrderRow>(
        r"
        UPDATE branch_orders SET assigned_driver_id = $2, updated_at = NOW()
        WHERE id = $1 AND status NOT IN ('Delivered', 'Cancelled')
        RETURNING *
        ",
    )
    .bind(id)
    .bind(driver_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}
