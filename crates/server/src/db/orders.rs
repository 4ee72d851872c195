//! Factory order repository.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use aquacycle_core::{
    BranchId, BranchOrderId, OrderId, OrderSource, OrderStatus,
    order::labels,
    stock::{LineItem, total_quantity},
};

use super::RepositoryError;
use crate::models::Order;

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    items: Json<Vec<LineItem>>,
    total_quantity: i32,
    status: OrderStatus,
    source: OrderSource,
    branch_id: Option<BranchId>,
    branch_order_id: Option<BranchOrderId>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            order_number: row.order_number,
            items: row.items.0,
            total_quantity: row.total_quantity,
            status: row.status,
            source: row.source,
            branch_id: row.branch_id,
            original_branch_order_id: row.branch_order_id,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields of a new factory order.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub order_number: &'a str,
    pub items: &'a [LineItem],
    pub source: OrderSource,
    pub branch_id: Option<BranchId>,
    pub branch_order_id: Option<BranchOrderId>,
    pub notes: Option<&'a str>,
}

/// Filters for listing orders.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub branch_id: Option<BranchId>,
}

/// Repository for factory orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT * FROM orders
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::int4 IS NULL OR branch_id = $2)
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(filter.status)
        .bind(filter.branch_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Orders in any of `statuses`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_in(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE status = ANY($1) ORDER BY created_at, id",
        )
        .bind(labels(statuses))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, id).await
    }

    /// Delete an order that is in one of `deletable` statuses.
    ///
    /// Returns `false` if no such order exists in those statuses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_in(
        &self,
        id: OrderId,
        deletable: &[OrderStatus],
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1 AND status = ANY($2)")
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

/// Get an order by ID on an existing connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(Into::into))
}

/// Insert an order. `total_quantity` is computed from the items.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the order number is taken.
pub async fn insert(conn: &mut PgConnection, order: &NewOrder<'_>) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(
        r"
        INSERT INTO orders (order_number, items, total_quantity, source, branch_id, branch_order_id, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        ",
    )
    .bind(order.order_number)
    .bind(Json(order.items))
    .bind(total_quantity(order.items))
    .bind(order.source)
    .bind(order.branch_id)
    .bind(order.branch_order_id)
    .bind(order.notes)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| RepositoryError::on_unique(e, "order number already exists"))?;

    Ok(row.into())
}

/// Move an order to `next` if its status is one of `expected`.
///
/// Returns `None` if the order does not exist or its status did not match.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn transition(
    conn: &mut PgConnection,
    id: OrderId,
    expected: &[OrderStatus],
    next: OrderStatus,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(
        r"
        UPDATE orders SET status = $3, updated_at = NOW()
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

/// Copy a branch order's status onto its factory order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn mirror_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(&mut *conn)
        .await?;

    Ok(())
}
