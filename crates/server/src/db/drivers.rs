//! Driver repository.
//!
//! A driver carries one order at a time: [`claim`] only succeeds for an
//! `Available` driver and [`release`] puts them back, so the status column is
//! the assignment lock.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use aquacycle_core::{BranchId, BranchOrderId, DriverId, DriverStatus};

use super::RepositoryError;
use crate::models::Driver;

#[derive(Debug, sqlx::FromRow)]
struct DriverRow {
    id: DriverId,
    driver_code: String,
    name: String,
    phone: String,
    license_number: Option<String>,
    branch_id: Option<BranchId>,
    status: DriverStatus,
    assigned_orders: Vec<i32>,
    total_deliveries: i32,
    base_salary: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DriverRow> for Driver {
    fn from(row: DriverRow) -> Self {
        Self {
            id: row.id,
            driver_code: row.driver_code,
            name: row.name,
            phone: row.phone,
            license_number: row.license_number,
            branch_id: row.branch_id,
            status: row.status,
            assigned_orders: row.assigned_orders.into_iter().map(BranchOrderId::new).collect(),
            total_deliveries: row.total_deliveries,
            base_salary: row.base_salary,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Editable driver details.
#[derive(Debug, Clone)]
pub struct DriverFields {
    pub name: String,
    pub phone: String,
    pub license_number: Option<String>,
    pub branch_id: Option<BranchId>,
    pub base_salary: Decimal,
}

/// Filters for listing drivers.
#[derive(Debug, Clone, Default)]
pub struct DriverFilter {
    pub status: Option<DriverStatus>,
    pub branch_id: Option<BranchId>,
}

/// Repository for drivers.
pub struct DriverRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DriverRepository<'a> {
    /// Create a new driver repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List drivers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &DriverFilter) -> Result<Vec<Driver>, RepositoryError> {
        let rows = sqlx::query_as::<_, DriverRow>(
            r"
            SELECT * FROM drivers
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::int4 IS NULL OR branch_id = $2)
            ORDER BY name, id
            ",
        )
        .bind(filter.status)
        .bind(filter.branch_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a driver by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: DriverId) -> Result<Option<Driver>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, id).await
    }

    /// Create a driver under a pre-generated code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is already taken.
    pub async fn create(
        &self,
        driver_code: &str,
        fields: &DriverFields,
    ) -> Result<Driver, RepositoryError> {
        let row = sqlx::query_as::<_, DriverRow>(
            r"
            INSERT INTO drivers (driver_code, name, phone, license_number, branch_id, base_salary)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(driver_code)
        .bind(&fields.name)
        .bind(&fields.phone)
        .bind(&fields.license_number)
        .bind(fields.branch_id)
        .bind(fields.base_salary)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique(e, "driver code already exists"))?;

        Ok(row.into())
    }

    /// Replace a driver's details. Status and assignments are untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(
        &self,
        id: DriverId,
        fields: &DriverFields,
    ) -> Result<Option<Driver>, RepositoryError> {
        let row = sqlx::query_as::<_, DriverRow>(
            r"
            UPDATE drivers
            SET name = $2, phone = $3, license_number = $4, branch_id = $5,
                base_salary = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.phone)
        .bind(&fields.license_number)
        .bind(fields.branch_id)
        .bind(fields.base_salary)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Set a driver's status by hand.
    ///
    /// `Off Duty` is only written for a driver with no assigned orders.
    /// Returns `None` when the driver is missing or still carrying orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_status(
        &self,
        id: DriverId,
        status: DriverStatus,
    ) -> Result<Option<Driver>, RepositoryError> {
        let row = sqlx::query_as::<_, DriverRow>(
            r"
            UPDATE drivers SET status = $2, updated_at = NOW()
            WHERE id = $1
              AND ($2 <> 'Off Duty' OR cardinality(assigned_orders) = 0)
            RETURNING *
            ",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Delete a driver who is not out on a delivery.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_idle(&self, id: DriverId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM drivers WHERE id = $1 AND status <> 'On Delivery'")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Get a driver by ID on an existing connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(conn: &mut PgConnection, id: DriverId) -> Result<Option<Driver>, RepositoryError> {
    let row = sqlx::query_as::<_, DriverRow>("SELECT * FROM drivers WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(Into::into))
}

/// Put an `Available` driver on delivery, optionally recording the branch
/// order they carry.
///
/// Returns `None` if the driver is missing or not available.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn claim(
    conn: &mut PgConnection,
    id: DriverId,
    order: Option<BranchOrderId>,
) -> Result<Option<Driver>, RepositoryError> {
    let row = sqlx::query_as::<_, DriverRow>(
        r"
        UPDATE drivers
        SET status = 'On Delivery',
            assigned_orders = CASE WHEN $2::int4 IS NULL THEN assigned_orders
                                   ELSE array_append(assigned_orders, $2::int4) END,
            updated_at = NOW()
        WHERE id = $1 AND status = 'Available'
        RETURNING *
        ",
    )
    .bind(id)
    .bind(order)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Return a driver to `Available` after a completed delivery.
///
/// Counts the delivery and drops `order` from the driver's assignments.
/// Returns `None` if the driver no longer exists.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn release(
    conn: &mut PgConnection,
    id: DriverId,
    order: Option<BranchOrderId>,
) -> Result<Option<Driver>, RepositoryError> {
    let row = sqlx::query_as::<_, DriverRow>(
        r"
        UPDATE drivers
        SET status = 'Available',
            total_deliveries = total_deliveries + 1,
            assigned_orders = CASE WHEN $2::int4 IS NULL THEN assigned_orders
                                   ELSE array_remove(assigned_orders, $2::int4) END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(id)
    .bind(order)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}
