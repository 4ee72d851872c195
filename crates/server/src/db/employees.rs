//! Employee repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use aquacycle_core::{BranchId, EmployeeId};

use super::RepositoryError;
use crate::models::Employee;

#[derive(Debug, sqlx::FromRow)]
struct EmployeeRow {
    id: EmployeeId,
    name: String,
    position: String,
    branch_id: Option<BranchId>,
    phone: Option<String>,
    email: Option<String>,
    salary: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EmployeeRow> for Employee {
    fn from(row: EmployeeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            position: row.position,
            branch_id: row.branch_id,
            phone: row.phone,
            email: row.email,
            salary: row.salary,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Editable employee fields.
#[derive(Debug, Clone)]
pub struct EmployeeFields {
    pub name: String,
    pub position: String,
    pub branch_id: Option<BranchId>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub salary: Decimal,
}

/// Repository for branch and factory staff.
pub struct EmployeeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EmployeeRepository<'a> {
    /// Create a new employee repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List employees, optionally for one branch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, branch_id: Option<BranchId>) -> Result<Vec<Employee>, RepositoryError> {
        let rows = sqlx::query_as::<_, EmployeeRow>(
            r"
            SELECT * FROM employees
            WHERE $1::int4 IS NULL OR branch_id = $1
            ORDER BY name, id
            ",
        )
        .bind(branch_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get an employee by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: EmployeeId) -> Result<Option<Employee>, RepositoryError> {
        let row = sqlx::query_as::<_, EmployeeRow>("SELECT * FROM employees WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Create an employee.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, fields: &EmployeeFields) -> Result<Employee, RepositoryError> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            r"
            INSERT INTO employees (name, position, branch_id, phone, email, salary)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(&fields.name)
        .bind(&fields.position)
        .bind(fields.branch_id)
        .bind(&fields.phone)
        .bind(&fields.email)
        .bind(fields.salary)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Replace an employee's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(
        &self,
        id: EmployeeId,
        fields: &EmployeeFields,
    ) -> Result<Option<Employee>, RepositoryError> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            r"
            UPDATE employees
            SET name = $2, position = $3, branch_id = $4, phone = $5, email = $6,
                salary = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.position)
        .bind(fields.branch_id)
        .bind(&fields.phone)
        .bind(&fields.email)
        .bind(fields.salary)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Delete an employee.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: EmployeeId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM employees WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
