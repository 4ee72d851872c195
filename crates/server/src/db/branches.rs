//! Branch repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use aquacycle_core::BranchId;

use super::RepositoryError;
use crate::models::Branch;

#[derive(Debug, sqlx::FromRow)]
struct BranchRow {
    id: BranchId,
    name: String,
    location: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BranchRow> for Branch {
    fn from(row: BranchRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            location: row.location,
            latitude: row.latitude,
            longitude: row.longitude,
            phone: row.phone,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Editable branch fields.
#[derive(Debug, Clone)]
pub struct BranchFields {
    pub name: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
}

/// Repository for branches.
pub struct BranchRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BranchRepository<'a> {
    /// Create a new branch repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all branches by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Branch>, RepositoryError> {
        let rows = sqlx::query_as::<_, BranchRow>("SELECT * FROM branches ORDER BY name")
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Branches that have been geocoded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_with_coordinates(&self) -> Result<Vec<Branch>, RepositoryError> {
        let rows = sqlx::query_as::<_, BranchRow>(
            r"
            SELECT * FROM branches
            WHERE latitude IS NOT NULL AND longitude IS NOT NULL
            ORDER BY id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a branch by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: BranchId) -> Result<Option<Branch>, RepositoryError> {
        let row = sqlx::query_as::<_, BranchRow>("SELECT * FROM branches WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Whether a branch exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, id: BranchId) -> Result<bool, RepositoryError> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM branches WHERE id = $1)")
            .bind(id)
            .fetch_one(self.pool)
            .await?;

        Ok(found)
    }

    /// Create a branch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(&self, fields: &BranchFields) -> Result<Branch, RepositoryError> {
        let row = sqlx::query_as::<_, BranchRow>(
            r"
            INSERT INTO branches (name, location, latitude, longitude, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            ",
        )
        .bind(&fields.name)
        .bind(&fields.location)
        .bind(fields.latitude)
        .bind(fields.longitude)
        .bind(&fields.phone)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique(e, "branch name already exists"))?;

        Ok(row.into())
    }

    /// Replace a branch's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    pub async fn update(
        &self,
        id: BranchId,
        fields: &BranchFields,
    ) -> Result<Option<Branch>, RepositoryError> {
        let row = sqlx::query_as::<_, BranchRow>(
            r"
            UPDATE branches
            SET name = $2, location = $3, latitude = $4, longitude = $5, phone = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.location)
        .bind(fields.latitude)
        .bind(fields.longitude)
        .bind(&fields.phone)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique(e, "branch name already exists"))?;

        Ok(row.map(Into::into))
    }

    /// Delete a branch. Its ledger, bin and orders go with it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: BranchId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM branches WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
