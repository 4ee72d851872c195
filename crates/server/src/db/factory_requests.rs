//! Factory request repository.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use aquacycle_core::{
    BranchId, FactoryRequestId, FactoryRequestStatus, UserId,
    stock::{LineItem, total_quantity},
};

use super::RepositoryError;
use crate::models::FactoryRequest;

#[derive(Debug, sqlx::FromRow)]
struct FactoryRequestRow {
    id: FactoryRequestId,
    request_code: String,
    branch_id: BranchId,
    items: Json<Vec<LineItem>>,
    total_quantity: i32,
    status: FactoryRequestStatus,
    requested_by: Option<UserId>,
    notes: Option<String>,
    decided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FactoryRequestRow> for FactoryRequest {
    fn from(row: FactoryRequestRow) -> Self {
        Self {
            id: row.id,
            request_code: row.request_code,
            branch_id: row.branch_id,
            items: row.items.0,
            total_quantity: row.total_quantity,
            status: row.status,
            requested_by: row.requested_by,
            notes: row.notes,
            decided_at: row.decided_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for branch stock requests.
pub struct FactoryRequestRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FactoryRequestRepository<'a> {
    /// Create a new factory request repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List requests, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        branch_id: Option<BranchId>,
        status: Option<FactoryRequestStatus>,
    ) -> Result<Vec<FactoryRequest>, RepositoryError> {
        let rows = sqlx::query_as::<_, FactoryRequestRow>(
            r"
            SELECT * FROM factory_requests
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

    /// Get a request by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: FactoryRequestId) -> Result<Option<FactoryRequest>, RepositoryError> {
        let row = sqlx::query_as::<_, FactoryRequestRow>(
            "SELECT * FROM factory_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}

/// Insert a pending request.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the request code is taken.
pub async fn insert(
    conn: &mut PgConnection,
    request_code: &str,
    branch_id: BranchId,
    items: &[LineItem],
    requested_by: Option<UserId>,
    notes: Option<&str>,
) -> Result<FactoryRequest, RepositoryError> {
    let row = sqlx::query_as::<_, FactoryRequestRow>(
        r"
        INSERT INTO factory_requests
            (request_code, branch_id, items, total_quantity, requested_by, notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        ",
    )
    .bind(request_code)
    .bind(branch_id)
    .bind(Json(items))
    .bind(total_quantity(items))
    .bind(requested_by)
    .bind(notes)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| RepositoryError::on_unique(e, "request code already exists"))?;

    Ok(row.into())
}

/// Decide a pending request.
///
/// Returns `None` if the request is missing or no longer pending.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn decide(
    conn: &mut PgConnection,
    id: FactoryRequestId,
    decision: FactoryRequestStatus,
) -> Result<Option<FactoryRequest>, RepositoryError> {
    let row = sqlx::query_as::<_, FactoryRequestRow>(
        r"
        UPDATE factory_requests
        SET status = $2, decided_at = NOW(), updated_at = NOW()
        WHERE id = $1 AND status = 'Pending'
        RETURNING *
        ",
    )
    .bind(id)
    .bind(decision)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}
