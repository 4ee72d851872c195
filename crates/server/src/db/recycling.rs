//! Recycling bins, recycling requests and collection requests.
//!
//! Bin fill fields are always written together from a [`BinFill`] computed by
//! the caller while the row is locked with [`lock_bin_for_branch`] or
//! [`lock_bin`].

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use aquacycle_core::{
    BinStatus, BranchId, CollectionRequestId, RecyclingBinId, RecyclingRequestId, RequestStatus,
    UserId, recycling::BinFill,
};

use super::RepositoryError;
use crate::models::{CollectionRequest, RecyclingBin, RecyclingRequest};

fn labels(statuses: &[RequestStatus]) -> Vec<&'static str> {
    statuses.iter().map(RequestStatus::as_str).collect()
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct BinRow {
    id: RecyclingBinId,
    branch_id: BranchId,
    capacity: f64,
    current_level: f64,
    fill_percentage: f64,
    status: BinStatus,
    is_notified: bool,
    last_emptied_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BinRow> for RecyclingBin {
    fn from(row: BinRow) -> Self {
        Self {
            id: row.id,
            branch_id: row.branch_id,
            capacity: row.capacity,
            current_level: row.current_level,
            fill_percentage: row.fill_percentage,
            status: row.status,
            is_notified: row.is_notified,
            last_emptied_at: row.last_emptied_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RecyclingRequestRow {
    id: RecyclingRequestId,
    request_code: String,
    customer_id: Option<UserId>,
    branch_id: BranchId,
    waste_weight: f64,
    waste_type: Option<String>,
    status: RequestStatus,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RecyclingRequestRow> for RecyclingRequest {
    fn from(row: RecyclingRequestRow) -> Self {
        Self {
            id: row.id,
            request_code: row.request_code,
            customer_id: row.customer_id,
            branch_id: row.branch_id,
            waste_weight: row.waste_weight,
            waste_type: row.waste_type,
            status: row.status,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CollectionRequestRow {
    id: CollectionRequestId,
    request_code: String,
    branch_id: BranchId,
    bin_id: RecyclingBinId,
    requested_by: Option<UserId>,
    status: RequestStatus,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CollectionRequestRow> for CollectionRequest {
    fn from(row: CollectionRequestRow) -> Self {
        Self {
            id: row.id,
            request_code: row.request_code,
            branch_id: row.branch_id,
            bin_id: row.bin_id,
            requested_by: row.requested_by,
            status: row.status,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Filters for listing recycling and collection requests.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub branch_id: Option<BranchId>,
    pub status: Option<RequestStatus>,
    /// Customer (recycling) or requester (collection).
    pub user_id: Option<UserId>,
}

// =============================================================================
// Bins
// =============================================================================

/// Repository for recycling bins.
pub struct BinRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BinRepository<'a> {
    /// Create a new bin repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List every bin, fullest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<RecyclingBin>, RepositoryError> {
        let rows = sqlx::query_as::<_, BinRow>(
            "SELECT * FROM recycling_bins ORDER BY fill_percentage DESC, id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Bins that have crossed the notification threshold since their last
    /// collection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn notified(&self) -> Result<Vec<RecyclingBin>, RepositoryError> {
        let rows = sqlx::query_as::<_, BinRow>(
            "SELECT * FROM recycling_bins WHERE is_notified ORDER BY fill_percentage DESC, id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get the bin of a branch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_branch(
        &self,
        branch_id: BranchId,
    ) -> Result<Option<RecyclingBin>, RepositoryError> {
        let row = sqlx::query_as::<_, BinRow>("SELECT * FROM recycling_bins WHERE branch_id = $1")
            .bind(branch_id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Create the bin of a branch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the branch already has a bin.
    pub async fn create(
        &self,
        branch_id: BranchId,
        fill: &BinFill,
    ) -> Result<RecyclingBin, RepositoryError> {
        let row = sqlx::query_as::<_, BinRow>(
            r"
            INSERT INTO recycling_bins
                (branch_id, capacity, current_level, fill_percentage, status, is_notified)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(branch_id)
        .bind(fill.capacity)
        .bind(fill.current_level)
        .bind(fill.fill_percentage)
        .bind(fill.status)
        .bind(fill.is_notified)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique(e, "branch already has a recycling bin"))?;

        Ok(row.into())
    }
}

/// Lock a branch's bin for a fill change.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_bin_for_branch(
    conn: &mut PgConnection,
    branch_id: BranchId,
) -> Result<Option<RecyclingBin>, RepositoryError> {
    let row = sqlx::query_as::<_, BinRow>(
        "SELECT * FROM recycling_bins WHERE branch_id = $1 FOR UPDATE",
    )
    .bind(branch_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Lock a bin by ID for a fill change.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_bin(
    conn: &mut PgConnection,
    id: RecyclingBinId,
) -> Result<Option<RecyclingBin>, RepositoryError> {
    let row = sqlx::query_as::<_, BinRow>("SELECT * FROM recycling_bins WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(Into::into))
}

/// Write a new fill state. `emptied` also stamps `last_emptied_at`.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the bin vanished.
pub async fn update_fill(
    conn: &mut PgConnection,
    id: RecyclingBinId,
    fill: &BinFill,
    emptied: bool,
) -> Result<RecyclingBin, RepositoryError> {
    let row = sqlx::query_as::<_, BinRow>(
        r"
        UPDATE recycling_bins
        SET capacity = $2, current_level = $3, fill_percentage = $4, status = $5,
            is_notified = $6,
            last_emptied_at = CASE WHEN $7 THEN NOW() ELSE last_emptied_at END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(id)
    .bind(fill.capacity)
    .bind(fill.current_level)
    .bind(fill.fill_percentage)
    .bind(fill.status)
    .bind(fill.is_notified)
    .bind(emptied)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    Ok(row.into())
}

// =============================================================================
// Recycling requests
// =============================================================================

/// Repository for customer recycling requests.
pub struct RecyclingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RecyclingRepository<'a> {
    /// Create a new recycling request repository.
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
        filter: &RequestFilter,
    ) -> Result<Vec<RecyclingRequest>, RepositoryError> {
        let rows = sqlx::query_as::<_, RecyclingRequestRow>(
            r"
            SELECT * FROM recycling_requests
            WHERE ($1::int4 IS NULL OR branch_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::int4 IS NULL OR customer_id = $3)
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(filter.branch_id)
        .bind(filter.status)
        .bind(filter.user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a request by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        id: RecyclingRequestId,
    ) -> Result<Option<RecyclingRequest>, RepositoryError> {
        let row = sqlx::query_as::<_, RecyclingRequestRow>(
            "SELECT * FROM recycling_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}

/// Fields of a new recycling request.
#[derive(Debug, Clone)]
pub struct NewRecyclingRequest<'a> {
    pub customer_id: Option<UserId>,
    pub branch_id: BranchId,
    pub waste_weight: f64,
    pub waste_type: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// Insert a pending recycling request.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the request code is taken.
pub async fn insert_recycling(
    conn: &mut PgConnection,
    request_code: &str,
    request: &NewRecyclingRequest<'_>,
) -> Result<RecyclingRequest, RepositoryError> {
    let row = sqlx::query_as::<_, RecyclingRequestRow>(
        r"
        INSERT INTO recycling_requests
            (request_code, customer_id, branch_id, waste_weight, waste_type, notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        ",
    )
    .bind(request_code)
    .bind(request.customer_id)
    .bind(request.branch_id)
    .bind(request.waste_weight)
    .bind(request.waste_type)
    .bind(request.notes)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| RepositoryError::on_unique(e, "request code already exists"))?;

    Ok(row.into())
}

/// Get a recycling request on an existing connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_recycling(
    conn: &mut PgConnection,
    id: RecyclingRequestId,
) -> Result<Option<RecyclingRequest>, RepositoryError> {
    let row = sqlx::query_as::<_, RecyclingRequestRow>(
        "SELECT * FROM recycling_requests WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Move a recycling request to `next` if its status is one of `expected`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn transition_recycling(
    conn: &mut PgConnection,
    id: RecyclingRequestId,
    expected: &[RequestStatus],
    next: RequestStatus,
) -> Result<Option<RecyclingRequest>, RepositoryError> {
    let row = sqlx::query_as::<_, RecyclingRequestRow>(
        r"
        UPDATE recycling_requests SET status = $3, updated_at = NOW()
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

// =============================================================================
// Collection requests
// =============================================================================

/// Repository for bin collection requests.
pub struct CollectionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CollectionRepository<'a> {
    /// Create a new collection request repository.
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
        filter: &RequestFilter,
    ) -> Result<Vec<CollectionRequest>, RepositoryError> {
        let rows = sqlx::query_as::<_, CollectionRequestRow>(
            r"
            SELECT * FROM collection_requests
            WHERE ($1::int4 IS NULL OR branch_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::int4 IS NULL OR requested_by = $3)
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(filter.branch_id)
        .bind(filter.status)
        .bind(filter.user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Insert a pending collection request for `bin_id`.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the request code is taken.
pub async fn insert_collection(
    conn: &mut PgConnection,
    request_code: &str,
    branch_id: BranchId,
    bin_id: RecyclingBinId,
    requested_by: Option<UserId>,
    notes: Option<&str>,
) -> Result<CollectionRequest, RepositoryError> {
    let row = sqlx::query_as::<_, CollectionRequestRow>(
        r"
        INSERT INTO collection_requests (request_code, branch_id, bin_id, requested_by, notes)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        ",
    )
    .bind(request_code)
    .bind(branch_id)
    .bind(bin_id)
    .bind(requested_by)
    .bind(notes)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| RepositoryError::on_unique(e, "request code already exists"))?;

    Ok(row.into())
}

/// Get a collection request on an existing connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_collection(
    conn: &mut PgConnection,
    id: CollectionRequestId,
) -> Result<Option<CollectionRequest>, RepositoryError> {
    let row = sqlx::query_as::<_, CollectionRequestRow>(
        "SELECT * FROM collection_requests WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Move a collection request to `next` if its status is one of `expected`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn transition_collection(
    conn: &mut PgConnection,
    id: CollectionRequestId,
    expected: &[RequestStatus],
    next: RequestStatus,
) -> Result<Option<CollectionRequest>, RepositoryError> {
    let row = sqlx::query_as::<_, CollectionRequestRow>(
        r"
        UPDATE collection_requests SET status = $3, updated_at = NOW()
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
