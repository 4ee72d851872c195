//! Emergency request repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use aquacycle_core::{
    BonusState, BranchId, DriverId, EmergencyRequestId, EmergencyStatus, UserId,
    emergency::labels, stock::LineItem,
};

use super::RepositoryError;
use crate::models::EmergencyRequest;

#[derive(Debug, sqlx::FromRow)]
struct EmergencyRow {
    id: EmergencyRequestId,
    request_code: String,
    brigade_id: Option<UserId>,
    location: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    nearest_branch_id: Option<BranchId>,
    distance_km: Option<f64>,
    description: String,
    items_needed: Json<Vec<LineItem>>,
    status: EmergencyStatus,
    assigned_driver_id: Option<DriverId>,
    bonus_eligible: bool,
    bonus_amount: Decimal,
    bonus_status: BonusState,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EmergencyRow> for EmergencyRequest {
    fn from(row: EmergencyRow) -> Self {
        Self {
            id: row.id,
            request_code: row.request_code,
            brigade_id: row.brigade_id,
            location: row.location,
            latitude: row.latitude,
            longitude: row.longitude,
            nearest_branch_id: row.nearest_branch_id,
            distance_km: row.distance_km,
            description: row.description,
            items_needed: row.items_needed.0,
            status: row.status,
            assigned_driver: row.assigned_driver_id,
            bonus_eligible: row.bonus_eligible,
            bonus_amount: row.bonus_amount,
            bonus_status: row.bonus_status,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields of a new emergency request, after geocoding.
#[derive(Debug, Clone)]
pub struct NewEmergencyRequest<'a> {
    pub brigade_id: Option<UserId>,
    pub location: &'a str,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub nearest_branch_id: Option<BranchId>,
    pub distance_km: Option<f64>,
    pub description: &'a str,
    pub items_needed: &'a [LineItem],
    pub bonus_eligible: bool,
    pub bonus_amount: Decimal,
}

/// Repository for emergency requests.
pub struct EmergencyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EmergencyRepository<'a> {
    /// Create a new emergency repository.
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
        status: Option<EmergencyStatus>,
        brigade_id: Option<UserId>,
    ) -> Result<Vec<EmergencyRequest>, RepositoryError> {
        let rows = sqlx::query_as::<_, EmergencyRow>(
            r"
            SELECT * FROM emergency_requests
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::int4 IS NULL OR brigade_id = $2)
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(status)
        .bind(brigade_id)
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
        id: EmergencyRequestId,
    ) -> Result<Option<EmergencyRequest>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, id).await
    }
}

/// Get a request on an existing connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(
    conn: &mut PgConnection,
    id: EmergencyRequestId,
) -> Result<Option<EmergencyRequest>, RepositoryError> {
    let row = sqlx::query_as::<_, EmergencyRow>("SELECT * FROM emergency_requests WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(Into::into))
}

/// Insert a pending request. The bonus status starts as `Pending` for
/// eligible requests and `Not Applicable` otherwise.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the request code is taken.
pub async fn insert(
    conn: &mut PgConnection,
    request_code: &str,
    request: &NewEmergencyRequest<'_>,
) -> Result<EmergencyRequest, RepositoryError> {
    let bonus_status = if request.bonus_eligible {
        BonusState::Pending
    } else {
        BonusState::NotApplicable
    };

    let row = sqlx::query_as::<_, EmergencyRow>(
        r"
        INSERT INTO emergency_requests
            (request_code, brigade_id, location, latitude, longitude, nearest_branch_id,
             distance_km, description, items_needed, bonus_eligible, bonus_amount, bonus_status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        ",
    )
    .bind(request_code)
    .bind(request.brigade_id)
    .bind(request.location)
    .bind(request.latitude)
    .bind(request.longitude)
    .bind(request.nearest_branch_id)
    .bind(request.distance_km)
    .bind(request.description)
    .bind(Json(request.items_needed))
    .bind(request.bonus_eligible)
    .bind(request.bonus_amount)
    .bind(bonus_status)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| RepositoryError::on_unique(e, "request code already exists"))?;

    Ok(row.into())
}

/// Move a request to `next` if its status is one of `next`'s predecessors.
///
/// Completion also stamps `completed_at`. Returns `None` if the request is
/// missing or its status did not match.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn transition(
    conn: &mut PgConnection,
    id: EmergencyRequestId,
    next: EmergencyStatus,
) -> Result<Option<EmergencyRequest>, RepositoryError> {
    let row = sqlx::query_as::<_, EmergencyRow>(
        r"
        UPDATE emergency_requests
        SET status = $3,
            completed_at = CASE WHEN $3 = 'Completed' THEN NOW() ELSE completed_at END,
            updated_at = NOW()
        WHERE id = $1 AND status = ANY($2)
        RETURNING *
        ",
    )
    .bind(id)
    .bind(labels(next.predecessors()))
    .bind(next)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Move a request to `In Progress` with `driver_id` aboard.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn start_with_driver(
    conn: &mut PgConnection,
    id: EmergencyRequestId,
    driver_id: DriverId,
) -> Result<Option<EmergencyRequest>, RepositoryError> {
    let row = sqlx::query_as::<_, EmergencyRow>(
        r"
        UPDATE emergency_requests
        SET status = 'In Progress', assigned_driver_id = $3, updated_at = NOW()
        WHERE id = $1 AND status = ANY($2)
        RETURNING *
        ",
    )
    .bind(id)
    .bind(labels(EmergencyStatus::InProgress.predecessors()))
    .bind(driver_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Record the outcome of the bonus step.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the request vanished.
pub async fn set_bonus_status(
    conn: &mut PgConnection,
    id: EmergencyRequestId,
    state: BonusState,
) -> Result<EmergencyRequest, RepositoryError> {
    let row = sqlx::query_as::<_, EmergencyRow>(
        r"
        UPDATE emergency_requests SET bonus_status = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(id)
    .bind(state)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    Ok(row.into())
}
