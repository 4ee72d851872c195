//! Driver bonus repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use aquacycle_core::{
    BonusPaymentStatus, DriverBonusId, DriverId, EmergencyRequestId, payroll::PayPeriod,
};

use super::RepositoryError;
use crate::models::DriverBonus;

#[derive(Debug, sqlx::FromRow)]
struct BonusRow {
    id: DriverBonusId,
    driver_id: DriverId,
    emergency_request_id: EmergencyRequestId,
    bonus_amount: Decimal,
    month: i32,
    year: i32,
    status: BonusPaymentStatus,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<BonusRow> for DriverBonus {
    fn from(row: BonusRow) -> Self {
        Self {
            id: row.id,
            driver_id: row.driver_id,
            emergency_request_id: row.emergency_request_id,
            bonus_amount: row.bonus_amount,
            month: row.month,
            year: row.year,
            status: row.status,
            paid_at: row.paid_at,
            created_at: row.created_at,
        }
    }
}

/// Filters for listing bonuses.
#[derive(Debug, Clone, Default)]
pub struct BonusFilter {
    pub driver_id: Option<DriverId>,
    pub month: Option<i32>,
    pub year: Option<i32>,
}

/// Repository for driver bonuses.
pub struct BonusRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BonusRepository<'a> {
    /// Create a new bonus repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List bonuses, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &BonusFilter) -> Result<Vec<DriverBonus>, RepositoryError> {
        let rows = sqlx::query_as::<_, BonusRow>(
            r"
            SELECT * FROM driver_bonuses
            WHERE ($1::int4 IS NULL OR driver_id = $1)
              AND ($2::int4 IS NULL OR month = $2)
              AND ($3::int4 IS NULL OR year = $3)
            ORDER BY year DESC, month DESC, id DESC
            ",
        )
        .bind(filter.driver_id)
        .bind(filter.month)
        .bind(filter.year)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Bonus amounts booked for a driver in a pay period.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn amounts_for(
        &self,
        driver_id: DriverId,
        period: PayPeriod,
    ) -> Result<Vec<Decimal>, RepositoryError> {
        let amounts = sqlx::query_scalar(
            r"
            SELECT bonus_amount FROM driver_bonuses
            WHERE driver_id = $1 AND month = $2 AND year = $3
            ORDER BY id
            ",
        )
        .bind(driver_id)
        .bind(period.month)
        .bind(period.year)
        .fetch_all(self.pool)
        .await?;

        Ok(amounts)
    }

    /// Mark a pending bonus paid.
    ///
    /// Returns `None` if the bonus is missing or already paid.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_paid(&self, id: DriverBonusId) -> Result<Option<DriverBonus>, RepositoryError> {
        let row = sqlx::query_as::<_, BonusRow>(
            r"
            UPDATE driver_bonuses SET status = 'Paid', paid_at = NOW()
            WHERE id = $1 AND status = 'Pending'
            RETURNING *
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Whether a bonus exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, id: DriverBonusId) -> Result<bool, RepositoryError> {
        let found: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM driver_bonuses WHERE id = $1)")
                .bind(id)
                .fetch_one(self.pool)
                .await?;

        Ok(found)
    }
}

/// Book the bonus for an emergency request unless one already exists.
///
/// Returns `None` when the request already has a bonus.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_once(
    conn: &mut PgConnection,
    driver_id: DriverId,
    emergency_request_id: EmergencyRequestId,
    amount: Decimal,
    period: PayPeriod,
) -> Result<Option<DriverBonus>, RepositoryError> {
    let row = sqlx::query_as::<_, BonusRow>(
        r"
        INSERT INTO driver_bonuses (driver_id, emergency_request_id, bonus_amount, month, year)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (emergency_request_id) DO NOTHING
        RETURNING *
        ",
    )
    .bind(driver_id)
    .bind(emergency_request_id)
    .bind(amount)
    .bind(period.month)
    .bind(period.year)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}
