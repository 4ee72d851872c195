//! Emergency dispatch for fire brigades and the driver bonus it pays.
//!
//! Completing a request with a driver aboard books a bonus for that driver.
//! The booking is best-effort: it runs in a savepoint inside the status
//! transaction, so a failed booking is rolled back on its own and reported
//! without undoing the completion. The `side_effects` claim and the unique
//! index on `driver_bonuses.emergency_request_id` keep it at most once.

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{Connection, PgConnection, PgPool};
use tracing::{error, info, instrument, warn};

use aquacycle_core::{
    BonusState, DomainError, DriverBonusId, DriverId, EmergencyRequestId, EmergencyStatus,
    FieldError, UserId,
    effect::SideEffectKey,
    emergency::bonus_due,
    geo::{self, GeoDirectory},
    payroll::PayPeriod,
    stock::{LineItem, validate_line_items},
};

use super::orders::claim_driver;
use crate::db::emergency::{self as repo, NewEmergencyRequest};
use crate::db::numbering::{self, Sequence};
use crate::db::{BonusRepository, BranchRepository, bonuses, drivers, side_effects};
use crate::error::AppError;
use crate::models::{BonusOutcome, Driver, DriverBonus, EmergencyRequest};

/// Fields a fire brigade submits.
#[derive(Debug, Clone)]
pub struct EmergencyInput {
    pub location: String,
    pub description: String,
    pub items_needed: Vec<LineItem>,
    pub bonus_eligible: Option<bool>,
    pub bonus_amount: Option<Decimal>,
}

impl EmergencyInput {
    fn validate(&self) -> Result<(), DomainError> {
        let mut errors = Vec::new();
        if self.location.trim().is_empty() {
            errors.push(FieldError::new("location", "location is required"));
        }
        if self.description.trim().is_empty() {
            errors.push(FieldError::new("description", "description is required"));
        }
        if self.bonus_amount.is_some_and(|amount| amount.is_sign_negative()) {
            errors.push(FieldError::new("bonusAmount", "bonus amount cannot be negative"));
        }
        if !self.items_needed.is_empty()
            && let Err(DomainError::Validation(item_errors)) = validate_line_items(&self.items_needed)
        {
            errors.extend(item_errors);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(errors))
        }
    }
}

/// Result of an emergency status write.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyUpdate {
    pub request: EmergencyRequest,
    /// Driver released by a completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<Driver>,
    /// Bonus step of a completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonus: Option<BonusOutcome>,
}

/// Emergency dispatch service.
pub struct EmergencyService<'a> {
    pool: &'a PgPool,
    geo: &'a GeoDirectory,
    default_bonus: Decimal,
}

impl<'a> EmergencyService<'a> {
    /// Create a new emergency service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, geo: &'a GeoDirectory, default_bonus: Decimal) -> Self {
        Self {
            pool,
            geo,
            default_bonus,
        }
    }

    /// Raise an emergency request, geocoding its location and picking the
    /// nearest branch.
    ///
    /// Unknown locations are accepted without coordinates.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the input is invalid.
    #[instrument(skip(self, input), fields(location = %input.location))]
    pub async fn create(
        &self,
        brigade_id: Option<UserId>,
        input: &EmergencyInput,
    ) -> Result<EmergencyRequest, AppError> {
        input.validate()?;

        let coordinates = self.geo.lookup(&input.location);
        let nearest = match coordinates {
            Some(origin) => {
                let branches = BranchRepository::new(self.pool)
                    .list_with_coordinates()
                    .await?;
                geo::nearest(
                    origin,
                    branches
                        .iter()
                        .filter_map(|b| b.coordinates().map(|point| (b.id, point))),
                )
            }
            None => {
                warn!("location not in geocoding table");
                None
            }
        };

        let mut tx = self.pool.begin().await?;
        let code = numbering::next_number(&mut tx, Sequence::Emergency).await?;
        let request = repo::insert(
            &mut tx,
            &code,
            &NewEmergencyRequest {
                brigade_id,
                location: input.location.trim(),
                latitude: coordinates.map(|c| c.lat),
                longitude: coordinates.map(|c| c.lng),
                nearest_branch_id: nearest.map(|(id, _)| id),
                distance_km: nearest.map(|(_, km)| km),
                description: &input.description,
                items_needed: &input.items_needed,
                bonus_eligible: input.bonus_eligible.unwrap_or(true),
                bonus_amount: input.bonus_amount.unwrap_or(self.default_bonus),
            },
        )
        .await?;
        tx.commit().await?;

        info!(
            request_id = %request.id,
            nearest_branch_id = ?request.nearest_branch_id,
            "emergency request created"
        );
        Ok(request)
    }

    /// Move a request along the dispatch workflow.
    ///
    /// Completion frees the assigned driver and books the bonus.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` with the current status if the move is not
    /// allowed, or `404`.
    #[instrument(skip(self), fields(request_id = %id, status = %next))]
    pub async fn update_status(
        &self,
        id: EmergencyRequestId,
        next: EmergencyStatus,
    ) -> Result<EmergencyUpdate, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = repo::get(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("emergency request"))?;
        current.status.ensure_can_move_to(next)?;

        let Some(mut request) = repo::transition(&mut tx, id, next).await? else {
            // Another writer moved the request since it was read.
            let status = repo::get(&mut tx, id).await?.map_or(current.status, |r| r.status);
            return Err(DomainError::transition("emergency request", status, next).into());
        };

        let mut update_driver = None;
        let mut bonus = None;
        if next == EmergencyStatus::Completed {
            if let Some(driver_id) = request.assigned_driver {
                update_driver = drivers::release(&mut tx, driver_id, None).await?;
            }
            let (updated, outcome) = book_bonus(&mut tx, request).await?;
            request = updated;
            bonus = Some(outcome);
        }

        tx.commit().await?;

        info!("emergency request status updated");
        Ok(EmergencyUpdate {
            request,
            driver: update_driver,
            bonus,
        })
    }

    /// Put an available driver on an approved request and start it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the request cannot start or the driver
    /// is busy, or `404` for either record.
    #[instrument(skip(self), fields(request_id = %id, driver_id = %driver_id))]
    pub async fn assign_driver(
        &self,
        id: EmergencyRequestId,
        driver_id: DriverId,
    ) -> Result<(EmergencyRequest, Driver), AppError> {
        let mut tx = self.pool.begin().await?;

        let current = repo::get(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("emergency request"))?;
        current.status.ensure_can_move_to(EmergencyStatus::InProgress)?;

        let driver = claim_driver(&mut tx, driver_id, None).await?;
        let request = repo::start_with_driver(&mut tx, id, driver_id)
            .await?
            .ok_or_else(|| {
                DomainError::transition(
                    "emergency request",
                    current.status,
                    EmergencyStatus::InProgress,
                )
            })?;

        tx.commit().await?;
        info!(driver_code = %driver.driver_code, "driver dispatched to emergency");
        Ok((request, driver))
    }

    /// Mark a pending bonus as paid.
    ///
    /// # Errors
    ///
    /// Returns `404` for an unknown bonus, or `400` if it is already paid.
    #[instrument(skip(self), fields(bonus_id = %id))]
    pub async fn mark_bonus_paid(&self, id: DriverBonusId) -> Result<DriverBonus, AppError> {
        let repo = BonusRepository::new(self.pool);
        if let Some(bonus) = repo.mark_paid(id).await? {
            info!(driver_id = %bonus.driver_id, amount = %bonus.bonus_amount, "bonus paid");
            return Ok(bonus);
        }
        if repo.exists(id).await? {
            Err(AppError::BadRequest("bonus is already paid".to_owned()))
        } else {
            Err(AppError::not_found("bonus"))
        }
    }
}

/// Book the completion bonus, if one is due.
///
/// Returns the request with its updated bonus status and the outcome.
async fn book_bonus(
    conn: &mut PgConnection,
    request: EmergencyRequest,
) -> Result<(EmergencyRequest, BonusOutcome), AppError> {
    let driver_id = match request.assigned_driver {
        Some(driver_id) if bonus_due(true, request.bonus_eligible) => driver_id,
        Some(_) => return Ok((request, BonusOutcome::skipped("request is not bonus eligible"))),
        None => return Ok((request, BonusOutcome::skipped("no driver assigned"))),
    };

    let mut savepoint = conn.begin().await?;
    let attempt = try_book_bonus(&mut savepoint, &request, driver_id).await;

    let (state, outcome) = match attempt {
        Ok(Some(bonus)) => {
            savepoint.commit().await?;
            info!(bonus_id = %bonus.id, amount = %bonus.bonus_amount, "driver bonus created");
            (BonusState::Created, BonusOutcome::created(bonus))
        }
        Ok(None) => {
            savepoint.commit().await?;
            (BonusState::Created, BonusOutcome::skipped("bonus already created"))
        }
        Err(e) => {
            savepoint.rollback().await?;
            error!(error = %e, request_id = %request.id, "driver bonus creation failed");
            (BonusState::Failed, BonusOutcome::skipped(e.to_string()))
        }
    };

    let request = repo::set_bonus_status(conn, request.id, state).await?;
    Ok((request, outcome))
}

async fn try_book_bonus(
    conn: &mut PgConnection,
    request: &EmergencyRequest,
    driver_id: DriverId,
) -> Result<Option<DriverBonus>, AppError> {
    if !side_effects::claim(conn, &SideEffectKey::driver_bonus(request.id)).await? {
        return Ok(None);
    }

    let now = Utc::now();
    let month = i32::try_from(now.month())
        .map_err(|_| AppError::Internal("month out of range".to_owned()))?;
    let period = PayPeriod::new(month, now.year())?;

    Ok(bonuses::insert_once(conn, driver_id, request.id, request.bonus_amount, period).await?)
}
