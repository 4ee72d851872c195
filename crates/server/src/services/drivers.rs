//! Driver records, availability and payroll.

use rand::Rng;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use aquacycle_core::{
    DomainError, DriverId, DriverStatus, FieldError,
    payroll::{PayPeriod, PayrollSummary},
};

use crate::db::drivers::DriverFields;
use crate::db::{BonusRepository, DriverRepository, RepositoryError};
use crate::error::AppError;
use crate::models::Driver;

const CODE_PREFIX: &str = "DRV-";
const CODE_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_CODE_ATTEMPTS: usize = 5;

/// Generate a driver code such as `DRV-7KQ2ZD`.
#[must_use]
pub fn generate_driver_code() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            char::from(CODE_ALPHABET.get(idx).copied().unwrap_or(b'X'))
        })
        .collect();
    format!("{CODE_PREFIX}{suffix}")
}

fn validate_fields(fields: &DriverFields) -> Result<(), DomainError> {
    let mut errors = Vec::new();
    if fields.name.trim().is_empty() {
        errors.push(FieldError::new("name", "name is required"));
    }
    if fields.phone.trim().is_empty() {
        errors.push(FieldError::new("phone", "phone is required"));
    }
    if fields.base_salary < Decimal::ZERO {
        errors.push(FieldError::new("baseSalary", "base salary cannot be negative"));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Validation(errors))
    }
}

/// Driver service.
pub struct DriverService<'a> {
    pool: &'a PgPool,
}

impl<'a> DriverService<'a> {
    /// Create a new driver service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Register a driver under a freshly generated code.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if a field is invalid.
    #[instrument(skip(self, fields), fields(name = %fields.name))]
    pub async fn create(&self, fields: &DriverFields) -> Result<Driver, AppError> {
        validate_fields(fields)?;

        let repo = DriverRepository::new(self.pool);
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_driver_code();
            match repo.create(&code, fields).await {
                Ok(driver) => {
                    info!(driver_id = %driver.id, driver_code = %driver.driver_code, "driver created");
                    return Ok(driver);
                }
                Err(RepositoryError::Conflict(_)) => {
                    warn!(driver_code = %code, "driver code collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::Internal("could not allocate a driver code".to_owned()))
    }

    /// Replace a driver's editable details.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if a field is invalid, or `404`.
    pub async fn update(&self, id: DriverId, fields: &DriverFields) -> Result<Driver, AppError> {
        validate_fields(fields)?;
        DriverRepository::new(self.pool)
            .update(id, fields)
            .await?
            .ok_or_else(|| AppError::not_found("driver"))
    }

    /// Set a driver's availability.
    ///
    /// A driver still carrying orders cannot go off duty.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the driver has assigned orders, or `404`.
    #[instrument(skip(self), fields(driver_id = %id, status = %status))]
    pub async fn set_status(&self, id: DriverId, status: DriverStatus) -> Result<Driver, AppError> {
        let repo = DriverRepository::new(self.pool);
        if let Some(driver) = repo.set_status(id, status).await? {
            return Ok(driver);
        }
        match repo.get(id).await? {
            Some(driver) => Err(DomainError::transition("driver", driver.status, status).into()),
            None => Err(AppError::not_found("driver")),
        }
    }

    /// Delete a driver that is not out on a delivery.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the driver is on delivery, or `404`.
    #[instrument(skip(self), fields(driver_id = %id))]
    pub async fn delete(&self, id: DriverId) -> Result<(), AppError> {
        let repo = DriverRepository::new(self.pool);
        if repo.delete_idle(id).await? {
            return Ok(());
        }
        match repo.get(id).await? {
            Some(driver) => Err(DomainError::transition("driver", driver.status, "Deleted").into()),
            None => Err(AppError::not_found("driver")),
        }
    }

    /// Monthly payroll: base salary plus the period's emergency bonuses.
    ///
    /// # Errors
    ///
    /// Returns `404` if the driver does not exist.
    #[instrument(skip(self), fields(driver_id = %id, month = period.month, year = period.year))]
    pub async fn payroll(&self, id: DriverId, period: PayPeriod) -> Result<PayrollSummary, AppError> {
        let driver = DriverRepository::new(self.pool)
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("driver"))?;
        let bonuses = BonusRepository::new(self.pool).amounts_for(id, period).await?;

        Ok(PayrollSummary::compute(
            period,
            driver.base_salary,
            &bonuses,
            driver.total_deliveries,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_code_shape() {
        let code = generate_driver_code();
        assert!(code.starts_with("DRV-"));
        let suffix = code.trim_start_matches("DRV-");
        assert_eq!(suffix.len(), CODE_LEN);
        assert!(suffix.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_validate_fields_collects_errors() {
        let fields = DriverFields {
            name: " ".to_owned(),
            phone: String::new(),
            license_number: None,
            branch_id: None,
            base_salary: Decimal::new(-1, 0),
        };
        let Err(DomainError::Validation(errors)) = validate_fields(&fields) else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 3);
    }
}
