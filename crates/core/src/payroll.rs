//! Driver payroll arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, FieldError};

/// A calendar month used to bucket bonuses and payroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayPeriod {
    /// Month, 1-12.
    pub month: i32,
    /// Four-digit year.
    pub year: i32,
}

impl PayPeriod {
    /// Validate and build a pay period.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the month or year is out of range.
    pub fn new(month: i32, year: i32) -> Result<Self, DomainError> {
        let mut errors = Vec::new();
        if !(1..=12).contains(&month) {
            errors.push(FieldError::new("month", "month must be between 1 and 12"));
        }
        if !(2000..=9999).contains(&year) {
            errors.push(FieldError::new("year", "year must be a four-digit year"));
        }
        if errors.is_empty() {
            Ok(Self { month, year })
        } else {
            Err(DomainError::Validation(errors))
        }
    }
}

/// Monthly payroll line for one driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollSummary {
    /// Period covered.
    #[serde(flatten)]
    pub period: PayPeriod,
    /// Fixed monthly salary.
    pub base_salary: Decimal,
    /// Sum of emergency bonuses booked in the period.
    pub bonus_total: Decimal,
    /// Number of bonuses booked in the period.
    pub bonus_count: usize,
    /// Lifetime completed deliveries (informational).
    pub total_deliveries: i32,
    /// `base_salary + bonus_total`.
    pub gross_pay: Decimal,
}

impl PayrollSummary {
    /// Compute a driver's payroll from base salary and the period's bonuses.
    #[must_use]
    pub fn compute(
        period: PayPeriod,
        base_salary: Decimal,
        bonuses: &[Decimal],
        total_deliveries: i32,
    ) -> Self {
        let bonus_total: Decimal = bonuses.iter().copied().sum();
        Self {
            period,
            base_salary,
            bonus_total,
            bonus_count: bonuses.len(),
            total_deliveries,
            gross_pay: base_salary + bonus_total,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_adds_bonuses() {
        let period = PayPeriod::new(3, 2026).unwrap();
        let summary = PayrollSummary::compute(
            period,
            Decimal::new(45_000, 0),
            &[Decimal::new(5000, 0), Decimal::new(2500, 0)],
            12,
        );
        assert_eq!(summary.bonus_total, Decimal::new(7500, 0));
        assert_eq!(summary.bonus_count, 2);
        assert_eq!(summary.gross_pay, Decimal::new(52_500, 0));
    }

    #[test]
    fn test_compute_without_bonuses() {
        let period = PayPeriod::new(1, 2026).unwrap();
        let summary = PayrollSummary::compute(period, Decimal::new(40_000, 0), &[], 0);
        assert_eq!(summary.bonus_total, Decimal::ZERO);
        assert_eq!(summary.gross_pay, Decimal::new(40_000, 0));
    }

    #[test]
    fn test_period_validation() {
        assert!(PayPeriod::new(0, 2026).is_err());
        assert!(PayPeriod::new(13, 2026).is_err());
        assert!(PayPeriod::new(12, 99).is_err());
    }

    #[test]
    fn test_summary_json_shape() {
        let period = PayPeriod::new(5, 2026).unwrap();
        let summary = PayrollSummary::compute(period, Decimal::new(100, 0), &[], 1);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["month"], 5);
        assert_eq!(json["year"], 2026);
        assert_eq!(json["grossPay"], "100");
    }
}
