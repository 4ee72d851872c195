//! Recycling bin fill math.
//!
//! A bin's `fill_percentage` and `status` are always derived from
//! `current_level` and `capacity`; [`BinFill`] is the only way the server
//! computes them.

use serde::Serialize;

use crate::error::DomainError;
use crate::types::BinStatus;

/// Fill percentage at which the factory is notified.
pub const NOTIFY_THRESHOLD: f64 = 80.0;

/// Band a fill percentage: Critical ≥80, High ≥60, Medium ≥40, Low ≥20.
#[must_use]
pub fn bin_status(fill_percentage: f64) -> BinStatus {
    if fill_percentage >= 80.0 {
        BinStatus::Critical
    } else if fill_percentage >= 60.0 {
        BinStatus::High
    } else if fill_percentage >= 40.0 {
        BinStatus::Medium
    } else if fill_percentage >= 20.0 {
        BinStatus::Low
    } else {
        BinStatus::Empty
    }
}

/// `level / capacity * 100`, rounded to two decimals.
#[must_use]
pub fn fill_percentage(current_level: f64, capacity: f64) -> f64 {
    if capacity <= 0.0 {
        return 0.0;
    }
    (current_level / capacity * 10_000.0).round() / 100.0
}

/// Derived fill state of a recycling bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinFill {
    /// Maximum weight the bin holds.
    pub capacity: f64,
    /// Current weight, always within `0..=capacity`.
    pub current_level: f64,
    /// Derived percentage.
    pub fill_percentage: f64,
    /// Derived band.
    pub status: BinStatus,
    /// Whether the factory has been flagged for this fill cycle.
    pub is_notified: bool,
}

impl BinFill {
    /// Build the fill state for a bin, clamping the level into range.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `capacity` is not positive.
    pub fn new(capacity: f64, current_level: f64, is_notified: bool) -> Result<Self, DomainError> {
        if !(capacity.is_finite() && capacity > 0.0) {
            return Err(DomainError::field("capacity", "capacity must be greater than 0"));
        }
        Ok(Self::derive(capacity, current_level, is_notified))
    }

    fn derive(capacity: f64, current_level: f64, is_notified: bool) -> Self {
        let current_level = current_level.clamp(0.0, capacity);
        let fill_percentage = fill_percentage(current_level, capacity);
        Self {
            capacity,
            current_level,
            fill_percentage,
            status: bin_status(fill_percentage),
            is_notified,
        }
    }

    /// Add `weight`, capped at capacity.
    ///
    /// Crossing the notification threshold sets `is_notified` once; it stays
    /// set until the bin is emptied.
    #[must_use]
    pub fn deposit(&self, weight: f64) -> Self {
        let mut next = Self::derive(self.capacity, self.current_level + weight, self.is_notified);
        if next.fill_percentage >= NOTIFY_THRESHOLD {
            next.is_notified = true;
        }
        next
    }

    /// Remove `weight`, clamped at zero.
    #[must_use]
    pub fn withdraw(&self, weight: f64) -> Self {
        Self::derive(self.capacity, self.current_level - weight, self.is_notified)
    }

    /// Empty the bin after a collection.
    #[must_use]
    pub fn emptied(&self) -> Self {
        Self::derive(self.capacity, 0.0, false)
    }

    /// Resize the bin, keeping the level within the new capacity.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `capacity` is not positive.
    pub fn resized(&self, capacity: f64) -> Result<Self, DomainError> {
        Self::new(capacity, self.current_level, self.is_notified)
    }

    /// Whether a deposit just raised the factory flag.
    #[must_use]
    pub const fn newly_notified(before: &Self, after: &Self) -> bool {
        !before.is_notified && after.is_notified
    }
}

/// Validate a waste weight submitted with a recycling request.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the weight is not a positive number.
pub fn validate_weight(weight: f64) -> Result<(), DomainError> {
    if weight.is_finite() && weight > 0.0 {
        Ok(())
    } else {
        Err(DomainError::field("wasteWeight", "waste weight must be greater than 0"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_banding() {
        assert_eq!(bin_status(0.0), BinStatus::Empty);
        assert_eq!(bin_status(19.99), BinStatus::Empty);
        assert_eq!(bin_status(20.0), BinStatus::Low);
        assert_eq!(bin_status(40.0), BinStatus::Medium);
        assert_eq!(bin_status(59.9), BinStatus::Medium);
        assert_eq!(bin_status(60.0), BinStatus::High);
        assert_eq!(bin_status(80.0), BinStatus::Critical);
        assert_eq!(bin_status(100.0), BinStatus::Critical);
    }

    #[test]
    fn test_fill_percentage_rounding() {
        assert!((fill_percentage(1.0, 3.0) - 33.33).abs() < f64::EPSILON);
        assert!((fill_percentage(70.0, 100.0) - 70.0).abs() < f64::EPSILON);
        assert!((fill_percentage(5.0, 0.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_deposit_clamps_and_notifies() {
        // capacity 100, level 70, deposit 40
        let bin = BinFill::new(100.0, 70.0, false).unwrap();
        assert_eq!(bin.status, BinStatus::High);

        let after = bin.deposit(40.0);
        assert!((after.current_level - 100.0).abs() < f64::EPSILON);
        assert!((after.fill_percentage - 100.0).abs() < f64::EPSILON);
        assert_eq!(after.status, BinStatus::Critical);
        assert!(after.is_notified);
        assert!(BinFill::newly_notified(&bin, &after));
    }

    #[test]
    fn test_notification_is_one_shot() {
        let bin = BinFill::new(100.0, 85.0, true).unwrap();
        let after = bin.deposit(5.0);
        assert!(after.is_notified);
        assert!(!BinFill::newly_notified(&bin, &after));
    }

    #[test]
    fn test_deposit_below_threshold_does_not_notify() {
        let bin = BinFill::new(200.0, 0.0, false).unwrap();
        let after = bin.deposit(50.0);
        assert!((after.fill_percentage - 25.0).abs() < f64::EPSILON);
        assert_eq!(after.status, BinStatus::Low);
        assert!(!after.is_notified);
    }

    #[test]
    fn test_withdraw_clamps_at_zero() {
        let bin = BinFill::new(100.0, 10.0, false).unwrap();
        let after = bin.withdraw(25.0);
        assert!(after.current_level.abs() < f64::EPSILON);
        assert_eq!(after.status, BinStatus::Empty);
    }

    #[test]
    fn test_emptied_resets_flag() {
        let bin = BinFill::new(100.0, 95.0, true).unwrap();
        let after = bin.emptied();
        assert!(after.current_level.abs() < f64::EPSILON);
        assert!(after.fill_percentage.abs() < f64::EPSILON);
        assert_eq!(after.status, BinStatus::Empty);
        assert!(!after.is_notified);
    }

    #[test]
    fn test_resize_clamps_level() {
        let bin = BinFill::new(100.0, 90.0, false).unwrap();
        let after = bin.resized(50.0).unwrap();
        assert!((after.current_level - 50.0).abs() < f64::EPSILON);
        assert!(bin.resized(0.0).is_err());
    }

    #[test]
    fn test_invalid_capacity_and_weight() {
        assert!(BinFill::new(0.0, 0.0, false).is_err());
        assert!(BinFill::new(f64::NAN, 0.0, false).is_err());
        assert!(validate_weight(0.0).is_err());
        assert!(validate_weight(-2.0).is_err());
        assert!(validate_weight(12.5).is_ok());
    }
}
