//! Emergency request transitions.

use rust_decimal::Decimal;

use crate::error::DomainError;
use crate::types::EmergencyStatus;

/// Bonus paid for a completed emergency delivery when none is specified.
pub const DEFAULT_BONUS_AMOUNT: Decimal = Decimal::from_parts(5000, 0, 0, false, 0);

impl EmergencyStatus {
    /// Stored statuses from which `self` may be reached.
    #[must_use]
    pub const fn predecessors(self) -> &'static [Self] {
        match self {
            Self::Pending => &[],
            Self::Approved | Self::Rejected => &[Self::Pending],
            Self::SentToBranchManager => &[Self::Approved],
            Self::InProgress => &[Self::Approved, Self::SentToBranchManager],
            Self::Completed => &[Self::InProgress],
        }
    }

    /// Whether the request has left the dispatch workflow.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    /// Check that `self` may move to `next`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` otherwise.
    pub fn ensure_can_move_to(self, next: Self) -> Result<(), DomainError> {
        if next.predecessors().contains(&self) {
            Ok(())
        } else {
            Err(DomainError::transition("emergency request", self, next))
        }
    }
}

/// Labels for binding predecessor statuses to a `text[]` parameter.
#[must_use]
pub fn labels(statuses: &[EmergencyStatus]) -> Vec<&'static str> {
    statuses.iter().map(EmergencyStatus::as_str).collect()
}

/// Whether completing a request should create a driver bonus.
#[must_use]
pub const fn bonus_due(has_driver: bool, bonus_eligible: bool) -> bool {
    has_driver && bonus_eligible
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_happy_path() {
        let path = [
            EmergencyStatus::Pending,
            EmergencyStatus::Approved,
            EmergencyStatus::SentToBranchManager,
            EmergencyStatus::InProgress,
            EmergencyStatus::Completed,
        ];
        for pair in path.windows(2) {
            if let [from, to] = pair {
                assert!(from.ensure_can_move_to(*to).is_ok(), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_approved_can_skip_branch_manager() {
        assert!(EmergencyStatus::Approved
            .ensure_can_move_to(EmergencyStatus::InProgress)
            .is_ok());
    }

    #[test]
    fn test_terminal_states_cannot_move() {
        for next in EmergencyStatus::ALL {
            assert!(EmergencyStatus::Completed.ensure_can_move_to(*next).is_err());
            assert!(EmergencyStatus::Rejected.ensure_can_move_to(*next).is_err());
        }
    }

    #[test]
    fn test_cannot_complete_without_progress() {
        let err = EmergencyStatus::Approved
            .ensure_can_move_to(EmergencyStatus::Completed)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { ref current, .. } if current == "Approved"));
    }

    #[test]
    fn test_bonus_due() {
        assert!(bonus_due(true, true));
        assert!(!bonus_due(false, true));
        assert!(!bonus_due(true, false));
    }

    #[test]
    fn test_default_bonus_amount() {
        assert_eq!(DEFAULT_BONUS_AMOUNT, Decimal::new(5000, 0));
    }
}
