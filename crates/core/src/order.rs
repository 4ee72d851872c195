//! Order status machine and document numbering.
//!
//! Factory orders and branch orders share one status vocabulary. The rules
//! below decide, for a requested status, which stored statuses may precede it
//! and which inventory side effect the write carries. The server turns the
//! predecessor list into a `WHERE status = ANY(..)` compare-and-swap.

use chrono::NaiveDate;

use crate::error::DomainError;
use crate::types::OrderStatus;

/// Statuses an order must be in to be accepted.
pub const ACCEPT_FROM: &[OrderStatus] = &[OrderStatus::Pending];

/// Statuses an order must be in to be shipped.
///
/// `Accepted` is deliberately absent: acceptance already reserved the stock,
/// and shipping from `Pending`/`Processing` is what deducts it. An accepted
/// order therefore cannot be marked shipped through the status endpoint.
pub const SHIP_FROM: &[OrderStatus] = &[OrderStatus::Pending, OrderStatus::Processing];

/// Statuses an order must be in to be marked delivered.
pub const DELIVER_FROM: &[OrderStatus] = &[OrderStatus::Shipped];

/// Statuses a branch order must be in to be received at the branch.
pub const RECEIVE_FROM: &[OrderStatus] = &[OrderStatus::Shipped];

/// Statuses from which an order may be deleted.
pub const DELETABLE: &[OrderStatus] = &[OrderStatus::Pending, OrderStatus::Cancelled];

/// Inventory side effect attached to a status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEffect {
    /// Status is written, nothing else changes.
    None,
    /// Deduct every line from factory stock, all or nothing.
    DeductFactoryStock,
    /// Credit every line to the linked branch's inventory.
    CreditBranchStock,
    /// Move every line from factory to branch stock, skipping lines that
    /// cannot be covered, and release the assigned driver.
    TransferToBranch,
}

/// Precondition and effect for one status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    /// Stored statuses allowed before the write. `None` accepts any status.
    pub expected: Option<&'static [OrderStatus]>,
    /// Side effect to apply in the same transaction.
    pub effect: StatusEffect,
}

impl TransitionRule {
    /// Check a stored status against this rule.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if `current` is not an
    /// allowed predecessor.
    pub fn check(
        &self,
        entity: &'static str,
        current: OrderStatus,
        requested: OrderStatus,
    ) -> Result<(), DomainError> {
        match self.expected {
            Some(allowed) if !allowed.contains(&current) => {
                Err(DomainError::transition(entity, current, requested))
            }
            _ => Ok(()),
        }
    }
}

/// Rule for the factory order status endpoint.
///
/// Only `Shipped` and `Delivered` carry a precondition and a side effect.
/// Every other status is written as requested.
#[must_use]
pub const fn order_status_rule(requested: OrderStatus) -> TransitionRule {
    match requested {
        OrderStatus::Shipped => TransitionRule {
            expected: Some(SHIP_FROM),
            effect: StatusEffect::DeductFactoryStock,
        },
        OrderStatus::Delivered => TransitionRule {
            expected: Some(DELIVER_FROM),
            effect: StatusEffect::CreditBranchStock,
        },
        _ => TransitionRule {
            expected: None,
            effect: StatusEffect::None,
        },
    }
}

/// Rule for the branch order status endpoint.
///
/// A branch order that is already delivered or cancelled cannot be changed
/// again, so the delivery transfer can never run twice.
#[must_use]
pub const fn branch_order_status_rule(requested: OrderStatus) -> TransitionRule {
    const OPEN: &[OrderStatus] = &[
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::Processing,
        OrderStatus::Shipped,
    ];
    let effect = match requested {
        OrderStatus::Delivered => StatusEffect::TransferToBranch,
        _ => StatusEffect::None,
    };
    TransitionRule {
        expected: Some(OPEN),
        effect,
    }
}

impl OrderStatus {
    /// Whether the order has left the workflow.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether reaching this status ends the assigned driver's trip.
    #[must_use]
    pub const fn frees_driver(self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Whether the order is waiting for the factory to ship it.
    #[must_use]
    pub const fn awaits_shipment(self) -> bool {
        matches!(self, Self::Pending | Self::Accepted | Self::Processing)
    }
}

/// Labels for binding a status list to a `text[]` parameter.
#[must_use]
pub fn labels(statuses: &[OrderStatus]) -> Vec<&'static str> {
    statuses.iter().map(OrderStatus::as_str).collect()
}

/// Format a daily-sequenced document number, e.g. `ORD-20260115-0007`.
///
/// `sequence` is the 1-based position of the document among those created
/// on `date`.
#[must_use]
pub fn document_number(prefix: &str, date: NaiveDate, sequence: i64) -> String {
    format!("{prefix}-{}-{sequence:04}", date.format("%Y%m%d"))
}

/// Prefix for factory order numbers.
pub const ORDER_PREFIX: &str = "ORD";
/// Prefix for branch order numbers.
pub const BRANCH_ORDER_PREFIX: &str = "BRO";

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ship_requires_pending_or_processing() {
        let rule = order_status_rule(OrderStatus::Shipped);
        assert_eq!(rule.effect, StatusEffect::DeductFactoryStock);
        assert!(rule.check("order", OrderStatus::Pending, OrderStatus::Shipped).is_ok());
        assert!(rule.check("order", OrderStatus::Processing, OrderStatus::Shipped).is_ok());
    }

    #[test]
    fn test_accepted_order_cannot_ship_through_status_endpoint() {
        let rule = order_status_rule(OrderStatus::Shipped);
        let err = rule
            .check("order", OrderStatus::Accepted, OrderStatus::Shipped)
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                entity: "order",
                current: "Accepted".into(),
                requested: "Shipped".into(),
            }
        );
    }

    #[test]
    fn test_deliver_requires_shipped() {
        let rule = order_status_rule(OrderStatus::Delivered);
        assert_eq!(rule.effect, StatusEffect::CreditBranchStock);
        assert!(rule.check("order", OrderStatus::Shipped, OrderStatus::Delivered).is_ok());
        assert!(rule.check("order", OrderStatus::Pending, OrderStatus::Delivered).is_err());
    }

    #[test]
    fn test_other_statuses_have_no_precondition() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Accepted,
            OrderStatus::Processing,
            OrderStatus::Cancelled,
        ] {
            let rule = order_status_rule(status);
            assert_eq!(rule.expected, None);
            assert_eq!(rule.effect, StatusEffect::None);
            assert!(rule.check("order", OrderStatus::Delivered, status).is_ok());
        }
    }

    #[test]
    fn test_branch_order_terminal_states_are_locked() {
        let rule = branch_order_status_rule(OrderStatus::Delivered);
        assert_eq!(rule.effect, StatusEffect::TransferToBranch);
        assert!(rule.check("branch order", OrderStatus::Shipped, OrderStatus::Delivered).is_ok());
        assert!(rule.check("branch order", OrderStatus::Delivered, OrderStatus::Delivered).is_err());
        assert!(rule.check("branch order", OrderStatus::Cancelled, OrderStatus::Pending).is_err());
    }

    #[test]
    fn test_terminal_and_awaiting() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
        assert!(OrderStatus::Accepted.awaits_shipment());
        assert!(!OrderStatus::Shipped.awaits_shipment());
    }

    #[test]
    fn test_only_delivery_frees_driver() {
        assert!(OrderStatus::Delivered.frees_driver());
        for status in [OrderStatus::Pending, OrderStatus::Shipped, OrderStatus::Cancelled] {
            assert!(!status.frees_driver(), "{status}");
        }
    }

    #[test]
    fn test_document_number() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(document_number(ORDER_PREFIX, date, 7), "ORD-20260115-0007");
        assert_eq!(document_number(BRANCH_ORDER_PREFIX, date, 12345), "BRO-20260115-12345");
    }

    #[test]
    fn test_labels() {
        assert_eq!(labels(SHIP_FROM), vec!["Pending", "Processing"]);
    }
}
