//! Per-item results of batch inventory operations.

use serde::{Deserialize, Serialize};

use aquacycle_core::OrderStatus;

/// Which side of the pipeline a delivery is processed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryType {
    /// Factory ships an order: factory stock goes down.
    Factory,
    /// Branch receives an order: branch stock goes up.
    Branch,
}

/// What happened to one line of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Applied,
    Skipped,
    Failed,
}

/// Quantity of one ledger row before and after a conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct StockMove {
    pub before: i32,
    pub after: i32,
}

/// Result for one line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineOutcome {
    pub item_name: String,
    pub quantity: i32,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<i32>,
}

impl LineOutcome {
    /// The line was applied and moved `stock`.
    #[must_use]
    pub fn applied(item_name: impl Into<String>, quantity: i32, stock: StockMove) -> Self {
        Self {
            item_name: item_name.into(),
            quantity,
            outcome: Outcome::Applied,
            reason: None,
            before: Some(stock.before),
            after: Some(stock.after),
        }
    }

    /// The line was left out on purpose.
    #[must_use]
    pub fn skipped(item_name: impl Into<String>, quantity: i32, reason: impl Into<String>) -> Self {
        Self {
            item_name: item_name.into(),
            quantity,
            outcome: Outcome::Skipped,
            reason: Some(reason.into()),
            before: None,
            after: None,
        }
    }

    /// The line could not be applied.
    #[must_use]
    pub fn failed(item_name: impl Into<String>, quantity: i32, reason: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failed,
            ..Self::skipped(item_name, quantity, reason)
        }
    }
}

/// Result of a delivery step.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    /// Factory order id or branch order id, depending on `delivery_type`.
    pub order_id: i32,
    pub delivery_type: DeliveryType,
    pub status: OrderStatus,
    pub items: Vec<LineOutcome>,
}

impl DeliveryReport {
    /// Number of lines that were applied.
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.items
            .iter()
            .filter(|line| line.outcome == Outcome::Applied)
            .count()
    }

    /// Whether any line was skipped or failed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.applied_count() < self.items.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_line_outcome_json_omits_empty_fields() {
        let line = LineOutcome::applied("RO Membranes", 10, StockMove { before: 50, after: 40 });
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["itemName"], "RO Membranes");
        assert_eq!(json["outcome"], "applied");
        assert_eq!(json["before"], 50);
        assert!(json.get("reason").is_none());

        let skipped = LineOutcome::skipped("UV Lamps", 3, "not in factory inventory");
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert!(json.get("before").is_none());
    }

    #[test]
    fn test_report_partial() {
        let report = DeliveryReport {
            order_id: 7,
            delivery_type: DeliveryType::Branch,
            status: OrderStatus::Delivered,
            items: vec![
                LineOutcome::applied("Housings", 2, StockMove { before: 0, after: 2 }),
                LineOutcome::failed("Pressure Tanks", 1, "insufficient factory stock"),
            ],
        };
        assert_eq!(report.applied_count(), 1);
        assert!(report.is_partial());
    }

    #[test]
    fn test_delivery_type_parses_lowercase() {
        let kind: DeliveryType = serde_json::from_str("\"factory\"").unwrap();
        assert_eq!(kind, DeliveryType::Factory);
        assert!(serde_json::from_str::<DeliveryType>("\"Warehouse\"").is_err());
    }
}
