//! Line items, stock status derivation and reservation planning.
//!
//! The server applies these rules inside SQL (`CASE` expressions and
//! conditional decrements); the functions here are the reference versions and
//! the place where whole-order checks happen before anything is written.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, FieldError};
use crate::types::StockStatus;

/// Default unit for branch rows that have no factory catalog entry.
pub const DEFAULT_UNIT: &str = "units";
/// Default minimum stock level for lazily created branch rows.
pub const DEFAULT_MIN_STOCK_LEVEL: i32 = 10;
/// Default maximum stock level for lazily created branch rows.
pub const DEFAULT_MAX_STOCK_LEVEL: i32 = 100;

/// One line of an order or stock request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Catalog item name (unique per ledger).
    pub item_name: String,
    /// Requested units.
    pub quantity: i32,
}

impl LineItem {
    /// Create a line item.
    #[must_use]
    pub fn new(item_name: impl Into<String>, quantity: i32) -> Self {
        Self {
            item_name: item_name.into(),
            quantity,
        }
    }
}

/// A line that cannot be covered by the stock on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortage {
    /// Catalog item name.
    pub item_name: String,
    /// Units on hand (0 when the item does not exist).
    pub available: i32,
    /// Units requested.
    pub required: i32,
}

/// Derive the stock status of an inventory row.
///
/// `quantity <= 0` is out of stock, `quantity <= min_stock_level` is low,
/// anything above is in stock.
#[must_use]
pub const fn stock_status(quantity: i32, min_stock_level: i32) -> StockStatus {
    if quantity <= 0 {
        StockStatus::OutOfStock
    } else if quantity <= min_stock_level {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}

/// Sum of all line quantities, saturating at `i32::MAX`.
///
/// Validated items never saturate; see [`validate_line_items`].
#[must_use]
pub fn total_quantity(items: &[LineItem]) -> i32 {
    items
        .iter()
        .fold(0_i32, |acc, item| acc.saturating_add(item.quantity))
}

/// Validate the line items of an order or request.
///
/// # Errors
///
/// Returns `DomainError::Validation` listing every offending field, including
/// a total that does not fit the quantity column.
pub fn validate_line_items(items: &[LineItem]) -> Result<(), DomainError> {
    if items.is_empty() {
        return Err(DomainError::field("items", "at least one item is required"));
    }

    let mut errors: Vec<FieldError> = items
        .iter()
        .enumerate()
        .flat_map(|(idx, item)| {
            let mut errs = Vec::new();
            if item.item_name.trim().is_empty() {
                errs.push(FieldError::new(
                    format!("items[{idx}].itemName"),
                    "item name is required",
                ));
            }
            if item.quantity <= 0 {
                errs.push(FieldError::new(
                    format!("items[{idx}].quantity"),
                    "quantity must be greater than 0",
                ));
            }
            errs
        })
        .collect();

    let total: i64 = items.iter().map(|item| i64::from(item.quantity)).sum();
    if total > i64::from(i32::MAX) {
        errors.push(FieldError::new(
            "items",
            format!("total quantity cannot exceed {}", i32::MAX),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Validation(errors))
    }
}

/// Validate stock thresholds for a new or updated inventory row.
///
/// # Errors
///
/// Returns `DomainError::Validation` if any value is negative or the maximum
/// is below the minimum.
pub fn validate_levels(
    quantity: i32,
    min_stock_level: i32,
    max_stock_level: i32,
) -> Result<(), DomainError> {
    let mut errors = Vec::new();
    if quantity < 0 {
        errors.push(FieldError::new("quantity", "quantity cannot be negative"));
    }
    if min_stock_level < 0 {
        errors.push(FieldError::new("minStockLevel", "minimum cannot be negative"));
    }
    if max_stock_level < min_stock_level {
        errors.push(FieldError::new(
            "maxStockLevel",
            "maximum must be greater than or equal to minimum",
        ));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Validation(errors))
    }
}

/// Merge lines that name the same item, keeping first-seen order.
#[must_use]
pub fn consolidate(items: &[LineItem]) -> Vec<LineItem> {
    let mut merged: Vec<LineItem> = Vec::with_capacity(items.len());
    for item in items {
        match merged.iter_mut().find(|m| m.item_name == item.item_name) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => merged.push(item.clone()),
        }
    }
    merged
}

/// Check that every line can be covered by `available` stock.
///
/// Duplicate lines are merged first so two lines of 30 against 50 on hand
/// are correctly reported short. All shortages are collected so the caller
/// gets one complete report.
///
/// # Errors
///
/// Returns `DomainError::InsufficientStock` listing every short item.
pub fn plan_reservation(
    items: &[LineItem],
    available: &HashMap<String, i32>,
) -> Result<Vec<LineItem>, DomainError> {
    let lines = consolidate(items);
    let shortages: Vec<Shortage> = lines
        .iter()
        .filter_map(|line| {
            let on_hand = available.get(&line.item_name).copied().unwrap_or(0);
            (on_hand < line.quantity).then(|| Shortage {
                item_name: line.item_name.clone(),
                available: on_hand,
                required: line.quantity,
            })
        })
        .collect();

    if shortages.is_empty() {
        Ok(lines)
    } else {
        Err(DomainError::InsufficientStock(shortages))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stock(pairs: &[(&str, i32)]) -> HashMap<String, i32> {
        pairs.iter().map(|(n, q)| ((*n).to_owned(), *q)).collect()
    }

    #[test]
    fn test_stock_status_thresholds() {
        assert_eq!(stock_status(0, 10), StockStatus::OutOfStock);
        assert_eq!(stock_status(-3, 10), StockStatus::OutOfStock);
        assert_eq!(stock_status(1, 10), StockStatus::LowStock);
        assert_eq!(stock_status(10, 10), StockStatus::LowStock);
        assert_eq!(stock_status(11, 10), StockStatus::InStock);
        // A zero minimum means anything positive is in stock
        assert_eq!(stock_status(1, 0), StockStatus::InStock);
    }

    #[test]
    fn test_total_quantity() {
        let items = vec![LineItem::new("RO Membranes", 10), LineItem::new("Carbon Filters", 5)];
        assert_eq!(total_quantity(&items), 15);
        assert_eq!(total_quantity(&[]), 0);
    }

    #[test]
    fn test_validate_line_items_reports_every_field() {
        let items = vec![LineItem::new(" ", 0), LineItem::new("UV Lamps", -1)];
        let DomainError::Validation(errors) = validate_line_items(&items).unwrap_err() else {
            panic!("expected validation error");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["items[0].itemName", "items[0].quantity", "items[1].quantity"]
        );
    }

    #[test]
    fn test_validate_line_items_requires_items() {
        assert!(validate_line_items(&[]).is_err());
        assert!(validate_line_items(&[LineItem::new("Housings", 1)]).is_ok());
    }

    #[test]
    fn test_validate_line_items_rejects_overflowing_total() {
        let items = vec![
            LineItem::new("RO Membranes", i32::MAX),
            LineItem::new("RO Membranes", 1_073_741_826),
            LineItem::new("UV Lamps", 1_073_741_824),
        ];
        let DomainError::Validation(errors) = validate_line_items(&items).unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "items");

        assert!(validate_line_items(&[LineItem::new("RO Membranes", i32::MAX)]).is_ok());
    }

    #[test]
    fn test_quantity_sums_saturate_instead_of_wrapping() {
        let items = vec![
            LineItem::new("RO Membranes", i32::MAX),
            LineItem::new("RO Membranes", 1_073_741_826),
        ];
        assert_eq!(total_quantity(&items), i32::MAX);
        assert_eq!(consolidate(&items), vec![LineItem::new("RO Membranes", i32::MAX)]);

        // A saturated line can never be covered, so it is reported short
        let available = stock(&[("RO Membranes", 50)]);
        assert!(matches!(
            plan_reservation(&items, &available),
            Err(DomainError::InsufficientStock(_))
        ));
    }

    #[test]
    fn test_validate_levels() {
        assert!(validate_levels(0, 0, 0).is_ok());
        assert!(validate_levels(5, 10, 100).is_ok());
        let DomainError::Validation(errors) = validate_levels(-1, 20, 10).unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_plan_reservation_covers_all_lines() {
        let available = stock(&[("RO Membranes", 50)]);
        let plan = plan_reservation(&[LineItem::new("RO Membranes", 10)], &available).unwrap();
        assert_eq!(plan, vec![LineItem::new("RO Membranes", 10)]);
    }

    #[test]
    fn test_plan_reservation_reports_every_shortage() {
        let available = stock(&[("RO Membranes", 50), ("UV Lamps", 2)]);
        let items = vec![
            LineItem::new("RO Membranes", 10),
            LineItem::new("UV Lamps", 3),
            LineItem::new("Pressure Tanks", 1),
        ];
        let DomainError::InsufficientStock(shortages) =
            plan_reservation(&items, &available).unwrap_err()
        else {
            panic!("expected shortage");
        };
        assert_eq!(
            shortages,
            vec![
                Shortage {
                    item_name: "UV Lamps".into(),
                    available: 2,
                    required: 3
                },
                Shortage {
                    item_name: "Pressure Tanks".into(),
                    available: 0,
                    required: 1
                },
            ]
        );
    }

    #[test]
    fn test_plan_reservation_merges_duplicate_lines() {
        let available = stock(&[("Sediment Filters", 50)]);
        let items = vec![
            LineItem::new("Sediment Filters", 30),
            LineItem::new("Sediment Filters", 30),
        ];
        let err = plan_reservation(&items, &available).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientStock(ref s) if s.len() == 1 && s[0].required == 60
        ));
    }

    #[test]
    fn test_line_item_json_shape() {
        let item: LineItem =
            serde_json::from_str(r#"{"itemName":"RO Membranes","quantity":10}"#).unwrap();
        assert_eq!(item, LineItem::new("RO Membranes", 10));
    }
}
