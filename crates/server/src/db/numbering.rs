//! Daily document numbers such as `ORD-20260115-0007`.
//!
//! The next number is one past the highest suffix issued today for the
//! prefix, so deleting a document never causes a number to be reused.
//! Allocation takes a transaction-scoped advisory lock keyed on the prefix;
//! callers must hold an open transaction until the document is inserted.

use chrono::{NaiveDate, Utc};
use sqlx::PgConnection;

use aquacycle_core::order::{BRANCH_ORDER_PREFIX, ORDER_PREFIX, document_number};

use super::RepositoryError;

/// A numbered document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequence {
    Order,
    BranchOrder,
    FactoryRequest,
    Recycling,
    Collection,
    Emergency,
}

impl Sequence {
    /// Number prefix.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Order => ORDER_PREFIX,
            Self::BranchOrder => BRANCH_ORDER_PREFIX,
            Self::FactoryRequest => "FRQ",
            Self::Recycling => "RCY",
            Self::Collection => "COL",
            Self::Emergency => "EMG",
        }
    }

    const fn max_suffix_sql(self) -> &'static str {
        match self {
            Self::Order => {
                "SELECT MAX(CAST(split_part(order_number, '-', 3) AS INTEGER)) FROM orders WHERE order_number LIKE $1"
            }
            Self::BranchOrder => {
                "SELECT MAX(CAST(split_part(order_number, '-', 3) AS INTEGER)) FROM branch_orders WHERE order_number LIKE $1"
            }
            Self::FactoryRequest => {
                "SELECT MAX(CAST(split_part(request_code, '-', 3) AS INTEGER)) FROM factory_requests WHERE request_code LIKE $1"
            }
            Self::Recycling => {
                "SELECT MAX(CAST(split_part(request_code, '-', 3) AS INTEGER)) FROM recycling_requests WHERE request_code LIKE $1"
            }
            Self::Collection => {
                "SELECT MAX(CAST(split_part(request_code, '-', 3) AS INTEGER)) FROM collection_requests WHERE request_code LIKE $1"
            }
            Self::Emergency => {
                "SELECT MAX(CAST(split_part(request_code, '-', 3) AS INTEGER)) FROM emergency_requests WHERE request_code LIKE $1"
            }
        }
    }
}

/// `LIKE` pattern matching every number issued on `date`.
fn day_pattern(sequence: Sequence, date: NaiveDate) -> String {
    format!("{}-{}-%", sequence.prefix(), date.format("%Y%m%d"))
}

/// Allocate the next number for `sequence` today (UTC).
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the lock or lookup fails.
pub async fn next_number(
    conn: &mut PgConnection,
    sequence: Sequence,
) -> Result<String, RepositoryError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(sequence.prefix())
        .execute(&mut *conn)
        .await?;

    let today = Utc::now().date_naive();
    let highest: Option<i32> = sqlx::query_scalar(sequence.max_suffix_sql())
        .bind(day_pattern(sequence, today))
        .fetch_one(&mut *conn)
        .await?;

    Ok(document_number(
        sequence.prefix(),
        today,
        i64::from(highest.unwrap_or(0)) + 1,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_day_pattern() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(day_pattern(Sequence::Order, date), "ORD-20260309-%");
        assert_eq!(day_pattern(Sequence::Emergency, date), "EMG-20260309-%");
    }

    #[test]
    fn test_prefixes_are_distinct() {
        let all = [
            Sequence::Order,
            Sequence::BranchOrder,
            Sequence::FactoryRequest,
            Sequence::Recycling,
            Sequence::Collection,
            Sequence::Emergency,
        ];
        let mut prefixes: Vec<&str> = all.iter().map(|s| s.prefix()).collect();
        prefixes.sort_unstable();
        prefixes.dedup();
        assert_eq!(prefixes.len(), all.len());
    }
}
