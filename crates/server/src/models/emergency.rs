//! Emergency dispatch requests and the driver bonuses they pay out.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use aquacycle_core::{
    BonusPaymentStatus, BonusState, BranchId, DriverBonusId, DriverId, EmergencyRequestId,
    EmergencyStatus, UserId, stock::LineItem,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyRequest {
    pub id: EmergencyRequestId,
    pub request_code: String,
    /// Fire brigade account that raised the request.
    pub brigade_id: Option<UserId>,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub nearest_branch_id: Option<BranchId>,
    pub distance_km: Option<f64>,
    pub description: String,
    pub items_needed: Vec<LineItem>,
    pub status: EmergencyStatus,
    pub assigned_driver: Option<DriverId>,
    pub bonus_eligible: bool,
    pub bonus_amount: Decimal,
    pub bonus_status: BonusState,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverBonus {
    pub id: DriverBonusId,
    pub driver_id: DriverId,
    pub emergency_request_id: EmergencyRequestId,
    pub bonus_amount: Decimal,
    pub month: i32,
    pub year: i32,
    pub status: BonusPaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Result of the best-effort bonus step of a completion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusOutcome {
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonus: Option<DriverBonus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BonusOutcome {
    /// A bonus was booked.
    #[must_use]
    pub const fn created(bonus: DriverBonus) -> Self {
        Self {
            created: true,
            bonus: Some(bonus),
            reason: None,
        }
    }

    /// No bonus was booked, with the reason.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            created: false,
            bonus: None,
            reason: Some(reason.into()),
        }
    }
}
