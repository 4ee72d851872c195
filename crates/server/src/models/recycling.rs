//! Recycling bins and the requests that fill and empty them.

use chrono::{DateTime, Utc};
use serde::Serialize;

use aquacycle_core::{
    BinStatus, BranchId, CollectionRequestId, RecyclingBinId, RecyclingRequestId, RequestStatus,
    UserId, recycling::BinFill,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecyclingBin {
    pub id: RecyclingBinId,
    pub branch_id: BranchId,
    pub capacity: f64,
    pub current_level: f64,
    pub fill_percentage: f64,
    pub status: BinStatus,
    /// Set once when the fill crosses 80%, cleared by a collection.
    pub is_notified: bool,
    pub last_emptied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecyclingBin {
    /// Current fill state, as the input to the next mutation.
    #[must_use]
    pub fn fill(&self) -> BinFill {
        BinFill {
            capacity: self.capacity,
            current_level: self.current_level,
            fill_percentage: self.fill_percentage,
            status: self.status,
            is_notified: self.is_notified,
        }
    }
}

/// A customer's drop-off of recyclable filter waste at a branch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecyclingRequest {
    pub id: RecyclingRequestId,
    pub request_code: String,
    pub customer_id: Option<UserId>,
    pub branch_id: BranchId,
    pub waste_weight: f64,
    pub waste_type: Option<String>,
    pub status: RequestStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A branch manager's request for the factory to empty the branch bin.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRequest {
    pub id: CollectionRequestId,
    pub request_code: String,
    pub branch_id: BranchId,
    pub bin_id: RecyclingBinId,
    pub requested_by: Option<UserId>,
    pub status: RequestStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Bin level change applied by an approval or rejection.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinAdjustment {
    pub bin_id: RecyclingBinId,
    pub before: BinFill,
    pub after: BinFill,
    /// The deposit pushed the bin over the notification threshold.
    pub factory_notified: bool,
}
