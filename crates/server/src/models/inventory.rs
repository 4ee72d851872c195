//! Factory and branch inventory rows, and branch stock requests.

use chrono::{DateTime, Utc};
use serde::Serialize;

use aquacycle_core::{
    BranchId, BranchInventoryItemId, FactoryRequestId, FactoryRequestStatus, InventoryItemId,
    StockStatus, UserId, stock::LineItem,
};

/// A row of the factory ledger. `status` is derived from `quantity` and
/// `min_stock_level` by every write.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: InventoryItemId,
    pub name: String,
    pub quantity: i32,
    pub unit: String,
    pub min_stock_level: i32,
    pub max_stock_level: i32,
    pub status: StockStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row of a branch ledger, unique per `(branch_id, name)`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchInventoryItem {
    pub id: BranchInventoryItemId,
    pub branch_id: BranchId,
    pub name: String,
    pub quantity: i32,
    pub unit: String,
    pub min_stock_level: i32,
    pub max_stock_level: i32,
    pub status: StockStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A branch's direct request for factory stock.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactoryRequest {
    pub id: FactoryRequestId,
    pub request_code: String,
    pub branch_id: BranchId,
    pub items: Vec<LineItem>,
    pub total_quantity: i32,
    pub status: FactoryRequestStatus,
    pub requested_by: Option<UserId>,
    pub notes: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
