//! Factory orders, branch orders and the drivers that carry them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use aquacycle_core::{
    BranchId, BranchOrderId, DriverId, DriverStatus, OrderId, OrderSource, OrderStatus,
    stock::LineItem,
};

/// Factory-side order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub items: Vec<LineItem>,
    pub total_quantity: i32,
    pub status: OrderStatus,
    pub source: OrderSource,
    /// Branch credited when the order is delivered.
    pub branch_id: Option<BranchId>,
    /// Branch order this order mirrors, for `Branch Request` orders.
    pub original_branch_order_id: Option<BranchOrderId>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Branch-side view of a stock request, paired 1:1 with an [`Order`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchOrder {
    pub id: BranchOrderId,
    pub order_number: String,
    pub branch_id: BranchId,
    pub items: Vec<LineItem>,
    pub total_quantity: i32,
    pub status: OrderStatus,
    pub factory_order_id: Option<OrderId>,
    pub assigned_driver: Option<DriverId>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: DriverId,
    /// Generated `DRV-XXXXXX` code.
    pub driver_code: String,
    pub name: String,
    pub phone: String,
    pub license_number: Option<String>,
    pub branch_id: Option<BranchId>,
    pub status: DriverStatus,
    /// Branch orders the driver is currently carrying.
    pub assigned_orders: Vec<BranchOrderId>,
    pub total_deliveries: i32,
    pub base_salary: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
