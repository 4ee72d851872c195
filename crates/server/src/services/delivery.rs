//! Delivery processing: factory shipment and branch receipt.

use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use aquacycle_core::{
    BranchOrderId, OrderId, OrderStatus,
    order::{RECEIVE_FROM, SHIP_FROM},
};

use super::orders::{
    credit_branch, mirror_to_branch_order, mirror_to_factory_order, release_driver,
    reserve_factory_stock, transition_branch_order, transition_order,
};
use crate::db::{BranchOrderRepository, OrderRepository};
use crate::error::AppError;
use crate::models::{BranchOrder, DeliveryReport, DeliveryType, Order};

/// Orders waiting on either side of the pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDeliveries {
    /// Factory orders not yet shipped.
    pub factory_orders: Vec<Order>,
    /// Branch orders shipped but not yet received.
    pub branch_orders: Vec<BranchOrder>,
}

const AWAITING_SHIPMENT: &[OrderStatus] = &[
    OrderStatus::Pending,
    OrderStatus::Accepted,
    OrderStatus::Processing,
];

/// Delivery service.
pub struct DeliveryService<'a> {
    pool: &'a PgPool,
}

impl<'a> DeliveryService<'a> {
    /// Create a new delivery service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Dispatch on the delivery side.
    ///
    /// # Errors
    ///
    /// See [`Self::process_factory`] and [`Self::process_branch`].
    pub async fn process(
        &self,
        order_id: i32,
        delivery_type: DeliveryType,
    ) -> Result<DeliveryReport, AppError> {
        match delivery_type {
            DeliveryType::Factory => self.process_factory(OrderId::new(order_id)).await,
            DeliveryType::Branch => self.process_branch(BranchOrderId::new(order_id)).await,
        }
    }

    /// Ship a factory order: deduct its stock and mark it shipped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the order is not pending or processing,
    /// or with every shortage if stock does not cover the order.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn process_factory(&self, id: OrderId) -> Result<DeliveryReport, AppError> {
        let mut tx = self.pool.begin().await?;

        let order = transition_order(&mut tx, id, SHIP_FROM, OrderStatus::Shipped).await?;
        let items = reserve_factory_stock(&mut tx, &order.items).await?;
        mirror_to_branch_order(&mut tx, &order).await?;

        tx.commit().await?;

        let report = DeliveryReport {
            order_id: order.id.as_i32(),
            delivery_type: DeliveryType::Factory,
            status: order.status,
            items,
        };
        log_report(&report);
        Ok(report)
    }

    /// Receive a shipped branch order into branch stock.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the branch order has not been shipped.
    #[instrument(skip(self), fields(branch_order_id = %id))]
    pub async fn process_branch(&self, id: BranchOrderId) -> Result<DeliveryReport, AppError> {
        let mut tx = self.pool.begin().await?;

        let branch_order =
            transition_branch_order(&mut tx, id, RECEIVE_FROM, OrderStatus::Delivered).await?;
        let items = credit_branch(&mut tx, branch_order.branch_id, &branch_order.items).await?;
        if let Some(driver) = release_driver(&mut tx, &branch_order).await? {
            info!(driver_id = %driver.id, deliveries = driver.total_deliveries, "driver released");
        }
        mirror_to_factory_order(&mut tx, &branch_order).await?;

        tx.commit().await?;

        let report = DeliveryReport {
            order_id: branch_order.id.as_i32(),
            delivery_type: DeliveryType::Branch,
            status: branch_order.status,
            items,
        };
        log_report(&report);
        Ok(report)
    }

    /// Factory orders awaiting shipment and branch orders awaiting receipt.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails.
    pub async fn pending(&self) -> Result<PendingDeliveries, AppError> {
        let factory_orders = OrderRepository::new(self.pool)
            .list_in(AWAITING_SHIPMENT)
            .await?;
        let branch_orders = BranchOrderRepository::new(self.pool)
            .list_in(RECEIVE_FROM)
            .await?;

        Ok(PendingDeliveries {
            factory_orders,
            branch_orders,
        })
    }
}

fn log_report(report: &DeliveryReport) {
    if report.is_partial() {
        warn!(
            applied = report.applied_count(),
            lines = report.items.len(),
            "delivery partially applied"
        );
    } else {
        info!(lines = report.items.len(), "delivery processed");
    }
}
