//! Factory and branch order lifecycle.
//!
//! Every operation here runs in a single transaction. Status preconditions
//! are compare-and-swap updates; when one matches nothing the order is
//! re-read so the error can name its current status.

use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument, warn};

use aquacycle_core::{
    BranchId, BranchOrderId, DomainError, DriverId, DriverStatus, OrderId, OrderSource,
    OrderStatus,
    order::{ACCEPT_FROM, DELETABLE, StatusEffect, branch_order_status_rule, order_status_rule},
    stock::{LineItem, consolidate, plan_reservation, validate_line_items},
};

use crate::db::numbering::{self, Sequence};
use crate::db::orders::NewOrder;
use crate::db::{
    BranchOrderRepository, BranchRepository, OrderRepository, branch_inventory, branch_orders,
    drivers, inventory, orders,
};
use crate::error::AppError;
use crate::models::{BranchOrder, Driver, LineOutcome, Order};

/// A status write together with the per-line inventory results it caused.
#[derive(Debug, Clone)]
pub struct StatusUpdate<T> {
    pub record: T,
    pub items: Vec<LineOutcome>,
    /// Driver released by a delivery, if one was assigned.
    pub driver: Option<Driver>,
}

/// Order lifecycle service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a direct factory order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the line items are invalid.
    #[instrument(skip(self, items, notes))]
    pub async fn create_order(
        &self,
        items: &[LineItem],
        branch_id: Option<BranchId>,
        notes: Option<&str>,
    ) -> Result<Order, AppError> {
        validate_line_items(items)?;
        if let Some(branch_id) = branch_id {
            ensure_branch(self.pool, branch_id).await?;
        }

        let mut tx = self.pool.begin().await?;
        let number = numbering::next_number(&mut tx, Sequence::Order).await?;
        let order = orders::insert(
            &mut tx,
            &NewOrder {
                order_number: &number,
                items,
                source: OrderSource::Direct,
                branch_id,
                branch_order_id: None,
                notes,
            },
        )
        .await?;
        tx.commit().await?;

        info!(order_id = %order.id, order_number = %order.order_number, "order created");
        Ok(order)
    }

    /// Create a branch order and its factory mirror, cross-linked.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the line items are invalid, or
    /// `AppError::NotFound` if the branch does not exist.
    #[instrument(skip(self, items, notes), fields(branch_id = %branch_id))]
    pub async fn create_branch_order(
        &self,
        branch_id: BranchId,
        items: &[LineItem],
        notes: Option<&str>,
    ) -> Result<(BranchOrder, Order), AppError> {
        validate_line_items(items)?;
        ensure_branch(self.pool, branch_id).await?;

        let mut tx = self.pool.begin().await?;

        let branch_number = numbering::next_number(&mut tx, Sequence::BranchOrder).await?;
        let branch_order =
            branch_orders::insert(&mut tx, &branch_number, branch_id, items, notes).await?;

        let order_number = numbering::next_number(&mut tx, Sequence::Order).await?;
        let order = orders::insert(
            &mut tx,
            &NewOrder {
                order_number: &order_number,
                items,
                source: OrderSource::BranchRequest,
                branch_id: Some(branch_id),
                branch_order_id: Some(branch_order.id),
                notes,
            },
        )
        .await?;

        let branch_order = branch_orders::link_factory_order(&mut tx, branch_order.id, order.id).await?;
        tx.commit().await?;

        info!(
            branch_order_id = %branch_order.id,
            order_id = %order.id,
            "branch order created"
        );
        Ok((branch_order, order))
    }

    /// Accept a pending order, reserving its stock from the factory ledger.
    ///
    /// Either every line is reserved or nothing is.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` with the current status if the order is not
    /// pending, or with every shortage if stock does not cover the order.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn accept_order(&self, id: OrderId) -> Result<StatusUpdate<Order>, AppError> {
        let mut tx = self.pool.begin().await?;

        let order = transition_order(&mut tx, id, ACCEPT_FROM, OrderStatus::Accepted).await?;
        let items = reserve_factory_stock(&mut tx, &order.items).await?;
        mirror_to_branch_order(&mut tx, &order).await?;

        tx.commit().await?;

        info!(lines = items.len(), "order accepted");
        Ok(StatusUpdate {
            record: order,
            items,
            driver: None,
        })
    }

    /// Write a factory order status, applying the inventory effect its rule
    /// carries and mirroring the status to the linked branch order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the stored status does not allow the
    /// write or shipping stock is short.
    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    pub async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<StatusUpdate<Order>, AppError> {
        let rule = order_status_rule(status);
        let expected = rule.expected.unwrap_or(OrderStatus::ALL);

        let mut tx = self.pool.begin().await?;
        let order = transition_order(&mut tx, id, expected, status).await?;

        let items = match rule.effect {
            StatusEffect::DeductFactoryStock => reserve_factory_stock(&mut tx, &order.items).await?,
            StatusEffect::CreditBranchStock => match order.branch_id {
                Some(branch_id) => credit_branch(&mut tx, branch_id, &order.items).await?,
                None => Vec::new(),
            },
            StatusEffect::TransferToBranch | StatusEffect::None => Vec::new(),
        };
        let driver = mirror_to_branch_order(&mut tx, &order).await?;

        tx.commit().await?;

        if let Some(driver) = &driver {
            info!(driver_id = %driver.id, "driver released by factory delivery");
        }
        info!(lines = items.len(), "order status updated");
        Ok(StatusUpdate {
            record: order,
            items,
            driver,
        })
    }

    /// Write a branch order status.
    ///
    /// Delivery moves each line from factory to branch stock and frees the
    /// assigned driver. Lines the factory cannot cover are reported and
    /// skipped; the rest still commit.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the branch order is already delivered or
    /// cancelled.
    #[instrument(skip(self), fields(branch_order_id = %id, status = %status))]
    pub async fn update_branch_order_status(
        &self,
        id: BranchOrderId,
        status: OrderStatus,
    ) -> Result<StatusUpdate<BranchOrder>, AppError> {
        let rule = branch_order_status_rule(status);
        let expected = rule.expected.unwrap_or(OrderStatus::ALL);

        let mut tx = self.pool.begin().await?;
        let branch_order = transition_branch_order(&mut tx, id, expected, status).await?;
        mirror_to_factory_order(&mut tx, &branch_order).await?;

        let (items, driver) = if rule.effect == StatusEffect::TransferToBranch {
            let items =
                transfer_to_branch(&mut tx, branch_order.branch_id, &branch_order.items).await?;
            let driver = release_driver(&mut tx, &branch_order).await?;
            (items, driver)
        } else {
            (Vec::new(), None)
        };

        tx.commit().await?;

        info!(lines = items.len(), "branch order status updated");
        Ok(StatusUpdate {
            record: branch_order,
            items,
            driver,
        })
    }

    /// Put an available driver on a branch order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if either record is missing, or
    /// `AppError::Domain` if the driver is busy or the order is closed.
    #[instrument(skip(self), fields(branch_order_id = %id, driver_id = %driver_id))]
    pub async fn assign_driver(
        &self,
        id: BranchOrderId,
        driver_id: DriverId,
    ) -> Result<(BranchOrder, Driver), AppError> {
        let mut tx = self.pool.begin().await?;

        let current = branch_orders::get(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("branch order"))?;
        if current.status.is_terminal() {
            return Err(
                DomainError::transition("branch order", current.status, "driver assigned").into(),
            );
        }

        let driver = claim_driver(&mut tx, driver_id, Some(id)).await?;
        let branch_order = match branch_orders::assign_driver(&mut tx, id, driver_id).await? {
            Some(order) => order,
            None => return Err(reread_branch_order(&mut tx, id, "driver assigned").await),
        };

        tx.commit().await?;

        info!(driver_code = %driver.driver_code, "driver assigned to branch order");
        Ok((branch_order, driver))
    }

    /// Delete a pending or cancelled factory order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the order does not exist, or
    /// `AppError::Domain` if it is in progress.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn delete_order(&self, id: OrderId) -> Result<(), AppError> {
        let repo = OrderRepository::new(self.pool);
        if repo.delete_in(id, DELETABLE).await? {
            return Ok(());
        }
        match repo.get(id).await? {
            Some(order) => Err(DomainError::transition("order", order.status, "Deleted").into()),
            None => Err(AppError::not_found("order")),
        }
    }

    /// Delete a pending or cancelled branch order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the order does not exist, or
    /// `AppError::Domain` if it is in progress.
    #[instrument(skip(self), fields(branch_order_id = %id))]
    pub async fn delete_branch_order(&self, id: BranchOrderId) -> Result<(), AppError> {
        let repo = BranchOrderRepository::new(self.pool);
        if repo.delete_in(id, DELETABLE).await? {
            return Ok(());
        }
        match repo.get(id).await? {
            Some(order) => {
                Err(DomainError::transition("branch order", order.status, "Deleted").into())
            }
            None => Err(AppError::not_found("branch order")),
        }
    }
}

// =============================================================================
// Transaction-scoped steps shared with delivery processing
// =============================================================================

pub(super) async fn ensure_branch(pool: &PgPool, id: BranchId) -> Result<(), AppError> {
    if BranchRepository::new(pool).exists(id).await? {
        Ok(())
    } else {
        Err(AppError::not_found("branch"))
    }
}

/// Compare-and-swap a factory order status.
pub(super) async fn transition_order(
    conn: &mut PgConnection,
    id: OrderId,
    expected: &[OrderStatus],
    next: OrderStatus,
) -> Result<Order, AppError> {
    if let Some(order) = orders::transition(conn, id, expected, next).await? {
        return Ok(order);
    }
    match orders::get(conn, id).await? {
        Some(order) => Err(DomainError::transition("order", order.status, next).into()),
        None => Err(AppError::not_found("order")),
    }
}

/// Compare-and-swap a branch order status.
pub(super) async fn transition_branch_order(
    conn: &mut PgConnection,
    id: BranchOrderId,
    expected: &[OrderStatus],
    next: OrderStatus,
) -> Result<BranchOrder, AppError> {
    match branch_orders::transition(conn, id, expected, next).await? {
        Some(order) => Ok(order),
        None => Err(reread_branch_order(conn, id, next).await),
    }
}

async fn reread_branch_order(
    conn: &mut PgConnection,
    id: BranchOrderId,
    requested: impl ToString,
) -> AppError {
    match branch_orders::get(conn, id).await {
        Ok(Some(order)) => DomainError::transition("branch order", order.status, requested).into(),
        Ok(None) => AppError::not_found("branch order"),
        Err(e) => e.into(),
    }
}

/// Copy a factory order's status onto its branch order.
///
/// A branch order that becomes delivered this way is closed for good, so its
/// driver is released here.
pub(super) async fn mirror_to_branch_order(
    conn: &mut PgConnection,
    order: &Order,
) -> Result<Option<Driver>, AppError> {
    let Some(branch_order_id) = order.original_branch_order_id else {
        return Ok(None);
    };
    match branch_orders::mirror_status(conn, branch_order_id, order.status).await? {
        Some(branch_order) if branch_order.status.frees_driver() => {
            release_driver(conn, &branch_order).await
        }
        _ => Ok(None),
    }
}

pub(super) async fn mirror_to_factory_order(
    conn: &mut PgConnection,
    branch_order: &BranchOrder,
) -> Result<(), AppError> {
    if let Some(order_id) = branch_order.factory_order_id {
        orders::mirror_status(conn, order_id, branch_order.status).await?;
    }
    Ok(())
}

/// Deduct every line from factory stock, all or nothing.
///
/// The rows are locked first so the shortage check and the decrements see
/// the same quantities.
pub(super) async fn reserve_factory_stock(
    conn: &mut PgConnection,
    items: &[LineItem],
) -> Result<Vec<LineOutcome>, AppError> {
    let lines = consolidate(items);
    let names: Vec<String> = lines.iter().map(|l| l.item_name.clone()).collect();
    let available = inventory::lock_quantities(conn, &names).await?;
    let plan = plan_reservation(&lines, &available)?;

    let mut outcomes = Vec::with_capacity(plan.len());
    for line in plan {
        match inventory::decrement(conn, &line.item_name, line.quantity).await? {
            Some(moved) => {
                outcomes.push(LineOutcome::applied(line.item_name, line.quantity, moved));
            }
            None => {
                warn!(item = %line.item_name, "locked stock changed during reservation");
                outcomes.push(LineOutcome::failed(
                    line.item_name,
                    line.quantity,
                    "factory stock changed during reservation",
                ));
            }
        }
    }
    Ok(outcomes)
}

/// Credit every line to a branch ledger, creating rows as needed.
pub(super) async fn credit_branch(
    conn: &mut PgConnection,
    branch_id: BranchId,
    items: &[LineItem],
) -> Result<Vec<LineOutcome>, AppError> {
    let mut outcomes = Vec::with_capacity(items.len());
    for line in consolidate(items) {
        let moved = branch_inventory::credit(conn, branch_id, &line.item_name, line.quantity).await?;
        outcomes.push(LineOutcome::applied(line.item_name, line.quantity, moved));
    }
    Ok(outcomes)
}

/// Move each line from factory to branch stock.
///
/// A line whose factory item is missing or short is reported and left out;
/// the other lines are still applied.
pub(super) async fn transfer_to_branch(
    conn: &mut PgConnection,
    branch_id: BranchId,
    items: &[LineItem],
) -> Result<Vec<LineOutcome>, AppError> {
    let mut outcomes = Vec::with_capacity(items.len());
    for line in consolidate(items) {
        let LineItem {
            item_name,
            quantity,
        } = line;

        if inventory::decrement(conn, &item_name, quantity).await?.is_none() {
            let outcome = match inventory::on_hand(conn, &item_name).await? {
                None => LineOutcome::skipped(item_name, quantity, "not in factory inventory"),
                Some(on_hand) => LineOutcome::failed(
                    item_name,
                    quantity,
                    format!("insufficient factory stock ({on_hand} on hand)"),
                ),
            };
            warn!(
                item = %outcome.item_name,
                reason = outcome.reason.as_deref().unwrap_or_default(),
                "line not transferred to branch"
            );
            outcomes.push(outcome);
            continue;
        }

        let moved = branch_inventory::credit(conn, branch_id, &item_name, quantity).await?;
        outcomes.push(LineOutcome::applied(item_name, quantity, moved));
    }
    Ok(outcomes)
}

/// Return the order's driver to `Available` with one more delivery.
pub(super) async fn release_driver(
    conn: &mut PgConnection,
    branch_order: &BranchOrder,
) -> Result<Option<Driver>, AppError> {
    let Some(driver_id) = branch_order.assigned_driver else {
        return Ok(None);
    };
    let driver = drivers::release(conn, driver_id, Some(branch_order.id)).await?;
    if driver.is_none() {
        warn!(driver_id = %driver_id, "assigned driver no longer exists");
    }
    Ok(driver)
}

/// Move an available driver to `On Delivery`.
pub(super) async fn claim_driver(
    conn: &mut PgConnection,
    driver_id: DriverId,
    order: Option<BranchOrderId>,
) -> Result<Driver, AppError> {
    if let Some(driver) = drivers::claim(conn, driver_id, order).await? {
        return Ok(driver);
    }
    match drivers::get(conn, driver_id).await? {
        Some(driver) => {
            Err(DomainError::transition("driver", driver.status, DriverStatus::OnDelivery).into())
        }
        None => Err(AppError::not_found("driver")),
    }
}
