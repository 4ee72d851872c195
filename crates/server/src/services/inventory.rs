//! Factory and branch stock operations, and factory stock requests.

use sqlx::PgPool;
use tracing::{info, instrument};

use aquacycle_core::{
    BranchId, BranchInventoryItemId, DomainError, FactoryRequestId, FactoryRequestStatus,
    InventoryItemId, UserId,
    stock::{LineItem, Shortage, consolidate, validate_levels, validate_line_items},
};

use super::orders::{ensure_branch, reserve_factory_stock};
use crate::db::factory_requests;
use crate::db::inventory::{InventoryLevels, NewInventoryItem};
use crate::db::numbering::{self, Sequence};
use crate::db::{
    BranchInventoryRepository, FactoryRequestRepository, InventoryRepository, branch_inventory,
};
use crate::error::AppError;
use crate::models::{BranchInventoryItem, FactoryRequest, InventoryItem, LineOutcome, Outcome};

/// Inventory service.
pub struct InventoryService<'a> {
    pool: &'a PgPool,
}

impl<'a> InventoryService<'a> {
    /// Create a new inventory service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Factory ledger
    // =========================================================================

    /// Add a catalog item.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` for invalid levels, or a `409` if the name
    /// is taken.
    #[instrument(skip(self, item), fields(name = %item.name))]
    pub async fn add_item(&self, item: &NewInventoryItem) -> Result<InventoryItem, AppError> {
        if item.name.trim().is_empty() {
            return Err(DomainError::field("name", "name is required").into());
        }
        validate_levels(item.quantity, item.min_stock_level, item.max_stock_level)?;

        let created = InventoryRepository::new(self.pool).create(item).await?;
        info!(item_id = %created.id, "inventory item added");
        Ok(created)
    }

    /// Overwrite an item's quantity, unit and thresholds.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` for invalid levels, or `AppError::NotFound`.
    pub async fn update_item(
        &self,
        id: InventoryItemId,
        levels: &InventoryLevels,
    ) -> Result<InventoryItem, AppError> {
        validate_levels(levels.quantity, levels.min_stock_level, levels.max_stock_level)?;
        InventoryRepository::new(self.pool)
            .update(id, levels)
            .await?
            .ok_or_else(|| AppError::not_found("inventory item"))
    }

    /// Apply a signed delta to an item's quantity.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` with a shortage if the delta would take the
    /// quantity below zero, or `AppError::NotFound`.
    #[instrument(skip(self), fields(item_id = %id, delta = delta))]
    pub async fn adjust(&self, id: InventoryItemId, delta: i32) -> Result<InventoryItem, AppError> {
        if delta == 0 {
            return Err(DomainError::field("adjustment", "adjustment must not be zero").into());
        }

        let repo = InventoryRepository::new(self.pool);
        if let Some(item) = repo.adjust(id, delta).await? {
            info!(quantity = item.quantity, status = %item.status, "inventory adjusted");
            return Ok(item);
        }

        let item = repo
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("inventory item"))?;
        Err(DomainError::InsufficientStock(vec![Shortage {
            item_name: item.name,
            available: item.quantity,
            required: delta.saturating_neg(),
        }])
        .into())
    }

    /// Remove a catalog item.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the item does not exist.
    pub async fn delete_item(&self, id: InventoryItemId) -> Result<(), AppError> {
        if InventoryRepository::new(self.pool).delete(id).await? {
            Ok(())
        } else {
            Err(AppError::not_found("inventory item"))
        }
    }

    // =========================================================================
    // Branch ledgers
    // =========================================================================

    /// Seed a branch with every catalog item at zero. Safe to repeat.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the branch does not exist.
    #[instrument(skip(self), fields(branch_id = %branch_id))]
    pub async fn initialize_branch(&self, branch_id: BranchId) -> Result<u64, AppError> {
        ensure_branch(self.pool, branch_id).await?;
        let created = BranchInventoryRepository::new(self.pool)
            .initialize(branch_id)
            .await?;
        info!(created, "branch inventory initialized");
        Ok(created)
    }

    /// Copy unit and thresholds from the catalog without touching quantities.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the branch does not exist.
    #[instrument(skip(self), fields(branch_id = %branch_id))]
    pub async fn sync_branch(&self, branch_id: BranchId) -> Result<u64, AppError> {
        ensure_branch(self.pool, branch_id).await?;
        let synced = BranchInventoryRepository::new(self.pool)
            .sync_from_catalog(branch_id)
            .await?;
        info!(synced, "branch inventory synced from catalog");
        Ok(synced)
    }

    /// Overwrite a branch row's quantity and thresholds.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` for invalid levels, or `AppError::NotFound`.
    pub async fn update_branch_item(
        &self,
        id: BranchInventoryItemId,
        quantity: i32,
        min_stock_level: i32,
        max_stock_level: i32,
    ) -> Result<BranchInventoryItem, AppError> {
        validate_levels(quantity, min_stock_level, max_stock_level)?;
        BranchInventoryRepository::new(self.pool)
            .update_levels(id, quantity, min_stock_level, max_stock_level)
            .await?
            .ok_or_else(|| AppError::not_found("branch inventory item"))
    }

    /// Remove a branch row.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the row does not exist.
    pub async fn delete_branch_item(&self, id: BranchInventoryItemId) -> Result<(), AppError> {
        if BranchInventoryRepository::new(self.pool).delete(id).await? {
            Ok(())
        } else {
            Err(AppError::not_found("branch inventory item"))
        }
    }

    /// Sell items to a customer from branch stock, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` with available and required quantities for
    /// every short line.
    #[instrument(skip(self, items), fields(branch_id = %branch_id))]
    pub async fn purchase(
        &self,
        branch_id: BranchId,
        items: &[LineItem],
    ) -> Result<Vec<LineOutcome>, AppError> {
        validate_line_items(items)?;

        let mut tx = self.pool.begin().await?;
        let mut outcomes = Vec::new();
        let mut shortages = Vec::new();

        for line in consolidate(items) {
            match branch_inventory::debit(&mut tx, branch_id, &line.item_name, line.quantity).await? {
                Some(moved) => {
                    outcomes.push(LineOutcome::applied(line.item_name, line.quantity, moved));
                }
                None => {
                    let available = branch_inventory::on_hand(&mut tx, branch_id, &line.item_name)
                        .await?
                        .unwrap_or(0);
                    shortages.push(Shortage {
                        item_name: line.item_name,
                        available,
                        required: line.quantity,
                    });
                }
            }
        }

        // Dropping the transaction rolls back the lines that were debited.
        if !shortages.is_empty() {
            return Err(DomainError::InsufficientStock(shortages).into());
        }

        tx.commit().await?;
        info!(lines = outcomes.len(), "branch purchase recorded");
        Ok(outcomes)
    }

    // =========================================================================
    // Factory requests
    // =========================================================================

    /// Raise a branch's direct request for factory stock.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the items are invalid, or
    /// `AppError::NotFound` if the branch does not exist.
    #[instrument(skip(self, items, notes), fields(branch_id = %branch_id))]
    pub async fn create_factory_request(
        &self,
        branch_id: BranchId,
        items: &[LineItem],
        requested_by: Option<UserId>,
        notes: Option<&str>,
    ) -> Result<FactoryRequest, AppError> {
        validate_line_items(items)?;
        ensure_branch(self.pool, branch_id).await?;

        let mut tx = self.pool.begin().await?;
        let code = numbering::next_number(&mut tx, Sequence::FactoryRequest).await?;
        let request =
            factory_requests::insert(&mut tx, &code, branch_id, items, requested_by, notes).await?;
        tx.commit().await?;

        info!(request_id = %request.id, request_code = %request.request_code, "factory request created");
        Ok(request)
    }

    /// Approve a pending request, moving every line factory → branch.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the request is no longer pending or any
    /// line is short (nothing changes then).
    #[instrument(skip(self), fields(request_id = %id))]
    pub async fn approve_factory_request(
        &self,
        id: FactoryRequestId,
    ) -> Result<(FactoryRequest, Vec<LineOutcome>), AppError> {
        let mut tx = self.pool.begin().await?;

        let Some(request) =
            factory_requests::decide(&mut tx, id, FactoryRequestStatus::Approved).await?
        else {
            drop(tx);
            return Err(self.undecidable(id, FactoryRequestStatus::Approved).await);
        };

        let deducted = reserve_factory_stock(&mut tx, &request.items).await?;
        let mut outcomes = Vec::with_capacity(deducted.len());
        for line in deducted {
            if line.outcome != Outcome::Applied {
                outcomes.push(line);
                continue;
            }
            let moved =
                branch_inventory::credit(&mut tx, request.branch_id, &line.item_name, line.quantity)
                    .await?;
            outcomes.push(LineOutcome::applied(line.item_name, line.quantity, moved));
        }

        tx.commit().await?;
        info!(lines = outcomes.len(), "factory request approved");
        Ok((request, outcomes))
    }

    /// Reject a pending request.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the request is no longer pending.
    #[instrument(skip(self), fields(request_id = %id))]
    pub async fn reject_factory_request(
        &self,
        id: FactoryRequestId,
    ) -> Result<FactoryRequest, AppError> {
        let mut tx = self.pool.begin().await?;
        let Some(request) =
            factory_requests::decide(&mut tx, id, FactoryRequestStatus::Rejected).await?
        else {
            drop(tx);
            return Err(self.undecidable(id, FactoryRequestStatus::Rejected).await);
        };
        tx.commit().await?;

        info!("factory request rejected");
        Ok(request)
    }

    async fn undecidable(&self, id: FactoryRequestId, requested: FactoryRequestStatus) -> AppError {
        match FactoryRequestRepository::new(self.pool).get(id).await {
            Ok(Some(request)) => {
                DomainError::transition("factory request", request.status, requested).into()
            }
            Ok(None) => AppError::not_found("factory request"),
            Err(e) => e.into(),
        }
    }
}
