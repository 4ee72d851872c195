//! Recycling bins, customer drop-offs and factory collections.
//!
//! A bin is locked (`FOR UPDATE`) for the duration of any request that moves
//! its level, so concurrent approvals at one branch serialize.

use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument, warn};

use aquacycle_core::{
    BranchId, CollectionRequestId, DomainError, RecyclingBinId, RecyclingRequestId,
    RequestStatus, UserId,
    recycling::{BinFill, validate_weight},
};

use super::orders::ensure_branch;
use crate::db::numbering::{self, Sequence};
use crate::db::recycling::{self as repo, NewRecyclingRequest};
use crate::db::BinRepository;
use crate::error::AppError;
use crate::models::{BinAdjustment, CollectionRequest, RecyclingBin, RecyclingRequest};

/// Recycling workflow service.
pub struct RecyclingService<'a> {
    pool: &'a PgPool,
    reject_reverses_bin: bool,
}

impl<'a> RecyclingService<'a> {
    /// Create a new recycling service.
    ///
    /// `reject_reverses_bin` controls whether rejecting a request takes its
    /// weight back out of the bin.
    #[must_use]
    pub const fn new(pool: &'a PgPool, reject_reverses_bin: bool) -> Self {
        Self {
            pool,
            reject_reverses_bin,
        }
    }

    // =========================================================================
    // Bins
    // =========================================================================

    /// Create the recycling bin of a branch.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` for a non-positive capacity, `404` for an
    /// unknown branch and `409` if the branch already has a bin.
    #[instrument(skip(self), fields(branch_id = %branch_id))]
    pub async fn create_bin(
        &self,
        branch_id: BranchId,
        capacity: f64,
        current_level: f64,
    ) -> Result<RecyclingBin, AppError> {
        let fill = BinFill::new(capacity, current_level, false)?;
        ensure_branch(self.pool, branch_id).await?;

        let bin = BinRepository::new(self.pool).create(branch_id, &fill).await?;
        info!(bin_id = %bin.id, "recycling bin created");
        Ok(bin)
    }

    /// Change a bin's capacity, keeping its level in range.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` for a non-positive capacity, or `404`.
    #[instrument(skip(self), fields(bin_id = %id))]
    pub async fn resize_bin(&self, id: RecyclingBinId, capacity: f64) -> Result<RecyclingBin, AppError> {
        let mut tx = self.pool.begin().await?;
        let bin = repo::lock_bin(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("recycling bin"))?;
        let next = bin.fill().resized(capacity)?;
        let bin = repo::update_fill(&mut tx, id, &next, false).await?;
        tx.commit().await?;
        Ok(bin)
    }

    // =========================================================================
    // Recycling requests
    // =========================================================================

    /// Record a customer's drop-off as a pending request.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` for a non-positive weight, or `404` for an
    /// unknown branch.
    #[instrument(skip(self, waste_type, notes), fields(branch_id = %branch_id))]
    pub async fn submit(
        &self,
        customer_id: Option<UserId>,
        branch_id: BranchId,
        waste_weight: f64,
        waste_type: Option<&str>,
        notes: Option<&str>,
    ) -> Result<RecyclingRequest, AppError> {
        validate_weight(waste_weight)?;
        ensure_branch(self.pool, branch_id).await?;

        let mut tx = self.pool.begin().await?;
        let code = numbering::next_number(&mut tx, Sequence::Recycling).await?;
        let request = repo::insert_recycling(
            &mut tx,
            &code,
            &NewRecyclingRequest {
                customer_id,
                branch_id,
                waste_weight,
                waste_type,
                notes,
            },
        )
        .await?;
        tx.commit().await?;

        info!(request_id = %request.id, request_code = %request.request_code, "recycling request submitted");
        Ok(request)
    }

    /// Approve a pending request and add its weight to the branch bin.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the request is not pending, or `404` if
    /// the request or the branch bin is missing.
    #[instrument(skip(self), fields(request_id = %id))]
    pub async fn approve(
        &self,
        id: RecyclingRequestId,
    ) -> Result<(RecyclingRequest, BinAdjustment), AppError> {
        let mut tx = self.pool.begin().await?;

        let request =
            transition_recycling(&mut tx, id, &[RequestStatus::Pending], RequestStatus::Approved)
                .await?;
        let bin = repo::lock_bin_for_branch(&mut tx, request.branch_id)
            .await?
            .ok_or_else(|| AppError::not_found("recycling bin for branch"))?;

        let before = bin.fill();
        let after = before.deposit(request.waste_weight);
        repo::update_fill(&mut tx, bin.id, &after, false).await?;
        tx.commit().await?;

        let factory_notified = BinFill::newly_notified(&before, &after);
        if factory_notified {
            info!(
                bin_id = %bin.id,
                fill_percentage = after.fill_percentage,
                "recycling bin reached notification threshold"
            );
        }

        Ok((
            request,
            BinAdjustment {
                bin_id: bin.id,
                before,
                after,
                factory_notified,
            },
        ))
    }

    /// Reject a pending or approved request.
    ///
    /// When configured, the request's weight is taken back out of the bin,
    /// clamped at zero, whether or not it had been approved.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the request is already closed.
    #[instrument(skip(self), fields(request_id = %id))]
    pub async fn reject(
        &self,
        id: RecyclingRequestId,
    ) -> Result<(RecyclingRequest, Option<BinAdjustment>), AppError> {
        let mut tx = self.pool.begin().await?;

        let request = transition_recycling(
            &mut tx,
            id,
            &[RequestStatus::Pending, RequestStatus::Approved],
            RequestStatus::Rejected,
        )
        .await?;

        let adjustment = if self.reject_reverses_bin {
            match repo::lock_bin_for_branch(&mut tx, request.branch_id).await? {
                Some(bin) => {
                    let before = bin.fill();
                    let after = before.withdraw(request.waste_weight);
                    repo::update_fill(&mut tx, bin.id, &after, false).await?;
                    Some(BinAdjustment {
                        bin_id: bin.id,
                        before,
                        after,
                        factory_notified: false,
                    })
                }
                None => {
                    debug!(branch_id = %request.branch_id, "no bin to reverse");
                    None
                }
            }
        } else {
            None
        };

        tx.commit().await?;
        info!(reversed = adjustment.is_some(), "recycling request rejected");
        Ok((request, adjustment))
    }

    /// Close an approved request.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the request is not approved.
    #[instrument(skip(self), fields(request_id = %id))]
    pub async fn complete(&self, id: RecyclingRequestId) -> Result<RecyclingRequest, AppError> {
        let mut tx = self.pool.begin().await?;
        let request = transition_recycling(
            &mut tx,
            id,
            &[RequestStatus::Approved],
            RequestStatus::Completed,
        )
        .await?;
        tx.commit().await?;
        Ok(request)
    }

    // =========================================================================
    // Collection requests
    // =========================================================================

    /// Ask the factory to empty a branch's bin.
    ///
    /// # Errors
    ///
    /// Returns `404` if the branch has no bin.
    #[instrument(skip(self, notes), fields(branch_id = %branch_id))]
    pub async fn request_collection(
        &self,
        branch_id: BranchId,
        requested_by: Option<UserId>,
        notes: Option<&str>,
    ) -> Result<CollectionRequest, AppError> {
        let bin = BinRepository::new(self.pool)
            .get_by_branch(branch_id)
            .await?
            .ok_or_else(|| AppError::not_found("recycling bin for branch"))?;

        let mut tx = self.pool.begin().await?;
        let code = numbering::next_number(&mut tx, Sequence::Collection).await?;
        let request =
            repo::insert_collection(&mut tx, &code, branch_id, bin.id, requested_by, notes).await?;
        tx.commit().await?;

        info!(request_id = %request.id, fill_percentage = bin.fill_percentage, "collection requested");
        Ok(request)
    }

    /// Approve a pending collection and empty the bin.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the request is not pending.
    #[instrument(skip(self), fields(request_id = %id))]
    pub async fn approve_collection(
        &self,
        id: CollectionRequestId,
    ) -> Result<(CollectionRequest, RecyclingBin), AppError> {
        let mut tx = self.pool.begin().await?;

        let request = transition_collection(
            &mut tx,
            id,
            &[RequestStatus::Pending],
            RequestStatus::Approved,
        )
        .await?;
        let bin = repo::lock_bin(&mut tx, request.bin_id)
            .await?
            .ok_or_else(|| AppError::not_found("recycling bin"))?;
        let bin = repo::update_fill(&mut tx, bin.id, &bin.fill().emptied(), true).await?;

        tx.commit().await?;
        info!(bin_id = %bin.id, "recycling bin emptied");
        Ok((request, bin))
    }

    /// Reject a pending collection.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the request is not pending.
    #[instrument(skip(self), fields(request_id = %id))]
    pub async fn reject_collection(
        &self,
        id: CollectionRequestId,
    ) -> Result<CollectionRequest, AppError> {
        self.close_collection(id, RequestStatus::Pending, RequestStatus::Rejected)
            .await
    }

    /// Close an approved collection.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if the request is not approved.
    #[instrument(skip(self), fields(request_id = %id))]
    pub async fn complete_collection(
        &self,
        id: CollectionRequestId,
    ) -> Result<CollectionRequest, AppError> {
        self.close_collection(id, RequestStatus::Approved, RequestStatus::Completed)
            .await
    }

    async fn close_collection(
        &self,
        id: CollectionRequestId,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<CollectionRequest, AppError> {
        let mut tx = self.pool.begin().await?;
        let request = transition_collection(&mut tx, id, &[from], to).await?;
        tx.commit().await?;
        Ok(request)
    }
}

async fn transition_recycling(
    conn: &mut PgConnection,
    id: RecyclingRequestId,
    expected: &[RequestStatus],
    next: RequestStatus,
) -> Result<RecyclingRequest, AppError> {
    if let Some(request) = repo::transition_recycling(conn, id, expected, next).await? {
        return Ok(request);
    }
    match repo::get_recycling(conn, id).await? {
        Some(request) => {
            warn!(current = %request.status, requested = %next, "recycling request transition refused");
            Err(DomainError::transition("recycling request", request.status, next).into())
        }
        None => Err(AppError::not_found("recycling request")),
    }
}

async fn transition_collection(
    conn: &mut PgConnection,
    id: CollectionRequestId,
    expected: &[RequestStatus],
    next: RequestStatus,
) -> Result<CollectionRequest, AppError> {
    if let Some(request) = repo::transition_collection(conn, id, expected, next).await? {
        return Ok(request);
    }
    match repo::get_collection(conn, id).await? {
        Some(request) => {
            Err(DomainError::transition("collection request", request.status, next).into())
        }
        None => Err(AppError::not_found("collection request")),
    }
}
