//! Recycling bins, customer drop-offs and factory collections.

use axum::{
    Router,
    extract::State,
    routing::{get, put},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use aquacycle_core::{
    BranchId, CollectionRequestId, RecyclingBinId, RecyclingRequestId, RequestStatus, Role,
};

use super::{ApiJson, ApiPath, ApiQuery, ApiResult, created, ok, to_json, with_extra};
use crate::db::recycling::RequestFilter;
use crate::db::{BinRepository, CollectionRepository, RecyclingRepository};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::services::RecyclingService;
use crate::state::AppState;

const BIN_READERS: &[Role] = &[Role::Admin, Role::FactoryManager, Role::BranchManager];
const BIN_WRITERS: &[Role] = &[Role::Admin, Role::BranchManager];
const FACTORY: &[Role] = &[Role::Admin, Role::FactoryManager];

const REQUEST_READERS: &[Role] = &[
    Role::Admin,
    Role::FactoryManager,
    Role::BranchManager,
    Role::Customer,
];
const SUBMITTERS: &[Role] = &[Role::Admin, Role::BranchManager, Role::Customer];
const BRANCH_DECIDERS: &[Role] = &[Role::Admin, Role::BranchManager];

/// Build the recycling router.
pub fn router() -> Router<AppState> {
    let router = Router::new()
        .route("/RecyclingBins", get(list_bins).post(create_bin))
        .route("/RecyclingBins/notifications", get(notifications))
        .route("/RecyclingBins/branch/{branch_id}", get(bin_for_branch))
        .route("/RecyclingBins/{id}", put(resize_bin))
        .route("/RecyclingRequests", get(list_requests).post(submit_request))
        .route("/RecyclingRequests/{id}", get(get_request))
        .route("/RecyclingRequests/{id}/approve", put(approve_request))
        .route("/RecyclingRequests/{id}/reject", put(reject_request))
        .route("/RecyclingRequests/{id}/complete", put(complete_request));

    let router = collection_routes(router, "/RecyclingRequests/collection");
    collection_routes(router, "/CollectionRequests")
}

/// Mount the collection handlers under `prefix`.
fn collection_routes(router: Router<AppState>, prefix: &str) -> Router<AppState> {
    router
        .route(prefix, get(list_collections).post(request_collection))
        .route(&format!("{prefix}/{{id}}/approve"), put(approve_collection))
        .route(&format!("{prefix}/{{id}}/reject"), put(reject_collection))
        .route(&format!("{prefix}/{{id}}/complete"), put(complete_collection))
}

fn service(state: &AppState) -> RecyclingService<'_> {
    RecyclingService::new(
        state.pool(),
        state.config().recycling_reject_reverses_bin,
    )
}

/// Body of bin creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBinRequest {
    pub branch_id: Option<BranchId>,
    pub capacity: f64,
    #[serde(default)]
    pub current_level: f64,
}

/// Body of a bin resize.
#[derive(Debug, Deserialize)]
pub struct ResizeBinRequest {
    pub capacity: f64,
}

/// Query parameters for request lists.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestQuery {
    pub branch_id: Option<BranchId>,
    pub status: Option<RequestStatus>,
}

/// Body of a customer drop-off.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub branch_id: BranchId,
    pub waste_weight: f64,
    pub waste_type: Option<String>,
    pub notes: Option<String>,
}

/// Body of a collection request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionBody {
    pub branch_id: Option<BranchId>,
    pub notes: Option<String>,
}

impl RequestQuery {
    /// Customers see their own drop-offs, branch staff their own branch.
    fn filter(&self, auth: &AuthUser) -> Result<RequestFilter, AppError> {
        let mut filter = RequestFilter {
            branch_id: self.branch_id,
            status: self.status,
            user_id: None,
        };
        match auth.role {
            Role::Customer => filter.user_id = Some(auth.id),
            Role::BranchManager => filter.branch_id = Some(auth.branch_scope(self.branch_id)?),
            _ => {}
        }
        Ok(filter)
    }
}

// =============================================================================
// Bins
// =============================================================================

#[instrument(skip(auth, state))]
async fn list_bins(auth: AuthUser, State(state): State<AppState>) -> ApiResult {
    auth.require_roles(BIN_READERS)?;
    let bins = BinRepository::new(state.pool()).list().await?;
    ok("Recycling bins retrieved", "bins", &bins)
}

#[instrument(skip(auth, state))]
async fn notifications(auth: AuthUser, State(state): State<AppState>) -> ApiResult {
    auth.require_roles(FACTORY)?;
    let bins = BinRepository::new(state.pool()).notified().await?;
    with_extra(
        ok("Bin notifications retrieved", "bins", &bins),
        &[("count", to_json(&bins.len())?)],
    )
}

#[instrument(skip(auth, state), fields(branch_id = %branch_id))]
async fn bin_for_branch(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(branch_id): ApiPath<BranchId>,
) -> ApiResult {
    auth.require_roles(BIN_READERS)?;
    let branch_id = auth.branch_scope(Some(branch_id))?;
    let bin = BinRepository::new(state.pool())
        .get_by_branch(branch_id)
        .await?
        .ok_or_else(|| AppError::not_found("recycling bin for branch"))?;
    ok("Recycling bin retrieved", "bin", &bin)
}

#[instrument(skip(auth, state, body))]
async fn create_bin(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateBinRequest>,
) -> ApiResult {
    auth.require_roles(BIN_WRITERS)?;
    let branch_id = auth.branch_scope(body.branch_id)?;
    let bin = service(&state)
        .create_bin(branch_id, body.capacity, body.current_level)
        .await?;
    created("Recycling bin created", "bin", &bin)
}

#[instrument(skip(auth, state, body), fields(bin_id = %id))]
async fn resize_bin(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<RecyclingBinId>,
    ApiJson(body): ApiJson<ResizeBinRequest>,
) -> ApiResult {
    auth.require_roles(BIN_WRITERS)?;
    let bin = service(&state).resize_bin(id, body.capacity).await?;
    ok("Recycling bin updated", "bin", &bin)
}

// =============================================================================
// Recycling requests
// =============================================================================

#[instrument(skip(auth, state))]
async fn list_requests(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RequestQuery>,
) -> ApiResult {
    auth.require_roles(REQUEST_READERS)?;
    let requests = RecyclingRepository::new(state.pool())
        .list(&query.filter(&auth)?)
        .await?;
    ok("Recycling requests retrieved", "requests", &requests)
}

#[instrument(skip(auth, state), fields(request_id = %id))]
async fn get_request(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<RecyclingRequestId>,
) -> ApiResult {
    auth.require_roles(REQUEST_READERS)?;
    let request = RecyclingRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|r| auth.role != Role::Customer || r.customer_id == Some(auth.id))
        .ok_or_else(|| AppError::not_found("recycling request"))?;
    ok("Recycling request retrieved", "request", &request)
}

#[instrument(skip(auth, state, body), fields(branch_id = %body.branch_id))]
async fn submit_request(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SubmitRequest>,
) -> ApiResult {
    auth.require_roles(SUBMITTERS)?;
    let customer_id = (auth.role == Role::Customer).then_some(auth.id);
    let request = service(&state)
        .submit(
            customer_id,
            body.branch_id,
            body.waste_weight,
            body.waste_type.as_deref(),
            body.notes.as_deref(),
        )
        .await?;
    created("Recycling request submitted", "request", &request)
}

#[instrument(skip(auth, state), fields(request_id = %id))]
async fn approve_request(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<RecyclingRequestId>,
) -> ApiResult {
    auth.require_roles(BRANCH_DECIDERS)?;
    let (request, adjustment) = service(&state).approve(id).await?;
    with_extra(
        ok("Recycling request approved", "request", &request),
        &[("bin", to_json(&adjustment)?)],
    )
}

#[instrument(skip(auth, state), fields(request_id = %id))]
async fn reject_request(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<RecyclingRequestId>,
) -> ApiResult {
    auth.require_roles(BRANCH_DECIDERS)?;
    let (request, adjustment) = service(&state).reject(id).await?;
    let bin = adjustment.as_ref().map_or(Ok(Value::Null), to_json)?;
    with_extra(
        ok("Recycling request rejected", "request", &request),
        &[("bin", bin)],
    )
}

#[instrument(skip(auth, state), fields(request_id = %id))]
async fn complete_request(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<RecyclingRequestId>,
) -> ApiResult {
    auth.require_roles(BRANCH_DECIDERS)?;
    let request = service(&state).complete(id).await?;
    ok("Recycling request completed", "request", &request)
}

// =============================================================================
// Collection requests
// =============================================================================

#[instrument(skip(auth, state))]
async fn list_collections(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RequestQuery>,
) -> ApiResult {
    auth.require_roles(BIN_READERS)?;
    let requests = CollectionRepository::new(state.pool())
        .list(&query.filter(&auth)?)
        .await?;
    ok("Collection requests retrieved", "requests", &requests)
}

#[instrument(skip(auth, state, body))]
async fn request_collection(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CollectionBody>,
) -> ApiResult {
    auth.require_roles(BRANCH_DECIDERS)?;
    let branch_id = auth.branch_scope(body.branch_id)?;
    let request = service(&state)
        .request_collection(branch_id, Some(auth.id), body.notes.as_deref())
        .await?;
    created("Collection requested", "request", &request)
}

#[instrument(skip(auth, state), fields(request_id = %id))]
async fn approve_collection(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CollectionRequestId>,
) -> ApiResult {
    auth.require_roles(FACTORY)?;
    let (request, bin) = service(&state).approve_collection(id).await?;
    with_extra(
        ok("Collection approved and bin emptied", "request", &request),
        &[("bin", to_json(&bin)?)],
    )
}

#[instrument(skip(auth, state), fields(request_id = %id))]
async fn reject_collection(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CollectionRequestId>,
) -> ApiResult {
    auth.require_roles(FACTORY)?;
    let request = service(&state).reject_collection(id).await?;
    ok("Collection rejected", "request", &request)
}

#[instrument(skip(auth, state), fields(request_id = %id))]
async fn complete_collection(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CollectionRequestId>,
) -> ApiResult {
    auth.require_roles(FACTORY)?;
    let request = service(&state).complete_collection(id).await?;
    ok("Collection completed", "request", &request)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use aquacycle_core::UserId;

    use super::*;

    fn query() -> RequestQuery {
        RequestQuery {
            branch_id: Some(BranchId::new(5)),
            status: None,
        }
    }

    #[test]
    fn test_customer_filter_is_own_requests() {
        let customer = AuthUser {
            id: UserId::new(12),
            role: Role::Customer,
            branch_id: None,
        };
        let filter = query().filter(&customer).unwrap();
        assert_eq!(filter.user_id, Some(UserId::new(12)));
        assert_eq!(filter.branch_id, Some(BranchId::new(5)));
    }

    #[test]
    fn test_branch_manager_filter_rejects_other_branch() {
        let manager = AuthUser {
            id: UserId::new(3),
            role: Role::BranchManager,
            branch_id: Some(BranchId::new(2)),
        };
        assert!(matches!(query().filter(&manager), Err(AppError::Forbidden(_))));
    }
}
