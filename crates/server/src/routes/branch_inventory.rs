//! Branch inventory ledgers and branch requests for factory stock.

use axum::{
    Router,
    extract::State,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use aquacycle_core::{
    BranchId, BranchInventoryItemId, FactoryRequestId, FactoryRequestStatus, Role,
    stock::LineItem,
};

use super::{ApiJson, ApiPath, ApiQuery, ApiResult, created, done, ok, to_json, with_extra};
use crate::db::{BranchInventoryRepository, FactoryRequestRepository};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::services::InventoryService;
use crate::state::AppState;

const READERS: &[Role] = &[Role::Admin, Role::FactoryManager, Role::BranchManager];
const BRANCH_STAFF: &[Role] = &[Role::Admin, Role::BranchManager];
const SELLERS: &[Role] = &[Role::Admin, Role::BranchManager, Role::Customer];
const FACTORY_DECIDERS: &[Role] = &[Role::Admin, Role::FactoryManager];

/// Build the branch inventory router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/BranchInventory/{branch_id}", get(list_branch_items))
        .route("/BranchInventory/{branch_id}/initialize", post(initialize))
        .route("/BranchInventory/{branch_id}/sync", post(sync))
        .route("/BranchInventory/{branch_id}/purchase", post(purchase))
        .route(
            "/BranchInventory/item/{id}",
            get(get_branch_item)
                .put(update_branch_item)
                .delete(delete_branch_item),
        )
        .route(
            "/FactoryRequests",
            get(list_factory_requests).post(create_factory_request),
        )
        .route("/FactoryRequests/{id}/approve", put(approve_factory_request))
        .route("/FactoryRequests/{id}/reject", put(reject_factory_request))
}

/// Body of a branch row update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelsRequest {
    pub quantity: i32,
    pub min_stock_level: i32,
    pub max_stock_level: i32,
}

/// Body of a purchase.
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    #[serde(default)]
    pub items: Vec<LineItem>,
}

/// Query parameters for factory request lists.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactoryRequestQuery {
    pub branch_id: Option<BranchId>,
    pub status: Option<FactoryRequestStatus>,
}

/// Body of a factory request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactoryRequestBody {
    pub branch_id: Option<BranchId>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub notes: Option<String>,
}

// =============================================================================
// Branch ledger
// =============================================================================

#[instrument(skip(auth, state), fields(branch_id = %branch_id))]
async fn list_branch_items(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(branch_id): ApiPath<BranchId>,
) -> ApiResult {
    auth.require_roles(READERS)?;
    let branch_id = auth.branch_scope(Some(branch_id))?;
    let items = BranchInventoryRepository::new(state.pool())
        .list(branch_id)
        .await?;
    ok("Branch inventory retrieved", "items", &items)
}

#[instrument(skip(auth, state), fields(branch_id = %branch_id))]
async fn initialize(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(branch_id): ApiPath<BranchId>,
) -> ApiResult {
    auth.require_roles(BRANCH_STAFF)?;
    let branch_id = auth.branch_scope(Some(branch_id))?;
    let service = InventoryService::new(state.pool());
    let created_rows = service.initialize_branch(branch_id).await?;
    let items = BranchInventoryRepository::new(state.pool())
        .list(branch_id)
        .await?;
    with_extra(
        ok("Branch inventory initialized", "items", &items),
        &[("created", json!(created_rows))],
    )
}

#[instrument(skip(auth, state), fields(branch_id = %branch_id))]
async fn sync(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(branch_id): ApiPath<BranchId>,
) -> ApiResult {
    auth.require_roles(BRANCH_STAFF)?;
    let branch_id = auth.branch_scope(Some(branch_id))?;
    let synced = InventoryService::new(state.pool())
        .sync_branch(branch_id)
        .await?;
    let items = BranchInventoryRepository::new(state.pool())
        .list(branch_id)
        .await?;
    with_extra(
        ok("Branch inventory synced", "items", &items),
        &[("synced", json!(synced))],
    )
}

#[instrument(skip(auth, state, body), fields(branch_id = %branch_id))]
async fn purchase(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(branch_id): ApiPath<BranchId>,
    ApiJson(body): ApiJson<PurchaseRequest>,
) -> ApiResult {
    auth.require_roles(SELLERS)?;
    let branch_id = if auth.role == Role::Customer {
        branch_id
    } else {
        auth.branch_scope(Some(branch_id))?
    };
    let outcomes = InventoryService::new(state.pool())
        .purchase(branch_id, &body.items)
        .await?;
    ok("Purchase completed", "items", &outcomes)
}

#[instrument(skip(auth, state), fields(item_id = %id))]
async fn get_branch_item(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BranchInventoryItemId>,
) -> ApiResult {
    auth.require_roles(READERS)?;
    let item = BranchInventoryRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("branch inventory item"))?;
    auth.branch_scope(Some(item.branch_id))?;
    ok("Branch inventory item retrieved", "item", &item)
}

#[instrument(skip(auth, state, body), fields(item_id = %id))]
async fn update_branch_item(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BranchInventoryItemId>,
    ApiJson(body): ApiJson<LevelsRequest>,
) -> ApiResult {
    auth.require_roles(BRANCH_STAFF)?;
    let item = InventoryService::new(state.pool())
        .update_branch_item(id, body.quantity, body.min_stock_level, body.max_stock_level)
        .await?;
    ok("Branch inventory item updated", "item", &item)
}

#[instrument(skip(auth, state), fields(item_id = %id))]
async fn delete_branch_item(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BranchInventoryItemId>,
) -> ApiResult {
    auth.require_roles(BRANCH_STAFF)?;
    InventoryService::new(state.pool())
        .delete_branch_item(id)
        .await?;
    done("Branch inventory item deleted")
}

// =============================================================================
// Factory requests
// =============================================================================

#[instrument(skip(auth, state))]
async fn list_factory_requests(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<FactoryRequestQuery>,
) -> ApiResult {
    auth.require_roles(READERS)?;
    let branch_id = if auth.role == Role::BranchManager {
        Some(auth.branch_scope(query.branch_id)?)
    } else {
        query.branch_id
    };
    let requests = FactoryRequestRepository::new(state.pool())
        .list(branch_id, query.status)
        .await?;
    ok("Factory requests retrieved", "requests", &requests)
}

#[instrument(skip(auth, state, body))]
async fn create_factory_request(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<FactoryRequestBody>,
) -> ApiResult {
    auth.require_roles(BRANCH_STAFF)?;
    let branch_id = auth.branch_scope(body.branch_id)?;
    let request = InventoryService::new(state.pool())
        .create_factory_request(branch_id, &body.items, Some(auth.id), body.notes.as_deref())
        .await?;
    created("Factory request created", "request", &request)
}

#[instrument(skip(auth, state), fields(request_id = %id))]
async fn approve_factory_request(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<FactoryRequestId>,
) -> ApiResult {
    auth.require_roles(FACTORY_DECIDERS)?;
    let (request, outcomes) = InventoryService::new(state.pool())
        .approve_factory_request(id)
        .await?;
    with_extra(
        ok("Factory request approved", "request", &request),
        &[("items", to_json(&outcomes)?)],
    )
}

#[instrument(skip(auth, state), fields(request_id = %id))]
async fn reject_factory_request(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<FactoryRequestId>,
) -> ApiResult {
    auth.require_roles(FACTORY_DECIDERS)?;
    let request = InventoryService::new(state.pool())
        .reject_factory_request(id)
        .await?;
    ok("Factory request rejected", "request", &request)
}
