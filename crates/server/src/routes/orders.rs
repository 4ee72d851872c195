//! Factory order and branch order routes.

use axum::{
    Router,
    extract::State,
    routing::{get, put},
};
use serde::Deserialize;
use tracing::instrument;

use aquacycle_core::{BranchId, BranchOrderId, DriverId, OrderId, OrderStatus, Role, stock::LineItem};

use super::{ApiJson, ApiPath, ApiQuery, ApiResult, created, done, ok, status_update, to_json, with_extra};
use crate::db::orders::OrderFilter;
use crate::db::{BranchOrderRepository, OrderRepository};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::BranchOrder;
use crate::services::OrderService;
use crate::state::AppState;

const ORDER_READERS: &[Role] = &[Role::Admin, Role::FactoryManager, Role::BranchManager];
const ORDER_WRITERS: &[Role] = &[Role::Admin, Role::FactoryManager];

const BRANCH_ORDER_READERS: &[Role] = &[
    Role::Admin,
    Role::FactoryManager,
    Role::BranchManager,
    Role::Driver,
];
const BRANCH_ORDER_CREATORS: &[Role] = &[Role::Admin, Role::BranchManager];
const BRANCH_ORDER_STATUS_WRITERS: &[Role] = &[
    Role::Admin,
    Role::FactoryManager,
    Role::BranchManager,
    Role::Driver,
];
const DISPATCHERS: &[Role] = &[Role::Admin, Role::FactoryManager, Role::BranchManager];

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/Orders", get(list_orders).post(create_order))
        .route("/Orders/{id}", get(get_order).delete(delete_order))
        .route("/Orders/{id}/accept", put(accept_order))
        .route("/Orders/{id}/status", put(update_order_status))
        .route("/BranchOrders", get(list_branch_orders).post(create_branch_order))
        .route(
            "/BranchOrders/{id}",
            get(get_branch_order).delete(delete_branch_order),
        )
        .route("/BranchOrders/{id}/status", put(update_branch_order_status))
        .route("/BranchOrders/{id}/assign-driver", put(assign_driver))
}

/// Query parameters for order lists.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<OrderStatus>,
    pub branch_id: Option<BranchId>,
}

/// Body of order creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub branch_id: Option<BranchId>,
    pub notes: Option<String>,
}

/// Body of a status change.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

/// Body of a driver assignment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignDriverRequest {
    pub driver_id: DriverId,
}

/// Branch staff only see their own branch.
fn scoped_branch(auth: &AuthUser, requested: Option<BranchId>) -> Option<BranchId> {
    if auth.role == Role::BranchManager {
        auth.branch_id.or(requested)
    } else {
        requested
    }
}

/// Branch managers may only touch records of their own branch.
fn ensure_own_branch(auth: &AuthUser, branch_id: Option<BranchId>) -> Result<(), AppError> {
    if auth.role == Role::BranchManager && (auth.branch_id.is_none() || auth.branch_id != branch_id) {
        return Err(AppError::Forbidden(
            "branch managers may only act on their own branch".to_owned(),
        ));
    }
    Ok(())
}

/// Load a branch order and check the caller may act on it.
async fn scoped_branch_order(
    auth: &AuthUser,
    state: &AppState,
    id: BranchOrderId,
) -> Result<BranchOrder, AppError> {
    let order = BranchOrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("branch order"))?;
    ensure_own_branch(auth, Some(order.branch_id))?;
    Ok(order)
}

// =============================================================================
// Factory orders
// =============================================================================

#[instrument(skip(auth, state))]
async fn list_orders(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult {
    auth.require_roles(ORDER_READERS)?;
    let filter = OrderFilter {
        status: query.status,
        branch_id: scoped_branch(&auth, query.branch_id),
    };
    let orders = OrderRepository::new(state.pool()).list(&filter).await?;
    with_extra(
        ok("Orders retrieved", "orders", &orders),
        &[("count", to_json(&orders.len())?)],
    )
}

#[instrument(skip(auth, state), fields(order_id = %id))]
async fn get_order(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
) -> ApiResult {
    auth.require_roles(ORDER_READERS)?;
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("order"))?;
    ensure_own_branch(&auth, order.branch_id)?;
    ok("Order retrieved", "order", &order)
}

#[instrument(skip(auth, state, body))]
async fn create_order(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateOrderRequest>,
) -> ApiResult {
    auth.require_roles(ORDER_WRITERS)?;
    let order = OrderService::new(state.pool())
        .create_order(&body.items, body.branch_id, body.notes.as_deref())
        .await?;
    created("Order created", "order", &order)
}

#[instrument(skip(auth, state), fields(order_id = %id))]
async fn accept_order(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
) -> ApiResult {
    auth.require_roles(ORDER_WRITERS)?;
    let update = OrderService::new(state.pool()).accept_order(id).await?;
    status_update("Order accepted and inventory reserved", "order", &update)
}

#[instrument(skip(auth, state, body), fields(order_id = %id, status = %body.status))]
async fn update_order_status(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> ApiResult {
    auth.require_roles(ORDER_WRITERS)?;
    let update = OrderService::new(state.pool())
        .update_order_status(id, body.status)
        .await?;
    status_update("Order status updated", "order", &update)
}

#[instrument(skip(auth, state), fields(order_id = %id))]
async fn delete_order(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
) -> ApiResult {
    auth.require_roles(ORDER_WRITERS)?;
    OrderService::new(state.pool()).delete_order(id).await?;
    done("Order deleted")
}

// =============================================================================
// Branch orders
// =============================================================================

#[instrument(skip(auth, state))]
async fn list_branch_orders(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult {
    auth.require_roles(BRANCH_ORDER_READERS)?;
    let orders = BranchOrderRepository::new(state.pool())
        .list(scoped_branch(&auth, query.branch_id), query.status)
        .await?;
    with_extra(
        ok("Branch orders retrieved", "orders", &orders),
        &[("count", to_json(&orders.len())?)],
    )
}

#[instrument(skip(auth, state), fields(branch_order_id = %id))]
async fn get_branch_order(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BranchOrderId>,
) -> ApiResult {
    auth.require_roles(BRANCH_ORDER_READERS)?;
    let order = scoped_branch_order(&auth, &state, id).await?;
    ok("Branch order retrieved", "order", &order)
}

#[instrument(skip(auth, state, body))]
async fn create_branch_order(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateOrderRequest>,
) -> ApiResult {
    auth.require_roles(BRANCH_ORDER_CREATORS)?;
    let branch_id = auth.branch_scope(body.branch_id)?;
    let (branch_order, factory_order) = OrderService::new(state.pool())
        .create_branch_order(branch_id, &body.items, body.notes.as_deref())
        .await?;
    with_extra(
        created("Branch order created", "order", &branch_order),
        &[("factoryOrder", to_json(&factory_order)?)],
    )
}

#[instrument(skip(auth, state, body), fields(branch_order_id = %id, status = %body.status))]
async fn update_branch_order_status(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BranchOrderId>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> ApiResult {
    auth.require_roles(BRANCH_ORDER_STATUS_WRITERS)?;
    scoped_branch_order(&auth, &state, id).await?;
    let update = OrderService::new(state.pool())
        .update_branch_order_status(id, body.status)
        .await?;
    status_update("Branch order status updated", "order", &update)
}

#[instrument(skip(auth, state, body), fields(branch_order_id = %id, driver_id = %body.driver_id))]
async fn assign_driver(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BranchOrderId>,
    ApiJson(body): ApiJson<AssignDriverRequest>,
) -> ApiResult {
    auth.require_roles(DISPATCHERS)?;
    scoped_branch_order(&auth, &state, id).await?;
    let (order, driver) = OrderService::new(state.pool())
        .assign_driver(id, body.driver_id)
        .await?;
    with_extra(
        ok("Driver assigned", "order", &order),
        &[("driver", to_json(&driver)?)],
    )
}

#[instrument(skip(auth, state), fields(branch_order_id = %id))]
async fn delete_branch_order(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BranchOrderId>,
) -> ApiResult {
    auth.require_roles(BRANCH_ORDER_CREATORS)?;
    scoped_branch_order(&auth, &state, id).await?;
    OrderService::new(state.pool()).delete_branch_order(id).await?;
    done("Branch order deleted")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use aquacycle_core::UserId;

    #[test]
    fn test_branch_manager_list_is_pinned_to_own_branch() {
        let manager = AuthUser {
            id: UserId::new(1),
            role: Role::BranchManager,
            branch_id: Some(BranchId::new(4)),
        };
        assert_eq!(
            scoped_branch(&manager, Some(BranchId::new(9))),
            Some(BranchId::new(4))
        );

        let factory = AuthUser {
            id: UserId::new(2),
            role: Role::FactoryManager,
            branch_id: None,
        };
        assert_eq!(scoped_branch(&factory, None), None);
        assert_eq!(
            scoped_branch(&factory, Some(BranchId::new(9))),
            Some(BranchId::new(9))
        );
    }

    #[test]
    fn test_branch_manager_is_confined_to_own_branch_records() {
        let manager = AuthUser {
            id: UserId::new(1),
            role: Role::BranchManager,
            branch_id: Some(BranchId::new(4)),
        };
        assert!(ensure_own_branch(&manager, Some(BranchId::new(4))).is_ok());
        assert!(matches!(
            ensure_own_branch(&manager, Some(BranchId::new(9))),
            Err(AppError::Forbidden(_))
        ));
        // Direct factory orders carry no branch
        assert!(ensure_own_branch(&manager, None).is_err());

        let unpinned = AuthUser {
            id: UserId::new(3),
            role: Role::BranchManager,
            branch_id: None,
        };
        assert!(ensure_own_branch(&unpinned, Some(BranchId::new(4))).is_err());

        for role in [Role::Admin, Role::FactoryManager, Role::Driver] {
            let user = AuthUser {
                id: UserId::new(2),
                role,
                branch_id: None,
            };
            assert!(ensure_own_branch(&user, Some(BranchId::new(9))).is_ok(), "{role}");
            assert!(ensure_own_branch(&user, None).is_ok(), "{role}");
        }
    }

    #[test]
    fn test_status_request_rejects_unknown_status() {
        assert!(serde_json::from_str::<StatusRequest>(r#"{"status": "Lost"}"#).is_err());
        let body: StatusRequest = serde_json::from_str(r#"{"status": "Shipped"}"#).unwrap();
        assert_eq!(body.status, OrderStatus::Shipped);
    }
}
