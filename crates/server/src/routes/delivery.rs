//! Delivery processing routes.

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use aquacycle_core::{BranchOrderId, OrderId, Role};

use super::{ApiJson, ApiPath, ApiResult, ok, with_extra};
use crate::middleware::AuthUser;
use crate::models::{DeliveryReport, DeliveryType};
use crate::services::DeliveryService;
use crate::state::AppState;

const SHIPPERS: &[Role] = &[Role::Admin, Role::FactoryManager, Role::Driver];
const RECEIVERS: &[Role] = &[Role::Admin, Role::BranchManager, Role::Driver];
const VIEWERS: &[Role] = &[
    Role::Admin,
    Role::FactoryManager,
    Role::BranchManager,
    Role::Driver,
];

/// Build the delivery router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/Delivery/factory/{order_id}", post(process_factory))
        .route("/Delivery/branch/{branch_order_id}", post(process_branch))
        .route("/Delivery/process", post(process))
        .route("/Delivery/pending", get(pending))
}

/// Body of the combined delivery endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub order_id: i32,
    pub delivery_type: DeliveryType,
}

fn report(report: &DeliveryReport) -> ApiResult {
    let message = if report.is_partial() {
        "Delivery processed with item failures"
    } else {
        "Delivery processed"
    };
    with_extra(
        ok(message, "delivery", report),
        &[("partial", json!(report.is_partial()))],
    )
}

#[instrument(skip(auth, state), fields(order_id = %id))]
async fn process_factory(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
) -> ApiResult {
    auth.require_roles(SHIPPERS)?;
    let delivery = DeliveryService::new(state.pool()).process_factory(id).await?;
    report(&delivery)
}

#[instrument(skip(auth, state), fields(branch_order_id = %id))]
async fn process_branch(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BranchOrderId>,
) -> ApiResult {
    auth.require_roles(RECEIVERS)?;
    let delivery = DeliveryService::new(state.pool()).process_branch(id).await?;
    report(&delivery)
}

#[instrument(skip(auth, state, body), fields(order_id = body.order_id, delivery_type = ?body.delivery_type))]
async fn process(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ProcessRequest>,
) -> ApiResult {
    match body.delivery_type {
        DeliveryType::Factory => auth.require_roles(SHIPPERS)?,
        DeliveryType::Branch => auth.require_roles(RECEIVERS)?,
    }
    let delivery = DeliveryService::new(state.pool())
        .process(body.order_id, body.delivery_type)
        .await?;
    report(&delivery)
}

#[instrument(skip(auth, state))]
async fn pending(auth: AuthUser, State(state): State<AppState>) -> ApiResult {
    auth.require_roles(VIEWERS)?;
    let deliveries = DeliveryService::new(state.pool()).pending().await?;
    ok("Pending deliveries retrieved", "deliveries", &deliveries)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_process_request_parses_delivery_type() {
        let body: ProcessRequest =
            serde_json::from_str(r#"{"orderId": 7, "deliveryType": "branch"}"#).unwrap();
        assert_eq!(body.order_id, 7);
        assert_eq!(body.delivery_type, DeliveryType::Branch);

        assert!(
            serde_json::from_str::<ProcessRequest>(r#"{"orderId": 7, "deliveryType": "drone"}"#)
                .is_err()
        );
    }
}
