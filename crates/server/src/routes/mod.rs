//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness
//! GET  /health/ready                        - Database ping
//!
//! # Auth
//! POST /auth/login                          - Password login, returns a bearer token
//! POST /auth/register                       - Create an account (Admin)
//!
//! # Factory ledger
//! GET  /Inventory                           - List, optional ?status=
//! POST /Inventory                           - Add catalog item
//! GET  /Inventory/low-stock                 - Items at or below minimum
//! GET|PUT|DELETE /Inventory/{id}
//! PUT  /Inventory/{id}/adjust               - Signed quantity delta
//!
//! # Orders
//! GET|POST /Orders
//! GET|DELETE /Orders/{id}
//! PUT  /Orders/{id}/accept                  - Reserve stock, Pending -> Accepted
//! PUT  /Orders/{id}/status
//! GET|POST /BranchOrders
//! GET|DELETE /BranchOrders/{id}
//! PUT  /BranchOrders/{id}/status
//! PUT  /BranchOrders/{id}/assign-driver
//!
//! # Branch ledgers
//! GET  /BranchInventory/{branchId}
//! POST /BranchInventory/{branchId}/initialize
//! POST /BranchInventory/{branchId}/sync
//! POST /BranchInventory/{branchId}/purchase
//! PUT|DELETE /BranchInventory/item/{id}
//! GET|POST /FactoryRequests
//! PUT  /FactoryRequests/{id}/approve|reject
//!
//! # Delivery
//! POST /Delivery/factory/{orderId}
//! POST /Delivery/branch/{branchOrderId}
//! POST /Delivery/process
//! GET  /Delivery/pending
//!
//! # Drivers
//! GET|POST /Drivers
//! GET|PUT|DELETE /Drivers/{id}
//! PUT  /Drivers/{id}/status
//! GET  /Drivers/{id}/payroll?month=&year=
//!
//! # Recycling
//! GET|POST /RecyclingBins
//! GET  /RecyclingBins/notifications
//! GET  /RecyclingBins/branch/{branchId}
//! PUT  /RecyclingBins/{id}
//! GET|POST /RecyclingRequests
//! GET  /RecyclingRequests/{id}
//! PUT  /RecyclingRequests/{id}/approve|reject|complete
//! GET|POST /RecyclingRequests/collection    (also /CollectionRequests)
//! PUT  /RecyclingRequests/collection/{id}/approve|reject|complete
//!
//! # Emergency
//! GET|POST /emergency-requests
//! GET  /emergency-requests/{id}
//! PUT  /emergency-requests/{id}/status
//! PUT  /emergency-requests/{id}/assign-driver
//! GET  /driver-bonuses
//! PUT  /driver-bonuses/{id}/paid
//!
//! # Organisation
//! /branches, /employees, /users             - CRUD
//! ```
//!
//! Successful responses use the envelope
//! `{"success": true, "message": ..., <payloadKey>: ...}`.

use std::time::Duration;

use axum::{
    Json, Router,
    extract::{FromRequest, FromRequestParts},
    http::{HeaderName, HeaderValue, Method, Request, Response, StatusCode, header},
    middleware::from_fn,
};
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::error::AppError;
use crate::middleware::{REQUEST_ID_HEADER, request_id_middleware};
use crate::services::StatusUpdate;
use crate::state::AppState;

pub mod auth;
pub mod branch_inventory;
pub mod delivery;
pub mod drivers;
pub mod emergency;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod organization;
pub mod recycling;

/// Every API route, without the outer middleware stack.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(inventory::router())
        .merge(orders::router())
        .merge(branch_inventory::router())
        .merge(delivery::router())
        .merge(drivers::router())
        .merge(recycling::router())
        .merge(emergency::router())
        .merge(organization::router())
}

/// The API with its state attached and the request middleware applied.
///
/// Layer order, outermost first: CORS, `http_request` trace span, request id.
/// Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(state.config().cors_origin.as_deref());

    routes()
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    span.record(
                        "latency_ms",
                        u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                    );
                    DefaultOnResponse::default().on_response(response, latency, span);
                }),
        )
        .layer(cors)
        .with_state(state)
}

/// CORS for the dashboard. Without a configured origin, cross-origin
/// requests are not allowed.
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)]);

    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "ignoring invalid CORS origin");
            layer
        }
        None => layer,
    }
}

/// JSON body extractor whose rejection uses the error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejection uses the error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Path extractor whose rejection uses the error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Handler result: status code and envelope body.
pub type ApiResult = Result<(StatusCode, Json<Value>), AppError>;

pub(crate) fn to_json<T: Serialize>(payload: &T) -> Result<Value, AppError> {
    serde_json::to_value(payload).map_err(|e| AppError::Internal(e.to_string()))
}

fn envelope<T: Serialize>(
    status: StatusCode,
    message: &str,
    key: &str,
    payload: &T,
) -> ApiResult {
    let mut body = json!({ "success": true, "message": message });
    body[key] = to_json(payload)?;
    Ok((status, Json(body)))
}

/// `200` with `payload` under `key`.
pub(crate) fn ok<T: Serialize>(message: &str, key: &str, payload: &T) -> ApiResult {
    envelope(StatusCode::OK, message, key, payload)
}

/// `201` with `payload` under `key`.
pub(crate) fn created<T: Serialize>(message: &str, key: &str, payload: &T) -> ApiResult {
    envelope(StatusCode::CREATED, message, key, payload)
}

/// `200` with only a message.
pub(crate) fn done(message: &str) -> ApiResult {
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": message })),
    ))
}

/// Add extra top-level keys to a successful envelope.
pub(crate) fn with_extra(result: ApiResult, extra: &[(&str, Value)]) -> ApiResult {
    let (status, Json(mut body)) = result?;
    for (key, value) in extra {
        body[*key] = value.clone();
    }
    Ok((status, Json(body)))
}

/// `200` with the record under `key`, its line outcomes under `items` and
/// any released driver under `driver`.
pub(crate) fn status_update<T: Serialize>(
    message: &str,
    key: &str,
    update: &StatusUpdate<T>,
) -> ApiResult {
    let mut extra = vec![("items", to_json(&update.items)?)];
    if let Some(driver) = &update.driver {
        extra.push(("driver", to_json(driver)?));
    }
    with_extra(ok(message, key, &update.record), &extra)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let (status, Json(body)) = created("Order created", "order", &json!({"id": 1})).unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Order created");
        assert_eq!(body["order"]["id"], 1);
    }

    #[test]
    fn test_with_extra_keys() {
        let result = with_extra(ok("Done", "items", &Vec::<i32>::new()), &[("count", json!(0))]);
        let (_, Json(body)) = result.unwrap();
        assert_eq!(body["items"], json!([]));
        assert_eq!(body["count"], 0);
    }
}
