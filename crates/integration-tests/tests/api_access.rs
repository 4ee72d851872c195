//! Authentication and role allow-lists through the full router.

#![allow(clippy::unwrap_used)]

use aquacycle_core::Role;
use aquacycle_integration_tests::TestApp;
use axum::http::{Method, StatusCode};

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let resp = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.text, "ok");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new();
    let request = axum::http::Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-abc-123")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = app.dispatch(request).await;
    assert_eq!(resp.headers["x-request-id"], "trace-abc-123");
}

#[tokio::test]
async fn test_request_id_is_generated() {
    let app = TestApp::new();
    let resp = app.send(Method::GET, "/health", None, None).await;
    let id = resp.headers["x-request-id"].to_str().unwrap();
    assert_eq!(id.len(), 36, "expected a UUID, got {id}");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new();
    for uri in ["/Inventory", "/Orders", "/Drivers", "/emergency-requests", "/users"] {
        let resp = app.send(Method::GET, uri, None, None).await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(resp.error_message(), "authentication required");
    }
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let app = TestApp::new();
    let resp = app
        .send(Method::GET, "/Inventory", Some("not-a-jwt"), None)
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.body["success"], false);
}

#[tokio::test]
async fn test_expired_token_is_unauthorized() {
    let app = TestApp::new();
    let token = app.token_with_expiry(Role::Admin, None, -3600);
    let resp = app.send(Method::GET, "/Inventory", Some(&token), None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_roles_outside_allow_list_are_forbidden() {
    let app = TestApp::new();
    let cases = [
        (Role::Customer, Method::GET, "/Inventory"),
        (Role::Driver, Method::POST, "/Orders"),
        (Role::FireBrigade, Method::GET, "/Drivers"),
        (Role::Customer, Method::GET, "/RecyclingBins"),
        (Role::Customer, Method::POST, "/emergency-requests"),
        (Role::FactoryManager, Method::GET, "/users"),
        (Role::Driver, Method::PUT, "/driver-bonuses/1/paid"),
        (Role::BranchManager, Method::PUT, "/CollectionRequests/1/approve"),
    ];
    for (role, method, uri) in cases {
        let token = app.token(role, Some(1));
        let resp = app.send(method.clone(), uri, Some(&token), Some("{}")).await;
        assert_eq!(resp.status, StatusCode::FORBIDDEN, "{role} {method} {uri}");
        assert_eq!(resp.body["success"], false);
    }
}

#[tokio::test]
async fn test_branch_manager_cannot_order_for_another_branch() {
    let app = TestApp::new();
    let token = app.token(Role::BranchManager, Some(1));
    let resp = app
        .send(
            Method::POST,
            "/BranchOrders",
            Some(&token),
            Some(r#"{"branchId": 2, "items": [{"itemName": "Clay Pot Filter", "quantity": 3}]}"#),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_driver_may_only_complete_emergencies() {
    let app = TestApp::new();
    let token = app.token(Role::Driver, None);
    let resp = app
        .send(
            Method::PUT,
            "/emergency-requests/1/status",
            Some(&token),
            Some(r#"{"status": "Approved"}"#),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cors_preflight_allows_dashboard_origin() {
    let app = TestApp::new();
    let request = axum::http::Request::builder()
        .method(Method::OPTIONS)
        .uri("/Orders")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = app.dispatch(request).await;
    assert_eq!(
        resp.headers["access-control-allow-origin"],
        "http://localhost:3000"
    );
}
