//! Request validation that rejects input before any database work.

#![allow(clippy::unwrap_used)]

use aquacycle_core::Role;
use aquacycle_integration_tests::TestApp;
use axum::http::{Method, StatusCode};

#[tokio::test]
async fn test_unknown_order_status_is_rejected() {
    let app = TestApp::new();
    let token = app.token(Role::Admin, None);
    let resp = app
        .send(
            Method::PUT,
            "/Orders/7/status",
            Some(&token),
            Some(r#"{"status": "Teleported"}"#),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.error_message().contains("Teleported"), "{}", resp.text);
}

#[tokio::test]
async fn test_malformed_json_uses_error_envelope() {
    let app = TestApp::new();
    let token = app.token(Role::FactoryManager, None);
    let resp = app
        .send(Method::POST, "/Inventory", Some(&token), Some("{not json"))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["success"], false);
}

#[tokio::test]
async fn test_non_numeric_path_id_is_bad_request() {
    let app = TestApp::new();
    let token = app.token(Role::Admin, None);
    for uri in ["/Orders/abc", "/Drivers/first", "/RecyclingRequests/x1"] {
        let resp = app.send(Method::GET, uri, Some(&token), None).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(resp.body["success"], false, "{uri}");
    }
}

#[tokio::test]
async fn test_payroll_month_out_of_range() {
    let app = TestApp::new();
    let token = app.token(Role::Admin, None);
    let resp = app
        .send(
            Method::GET,
            "/Drivers/3/payroll?month=13&year=2026",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["errors"][0]["field"], "month");
}

#[tokio::test]
async fn test_payroll_month_must_be_numeric() {
    let app = TestApp::new();
    let token = app.token(Role::Admin, None);
    let resp = app
        .send(Method::GET, "/Drivers/3/payroll?month=March", Some(&token), None)
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_emergency_request_requires_location_and_description() {
    let app = TestApp::new();
    let token = app.token(Role::FireBrigade, None);
    let resp = app
        .send(
            Method::POST,
            "/emergency-requests",
            Some(&token),
            Some(r#"{"location": " ", "bonusAmount": "-5"}"#),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "location is required");

    let fields: Vec<&str> = resp.body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["location", "description", "bonusAmount"]);
}

#[tokio::test]
async fn test_recycling_weight_must_be_positive() {
    let app = TestApp::new();
    let token = app.token(Role::Customer, None);
    let resp = app
        .send(
            Method::POST,
            "/RecyclingRequests",
            Some(&token),
            Some(r#"{"branchId": 1, "wasteWeight": 0}"#),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["errors"][0]["field"], "wasteWeight");
}

#[tokio::test]
async fn test_branch_order_without_branch_is_rejected() {
    let app = TestApp::new();
    let token = app.token(Role::Admin, None);
    let resp = app
        .send(
            Method::POST,
            "/BranchOrders",
            Some(&token),
            Some(r#"{"items": [{"itemName": "RO Membrane", "quantity": 2}]}"#),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["errors"][0]["field"], "branchId");
}

#[tokio::test]
async fn test_login_requires_credentials_body() {
    let app = TestApp::new();
    let resp = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(r#"{"email": "admin@aquacycle.lk"}"#),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.error_message().contains("password"), "{}", resp.text);
}

#[tokio::test]
async fn test_order_total_beyond_quantity_range_is_rejected() {
    let app = TestApp::new();
    let token = app.token(Role::Admin, None);
    let body = r#"{"items": [
        {"itemName": "RO Membrane", "quantity": 2147483647},
        {"itemName": "RO Membrane", "quantity": 1073741826},
        {"itemName": "UV Lamp Module", "quantity": 1073741824}
    ]}"#;
    let resp = app.send(Method::POST, "/Orders", Some(&token), Some(body)).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{}", resp.text);
    assert_eq!(resp.body["errors"][0]["field"], "items");
}
