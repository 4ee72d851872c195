//! Stock, order and dispatch workflows against a real `PostgreSQL`.
//!
//! Run with: cargo test -p aquacycle-integration-tests --features postgres --test lifecycle_postgres
//!
//! Each test starts its own container and runs the server migrations, so
//! document numbers and catalog names never collide between tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::time::Duration;

use axum::http::{Method, StatusCode};
use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use testcontainers::{
    ContainerAsync, GenericImage, ImageExt,
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
};

use aquacycle_core::{
    BonusState, BranchId, DomainError, DriverStatus, EmergencyStatus, OrderStatus, RequestStatus,
    Role, StockStatus, effect::SideEffectKey, emergency::DEFAULT_BONUS_AMOUNT, geo::GeoDirectory,
    stock::LineItem,
};
use aquacycle_integration_tests::TestApp;
use aquacycle_server::{
    db::{
        self, BinRepository, BonusRepository, BranchInventoryRepository, BranchOrderRepository,
        BranchRepository, DriverRepository, InventoryRepository, OrderRepository,
        bonuses::BonusFilter, branches::BranchFields, drivers::DriverFields,
        inventory::NewInventoryItem, side_effects,
    },
    error::AppError,
    models::{Driver, Outcome},
    services::{
        DriverService, EmergencyInput, EmergencyService, OrderService, RecyclingService,
    },
};

/// A migrated database that lives as long as its container.
struct Database {
    _container: ContainerAsync<GenericImage>,
    pool: PgPool,
}

async fn start_database() -> Database {
    // PostgreSQL logs readiness once for the init run and once for real.
    let image = GenericImage::new("postgres", "16")
        .with_exposed_port(5432.tcp())
        .with_wait_for(WaitFor::message_on_stdout(
            "database system is ready to accept connections",
        ));

    let container = image
        .with_env_var("POSTGRES_USER", "aquacycle")
        .with_env_var("POSTGRES_PASSWORD", "aquacycle")
        .with_env_var("POSTGRES_DB", "aquacycle")
        .with_startup_timeout(Duration::from_secs(60))
        .start()
        .await
        .expect("Failed to start postgres container");

    tokio::time::sleep(Duration::from_secs(1)).await;

    let host = container.get_host().await.expect("container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("mapped port");
    let url = SecretString::from(format!(
        "postgres://aquacycle:aquacycle@{host}:{port}/aquacycle"
    ));

    let pool = db::create_pool(&url).await.expect("connect");
    sqlx::migrate!("../server/migrations")
        .run(&pool)
        .await
        .expect("migrations");

    Database {
        _container: container,
        pool,
    }
}

// =============================================================================
// Fixtures
// =============================================================================

async fn branch(pool: &PgPool, name: &str) -> BranchId {
    BranchRepository::new(pool)
        .create(&BranchFields {
            name: name.to_owned(),
            location: "Colombo".to_owned(),
            latitude: None,
            longitude: None,
            phone: None,
        })
        .await
        .unwrap()
        .id
}

async fn factory_item(pool: &PgPool, name: &str, quantity: i32, unit: &str, min: i32, max: i32) {
    InventoryRepository::new(pool)
        .create(&NewInventoryItem {
            name: name.to_owned(),
            quantity,
            unit: unit.to_owned(),
            min_stock_level: min,
            max_stock_level: max,
        })
        .await
        .unwrap();
}

async fn factory_quantity(pool: &PgPool, name: &str) -> i32 {
    InventoryRepository::new(pool)
        .list(None)
        .await
        .unwrap()
        .into_iter()
        .find(|item| item.name == name)
        .map(|item| item.quantity)
        .expect("factory item")
}

async fn driver(pool: &PgPool, branch_id: BranchId) -> Driver {
    DriverService::new(pool)
        .create(&DriverFields {
            name: "Nimal Perera".to_owned(),
            phone: "+94 77 123 4567".to_owned(),
            license_number: Some("B1234567".to_owned()),
            branch_id: Some(branch_id),
            base_salary: Decimal::new(45_000, 0),
        })
        .await
        .unwrap()
}

async fn reload_driver(pool: &PgPool, driver: &Driver) -> Driver {
    DriverRepository::new(pool)
        .get(driver.id)
        .await
        .unwrap()
        .expect("driver")
}

async fn item_quantity(app: &TestApp, token: &str, item_id: i64) -> i64 {
    let resp = app
        .send(Method::GET, &format!("/Inventory/{item_id}"), Some(token), None)
        .await;
    resp.body["item"]["quantity"].as_i64().expect("quantity")
}

fn assert_transition_error(err: &AppError, current: OrderStatus) {
    match err {
        AppError::Domain(DomainError::InvalidTransition { current: stored, .. }) => {
            assert_eq!(stored, current.as_str());
        }
        other => panic!("expected an invalid transition, got {other:?}"),
    }
}

// =============================================================================
// Orders
// =============================================================================

#[tokio::test]
async fn test_accept_reserves_once_and_shipping_from_accepted_is_refused() {
    let database = start_database().await;
    let app = TestApp::with_pool(database.pool.clone());
    let token = app.token(Role::Admin, None);

    let resp = app
        .send(
            Method::POST,
            "/Inventory",
            Some(&token),
            Some(r#"{"name": "RO Membranes", "quantity": 50, "minStockLevel": 10, "maxStockLevel": 200}"#),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text);
    let item_id = resp.body["item"]["id"].as_i64().unwrap();

    let resp = app
        .send(
            Method::POST,
            "/Orders",
            Some(&token),
            Some(r#"{"items": [{"itemName": "RO Membranes", "quantity": 10}]}"#),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text);
    let order_id = resp.body["order"]["id"].as_i64().unwrap();

    let resp = app
        .send(Method::PUT, &format!("/Orders/{order_id}/accept"), Some(&token), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text);
    assert_eq!(resp.body["order"]["status"], "Accepted");
    assert_eq!(resp.body["items"][0]["after"], 40);

    assert_eq!(item_quantity(&app, &token, item_id).await, 40);

    let resp = app
        .send(
            Method::PUT,
            &format!("/Orders/{order_id}/status"),
            Some(&token),
            Some(r#"{"status": "Shipped"}"#),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["currentStatus"], "Accepted");
    assert_eq!(item_quantity(&app, &token, item_id).await, 40);

    // A second accept must not reserve again
    let resp = app
        .send(Method::PUT, &format!("/Orders/{order_id}/accept"), Some(&token), None)
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(item_quantity(&app, &token, item_id).await, 40);
}

#[tokio::test]
async fn test_accept_with_shortage_changes_nothing() {
    let database = start_database().await;
    let pool = &database.pool;
    factory_item(pool, "Sediment Pre-Filter", 50, "units", 10, 500).await;
    factory_item(pool, "UV Lamp Module", 2, "units", 1, 60).await;

    let service = OrderService::new(pool);
    let order = service
        .create_order(
            &[
                LineItem::new("Sediment Pre-Filter", 10),
                LineItem::new("UV Lamp Module", 5),
            ],
            None,
            None,
        )
        .await
        .unwrap();

    let shortages = match service.accept_order(order.id).await.unwrap_err() {
        AppError::Domain(DomainError::InsufficientStock(shortages)) => shortages,
        other => panic!("expected a shortage, got {other:?}"),
    };
    assert_eq!(shortages.len(), 1);
    assert_eq!(shortages[0].item_name, "UV Lamp Module");
    assert_eq!(shortages[0].available, 2);
    assert_eq!(shortages[0].required, 5);

    // The covered line was not decremented and the order stayed pending
    assert_eq!(factory_quantity(pool, "Sediment Pre-Filter").await, 50);
    assert_eq!(factory_quantity(pool, "UV Lamp Module").await, 2);
    let order = OrderRepository::new(pool).get(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_status_mirrors_between_linked_orders() {
    let database = start_database().await;
    let pool = &database.pool;
    let branch_id = branch(pool, "Kandy").await;

    let service = OrderService::new(pool);
    let (branch_order, order) = service
        .create_branch_order(branch_id, &[LineItem::new("Clay Pot Filter", 3)], None)
        .await
        .unwrap();
    assert_eq!(order.original_branch_order_id, Some(branch_order.id));
    assert_eq!(branch_order.factory_order_id, Some(order.id));

    service
        .update_order_status(order.id, OrderStatus::Processing)
        .await
        .unwrap();
    let mirrored = BranchOrderRepository::new(pool)
        .get(branch_order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mirrored.status, OrderStatus::Processing);

    service
        .update_branch_order_status(branch_order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    let mirrored = OrderRepository::new(pool).get(order.id).await.unwrap().unwrap();
    assert_eq!(mirrored.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_branch_manager_cannot_touch_another_branch_order() {
    let database = start_database().await;
    let app = TestApp::with_pool(database.pool.clone());
    let own = branch(app.pool(), "Negombo").await;
    let other = branch(app.pool(), "Trincomalee").await;

    let (branch_order, _) = OrderService::new(app.pool())
        .create_branch_order(other, &[LineItem::new("Clay Pot Filter", 2)], None)
        .await
        .unwrap();
    let uri = format!("/BranchOrders/{}", branch_order.id);

    let outsider = app.token(Role::BranchManager, Some(own.as_i32()));
    for (method, path, body) in [
        (Method::GET, uri.clone(), None),
        (Method::PUT, format!("{uri}/status"), Some(r#"{"status": "Cancelled"}"#)),
        (Method::PUT, format!("{uri}/assign-driver"), Some(r#"{"driverId": 1}"#)),
        (Method::DELETE, uri.clone(), None),
    ] {
        let resp = app.send(method.clone(), &path, Some(&outsider), body).await;
        assert_eq!(resp.status, StatusCode::FORBIDDEN, "{method} {path}");
    }

    let unchanged = BranchOrderRepository::new(app.pool())
        .get(branch_order.id)
        .await
        .unwrap()
        .expect("branch order still exists");
    assert_eq!(unchanged.status, OrderStatus::Pending);

    let manager = app.token(Role::BranchManager, Some(other.as_i32()));
    let resp = app.send(Method::GET, &uri, Some(&manager), None).await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text);
}

// =============================================================================
// Delivery
// =============================================================================

#[tokio::test]
async fn test_branch_delivery_moves_stock_and_seeds_levels() {
    let database = start_database().await;
    let pool = &database.pool;
    let branch_id = branch(pool, "Galle").await;
    factory_item(pool, "Ceramic Candle Filter", 100, "boxes", 5, 40).await;

    let service = OrderService::new(pool);
    let (branch_order, order) = service
        .create_branch_order(
            branch_id,
            &[
                LineItem::new("Ceramic Candle Filter", 30),
                LineItem::new("Prototype Housing", 4),
            ],
            None,
        )
        .await
        .unwrap();

    let update = service
        .update_branch_order_status(branch_order.id, OrderStatus::Delivered)
        .await
        .unwrap();
    let outcomes: Vec<Outcome> = update.items.iter().map(|line| line.outcome).collect();
    assert_eq!(outcomes, [Outcome::Applied, Outcome::Skipped]);

    assert_eq!(factory_quantity(pool, "Ceramic Candle Filter").await, 70);

    let rows = BranchInventoryRepository::new(pool).list(branch_id).await.unwrap();
    assert_eq!(rows.len(), 1, "unknown items are not credited");
    let row = &rows[0];
    assert_eq!(row.name, "Ceramic Candle Filter");
    assert_eq!(row.quantity, 30);
    assert_eq!(row.unit, "boxes");
    assert_eq!(row.min_stock_level, 5);
    assert_eq!(row.max_stock_level, 40);
    assert_eq!(row.status, StockStatus::InStock);

    let factory_order = OrderRepository::new(pool).get(order.id).await.unwrap().unwrap();
    assert_eq!(factory_order.status, OrderStatus::Delivered);

    // Delivered is closed; the transfer cannot run twice
    let err = service
        .update_branch_order_status(branch_order.id, OrderStatus::Delivered)
        .await
        .unwrap_err();
    assert_transition_error(&err, OrderStatus::Delivered);
    assert_eq!(factory_quantity(pool, "Ceramic Candle Filter").await, 70);
}

#[tokio::test]
async fn test_factory_delivery_releases_branch_order_driver() {
    let database = start_database().await;
    let pool = &database.pool;
    let branch_id = branch(pool, "Jaffna").await;
    factory_item(pool, "RO Membrane", 50, "units", 15, 120).await;
    let courier = driver(pool, branch_id).await;

    let service = OrderService::new(pool);
    let (branch_order, order) = service
        .create_branch_order(branch_id, &[LineItem::new("RO Membrane", 10)], None)
        .await
        .unwrap();
    service.assign_driver(branch_order.id, courier.id).await.unwrap();
    let busy = reload_driver(pool, &courier).await;
    assert_eq!(busy.status, DriverStatus::OnDelivery);
    assert_eq!(busy.assigned_orders, vec![branch_order.id]);

    service
        .update_order_status(order.id, OrderStatus::Shipped)
        .await
        .unwrap();
    assert_eq!(factory_quantity(pool, "RO Membrane").await, 40);

    let update = service
        .update_order_status(order.id, OrderStatus::Delivered)
        .await
        .unwrap();
    assert_eq!(update.driver.map(|d| d.id), Some(courier.id));

    let mirrored = BranchOrderRepository::new(pool)
        .get(branch_order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mirrored.status, OrderStatus::Delivered);

    let released = reload_driver(pool, &courier).await;
    assert_eq!(released.status, DriverStatus::Available);
    assert!(released.assigned_orders.is_empty());
    assert_eq!(released.total_deliveries, 1);

    let off = DriverService::new(pool)
        .set_status(courier.id, DriverStatus::OffDuty)
        .await
        .unwrap();
    assert_eq!(off.status, DriverStatus::OffDuty);
}

// =============================================================================
// Recycling
// =============================================================================

#[tokio::test]
async fn test_recycling_approval_clamps_at_capacity_and_runs_once() {
    let database = start_database().await;
    let pool = &database.pool;
    let branch_id = branch(pool, "Matara").await;

    let service = RecyclingService::new(pool, true);
    service.create_bin(branch_id, 100.0, 70.0).await.unwrap();
    let request = service
        .submit(None, branch_id, 50.0, Some("ceramic"), None)
        .await
        .unwrap();

    let (approved, adjustment) = service.approve(request.id).await.unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
    assert!((adjustment.after.current_level - 100.0).abs() < f64::EPSILON);
    assert!(adjustment.factory_notified);

    let bin = BinRepository::new(pool)
        .get_by_branch(branch_id)
        .await
        .unwrap()
        .unwrap();
    assert!((bin.current_level - 100.0).abs() < f64::EPSILON);
    assert!((bin.fill_percentage - 100.0).abs() < f64::EPSILON);
    assert!(bin.is_notified);

    let err = service.approve(request.id).await.unwrap_err();
    assert!(matches!(err, AppError::Domain(DomainError::InvalidTransition { .. })), "{err:?}");
    let bin = BinRepository::new(pool)
        .get_by_branch(branch_id)
        .await
        .unwrap()
        .unwrap();
    assert!((bin.current_level - 100.0).abs() < f64::EPSILON);
}

// =============================================================================
// Emergency dispatch
// =============================================================================

#[tokio::test]
async fn test_emergency_completion_books_exactly_one_bonus() {
    let database = start_database().await;
    let pool = &database.pool;
    let branch_id = branch(pool, "Batticaloa").await;
    let courier = driver(pool, branch_id).await;
    let geo = GeoDirectory::default();

    let service = EmergencyService::new(pool, &geo, DEFAULT_BONUS_AMOUNT);
    let request = service
        .create(
            None,
            &EmergencyInput {
                location: "Batticaloa General Hospital".to_owned(),
                description: "Ward water filtration failed".to_owned(),
                items_needed: vec![LineItem::new("Gravity Water Filter 20L", 4)],
                bonus_eligible: None,
                bonus_amount: Some(Decimal::new(7_500, 0)),
            },
        )
        .await
        .unwrap();

    service
        .update_status(request.id, EmergencyStatus::Approved)
        .await
        .unwrap();
    service.assign_driver(request.id, courier.id).await.unwrap();

    let update = service
        .update_status(request.id, EmergencyStatus::Completed)
        .await
        .unwrap();
    assert_eq!(update.request.bonus_status, BonusState::Created);
    assert!(update.bonus.as_ref().is_some_and(|b| b.created));
    assert_eq!(update.driver.map(|d| d.status), Some(DriverStatus::Available));

    assert!(
        service
            .update_status(request.id, EmergencyStatus::Completed)
            .await
            .is_err()
    );

    let bonuses = BonusRepository::new(pool)
        .list(&BonusFilter {
            driver_id: Some(courier.id),
            ..BonusFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(bonuses.len(), 1);
    assert_eq!(bonuses[0].emergency_request_id, request.id);
    assert_eq!(bonuses[0].bonus_amount, Decimal::new(7_500, 0));

    // The effect key is already taken
    let mut tx = pool.begin().await.unwrap();
    let claimed = side_effects::claim(&mut tx, &SideEffectKey::driver_bonus(request.id))
        .await
        .unwrap();
    assert!(!claimed);
    tx.rollback().await.unwrap();
}
