//! Factory inventory ledger routes.

use axum::{
    Router,
    extract::State,
    routing::{get, put},
};
use serde::Deserialize;
use tracing::instrument;

use aquacycle_core::{InventoryItemId, Role, StockStatus};

use super::{ApiJson, ApiPath, ApiQuery, ApiResult, created, done, ok};
use crate::db::InventoryRepository;
use crate::db::inventory::{InventoryLevels, NewInventoryItem};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::services::InventoryService;
use crate::state::AppState;

const READERS: &[Role] = &[Role::Admin, Role::FactoryManager, Role::BranchManager];
const WRITERS: &[Role] = &[Role::Admin, Role::FactoryManager];

const DEFAULT_UNIT: &str = "units";
const DEFAULT_MIN_STOCK: i32 = 10;
const DEFAULT_MAX_STOCK: i32 = 100;

/// Build the inventory router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/Inventory", get(list_items).post(add_item))
        .route("/Inventory/low-stock", get(low_stock))
        .route(
            "/Inventory/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/Inventory/{id}/adjust", put(adjust_item))
}

/// Query parameters for the inventory list.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<StockStatus>,
}

/// Body of add and update requests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: i32,
    pub unit: Option<String>,
    pub min_stock_level: Option<i32>,
    pub max_stock_level: Option<i32>,
}

impl ItemRequest {
    fn levels(self) -> InventoryLevels {
        InventoryLevels {
            quantity: self.quantity,
            unit: self.unit.unwrap_or_else(|| DEFAULT_UNIT.to_owned()),
            min_stock_level: self.min_stock_level.unwrap_or(DEFAULT_MIN_STOCK),
            max_stock_level: self.max_stock_level.unwrap_or(DEFAULT_MAX_STOCK),
        }
    }
}

/// Body of an adjustment.
#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    /// Signed change to the quantity.
    pub adjustment: i32,
    pub reason: Option<String>,
}

#[instrument(skip(auth, state))]
async fn list_items(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult {
    auth.require_roles(READERS)?;
    let items = InventoryRepository::new(state.pool()).list(query.status).await?;
    ok("Inventory retrieved", "items", &items)
}

#[instrument(skip(auth, state))]
async fn low_stock(auth: AuthUser, State(state): State<AppState>) -> ApiResult {
    auth.require_roles(READERS)?;
    let items = InventoryRepository::new(state.pool()).low_stock().await?;
    ok("Low stock items retrieved", "items", &items)
}

#[instrument(skip(auth, state), fields(item_id = %id))]
async fn get_item(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<InventoryItemId>,
) -> ApiResult {
    auth.require_roles(READERS)?;
    let item = InventoryRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("inventory item"))?;
    ok("Inventory item retrieved", "item", &item)
}

#[instrument(skip(auth, state, body))]
async fn add_item(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ItemRequest>,
) -> ApiResult {
    auth.require_roles(WRITERS)?;
    let name = body.name.trim().to_owned();
    let levels = body.levels();
    let item = InventoryService::new(state.pool())
        .add_item(&NewInventoryItem {
            name,
            quantity: levels.quantity,
            unit: levels.unit,
            min_stock_level: levels.min_stock_level,
            max_stock_level: levels.max_stock_level,
        })
        .await?;
    created("Inventory item added", "item", &item)
}

#[instrument(skip(auth, state, body), fields(item_id = %id))]
async fn update_item(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<InventoryItemId>,
    ApiJson(body): ApiJson<ItemRequest>,
) -> ApiResult {
    auth.require_roles(WRITERS)?;
    let item = InventoryService::new(state.pool())
        .update_item(id, &body.levels())
        .await?;
    ok("Inventory item updated", "item", &item)
}

#[instrument(skip(auth, state, body), fields(item_id = %id, reason = ?body.reason))]
async fn adjust_item(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<InventoryItemId>,
    ApiJson(body): ApiJson<AdjustRequest>,
) -> ApiResult {
    auth.require_roles(WRITERS)?;
    let item = InventoryService::new(state.pool())
        .adjust(id, body.adjustment)
        .await?;
    ok("Inventory adjusted", "item", &item)
}

#[instrument(skip(auth, state), fields(item_id = %id))]
async fn delete_item(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<InventoryItemId>,
) -> ApiResult {
    auth.require_roles(WRITERS)?;
    InventoryService::new(state.pool()).delete_item(id).await?;
    done("Inventory item deleted")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_item_request_defaults() {
        let body: ItemRequest = serde_json::from_str(r#"{"name": "Carbon Filter"}"#).unwrap();
        let levels = body.levels();
        assert_eq!(levels.quantity, 0);
        assert_eq!(levels.unit, "units");
        assert_eq!(levels.min_stock_level, 10);
        assert_eq!(levels.max_stock_level, 100);
    }

    #[test]
    fn test_item_request_camel_case() {
        let body: ItemRequest = serde_json::from_str(
            r#"{"name": "RO Membranes", "quantity": 50, "unit": "pcs", "minStockLevel": 5, "maxStockLevel": 80}"#,
        )
        .unwrap();
        let levels = body.levels();
        assert_eq!(levels.min_stock_level, 5);
        assert_eq!(levels.max_stock_level, 80);
        assert_eq!(levels.unit, "pcs");
    }
}
