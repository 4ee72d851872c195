//! Fire brigade emergency requests and driver bonuses.

use axum::{
    Router,
    extract::State,
    routing::{get, put},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use aquacycle_core::{
    DriverBonusId, DriverId, EmergencyRequestId, EmergencyStatus, Role, stock::LineItem,
};

use super::{ApiJson, ApiPath, ApiQuery, ApiResult, created, ok, to_json, with_extra};
use crate::db::bonuses::BonusFilter;
use crate::db::{BonusRepository, EmergencyRepository};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::services::{EmergencyInput, EmergencyService};
use crate::state::AppState;

const READERS: &[Role] = &[
    Role::Admin,
    Role::FactoryManager,
    Role::BranchManager,
    Role::Driver,
    Role::FireBrigade,
];
const REPORTERS: &[Role] = &[Role::Admin, Role::FireBrigade];
const DISPATCHERS: &[Role] = &[Role::Admin, Role::FactoryManager, Role::BranchManager];
const STATUS_WRITERS: &[Role] = &[
    Role::Admin,
    Role::FactoryManager,
    Role::BranchManager,
    Role::Driver,
];
const BONUS_READERS: &[Role] = &[
    Role::Admin,
    Role::FactoryManager,
    Role::BranchManager,
    Role::Driver,
];
const PAYERS: &[Role] = &[Role::Admin];

/// Build the emergency router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/emergency-requests", get(list_requests).post(create_request))
        .route("/emergency-requests/{id}", get(get_request))
        .route("/emergency-requests/{id}/status", put(update_status))
        .route("/emergency-requests/{id}/assign-driver", put(assign_driver))
        .route("/driver-bonuses", get(list_bonuses))
        .route("/driver-bonuses/{id}/paid", put(mark_paid))
}

fn service(state: &AppState) -> EmergencyService<'_> {
    EmergencyService::new(state.pool(), state.geo(), state.config().default_bonus)
}

/// Query parameters for the request list.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<EmergencyStatus>,
}

/// Body of a new emergency request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub items_needed: Vec<LineItem>,
    pub bonus_eligible: Option<bool>,
    pub bonus_amount: Option<Decimal>,
}

impl From<CreateRequest> for EmergencyInput {
    fn from(body: CreateRequest) -> Self {
        Self {
            location: body.location,
            description: body.description,
            items_needed: body.items_needed,
            bonus_eligible: body.bonus_eligible,
            bonus_amount: body.bonus_amount,
        }
    }
}

/// Body of a status change.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: EmergencyStatus,
}

/// Body of a driver assignment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignDriverRequest {
    pub driver_id: DriverId,
}

/// Query parameters for the bonus list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusQuery {
    pub driver_id: Option<DriverId>,
    pub month: Option<i32>,
    pub year: Option<i32>,
}

// =============================================================================
// Emergency requests
// =============================================================================

#[instrument(skip(auth, state))]
async fn list_requests(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult {
    auth.require_roles(READERS)?;
    // Brigades only see what they raised.
    let brigade_id = (auth.role == Role::FireBrigade).then_some(auth.id);
    let requests = EmergencyRepository::new(state.pool())
        .list(query.status, brigade_id)
        .await?;
    ok("Emergency requests retrieved", "requests", &requests)
}

#[instrument(skip(auth, state), fields(request_id = %id))]
async fn get_request(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EmergencyRequestId>,
) -> ApiResult {
    auth.require_roles(READERS)?;
    let request = EmergencyRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|r| auth.role != Role::FireBrigade || r.brigade_id == Some(auth.id))
        .ok_or_else(|| AppError::not_found("emergency request"))?;
    ok("Emergency request retrieved", "request", &request)
}

#[instrument(skip(auth, state, body))]
async fn create_request(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateRequest>,
) -> ApiResult {
    auth.require_roles(REPORTERS)?;
    let brigade_id = (auth.role == Role::FireBrigade).then_some(auth.id);
    let request = service(&state)
        .create(brigade_id, &body.into())
        .await?;
    created("Emergency request created", "request", &request)
}

#[instrument(skip(auth, state, body), fields(request_id = %id, status = %body.status))]
async fn update_status(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EmergencyRequestId>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> ApiResult {
    auth.require_roles(STATUS_WRITERS)?;
    // Drivers may only close the job they are on.
    if auth.role == Role::Driver && body.status != EmergencyStatus::Completed {
        return Err(AppError::Forbidden(
            "drivers may only complete emergency requests".to_owned(),
        ));
    }

    let update = service(&state).update_status(id, body.status).await?;
    let mut extra = Vec::new();
    if let Some(driver) = &update.driver {
        extra.push(("driver", to_json(driver)?));
    }
    if let Some(bonus) = &update.bonus {
        extra.push(("bonus", to_json(bonus)?));
    }
    with_extra(
        ok("Emergency request status updated", "request", &update.request),
        &extra,
    )
}

#[instrument(skip(auth, state, body), fields(request_id = %id, driver_id = %body.driver_id))]
async fn assign_driver(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EmergencyRequestId>,
    ApiJson(body): ApiJson<AssignDriverRequest>,
) -> ApiResult {
    auth.require_roles(DISPATCHERS)?;
    let (request, driver) = service(&state).assign_driver(id, body.driver_id).await?;
    with_extra(
        ok("Driver assigned to emergency request", "request", &request),
        &[("driver", to_json(&driver)?)],
    )
}

// =============================================================================
// Driver bonuses
// =============================================================================

#[instrument(skip(auth, state))]
async fn list_bonuses(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BonusQuery>,
) -> ApiResult {
    auth.require_roles(BONUS_READERS)?;
    let filter = BonusFilter {
        driver_id: query.driver_id,
        month: query.month,
        year: query.year,
    };
    let bonuses = BonusRepository::new(state.pool()).list(&filter).await?;
    ok("Driver bonuses retrieved", "bonuses", &bonuses)
}

#[instrument(skip(auth, state), fields(bonus_id = %id))]
async fn mark_paid(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DriverBonusId>,
) -> ApiResult {
    auth.require_roles(PAYERS)?;
    let bonus = service(&state).mark_bonus_paid(id).await?;
    ok("Bonus marked as paid", "bonus", &bonus)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_maps_to_input() {
        let body: CreateRequest = serde_json::from_str(
            r#"{
                "location": "Colombo",
                "description": "Warehouse fire",
                "itemsNeeded": [{"itemName": "RO Membranes", "quantity": 4}],
                "bonusAmount": "7500"
            }"#,
        )
        .unwrap();
        let input = EmergencyInput::from(body);
        assert_eq!(input.items_needed.len(), 1);
        assert_eq!(input.bonus_eligible, None);
        assert_eq!(input.bonus_amount, Some(Decimal::new(7500, 0)));
    }

    #[test]
    fn test_status_request_uses_display_labels() {
        let body: StatusRequest =
            serde_json::from_str(r#"{"status": "Approved-Sent-to-BranchManager"}"#).unwrap();
        assert_eq!(body.status, EmergencyStatus::SentToBranchManager);
    }
}
