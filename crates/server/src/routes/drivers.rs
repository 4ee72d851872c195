//! Driver records, availability and payroll.

use axum::{
    Router,
    extract::State,
    routing::{get, put},
};
use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use aquacycle_core::{BranchId, DriverId, DriverStatus, Role, payroll::PayPeriod};

use super::{ApiJson, ApiPath, ApiQuery, ApiResult, created, done, ok};
use crate::db::DriverRepository;
use crate::db::drivers::{DriverFields, DriverFilter};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::services::DriverService;
use crate::state::AppState;

const READERS: &[Role] = &[Role::Admin, Role::FactoryManager, Role::BranchManager];
const MANAGERS: &[Role] = &[Role::Admin, Role::BranchManager];
const STATUS_WRITERS: &[Role] = &[Role::Admin, Role::BranchManager, Role::Driver];

/// Build the drivers router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/Drivers", get(list_drivers).post(create_driver))
        .route(
            "/Drivers/{id}",
            get(get_driver).put(update_driver).delete(delete_driver),
        )
        .route("/Drivers/{id}/status", put(set_status))
        .route("/Drivers/{id}/payroll", get(payroll))
}

/// Query parameters for the driver list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<DriverStatus>,
    pub branch_id: Option<BranchId>,
}

/// Body of create and update requests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    pub license_number: Option<String>,
    pub branch_id: Option<BranchId>,
    #[serde(default)]
    pub base_salary: Decimal,
}

impl From<DriverRequest> for DriverFields {
    fn from(body: DriverRequest) -> Self {
        Self {
            name: body.name.trim().to_owned(),
            phone: body.phone.trim().to_owned(),
            license_number: body.license_number,
            branch_id: body.branch_id,
            base_salary: body.base_salary,
        }
    }
}

/// Body of a status change.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: DriverStatus,
}

/// Pay period selection. Defaults to the current month.
#[derive(Debug, Deserialize)]
pub struct PayrollQuery {
    pub month: Option<i32>,
    pub year: Option<i32>,
}

impl PayrollQuery {
    fn period(&self) -> Result<PayPeriod, AppError> {
        let now = Utc::now();
        let current_month = i32::try_from(now.month())
            .map_err(|_| AppError::Internal("month out of range".to_owned()))?;
        Ok(PayPeriod::new(
            self.month.unwrap_or(current_month),
            self.year.unwrap_or_else(|| now.year()),
        )?)
    }
}

#[instrument(skip(auth, state))]
async fn list_drivers(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult {
    auth.require_roles(READERS)?;
    let filter = DriverFilter {
        status: query.status,
        branch_id: query.branch_id,
    };
    let drivers = DriverRepository::new(state.pool()).list(&filter).await?;
    ok("Drivers retrieved", "drivers", &drivers)
}

#[instrument(skip(auth, state), fields(driver_id = %id))]
async fn get_driver(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DriverId>,
) -> ApiResult {
    auth.require_roles(READERS)?;
    let driver = DriverRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("driver"))?;
    ok("Driver retrieved", "driver", &driver)
}

#[instrument(skip(auth, state, body))]
async fn create_driver(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<DriverRequest>,
) -> ApiResult {
    auth.require_roles(MANAGERS)?;
    let driver = DriverService::new(state.pool())
        .create(&body.into())
        .await?;
    created("Driver created", "driver", &driver)
}

#[instrument(skip(auth, state, body), fields(driver_id = %id))]
async fn update_driver(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DriverId>,
    ApiJson(body): ApiJson<DriverRequest>,
) -> ApiResult {
    auth.require_roles(MANAGERS)?;
    let driver = DriverService::new(state.pool())
        .update(id, &body.into())
        .await?;
    ok("Driver updated", "driver", &driver)
}

#[instrument(skip(auth, state, body), fields(driver_id = %id, status = %body.status))]
async fn set_status(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DriverId>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> ApiResult {
    auth.require_roles(STATUS_WRITERS)?;
    let driver = DriverService::new(state.pool())
        .set_status(id, body.status)
        .await?;
    ok("Driver status updated", "driver", &driver)
}

#[instrument(skip(auth, state), fields(driver_id = %id))]
async fn delete_driver(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DriverId>,
) -> ApiResult {
    auth.require_roles(MANAGERS)?;
    DriverService::new(state.pool()).delete(id).await?;
    done("Driver deleted")
}

#[instrument(skip(auth, state), fields(driver_id = %id))]
async fn payroll(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DriverId>,
    ApiQuery(query): ApiQuery<PayrollQuery>,
) -> ApiResult {
    auth.require_roles(MANAGERS)?;
    let summary = DriverService::new(state.pool())
        .payroll(id, query.period()?)
        .await?;
    ok("Payroll calculated", "payroll", &summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payroll_query_defaults_to_current_month() {
        let period = PayrollQuery {
            month: None,
            year: None,
        }
        .period()
        .unwrap();
        let now = Utc::now();
        assert_eq!(period.month, i32::try_from(now.month()).unwrap());
        assert_eq!(period.year, now.year());
    }

    #[test]
    fn test_payroll_query_rejects_bad_month() {
        let result = PayrollQuery {
            month: Some(13),
            year: Some(2026),
        }
        .period();
        assert!(matches!(result, Err(AppError::Domain(_))));
    }

    #[test]
    fn test_driver_request_trims_fields() {
        let body: DriverRequest =
            serde_json::from_str(r#"{"name": " Sam ", "phone": "555-0100", "baseSalary": "25000"}"#)
                .unwrap();
        let fields = DriverFields::from(body);
        assert_eq!(fields.name, "Sam");
        assert_eq!(fields.base_salary, Decimal::new(25000, 0));
    }
}
