//! Branches, employees and user accounts.

use axum::{Router, extract::State, routing::get};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use aquacycle_core::{BranchId, DomainError, EmployeeId, FieldError, Role, UserId};

use super::{ApiJson, ApiPath, ApiQuery, ApiResult, created, done, ok};
use crate::db::branches::BranchFields;
use crate::db::employees::EmployeeFields;
use crate::db::{BranchRepository, EmployeeRepository, UserRepository};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::services::AuthService;
use crate::services::auth::Registration;
use crate::state::AppState;

const ADMIN: &[Role] = &[Role::Admin];
const HR: &[Role] = &[Role::Admin, Role::BranchManager];

/// Build the organisation router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/branches", get(list_branches).post(create_branch))
        .route(
            "/branches/{id}",
            get(get_branch).put(update_branch).delete(delete_branch),
        )
        .route("/employees", get(list_employees).post(create_employee))
        .route(
            "/employees/{id}",
            get(get_employee).put(update_employee).delete(delete_employee),
        )
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

fn required(errors: &mut Vec<FieldError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, format!("{field} is required")));
    }
}

fn finish(errors: Vec<FieldError>) -> Result<(), DomainError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Validation(errors))
    }
}

// =============================================================================
// Branches
// =============================================================================

/// Body of branch create and update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
}

impl BranchRequest {
    fn into_fields(self) -> Result<BranchFields, DomainError> {
        let mut errors = Vec::new();
        required(&mut errors, "name", &self.name);
        required(&mut errors, "location", &self.location);
        if self.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
            errors.push(FieldError::new("latitude", "latitude must be between -90 and 90"));
        }
        if self.longitude.is_some_and(|lng| !(-180.0..=180.0).contains(&lng)) {
            errors.push(FieldError::new("longitude", "longitude must be between -180 and 180"));
        }
        if self.latitude.is_some() != self.longitude.is_some() {
            errors.push(FieldError::new(
                "latitude",
                "latitude and longitude must be given together",
            ));
        }
        finish(errors)?;

        Ok(BranchFields {
            name: self.name.trim().to_owned(),
            location: self.location.trim().to_owned(),
            latitude: self.latitude,
            longitude: self.longitude,
            phone: self.phone,
        })
    }
}

#[instrument(skip(_auth, state))]
async fn list_branches(_auth: AuthUser, State(state): State<AppState>) -> ApiResult {
    let branches = BranchRepository::new(state.pool()).list().await?;
    ok("Branches retrieved", "branches", &branches)
}

#[instrument(skip(_auth, state), fields(branch_id = %id))]
async fn get_branch(
    _auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BranchId>,
) -> ApiResult {
    let branch = BranchRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("branch"))?;
    ok("Branch retrieved", "branch", &branch)
}

#[instrument(skip(auth, state, body))]
async fn create_branch(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<BranchRequest>,
) -> ApiResult {
    auth.require_roles(ADMIN)?;
    let branch = BranchRepository::new(state.pool())
        .create(&body.into_fields()?)
        .await?;
    tracing::info!(branch_id = %branch.id, "branch created");
    created("Branch created", "branch", &branch)
}

#[instrument(skip(auth, state, body), fields(branch_id = %id))]
async fn update_branch(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BranchId>,
    ApiJson(body): ApiJson<BranchRequest>,
) -> ApiResult {
    auth.require_roles(ADMIN)?;
    let branch = BranchRepository::new(state.pool())
        .update(id, &body.into_fields()?)
        .await?
        .ok_or_else(|| AppError::not_found("branch"))?;
    ok("Branch updated", "branch", &branch)
}

#[instrument(skip(auth, state), fields(branch_id = %id))]
async fn delete_branch(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BranchId>,
) -> ApiResult {
    auth.require_roles(ADMIN)?;
    if !BranchRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::not_found("branch"));
    }
    done("Branch deleted")
}

// =============================================================================
// Employees
// =============================================================================

/// Query parameters for the employee list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeQuery {
    pub branch_id: Option<BranchId>,
}

/// Body of employee create and update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: String,
    pub branch_id: Option<BranchId>,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub salary: Decimal,
}

impl EmployeeRequest {
    fn into_fields(self) -> Result<EmployeeFields, DomainError> {
        let mut errors = Vec::new();
        required(&mut errors, "name", &self.name);
        required(&mut errors, "position", &self.position);
        if self.salary.is_sign_negative() {
            errors.push(FieldError::new("salary", "salary cannot be negative"));
        }
        finish(errors)?;

        Ok(EmployeeFields {
            name: self.name.trim().to_owned(),
            position: self.position.trim().to_owned(),
            branch_id: self.branch_id,
            phone: self.phone,
            email: self.email,
            salary: self.salary,
        })
    }
}

#[instrument(skip(auth, state))]
async fn list_employees(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EmployeeQuery>,
) -> ApiResult {
    auth.require_roles(HR)?;
    let branch_id = if auth.role == Role::BranchManager {
        Some(auth.branch_scope(query.branch_id)?)
    } else {
        query.branch_id
    };
    let employees = EmployeeRepository::new(state.pool()).list(branch_id).await?;
    ok("Employees retrieved", "employees", &employees)
}

#[instrument(skip(auth, state), fields(employee_id = %id))]
async fn get_employee(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EmployeeId>,
) -> ApiResult {
    auth.require_roles(HR)?;
    let employee = EmployeeRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("employee"))?;
    ok("Employee retrieved", "employee", &employee)
}

#[instrument(skip(auth, state, body))]
async fn create_employee(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(mut body): ApiJson<EmployeeRequest>,
) -> ApiResult {
    auth.require_roles(HR)?;
    if auth.role == Role::BranchManager {
        body.branch_id = Some(auth.branch_scope(body.branch_id)?);
    }
    let employee = EmployeeRepository::new(state.pool())
        .create(&body.into_fields()?)
        .await?;
    created("Employee created", "employee", &employee)
}

#[instrument(skip(auth, state, body), fields(employee_id = %id))]
async fn update_employee(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EmployeeId>,
    ApiJson(mut body): ApiJson<EmployeeRequest>,
) -> ApiResult {
    auth.require_roles(HR)?;
    if auth.role == Role::BranchManager {
        body.branch_id = Some(auth.branch_scope(body.branch_id)?);
    }
    let employee = EmployeeRepository::new(state.pool())
        .update(id, &body.into_fields()?)
        .await?
        .ok_or_else(|| AppError::not_found("employee"))?;
    ok("Employee updated", "employee", &employee)
}

#[instrument(skip(auth, state), fields(employee_id = %id))]
async fn delete_employee(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EmployeeId>,
) -> ApiResult {
    auth.require_roles(HR)?;
    if !EmployeeRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::not_found("employee"));
    }
    done("Employee deleted")
}

// =============================================================================
// Users
// =============================================================================

/// Body of user creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    pub branch_id: Option<BranchId>,
}

/// Body of user update. A password, if present, replaces the current one.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: String,
    pub role: Role,
    pub branch_id: Option<BranchId>,
    pub password: Option<String>,
}

#[instrument(skip(auth, state))]
async fn list_users(auth: AuthUser, State(state): State<AppState>) -> ApiResult {
    auth.require_roles(ADMIN)?;
    let users = UserRepository::new(state.pool()).list().await?;
    ok("Users retrieved", "users", &users)
}

#[instrument(skip(auth, state), fields(user_id = %id))]
async fn get_user(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<UserId>,
) -> ApiResult {
    auth.require_roles(ADMIN)?;
    let user = UserRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;
    ok("User retrieved", "user", &user)
}

#[instrument(skip(auth, state, body), fields(role = %body.role))]
async fn create_user(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> ApiResult {
    auth.require_roles(ADMIN)?;
    let user = AuthService::new(state.pool())
        .register(&Registration {
            email: &body.email,
            password: &body.password,
            name: &body.name,
            role: body.role,
            branch_id: body.branch_id,
        })
        .await?;
    created("User created", "user", &user)
}

#[instrument(skip(auth, state, body), fields(user_id = %id, role = %body.role))]
async fn update_user(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> ApiResult {
    auth.require_roles(ADMIN)?;
    if body.name.trim().is_empty() {
        return Err(DomainError::field("name", "name is required").into());
    }

    if let Some(password) = body.password.as_deref() {
        AuthService::new(state.pool())
            .change_password(id, password)
            .await?;
    }
    let user = UserRepository::new(state.pool())
        .update(id, body.name.trim(), body.role, body.branch_id)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;
    ok("User updated", "user", &user)
}

#[instrument(skip(auth, state), fields(user_id = %id))]
async fn delete_user(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<UserId>,
) -> ApiResult {
    auth.require_roles(ADMIN)?;
    if id == auth.id {
        return Err(AppError::BadRequest("you cannot delete your own account".to_owned()));
    }
    if !UserRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::not_found("user"));
    }
    done("User deleted")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_request_requires_both_coordinates() {
        let body = BranchRequest {
            name: "Kandy".to_owned(),
            location: "Kandy".to_owned(),
            latitude: Some(7.29),
            longitude: None,
            phone: None,
        };
        let Err(DomainError::Validation(errors)) = body.into_fields() else {
            panic!("expected validation error");
        };
        assert_eq!(errors[0].field, "latitude");
    }

    #[test]
    fn test_employee_request_collects_errors() {
        let body: EmployeeRequest = serde_json::from_str(r#"{"salary": "-1"}"#).unwrap();
        let Err(DomainError::Validation(errors)) = body.into_fields() else {
            panic!("expected validation error");
        };
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["name", "position", "salary"]);
    }
}
