//! Login and account registration.

use axum::{Router, extract::State, routing::post};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use aquacycle_core::{BranchId, Role};

use super::{ApiJson, ApiResult, created, with_extra};
use crate::middleware::AuthUser;
use crate::services::AuthService;
use crate::services::auth::{Claims, Registration, issue_token};
use crate::state::AppState;

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registration request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    pub branch_id: Option<BranchId>,
}

/// Exchange an email and password for a bearer token.
#[instrument(skip(state, body))]
async fn login(State(state): State<AppState>, ApiJson(body): ApiJson<LoginRequest>) -> ApiResult {
    let user = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await?;

    let claims = Claims::for_user(&user, state.config().jwt.ttl_hours);
    let token = issue_token(&claims, state.encoding_key())?;

    tracing::info!(user_id = %user.id, role = %user.role, "user logged in");
    with_extra(
        super::ok("Login successful", "user", &user),
        &[("token", json!(token))],
    )
}

/// Create an account. Admin only.
#[instrument(skip(auth, state, body), fields(role = %body.role))]
async fn register(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> ApiResult {
    auth.require_roles(&[Role::Admin])?;

    let user = AuthService::new(state.pool())
        .register(&Registration {
            email: &body.email,
            password: &body.password,
            name: &body.name,
            role: body.role,
            branch_id: body.branch_id,
        })
        .await?;

    created("User registered", "user", &user)
}
