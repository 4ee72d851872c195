//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! AQUA_NEW_USER_PASSWORD='...' aqua-cli user create -e admin@aquacycle.lk -n "Head Office"
//! ```
//!
//! # Environment Variables
//!
//! - `AQUA_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `AQUA_NEW_USER_PASSWORD` - Initial password of the new account

use aquacycle_core::{BranchId, Role, UserId};
use aquacycle_server::db;
use aquacycle_server::services::auth::{AuthError, AuthService, Registration};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const PASSWORD_VAR: &str = "AQUA_NEW_USER_PASSWORD";

/// Errors that can occur while creating an account.
#[derive(Debug, Error)]
pub enum UserError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Branch managers act for one branch.
    #[error("Role {0} requires --branch-id")]
    BranchRequired(Role),

    /// Registration was refused.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Create an account.
///
/// # Returns
///
/// The ID of the created account.
///
/// # Errors
///
/// Returns an error if the password or database URL is missing, a branch
/// manager has no branch, or registration fails.
pub async fn create_user(
    email: &str,
    name: &str,
    role: Role,
    branch_id: Option<BranchId>,
) -> Result<UserId, UserError> {
    if role == Role::BranchManager && branch_id.is_none() {
        return Err(UserError::BranchRequired(role));
    }

    let database_url = super::database_url().ok_or(UserError::MissingEnvVar("AQUA_DATABASE_URL"))?;
    let password = std::env::var(PASSWORD_VAR)
        .ok()
        .filter(|p| !p.is_empty())
        .map(SecretString::from)
        .ok_or(UserError::MissingEnvVar(PASSWORD_VAR))?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Creating account: {} ({})", email, role);

    let user = AuthService::new(&pool)
        .register(&Registration {
            email,
            password: password.expose_secret(),
            name,
            role,
            branch_id,
        })
        .await?;

    tracing::info!(
        "Account created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );

    Ok(user.id)
}
