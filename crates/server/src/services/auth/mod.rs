//! Authentication service.
//!
//! Provides argon2 password login and HS256 access tokens.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use aquacycle_core::{BranchId, Email, Role, UserId};

use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};
use crate::models::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Access token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// User id.
    pub sub: UserId,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<BranchId>,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Issue time, seconds since the epoch.
    pub iat: i64,
}

impl Claims {
    /// Claims for `user`, valid for `ttl_hours` from now.
    #[must_use]
    pub fn for_user(user: &User, ttl_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id,
            role: user.role,
            branch_id: user.branch_id,
            exp: (now + Duration::hours(ttl_hours)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Sign `claims` with the server secret.
///
/// # Errors
///
/// Returns `AuthError::Signing` if encoding fails.
pub fn issue_token(claims: &Claims, key: &EncodingKey) -> Result<String, AuthError> {
    encode(&Header::new(Algorithm::HS256), claims, key).map_err(AuthError::Signing)
}

/// Verify a token's signature and expiry and return its claims.
///
/// # Errors
///
/// Returns `AuthError::InvalidToken` for any verification failure.
pub fn verify_token(token: &str, key: &DecodingKey) -> Result<Claims, AuthError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            AuthError::InvalidToken
        })
}

/// Fields of a new account, before hashing.
#[derive(Debug, Clone)]
pub struct Registration<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub name: &'a str,
    pub role: Role,
    pub branch_id: Option<BranchId>,
}

/// Authentication service.
///
/// Handles account registration and password login.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, registration: &Registration<'_>) -> Result<User, AuthError> {
        let email = Email::parse(registration.email)?;
        validate_password(registration.password)?;
        let password_hash = hash_password(registration.password)?;

        let user = self
            .users
            .create(&NewUser {
                email: &email,
                name: registration.name,
                role: registration.role,
                branch_id: registration.branch_id,
                password_hash: &password_hash,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_credentials(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Replace a user's password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    pub async fn change_password(&self, id: UserId, password: &str) -> Result<bool, AuthError> {
        validate_password(password)?;
        let hash = hash_password(password)?;
        Ok(self.users.set_password_hash(id, &hash).await?)
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: UserId::new(7),
            email: Email::parse("manager@aquacycle.test").unwrap(),
            name: "Nimal".to_owned(),
            role,
            branch_id: Some(BranchId::new(3)),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    const SECRET: &[u8] = b"kJ8#mN2$pQ5@rT9!vX3&yZ6*aB1^cD4%";

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_token_carries_role_and_branch() {
        let claims = Claims::for_user(&user(Role::BranchManager), 1);
        let token = issue_token(&claims, &EncodingKey::from_secret(SECRET)).unwrap();
        let decoded = verify_token(&token, &DecodingKey::from_secret(SECRET)).unwrap();
        assert_eq!(decoded.sub, UserId::new(7));
        assert_eq!(decoded.role, Role::BranchManager);
        assert_eq!(decoded.branch_id, Some(BranchId::new(3)));
    }

    #[test]
    fn test_token_signed_with_other_secret_rejected() {
        let claims = Claims::for_user(&user(Role::Admin), 1);
        let token = issue_token(&claims, &EncodingKey::from_secret(SECRET)).unwrap();
        let other = DecodingKey::from_secret(b"a-completely-different-secret-value!");
        assert!(matches!(verify_token(&token, &other), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut claims = Claims::for_user(&user(Role::Driver), 1);
        claims.exp = Utc::now().timestamp() - 3600;
        claims.iat = claims.exp - 60;
        let token = issue_token(&claims, &EncodingKey::from_secret(SECRET)).unwrap();
        assert!(verify_token(&token, &DecodingKey::from_secret(SECRET)).is_err());
    }

    #[test]
    fn test_claims_json_uses_role_label() {
        let claims = Claims::for_user(&user(Role::FireBrigade), 1);
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["role"], "Fire Brigade");
        assert_eq!(json["branchId"], 3);
        assert_eq!(json["sub"], 7);
    }
}
