//! Authentication extractor and role checks.
//!
//! Handlers take an [`AuthUser`] argument to require a valid bearer token,
//! then call [`AuthUser::require_roles`] with the endpoint's allow-list.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn list_orders(auth: AuthUser, State(state): State<AppState>) -> Result<Json<Value>, AppError> {
//!     auth.require_roles(&[Role::Admin, Role::FactoryManager])?;
//!     // ...
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use aquacycle_core::{BranchId, DomainError, Role, UserId};

use crate::error::{AppError, set_sentry_user};
use crate::services::auth::{AuthError, Claims, verify_token};
use crate::state::AppState;

/// The authenticated caller, decoded from `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub role: Role,
    pub branch_id: Option<BranchId>,
}

impl AuthUser {
    /// Reject the request with `403` unless the caller has one of `allowed`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` if the caller's role is not listed.
    pub fn require_roles(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "role {} may not access this resource",
                self.role
            )))
        }
    }

    /// Whether the caller has one of `roles`.
    #[must_use]
    pub fn is_any(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    /// Resolve the branch a request acts on.
    ///
    /// Branch staff are pinned to their own branch; other roles must name
    /// one explicitly.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` if branch staff name another branch, or
    /// a validation error if no branch can be determined.
    pub fn branch_scope(&self, requested: Option<BranchId>) -> Result<BranchId, AppError> {
        match (self.role, self.branch_id, requested) {
            (Role::BranchManager, Some(own), Some(other)) if own != other => Err(
                AppError::Forbidden("branch managers may only act on their own branch".to_owned()),
            ),
            (Role::BranchManager, Some(own), _) => Ok(own),
            (_, _, Some(branch_id)) | (_, Some(branch_id), None) => Ok(branch_id),
            (_, None, None) => Err(DomainError::field("branchId", "branchId is required").into()),
        }
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
            branch_id: claims.branch_id,
        }
    }
}

/// Pull the token out of an `Authorization` header value.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

        let token = bearer_token(header).ok_or(AuthError::InvalidToken)?;
        let user = Self::from(verify_token(token, state.decoding_key())?);

        tracing::Span::current().record("user_id", user.id.as_i32());
        set_sentry_user(user.id.as_i32(), user.role.as_str());

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer  abc"), Some("abc"));
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
    }

    #[test]
    fn test_require_roles() {
        let user = AuthUser {
            id: UserId::new(1),
            role: Role::BranchManager,
            branch_id: Some(BranchId::new(2)),
        };
        assert!(user.require_roles(&[Role::Admin, Role::BranchManager]).is_ok());
        assert!(matches!(
            user.require_roles(&[Role::Admin]),
            Err(AppError::Forbidden(_))
        ));
        assert!(user.is_any(&[Role::BranchManager]));
    }

    #[test]
    fn test_branch_scope() {
        let manager = AuthUser {
            id: UserId::new(1),
            role: Role::BranchManager,
            branch_id: Some(BranchId::new(2)),
        };
        assert_eq!(manager.branch_scope(None).ok(), Some(BranchId::new(2)));
        assert_eq!(manager.branch_scope(Some(BranchId::new(2))).ok(), Some(BranchId::new(2)));
        assert!(matches!(
            manager.branch_scope(Some(BranchId::new(3))),
            Err(AppError::Forbidden(_))
        ));

        let admin = AuthUser {
            id: UserId::new(9),
            role: Role::Admin,
            branch_id: None,
        };
        assert_eq!(admin.branch_scope(Some(BranchId::new(3))).ok(), Some(BranchId::new(3)));
        assert!(matches!(admin.branch_scope(None), Err(AppError::Domain(_))));
    }
}
