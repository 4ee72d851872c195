//! Unified error handling for the API.
//!
//! Every error leaves the server as the JSON envelope
//! `{"success": false, "message": ..., ...}`. Extra keys depend on the kind:
//! `errors` for validation, `currentStatus` for transition failures and
//! `shortages` for stock shortfalls.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use aquacycle_core::DomainError;

use crate::db::RepositoryError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// A business rule rejected the request.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// Caller's role may not use this endpoint.
    #[error("{0}")]
    Forbidden(String),

    /// Malformed request that is not a field validation failure.
    #[error("{0}")]
    BadRequest(String),

    /// Request conflicts with existing data.
    #[error("{0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a `404` naming the missing entity.
    #[must_use]
    pub fn not_found(entity: &str) -> Self {
        Self::NotFound(format!("{entity} not found"))
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Domain(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    fn body(&self) -> Value {
        let mut body = json!({
            "success": false,
            "message": self.message(),
        });

        if let Self::Domain(domain) = self {
            match domain {
                DomainError::Validation(errors) => body["errors"] = json!(errors),
                DomainError::InvalidTransition {
                    current, requested, ..
                } => {
                    body["currentStatus"] = json!(current);
                    body["requestedStatus"] = json!(requested);
                }
                DomainError::InsufficientStock(shortages) => body["shortages"] = json!(shortages),
            }
        }

        body
    }

    fn message(&self) -> String {
        match self {
            Self::Domain(DomainError::Validation(errors)) => errors
                .first()
                .map_or_else(|| "Validation failed".to_owned(), |e| e.message.clone()),
            Self::Database(RepositoryError::NotFound) => "Not found".to_owned(),
            Self::Database(RepositoryError::Conflict(message)) => message.clone(),
            _ => self.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(RepositoryError::Database(err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "request error"
            );
        }

        (status, Json(self.body())).into_response()
    }
}

/// Set the Sentry user context for the authenticated caller.
pub fn set_sentry_user(user_id: i32, role: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
        scope.set_tag("user.role", role);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use aquacycle_core::{FieldError, OrderStatus, stock::Shortage};

    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(AppError::not_found("Order").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Unauthorized("no token".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden("nope".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::Database(RepositoryError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Database(RepositoryError::Conflict("dup".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Database(RepositoryError::DataCorruption("bad".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Domain(DomainError::field("items", "required")).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_validation_envelope() {
        let err = AppError::Domain(DomainError::Validation(vec![
            FieldError::new("items", "at least one item is required"),
            FieldError::new("notes", "too long"),
        ]));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "at least one item is required");
        assert_eq!(body["errors"][1]["field"], "notes");
    }

    #[tokio::test]
    async fn test_transition_envelope_carries_current_status() {
        let err = AppError::from(DomainError::transition(
            "order",
            OrderStatus::Accepted,
            OrderStatus::Shipped,
        ));
        let body = body_json(err.into_response()).await;
        assert_eq!(body["currentStatus"], "Accepted");
        assert_eq!(body["requestedStatus"], "Shipped");
        assert_eq!(body["message"], "cannot move order from Accepted to Shipped");
    }

    #[tokio::test]
    async fn test_shortage_envelope() {
        let err = AppError::from(DomainError::InsufficientStock(vec![Shortage {
            item_name: "RO Membranes".into(),
            available: 4,
            required: 10,
        }]));
        let body = body_json(err.into_response()).await;
        assert_eq!(body["shortages"][0]["available"], 4);
        assert_eq!(body["shortages"][0]["required"], 10);
    }

    #[tokio::test]
    async fn test_conflict_message_is_exposed() {
        let err = AppError::from(RepositoryError::Conflict("email already exists".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["message"], "email already exists");
    }
}
