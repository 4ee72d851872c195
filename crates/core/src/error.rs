//! Rule violations raised by the pure domain layer.

use serde::Serialize;
use thiserror::Error;

use crate::stock::Shortage;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// JSON field name (camelCase, dotted for nested items).
    pub field: String,
    /// Human readable message.
    pub message: String,
}

impl FieldError {
    /// Create a field error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors raised when a business rule rejects an operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    /// Input failed validation.
    #[error("validation failed ({} field errors)", .0.len())]
    Validation(Vec<FieldError>),

    /// The entity is not in a status that allows the requested transition.
    #[error("cannot move {entity} from {current} to {requested}")]
    InvalidTransition {
        /// Entity kind, e.g. `order`.
        entity: &'static str,
        /// Stored status label.
        current: String,
        /// Requested status label.
        requested: String,
    },

    /// One or more line items cannot be covered by available stock.
    #[error("insufficient stock for {} item(s)", .0.len())]
    InsufficientStock(Vec<Shortage>),
}

impl DomainError {
    /// Shorthand for a single-field validation error.
    #[must_use]
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// Build an `InvalidTransition` from any displayable statuses.
    #[must_use]
    pub fn transition(
        entity: &'static str,
        current: impl ToString,
        requested: impl ToString,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            current: current.to_string(),
            requested: requested.to_string(),
        }
    }
}
