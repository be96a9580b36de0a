//! Domain error taxonomy
//!
//! Every operation of the document engine fails with one of these categories.
//! The backend maps them onto HTTP statuses; nothing here is fatal to a process.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Errors raised by document transitions and ledger arithmetic
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainError {
    /// Malformed input; always recoverable by fixing the named field
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    /// Role or ownership check failed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// State-machine violation; carries the state the document is actually in
    #[error("Conflict: {message} (current state: {current_state})")]
    Conflict {
        message: String,
        current_state: String,
    },

    /// A referenced document, product or user does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Stock Out quantity exceeds what the ledger currently shows as available
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: i64,
        requested: Decimal,
        available: Decimal,
    },
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        DomainError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>, current_state: impl ToString) -> Self {
        DomainError::Conflict {
            message: message.into(),
            current_state: current_state.to_string(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        DomainError::NotFound(resource.into())
    }

    /// Short machine-readable category name
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation { .. } => "VALIDATION_ERROR",
            DomainError::Forbidden(_) => "FORBIDDEN",
            DomainError::Conflict { .. } => "CONFLICT",
            DomainError::NotFound(_) => "NOT_FOUND",
            DomainError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
        }
    }
}

/// Result alias used throughout the domain crate
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_carries_current_state() {
        let err = DomainError::conflict("already verified", "verified");
        assert_eq!(err.code(), "CONFLICT");
        assert_eq!(
            err.to_string(),
            "Conflict: already verified (current state: verified)"
        );
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let err = DomainError::validation("quantity", "Quantity must be positive");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "validation");
        assert_eq!(json["field"], "quantity");
    }
}
