//! Service Layer Error Types
//!
//! Every hierarchy operation returns one of four error kinds, so callers can
//! tell "your request was wrong" (`NotFound`, `InvalidOperation`,
//! `Validation`) from "the system is down" (`Unavailable`).

use crate::models::ValidationError;
use thiserror::Error;

/// Hierarchy operation errors
#[derive(Error, Debug)]
pub enum HierarchyError {
    /// Referenced node does not exist
    #[error("Node not found: {id}")]
    NotFound { id: String },

    /// Operation would violate a structural invariant
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Malformed input, rejected before any store access
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Node store failed or timed out
    #[error("Node store unavailable during {operation}: {reason}")]
    Unavailable {
        operation: &'static str,
        reason: String,
    },
}

impl HierarchyError {
    /// Create a node not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an invalid operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Create an unavailable error
    pub fn unavailable(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            operation,
            reason: reason.into(),
        }
    }

    /// Whether retrying the same request could succeed
    ///
    /// The engine itself never retries; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
