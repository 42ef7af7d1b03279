//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures. Any variant
/// raised mid-operation aborts the whole operation; no partial state escapes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. empty name, non-positive quantity,
    /// malformed actuals).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The acting principal lacks the permission the operation requires.
    #[error("permission denied")]
    PermissionDenied,

    /// A requested resource was not found, or belongs to another tenant.
    #[error("not found")]
    NotFound,

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The operation is illegal from the job's current status
    /// (e.g. voiding a completed job).
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Actual usage at completion exceeds current on-hand stock. Fatal only
    /// at completion time; approval-time shortage is a blocked outcome, not
    /// an error.
    #[error("insufficient inventory: {0}")]
    InsufficientInventory(String),

    /// The caller expected fulfillability but the authoritative recheck
    /// found a shortfall: availability changed between an advisory check
    /// and this one.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidStateTransition(msg.into())
    }

    pub fn insufficient(msg: impl Into<String>) -> Self {
        Self::InsufficientInventory(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::ConcurrencyConflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
