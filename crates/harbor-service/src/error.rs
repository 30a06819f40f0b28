//! # Service Error Types
//!
//! One error type for callers of the service layer.
//!
//! ## Layering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  ValidationError ──► CoreError ──┐                                  │
//! │                                  ├──► ServiceError ──► caller       │
//! │  sqlx::Error ──────► DbError ────┘                                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//! Domain failures (insufficient stock, illegal transitions, missing
//! variants) arrive as [`CoreError`]; storage failures as [`DbError`].
//! Both convert with `?`.

use thiserror::Error;

use harbor_core::{CoreError, ValidationError};
use harbor_db::DbError;

/// Errors surfaced by the service layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Business rule violation.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Storage failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Domain(CoreError::Validation(err))
    }
}

impl ServiceError {
    /// True when the error is a domain-level state error that left the
    /// entity untouched.
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            ServiceError::Domain(
                CoreError::InvalidTransition { .. }
                    | CoreError::AlreadyCancelled { .. }
                    | CoreError::DanglingLineItem { .. }
            )
        )
    }
}

/// Convenience type alias for Results with ServiceError.
pub type ServiceResult<T> = Result<T, ServiceError>;
