//! Store error types.

use chronolock_core::GateError;
use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend closed, unreachable, or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Backend refused the operation (e.g. wrong value type under a key).
    #[error("store rejected operation: {0}")]
    Rejected(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}
