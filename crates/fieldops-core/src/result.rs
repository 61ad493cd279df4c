//! Convenience result type alias for FieldOps.

use crate::error::AppError;

/// A specialized `Result` type for FieldOps operations.
pub type AppResult<T> = Result<T, AppError>;
