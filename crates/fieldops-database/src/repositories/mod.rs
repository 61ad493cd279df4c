//! PostgreSQL repository implementations.

pub mod document;
pub mod plugin;

pub use document::PluginDocumentRepository;
pub use plugin::PgPluginCatalog;

use fieldops_core::error::{AppError, ErrorKind};

/// Postgres SQLSTATE for unique violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Map a sqlx error, turning unique violations into conflicts.
pub(crate) fn map_write_error(err: sqlx::Error, context: &str, conflict: &str) -> AppError {
    let is_unique = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == UNIQUE_VIOLATION)
        .unwrap_or(false);

    if is_unique {
        AppError::with_source(ErrorKind::Conflict, conflict.to_string(), err)
    } else {
        AppError::with_source(ErrorKind::Database, context.to_string(), err)
    }
}
