//! Path extractor for catalog ids.

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use uuid::Uuid;

use fieldops_core::error::AppError;

use crate::error::ApiError;

/// The `{id}` segment of `/api/plugins/{id}/...`, parsed as a catalog id.
#[derive(Debug, Clone, Copy)]
pub struct PluginIdPath(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for PluginIdPath {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::validation(format!("Invalid path: {e}")))?;
        let id = Uuid::parse_str(&raw)
            .map_err(|_| AppError::validation(format!("Invalid plugin id '{raw}'")))?;
        Ok(Self(id))
    }
}
