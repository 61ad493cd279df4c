//! Route mounting: per-plugin routers behind the enable check.

pub mod controller;
pub mod guard;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub use controller::{MountedRouter, MountedRoutes, RouteMountController};

/// JSON error body in the same shape the management API uses.
pub(crate) fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": code, "message": message })),
    )
        .into_response()
}
