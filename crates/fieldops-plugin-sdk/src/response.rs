//! JSON response helpers.

use axum::http::StatusCode;
use serde_json::json;

use fieldops_plugin::PluginResponse;

/// `200` with `{ "success": true, "data": data }`.
pub fn ok(data: serde_json::Value) -> PluginResponse {
    PluginResponse::ok(json!({ "success": true, "data": data }))
}

/// `201` with `{ "success": true, "data": data }`.
pub fn created(data: serde_json::Value) -> PluginResponse {
    PluginResponse::created(json!({ "success": true, "data": data }))
}

/// `400` with the standard error body.
pub fn bad_request(message: &str) -> PluginResponse {
    PluginResponse::new(
        StatusCode::BAD_REQUEST,
        json!({ "error": "VALIDATION", "message": message }),
    )
}

/// `404` with the standard error body.
pub fn not_found(message: &str) -> PluginResponse {
    PluginResponse::new(
        StatusCode::NOT_FOUND,
        json!({ "error": "NOT_FOUND", "message": message }),
    )
}
