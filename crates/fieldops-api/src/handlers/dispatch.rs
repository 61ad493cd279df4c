//! Forwards `/api/plugins/{name}/{path}` to the tenant's mounted plugin router.

use axum::extract::{Request, State};
use axum::http::Uri;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use fieldops_core::error::AppError;

use crate::error::ApiError;
use crate::extractors::tenant::resolve_tenant;
use crate::state::AppState;

/// Prefix under which plugin feature routes live.
const PLUGIN_PREFIX: &str = "/api/plugins/";

/// Fallback handler: serves plugin feature routes, 404 for anything else.
pub async fn dispatch_plugin_route(State(state): State<AppState>, request: Request) -> Response {
    let Some((plugin, path)) = split_plugin_path(request.uri().path()) else {
        return ApiError(AppError::not_found("route not found")).into_response();
    };

    let tenant = match resolve_tenant(request.headers(), &state.config.plugins.tenant_header) {
        Ok(tenant) => tenant,
        Err(e) => return ApiError(e).into_response(),
    };

    let (mut parts, body) = request.into_parts();
    let target = match parts.uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };
    parts.uri = match target.parse::<Uri>() {
        Ok(uri) => uri,
        Err(e) => {
            return ApiError(AppError::validation(format!("Invalid request path: {e}")))
                .into_response();
        }
    };

    debug!(tenant = %tenant, plugin = %plugin, method = %parts.method, path = %parts.uri.path(), "Dispatching plugin request");
    state
        .host
        .dispatch(&tenant, &plugin, Request::from_parts(parts, body))
        .await
}

/// Splits `/api/plugins/{name}/{rest}` into `(name, "/{rest}")`.
fn split_plugin_path(path: &str) -> Option<(String, String)> {
    let tail = path.strip_prefix(PLUGIN_PREFIX)?;
    let (name, rest) = match tail.split_once('/') {
        Some((name, rest)) => (name, format!("/{rest}")),
        None => (tail, "/".to_string()),
    };
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plugin_path() {
        assert_eq!(
            split_plugin_path("/api/plugins/time-clock/clock-in"),
            Some(("time-clock".to_string(), "/clock-in".to_string()))
        );
        assert_eq!(
            split_plugin_path("/api/plugins/time-clock/entries/42"),
            Some(("time-clock".to_string(), "/entries/42".to_string()))
        );
        assert_eq!(
            split_plugin_path("/api/plugins/time-clock"),
            Some(("time-clock".to_string(), "/".to_string()))
        );
        assert_eq!(split_plugin_path("/api/plugins/"), None);
        assert_eq!(split_plugin_path("/api/other"), None);
    }
}
