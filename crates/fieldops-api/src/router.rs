//! Route definitions for the FieldOps HTTP API.
//!
//! Management routes live under `/api/plugins`; any other path under that
//! prefix falls through to the plugin dispatcher, which forwards it to the
//! tenant's mounted plugin router. A path that matches a management route
//! with a method it does not serve (`GET /api/plugins/{name}`) is forwarded
//! as well.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Multipart framing allowance on top of the bundle size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let max_body = state.config.plugins.max_bundle_size_bytes as usize + MULTIPART_OVERHEAD;
    let cors = middleware::cors::build_cors_layer(&state.config.server.cors);

    Router::new()
        .merge(health_routes())
        .merge(plugin_routes())
        .method_not_allowed_fallback(handlers::dispatch::dispatch_plugin_route)
        .fallback(handlers::dispatch::dispatch_plugin_route)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::logging::request_logging,
        ))
        .with_state(state)
}

/// Liveness endpoint.
fn health_routes() -> Router<AppState> {
    Router::new().route("/api/health", get(handlers::health::health))
}

/// Catalog, installation lifecycle, upload and reload.
fn plugin_routes() -> Router<AppState> {
    use handlers::plugins;

    Router::new()
        .route("/api/plugins", get(plugins::list_catalog))
        .route("/api/plugins/installed", get(plugins::list_installed))
        .route("/api/plugins/loaded", get(plugins::list_loaded))
        .route("/api/plugins/ui", get(plugins::ui_declarations))
        .route("/api/plugins/upload", post(plugins::upload))
        .route("/api/plugins/reload", post(plugins::reload))
        .route("/api/plugins/{id}", delete(plugins::delete_plugin))
        .route("/api/plugins/{id}/install", post(plugins::install))
        .route("/api/plugins/{id}/uninstall", post(plugins::uninstall))
        .route("/api/plugins/{id}/enable", post(plugins::enable))
        .route("/api/plugins/{id}/disable", post(plugins::disable))
        .route("/api/plugins/{id}/configure", put(plugins::configure))
}
