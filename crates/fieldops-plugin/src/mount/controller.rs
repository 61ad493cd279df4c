//! Route mount controller.
//!
//! Owns the mounted set: one axum router per plugin name, each wrapped in
//! the enable check and context injection. Refreshing builds the new table
//! first and swaps it in under a single write lock, so a reader sees either
//! the old table or the new one.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::to_bytes;
use axum::extract::{FromRequestParts, Query, RawPathParams, Request};
use axum::http::{Method, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::RwLock;
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

use fieldops_core::TenantId;
use fieldops_database::PluginCatalog;
use fieldops_entity::plugin::PluginAvailability;

use super::error_response;
use super::guard::{ContextState, GuardState, enable_check, inactive_response, inject_context};
use crate::api::context::{PluginRequestContext, TenantDataAccess};
use crate::error::panic_message;
use crate::manager::PluginRouteEntry;
use crate::module::{PluginRequest, PluginRoute, RouteHandler};

/// Largest request body handed to a plugin route.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// A plugin's router and the routes it serves.
#[derive(Clone)]
pub struct MountedRouter {
    /// Plugin name.
    pub plugin_name: String,
    /// Router with guards applied.
    pub router: Router,
    /// `(method, path)` pairs actually mounted.
    pub routes: Vec<(Method, String)>,
}

impl std::fmt::Debug for MountedRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountedRouter")
            .field("plugin_name", &self.plugin_name)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

/// Introspection view of one mounted plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountedRoutes {
    /// Plugin name.
    pub plugin: String,
    /// `METHOD /path` entries.
    pub routes: Vec<String>,
}

/// Mounts plugin routes for one tenant.
pub struct RouteMountController {
    /// Catalog consulted by the enable check.
    catalog: Arc<dyn PluginCatalog>,
    /// Data handle injected into plugin requests.
    data: Arc<dyn TenantDataAccess>,
    /// Plugin name → mounted router.
    mounted: RwLock<BTreeMap<String, MountedRouter>>,
}

impl RouteMountController {
    /// Creates a controller with nothing mounted.
    pub fn new(catalog: Arc<dyn PluginCatalog>, data: Arc<dyn TenantDataAccess>) -> Self {
        Self {
            catalog,
            data,
            mounted: RwLock::new(BTreeMap::new()),
        }
    }

    /// Mounts `routes`, replacing routers of the plugins they belong to.
    /// Returns a warning per skipped route or plugin.
    pub async fn mount(&self, routes: Vec<PluginRouteEntry>) -> Vec<String> {
        let (table, warnings) = self.build_table(routes);
        self.mounted.write().await.extend(table);
        warnings
    }

    /// Removes every mounted router.
    pub async fn unmount_all(&self) {
        let mut mounted = self.mounted.write().await;
        if !mounted.is_empty() {
            debug!(count = mounted.len(), "Plugin routers unmounted");
        }
        mounted.clear();
    }

    /// Replaces the mounted set with routers built from `routes`.
    pub async fn refresh(&self, routes: Vec<PluginRouteEntry>) -> Vec<String> {
        let (table, warnings) = self.build_table(routes);
        let mut mounted = self.mounted.write().await;
        *mounted = table;
        info!(
            plugins = mounted.len(),
            warnings = warnings.len(),
            "Plugin routes refreshed"
        );
        warnings
    }

    /// Router mounted for `plugin`.
    pub async fn router_for(&self, plugin: &str) -> Option<Router> {
        self.mounted
            .read()
            .await
            .get(plugin)
            .map(|m| m.router.clone())
    }

    /// Whether `plugin` has a mounted router.
    pub async fn is_mounted(&self, plugin: &str) -> bool {
        self.mounted.read().await.contains_key(plugin)
    }

    /// Mounted plugins and their routes, by plugin name.
    pub async fn mounted_routes(&self) -> Vec<MountedRoutes> {
        self.mounted
            .read()
            .await
            .values()
            .map(|m| MountedRoutes {
                plugin: m.plugin_name.clone(),
                routes: m
                    .routes
                    .iter()
                    .map(|(method, path)| format!("{method} {path}"))
                    .collect(),
            })
            .collect()
    }

    /// Serves `request` with the router mounted for `plugin`.
    ///
    /// The request path must already be relative to the plugin namespace
    /// and carry the tenant in its extensions. Without a mounted router the
    /// tenant still gets 403 for an installed-but-disabled or not installed
    /// plugin, and 404 otherwise.
    pub async fn handle(&self, plugin: &str, request: Request) -> Response {
        let Some(router) = self.router_for(plugin).await else {
            return self.unmounted(plugin, request).await;
        };
        match router.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    async fn unmounted(&self, plugin: &str, request: Request) -> Response {
        if let Some(tenant) = request.extensions().get::<TenantId>() {
            match self.catalog.availability(tenant, plugin).await {
                Ok(PluginAvailability::NotInstalled | PluginAvailability::Disabled) => {
                    return inactive_response();
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(tenant = %tenant, plugin = %plugin, error = %e, "Enable check failed");
                }
            }
        }
        error_response(StatusCode::NOT_FOUND, "NOT_FOUND", "plugin not found")
    }

    fn build_table(
        &self,
        routes: Vec<PluginRouteEntry>,
    ) -> (BTreeMap<String, MountedRouter>, Vec<String>) {
        let mut groups: BTreeMap<String, Vec<PluginRoute>> = BTreeMap::new();
        for entry in routes {
            groups.entry(entry.plugin_name).or_default().push(entry.route);
        }

        let mut warnings = Vec::new();
        let mut table = BTreeMap::new();
        for (plugin, routes) in groups {
            if let Some(mounted) = self.build_router(&plugin, routes, &mut warnings) {
                table.insert(plugin, mounted);
            }
        }
        (table, warnings)
    }

    fn build_router(
        &self,
        plugin: &str,
        routes: Vec<PluginRoute>,
        warnings: &mut Vec<String>,
    ) -> Option<MountedRouter> {
        let mut seen = HashSet::new();
        let mut by_path: BTreeMap<String, Vec<(MethodFilter, RouteTarget)>> = BTreeMap::new();
        let mut mounted = Vec::new();

        for route in routes {
            let path = normalize_path(&route.path);
            if !seen.insert((route.method.clone(), path.clone())) {
                warn!(plugin = %plugin, method = %route.method, path = %path, "Duplicate plugin route skipped");
                warnings.push(format!(
                    "{plugin}: duplicate route {} {path} skipped",
                    route.method
                ));
                continue;
            }
            let Ok(filter) = MethodFilter::try_from(route.method.clone()) else {
                warn!(plugin = %plugin, method = %route.method, path = %path, "Unsupported method skipped");
                warnings.push(format!(
                    "{plugin}: unsupported method {} on {path} skipped",
                    route.method
                ));
                continue;
            };

            let target = RouteTarget {
                plugin: plugin.to_string(),
                method: route.method.clone(),
                path: path.clone(),
                handler: route.handler,
            };
            by_path.entry(path.clone()).or_default().push((filter, target));
            mounted.push((route.method, path));
        }

        let guard = GuardState {
            plugin: Arc::from(plugin),
            catalog: self.catalog.clone(),
        };
        let context = ContextState {
            plugin: Arc::from(plugin),
            data: self.data.clone(),
        };

        // axum panics on malformed or conflicting paths
        let built = std::panic::catch_unwind(AssertUnwindSafe(move || {
            let mut router = Router::new();
            for (path, targets) in by_path {
                let mut method_router: MethodRouter = MethodRouter::new();
                for (filter, target) in targets {
                    method_router = method_router.on(filter, move |request: Request| {
                        let target = target.clone();
                        async move { target.serve(request).await }
                    });
                }
                router = router.route(&path, method_router);
            }
            router
                .fallback(route_not_found)
                .layer(middleware::from_fn_with_state(context, inject_context))
                .layer(middleware::from_fn_with_state(guard, enable_check))
        }));

        match built {
            Ok(router) => {
                debug!(plugin = %plugin, routes = mounted.len(), "Plugin router built");
                Some(MountedRouter {
                    plugin_name: plugin.to_string(),
                    router,
                    routes: mounted,
                })
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!(plugin = %plugin, error = %reason, "Plugin router could not be built, skipped");
                warnings.push(format!("{plugin}: routes not mounted: {reason}"));
                None
            }
        }
    }
}

impl std::fmt::Debug for RouteMountController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteMountController").finish_non_exhaustive()
    }
}

/// One plugin route bound to its handler.
#[derive(Clone)]
struct RouteTarget {
    plugin: String,
    method: Method,
    path: String,
    handler: Arc<dyn RouteHandler>,
}

impl RouteTarget {
    async fn serve(self, request: Request) -> Response {
        let (mut parts, body) = request.into_parts();

        let Some(ctx) = parts.extensions.get::<PluginRequestContext>().cloned() else {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "Plugin request context missing",
            );
        };

        let params: HashMap<String, String> =
            match RawPathParams::from_request_parts(&mut parts, &()).await {
                Ok(raw) => raw
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                Err(_) => HashMap::new(),
            };
        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();

        let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(_) => {
                return error_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "VALIDATION",
                    "Request body too large",
                );
            }
        };
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(value) => value,
                Err(_) => {
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        "VALIDATION",
                        "Request body must be JSON",
                    );
                }
            }
        };

        let request = PluginRequest {
            tenant: ctx.tenant,
            plugin: ctx.plugin,
            data: ctx.data,
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            params,
            query,
            headers: parts.headers,
            body,
        };

        match AssertUnwindSafe(self.handler.call(request))
            .catch_unwind()
            .await
        {
            Ok(Ok(response)) => (response.status, Json(response.body)).into_response(),
            Ok(Err(e)) => {
                error!(
                    plugin = %self.plugin,
                    method = %self.method,
                    path = %self.path,
                    error = %e,
                    "Plugin route handler failed"
                );
                plugin_failure()
            }
            Err(panic) => {
                error!(
                    plugin = %self.plugin,
                    method = %self.method,
                    path = %self.path,
                    panic = %panic_message(panic.as_ref()),
                    "Plugin route handler panicked"
                );
                plugin_failure()
            }
        }
    }
}

fn plugin_failure() -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "PLUGIN",
        "The plugin failed to handle the request",
    )
}

async fn route_not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "NOT_FOUND", "route not found")
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("clock-in"), "/clock-in");
        assert_eq!(normalize_path("/entries/{id}"), "/entries/{id}");
        assert_eq!(normalize_path(""), "/");
    }
}
