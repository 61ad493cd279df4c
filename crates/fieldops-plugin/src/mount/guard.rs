//! Middleware wrapped around every mounted plugin router.
//!
//! The enable check consults the catalog on each request, so enabling or
//! disabling a plugin takes effect without remounting anything.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, error};

use fieldops_core::TenantId;
use fieldops_database::PluginCatalog;
use fieldops_entity::plugin::PluginAvailability;

use super::error_response;
use crate::api::context::{PluginRequestContext, TenantDataAccess};

/// State for [`enable_check`].
#[derive(Clone)]
pub struct GuardState {
    /// Plugin the router belongs to.
    pub plugin: Arc<str>,
    /// Catalog consulted per request.
    pub catalog: Arc<dyn PluginCatalog>,
}

/// State for [`inject_context`].
#[derive(Clone)]
pub struct ContextState {
    /// Plugin the router belongs to.
    pub plugin: Arc<str>,
    /// Tenant data handle.
    pub data: Arc<dyn TenantDataAccess>,
}

/// Rejects requests for plugins the tenant has not installed and enabled.
pub async fn enable_check(
    State(state): State<GuardState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(tenant) = request.extensions().get::<TenantId>().cloned() else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "AUTHENTICATION",
            "Tenant could not be resolved",
        );
    };

    match availability_rejection(state.catalog.as_ref(), &tenant, &state.plugin).await {
        Some(rejection) => rejection,
        None => next.run(request).await,
    }
}

/// The response for a request `tenant` may not make to `plugin`, or `None`
/// when the plugin is installed and enabled for it.
pub(crate) async fn availability_rejection(
    catalog: &dyn PluginCatalog,
    tenant: &TenantId,
    plugin: &str,
) -> Option<Response> {
    match catalog.availability(tenant, plugin).await {
        Ok(PluginAvailability::Enabled) => None,
        Ok(PluginAvailability::Unknown) => Some(error_response(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "plugin not found",
        )),
        Ok(availability) => {
            debug!(
                tenant = %tenant,
                plugin = %plugin,
                availability = ?availability,
                "Request to inactive plugin rejected"
            );
            Some(inactive_response())
        }
        Err(e) => {
            error!(tenant = %tenant, plugin = %plugin, error = %e, "Enable check failed");
            Some(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "Plugin availability could not be determined",
            ))
        }
    }
}

/// Response for a plugin the tenant has not installed or has disabled.
pub(crate) fn inactive_response() -> Response {
    error_response(StatusCode::FORBIDDEN, "AUTHORIZATION", "plugin disabled")
}

/// Makes tenant, plugin name and data handle available to the handler.
pub async fn inject_context(
    State(state): State<ContextState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(tenant) = request.extensions().get::<TenantId>().cloned() else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "AUTHENTICATION",
            "Tenant could not be resolved",
        );
    };

    request.extensions_mut().insert(PluginRequestContext {
        tenant,
        plugin: state.plugin.to_string(),
        data: state.data.clone(),
    });
    next.run(request).await
}
