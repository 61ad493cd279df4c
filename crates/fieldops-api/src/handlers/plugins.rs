//! Plugin management handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;

use fieldops_core::error::AppError;
use fieldops_entity::plugin::{InstalledPlugin, PluginDescriptor};
use fieldops_plugin::ReloadReport;
use fieldops_plugin::manager::PluginUi;

use crate::dto::request::{
    ConfigurePluginRequest, InstallPluginRequest, parse_optional, parse_required,
};
use crate::dto::response::{ApiResponse, LoadedPluginsResponse, MessageResponse};
use crate::error::ApiError;
use crate::extractors::{PluginIdPath, TenantContext};
use crate::state::AppState;

/// Multipart field carrying the bundle.
const BUNDLE_FIELD: &str = "bundle";

/// GET /api/plugins
pub async fn list_catalog(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<PluginDescriptor>>>, ApiError> {
    let plugins = state.plugin_service.list_catalog().await?;
    Ok(Json(ApiResponse::ok(plugins)))
}

/// GET /api/plugins/installed
pub async fn list_installed(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<ApiResponse<Vec<InstalledPlugin>>>, ApiError> {
    let installed = state.plugin_service.list_installed(&ctx).await?;
    Ok(Json(ApiResponse::ok(installed)))
}

/// GET /api/plugins/loaded
pub async fn list_loaded(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Json<ApiResponse<LoadedPluginsResponse>> {
    let details = state.plugin_service.loaded(&ctx).await;
    let mounted = state.plugin_service.mounted_routes(&ctx).await;
    Json(ApiResponse::ok(LoadedPluginsResponse {
        plugins: details.iter().map(|p| p.name.clone()).collect(),
        details,
        mounted,
    }))
}

/// GET /api/plugins/ui
pub async fn ui_declarations(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Json<ApiResponse<Vec<PluginUi>>> {
    Json(ApiResponse::ok(state.plugin_service.ui_declarations(&ctx).await))
}

/// POST /api/plugins/{id}/install
pub async fn install(
    State(state): State<AppState>,
    ctx: TenantContext,
    PluginIdPath(id): PluginIdPath,
    body: Bytes,
) -> Result<Json<ApiResponse<InstalledPlugin>>, ApiError> {
    let req: InstallPluginRequest = parse_optional(&body)?;
    let installed = state
        .plugin_service
        .install(&ctx, id, req.configuration)
        .await?;
    Ok(Json(ApiResponse::ok(installed)))
}

/// POST /api/plugins/{id}/uninstall
pub async fn uninstall(
    State(state): State<AppState>,
    ctx: TenantContext,
    PluginIdPath(id): PluginIdPath,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.plugin_service.uninstall(&ctx, id).await?;
    Ok(Json(ApiResponse::ok(MessageResponse::new(
        "Plugin uninstalled",
    ))))
}

/// DELETE /api/plugins/{id}
pub async fn delete_plugin(
    State(state): State<AppState>,
    PluginIdPath(id): PluginIdPath,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.plugin_service.delete(id).await?;
    Ok(Json(ApiResponse::ok(MessageResponse::new("Plugin deleted"))))
}

/// POST /api/plugins/{id}/enable
pub async fn enable(
    State(state): State<AppState>,
    ctx: TenantContext,
    PluginIdPath(id): PluginIdPath,
) -> Result<Json<ApiResponse<InstalledPlugin>>, ApiError> {
    let installed = state.plugin_service.enable(&ctx, id).await?;
    Ok(Json(ApiResponse::ok(installed)))
}

/// POST /api/plugins/{id}/disable
pub async fn disable(
    State(state): State<AppState>,
    ctx: TenantContext,
    PluginIdPath(id): PluginIdPath,
) -> Result<Json<ApiResponse<InstalledPlugin>>, ApiError> {
    let installed = state.plugin_service.disable(&ctx, id).await?;
    Ok(Json(ApiResponse::ok(installed)))
}

/// PUT /api/plugins/{id}/configure
pub async fn configure(
    State(state): State<AppState>,
    ctx: TenantContext,
    PluginIdPath(id): PluginIdPath,
    body: Bytes,
) -> Result<Json<ApiResponse<InstalledPlugin>>, ApiError> {
    let req: ConfigurePluginRequest = parse_required(&body)?;
    let installed = state
        .plugin_service
        .configure(&ctx, id, req.configuration)
        .await?;
    Ok(Json(ApiResponse::ok(installed)))
}

/// POST /api/plugins/upload (multipart, field `bundle`)
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<PluginDescriptor>>), ApiError> {
    let mut bundle: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Multipart error: {e}")))?
    {
        if field.name() == Some(BUNDLE_FIELD) {
            bundle = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation(format!("Read error: {e}")))?,
            );
        }
    }

    let bundle = bundle
        .ok_or_else(|| AppError::validation(format!("Missing '{BUNDLE_FIELD}' field")))?;
    let plugin = state.plugin_service.upload(bundle.to_vec()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(plugin))))
}

/// POST /api/plugins/reload
pub async fn reload(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Json<ApiResponse<ReloadReport>> {
    Json(ApiResponse::ok(state.plugin_service.reload_all(&ctx).await))
}
