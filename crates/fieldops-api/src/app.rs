//! Application builder: wires the catalog backend, plugin host and services
//! into an Axum app and serves it.

use std::sync::Arc;

use axum::Router;
use tracing::{error, info, warn};

use fieldops_core::TenantId;
use fieldops_core::config::{AppConfig, DatabaseBackend};
use fieldops_core::error::AppError;
use fieldops_core::result::AppResult;
use fieldops_database::repositories::PluginDocumentRepository;
use fieldops_database::{
    DatabasePool, InMemoryPluginCatalog, PgPluginCatalog, PluginCatalog, migration,
};
use fieldops_plugin::api::{MemoryDataProvider, PgDataProvider};
use fieldops_plugin::{BuiltinModuleLoader, PluginHost, TenantDataProvider};
use fieldops_service::{BundleInstaller, PluginAdminService};

use crate::router::build_router;
use crate::state::AppState;

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    build_router(state)
}

/// Connects the catalog backend and assembles the application state.
///
/// `loader` carries the compiled-in plugin modules; it is bound to the
/// plugin directory when artifacts are required.
pub async fn build_state(config: AppConfig, loader: BuiltinModuleLoader) -> AppResult<AppState> {
    tokio::fs::create_dir_all(&config.plugins.directory)
        .await
        .map_err(|e| {
            AppError::storage(format!(
                "Failed to create plugin directory '{}': {e}",
                config.plugins.directory
            ))
        })?;

    let (catalog, data): (Arc<dyn PluginCatalog>, Arc<dyn TenantDataProvider>) =
        match config.database.backend {
            DatabaseBackend::Postgres => {
                let db = DatabasePool::connect(&config.database).await?;
                migration::run_migrations(db.pool()).await?;
                let pool = db.pool().clone();
                (
                    Arc::new(PgPluginCatalog::new(pool.clone())),
                    Arc::new(PgDataProvider::new(PluginDocumentRepository::new(pool))),
                )
            }
            DatabaseBackend::Memory => {
                warn!("Using the in-memory plugin catalog; nothing survives a restart");
                (
                    Arc::new(InMemoryPluginCatalog::new()),
                    Arc::new(MemoryDataProvider::new()),
                )
            }
        };

    let loader = if config.plugins.require_artifact {
        loader.with_directory(&config.plugins.directory)
    } else {
        loader
    };
    info!(modules = ?loader.module_keys(), "Plugin modules registered");

    let host = Arc::new(PluginHost::new(
        catalog.clone(),
        Arc::new(loader),
        data,
        config.plugins.clone(),
    ));
    let bundles = BundleInstaller::new(catalog, &config.plugins);
    let service = PluginAdminService::new(host.clone(), bundles);

    Ok(AppState::new(config, host, service))
}

/// Preloads configured tenants and serves HTTP until Ctrl+C.
pub async fn run_server(state: AppState) -> AppResult<()> {
    let config = state.config.clone();

    if config.plugins.auto_load {
        let tenants = config
            .plugins
            .preload_tenants
            .iter()
            .filter_map(|code| match TenantId::parse(code.as_str()) {
                Ok(tenant) => Some(tenant),
                Err(e) => {
                    warn!(tenant = %code, error = %e, "Skipping invalid preload tenant");
                    None
                }
            })
            .collect::<Vec<_>>();
        state.host.preload(&tenants).await;
    }

    let app = build_app(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    info!("FieldOps server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    info!("FieldOps server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
    }
}
