//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use fieldops_core::config::AppConfig;
use fieldops_plugin::PluginHost;
use fieldops_service::PluginAdminService;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Tenant plugin host.
    pub host: Arc<PluginHost>,
    /// Plugin management service.
    pub plugin_service: Arc<PluginAdminService>,
    /// When the server started.
    pub started_at: Instant,
}

impl AppState {
    /// Creates the state around a plugin host.
    pub fn new(config: AppConfig, host: Arc<PluginHost>, plugin_service: PluginAdminService) -> Self {
        Self {
            config: Arc::new(config),
            host,
            plugin_service: Arc::new(plugin_service),
            started_at: Instant::now(),
        }
    }
}
