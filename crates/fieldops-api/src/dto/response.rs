//! Response DTOs.

use serde::{Deserialize, Serialize};

use fieldops_plugin::mount::MountedRoutes;
use fieldops_plugin::registry::LoadedPluginInfo;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Simple message response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Message.
    pub message: String,
}

impl MessageResponse {
    /// Creates a message response.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status string.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Seconds since startup.
    pub uptime_seconds: u64,
}

/// Loaded plugins of a tenant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedPluginsResponse {
    /// Loaded plugin names.
    pub plugins: Vec<String>,
    /// Per-plugin details.
    pub details: Vec<LoadedPluginInfo>,
    /// Currently mounted routes.
    pub mounted: Vec<MountedRoutes>,
}
