//! Plugin system configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Plugin system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Directory holding one sub-directory per plugin name.
    #[serde(default = "default_plugin_directory")]
    pub directory: String,
    /// Whether to load enabled plugins for preloaded tenants on startup.
    #[serde(default = "default_true")]
    pub auto_load: bool,
    /// Header carrying the tenant (company) code.
    #[serde(default = "default_tenant_header")]
    pub tenant_header: String,
    /// Upper bound for `initialize`/`cleanup`/install callbacks.
    #[serde(default = "default_lifecycle_timeout")]
    pub lifecycle_timeout_seconds: u64,
    /// Upper bound for a single hook handler.
    #[serde(default = "default_hook_timeout")]
    pub hook_timeout_seconds: u64,
    /// Tenants whose plugins are loaded and mounted at startup.
    #[serde(default)]
    pub preload_tenants: Vec<String>,
    /// Maximum accepted size of an uploaded plugin bundle.
    #[serde(default = "default_max_bundle_size")]
    pub max_bundle_size_bytes: u64,
    /// Require `<directory>/<name>/plugin.json` before a module resolves.
    #[serde(default = "default_true")]
    pub require_artifact: bool,
}

impl PluginConfig {
    /// Lifecycle callback timeout as a `Duration`.
    pub fn lifecycle_timeout(&self) -> Duration {
        Duration::from_secs(self.lifecycle_timeout_seconds)
    }

    /// Hook handler timeout as a `Duration`.
    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs(self.hook_timeout_seconds)
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            directory: default_plugin_directory(),
            auto_load: true,
            tenant_header: default_tenant_header(),
            lifecycle_timeout_seconds: default_lifecycle_timeout(),
            hook_timeout_seconds: default_hook_timeout(),
            preload_tenants: Vec::new(),
            max_bundle_size_bytes: default_max_bundle_size(),
            require_artifact: true,
        }
    }
}

fn default_plugin_directory() -> String {
    "./plugins".to_string()
}

fn default_tenant_header() -> String {
    "x-tenant-id".to_string()
}

fn default_lifecycle_timeout() -> u64 {
    5
}

fn default_hook_timeout() -> u64 {
    30
}

fn default_max_bundle_size() -> u64 {
    20 * 1024 * 1024
}

fn default_true() -> bool {
    true
}
