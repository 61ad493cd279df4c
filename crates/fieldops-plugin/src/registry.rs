//! Plugin registry: the instance table of loaded plugins.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use fieldops_core::TenantId;

use crate::module::{PluginModule, PluginRoute, UiDeclarations};

/// A plugin instance live for one tenant.
pub struct LoadedPlugin {
    /// Plugin name (table key).
    pub name: String,
    /// Catalog id.
    pub plugin_id: Uuid,
    /// Catalog version at load time.
    pub version: String,
    /// Tenant configuration at load time.
    pub config: serde_json::Value,
    /// Tenant (company) code.
    pub company_code: TenantId,
    /// The module instance.
    pub module: Arc<dyn PluginModule>,
    /// Declared routes.
    pub routes: Vec<PluginRoute>,
    /// Events the plugin registered hooks for.
    pub hooks: Vec<String>,
    /// Declared UI extension points.
    pub ui: UiDeclarations,
    /// When the instance was loaded.
    pub loaded_at: DateTime<Utc>,
}

impl LoadedPlugin {
    /// Serializable summary.
    pub fn info(&self) -> LoadedPluginInfo {
        LoadedPluginInfo {
            name: self.name.clone(),
            plugin_id: self.plugin_id,
            version: self.version.clone(),
            routes: self
                .routes
                .iter()
                .map(|r| format!("{} {}", r.method, r.path))
                .collect(),
            hooks: self.hooks.clone(),
            loaded_at: self.loaded_at,
        }
    }
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("name", &self.name)
            .field("plugin_id", &self.plugin_id)
            .field("version", &self.version)
            .field("company_code", &self.company_code)
            .field("routes", &self.routes)
            .field("hooks", &self.hooks)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}

/// Summary of a loaded plugin for introspection endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedPluginInfo {
    /// Plugin name.
    pub name: String,
    /// Catalog id.
    pub plugin_id: Uuid,
    /// Version at load time.
    pub version: String,
    /// `METHOD /path` for each declared route.
    pub routes: Vec<String>,
    /// Events with registered hooks.
    pub hooks: Vec<String>,
    /// Load time.
    pub loaded_at: DateTime<Utc>,
}

/// Instance table keyed by plugin name.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    /// Plugin name → instance.
    plugins: RwLock<BTreeMap<String, Arc<LoadedPlugin>>>,
}

impl PluginRegistry {
    /// Creates a new empty plugin registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an instance, returning the one it replaced.
    pub async fn insert(&self, plugin: LoadedPlugin) -> Option<Arc<LoadedPlugin>> {
        let mut plugins = self.plugins.write().await;
        plugins.insert(plugin.name.clone(), Arc::new(plugin))
    }

    /// Removes an instance by name.
    pub async fn remove(&self, name: &str) -> Option<Arc<LoadedPlugin>> {
        self.plugins.write().await.remove(name)
    }

    /// Gets an instance by name.
    pub async fn get(&self, name: &str) -> Option<Arc<LoadedPlugin>> {
        self.plugins.read().await.get(name).cloned()
    }

    /// Checks whether a plugin is loaded.
    pub async fn contains(&self, name: &str) -> bool {
        self.plugins.read().await.contains_key(name)
    }

    /// Loaded plugin names, sorted.
    pub async fn names(&self) -> Vec<String> {
        self.plugins.read().await.keys().cloned().collect()
    }

    /// All instances ordered by name.
    pub async fn all(&self) -> Vec<Arc<LoadedPlugin>> {
        self.plugins.read().await.values().cloned().collect()
    }

    /// Returns plugin count.
    pub async fn count(&self) -> usize {
        self.plugins.read().await.len()
    }
}
