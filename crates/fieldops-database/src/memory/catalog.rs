//! Catalog store kept in process memory.
//!
//! Mirrors the constraints of the PostgreSQL schema: unique plugin names,
//! one installation row per `(tenant, plugin)`, and no catalog deletion
//! while installations exist.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use fieldops_core::TenantId;
use fieldops_core::error::AppError;
use fieldops_core::result::AppResult;
use fieldops_entity::plugin::{
    InstalledPlugin, NewPlugin, PluginDescriptor, TenantPluginInstallation,
};

use crate::catalog::PluginCatalog;

#[derive(Debug, Default)]
struct Tables {
    plugins: BTreeMap<Uuid, PluginDescriptor>,
    installations: BTreeMap<(String, Uuid), TenantPluginInstallation>,
}

impl Tables {
    fn by_name(&self, name: &str) -> Option<&PluginDescriptor> {
        self.plugins.values().find(|p| p.name == name)
    }

    fn joined(&self, row: &TenantPluginInstallation) -> Option<InstalledPlugin> {
        self.plugins.get(&row.plugin_id).map(|plugin| InstalledPlugin {
            plugin: plugin.clone(),
            installation: row.clone(),
        })
    }

    fn installed_for(&self, tenant: &TenantId) -> Vec<InstalledPlugin> {
        let mut rows: Vec<InstalledPlugin> = self
            .installations
            .values()
            .filter(|row| row.tenant_id == tenant.as_str())
            .filter_map(|row| self.joined(row))
            .collect();
        rows.sort_by(|a, b| a.plugin.name.cmp(&b.plugin.name));
        rows
    }

    fn row_mut(
        &mut self,
        tenant: &TenantId,
        plugin_id: Uuid,
    ) -> AppResult<&mut TenantPluginInstallation> {
        self.installations
            .get_mut(&(tenant.as_str().to_string(), plugin_id))
            .ok_or_else(|| AppError::not_found("Plugin is not installed for this tenant"))
    }
}

/// Catalog store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryPluginCatalog {
    tables: RwLock<Tables>,
}

impl InMemoryPluginCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PluginCatalog for InMemoryPluginCatalog {
    async fn list_plugins(&self) -> AppResult<Vec<PluginDescriptor>> {
        let tables = self.tables.read().await;
        let mut plugins: Vec<PluginDescriptor> = tables.plugins.values().cloned().collect();
        plugins.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(plugins)
    }

    async fn find_plugin(&self, id: Uuid) -> AppResult<Option<PluginDescriptor>> {
        Ok(self.tables.read().await.plugins.get(&id).cloned())
    }

    async fn find_plugin_by_name(&self, name: &str) -> AppResult<Option<PluginDescriptor>> {
        Ok(self.tables.read().await.by_name(name).cloned())
    }

    async fn create_plugin(&self, plugin: NewPlugin) -> AppResult<PluginDescriptor> {
        let mut tables = self.tables.write().await;
        if tables.by_name(&plugin.name).is_some() {
            return Err(AppError::conflict(format!(
                "Plugin '{}' already exists",
                plugin.name
            )));
        }

        let descriptor = plugin.into_descriptor(Uuid::now_v7(), Utc::now());
        tables.plugins.insert(descriptor.id, descriptor.clone());
        Ok(descriptor)
    }

    async fn delete_plugin(&self, id: Uuid) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let installed = tables
            .installations
            .values()
            .filter(|row| row.plugin_id == id)
            .count();
        if installed > 0 {
            return Err(AppError::conflict(format!(
                "Plugin is still installed by {installed} tenant(s)"
            )));
        }

        tables
            .plugins
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found(format!("Plugin {id} not found")))
    }

    async fn count_installations(&self, plugin_id: Uuid) -> AppResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .installations
            .values()
            .filter(|row| row.plugin_id == plugin_id)
            .count() as u64)
    }

    async fn list_installed(&self, tenant: &TenantId) -> AppResult<Vec<InstalledPlugin>> {
        Ok(self.tables.read().await.installed_for(tenant))
    }

    async fn list_enabled(&self, tenant: &TenantId) -> AppResult<Vec<InstalledPlugin>> {
        let mut rows = self.tables.read().await.installed_for(tenant);
        rows.retain(|row| row.installation.is_enabled);
        Ok(rows)
    }

    async fn find_installed(
        &self,
        tenant: &TenantId,
        plugin_id: Uuid,
    ) -> AppResult<Option<InstalledPlugin>> {
        let tables = self.tables.read().await;
        Ok(tables
            .installations
            .get(&(tenant.as_str().to_string(), plugin_id))
            .and_then(|row| tables.joined(row)))
    }

    async fn find_installed_by_name(
        &self,
        tenant: &TenantId,
        name: &str,
    ) -> AppResult<Option<InstalledPlugin>> {
        let tables = self.tables.read().await;
        let Some(plugin) = tables.by_name(name) else {
            return Ok(None);
        };
        Ok(tables
            .installations
            .get(&(tenant.as_str().to_string(), plugin.id))
            .and_then(|row| tables.joined(row)))
    }

    async fn insert_installation(
        &self,
        tenant: &TenantId,
        plugin: &PluginDescriptor,
        configuration: serde_json::Value,
        installed_by: Option<&str>,
    ) -> AppResult<TenantPluginInstallation> {
        let mut tables = self.tables.write().await;
        if !tables.plugins.contains_key(&plugin.id) {
            return Err(AppError::not_found(format!(
                "Plugin '{}' not found",
                plugin.name
            )));
        }

        let key = (tenant.as_str().to_string(), plugin.id);
        if tables.installations.contains_key(&key) {
            return Err(AppError::conflict(format!(
                "Plugin '{}' is already installed",
                plugin.name
            )));
        }

        let now = Utc::now();
        let row = TenantPluginInstallation {
            tenant_id: tenant.as_str().to_string(),
            plugin_id: plugin.id,
            installed_version: plugin.version.clone(),
            is_enabled: true,
            configuration,
            installed_at: now,
            installed_by: installed_by.map(str::to_string),
            last_activated: Some(now),
            last_deactivated: None,
        };
        tables.installations.insert(key, row.clone());
        Ok(row)
    }

    async fn update_configuration(
        &self,
        tenant: &TenantId,
        plugin_id: Uuid,
        configuration: serde_json::Value,
    ) -> AppResult<TenantPluginInstallation> {
        let mut tables = self.tables.write().await;
        let row = tables.row_mut(tenant, plugin_id)?;
        row.configuration = configuration;
        Ok(row.clone())
    }

    async fn set_enabled(
        &self,
        tenant: &TenantId,
        plugin_id: Uuid,
        enabled: bool,
    ) -> AppResult<TenantPluginInstallation> {
        let mut tables = self.tables.write().await;
        let row = tables.row_mut(tenant, plugin_id)?;
        row.is_enabled = enabled;
        if enabled {
            row.last_activated = Some(Utc::now());
        } else {
            row.last_deactivated = Some(Utc::now());
        }
        Ok(row.clone())
    }

    async fn delete_installation(&self, tenant: &TenantId, plugin_id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .installations
            .remove(&(tenant.as_str().to_string(), plugin_id))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use fieldops_core::error::ErrorKind;
    use fieldops_entity::plugin::{PluginAvailability, PluginStatus};
    use serde_json::json;

    use super::*;

    fn new_plugin(name: &str) -> NewPlugin {
        NewPlugin {
            name: name.to_string(),
            display_name: name.to_uppercase(),
            version: "1.0.0".to_string(),
            description: "test".to_string(),
            category: None,
            is_official: false,
        }
    }

    fn tenant(code: &str) -> TenantId {
        TenantId::parse(code).unwrap()
    }

    #[tokio::test]
    async fn test_names_are_unique() {
        let catalog = InMemoryPluginCatalog::new();
        let created = catalog.create_plugin(new_plugin("time-clock")).await.unwrap();
        assert_eq!(created.status, PluginStatus::Active);

        let err = catalog
            .create_plugin(new_plugin("time-clock"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_availability_tracks_installation_state() {
        let catalog = InMemoryPluginCatalog::new();
        let t1 = tenant("T1");
        let plugin = catalog.create_plugin(new_plugin("time-clock")).await.unwrap();

        assert_eq!(
            catalog.availability(&t1, "nope").await.unwrap(),
            PluginAvailability::Unknown
        );
        assert_eq!(
            catalog.availability(&t1, "time-clock").await.unwrap(),
            PluginAvailability::NotInstalled
        );

        catalog
            .insert_installation(&t1, &plugin, json!({}), Some("admin"))
            .await
            .unwrap();
        assert_eq!(
            catalog.availability(&t1, "time-clock").await.unwrap(),
            PluginAvailability::Enabled
        );

        let row = catalog.set_enabled(&t1, plugin.id, false).await.unwrap();
        assert!(row.last_deactivated.is_some());
        assert_eq!(
            catalog.availability(&t1, "time-clock").await.unwrap(),
            PluginAvailability::Disabled
        );
        assert_eq!(
            catalog.availability(&tenant("T2"), "time-clock").await.unwrap(),
            PluginAvailability::NotInstalled
        );
    }

    #[tokio::test]
    async fn test_delete_refused_while_installed() {
        let catalog = InMemoryPluginCatalog::new();
        let t1 = tenant("T1");
        let plugin = catalog.create_plugin(new_plugin("survey")).await.unwrap();
        catalog
            .insert_installation(&t1, &plugin, json!({}), None)
            .await
            .unwrap();

        let err = catalog.delete_plugin(plugin.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        assert!(catalog.delete_installation(&t1, plugin.id).await.unwrap());
        catalog.delete_plugin(plugin.id).await.unwrap();
        assert!(catalog.find_plugin(plugin.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_enabled_filters_and_sorts() {
        let catalog = InMemoryPluginCatalog::new();
        let t1 = tenant("T1");
        for name in ["zeta", "alpha", "mid"] {
            let plugin = catalog.create_plugin(new_plugin(name)).await.unwrap();
            catalog
                .insert_installation(&t1, &plugin, json!({}), None)
                .await
                .unwrap();
            if name == "mid" {
                catalog.set_enabled(&t1, plugin.id, false).await.unwrap();
            }
        }

        let enabled: Vec<String> = catalog
            .list_enabled(&t1)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.plugin.name)
            .collect();
        assert_eq!(enabled, vec!["alpha", "zeta"]);
        assert_eq!(catalog.list_installed(&t1).await.unwrap().len(), 3);
    }
}
