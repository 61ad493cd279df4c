//! Plugin catalog store contract.
//!
//! The plugin subsystem reads and writes catalog entries and per-tenant
//! installation rows exclusively through [`PluginCatalog`]. The schema
//! behind it belongs to the store implementation.

use async_trait::async_trait;
use uuid::Uuid;

use fieldops_core::TenantId;
use fieldops_core::result::AppResult;
use fieldops_entity::plugin::{
    InstalledPlugin, NewPlugin, PluginAvailability, PluginDescriptor, TenantPluginInstallation,
};

/// Persistent record of available plugins and per-tenant installations.
#[async_trait]
pub trait PluginCatalog: Send + Sync + std::fmt::Debug {
    /// Lists every catalog entry ordered by name.
    async fn list_plugins(&self) -> AppResult<Vec<PluginDescriptor>>;

    /// Finds a catalog entry by id.
    async fn find_plugin(&self, id: Uuid) -> AppResult<Option<PluginDescriptor>>;

    /// Finds a catalog entry by its unique name.
    async fn find_plugin_by_name(&self, name: &str) -> AppResult<Option<PluginDescriptor>>;

    /// Registers a new entry. Fails with a conflict when the name exists.
    async fn create_plugin(&self, plugin: NewPlugin) -> AppResult<PluginDescriptor>;

    /// Removes an entry. Fails with a conflict while any tenant has it
    /// installed, and with not-found when the id is unknown.
    async fn delete_plugin(&self, id: Uuid) -> AppResult<()>;

    /// Number of tenants that have the plugin installed.
    async fn count_installations(&self, plugin_id: Uuid) -> AppResult<u64>;

    /// Lists a tenant's installed plugins ordered by name.
    async fn list_installed(&self, tenant: &TenantId) -> AppResult<Vec<InstalledPlugin>>;

    /// Lists a tenant's installed and enabled plugins ordered by name.
    async fn list_enabled(&self, tenant: &TenantId) -> AppResult<Vec<InstalledPlugin>>;

    /// Finds one of a tenant's installations by catalog id.
    async fn find_installed(
        &self,
        tenant: &TenantId,
        plugin_id: Uuid,
    ) -> AppResult<Option<InstalledPlugin>>;

    /// Finds one of a tenant's installations by plugin name.
    async fn find_installed_by_name(
        &self,
        tenant: &TenantId,
        name: &str,
    ) -> AppResult<Option<InstalledPlugin>>;

    /// Creates an enabled installation row. Fails with a conflict when the
    /// row already exists.
    async fn insert_installation(
        &self,
        tenant: &TenantId,
        plugin: &PluginDescriptor,
        configuration: serde_json::Value,
        installed_by: Option<&str>,
    ) -> AppResult<TenantPluginInstallation>;

    /// Replaces the configuration of an existing row.
    async fn update_configuration(
        &self,
        tenant: &TenantId,
        plugin_id: Uuid,
        configuration: serde_json::Value,
    ) -> AppResult<TenantPluginInstallation>;

    /// Flips `is_enabled` and stamps `last_activated`/`last_deactivated`.
    async fn set_enabled(
        &self,
        tenant: &TenantId,
        plugin_id: Uuid,
        enabled: bool,
    ) -> AppResult<TenantPluginInstallation>;

    /// Deletes an installation row. Returns whether a row was removed.
    async fn delete_installation(&self, tenant: &TenantId, plugin_id: Uuid) -> AppResult<bool>;

    /// Resolves whether requests for `name` may reach the plugin.
    async fn availability(&self, tenant: &TenantId, name: &str) -> AppResult<PluginAvailability> {
        if self.find_plugin_by_name(name).await?.is_none() {
            return Ok(PluginAvailability::Unknown);
        }
        let installed = self.find_installed_by_name(tenant, name).await?;
        Ok(PluginAvailability::from_installation(
            installed.as_ref().map(|i| &i.installation),
        ))
    }
}
