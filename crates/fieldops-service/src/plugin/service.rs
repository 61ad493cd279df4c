//! Plugin management: catalog browsing and per-tenant installation lifecycle.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use fieldops_core::error::AppError;
use fieldops_core::result::AppResult;
use fieldops_database::PluginCatalog;
use fieldops_entity::plugin::{InstalledPlugin, PluginDescriptor};
use fieldops_plugin::host::TenantSession;
use fieldops_plugin::manager::PluginUi;
use fieldops_plugin::mount::controller::MountedRoutes;
use fieldops_plugin::registry::LoadedPluginInfo;
use fieldops_plugin::{PluginHost, ReloadReport};

use crate::context::RequestContext;
use crate::plugin::bundle::BundleInstaller;

/// Orchestrates installation state in the catalog with the tenant's
/// running plugins and mounted routes.
#[derive(Debug, Clone)]
pub struct PluginAdminService {
    /// Tenant plugin host.
    host: Arc<PluginHost>,
    /// Bundle installer for uploads and artifact removal.
    bundles: BundleInstaller,
}

impl PluginAdminService {
    /// Creates a new plugin management service.
    pub fn new(host: Arc<PluginHost>, bundles: BundleInstaller) -> Self {
        Self { host, bundles }
    }

    /// Tenant plugin host.
    pub fn host(&self) -> &Arc<PluginHost> {
        &self.host
    }

    fn catalog(&self) -> &Arc<dyn PluginCatalog> {
        self.host.catalog()
    }

    /// Lists every catalog entry.
    pub async fn list_catalog(&self) -> AppResult<Vec<PluginDescriptor>> {
        self.catalog().list_plugins().await
    }

    /// Lists the tenant's installed plugins.
    pub async fn list_installed(&self, ctx: &RequestContext) -> AppResult<Vec<InstalledPlugin>> {
        self.catalog().list_installed(&ctx.tenant).await
    }

    /// Plugins currently loaded for the tenant.
    pub async fn loaded(&self, ctx: &RequestContext) -> Vec<LoadedPluginInfo> {
        self.host.loaded_plugins(&ctx.tenant).await
    }

    /// UI declarations of the tenant's loaded plugins.
    pub async fn ui_declarations(&self, ctx: &RequestContext) -> Vec<PluginUi> {
        self.host.ui_declarations(&ctx.tenant).await
    }

    /// Routes currently mounted for the tenant.
    pub async fn mounted_routes(&self, ctx: &RequestContext) -> Vec<MountedRoutes> {
        self.host.mounted_routes(&ctx.tenant).await
    }

    /// Installs a plugin for the tenant.
    ///
    /// The first install inserts the installation row and runs `on_install`;
    /// when that callback fails the row is removed again and the error is
    /// returned. Installing again updates the configuration (when given)
    /// and re-enables a disabled plugin through `on_enable`, without
    /// running `on_install`. Either way the
    /// plugin is then reloaded.
    pub async fn install(
        &self,
        ctx: &RequestContext,
        plugin_id: Uuid,
        configuration: Option<Value>,
    ) -> AppResult<InstalledPlugin> {
        let plugin = self.find_plugin(plugin_id).await?;
        let session = self.host.session(&ctx.tenant).await;
        let catalog = self.catalog();

        match catalog.find_installed(&ctx.tenant, plugin_id).await? {
            Some(existing) => {
                let configuration = match configuration {
                    Some(configuration) => {
                        catalog
                            .update_configuration(&ctx.tenant, plugin_id, configuration.clone())
                            .await?;
                        configuration
                    }
                    None => existing.installation.configuration.clone(),
                };
                if !existing.is_enabled() {
                    catalog.set_enabled(&ctx.tenant, plugin_id, true).await?;
                    run_enable_best_effort(&session, &plugin, &configuration).await;
                }
                info!(tenant = %ctx.tenant, plugin = %plugin.name, "Plugin re-installed");
            }
            None => {
                let configuration = configuration.unwrap_or_else(|| Value::Object(Default::default()));
                let row = catalog
                    .insert_installation(
                        &ctx.tenant,
                        &plugin,
                        configuration,
                        ctx.user_id.as_deref(),
                    )
                    .await?;

                if let Err(e) = session
                    .run_install_hook(&plugin, &row.configuration)
                    .await
                {
                    warn!(tenant = %ctx.tenant, plugin = %plugin.name, error = %e, "on_install failed, rolling back");
                    catalog.delete_installation(&ctx.tenant, plugin_id).await?;
                    return Err(AppError::plugin(format!(
                        "Plugin '{}' failed to install: {e}",
                        plugin.name
                    )));
                }
                info!(tenant = %ctx.tenant, plugin = %plugin.name, "Plugin installed");
            }
        }

        reload_best_effort(&session, &plugin.name).await;
        self.find_installed(ctx, plugin_id).await
    }

    /// Uninstalls a plugin for the tenant.
    ///
    /// `on_uninstall` failures are logged and do not stop the uninstall.
    pub async fn uninstall(&self, ctx: &RequestContext, plugin_id: Uuid) -> AppResult<()> {
        // unknown installations are refused before a runtime is started
        self.find_installed(ctx, plugin_id).await?;
        let session = self.host.session(&ctx.tenant).await;
        let installed = self.find_installed(ctx, plugin_id).await?;
        let plugin = &installed.plugin;

        if let Err(e) = session
            .run_uninstall_hook(plugin, &installed.installation.configuration)
            .await
        {
            warn!(tenant = %ctx.tenant, plugin = %plugin.name, error = %e, "on_uninstall failed, continuing");
        }

        session.manager().unload_plugin(&plugin.name).await;
        self.catalog()
            .delete_installation(&ctx.tenant, plugin_id)
            .await?;
        session.refresh_routes().await;

        info!(tenant = %ctx.tenant, plugin = %plugin.name, "Plugin uninstalled");
        Ok(())
    }

    /// Deletes a catalog entry and its artifact directory.
    ///
    /// Refused with a conflict while any tenant has the plugin installed.
    pub async fn delete(&self, plugin_id: Uuid) -> AppResult<()> {
        let plugin = self.find_plugin(plugin_id).await?;

        let installations = self.catalog().count_installations(plugin_id).await?;
        if installations > 0 {
            return Err(AppError::conflict(format!(
                "Plugin '{}' is still installed by {installations} tenant(s)",
                plugin.name
            )));
        }

        self.catalog().delete_plugin(plugin_id).await?;
        self.host.loader().invalidate(&plugin.name).await;
        self.bundles.remove_artifact(&plugin.name).await?;

        info!(plugin = %plugin.name, "Plugin deleted");
        Ok(())
    }

    /// Enables an installed plugin and loads it.
    pub async fn enable(&self, ctx: &RequestContext, plugin_id: Uuid) -> AppResult<InstalledPlugin> {
        self.set_enabled(ctx, plugin_id, true).await
    }

    /// Disables an installed plugin and unloads it. The catalog entry
    /// itself is untouched.
    pub async fn disable(&self, ctx: &RequestContext, plugin_id: Uuid) -> AppResult<InstalledPlugin> {
        self.set_enabled(ctx, plugin_id, false).await
    }

    /// Replaces the tenant's configuration of a plugin and reloads it.
    pub async fn configure(
        &self,
        ctx: &RequestContext,
        plugin_id: Uuid,
        configuration: Value,
    ) -> AppResult<InstalledPlugin> {
        self.find_installed(ctx, plugin_id).await?;
        let session = self.host.session(&ctx.tenant).await;
        let installed = self.find_installed(ctx, plugin_id).await?;

        self.catalog()
            .update_configuration(&ctx.tenant, plugin_id, configuration)
            .await?;
        info!(tenant = %ctx.tenant, plugin = %installed.name(), "Plugin configured");

        reload_best_effort(&session, installed.name()).await;
        self.find_installed(ctx, plugin_id).await
    }

    /// Reloads every plugin of the tenant and remounts its routes.
    pub async fn reload_all(&self, ctx: &RequestContext) -> ReloadReport {
        let report = self.host.reload_all(&ctx.tenant).await;
        info!(
            tenant = %ctx.tenant,
            loaded = report.loaded.len(),
            warnings = report.warnings.len(),
            "Plugins reloaded"
        );
        report
    }

    /// Registers an uploaded bundle. The plugin is not loaded for anyone.
    pub async fn upload(&self, bytes: Vec<u8>) -> AppResult<PluginDescriptor> {
        self.bundles.install_bundle(bytes).await
    }

    async fn set_enabled(
        &self,
        ctx: &RequestContext,
        plugin_id: Uuid,
        enabled: bool,
    ) -> AppResult<InstalledPlugin> {
        self.find_installed(ctx, plugin_id).await?;
        let session = self.host.session(&ctx.tenant).await;
        let installed = self.find_installed(ctx, plugin_id).await?;
        let plugin = &installed.plugin;
        let configuration = &installed.installation.configuration;

        self.catalog()
            .set_enabled(&ctx.tenant, plugin_id, enabled)
            .await?;

        if enabled {
            run_enable_best_effort(&session, plugin, configuration).await;
            reload_best_effort(&session, &plugin.name).await;
            info!(tenant = %ctx.tenant, plugin = %plugin.name, "Plugin enabled");
        } else {
            if let Err(e) = session.run_disable_hook(plugin, configuration).await {
                warn!(tenant = %ctx.tenant, plugin = %plugin.name, error = %e, "on_disable failed");
            }
            session.unload_plugin(&plugin.name).await;
            info!(tenant = %ctx.tenant, plugin = %plugin.name, "Plugin disabled");
        }

        self.find_installed(ctx, plugin_id).await
    }

    async fn find_plugin(&self, plugin_id: Uuid) -> AppResult<PluginDescriptor> {
        self.catalog()
            .find_plugin(plugin_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Plugin {plugin_id} not found")))
    }

    async fn find_installed(
        &self,
        ctx: &RequestContext,
        plugin_id: Uuid,
    ) -> AppResult<InstalledPlugin> {
        self.catalog()
            .find_installed(&ctx.tenant, plugin_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Plugin {plugin_id} is not installed")))
    }
}

/// Runs `on_enable`; a failure is logged and does not stop the enable.
async fn run_enable_best_effort(
    session: &TenantSession,
    plugin: &PluginDescriptor,
    configuration: &Value,
) {
    if let Err(e) = session.run_enable_hook(plugin, configuration).await {
        warn!(tenant = %session.tenant(), plugin = %plugin.name, error = %e, "on_enable failed");
    }
}

/// Reloads `name`; a load failure leaves the plugin unloaded but is not
/// an error for the management call.
async fn reload_best_effort(session: &TenantSession, name: &str) {
    match session.reload_plugin(name).await {
        Ok(true) => {}
        Ok(false) => warn!(tenant = %session.tenant(), plugin = %name, "Plugin not loaded after reload"),
        Err(e) => warn!(tenant = %session.tenant(), plugin = %name, error = %e, "Plugin failed to load"),
    }
}
