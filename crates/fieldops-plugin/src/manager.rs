//! Plugin manager: the per-tenant instance table and its lifecycle.
//!
//! Every mutating operation holds the manager's lifecycle lock, so callers
//! never observe a plugin that is half loaded or half unloaded. Plugin
//! failures are contained: they are logged per plugin, reported as
//! warnings, and never abort loading of the remaining plugins.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use fieldops_core::TenantId;
use fieldops_core::config::PluginConfig;
use fieldops_database::PluginCatalog;
use fieldops_entity::plugin::{InstalledPlugin, PluginDescriptor};

use crate::api::context::{PluginInitContext, TenantDataAccess};
use crate::error::{PluginError, panic_message};
use crate::hooks::definitions::HookBinding;
use crate::hooks::dispatcher::HookDispatcher;
use crate::hooks::registry::HookRegistry;
use crate::loader::ModuleLoader;
use crate::module::{PluginModule, PluginRoute, UiDeclarations};
use crate::registry::{LoadedPlugin, LoadedPluginInfo, PluginRegistry};

/// Outcome of a bulk (re)load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReloadReport {
    /// Names of the plugins loaded afterwards.
    pub loaded: Vec<String>,
    /// One line per plugin or step that failed.
    pub warnings: Vec<String>,
}

/// A declared route together with the plugin that owns it.
#[derive(Debug, Clone)]
pub struct PluginRouteEntry {
    /// Owning plugin.
    pub plugin_name: String,
    /// The route.
    pub route: PluginRoute,
}

/// UI declarations of one loaded plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginUi {
    /// Plugin name.
    pub plugin: String,
    /// Declarations.
    #[serde(flatten)]
    pub ui: UiDeclarations,
}

/// Tenant-level callbacks run by the management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TenantCallback {
    Install,
    Uninstall,
    Enable,
    Disable,
}

impl TenantCallback {
    fn stage(self) -> &'static str {
        match self {
            Self::Install => "on_install",
            Self::Uninstall => "on_uninstall",
            Self::Enable => "on_enable",
            Self::Disable => "on_disable",
        }
    }
}

/// Loads, unloads and reloads one tenant's plugins.
pub struct PluginManager {
    /// Tenant whose plugins this manager runs.
    tenant: TenantId,
    /// Catalog store.
    catalog: Arc<dyn PluginCatalog>,
    /// Module loader.
    loader: Arc<dyn ModuleLoader>,
    /// Tenant data handle given to plugins.
    data: Arc<dyn TenantDataAccess>,
    /// Instance table.
    registry: PluginRegistry,
    /// Hook dispatcher (owns the hook registry).
    dispatcher: HookDispatcher,
    /// Upper bound for lifecycle callbacks.
    lifecycle_timeout: Duration,
    /// Serializes mutating operations.
    lifecycle: Mutex<()>,
    /// Set once `initialize` has run.
    initialized: AtomicBool,
}

impl PluginManager {
    /// Creates a manager for `tenant`.
    pub fn new(
        tenant: TenantId,
        catalog: Arc<dyn PluginCatalog>,
        loader: Arc<dyn ModuleLoader>,
        data: Arc<dyn TenantDataAccess>,
        config: &PluginConfig,
    ) -> Self {
        Self {
            tenant,
            catalog,
            loader,
            data,
            registry: PluginRegistry::new(),
            dispatcher: HookDispatcher::new(Arc::new(HookRegistry::new()), config.hook_timeout()),
            lifecycle_timeout: config.lifecycle_timeout(),
            lifecycle: Mutex::new(()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Loads every plugin the tenant has installed and enabled.
    ///
    /// Never fails; catalog and per-plugin failures end up in the report.
    pub async fn initialize(&self) -> ReloadReport {
        let _guard = self.lifecycle.lock().await;
        self.initialize_locked().await
    }

    /// Loads one installed plugin, replacing a loaded instance of the same name.
    pub async fn load_plugin(&self, installed: &InstalledPlugin) -> Result<(), PluginError> {
        let _guard = self.lifecycle.lock().await;
        self.load_locked(installed).await
    }

    /// Unloads a plugin. Returns whether it was loaded.
    pub async fn unload_plugin(&self, name: &str) -> bool {
        let _guard = self.lifecycle.lock().await;
        self.unload_locked(name).await
    }

    /// Unloads `name`, drops its cached module, and loads it again if the
    /// catalog still has it installed and enabled. Returns whether it is
    /// loaded afterwards.
    pub async fn reload_plugin(&self, name: &str) -> Result<bool, PluginError> {
        let _guard = self.lifecycle.lock().await;

        self.unload_locked(name).await;
        self.loader.invalidate(name).await;

        let installed = self
            .catalog
            .find_installed_by_name(&self.tenant, name)
            .await?;
        match installed {
            Some(plugin) if plugin.is_enabled() => {
                self.load_locked(&plugin).await?;
                Ok(true)
            }
            _ => {
                debug!(tenant = %self.tenant, plugin = %name, "Plugin not enabled, left unloaded");
                Ok(false)
            }
        }
    }

    /// Unloads everything, clears the module cache and initializes again.
    pub async fn reload_all_plugins(&self) -> ReloadReport {
        let _guard = self.lifecycle.lock().await;

        for name in self.registry.names().await {
            self.unload_locked(&name).await;
        }
        self.loader.invalidate_all().await;

        self.initialize_locked().await
    }

    /// Routes of all loaded plugins, by plugin name then declaration order.
    pub async fn get_plugin_routes(&self) -> Vec<PluginRouteEntry> {
        self.registry
            .all()
            .await
            .iter()
            .flat_map(|plugin| {
                plugin.routes.iter().map(|route| PluginRouteEntry {
                    plugin_name: plugin.name.clone(),
                    route: route.clone(),
                })
            })
            .collect()
    }

    /// Threads `data` through the handlers registered for `event`.
    pub async fn execute_hook(&self, event: &str, data: serde_json::Value) -> serde_json::Value {
        self.dispatcher.execute_hook(event, data).await
    }

    /// Runs the plugin's `on_install` callback.
    pub async fn run_install_hook(
        &self,
        plugin: &PluginDescriptor,
        config: &serde_json::Value,
    ) -> Result<(), PluginError> {
        self.run_tenant_callback(plugin, config, TenantCallback::Install)
            .await
    }

    /// Runs the plugin's `on_uninstall` callback.
    pub async fn run_uninstall_hook(
        &self,
        plugin: &PluginDescriptor,
        config: &serde_json::Value,
    ) -> Result<(), PluginError> {
        self.run_tenant_callback(plugin, config, TenantCallback::Uninstall)
            .await
    }

    /// Runs the plugin's `on_enable` callback.
    pub async fn run_enable_hook(
        &self,
        plugin: &PluginDescriptor,
        config: &serde_json::Value,
    ) -> Result<(), PluginError> {
        self.run_tenant_callback(plugin, config, TenantCallback::Enable)
            .await
    }

    /// Runs the plugin's `on_disable` callback.
    pub async fn run_disable_hook(
        &self,
        plugin: &PluginDescriptor,
        config: &serde_json::Value,
    ) -> Result<(), PluginError> {
        self.run_tenant_callback(plugin, config, TenantCallback::Disable)
            .await
    }

    /// Whether `name` is loaded.
    pub async fn is_loaded(&self, name: &str) -> bool {
        self.registry.contains(name).await
    }

    /// Loaded plugin names, sorted.
    pub async fn loaded_names(&self) -> Vec<String> {
        self.registry.names().await
    }

    /// Summaries of the loaded plugins.
    pub async fn loaded_plugins(&self) -> Vec<LoadedPluginInfo> {
        self.registry.all().await.iter().map(|p| p.info()).collect()
    }

    /// UI declarations of loaded plugins that declare any.
    pub async fn ui_declarations(&self) -> Vec<PluginUi> {
        self.registry
            .all()
            .await
            .iter()
            .filter(|p| !p.ui.is_empty())
            .map(|p| PluginUi {
                plugin: p.name.clone(),
                ui: p.ui.clone(),
            })
            .collect()
    }

    /// Whether `initialize` has completed at least once.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Tenant this manager serves.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Tenant data handle.
    pub fn data(&self) -> &Arc<dyn TenantDataAccess> {
        &self.data
    }

    /// Returns the hook registry.
    pub fn hook_registry(&self) -> &Arc<HookRegistry> {
        self.dispatcher.registry()
    }

    async fn initialize_locked(&self) -> ReloadReport {
        let mut report = ReloadReport::default();

        match self.catalog.list_enabled(&self.tenant).await {
            Ok(installed) => {
                for plugin in &installed {
                    if let Err(e) = self.load_locked(plugin).await {
                        report.warnings.push(e.to_string());
                    }
                }
            }
            Err(e) => {
                error!(tenant = %self.tenant, error = %e, "Failed to list enabled plugins");
                report
                    .warnings
                    .push(format!("failed to list enabled plugins: {}", e.message));
            }
        }

        report.loaded = self.registry.names().await;
        self.initialized.store(true, Ordering::Release);

        info!(
            tenant = %self.tenant,
            loaded = report.loaded.len(),
            warnings = report.warnings.len(),
            "Plugins initialized"
        );
        report
    }

    async fn load_locked(&self, installed: &InstalledPlugin) -> Result<(), PluginError> {
        let name = installed.name();
        if self.registry.contains(name).await {
            self.unload_locked(name).await;
        }

        match self.try_load(installed).await {
            Ok(loaded) => {
                info!(
                    tenant = %self.tenant,
                    plugin = %loaded.name,
                    version = %loaded.version,
                    routes = loaded.routes.len(),
                    hooks = loaded.hooks.len(),
                    "Plugin loaded"
                );
                self.registry.insert(loaded).await;
                Ok(())
            }
            Err(e) => {
                warn!(tenant = %self.tenant, plugin = %name, error = %e, "Plugin failed to load");
                Err(e)
            }
        }
    }

    async fn try_load(&self, installed: &InstalledPlugin) -> Result<LoadedPlugin, PluginError> {
        let plugin = &installed.plugin;
        let config = installed.installation.configuration.clone();

        let source = self
            .loader
            .resolve(&plugin.name)
            .await?
            .ok_or_else(|| PluginError::ModuleNotFound(plugin.name.clone()))?;
        let module = source.instantiate(self.init_context(
            plugin.id,
            &plugin.name,
            &plugin.version,
            config.clone(),
        ))?;

        self.run_lifecycle(&plugin.name, "initialize", module.initialize())
            .await?;

        let (routes, hooks, ui) = match declarations(&plugin.name, module.as_ref()) {
            Ok(declared) => declared,
            Err(e) => {
                if let Err(cleanup) = self
                    .run_lifecycle(&plugin.name, "cleanup", module.cleanup())
                    .await
                {
                    warn!(plugin = %plugin.name, error = %cleanup, "Cleanup after failed load failed");
                }
                return Err(e);
            }
        };

        let registry = self.dispatcher.registry();
        let mut events = Vec::with_capacity(hooks.len());
        for binding in hooks {
            registry
                .register_hook_with_priority(
                    &binding.event,
                    binding.handler,
                    &plugin.name,
                    binding.priority,
                )
                .await;
            events.push(binding.event);
        }

        Ok(LoadedPlugin {
            name: plugin.name.clone(),
            plugin_id: plugin.id,
            version: plugin.version.clone(),
            config,
            company_code: self.tenant.clone(),
            module,
            routes,
            hooks: events,
            ui,
            loaded_at: Utc::now(),
        })
    }

    async fn unload_locked(&self, name: &str) -> bool {
        let Some(plugin) = self.registry.get(name).await else {
            return false;
        };

        if let Err(e) = self
            .run_lifecycle(name, "cleanup", plugin.module.cleanup())
            .await
        {
            warn!(tenant = %self.tenant, plugin = %name, error = %e, "Plugin cleanup failed");
        }
        self.dispatcher.registry().unregister_plugin(name).await;
        self.registry.remove(name).await;

        info!(tenant = %self.tenant, plugin = %name, "Plugin unloaded");
        true
    }

    async fn run_tenant_callback(
        &self,
        plugin: &PluginDescriptor,
        config: &serde_json::Value,
        callback: TenantCallback,
    ) -> Result<(), PluginError> {
        let _guard = self.lifecycle.lock().await;

        let module = match self.registry.get(&plugin.name).await {
            Some(loaded) => loaded.module.clone(),
            None => {
                let Some(source) = self.loader.resolve(&plugin.name).await? else {
                    warn!(
                        tenant = %self.tenant,
                        plugin = %plugin.name,
                        stage = callback.stage(),
                        "No module available, callback skipped"
                    );
                    return Ok(());
                };
                source.instantiate(self.init_context(
                    plugin.id,
                    &plugin.name,
                    &plugin.version,
                    config.clone(),
                ))?
            }
        };

        let tenant = &self.tenant;
        let data = self.data.as_ref();
        let call = async move {
            match callback {
                TenantCallback::Install => module.on_install(tenant, data).await,
                TenantCallback::Uninstall => module.on_uninstall(tenant, data).await,
                TenantCallback::Enable => module.on_enable(tenant, data).await,
                TenantCallback::Disable => module.on_disable(tenant, data).await,
            }
        };

        let result = self.run_lifecycle(&plugin.name, callback.stage(), call).await;
        if let Err(e) = &result {
            warn!(tenant = %self.tenant, plugin = %plugin.name, error = %e, "Plugin callback failed");
        }
        result
    }

    async fn run_lifecycle<F>(
        &self,
        plugin: &str,
        stage: &'static str,
        call: F,
    ) -> Result<(), PluginError>
    where
        F: Future<Output = Result<(), PluginError>>,
    {
        let guarded = AssertUnwindSafe(call).catch_unwind();
        match tokio::time::timeout(self.lifecycle_timeout, guarded).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(PluginError::Lifecycle {
                plugin: plugin.to_string(),
                stage,
                message: e.to_string(),
            }),
            Ok(Err(panic)) => Err(PluginError::Panicked {
                plugin: plugin.to_string(),
                stage,
                message: panic_message(panic.as_ref()),
            }),
            Err(_) => Err(PluginError::Timeout {
                plugin: plugin.to_string(),
                stage,
                seconds: self.lifecycle_timeout.as_secs(),
            }),
        }
    }

    fn init_context(
        &self,
        id: Uuid,
        name: &str,
        version: &str,
        config: serde_json::Value,
    ) -> PluginInitContext {
        PluginInitContext {
            id,
            name: name.to_string(),
            version: version.to_string(),
            config,
            company_code: self.tenant.clone(),
            data: self.data.clone(),
        }
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("tenant", &self.tenant)
            .field("lifecycle_timeout", &self.lifecycle_timeout)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

type Declarations = (Vec<PluginRoute>, Vec<HookBinding>, UiDeclarations);

fn declarations(plugin: &str, module: &dyn PluginModule) -> Result<Declarations, PluginError> {
    std::panic::catch_unwind(AssertUnwindSafe(|| {
        (module.routes(), module.hooks(), module.ui())
    }))
    .map_err(|panic| PluginError::Panicked {
        plugin: plugin.to_string(),
        stage: "declare",
        message: panic_message(panic.as_ref()),
    })
}
