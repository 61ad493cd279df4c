//! Tenant plugin host.
//!
//! Keeps one manager and one mount controller per tenant, created lazily on
//! first use. Composite operations run inside a [`TenantSession`], which
//! holds the tenant's operation lock so the instance table, hook table and
//! mounted routers change together.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Request;
use axum::response::Response;
use tokio::sync::{Mutex, OnceCell, OwnedMutexGuard, RwLock};
use tracing::{info, warn};

use fieldops_core::TenantId;
use fieldops_core::config::PluginConfig;
use fieldops_database::PluginCatalog;
use fieldops_entity::plugin::PluginDescriptor;

use crate::api::context::TenantDataProvider;
use crate::error::PluginError;
use crate::loader::ModuleLoader;
use crate::manager::{PluginManager, PluginUi, ReloadReport};
use crate::mount::controller::{MountedRoutes, RouteMountController};
use crate::mount::guard::availability_rejection;
use crate::registry::LoadedPluginInfo;

/// One tenant's plugin runtime.
#[derive(Debug)]
pub struct TenantPlugins {
    /// Instance manager.
    pub manager: PluginManager,
    /// Mounted routers.
    pub mounts: RouteMountController,
    /// Serializes composite operations.
    ops: Arc<Mutex<()>>,
    /// Completed once the initial load and mount ran.
    ready: OnceCell<ReloadReport>,
}

/// Hosts the plugin runtimes of all tenants.
#[derive(Debug)]
pub struct PluginHost {
    /// Catalog store.
    catalog: Arc<dyn PluginCatalog>,
    /// Module loader shared by all tenants.
    loader: Arc<dyn ModuleLoader>,
    /// Source of tenant data handles.
    data: Arc<dyn TenantDataProvider>,
    /// Plugin configuration.
    config: PluginConfig,
    /// Tenant → runtime.
    tenants: RwLock<HashMap<TenantId, Arc<TenantPlugins>>>,
}

impl PluginHost {
    /// Creates a host with no tenants started.
    pub fn new(
        catalog: Arc<dyn PluginCatalog>,
        loader: Arc<dyn ModuleLoader>,
        data: Arc<dyn TenantDataProvider>,
        config: PluginConfig,
    ) -> Self {
        Self {
            catalog,
            loader,
            data,
            config,
            tenants: RwLock::new(HashMap::new()),
        }
    }

    /// Catalog store.
    pub fn catalog(&self) -> &Arc<dyn PluginCatalog> {
        &self.catalog
    }

    /// Module loader.
    pub fn loader(&self) -> &Arc<dyn ModuleLoader> {
        &self.loader
    }

    /// Plugin configuration.
    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// The tenant's runtime, loading and mounting its plugins on first use.
    pub async fn tenant(&self, tenant: &TenantId) -> Arc<TenantPlugins> {
        let runtime = self.runtime(tenant).await;
        runtime
            .ready
            .get_or_init(|| async {
                let mut report = runtime.manager.initialize().await;
                let routes = runtime.manager.get_plugin_routes().await;
                report.warnings.extend(runtime.mounts.refresh(routes).await);
                report
            })
            .await;
        runtime
    }

    /// Starts the given tenants eagerly. Returns each tenant's initial report.
    pub async fn preload(&self, tenants: &[TenantId]) -> Vec<(TenantId, ReloadReport)> {
        let mut reports = Vec::with_capacity(tenants.len());
        for tenant in tenants {
            let runtime = self.tenant(tenant).await;
            let report = runtime.ready.get().cloned().unwrap_or_default();
            for warning in &report.warnings {
                warn!(tenant = %tenant, warning = %warning, "Plugin preload warning");
            }
            info!(tenant = %tenant, loaded = report.loaded.len(), "Tenant plugins preloaded");
            reports.push((tenant.clone(), report));
        }
        reports
    }

    /// Opens a session holding the tenant's operation lock.
    pub async fn session(&self, tenant: &TenantId) -> TenantSession {
        let runtime = self.tenant(tenant).await;
        let guard = runtime.ops.clone().lock_owned().await;
        TenantSession {
            runtime,
            _guard: guard,
        }
    }

    /// Reloads one plugin and remounts the tenant's routes.
    pub async fn reload_plugin(&self, tenant: &TenantId, name: &str) -> Result<bool, PluginError> {
        self.session(tenant).await.reload_plugin(name).await
    }

    /// Unloads one plugin and remounts the tenant's routes.
    pub async fn unload_plugin(&self, tenant: &TenantId, name: &str) -> bool {
        self.session(tenant).await.unload_plugin(name).await
    }

    /// Reloads every plugin of the tenant and remounts its routes.
    pub async fn reload_all(&self, tenant: &TenantId) -> ReloadReport {
        if self.active_runtime(tenant).await.is_none() {
            return ReloadReport::default();
        }
        self.session(tenant).await.reload_all().await
    }

    /// Rebuilds the tenant's mounted routers from its loaded plugins.
    pub async fn refresh_routes(&self, tenant: &TenantId) -> Vec<String> {
        self.session(tenant).await.refresh_routes().await
    }

    /// Serves a plugin feature request for `tenant`.
    ///
    /// `request` must address a path relative to the plugin namespace. The
    /// catalog answers first, so a tenant without the plugin enabled never
    /// gets a runtime started on its behalf.
    pub async fn dispatch(&self, tenant: &TenantId, plugin: &str, mut request: Request) -> Response {
        if let Some(rejection) =
            availability_rejection(self.catalog.as_ref(), tenant, plugin).await
        {
            return rejection;
        }
        let runtime = self.tenant(tenant).await;
        request.extensions_mut().insert(tenant.clone());
        runtime.mounts.handle(plugin, request).await
    }

    /// Fires `event` through the tenant's hooks.
    pub async fn execute_hook(
        &self,
        tenant: &TenantId,
        event: &str,
        data: serde_json::Value,
    ) -> serde_json::Value {
        match self.active_runtime(tenant).await {
            Some(runtime) => runtime.manager.execute_hook(event, data).await,
            None => data,
        }
    }

    /// Names of the tenant's loaded plugins.
    pub async fn loaded_names(&self, tenant: &TenantId) -> Vec<String> {
        match self.active_runtime(tenant).await {
            Some(runtime) => runtime.manager.loaded_names().await,
            None => Vec::new(),
        }
    }

    /// Summaries of the tenant's loaded plugins.
    pub async fn loaded_plugins(&self, tenant: &TenantId) -> Vec<LoadedPluginInfo> {
        match self.active_runtime(tenant).await {
            Some(runtime) => runtime.manager.loaded_plugins().await,
            None => Vec::new(),
        }
    }

    /// UI declarations of the tenant's loaded plugins.
    pub async fn ui_declarations(&self, tenant: &TenantId) -> Vec<PluginUi> {
        match self.active_runtime(tenant).await {
            Some(runtime) => runtime.manager.ui_declarations().await,
            None => Vec::new(),
        }
    }

    /// The tenant's mounted routes.
    pub async fn mounted_routes(&self, tenant: &TenantId) -> Vec<MountedRoutes> {
        match self.active_runtime(tenant).await {
            Some(runtime) => runtime.mounts.mounted_routes().await,
            None => Vec::new(),
        }
    }

    /// Whether a runtime exists for `tenant`.
    pub async fn is_started(&self, tenant: &TenantId) -> bool {
        self.tenants.read().await.contains_key(tenant)
    }

    /// The tenant's runtime if it is running or has something enabled.
    /// Tenants with nothing enabled are answered without starting one.
    async fn active_runtime(&self, tenant: &TenantId) -> Option<Arc<TenantPlugins>> {
        if !self.is_started(tenant).await {
            match self.catalog.list_enabled(tenant).await {
                Ok(enabled) if !enabled.is_empty() => {}
                Ok(_) => return None,
                Err(e) => {
                    warn!(tenant = %tenant, error = %e, "Could not list enabled plugins");
                    return None;
                }
            }
        }
        Some(self.tenant(tenant).await)
    }

    async fn runtime(&self, tenant: &TenantId) -> Arc<TenantPlugins> {
        if let Some(runtime) = self.tenants.read().await.get(tenant) {
            return runtime.clone();
        }

        let mut tenants = self.tenants.write().await;
        tenants
            .entry(tenant.clone())
            .or_insert_with(|| {
                let data = self.data.for_tenant(tenant);
                Arc::new(TenantPlugins {
                    manager: PluginManager::new(
                        tenant.clone(),
                        self.catalog.clone(),
                        self.loader.clone(),
                        data.clone(),
                        &self.config,
                    ),
                    mounts: RouteMountController::new(self.catalog.clone(), data),
                    ops: Arc::new(Mutex::new(())),
                    ready: OnceCell::new(),
                })
            })
            .clone()
    }
}

/// Exclusive access to one tenant's plugin runtime.
///
/// Dropping the session releases the tenant's operation lock.
pub struct TenantSession {
    runtime: Arc<TenantPlugins>,
    _guard: OwnedMutexGuard<()>,
}

impl TenantSession {
    /// Tenant this session is for.
    pub fn tenant(&self) -> &TenantId {
        self.runtime.manager.tenant()
    }

    /// Instance manager.
    pub fn manager(&self) -> &PluginManager {
        &self.runtime.manager
    }

    /// Reloads `name` and remounts routes. Returns whether it is loaded.
    pub async fn reload_plugin(&self, name: &str) -> Result<bool, PluginError> {
        let result = self.runtime.manager.reload_plugin(name).await;
        self.refresh_routes().await;
        result
    }

    /// Unloads `name` and remounts routes. Returns whether it was loaded.
    pub async fn unload_plugin(&self, name: &str) -> bool {
        let unloaded = self.runtime.manager.unload_plugin(name).await;
        self.refresh_routes().await;
        unloaded
    }

    /// Reloads everything and remounts routes.
    pub async fn reload_all(&self) -> ReloadReport {
        let mut report = self.runtime.manager.reload_all_plugins().await;
        report.warnings.extend(self.refresh_routes().await);
        report
    }

    /// Rebuilds mounted routers from the loaded plugins.
    pub async fn refresh_routes(&self) -> Vec<String> {
        let routes = self.runtime.manager.get_plugin_routes().await;
        self.runtime.mounts.refresh(routes).await
    }

    /// Runs `on_install`.
    pub async fn run_install_hook(
        &self,
        plugin: &PluginDescriptor,
        config: &serde_json::Value,
    ) -> Result<(), PluginError> {
        self.runtime.manager.run_install_hook(plugin, config).await
    }

    /// Runs `on_uninstall`.
    pub async fn run_uninstall_hook(
        &self,
        plugin: &PluginDescriptor,
        config: &serde_json::Value,
    ) -> Result<(), PluginError> {
        self.runtime.manager.run_uninstall_hook(plugin, config).await
    }

    /// Runs `on_enable`.
    pub async fn run_enable_hook(
        &self,
        plugin: &PluginDescriptor,
        config: &serde_json::Value,
    ) -> Result<(), PluginError> {
        self.runtime.manager.run_enable_hook(plugin, config).await
    }

    /// Runs `on_disable`.
    pub async fn run_disable_hook(
        &self,
        plugin: &PluginDescriptor,
        config: &serde_json::Value,
    ) -> Result<(), PluginError> {
        self.runtime.manager.run_disable_hook(plugin, config).await
    }
}

impl std::fmt::Debug for TenantSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantSession")
            .field("tenant", self.tenant())
            .finish()
    }
}
