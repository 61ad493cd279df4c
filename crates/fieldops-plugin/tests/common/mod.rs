//! Shared fixtures for plugin runtime tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::Method;
use serde_json::{Value, json};

use fieldops_core::TenantId;
use fieldops_core::config::PluginConfig;
use fieldops_database::{InMemoryPluginCatalog, PluginCatalog};
use fieldops_entity::plugin::{NewPlugin, PluginDescriptor};
use fieldops_plugin::api::MemoryDataProvider;
use fieldops_plugin::hooks::hook_fn;
use fieldops_plugin::module::UiDeclarations;
use fieldops_plugin::{
    BuiltinModuleLoader, HookBinding, PluginError, PluginModule, PluginResponse, PluginRoute,
    PluginSource, TenantDataAccess,
};

/// Records callback invocations as `"<stage>:<plugin>"`.
#[derive(Debug, Default)]
pub struct CallLog(Mutex<Vec<String>>);

impl CallLog {
    pub fn record(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitBehaviour {
    Succeed,
    Fail,
    Hang,
}

/// Configurable module used across runtime tests.
#[derive(Clone)]
pub struct TestModule {
    pub name: &'static str,
    pub routes: Vec<PluginRoute>,
    pub hooks: Vec<HookBinding>,
    pub ui: UiDeclarations,
    pub init: InitBehaviour,
    pub fail_uninstall: bool,
    pub calls: Arc<CallLog>,
}

impl TestModule {
    pub fn new(name: &'static str, calls: &Arc<CallLog>) -> Self {
        Self {
            name,
            routes: Vec::new(),
            hooks: Vec::new(),
            ui: UiDeclarations::default(),
            init: InitBehaviour::Succeed,
            fail_uninstall: false,
            calls: calls.clone(),
        }
    }

    /// GET `path` answering `{"plugin": name}`.
    pub fn ping(mut self, path: &str) -> Self {
        let name = self.name;
        self.routes.push(PluginRoute::from_fn(Method::GET, path, move |_req| async move {
            Ok(PluginResponse::ok(json!({ "plugin": name })))
        }));
        self
    }

    pub fn route(mut self, route: PluginRoute) -> Self {
        self.routes.push(route);
        self
    }

    /// Hook appending `name` to the payload's `trail` array.
    pub fn trail_hook(mut self, event: &str, priority: i32) -> Self {
        let name = self.name;
        let handler = hook_fn(move |mut v: Value| async move {
            if let Some(trail) = v["trail"].as_array_mut() {
                trail.push(json!(name));
            }
            Ok(v)
        });
        self.hooks
            .push(HookBinding::new(event, handler).with_priority(priority));
        self
    }

    pub fn with_init(mut self, init: InitBehaviour) -> Self {
        self.init = init;
        self
    }

    pub fn failing_uninstall(mut self) -> Self {
        self.fail_uninstall = true;
        self
    }

    pub fn with_nav_tab(mut self, label: &str) -> Self {
        self.ui.nav_tabs.push(json!({ "label": label }));
        self
    }
}

#[async_trait]
impl PluginModule for TestModule {
    fn routes(&self) -> Vec<PluginRoute> {
        self.routes.clone()
    }

    fn hooks(&self) -> Vec<HookBinding> {
        self.hooks.clone()
    }

    fn ui(&self) -> UiDeclarations {
        self.ui.clone()
    }

    async fn initialize(&self) -> Result<(), PluginError> {
        self.calls.record(format!("initialize:{}", self.name));
        match self.init {
            InitBehaviour::Succeed => Ok(()),
            InitBehaviour::Fail => Err(PluginError::handler("initialize refused")),
            InitBehaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }

    async fn cleanup(&self) -> Result<(), PluginError> {
        self.calls.record(format!("cleanup:{}", self.name));
        Ok(())
    }

    async fn on_install(
        &self,
        _tenant: &TenantId,
        _data: &dyn TenantDataAccess,
    ) -> Result<(), PluginError> {
        self.calls.record(format!("on_install:{}", self.name));
        Ok(())
    }

    async fn on_uninstall(
        &self,
        _tenant: &TenantId,
        _data: &dyn TenantDataAccess,
    ) -> Result<(), PluginError> {
        self.calls.record(format!("on_uninstall:{}", self.name));
        if self.fail_uninstall {
            return Err(PluginError::handler("uninstall refused"));
        }
        Ok(())
    }
}

pub fn loader_with(modules: Vec<TestModule>) -> BuiltinModuleLoader {
    modules.into_iter().fold(BuiltinModuleLoader::new(), |loader, module| {
        let name = module.name;
        loader.with_module(name, move || PluginSource::instance(module.clone()))
    })
}

pub fn tenant(code: &str) -> TenantId {
    TenantId::parse(code).unwrap()
}

pub fn plugin_config() -> PluginConfig {
    PluginConfig {
        lifecycle_timeout_seconds: 5,
        hook_timeout_seconds: 5,
        ..PluginConfig::default()
    }
}

/// Registers `name` in the catalog if needed and installs it for `tenant`.
pub async fn install(
    catalog: &InMemoryPluginCatalog,
    tenant: &TenantId,
    name: &str,
) -> PluginDescriptor {
    let plugin = match catalog.find_plugin_by_name(name).await.unwrap() {
        Some(plugin) => plugin,
        None => catalog
            .create_plugin(NewPlugin {
                name: name.to_string(),
                display_name: name.to_string(),
                version: "1.0.0".to_string(),
                description: format!("{name} test plugin"),
                category: None,
                is_official: false,
            })
            .await
            .unwrap(),
    };
    catalog
        .insert_installation(tenant, &plugin, json!({}), Some("tester"))
        .await
        .unwrap();
    plugin
}

pub fn data_provider() -> MemoryDataProvider {
    MemoryDataProvider::new()
}
