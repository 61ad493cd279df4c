//! Plugin module contract.
//!
//! A plugin is a [`PluginModule`] implementation. Everything on the trait is
//! optional: a module that only declares routes, or only reacts to events,
//! implements just that part.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode};
use serde::{Deserialize, Serialize};

use fieldops_core::TenantId;

use crate::api::context::{PluginInitContext, TenantDataAccess};
use crate::error::{PluginError, panic_message};
use crate::hooks::definitions::HookBinding;

/// A loadable plugin.
#[async_trait]
pub trait PluginModule: Send + Sync {
    /// HTTP routes served under `/api/plugins/{name}`.
    fn routes(&self) -> Vec<PluginRoute> {
        Vec::new()
    }

    /// Hooks registered while the plugin is loaded.
    fn hooks(&self) -> Vec<HookBinding> {
        Vec::new()
    }

    /// Front-end extension points.
    fn ui(&self) -> UiDeclarations {
        UiDeclarations::default()
    }

    /// Called after construction, before hooks are registered.
    async fn initialize(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called when the instance is unloaded.
    async fn cleanup(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called once when a tenant first installs the plugin.
    async fn on_install(
        &self,
        _tenant: &TenantId,
        _data: &dyn TenantDataAccess,
    ) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called when a tenant uninstalls the plugin.
    async fn on_uninstall(
        &self,
        _tenant: &TenantId,
        _data: &dyn TenantDataAccess,
    ) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called when a tenant enables the plugin.
    async fn on_enable(
        &self,
        _tenant: &TenantId,
        _data: &dyn TenantDataAccess,
    ) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called when a tenant disables the plugin.
    async fn on_disable(
        &self,
        _tenant: &TenantId,
        _data: &dyn TenantDataAccess,
    ) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Builds a module instance from its init context.
pub type PluginFactory =
    Arc<dyn Fn(PluginInitContext) -> Result<Arc<dyn PluginModule>, PluginError> + Send + Sync>;

/// What a module loader hands back for a plugin name.
#[derive(Clone)]
pub enum PluginSource {
    /// Constructed per tenant with a [`PluginInitContext`].
    Constructor(PluginFactory),
    /// A ready instance shared as-is.
    Static(Arc<dyn PluginModule>),
}

impl PluginSource {
    /// Wrap a constructor closure.
    pub fn constructor<F>(factory: F) -> Self
    where
        F: Fn(PluginInitContext) -> Result<Arc<dyn PluginModule>, PluginError>
            + Send
            + Sync
            + 'static,
    {
        Self::Constructor(Arc::new(factory))
    }

    /// Wrap a ready instance.
    pub fn instance(module: impl PluginModule + 'static) -> Self {
        Self::Static(Arc::new(module))
    }

    /// Produce the module instance for `ctx`.
    ///
    /// A constructor that panics is reported as a construction failure.
    pub fn instantiate(&self, ctx: PluginInitContext) -> Result<Arc<dyn PluginModule>, PluginError> {
        match self {
            Self::Static(module) => Ok(module.clone()),
            Self::Constructor(factory) => {
                let plugin = ctx.name.clone();
                match std::panic::catch_unwind(AssertUnwindSafe(|| factory(ctx))) {
                    Ok(Ok(module)) => Ok(module),
                    Ok(Err(e)) => Err(PluginError::Construct {
                        plugin,
                        message: e.to_string(),
                    }),
                    Err(panic) => Err(PluginError::Panicked {
                        plugin,
                        stage: "construct",
                        message: panic_message(panic.as_ref()),
                    }),
                }
            }
        }
    }
}

impl fmt::Debug for PluginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constructor(_) => f.write_str("PluginSource::Constructor"),
            Self::Static(_) => f.write_str("PluginSource::Static"),
        }
    }
}

/// Front-end extension points declared by a plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiDeclarations {
    /// Entries added to the main navigation.
    #[serde(default)]
    pub nav_tabs: Vec<serde_json::Value>,
    /// Tabs added to the ticket detail view.
    #[serde(default)]
    pub ticket_tabs: Vec<serde_json::Value>,
    /// Component rendered in the reports area.
    #[serde(default)]
    pub report_component: Option<serde_json::Value>,
}

impl UiDeclarations {
    /// Whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.nav_tabs.is_empty() && self.ticket_tabs.is_empty() && self.report_component.is_none()
    }
}

/// Request handed to a plugin route handler.
#[derive(Clone)]
pub struct PluginRequest {
    /// Tenant the request was made for.
    pub tenant: TenantId,
    /// Plugin serving the request.
    pub plugin: String,
    /// Tenant data handle.
    pub data: Arc<dyn TenantDataAccess>,
    /// HTTP method.
    pub method: Method,
    /// Path relative to the plugin namespace.
    pub path: String,
    /// Captured path parameters.
    pub params: HashMap<String, String>,
    /// Query string parameters.
    pub query: HashMap<String, String>,
    /// Request headers.
    pub headers: HeaderMap,
    /// JSON body, `Null` when empty.
    pub body: serde_json::Value,
}

impl PluginRequest {
    /// Path parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Query parameter by name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Header value as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl fmt::Debug for PluginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRequest")
            .field("tenant", &self.tenant)
            .field("plugin", &self.plugin)
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Response produced by a plugin route handler.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginResponse {
    /// Status code.
    pub status: StatusCode,
    /// JSON body.
    pub body: serde_json::Value,
}

impl PluginResponse {
    /// Response with an explicit status.
    pub fn new(status: StatusCode, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    /// 200 response.
    pub fn ok(body: serde_json::Value) -> Self {
        Self::new(StatusCode::OK, body)
    }

    /// 201 response.
    pub fn created(body: serde_json::Value) -> Self {
        Self::new(StatusCode::CREATED, body)
    }
}

/// Handler for one plugin route.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    /// Serve the request.
    async fn call(&self, request: PluginRequest) -> Result<PluginResponse, PluginError>;
}

/// Route handler backed by an async closure.
pub struct FnRouteHandler<F> {
    func: F,
}

#[async_trait]
impl<F, Fut> RouteHandler for FnRouteHandler<F>
where
    F: Fn(PluginRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PluginResponse, PluginError>> + Send + 'static,
{
    async fn call(&self, request: PluginRequest) -> Result<PluginResponse, PluginError> {
        (self.func)(request).await
    }
}

/// A route declared by a plugin.
#[derive(Clone)]
pub struct PluginRoute {
    /// HTTP method.
    pub method: Method,
    /// Path relative to `/api/plugins/{name}`; may contain `{param}` captures.
    pub path: String,
    /// Handler.
    pub handler: Arc<dyn RouteHandler>,
}

impl PluginRoute {
    /// Declare a route served by `handler`.
    pub fn new(method: Method, path: impl Into<String>, handler: Arc<dyn RouteHandler>) -> Self {
        Self {
            method,
            path: path.into(),
            handler,
        }
    }

    /// Declare a route served by an async closure.
    pub fn from_fn<F, Fut>(method: Method, path: impl Into<String>, func: F) -> Self
    where
        F: Fn(PluginRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PluginResponse, PluginError>> + Send + 'static,
    {
        Self::new(method, path, Arc::new(FnRouteHandler { func }))
    }
}

impl fmt::Debug for PluginRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRoute")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::api::context::TenantDataProvider;
    use crate::api::services::MemoryDataProvider;

    struct Empty;

    impl PluginModule for Empty {}

    fn ctx(name: &str) -> PluginInitContext {
        let tenant = TenantId::parse("T1").unwrap();
        PluginInitContext {
            id: Uuid::now_v7(),
            name: name.to_string(),
            version: "1.0.0".to_string(),
            config: serde_json::json!({}),
            data: MemoryDataProvider::new().for_tenant(&tenant),
            company_code: tenant,
        }
    }

    #[test]
    fn test_static_source_shares_instance() {
        let source = PluginSource::instance(Empty);
        let a = source.instantiate(ctx("empty")).unwrap();
        let b = source.instantiate(ctx("empty")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_constructor_errors_and_panics_are_contained() {
        let failing = PluginSource::constructor(|_| Err(PluginError::handler("bad config")));
        assert!(matches!(
            failing.instantiate(ctx("bad")),
            Err(PluginError::Construct { .. })
        ));

        let panicking = PluginSource::constructor(|ctx| {
            if ctx.config.is_object() {
                panic!("constructor bug");
            }
            Ok(Arc::new(Empty) as Arc<dyn PluginModule>)
        });
        match panicking.instantiate(ctx("boom")) {
            Err(PluginError::Panicked { plugin, message, .. }) => {
                assert_eq!(plugin, "boom");
                assert_eq!(message, "constructor bug");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("constructor should not succeed"),
        }
    }
}
