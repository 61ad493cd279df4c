//! Closure-based route and hook declarations.

use std::future::Future;

use axum::http::Method;

use fieldops_plugin::hooks::definitions::hook_fn;
use fieldops_plugin::{HookBinding, PluginError, PluginRequest, PluginResponse, PluginRoute};

/// Declares a `GET` route.
pub fn get<F, Fut>(path: &str, handler: F) -> PluginRoute
where
    F: Fn(PluginRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PluginResponse, PluginError>> + Send + 'static,
{
    PluginRoute::from_fn(Method::GET, path, handler)
}

/// Declares a `POST` route.
pub fn post<F, Fut>(path: &str, handler: F) -> PluginRoute
where
    F: Fn(PluginRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PluginResponse, PluginError>> + Send + 'static,
{
    PluginRoute::from_fn(Method::POST, path, handler)
}

/// Declares a `PUT` route.
pub fn put<F, Fut>(path: &str, handler: F) -> PluginRoute
where
    F: Fn(PluginRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PluginResponse, PluginError>> + Send + 'static,
{
    PluginRoute::from_fn(Method::PUT, path, handler)
}

/// Declares a `DELETE` route.
pub fn delete<F, Fut>(path: &str, handler: F) -> PluginRoute
where
    F: Fn(PluginRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PluginResponse, PluginError>> + Send + 'static,
{
    PluginRoute::from_fn(Method::DELETE, path, handler)
}

/// Binds an async closure to `event` with the default priority.
pub fn hook<F, Fut>(event: &str, handler: F) -> HookBinding
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, PluginError>> + Send + 'static,
{
    HookBinding::new(event, hook_fn(handler))
}

/// Binds an async closure to `event` with an explicit priority.
pub fn hook_with_priority<F, Fut>(event: &str, priority: i32, handler: F) -> HookBinding
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, PluginError>> + Send + 'static,
{
    hook(event, handler).with_priority(priority)
}
