//! # fieldops-plugin
//!
//! Plugin framework for FieldOps. Provides:
//!
//! - The plugin module contract and tagged module sources
//! - A module loader over compiled-in factories with cache invalidation
//! - A per-tenant instance manager (load, unload, reload, lifecycle callbacks)
//! - Hook registry with priority ordering and a value-threading dispatcher
//! - A route mount controller serving plugin routers behind an enable check
//! - A tenant host tying managers and mounted routers together

pub mod api;
pub mod error;
pub mod hooks;
pub mod host;
pub mod loader;
pub mod manager;
pub mod module;
pub mod mount;
pub mod registry;

pub use api::context::{PluginInitContext, TenantDataAccess, TenantDataProvider};
pub use error::PluginError;
pub use hooks::definitions::{HookBinding, HookHandler};
pub use hooks::dispatcher::HookDispatcher;
pub use hooks::registry::HookRegistry;
pub use host::{PluginHost, TenantSession};
pub use loader::{BuiltinModuleLoader, ModuleLoader};
pub use manager::{PluginManager, PluginRouteEntry, ReloadReport};
pub use module::{PluginModule, PluginRequest, PluginResponse, PluginRoute, PluginSource};
pub use mount::controller::RouteMountController;
pub use registry::{LoadedPlugin, PluginRegistry};
