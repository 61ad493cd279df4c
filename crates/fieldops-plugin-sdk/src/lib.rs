//! # fieldops-plugin-sdk
//!
//! SDK for developing plugins for FieldOps.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fieldops_plugin_sdk::prelude::*;
//!
//! struct Hello;
//!
//! #[async_trait]
//! impl PluginModule for Hello {
//!     fn routes(&self) -> Vec<PluginRoute> {
//!         vec![get("/hello", |req| async move {
//!             Ok(ok(json!({ "tenant": req.tenant.as_str() })))
//!         })]
//!     }
//!
//!     fn hooks(&self) -> Vec<HookBinding> {
//!         vec![hook(events::TICKET_CREATED, |mut ticket| async move {
//!             ticket["greeted"] = json!(true);
//!             Ok(ticket)
//!         })]
//!     }
//! }
//! ```

pub mod request;
pub mod response;
pub mod routes;

/// Prelude for convenient imports.
pub mod prelude {
    pub use async_trait::async_trait;
    pub use axum::http::{Method, StatusCode};
    pub use serde_json::{Value, json};

    pub use fieldops_core::TenantId;
    pub use fieldops_plugin::hooks::definitions::events;
    pub use fieldops_plugin::module::UiDeclarations;
    pub use fieldops_plugin::{
        HookBinding, HookHandler, PluginError, PluginInitContext, PluginModule, PluginRequest,
        PluginResponse, PluginRoute, PluginSource, TenantDataAccess,
    };

    pub use crate::request::{body_as, config_as};
    pub use crate::response::{bad_request, created, not_found, ok};
    pub use crate::routes::{delete, get, hook, hook_with_priority, post, put};
}
