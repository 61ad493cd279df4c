//! Host services handed to plugin modules.

pub mod context;
pub mod services;

pub use context::{
    PluginInitContext, PluginRequestContext, StoredDocument, TenantDataAccess, TenantDataProvider,
};
pub use services::{MemoryDataProvider, PgDataProvider};
