//! Custom Axum extractors.

pub mod path;
pub mod tenant;

pub use path::PluginIdPath;
pub use tenant::TenantContext;
