//! Plugin management services.

pub mod bundle;
pub mod service;

pub use bundle::BundleInstaller;
pub use service::PluginAdminService;
