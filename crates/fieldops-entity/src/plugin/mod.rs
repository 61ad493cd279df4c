//! Plugin catalog, tenant installation, and bundle manifest entities.

pub mod installation;
pub mod manifest;
pub mod model;

pub use installation::{InstalledPlugin, PluginAvailability, TenantPluginInstallation};
pub use manifest::PluginManifest;
pub use model::{NewPlugin, PluginDescriptor, PluginStatus};
