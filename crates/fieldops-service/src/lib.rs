//! # fieldops-service
//!
//! Plugin management service layer for FieldOps. Services orchestrate the
//! catalog store, the tenant plugin host and the artifact directory to
//! implement the management use cases.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod context;
pub mod plugin;

pub use context::RequestContext;
pub use plugin::{BundleInstaller, PluginAdminService};
