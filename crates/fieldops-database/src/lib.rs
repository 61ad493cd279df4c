//! # fieldops-database
//!
//! PostgreSQL connection management, the plugin catalog store contract,
//! and its PostgreSQL and in-memory implementations.

pub mod catalog;
pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;

pub use catalog::PluginCatalog;
pub use connection::DatabasePool;
pub use memory::InMemoryPluginCatalog;
pub use repositories::plugin::PgPluginCatalog;
