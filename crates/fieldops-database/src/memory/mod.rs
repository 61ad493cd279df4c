//! In-process catalog store.

mod catalog;

pub use catalog::InMemoryPluginCatalog;
