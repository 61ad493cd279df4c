//! Hook system: registry, dispatcher, and handler definitions.

pub mod definitions;
pub mod dispatcher;
pub mod registry;

pub use definitions::{DEFAULT_PRIORITY, HookBinding, HookHandler, hook_fn};
pub use dispatcher::HookDispatcher;
pub use registry::HookRegistry;
