//! Hook registry: plugins register handlers by event name with priority ordering.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use super::definitions::{DEFAULT_PRIORITY, HookHandler};

/// A handler together with the plugin that owns it.
#[derive(Clone)]
pub struct RegisteredHook {
    /// Owning plugin name.
    pub plugin: String,
    /// Priority (lower runs first).
    pub priority: i32,
    /// The handler.
    pub handler: Arc<dyn HookHandler>,
}

impl std::fmt::Debug for RegisteredHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredHook")
            .field("plugin", &self.plugin)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Registry of hook handlers organized by event name.
#[derive(Debug, Default)]
pub struct HookRegistry {
    /// Event name → handlers in ascending priority, registration order for ties.
    handlers: RwLock<HashMap<String, Vec<RegisteredHook>>>,
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler with the default priority.
    pub async fn register_hook(&self, event: &str, handler: Arc<dyn HookHandler>, plugin: &str) {
        self.register_hook_with_priority(event, handler, plugin, DEFAULT_PRIORITY)
            .await;
    }

    /// Registers a handler with an explicit priority.
    pub async fn register_hook_with_priority(
        &self,
        event: &str,
        handler: Arc<dyn HookHandler>,
        plugin: &str,
        priority: i32,
    ) {
        let mut handlers = self.handlers.write().await;
        let entries = handlers.entry(event.to_string()).or_default();

        entries.push(RegisteredHook {
            plugin: plugin.to_string(),
            priority,
            handler,
        });
        // stable: equal priorities keep registration order
        entries.sort_by_key(|e| e.priority);

        debug!(event = %event, plugin = %plugin, priority, "Hook handler registered");
    }

    /// Removes every handler owned by `plugin`. Returns how many were removed.
    pub async fn unregister_plugin(&self, plugin: &str) -> usize {
        let mut handlers = self.handlers.write().await;
        let mut removed = 0;

        for entries in handlers.values_mut() {
            let before = entries.len();
            entries.retain(|e| e.plugin != plugin);
            removed += before - entries.len();
        }
        handlers.retain(|_, entries| !entries.is_empty());

        if removed > 0 {
            info!(plugin = %plugin, removed, "Hooks unregistered for plugin");
        }
        removed
    }

    /// Handlers for `event` in execution order.
    pub async fn get_handlers(&self, event: &str) -> Vec<RegisteredHook> {
        let handlers = self.handlers.read().await;
        handlers.get(event).cloned().unwrap_or_default()
    }

    /// Number of handlers registered for `event`.
    pub async fn handler_count(&self, event: &str) -> usize {
        let handlers = self.handlers.read().await;
        handlers.get(event).map(Vec::len).unwrap_or(0)
    }

    /// Owners of the handlers for `event`, in execution order.
    pub async fn owners(&self, event: &str) -> Vec<String> {
        let handlers = self.handlers.read().await;
        handlers
            .get(event)
            .map(|entries| entries.iter().map(|e| e.plugin.clone()).collect())
            .unwrap_or_default()
    }

    /// All events with at least one handler, sorted.
    pub async fn registered_events(&self) -> Vec<String> {
        let handlers = self.handlers.read().await;
        let mut events: Vec<String> = handlers.keys().cloned().collect();
        events.sort();
        events
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::hooks::definitions::hook_fn;

    fn noop() -> Arc<dyn HookHandler> {
        hook_fn(|v: Value| async move { Ok(v) })
    }

    #[tokio::test]
    async fn test_priority_then_registration_order() {
        let registry = HookRegistry::new();
        registry.register_hook("ticket.created", noop(), "a").await;
        registry
            .register_hook_with_priority("ticket.created", noop(), "b", 50)
            .await;
        registry.register_hook("ticket.created", noop(), "c").await;

        assert_eq!(registry.owners("ticket.created").await, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_unregister_removes_only_owner() {
        let registry = HookRegistry::new();
        registry.register_hook("ticket.created", noop(), "x").await;
        registry.register_hook("ticket.created", noop(), "y").await;
        registry.register_hook("ticket.completed", noop(), "x").await;

        assert_eq!(registry.unregister_plugin("x").await, 2);
        assert_eq!(registry.owners("ticket.created").await, vec!["y"]);
        assert_eq!(registry.handler_count("ticket.completed").await, 0);
        assert_eq!(registry.registered_events().await, vec!["ticket.created"]);
        assert_eq!(registry.unregister_plugin("x").await, 0);
    }
}
