//! Hook dispatcher: threads a value through every handler of an event.
//!
//! Handlers run sequentially in ascending priority. Each call is isolated:
//! an error, a panic, or a timeout is logged and the value from before the
//! call is carried forward. The caller never sees a handler failure.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::error::panic_message;

use super::registry::HookRegistry;

/// Dispatches events to registered handlers.
#[derive(Debug)]
pub struct HookDispatcher {
    /// Hook registry.
    registry: Arc<HookRegistry>,
    /// Upper bound for a single handler call.
    timeout: Duration,
}

impl HookDispatcher {
    /// Creates a new hook dispatcher.
    pub fn new(registry: Arc<HookRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Runs every handler for `event` and returns the final value.
    ///
    /// With no handlers registered, `data` is returned unchanged.
    pub async fn execute_hook(&self, event: &str, data: serde_json::Value) -> serde_json::Value {
        let handlers = self.registry.get_handlers(event).await;
        if handlers.is_empty() {
            return data;
        }

        debug!(event = %event, handler_count = handlers.len(), "Dispatching hook");

        let mut result = data;
        for hook in &handlers {
            let call = AssertUnwindSafe(hook.handler.handle(result.clone())).catch_unwind();

            match tokio::time::timeout(self.timeout, call).await {
                Ok(Ok(Ok(value))) => result = value,
                Ok(Ok(Err(e))) => {
                    warn!(
                        event = %event,
                        plugin = %hook.plugin,
                        error = %e,
                        "Hook handler failed, passing previous value through"
                    );
                }
                Ok(Err(panic)) => {
                    error!(
                        event = %event,
                        plugin = %hook.plugin,
                        panic = %panic_message(panic.as_ref()),
                        "Hook handler panicked, passing previous value through"
                    );
                }
                Err(_) => {
                    error!(
                        event = %event,
                        plugin = %hook.plugin,
                        timeout_secs = self.timeout.as_secs(),
                        "Hook handler timed out, passing previous value through"
                    );
                }
            }
        }

        result
    }

    /// Returns a reference to the hook registry.
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::error::PluginError;
    use crate::hooks::definitions::hook_fn;

    fn dispatcher() -> HookDispatcher {
        HookDispatcher::new(Arc::new(HookRegistry::new()), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_no_handlers_is_identity() {
        let d = dispatcher();
        let out = d.execute_hook("ticket.created", json!({"id": 7})).await;
        assert_eq!(out, json!({"id": 7}));
    }

    #[tokio::test]
    async fn test_threads_value_in_priority_order() {
        let d = dispatcher();
        let append = |tag: &'static str| {
            hook_fn(move |mut v: Value| async move {
                if let Some(trail) = v["trail"].as_array_mut() {
                    trail.push(json!(tag));
                }
                Ok(v)
            })
        };
        d.registry()
            .register_hook("report.build", append("late"), "p1")
            .await;
        d.registry()
            .register_hook_with_priority("report.build", append("early"), "p2", 50)
            .await;

        let out = d.execute_hook("report.build", json!({"trail": []})).await;
        assert_eq!(out, json!({"trail": ["early", "late"]}));
    }

    #[tokio::test]
    async fn test_failures_pass_previous_value() {
        let d = dispatcher();
        let registry = d.registry();
        registry
            .register_hook_with_priority(
                "ticket.completed",
                hook_fn(|_| async { Err(PluginError::handler("broken")) }),
                "failing",
                10,
            )
            .await;
        registry
            .register_hook_with_priority(
                "ticket.completed",
                hook_fn(|v: Value| async move {
                    if v.is_object() {
                        panic!("handler bug");
                    }
                    Ok(v)
                }),
                "panicking",
                20,
            )
            .await;
        registry
            .register_hook_with_priority(
                "ticket.completed",
                hook_fn(|v| async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(v)
                }),
                "slow",
                30,
            )
            .await;
        registry
            .register_hook_with_priority(
                "ticket.completed",
                hook_fn(|mut v: Value| async move {
                    v["seen"] = json!(true);
                    Ok(v)
                }),
                "healthy",
                40,
            )
            .await;

        let out = d.execute_hook("ticket.completed", json!({"id": 1})).await;
        assert_eq!(out, json!({"id": 1, "seen": true}));
    }
}
