//! Hook handler contract and well-known event names.
//!
//! Events are plain strings so plugins may publish and consume events the
//! host does not know about. Handlers receive the current value and return
//! the value the next handler sees.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PluginError;

/// Priority assigned when a binding does not choose one.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Event names fired by the host application.
pub mod events {
    /// A ticket was created.
    pub const TICKET_CREATED: &str = "ticket.created";
    /// A ticket changed.
    pub const TICKET_UPDATED: &str = "ticket.updated";
    /// A ticket was closed as completed.
    pub const TICKET_COMPLETED: &str = "ticket.completed";
    /// A customer was created.
    pub const CUSTOMER_CREATED: &str = "customer.created";
    /// A site visit report is being assembled.
    pub const REPORT_BUILD: &str = "report.build";
}

/// Handler invoked when an event fires.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Transform `data`; the result is passed to the next handler.
    async fn handle(&self, data: serde_json::Value) -> Result<serde_json::Value, PluginError>;
}

/// A hook a plugin asks to have registered when it loads.
#[derive(Clone)]
pub struct HookBinding {
    /// Event name.
    pub event: String,
    /// Handler.
    pub handler: Arc<dyn HookHandler>,
    /// Priority (lower runs first).
    pub priority: i32,
}

impl HookBinding {
    /// Bind `handler` to `event` with the default priority.
    pub fn new(event: impl Into<String>, handler: Arc<dyn HookHandler>) -> Self {
        Self {
            event: event.into(),
            handler,
            priority: DEFAULT_PRIORITY,
        }
    }

    /// Override the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl fmt::Debug for HookBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookBinding")
            .field("event", &self.event)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Hook handler backed by an async closure.
pub struct FnHookHandler<F> {
    func: F,
}

#[async_trait]
impl<F, Fut> HookHandler for FnHookHandler<F>
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, PluginError>> + Send + 'static,
{
    async fn handle(&self, data: serde_json::Value) -> Result<serde_json::Value, PluginError> {
        (self.func)(data).await
    }
}

/// Wrap an async closure as a hook handler.
pub fn hook_fn<F, Fut>(func: F) -> Arc<dyn HookHandler>
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, PluginError>> + Send + 'static,
{
    Arc::new(FnHookHandler { func })
}
