//! Errors raised by plugin modules and the machinery that drives them.

use std::any::Any;

use thiserror::Error;

use fieldops_core::error::{AppError, ErrorKind};

/// Failure of a plugin module or of a plugin lifecycle step.
#[derive(Debug, Error)]
pub enum PluginError {
    /// No module is available for the plugin name.
    #[error("plugin module '{0}' not found")]
    ModuleNotFound(String),

    /// The plugin artifact exists but cannot be used.
    #[error("plugin artifact for '{plugin}' is invalid: {message}")]
    InvalidArtifact {
        /// Plugin name.
        plugin: String,
        /// What is wrong with it.
        message: String,
    },

    /// The module constructor rejected its context.
    #[error("plugin '{plugin}' could not be constructed: {message}")]
    Construct {
        /// Plugin name.
        plugin: String,
        /// Constructor failure.
        message: String,
    },

    /// A lifecycle callback returned an error.
    #[error("plugin '{plugin}' {stage} failed: {message}")]
    Lifecycle {
        /// Plugin name.
        plugin: String,
        /// Callback name (`initialize`, `on_install`, ...).
        stage: &'static str,
        /// Callback failure.
        message: String,
    },

    /// A lifecycle callback did not finish in time.
    #[error("plugin '{plugin}' {stage} timed out after {seconds}s")]
    Timeout {
        /// Plugin name.
        plugin: String,
        /// Callback name.
        stage: &'static str,
        /// Configured bound.
        seconds: u64,
    },

    /// Plugin code panicked.
    #[error("plugin '{plugin}' panicked during {stage}: {message}")]
    Panicked {
        /// Plugin name.
        plugin: String,
        /// What was running.
        stage: &'static str,
        /// Panic payload, when it is a string.
        message: String,
    },

    /// Error reported by a route or hook handler.
    #[error("{0}")]
    Handler(String),

    /// Malformed JSON handled by plugin code.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Host service failure surfaced to plugin code.
    #[error(transparent)]
    App(#[from] AppError),
}

impl PluginError {
    /// Create a handler error.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }
}

impl From<PluginError> for AppError {
    fn from(err: PluginError) -> Self {
        match err {
            PluginError::App(inner) => inner,
            other => AppError::with_source(ErrorKind::Plugin, other.to_string(), other),
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_into_plugin_kind() {
        let err: AppError = PluginError::Timeout {
            plugin: "time-clock".into(),
            stage: "initialize",
            seconds: 5,
        }
        .into();
        assert_eq!(err.kind, ErrorKind::Plugin);
        assert_eq!(
            err.message,
            "plugin 'time-clock' initialize timed out after 5s"
        );
    }

    #[test]
    fn test_host_errors_pass_through() {
        let err: AppError = PluginError::App(AppError::not_found("missing")).into();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");
    }
}
