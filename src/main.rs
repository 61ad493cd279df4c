//! FieldOps Server: plugin host for the field-service platform.
//!
//! Main entry point that wires all crates together and starts the server.

use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt};

use fieldops_core::config::AppConfig;
use fieldops_plugin::BuiltinModuleLoader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("FIELDOPS_ENV").unwrap_or_else(|_| "development".to_string());
    let config = AppConfig::load(&env).context("Failed to load configuration")?;

    init_logging(&config);
    tracing::info!(env = %env, "Starting FieldOps v{}", env!("CARGO_PKG_VERSION"));

    let state = fieldops_api::build_state(config, builtin_modules())
        .await
        .context("Failed to initialize the plugin host")?;
    fieldops_api::run_server(state).await?;

    Ok(())
}

/// Plugin modules compiled into this binary.
fn builtin_modules() -> BuiltinModuleLoader {
    BuiltinModuleLoader::new().with_module(plugin_time_clock::NAME, plugin_time_clock::source)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}
