//! Module loader over compiled-in plugin factories.
//!
//! Plugin code is linked into the server binary; the loader maps a plugin
//! name to one of the registered factories. When a plugin directory is
//! configured, a plugin only resolves while its artifact directory holds a
//! `plugin.json`, whose optional `entry` selects the factory. Resolved
//! sources are cached until invalidated.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use fieldops_entity::plugin::PluginManifest;
use fieldops_entity::plugin::manifest::{MANIFEST_FILE, is_valid_slug};

use crate::error::PluginError;
use crate::module::PluginSource;

/// Resolves plugin names to module sources.
#[async_trait]
pub trait ModuleLoader: Send + Sync + fmt::Debug {
    /// Source for `name`, or `None` when no module exists for it.
    async fn resolve(&self, name: &str) -> Result<Option<PluginSource>, PluginError>;

    /// Drop the cached source for `name`; the next `resolve` reads afresh.
    async fn invalidate(&self, name: &str);

    /// Drop every cached source.
    async fn invalidate_all(&self);
}

/// Produces a fresh module source.
pub type ModuleFactory = Arc<dyn Fn() -> PluginSource + Send + Sync>;

/// Loader over factories registered at startup.
pub struct BuiltinModuleLoader {
    /// Module key → factory.
    factories: HashMap<String, ModuleFactory>,
    /// Artifact root, one sub-directory per plugin name.
    directory: Option<PathBuf>,
    /// Plugin name → resolved source.
    cache: RwLock<HashMap<String, PluginSource>>,
    /// Number of uncached resolutions.
    reads: AtomicUsize,
}

impl BuiltinModuleLoader {
    /// Creates a loader that needs no artifact directory.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            directory: None,
            cache: RwLock::new(HashMap::new()),
            reads: AtomicUsize::new(0),
        }
    }

    /// Require `<directory>/<name>/plugin.json` for a plugin to resolve.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Register a factory under a module key.
    pub fn with_module<F>(mut self, key: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> PluginSource + Send + Sync + 'static,
    {
        self.factories.insert(key.into(), Arc::new(factory));
        self
    }

    /// Registered module keys, sorted.
    pub fn module_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.factories.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Artifact root, when configured.
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// How many times a source was produced without the cache.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    async fn entry_for(&self, name: &str) -> Result<Option<String>, PluginError> {
        let Some(directory) = &self.directory else {
            return Ok(Some(name.to_string()));
        };

        let manifest_path = directory.join(name).join(MANIFEST_FILE);
        let bytes = match tokio::fs::read(&manifest_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(plugin = %name, path = %manifest_path.display(), "No plugin artifact");
                return Ok(None);
            }
            Err(e) => {
                return Err(PluginError::InvalidArtifact {
                    plugin: name.to_string(),
                    message: format!("cannot read {}: {e}", manifest_path.display()),
                });
            }
        };

        let manifest =
            PluginManifest::from_slice(&bytes).map_err(|e| PluginError::InvalidArtifact {
                plugin: name.to_string(),
                message: e.message,
            })?;
        if manifest.name != name {
            return Err(PluginError::InvalidArtifact {
                plugin: name.to_string(),
                message: format!("manifest declares name '{}'", manifest.name),
            });
        }

        Ok(Some(manifest.entry_point().to_string()))
    }
}

impl Default for BuiltinModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BuiltinModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinModuleLoader")
            .field("modules", &self.module_keys())
            .field("directory", &self.directory)
            .finish()
    }
}

#[async_trait]
impl ModuleLoader for BuiltinModuleLoader {
    async fn resolve(&self, name: &str) -> Result<Option<PluginSource>, PluginError> {
        if !is_valid_slug(name) {
            return Ok(None);
        }
        if let Some(source) = self.cache.read().await.get(name) {
            return Ok(Some(source.clone()));
        }

        let Some(entry) = self.entry_for(name).await? else {
            return Ok(None);
        };
        let Some(factory) = self.factories.get(&entry) else {
            debug!(plugin = %name, entry = %entry, "No compiled-in module for entry");
            return Ok(None);
        };

        self.reads.fetch_add(1, Ordering::Relaxed);
        let source = factory();
        self.cache
            .write()
            .await
            .insert(name.to_string(), source.clone());

        debug!(plugin = %name, entry = %entry, "Plugin module resolved");
        Ok(Some(source))
    }

    async fn invalidate(&self, name: &str) {
        if self.cache.write().await.remove(name).is_some() {
            debug!(plugin = %name, "Plugin module cache invalidated");
        }
    }

    async fn invalidate_all(&self) {
        let mut cache = self.cache.write().await;
        let count = cache.len();
        cache.clear();
        info!(count, "Plugin module cache cleared");
    }
}
