//! Plugin bundle uploads.
//!
//! A bundle is a zip archive with `plugin.json` at its root. Installing one
//! registers a catalog entry and unpacks the archive into
//! `<plugins.directory>/<name>/`. Nothing is loaded; tenants still have to
//! install the plugin.

use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};
use zip::ZipArchive;

use fieldops_core::config::PluginConfig;
use fieldops_core::error::{AppError, ErrorKind};
use fieldops_core::result::AppResult;
use fieldops_database::PluginCatalog;
use fieldops_entity::plugin::PluginDescriptor;
use fieldops_entity::plugin::PluginManifest;
use fieldops_entity::plugin::manifest::{MANIFEST_FILE, is_valid_slug};

/// Maximum number of entries in a bundle.
const MAX_ENTRIES: usize = 1_000;
/// Extracted size may be at most this multiple of the upload limit.
const MAX_EXPANSION: u64 = 8;
/// Copy buffer size.
const BUFFER_SIZE: usize = 64 * 1024;

/// Validates bundles and unpacks them into the artifact directory.
#[derive(Debug, Clone)]
pub struct BundleInstaller {
    /// Catalog store.
    catalog: Arc<dyn PluginCatalog>,
    /// Artifact root.
    directory: PathBuf,
    /// Upload size limit in bytes.
    max_size: u64,
}

impl BundleInstaller {
    /// Creates an installer writing below `config.directory`.
    pub fn new(catalog: Arc<dyn PluginCatalog>, config: &PluginConfig) -> Self {
        Self {
            catalog,
            directory: PathBuf::from(&config.directory),
            max_size: config.max_bundle_size_bytes,
        }
    }

    /// Artifact root.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Artifact directory of `name`.
    pub fn artifact_dir(&self, name: &str) -> AppResult<PathBuf> {
        if !is_valid_slug(name) {
            return Err(AppError::validation(format!("Invalid plugin name '{name}'")));
        }
        Ok(self.directory.join(name))
    }

    /// Registers the bundle's plugin and unpacks its files.
    ///
    /// Fails with a conflict when a plugin of the same name exists. The
    /// catalog entry is removed again when extraction fails.
    pub async fn install_bundle(&self, bytes: Vec<u8>) -> AppResult<PluginDescriptor> {
        if bytes.is_empty() {
            return Err(AppError::validation("Plugin bundle is empty"));
        }
        if bytes.len() as u64 > self.max_size {
            return Err(AppError::validation(format!(
                "Plugin bundle exceeds {} bytes",
                self.max_size
            )));
        }

        let (manifest, bytes) = tokio::task::spawn_blocking(move || {
            read_manifest(&bytes).map(|manifest| (manifest, bytes))
        })
        .await
        .map_err(|e| AppError::internal(format!("Bundle inspection task failed: {e}")))??;

        if self
            .catalog
            .find_plugin_by_name(&manifest.name)
            .await?
            .is_some()
        {
            return Err(AppError::conflict(format!(
                "Plugin '{}' already exists",
                manifest.name
            )));
        }

        let plugin = self.catalog.create_plugin(manifest.to_new_plugin()).await?;
        let target = self.artifact_dir(&plugin.name)?;
        let limit = self.max_size.saturating_mul(MAX_EXPANSION);

        let extracted = tokio::task::spawn_blocking(move || extract_into(&bytes, &target, limit))
            .await
            .map_err(|e| AppError::internal(format!("Bundle extraction task failed: {e}")))
            .and_then(|result| result);

        match extracted {
            Ok(files) => {
                info!(plugin = %plugin.name, version = %plugin.version, files, "Plugin bundle installed");
                Ok(plugin)
            }
            Err(e) => {
                warn!(plugin = %plugin.name, error = %e, "Bundle extraction failed, removing catalog entry");
                if let Err(rollback) = self.catalog.delete_plugin(plugin.id).await {
                    error!(plugin = %plugin.name, error = %rollback, "Failed to roll back catalog entry");
                }
                Err(e)
            }
        }
    }

    /// Removes the artifact directory of `name`. Returns whether it existed.
    pub async fn remove_artifact(&self, name: &str) -> AppResult<bool> {
        let dir = self.artifact_dir(name)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(plugin = %name, path = %dir.display(), "Plugin artifact removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to remove plugin artifact: {e}"),
                e,
            )),
        }
    }
}

fn invalid_bundle(err: zip::result::ZipError) -> AppError {
    AppError::with_source(
        ErrorKind::Validation,
        format!("Invalid plugin bundle: {err}"),
        err,
    )
}

/// Reads and validates the root `plugin.json`.
fn read_manifest(bytes: &[u8]) -> AppResult<PluginManifest> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(invalid_bundle)?;
    let mut file = archive
        .by_name(MANIFEST_FILE)
        .map_err(|_| AppError::validation(format!("Plugin bundle has no {MANIFEST_FILE}")))?;

    let mut raw = Vec::new();
    file.read_to_end(&mut raw)
        .map_err(|e| AppError::validation(format!("Unreadable {MANIFEST_FILE}: {e}")))?;
    PluginManifest::from_slice(&raw)
}

/// Unpacks the archive into `target`, replacing anything already there.
/// Removes `target` again on failure.
fn extract_into(bytes: &[u8], target: &Path, limit: u64) -> AppResult<usize> {
    if target.exists() {
        fs::remove_dir_all(target)?;
    }
    fs::create_dir_all(target)?;

    let result = unpack(bytes, target, limit);
    if result.is_err() {
        let _ = fs::remove_dir_all(target);
    }
    result
}

fn unpack(bytes: &[u8], target: &Path, limit: u64) -> AppResult<usize> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(invalid_bundle)?;
    if archive.len() > MAX_ENTRIES {
        return Err(AppError::validation(format!(
            "Plugin bundle has more than {MAX_ENTRIES} entries"
        )));
    }

    let mut total_size = 0u64;
    let mut files = 0usize;
    let mut buffer = vec![0u8; BUFFER_SIZE];

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(invalid_bundle)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = %entry.name(), "Skipping bundle entry outside the plugin directory");
            continue;
        };
        let out_path = target.join(relative);

        // declared size; the copy below counts the bytes actually produced
        if total_size.saturating_add(entry.size()) > limit {
            return Err(expansion_error(limit));
        }

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        total_size += copy_limited(&mut entry, &mut out, limit - total_size, &mut buffer)?
            .ok_or_else(|| expansion_error(limit))?;
        files += 1;
    }

    Ok(files)
}

/// Copies at most `budget` bytes, counting what the reader actually yields.
/// Returns `None` when the reader has more than `budget` bytes to give.
fn copy_limited<R: Read, W: Write>(
    reader: R,
    writer: &mut W,
    budget: u64,
    buffer: &mut [u8],
) -> std::io::Result<Option<u64>> {
    let mut limited = reader.take(budget.saturating_add(1));
    let mut written = 0u64;
    loop {
        let n = limited.read(buffer)?;
        if n == 0 {
            return Ok(Some(written));
        }
        written += n as u64;
        if written > budget {
            return Ok(None);
        }
        writer.write_all(&buffer[..n])?;
    }
}

fn expansion_error(limit: u64) -> AppError {
    AppError::validation(format!("Plugin bundle expands beyond {limit} bytes"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    fn bundle(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_read_manifest_requires_root_manifest() {
        let manifest: &[u8] = br#"{"name":"route-planner","displayName":"Route Planner","version":"0.3.0","description":"Plans routes"}"#;
        let parsed = read_manifest(&bundle(&[(MANIFEST_FILE, manifest)])).unwrap();
        assert_eq!(parsed.name, "route-planner");

        let nested = read_manifest(&bundle(&[("inner/plugin.json", manifest)])).unwrap_err();
        assert_eq!(nested.kind, ErrorKind::Validation);

        let garbage = read_manifest(b"not a zip").unwrap_err();
        assert_eq!(garbage.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_unpack_enforces_expansion_limit() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("big");
        let (a, b) = (vec![b'a'; 4096], vec![b'b'; 4096]);
        let bytes = bundle(&[("a.txt", a.as_slice()), ("b.txt", b.as_slice())]);

        let err = extract_into(&bytes, &target, 5000).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(!target.exists());

        assert_eq!(extract_into(&bytes, &target, 10_000).unwrap(), 2);
        assert_eq!(fs::read(target.join("b.txt")).unwrap().len(), 4096);
    }

    #[test]
    fn test_copy_counts_bytes_actually_read() {
        let mut buffer = vec![0u8; 4];
        let source = vec![7u8; 10];

        // an entry claiming to be small still yields all of its bytes
        let mut out = Vec::new();
        let copied = copy_limited(Cursor::new(&source), &mut out, 6, &mut buffer).unwrap();
        assert_eq!(copied, None);
        assert!(out.len() <= 6);

        let mut out = Vec::new();
        let copied = copy_limited(Cursor::new(&source), &mut out, 10, &mut buffer).unwrap();
        assert_eq!(copied, Some(10));
        assert_eq!(out, source);
    }
}
