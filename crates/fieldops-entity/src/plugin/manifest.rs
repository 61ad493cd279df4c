//! `plugin.json` bundle manifest.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use fieldops_core::error::AppError;
use fieldops_core::result::AppResult;

use super::model::NewPlugin;

/// Manifest file name inside a bundle and inside an artifact directory.
pub const MANIFEST_FILE: &str = "plugin.json";

/// Names taken by management endpoints directly under `/api/plugins`.
pub const RESERVED_NAMES: &[&str] = &["installed", "loaded", "reload", "ui", "upload"];

/// Manifest shipped with every plugin bundle.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// Stable slug.
    #[validate(length(min = 1, max = 100), custom(function = "validate_slug"))]
    pub name: String,
    /// Human-readable name.
    #[validate(length(min = 1, max = 200, message = "displayName is required"))]
    pub display_name: String,
    /// Semver version.
    #[validate(custom(function = "validate_semver"))]
    pub version: String,
    /// Short description.
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    /// Optional category.
    #[serde(default)]
    pub category: Option<String>,
    /// Whether the plugin ships with the product.
    #[serde(default)]
    pub is_official: bool,
    /// Compiled-in module implementing this plugin; defaults to `name`.
    #[serde(default)]
    pub entry: Option<String>,
}

impl PluginManifest {
    /// Parse and validate a manifest from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> AppResult<Self> {
        let manifest: Self = serde_json::from_slice(bytes)
            .map_err(|e| AppError::validation(format!("Invalid plugin manifest: {e}")))?;
        manifest
            .validate()
            .map_err(|e| AppError::validation(format!("Invalid plugin manifest: {e}")))?;
        Ok(manifest)
    }

    /// Module key the loader should resolve.
    pub fn entry_point(&self) -> &str {
        self.entry.as_deref().unwrap_or(&self.name)
    }

    /// Convert into a catalog registration.
    pub fn to_new_plugin(&self) -> NewPlugin {
        NewPlugin {
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            is_official: self.is_official,
        }
    }
}

/// Returns whether `name` is a valid plugin slug.
pub fn is_valid_slug(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
        _ => return false,
    }
    name.len() <= 100
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_'))
}

/// Returns whether `name` collides with a management endpoint.
pub fn is_reserved_name(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

fn validate_slug(name: &str) -> Result<(), ValidationError> {
    if !is_valid_slug(name) {
        return Err(ValidationError::new("slug")
            .with_message("name must be lowercase letters, digits, '-' or '_'".into()));
    }
    if is_reserved_name(name) {
        return Err(ValidationError::new("reserved")
            .with_message(format!("name '{name}' is reserved").into()));
    }
    Ok(())
}

fn validate_semver(version: &str) -> Result<(), ValidationError> {
    semver::Version::parse(version)
        .map(|_| ())
        .map_err(|_| ValidationError::new("semver").with_message("version must be semver".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_camel_case_manifest() {
        let manifest = PluginManifest::from_slice(
            br#"{"name":"time-clock","displayName":"Time Clock","version":"1.2.0","description":"Clock in and out"}"#,
        )
        .unwrap();
        assert_eq!(manifest.display_name, "Time Clock");
        assert_eq!(manifest.entry_point(), "time-clock");
        assert!(!manifest.is_official);
    }

    #[test]
    fn test_rejects_missing_fields_and_bad_values() {
        assert!(PluginManifest::from_slice(br#"{"name":"x","version":"1.0.0"}"#).is_err());
        assert!(
            PluginManifest::from_slice(
                br#"{"name":"Bad Name","displayName":"d","version":"1.0.0","description":"d"}"#
            )
            .is_err()
        );
        assert!(
            PluginManifest::from_slice(
                br#"{"name":"ok","displayName":"d","version":"one","description":"d"}"#
            )
            .is_err()
        );
    }

    #[test]
    fn test_slug_rules() {
        assert!(is_valid_slug("time-clock"));
        assert!(is_valid_slug("2fa_gate"));
        assert!(!is_valid_slug("-lead"));
        assert!(!is_valid_slug("../up"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn test_rejects_reserved_names() {
        for name in RESERVED_NAMES {
            let json = format!(
                r#"{{"name":"{name}","displayName":"d","version":"1.0.0","description":"d"}}"#
            );
            let err = PluginManifest::from_slice(json.as_bytes()).unwrap_err();
            assert!(err.message.contains("reserved"), "{}", err.message);
        }
        assert!(!is_reserved_name("uploader"));
    }
}
