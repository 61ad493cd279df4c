//! Plugin catalog entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plugin_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    /// Available for installation.
    #[default]
    Active,
    /// Still loadable for existing installations, hidden from new ones.
    Deprecated,
}

impl PluginStatus {
    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deprecated => "deprecated",
        }
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A plugin known to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PluginDescriptor {
    /// Opaque catalog identifier.
    pub id: Uuid,
    /// Stable slug; also the module key and artifact directory name.
    pub name: String,
    /// Human-readable name.
    pub display_name: String,
    /// Semver version string.
    pub version: String,
    /// Short description.
    pub description: String,
    /// Free-form category used by the front-end.
    pub category: Option<String>,
    /// Whether the plugin ships with the product.
    pub is_official: bool,
    /// Catalog status.
    pub status: PluginStatus,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// When the entry was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Data needed to register a new catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPlugin {
    /// Stable slug.
    pub name: String,
    /// Human-readable name.
    pub display_name: String,
    /// Semver version string.
    pub version: String,
    /// Short description.
    pub description: String,
    /// Optional category.
    pub category: Option<String>,
    /// Whether the plugin ships with the product.
    pub is_official: bool,
}

impl NewPlugin {
    /// Build the descriptor this entry becomes once stored.
    pub fn into_descriptor(self, id: Uuid, now: DateTime<Utc>) -> PluginDescriptor {
        PluginDescriptor {
            id,
            name: self.name,
            display_name: self.display_name,
            version: self.version,
            description: self.description,
            category: self.category,
            is_official: self.is_official,
            status: PluginStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}
