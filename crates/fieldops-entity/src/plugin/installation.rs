//! Per-tenant plugin installation entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::model::PluginDescriptor;

/// A plugin installed for one tenant. Keyed by `(tenant_id, plugin_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TenantPluginInstallation {
    /// Tenant (company) code.
    pub tenant_id: String,
    /// Catalog id of the installed plugin.
    pub plugin_id: Uuid,
    /// Version that was current when installed.
    pub installed_version: String,
    /// Whether routes and hooks are active for this tenant.
    pub is_enabled: bool,
    /// Tenant-specific plugin configuration.
    pub configuration: serde_json::Value,
    /// When the plugin was first installed.
    pub installed_at: DateTime<Utc>,
    /// Who installed it, if known.
    pub installed_by: Option<String>,
    /// Last time the plugin was enabled.
    pub last_activated: Option<DateTime<Utc>>,
    /// Last time the plugin was disabled.
    pub last_deactivated: Option<DateTime<Utc>>,
}

/// A catalog entry joined with a tenant's installation row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InstalledPlugin {
    /// Catalog entry.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub plugin: PluginDescriptor,
    /// Installation row.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub installation: TenantPluginInstallation,
}

impl InstalledPlugin {
    /// Plugin slug.
    pub fn name(&self) -> &str {
        &self.plugin.name
    }

    /// Whether the plugin is enabled for the tenant.
    pub fn is_enabled(&self) -> bool {
        self.installation.is_enabled
    }
}

/// Result of the per-request enable check for a plugin name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginAvailability {
    /// The name is not in the catalog.
    Unknown,
    /// The plugin exists but the tenant has not installed it.
    NotInstalled,
    /// Installed but disabled.
    Disabled,
    /// Installed and enabled.
    Enabled,
}

impl PluginAvailability {
    /// Derive availability from an optional installation row.
    pub fn from_installation(installation: Option<&TenantPluginInstallation>) -> Self {
        match installation {
            None => Self::NotInstalled,
            Some(row) if row.is_enabled => Self::Enabled,
            Some(_) => Self::Disabled,
        }
    }

    /// Whether requests may reach the plugin.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}
