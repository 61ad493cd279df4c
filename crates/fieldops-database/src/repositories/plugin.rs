//! Plugin catalog repository backed by PostgreSQL.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use fieldops_core::TenantId;
use fieldops_core::error::{AppError, ErrorKind};
use fieldops_core::result::AppResult;
use fieldops_entity::plugin::{
    InstalledPlugin, NewPlugin, PluginDescriptor, TenantPluginInstallation,
};

use super::map_write_error;
use crate::catalog::PluginCatalog;

const INSTALLED_SELECT: &str = "SELECT p.*, tp.* FROM tenant_plugins tp \
     JOIN plugins p ON p.id = tp.plugin_id";

/// Catalog store over the `plugins` and `tenant_plugins` tables.
#[derive(Debug, Clone)]
pub struct PgPluginCatalog {
    pool: PgPool,
}

impl PgPluginCatalog {
    /// Create a new catalog repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PluginCatalog for PgPluginCatalog {
    async fn list_plugins(&self) -> AppResult<Vec<PluginDescriptor>> {
        sqlx::query_as::<_, PluginDescriptor>("SELECT * FROM plugins ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list plugins", e))
    }

    async fn find_plugin(&self, id: Uuid) -> AppResult<Option<PluginDescriptor>> {
        sqlx::query_as::<_, PluginDescriptor>("SELECT * FROM plugins WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find plugin", e))
    }

    async fn find_plugin_by_name(&self, name: &str) -> AppResult<Option<PluginDescriptor>> {
        sqlx::query_as::<_, PluginDescriptor>("SELECT * FROM plugins WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find plugin by name", e)
            })
    }

    async fn create_plugin(&self, plugin: NewPlugin) -> AppResult<PluginDescriptor> {
        sqlx::query_as::<_, PluginDescriptor>(
            "INSERT INTO plugins (id, name, display_name, version, description, category, is_official) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&plugin.name)
        .bind(&plugin.display_name)
        .bind(&plugin.version)
        .bind(&plugin.description)
        .bind(&plugin.category)
        .bind(plugin.is_official)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_write_error(
                e,
                "Failed to create plugin",
                &format!("Plugin '{}' already exists", plugin.name),
            )
        })
    }

    async fn delete_plugin(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to begin", e))?;

        let installed: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tenant_plugins WHERE plugin_id = $1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to count installations", e)
        })?;

        if installed > 0 {
            return Err(AppError::conflict(format!(
                "Plugin is still installed by {installed} tenant(s)"
            )));
        }

        let result = sqlx::query("DELETE FROM plugins WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete plugin", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Plugin {id} not found")));
        }

        tx.commit()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to commit", e))
    }

    async fn count_installations(&self, plugin_id: Uuid) -> AppResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tenant_plugins WHERE plugin_id = $1")
                .bind(plugin_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to count installations", e)
                })?;
        Ok(count as u64)
    }

    async fn list_installed(&self, tenant: &TenantId) -> AppResult<Vec<InstalledPlugin>> {
        sqlx::query_as::<_, InstalledPlugin>(&format!(
            "{INSTALLED_SELECT} WHERE tp.tenant_id = $1 ORDER BY p.name"
        ))
        .bind(tenant.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list installed", e))
    }

    async fn list_enabled(&self, tenant: &TenantId) -> AppResult<Vec<InstalledPlugin>> {
        sqlx::query_as::<_, InstalledPlugin>(&format!(
            "{INSTALLED_SELECT} WHERE tp.tenant_id = $1 AND tp.is_enabled = TRUE ORDER BY p.name"
        ))
        .bind(tenant.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list enabled", e))
    }

    async fn find_installed(
        &self,
        tenant: &TenantId,
        plugin_id: Uuid,
    ) -> AppResult<Option<InstalledPlugin>> {
        sqlx::query_as::<_, InstalledPlugin>(&format!(
            "{INSTALLED_SELECT} WHERE tp.tenant_id = $1 AND tp.plugin_id = $2"
        ))
        .bind(tenant.as_str())
        .bind(plugin_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find installation", e))
    }

    async fn find_installed_by_name(
        &self,
        tenant: &TenantId,
        name: &str,
    ) -> AppResult<Option<InstalledPlugin>> {
        sqlx::query_as::<_, InstalledPlugin>(&format!(
            "{INSTALLED_SELECT} WHERE tp.tenant_id = $1 AND p.name = $2"
        ))
        .bind(tenant.as_str())
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find installation", e))
    }

    async fn insert_installation(
        &self,
        tenant: &TenantId,
        plugin: &PluginDescriptor,
        configuration: serde_json::Value,
        installed_by: Option<&str>,
    ) -> AppResult<TenantPluginInstallation> {
        sqlx::query_as::<_, TenantPluginInstallation>(
            "INSERT INTO tenant_plugins \
             (tenant_id, plugin_id, installed_version, is_enabled, configuration, installed_by, last_activated) \
             VALUES ($1, $2, $3, TRUE, $4, $5, NOW()) RETURNING *",
        )
        .bind(tenant.as_str())
        .bind(plugin.id)
        .bind(&plugin.version)
        .bind(configuration)
        .bind(installed_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_write_error(
                e,
                "Failed to insert installation",
                &format!("Plugin '{}' is already installed", plugin.name),
            )
        })
    }

    async fn update_configuration(
        &self,
        tenant: &TenantId,
        plugin_id: Uuid,
        configuration: serde_json::Value,
    ) -> AppResult<TenantPluginInstallation> {
        sqlx::query_as::<_, TenantPluginInstallation>(
            "UPDATE tenant_plugins SET configuration = $3 \
             WHERE tenant_id = $1 AND plugin_id = $2 RETURNING *",
        )
        .bind(tenant.as_str())
        .bind(plugin_id)
        .bind(configuration)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update configuration", e)
        })?
        .ok_or_else(|| AppError::not_found("Plugin is not installed for this tenant"))
    }

    async fn set_enabled(
        &self,
        tenant: &TenantId,
        plugin_id: Uuid,
        enabled: bool,
    ) -> AppResult<TenantPluginInstallation> {
        let sql = if enabled {
            "UPDATE tenant_plugins SET is_enabled = TRUE, last_activated = NOW() \
             WHERE tenant_id = $1 AND plugin_id = $2 RETURNING *"
        } else {
            "UPDATE tenant_plugins SET is_enabled = FALSE, last_deactivated = NOW() \
             WHERE tenant_id = $1 AND plugin_id = $2 RETURNING *"
        };

        sqlx::query_as::<_, TenantPluginInstallation>(sql)
            .bind(tenant.as_str())
            .bind(plugin_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to update enable state", e)
            })?
            .ok_or_else(|| AppError::not_found("Plugin is not installed for this tenant"))
    }

    async fn delete_installation(&self, tenant: &TenantId, plugin_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM tenant_plugins WHERE tenant_id = $1 AND plugin_id = $2")
            .bind(tenant.as_str())
            .bind(plugin_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete installation", e)
            })?;
        Ok(result.rows_affected() > 0)
    }
}
