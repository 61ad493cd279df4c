//! Plugin context: what a plugin instance and its handlers can reach.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fieldops_core::TenantId;
use fieldops_core::result::AppResult;

/// A JSON document stored by a plugin in one of its tenant's collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    /// Document id.
    pub id: Uuid,
    /// Collection the document belongs to.
    pub collection: String,
    /// Document body.
    pub body: serde_json::Value,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

/// Tenant-scoped data access handed to plugins.
///
/// Every call is confined to the tenant the handle was created for.
#[async_trait]
pub trait TenantDataAccess: Send + Sync {
    /// Tenant this handle is bound to.
    fn tenant(&self) -> &TenantId;

    /// Store a document in `collection`.
    async fn insert_document(
        &self,
        collection: &str,
        body: serde_json::Value,
    ) -> AppResult<StoredDocument>;

    /// List `collection` in insertion order.
    async fn list_documents(&self, collection: &str) -> AppResult<Vec<StoredDocument>>;

    /// Remove every document in `collection`; returns how many were removed.
    async fn delete_collection(&self, collection: &str) -> AppResult<u64>;
}

/// Hands out tenant-bound data handles.
pub trait TenantDataProvider: Send + Sync + std::fmt::Debug {
    /// Data handle for `tenant`.
    fn for_tenant(&self, tenant: &TenantId) -> Arc<dyn TenantDataAccess>;
}

/// Context a module constructor receives.
#[derive(Clone)]
pub struct PluginInitContext {
    /// Catalog id.
    pub id: Uuid,
    /// Plugin name.
    pub name: String,
    /// Catalog version.
    pub version: String,
    /// Tenant configuration for the plugin.
    pub config: serde_json::Value,
    /// Tenant (company) code.
    pub company_code: TenantId,
    /// Tenant data handle.
    pub data: Arc<dyn TenantDataAccess>,
}

impl std::fmt::Debug for PluginInitContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInitContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("company_code", &self.company_code)
            .finish_non_exhaustive()
    }
}

/// Per-request context inserted into request extensions before a plugin
/// route handler runs.
#[derive(Clone)]
pub struct PluginRequestContext {
    /// Tenant the request was made for.
    pub tenant: TenantId,
    /// Plugin whose route is being served.
    pub plugin: String,
    /// Tenant data handle.
    pub data: Arc<dyn TenantDataAccess>,
}

impl std::fmt::Debug for PluginRequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRequestContext")
            .field("tenant", &self.tenant)
            .field("plugin", &self.plugin)
            .finish_non_exhaustive()
    }
}
