//! Plugin document repository.
//!
//! Backs the data-access handle plugins receive: schemaless JSON documents
//! grouped into named collections per tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use fieldops_core::error::{AppError, ErrorKind};
use fieldops_core::result::AppResult;

/// A stored plugin document.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PluginDocument {
    /// Document id.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: String,
    /// Collection name.
    pub collection: String,
    /// Document body.
    pub body: serde_json::Value,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

/// Repository for `plugin_documents`.
#[derive(Debug, Clone)]
pub struct PluginDocumentRepository {
    pool: PgPool,
}

impl PluginDocumentRepository {
    /// Create a new document repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a document and return it.
    pub async fn insert(
        &self,
        tenant_id: &str,
        collection: &str,
        body: serde_json::Value,
    ) -> AppResult<PluginDocument> {
        sqlx::query_as::<_, PluginDocument>(
            "INSERT INTO plugin_documents (id, tenant_id, collection, body) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(tenant_id)
        .bind(collection)
        .bind(body)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert document", e))
    }

    /// List a collection in insertion order.
    pub async fn list(&self, tenant_id: &str, collection: &str) -> AppResult<Vec<PluginDocument>> {
        sqlx::query_as::<_, PluginDocument>(
            "SELECT * FROM plugin_documents WHERE tenant_id = $1 AND collection = $2 \
             ORDER BY created_at, id",
        )
        .bind(tenant_id)
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list documents", e))
    }

    /// Delete a whole collection. Returns the number of removed documents.
    pub async fn delete_collection(&self, tenant_id: &str, collection: &str) -> AppResult<u64> {
        let result =
            sqlx::query("DELETE FROM plugin_documents WHERE tenant_id = $1 AND collection = $2")
                .bind(tenant_id)
                .bind(collection)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to delete documents", e)
                })?;
        Ok(result.rows_affected())
    }
}
