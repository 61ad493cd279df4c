//! Data-access handle implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use fieldops_core::TenantId;
use fieldops_core::result::AppResult;
use fieldops_database::repositories::PluginDocumentRepository;
use fieldops_database::repositories::document::PluginDocument;

use super::context::{StoredDocument, TenantDataAccess, TenantDataProvider};

impl From<PluginDocument> for StoredDocument {
    fn from(doc: PluginDocument) -> Self {
        Self {
            id: doc.id,
            collection: doc.collection,
            body: doc.body,
            created_at: doc.created_at,
        }
    }
}

/// Provider backed by the `plugin_documents` table.
#[derive(Debug, Clone)]
pub struct PgDataProvider {
    repo: PluginDocumentRepository,
}

impl PgDataProvider {
    /// Create a provider over the document repository.
    pub fn new(repo: PluginDocumentRepository) -> Self {
        Self { repo }
    }
}

impl TenantDataProvider for PgDataProvider {
    fn for_tenant(&self, tenant: &TenantId) -> Arc<dyn TenantDataAccess> {
        Arc::new(PgTenantData {
            tenant: tenant.clone(),
            repo: self.repo.clone(),
        })
    }
}

#[derive(Debug)]
struct PgTenantData {
    tenant: TenantId,
    repo: PluginDocumentRepository,
}

#[async_trait]
impl TenantDataAccess for PgTenantData {
    fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    async fn insert_document(
        &self,
        collection: &str,
        body: serde_json::Value,
    ) -> AppResult<StoredDocument> {
        let doc = self
            .repo
            .insert(self.tenant.as_str(), collection, body)
            .await?;
        Ok(doc.into())
    }

    async fn list_documents(&self, collection: &str) -> AppResult<Vec<StoredDocument>> {
        let docs = self.repo.list(self.tenant.as_str(), collection).await?;
        Ok(docs.into_iter().map(StoredDocument::from).collect())
    }

    async fn delete_collection(&self, collection: &str) -> AppResult<u64> {
        self.repo
            .delete_collection(self.tenant.as_str(), collection)
            .await
    }
}

type Collections = HashMap<(TenantId, String), Vec<StoredDocument>>;

/// Provider that keeps documents in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataProvider {
    collections: Arc<RwLock<Collections>>,
}

impl MemoryDataProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TenantDataProvider for MemoryDataProvider {
    fn for_tenant(&self, tenant: &TenantId) -> Arc<dyn TenantDataAccess> {
        Arc::new(MemoryTenantData {
            tenant: tenant.clone(),
            collections: self.collections.clone(),
        })
    }
}

#[derive(Debug)]
struct MemoryTenantData {
    tenant: TenantId,
    collections: Arc<RwLock<Collections>>,
}

impl MemoryTenantData {
    fn key(&self, collection: &str) -> (TenantId, String) {
        (self.tenant.clone(), collection.to_string())
    }
}

#[async_trait]
impl TenantDataAccess for MemoryTenantData {
    fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    async fn insert_document(
        &self,
        collection: &str,
        body: serde_json::Value,
    ) -> AppResult<StoredDocument> {
        let doc = StoredDocument {
            id: Uuid::now_v7(),
            collection: collection.to_string(),
            body,
            created_at: Utc::now(),
        };
        self.collections
            .write()
            .await
            .entry(self.key(collection))
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn list_documents(&self, collection: &str) -> AppResult<Vec<StoredDocument>> {
        Ok(self
            .collections
            .read()
            .await
            .get(&self.key(collection))
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_collection(&self, collection: &str) -> AppResult<u64> {
        Ok(self
            .collections
            .write()
            .await
            .remove(&self.key(collection))
            .map(|docs| docs.len() as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_memory_handles_are_tenant_scoped() {
        let provider = MemoryDataProvider::new();
        let t1 = provider.for_tenant(&TenantId::parse("T1").unwrap());
        let t2 = provider.for_tenant(&TenantId::parse("T2").unwrap());

        t1.insert_document("entries", json!({"n": 1})).await.unwrap();
        t1.insert_document("entries", json!({"n": 2})).await.unwrap();

        let listed = t1.list_documents("entries").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].body, json!({"n": 2}));
        assert!(t2.list_documents("entries").await.unwrap().is_empty());

        assert_eq!(t1.delete_collection("entries").await.unwrap(), 2);
        assert_eq!(t1.delete_collection("entries").await.unwrap(), 0);
    }
}
