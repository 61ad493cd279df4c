//! Time clock plugin implementation.

use std::sync::Arc;

use chrono::Utc;
use fieldops_plugin_sdk::prelude::*;
use tracing::info;

use crate::config::TimeClockConfig;
use crate::models::{AUDIT_COLLECTION, ENTRIES_COLLECTION};
use crate::{hooks, routes};

/// Plugin name and module key.
pub const NAME: &str = "time-clock";

/// Module source registered with the loader.
pub fn source() -> PluginSource {
    PluginSource::constructor(|ctx| {
        let config: TimeClockConfig = config_as(&ctx.config)?;
        Ok(Arc::new(TimeClockPlugin::new(config, ctx.data)) as Arc<dyn PluginModule>)
    })
}

/// Time clock plugin for one tenant.
pub struct TimeClockPlugin {
    /// Tenant settings.
    config: Arc<TimeClockConfig>,
    /// Tenant data handle used by hooks.
    data: Arc<dyn TenantDataAccess>,
}

impl TimeClockPlugin {
    /// Create the plugin for a tenant.
    pub fn new(config: TimeClockConfig, data: Arc<dyn TenantDataAccess>) -> Self {
        Self {
            config: Arc::new(config),
            data,
        }
    }

    /// Tenant settings in effect.
    pub fn config(&self) -> &TimeClockConfig {
        &self.config
    }

    async fn audit(
        &self,
        data: &dyn TenantDataAccess,
        event: &str,
    ) -> Result<(), PluginError> {
        data.insert_document(AUDIT_COLLECTION, json!({ "event": event, "at": Utc::now() }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PluginModule for TimeClockPlugin {
    fn routes(&self) -> Vec<PluginRoute> {
        routes::routes(self.config.clone())
    }

    fn hooks(&self) -> Vec<HookBinding> {
        vec![hooks::ticket_completed(self.data.clone())]
    }

    fn ui(&self) -> UiDeclarations {
        UiDeclarations {
            nav_tabs: vec![json!({
                "id": "time-clock",
                "label": "Time Clock",
                "path": "/plugins/time-clock",
                "icon": "clock",
            })],
            ticket_tabs: vec![json!({
                "id": "time-clock-ticket",
                "label": "Time",
                "component": "TimeClockTicketTab",
            })],
            report_component: None,
        }
    }

    async fn initialize(&self) -> Result<(), PluginError> {
        info!(
            tenant = %self.data.tenant(),
            rounding_minutes = self.config.rounding_minutes,
            "Time clock initialized"
        );
        Ok(())
    }

    async fn on_install(
        &self,
        tenant: &TenantId,
        data: &dyn TenantDataAccess,
    ) -> Result<(), PluginError> {
        info!(tenant = %tenant, "Time clock installed");
        self.audit(data, "installed").await
    }

    async fn on_uninstall(
        &self,
        tenant: &TenantId,
        data: &dyn TenantDataAccess,
    ) -> Result<(), PluginError> {
        let removed = data.delete_collection(ENTRIES_COLLECTION).await?;
        info!(tenant = %tenant, removed, "Time clock entries removed");
        self.audit(data, "uninstalled").await
    }

    async fn on_enable(
        &self,
        _tenant: &TenantId,
        data: &dyn TenantDataAccess,
    ) -> Result<(), PluginError> {
        self.audit(data, "enabled").await
    }

    async fn on_disable(
        &self,
        _tenant: &TenantId,
        data: &dyn TenantDataAccess,
    ) -> Result<(), PluginError> {
        self.audit(data, "disabled").await
    }
}

#[cfg(test)]
mod tests {
    use fieldops_plugin::TenantDataProvider;
    use fieldops_plugin::api::MemoryDataProvider;

    use super::*;

    fn init_context(config: Value) -> PluginInitContext {
        let tenant = TenantId::parse("T1").unwrap();
        let data = MemoryDataProvider::new().for_tenant(&tenant);
        PluginInitContext {
            id: Default::default(),
            name: NAME.to_string(),
            version: "1.0.0".to_string(),
            config,
            company_code: tenant,
            data,
        }
    }

    #[test]
    fn test_source_reads_tenant_config() {
        let module = source()
            .instantiate(init_context(json!({ "roundingMinutes": 15 })))
            .unwrap();
        assert_eq!(module.routes().len(), 4);
        assert_eq!(module.hooks().len(), 1);
        assert_eq!(module.ui().nav_tabs[0]["path"], "/plugins/time-clock");
    }

    #[test]
    fn test_source_rejects_bad_config() {
        let result = source().instantiate(init_context(json!({ "roundingMinutes": "soon" })));
        assert!(matches!(result, Err(PluginError::Construct { .. })));
    }

    #[tokio::test]
    async fn test_uninstall_clears_entries() {
        let ctx = init_context(Value::Null);
        let tenant = ctx.company_code.clone();
        let data = ctx.data.clone();
        let module = source().instantiate(ctx).unwrap();

        data.insert_document(ENTRIES_COLLECTION, json!({ "userId": "u1" }))
            .await
            .unwrap();
        module.on_install(&tenant, data.as_ref()).await.unwrap();
        module.on_uninstall(&tenant, data.as_ref()).await.unwrap();

        assert!(data.list_documents(ENTRIES_COLLECTION).await.unwrap().is_empty());
        let audit = data.list_documents(AUDIT_COLLECTION).await.unwrap();
        let events: Vec<_> = audit.iter().map(|d| d.body["event"].clone()).collect();
        assert_eq!(events, vec![json!("installed"), json!("uninstalled")]);
    }
}
