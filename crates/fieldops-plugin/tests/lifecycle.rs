//! Instance manager lifecycle tests.

mod common;

use std::sync::Arc;

use serde_json::json;

use fieldops_database::{InMemoryPluginCatalog, PluginCatalog};
use fieldops_plugin::api::TenantDataProvider;
use fieldops_plugin::{BuiltinModuleLoader, ModuleLoader, PluginError, PluginManager};

use common::{CallLog, InitBehaviour, TestModule, install, loader_with, plugin_config, tenant};

fn manager(
    catalog: &Arc<InMemoryPluginCatalog>,
    loader: Arc<BuiltinModuleLoader>,
) -> PluginManager {
    let t1 = tenant("T1");
    let data = common::data_provider().for_tenant(&t1);
    PluginManager::new(
        t1,
        catalog.clone() as Arc<dyn PluginCatalog>,
        loader as Arc<dyn ModuleLoader>,
        data,
        &plugin_config(),
    )
}

#[tokio::test]
async fn test_one_failing_plugin_does_not_block_the_others() {
    let calls = Arc::new(CallLog::default());
    let catalog = Arc::new(InMemoryPluginCatalog::new());
    let t1 = tenant("T1");
    for name in ["alpha", "broken", "gamma"] {
        install(&catalog, &t1, name).await;
    }

    let loader = Arc::new(loader_with(vec![
        TestModule::new("alpha", &calls),
        TestModule::new("broken", &calls).with_init(InitBehaviour::Fail),
        TestModule::new("gamma", &calls),
    ]));
    let manager = manager(&catalog, loader);

    let report = manager.initialize().await;

    assert_eq!(report.loaded, vec!["alpha", "gamma"]);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("broken"));
    assert!(!manager.is_loaded("broken").await);
    assert!(manager.is_initialized());
}

#[tokio::test]
async fn test_missing_module_is_a_warning() {
    let catalog = Arc::new(InMemoryPluginCatalog::new());
    install(&catalog, &tenant("T1"), "ghost").await;

    let manager = manager(&catalog, Arc::new(BuiltinModuleLoader::new()));
    let report = manager.initialize().await;

    assert!(report.loaded.is_empty());
    assert_eq!(report.warnings, vec!["plugin module 'ghost' not found"]);
}

#[tokio::test]
async fn test_disabled_plugins_are_not_loaded() {
    let calls = Arc::new(CallLog::default());
    let catalog = Arc::new(InMemoryPluginCatalog::new());
    let t1 = tenant("T1");
    let alpha = install(&catalog, &t1, "alpha").await;
    install(&catalog, &t1, "gamma").await;
    catalog.set_enabled(&t1, alpha.id, false).await.unwrap();

    let loader = Arc::new(loader_with(vec![
        TestModule::new("alpha", &calls),
        TestModule::new("gamma", &calls),
    ]));
    let manager = manager(&catalog, loader);

    assert_eq!(manager.initialize().await.loaded, vec!["gamma"]);
    assert_eq!(calls.count("initialize:alpha"), 0);
}

#[tokio::test]
async fn test_unload_removes_only_its_own_hooks() {
    let calls = Arc::new(CallLog::default());
    let catalog = Arc::new(InMemoryPluginCatalog::new());
    let t1 = tenant("T1");
    install(&catalog, &t1, "alpha").await;
    install(&catalog, &t1, "gamma").await;

    let loader = Arc::new(loader_with(vec![
        TestModule::new("alpha", &calls)
            .trail_hook("ticket.created", 100)
            .trail_hook("ticket.completed", 100),
        TestModule::new("gamma", &calls).trail_hook("ticket.created", 100),
    ]));
    let manager = manager(&catalog, loader);
    manager.initialize().await;

    assert!(manager.unload_plugin("alpha").await);
    assert!(!manager.unload_plugin("alpha").await);
    assert_eq!(calls.count("cleanup:alpha"), 1);

    let hooks = manager.hook_registry();
    assert_eq!(hooks.owners("ticket.created").await, vec!["gamma"]);
    assert_eq!(hooks.handler_count("ticket.completed").await, 0);

    let out = manager
        .execute_hook("ticket.created", json!({ "trail": [] }))
        .await;
    assert_eq!(out, json!({ "trail": ["gamma"] }));
}

#[tokio::test]
async fn test_hooks_run_in_priority_order_across_plugins() {
    let calls = Arc::new(CallLog::default());
    let catalog = Arc::new(InMemoryPluginCatalog::new());
    let t1 = tenant("T1");
    install(&catalog, &t1, "alpha").await;
    install(&catalog, &t1, "gamma").await;

    let loader = Arc::new(loader_with(vec![
        TestModule::new("alpha", &calls).trail_hook("report.build", 100),
        TestModule::new("gamma", &calls).trail_hook("report.build", 50),
    ]));
    let manager = manager(&catalog, loader);
    manager.initialize().await;

    let out = manager
        .execute_hook("report.build", json!({ "trail": [] }))
        .await;
    assert_eq!(out, json!({ "trail": ["gamma", "alpha"] }));

    let untouched = manager.execute_hook("unknown.event", json!(42)).await;
    assert_eq!(untouched, json!(42));
}

#[tokio::test(start_paused = true)]
async fn test_hanging_initialize_times_out() {
    let calls = Arc::new(CallLog::default());
    let catalog = Arc::new(InMemoryPluginCatalog::new());
    let t1 = tenant("T1");
    install(&catalog, &t1, "sleepy").await;

    let loader = Arc::new(loader_with(vec![
        TestModule::new("sleepy", &calls).with_init(InitBehaviour::Hang),
    ]));
    let manager = manager(&catalog, loader);

    let installed = catalog
        .find_installed_by_name(&t1, "sleepy")
        .await
        .unwrap()
        .unwrap();
    let err = manager.load_plugin(&installed).await.unwrap_err();

    assert!(matches!(
        err,
        PluginError::Timeout {
            stage: "initialize",
            seconds: 5,
            ..
        }
    ));
    assert!(!manager.is_loaded("sleepy").await);
}

#[tokio::test]
async fn test_reload_plugin_reads_module_again_and_follows_catalog() {
    let calls = Arc::new(CallLog::default());
    let catalog = Arc::new(InMemoryPluginCatalog::new());
    let t1 = tenant("T1");
    let alpha = install(&catalog, &t1, "alpha").await;

    let loader = Arc::new(loader_with(vec![
        TestModule::new("alpha", &calls).trail_hook("ticket.created", 100),
    ]));
    let manager = manager(&catalog, loader.clone());
    manager.initialize().await;
    assert_eq!(loader.read_count(), 1);

    assert!(manager.reload_plugin("alpha").await.unwrap());
    assert_eq!(loader.read_count(), 2);
    assert_eq!(calls.count("initialize:alpha"), 2);
    assert_eq!(calls.count("cleanup:alpha"), 1);
    assert_eq!(
        manager.hook_registry().handler_count("ticket.created").await,
        1
    );

    catalog.set_enabled(&t1, alpha.id, false).await.unwrap();
    assert!(!manager.reload_plugin("alpha").await.unwrap());
    assert!(!manager.is_loaded("alpha").await);
    assert_eq!(
        manager.hook_registry().handler_count("ticket.created").await,
        0
    );
}

#[tokio::test]
async fn test_reload_all_unloads_before_loading() {
    let calls = Arc::new(CallLog::default());
    let catalog = Arc::new(InMemoryPluginCatalog::new());
    let t1 = tenant("T1");
    install(&catalog, &t1, "alpha").await;

    let loader = Arc::new(loader_with(vec![
        TestModule::new("alpha", &calls),
        TestModule::new("gamma", &calls).with_nav_tab("Gamma"),
    ]));
    let manager = manager(&catalog, loader.clone());
    manager.initialize().await;

    install(&catalog, &t1, "gamma").await;
    let report = manager.reload_all_plugins().await;

    assert_eq!(report.loaded, vec!["alpha", "gamma"]);
    assert!(report.warnings.is_empty());
    assert_eq!(calls.count("cleanup:alpha"), 1);
    assert_eq!(loader.read_count(), 3);

    let ui = manager.ui_declarations().await;
    assert_eq!(ui.len(), 1);
    assert_eq!(ui[0].plugin, "gamma");
}

#[tokio::test]
async fn test_tenant_callbacks_use_transient_instance_when_unloaded() {
    let calls = Arc::new(CallLog::default());
    let catalog = Arc::new(InMemoryPluginCatalog::new());
    let t1 = tenant("T1");
    let beta = install(&catalog, &t1, "beta").await;
    catalog.set_enabled(&t1, beta.id, false).await.unwrap();

    let loader = Arc::new(loader_with(vec![
        TestModule::new("beta", &calls).failing_uninstall(),
    ]));
    let manager = manager(&catalog, loader);
    manager.initialize().await;

    manager.run_install_hook(&beta, &json!({})).await.unwrap();
    assert_eq!(calls.count("on_install:beta"), 1);
    assert!(!manager.is_loaded("beta").await);

    let err = manager
        .run_uninstall_hook(&beta, &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PluginError::Lifecycle {
            stage: "on_uninstall",
            ..
        }
    ));
}
