//! Route mounting and enable-gate tests through the tenant host.

mod common;

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::response::Response;
use serde_json::{Value, json};

use fieldops_database::{InMemoryPluginCatalog, PluginCatalog};
use fieldops_plugin::{PluginError, PluginHost, PluginResponse, PluginRoute};

use common::{CallLog, TestModule, install, loader_with, plugin_config, tenant};

fn host(catalog: &Arc<InMemoryPluginCatalog>, modules: Vec<TestModule>) -> PluginHost {
    PluginHost::new(
        catalog.clone() as Arc<dyn PluginCatalog>,
        Arc::new(loader_with(modules)),
        Arc::new(common::data_provider()),
        plugin_config(),
    )
}

fn request(method: Method, uri: &str, body: Option<Value>) -> Request {
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_enable_gate_is_evaluated_per_request() {
    let calls = Arc::new(CallLog::default());
    let catalog = Arc::new(InMemoryPluginCatalog::new());
    let t1 = tenant("T1");
    let stamp = install(&catalog, &t1, "stamp").await;
    let host = host(&catalog, vec![TestModule::new("stamp", &calls).ping("/ping")]);

    let ok = host
        .dispatch(&t1, "stamp", request(Method::GET, "/ping", None))
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(json_body(ok).await, json!({ "plugin": "stamp" }));

    // flipped in the catalog only; nothing is remounted
    catalog.set_enabled(&t1, stamp.id, false).await.unwrap();
    let blocked = host
        .dispatch(&t1, "stamp", request(Method::GET, "/ping", None))
        .await;
    assert_eq!(blocked.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        json_body(blocked).await,
        json!({ "error": "AUTHORIZATION", "message": "plugin disabled" })
    );

    catalog.set_enabled(&t1, stamp.id, true).await.unwrap();
    let again = host
        .dispatch(&t1, "stamp", request(Method::GET, "/ping", None))
        .await;
    assert_eq!(again.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_plugins_and_routes_are_rejected() {
    let calls = Arc::new(CallLog::default());
    let catalog = Arc::new(InMemoryPluginCatalog::new());
    let t1 = tenant("T1");
    install(&catalog, &t1, "stamp").await;
    let host = host(&catalog, vec![TestModule::new("stamp", &calls).ping("/ping")]);

    let ghost = host
        .dispatch(&t1, "ghost", request(Method::GET, "/ping", None))
        .await;
    assert_eq!(ghost.status(), StatusCode::NOT_FOUND);

    let missing = host
        .dispatch(&t1, "stamp", request(Method::GET, "/nope", None))
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    // another tenant has not installed the plugin
    let other = host
        .dispatch(&tenant("T2"), "stamp", request(Method::GET, "/ping", None))
        .await;
    assert_eq!(other.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_inactive_tenants_do_not_start_a_runtime() {
    let calls = Arc::new(CallLog::default());
    let catalog = Arc::new(InMemoryPluginCatalog::new());
    let t1 = tenant("T1");
    install(&catalog, &t1, "stamp").await;
    let host = host(&catalog, vec![TestModule::new("stamp", &calls).ping("/ping")]);

    for code in ["T2", "T3", "T4"] {
        let stranger = tenant(code);
        let installed_elsewhere = host
            .dispatch(&stranger, "stamp", request(Method::GET, "/ping", None))
            .await;
        assert_eq!(installed_elsewhere.status(), StatusCode::FORBIDDEN);
        let ghost = host
            .dispatch(&stranger, "ghost", request(Method::GET, "/ping", None))
            .await;
        assert_eq!(ghost.status(), StatusCode::NOT_FOUND);
        assert!(!host.is_started(&stranger).await);
    }
    assert_eq!(calls.count("initialize:stamp"), 0);

    let ok = host
        .dispatch(&t1, "stamp", request(Method::GET, "/ping", None))
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
    assert!(host.is_started(&t1).await);
}

#[tokio::test]
async fn test_refresh_drops_routes_of_disabled_plugins() {
    let calls = Arc::new(CallLog::default());
    let catalog = Arc::new(InMemoryPluginCatalog::new());
    let t1 = tenant("T1");
    let alpha = install(&catalog, &t1, "alpha").await;
    install(&catalog, &t1, "gamma").await;
    let host = host(
        &catalog,
        vec![
            TestModule::new("alpha", &calls).ping("/ping"),
            TestModule::new("gamma", &calls).ping("/ping"),
        ],
    );

    let before = host.mounted_routes(&t1).await;
    assert_eq!(before.len(), 2);

    catalog.set_enabled(&t1, alpha.id, false).await.unwrap();
    assert!(!host.reload_plugin(&t1, "alpha").await.unwrap());
    // refreshing twice must not duplicate anything
    assert!(host.refresh_routes(&t1).await.is_empty());

    let after = host.mounted_routes(&t1).await;
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].plugin, "gamma");
    assert_eq!(after[0].routes, vec!["GET /ping"]);

    let gone = host
        .dispatch(&t1, "alpha", request(Method::GET, "/ping", None))
        .await;
    assert_eq!(gone.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_duplicate_routes_are_skipped_with_warning() {
    let calls = Arc::new(CallLog::default());
    let catalog = Arc::new(InMemoryPluginCatalog::new());
    let t1 = tenant("T1");
    install(&catalog, &t1, "stamp").await;
    let host = host(
        &catalog,
        vec![TestModule::new("stamp", &calls).ping("/ping").ping("ping")],
    );

    let warnings = host.refresh_routes(&t1).await;
    assert_eq!(warnings, vec!["stamp: duplicate route GET /ping skipped"]);

    let ok = host
        .dispatch(&t1, "stamp", request(Method::GET, "/ping", None))
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_routes_skip_only_that_plugin() {
    let calls = Arc::new(CallLog::default());
    let catalog = Arc::new(InMemoryPluginCatalog::new());
    let t1 = tenant("T1");
    install(&catalog, &t1, "alpha").await;
    install(&catalog, &t1, "broken").await;
    let host = host(
        &catalog,
        vec![
            TestModule::new("alpha", &calls).ping("/ping"),
            TestModule::new("broken", &calls).ping("/{a}").ping("/{b}"),
        ],
    );

    let warnings = host.refresh_routes(&t1).await;
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].starts_with("broken: routes not mounted"));

    let mounted = host.mounted_routes(&t1).await;
    assert_eq!(mounted.len(), 1);
    assert_eq!(mounted[0].plugin, "alpha");
}

#[tokio::test]
async fn test_handler_failures_become_500_and_do_not_stick() {
    let calls = Arc::new(CallLog::default());
    let catalog = Arc::new(InMemoryPluginCatalog::new());
    let t1 = tenant("T1");
    install(&catalog, &t1, "flaky").await;
    let module = TestModule::new("flaky", &calls)
        .ping("/ping")
        .route(PluginRoute::from_fn(Method::GET, "/fail", |_req| async {
            Err(PluginError::handler("database unreachable"))
        }))
        .route(PluginRoute::from_fn(Method::GET, "/panic", |req| async move {
            if req.path == "/panic" {
                panic!("handler bug");
            }
            Ok(PluginResponse::ok(Value::Null))
        }));
    let host = host(&catalog, vec![module]);

    for path in ["/fail", "/panic"] {
        let response = host
            .dispatch(&t1, "flaky", request(Method::GET, path, None))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "PLUGIN");
    }

    let ok = host
        .dispatch(&t1, "flaky", request(Method::GET, "/ping", None))
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_request_parts_reach_the_handler() {
    let calls = Arc::new(CallLog::default());
    let catalog = Arc::new(InMemoryPluginCatalog::new());
    let t1 = tenant("T1");
    install(&catalog, &t1, "echo").await;
    let module = TestModule::new("echo", &calls).route(PluginRoute::from_fn(
        Method::POST,
        "/items/{id}",
        |req| async move {
            Ok(PluginResponse::created(json!({
                "tenant": req.tenant.as_str(),
                "plugin": req.plugin,
                "id": req.param("id"),
                "mode": req.query_param("mode"),
                "body": req.body,
            })))
        },
    ));
    let host = host(&catalog, vec![module]);

    let response = host
        .dispatch(
            &t1,
            "echo",
            request(Method::POST, "/items/42?mode=fast", Some(json!({ "a": 1 }))),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        json_body(response).await,
        json!({
            "tenant": "T1",
            "plugin": "echo",
            "id": "42",
            "mode": "fast",
            "body": { "a": 1 },
        })
    );

    let invalid = host
        .dispatch(
            &t1,
            "echo",
            Request::builder()
                .method(Method::POST)
                .uri("/items/1")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
}
