mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tower::ServiceExt;

use common::{healthy_service, monitor_context, spawn_service, store_manager, FakeStore};
use ualflix_admin::models::{ServiceDescriptor, ServiceKind};
use ualflix_admin::services::{AggregationService, MonitorContext, Supervisor};
use ualflix_admin::{api, AppState};

fn app_state(ctx: &MonitorContext) -> AppState {
    AppState {
        aggregation: AggregationService::new(ctx.clone()),
        inspector: ctx.inspector.clone(),
        metrics: ctx.metrics.clone(),
        supervisor: Arc::new(Supervisor::with_tasks(Vec::new(), ctx.history.clone())),
    }
}

/// Three healthy microservices and the primary store node
async fn platform(store: &Arc<FakeStore>) -> MonitorContext {
    let mut entries = Vec::new();
    for name in ["authentication_service", "catalog_service", "streaming_service"] {
        entries.push(ServiceDescriptor::new(
            name,
            healthy_service().await,
            ServiceKind::Microservice,
        ));
    }
    entries.push(ServiceDescriptor::new(
        "ualflix_db_primary",
        "http://ualflix_db_primary:27017",
        ServiceKind::DataStoreNode,
    ));
    monitor_context(entries, store_manager(store, Some("ualflix-replica-set")))
}

async fn get_json(ctx: &MonitorContext, uri: &str) -> (StatusCode, Value) {
    let response = api::app(app_state(ctx))
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_reports_store_and_collectors() {
    let store = FakeStore::replicating();
    let ctx = platform(&store).await;

    let (status, body) = get_json(&ctx, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["mode"], "replica_set");
    assert_eq!(body["database"]["replica_set"], "ualflix-replica-set");
    assert_eq!(body["collectors_running"], false);
    assert_eq!(body["data_points"], 0);
}

#[tokio::test]
async fn test_health_fails_when_reader_is_down() {
    let store = FakeStore::replicating();
    store.reader_down.store(true, Ordering::SeqCst);
    let ctx = platform(&store).await;

    let (status, body) = get_json(&ctx, "/health").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "STORE_UNAVAILABLE");
}

#[tokio::test]
async fn test_services_snapshot_of_healthy_platform() {
    let store = FakeStore::replicating();
    let ctx = platform(&store).await;

    let (status, body) = get_json(&ctx, "/services").await;
    assert_eq!(status, StatusCode::OK);

    let services = body["services"].as_array().unwrap();
    assert_eq!(services.len(), 4);
    assert!(services.iter().all(|s| s["status"] == "healthy"));
    assert_eq!(body["availability_percent"], 100.0);

    let catalog = &services[1];
    assert_eq!(catalog["id"], "catalog_service");
    assert_eq!(catalog["name"], "Catalog Service");
    assert_eq!(catalog["metrics"]["source"], "synthetic");
    assert!(catalog["cluster_info"]["replicas"].as_u64().is_some());
    assert!(catalog.get("replica_set_info").is_none());

    let db = &services[3];
    assert_eq!(db["probed_via"], "assumed_healthy");
    assert_eq!(db["replica_set_info"]["role"], "primary");
    assert_eq!(db["replica_set_info"]["members_count"], 2);
    assert_eq!(db["metrics"]["videos_count"], 4);
    assert!(db.get("cluster_info").is_none());
}

#[tokio::test]
async fn test_single_node_store_entry_is_primary() {
    let store = FakeStore::replicating();
    *store.topology.lock() = None;
    let entries = vec![
        ServiceDescriptor::new("catalog_service", healthy_service().await, ServiceKind::Microservice),
        ServiceDescriptor::new("ualflix_db_primary", "http://ualflix_db_primary:27017", ServiceKind::DataStoreNode),
    ];
    let manager = store_manager(&store, None).with_node_address("ualflix_db_primary:27017");
    let ctx = monitor_context(entries, manager);

    let (status, body) = get_json(&ctx, "/services").await;
    assert_eq!(status, StatusCode::OK);
    let db = &body["services"][1];
    assert_eq!(db["replica_set_info"]["role"], "primary");
    assert_eq!(db["replica_set_info"]["status"], "single_node");
    assert_eq!(db["replica_set_info"]["members_count"], 1);
    assert_eq!(db["metrics"]["users_count"], 4);
}

#[tokio::test]
async fn test_services_use_collector_figures_once_observed() {
    let store = FakeStore::replicating();
    let ctx = platform(&store).await;
    ctx.metrics.observe_latency("catalog_service", 0.2);
    ctx.metrics.add_requests("catalog_service", "GET", "200", 7);

    let (_, body) = get_json(&ctx, "/services").await;
    let catalog = &body["services"][1];
    assert_eq!(catalog["metrics"]["source"], "collector");
    assert_eq!(catalog["metrics"]["requests_total"], 7);
    assert_eq!(catalog["metrics"]["avg_response_ms"], 200.0);
}

#[tokio::test]
async fn test_services_never_drop_unreachable_entries() {
    let store = FakeStore::replicating();
    *store.topology.lock() = None;
    let entries = vec![
        ServiceDescriptor::new("catalog_service", healthy_service().await, ServiceKind::Microservice),
        ServiceDescriptor::new("video_processor", common::closed_port_url().await, ServiceKind::Processor),
        ServiceDescriptor::new("ualflix_db_secondary", "http://ualflix_db_secondary:27018", ServiceKind::DataStoreNode),
    ];
    let ctx = monitor_context(entries, store_manager(&store, Some("ualflix-replica-set")));

    let (status, body) = get_json(&ctx, "/services").await;
    assert_eq!(status, StatusCode::OK);
    let services = body["services"].as_array().unwrap();
    assert_eq!(services.len(), 3);
    assert_eq!(services[1]["status"], "timeout");
    assert_eq!(services[2]["replica_set_info"]["status"], "error");
    assert_eq!(services[2]["replica_set_info"]["role"], "unknown");
}

#[tokio::test]
async fn test_summary_of_healthy_platform_has_no_alerts() {
    let store = FakeStore::replicating();
    let ctx = platform(&store).await;

    let (status, body) = get_json(&ctx, "/metrics/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["services"]["availability_percent"], 100.0);
    assert_eq!(body["services"]["total"], 4);
    assert_eq!(body["alerts"].as_array().unwrap().len(), 0);
    assert_eq!(body["store"]["topology"]["overall"], "healthy");
    assert_eq!(body["trend"]["data_points"], 0);
}

#[tokio::test]
async fn test_summary_alerts_on_degraded_platform() {
    let store = FakeStore::replicating();
    *store.topology.lock() = None;
    let entries = vec![
        ServiceDescriptor::new("catalog_service", healthy_service().await, ServiceKind::Microservice),
        ServiceDescriptor::new("video_processor", common::closed_port_url().await, ServiceKind::Processor),
    ];
    let ctx = monitor_context(entries, store_manager(&store, Some("ualflix-replica-set")));

    let (_, body) = get_json(&ctx, "/metrics/summary").await;
    assert_eq!(body["services"]["availability_percent"], 50.0);
    let severities: Vec<_> = body["alerts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["severity"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(severities, vec!["critical", "warning"]);
}

#[tokio::test]
async fn test_store_status_passthrough() {
    let store = FakeStore::replicating();
    let ctx = platform(&store).await;

    let (status, body) = get_json(&ctx, "/metrics/store-status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["single_node"], false);
    assert_eq!(body["replication"]["working"], true);
    assert_eq!(body["topology"]["overall"], "healthy");
    assert_eq!(store.sentinel_count(), 0);
}

#[tokio::test]
async fn test_store_status_fails_when_writer_is_down() {
    let store = FakeStore::replicating();
    store.writer_down.store(true, Ordering::SeqCst);
    let ctx = platform(&store).await;

    let (status, body) = get_json(&ctx, "/metrics/store-status").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "STORE_UNAVAILABLE");
    assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_prometheus_exposition_over_http() {
    let store = FakeStore::replicating();
    let ctx = platform(&store).await;
    ctx.metrics.observe_latency("catalog_service", 0.1);
    ctx.metrics.set_availability(100.0);

    let base = spawn_service(api::app(app_state(&ctx))).await;
    let response = reqwest::get(format!("{base}/metrics")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let text = response.text().await.unwrap();
    assert!(text.contains("ualflix_system_request_duration_seconds_bucket"));
    assert!(text.contains("ualflix_system_availability_percent 100"));
}

#[tokio::test]
async fn test_dashboard_prefix_serves_same_routes() {
    let store = FakeStore::replicating();
    let ctx = platform(&store).await;

    let base = spawn_service(api::app(app_state(&ctx))).await;
    let body: Value = reqwest::get(format!("{base}/api/admin/services"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["services"].as_array().unwrap().len(), 4);
}
