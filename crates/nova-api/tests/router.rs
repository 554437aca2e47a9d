//! Router tests.
//!
//! Drives the full router against an in-memory cloud: scrape output,
//! content type, team labels, and the health document.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use nova_api::build_router;
use nova_client::{CloudSnapshot, Operation, StaticCloudClient};
use nova_core::{ComputeService, Server, Tenant};
use nova_metrics::{Exporter, ExporterOptions, nova_catalog};
use nova_teams::TeamCache;

fn test_cloud() -> CloudSnapshot {
    CloudSnapshot {
        tenants: vec![
            Tenant::new("t1", "alpha", &["infra-team"]),
            Tenant::new("t2", "beta", &["prod"]),
        ],
        servers: vec![
            Server {
                id: "s1".into(),
                name: "web".into(),
                status: "ACTIVE".into(),
                tenant_id: "t1".into(),
                ..Server::default()
            },
            Server {
                id: "s2".into(),
                name: "db".into(),
                status: "PAUSED".into(),
                tenant_id: "t2".into(),
                ..Server::default()
            },
        ],
        services: vec![ComputeService {
            id: "7".into(),
            binary: "nova-compute".into(),
            host: "cmp-1".into(),
            state: "up".into(),
            ..ComputeService::default()
        }],
        ..CloudSnapshot::default()
    }
}

async fn test_router(client: Arc<StaticCloudClient>) -> axum::Router {
    let teams = TeamCache::new("-team");
    teams.refresh(client.as_ref()).await.unwrap();
    let exporter = Exporter::new(nova_catalog(), ExporterOptions::default(), client, teams).unwrap();
    build_router(Arc::new(exporter))
}

async fn get(router: axum::Router, uri: &str) -> (StatusCode, String, String) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let content_type = resp
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn metrics_endpoint_serves_prometheus_text() {
    let client = Arc::new(StaticCloudClient::new(test_cloud()));
    let (status, content_type, body) = get(test_router(client).await, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/plain; version=0.0.4"));
    assert!(body.contains("# TYPE openstack_nova_total_vms gauge\n"));
    assert!(body.contains("openstack_nova_total_vms 2\n"));
    assert!(body.contains("openstack_nova_up 1\n"));
}

#[tokio::test]
async fn server_status_has_team_label() {
    let client = Arc::new(StaticCloudClient::new(test_cloud()));
    let (_, _, body) = get(test_router(client).await, "/metrics").await;

    let lines: Vec<_> = body
        .lines()
        .filter(|l| l.starts_with("openstack_nova_server_status{"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(r#"id="s1""#));
    assert!(lines[0].ends_with(r#"team="infra-team"} 0"#));
    assert!(lines[1].ends_with(r#"team=""} 8"#));
}

#[tokio::test]
async fn failing_producer_still_serves_others() {
    let client = Arc::new(StaticCloudClient::new(test_cloud()));
    client.fail(Operation::ListComputeServices);
    let (status, _, body) = get(test_router(client).await, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("openstack_nova_agent_state{"));
    assert!(body.contains("openstack_nova_total_vms 2\n"));
    assert!(body.contains("openstack_nova_up 0\n"));
}

#[tokio::test]
async fn each_scrape_queries_the_cloud_again() {
    let client = Arc::new(StaticCloudClient::new(test_cloud()));
    let router = test_router(client.clone()).await;

    get(router.clone(), "/metrics").await;
    client.update(|s| s.servers.truncate(1));
    let (_, _, body) = get(router, "/metrics").await;

    assert!(body.contains("openstack_nova_total_vms 1\n"));
    assert_eq!(client.calls(Operation::ListServers), 2);
}

#[tokio::test]
async fn healthz_reports_team_cache() {
    let client = Arc::new(StaticCloudClient::new(test_cloud()));
    let (status, content_type, body) = get(test_router(client).await, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("application/json"));
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["team_cache"]["generation"], 1);
    assert_eq!(json["team_cache"]["tenants"], 1);
    assert_eq!(json["team_cache"]["suffix"], "-team");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let client = Arc::new(StaticCloudClient::new(test_cloud()));
    let (status, _, _) = get(test_router(client).await, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
