//! HTTP API integration tests.
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`,
//! backed by a mock cluster and an in-memory vulnerability feed.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use kubeguard_core::error::FeedError;
use kubeguard_core::types::{ContainerRef, VulnerabilityFinding, Workload};
use kubeguard_inventory::{
    ClusterApi, InventoryError, NodeRecord, NodeUsage, PodDetail, SamplerHandle,
};
use kubeguard_scan_engine::{
    CanonicalImageKey, EngineSettings, FileVulnFeed, ScanEngine, VulnFeed,
};
use kubeguard_server::api::{AppState, router};

#[derive(Clone)]
struct MockCluster {
    pods: Vec<PodDetail>,
}

fn pod(name: &str, image: &str) -> PodDetail {
    PodDetail {
        workload: Workload {
            namespace: "default".to_owned(),
            name: name.to_owned(),
            containers: vec![ContainerRef {
                name: "app".to_owned(),
                image: image.to_owned(),
                privileged: None,
            }],
            run_as_non_root: Some(true),
        },
        node_name: Some("node-1".to_owned()),
        phase: "Running".to_owned(),
    }
}

impl ClusterApi for MockCluster {
    async fn list_namespaces(&self) -> Result<Vec<String>, InventoryError> {
        Ok(vec!["default".to_owned()])
    }

    async fn list_pods(&self, _namespace: &str) -> Result<Vec<PodDetail>, InventoryError> {
        Ok(self.pods.clone())
    }

    async fn count_services(&self, _namespace: &str) -> Result<usize, InventoryError> {
        Ok(2)
    }

    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, InventoryError> {
        Ok(vec![NodeRecord {
            name: "node-1".to_owned(),
            ready: true,
            cpu_capacity: 4.0,
            memory_capacity: 8 << 30,
        }])
    }

    async fn node_usage(&self) -> Result<Vec<NodeUsage>, InventoryError> {
        Ok(Vec::new())
    }
}

/// Feed that never answers within the lookup timeout, keeping scans running.
struct StallingFeed;

impl VulnFeed for StallingFeed {
    async fn lookup(
        &self,
        _key: &CanonicalImageKey,
    ) -> Result<Vec<VulnerabilityFinding>, FeedError> {
        tokio::time::sleep(Duration::from_secs(300)).await;
        Ok(Vec::new())
    }
}

fn settings() -> EngineSettings {
    EngineSettings {
        scan_timeout: Duration::from_secs(30),
        history_limit: 10,
        lookup_timeout: Duration::from_secs(30),
        lookup_concurrency: 4,
    }
}

fn app_with_feed<F: VulnFeed>(feed: F, tokens: Vec<String>) -> Router {
    let engine = ScanEngine::builder()
        .cluster_client(MockCluster {
            pods: vec![pod("web-1", "app:1.0"), pod("web-2", "app:2.0")],
        })
        .vuln_feed(feed)
        .settings(settings())
        .build()
        .unwrap();
    router(AppState {
        engine: Arc::new(engine),
        sampler: SamplerHandle::new(8),
        api_tokens: Arc::new(tokens),
    })
}

fn app(tokens: Vec<String>) -> Router {
    app_with_feed(FileVulnFeed::empty(), tokens)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_authed(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn post_authed(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_needs_no_token() {
    let app = app(vec!["secret".to_owned()]);
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "ok");
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = app(vec!["secret".to_owned()]);
    let response = app.oneshot(get("/scan/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("bearer"));
}

#[tokio::test]
async fn wrong_token_is_unauthorized() {
    let app = app(vec!["secret".to_owned()]);
    let response = app
        .oneshot(get_authed("/scan/status", "not-the-secret"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_token_list_disables_auth() {
    let app = app(Vec::new());
    let response = app.oneshot(get("/scan/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn scan_status_starts_pending() {
    let app = app(Vec::new());
    let response = app.oneshot(get("/scan/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    let data = &body["data"];
    assert_eq!(data["status"], "pending");
    assert_eq!(data["progress"], 0);
    assert!(data["started_at"].is_null());
    assert_eq!(data["summary"]["total_pods"], 0);
    assert_eq!(data["latest_scan"]["cves"], serde_json::json!([]));
}

#[tokio::test]
async fn second_scan_start_conflicts() {
    let app = app_with_feed(StallingFeed, Vec::new());

    let response = app
        .clone()
        .oneshot(post_authed("/scan", ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert!(body["data"]["scan_id"].is_string());

    let response = app.oneshot(post_authed("/scan", "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("already running"));
}

#[tokio::test]
async fn resources_reports_live_counts() {
    let app = app(vec!["secret".to_owned()]);
    let response = app
        .oneshot(get_authed("/resources", "secret"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["pods"], 2);
    assert_eq!(body["data"]["services"], 2);
    assert_eq!(body["data"]["nodes"], 1);
}

#[tokio::test]
async fn metrics_endpoints_report_empty_window() {
    let app = app(Vec::new());

    let response = app.clone().oneshot(get("/cluster/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["data"]["latest"].is_null());
    assert_eq!(body["data"]["window"], serde_json::json!([]));
    assert!(body["message"].as_str().unwrap().contains("no cluster sample"));

    let response = app.oneshot(get("/resources/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["data"]["latest"].is_null());
}
