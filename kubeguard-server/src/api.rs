//! HTTP API router and handlers.
//!
//! Implements the polling REST contract. Every response body uses the
//! `{status, message?, data?}` envelope. All routes except `/health`
//! require a bearer token when API tokens are configured.

use std::sync::Arc;
use std::time::SystemTime;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use kubeguard_core::error::ScanError;
use kubeguard_core::metrics::{LABEL_PATH, SERVER_AUTH_FAILURES_TOTAL, SERVER_REQUESTS_TOTAL};
use kubeguard_core::scan::{ScanRun, ScanStatus};
use kubeguard_core::types::{ClusterMetricsSample, ResourceMetricsSample};
use kubeguard_inventory::{ClusterApi, SamplerHandle};
use kubeguard_scan_engine::{ScanEngine, VulnFeed};

/// Shared handler state.
pub struct AppState<C, F> {
    pub engine: Arc<ScanEngine<C, F>>,
    pub sampler: SamplerHandle,
    pub api_tokens: Arc<Vec<String>>,
}

impl<C, F> Clone for AppState<C, F> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            sampler: self.sampler.clone(),
            api_tokens: Arc::clone(&self.api_tokens),
        }
    }
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

fn success(data: Value) -> Json<Envelope> {
    Json(Envelope {
        status: "success",
        message: None,
        data: Some(data),
    })
}

fn success_with_message(message: impl Into<String>, data: Value) -> Json<Envelope> {
    Json(Envelope {
        status: "success",
        message: Some(message.into()),
        data: Some(data),
    })
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(Envelope {
            status: "error",
            message: Some(message.into()),
            data: None,
        }),
    )
        .into_response()
}

/// Builds the API router.
pub fn router<C: ClusterApi, F: VulnFeed>(state: AppState<C, F>) -> Router {
    let protected = Router::new()
        .route("/scan", post(start_scan::<C, F>))
        .route("/scan/status", get(scan_status::<C, F>))
        .route("/resources", get(resources::<C, F>))
        .route("/cluster/metrics", get(cluster_metrics::<C, F>))
        .route("/resources/metrics", get(resource_metrics::<C, F>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer::<C, F>,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bearer-token check for all routes except `/health`.
///
/// An empty token list disables authentication (development only; the
/// config loader warns about it at startup).
async fn require_bearer<C: ClusterApi, F: VulnFeed>(
    State(state): State<AppState<C, F>>,
    request: Request,
    next: Next,
) -> Response {
    if state.api_tokens.is_empty() {
        return next.run(request).await;
    }

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| state.api_tokens.iter().any(|known| known == token))
        .unwrap_or(false);

    if !authorized {
        counter!(SERVER_AUTH_FAILURES_TOTAL).increment(1);
        return error_response(StatusCode::UNAUTHORIZED, "missing or invalid bearer token");
    }
    next.run(request).await
}

async fn health() -> Json<Envelope> {
    counter!(SERVER_REQUESTS_TOTAL, LABEL_PATH => "/health").increment(1);
    success_with_message("ok", json!({"service": "kubeguard"}))
}

async fn start_scan<C: ClusterApi, F: VulnFeed>(
    State(state): State<AppState<C, F>>,
) -> Response {
    counter!(SERVER_REQUESTS_TOTAL, LABEL_PATH => "/scan").increment(1);
    match state.engine.start_scan().await {
        Ok(scan_id) => (
            StatusCode::ACCEPTED,
            success(json!({"scan_id": scan_id})),
        )
            .into_response(),
        Err(ScanError::AlreadyRunning) => {
            error_response(StatusCode::CONFLICT, "scan already running")
        }
        Err(e) => {
            error!(error = %e, "failed to start scan");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn scan_status<C: ClusterApi, F: VulnFeed>(
    State(state): State<AppState<C, F>>,
) -> Response {
    counter!(SERVER_REQUESTS_TOTAL, LABEL_PATH => "/scan/status").increment(1);
    let run = state.engine.state().snapshot().await;
    match scan_run_json(&run) {
        Ok(data) => success(data).into_response(),
        Err(e) => {
            error!(error = %e, "failed to serialize scan status");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "serialization failed")
        }
    }
}

async fn resources<C: ClusterApi, F: VulnFeed>(State(state): State<AppState<C, F>>) -> Response {
    counter!(SERVER_REQUESTS_TOTAL, LABEL_PATH => "/resources").increment(1);
    match state.engine.reader().resource_counts().await {
        Ok((counts, failures)) => {
            let data = json!({
                "pods": counts.pods,
                "services": counts.services,
                "nodes": counts.nodes,
            });
            if failures.is_empty() {
                success(data).into_response()
            } else {
                success_with_message(
                    format!("{} namespace reads failed", failures.len()),
                    data,
                )
                .into_response()
            }
        }
        Err(e) => {
            error!(error = %e, "failed to read resource counts");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

async fn cluster_metrics<C: ClusterApi, F: VulnFeed>(
    State(state): State<AppState<C, F>>,
) -> Response {
    counter!(SERVER_REQUESTS_TOTAL, LABEL_PATH => "/cluster/metrics").increment(1);
    let latest = state.sampler.latest_cluster().await;
    let window = state.sampler.cluster_window().await;
    let data = json!({
        "latest": latest.as_ref().map(cluster_sample_json),
        "window": window.iter().map(cluster_sample_json).collect::<Vec<_>>(),
    });
    if latest.is_some() {
        success(data).into_response()
    } else {
        success_with_message("no cluster sample collected yet", data).into_response()
    }
}

async fn resource_metrics<C: ClusterApi, F: VulnFeed>(
    State(state): State<AppState<C, F>>,
) -> Response {
    counter!(SERVER_REQUESTS_TOTAL, LABEL_PATH => "/resources/metrics").increment(1);
    let latest = state.sampler.latest_host().await;
    let window = state.sampler.host_window().await;
    let data = json!({
        "latest": latest.as_ref().map(host_sample_json),
        "window": window.iter().map(host_sample_json).collect::<Vec<_>>(),
    });
    if latest.is_some() {
        success(data).into_response()
    } else {
        success_with_message("no host sample collected yet", data).into_response()
    }
}

// --- JSON shaping ---

fn rfc3339(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}

fn scan_run_json(run: &ScanRun) -> Result<Value, serde_json::Error> {
    let started_at = (run.status != ScanStatus::Pending).then(|| rfc3339(run.started_at));
    Ok(json!({
        "scan_id": run.id,
        "status": run.status.to_string(),
        "progress": run.progress_percent,
        "message": run.message,
        "started_at": started_at,
        "completed_at": run.completed_at.map(rfc3339),
        "summary": serde_json::to_value(run.summary)?,
        "vulnerability_stats": serde_json::to_value(run.severity_histogram)?,
        "partial_failures": run.partial_failures,
        "latest_scan": {
            "cves": serde_json::to_value(&run.cves)?,
            "pods": serde_json::to_value(&run.pods)?,
        },
    }))
}

fn cluster_sample_json(sample: &ClusterMetricsSample) -> Value {
    json!({
        "timestamp": rfc3339(sample.timestamp),
        "total_nodes": sample.total_nodes,
        "total_pods": sample.total_pods,
        "total_services": sample.total_services,
        "total_namespaces": sample.total_namespaces,
        "cpu_usage": sample.cpu_usage,
        "cpu_capacity": sample.cpu_capacity,
        "memory_usage": sample.memory_usage,
        "memory_capacity": sample.memory_capacity,
        "nodes": sample.nodes.iter().map(|node| json!({
            "name": node.name,
            "status": node.status,
            "cpu_usage": node.cpu_usage,
            "cpu_capacity": node.cpu_capacity,
            "memory_usage": node.memory_usage,
            "memory_capacity": node.memory_capacity,
            "pods_running": node.pods_running,
        })).collect::<Vec<_>>(),
    })
}

fn host_sample_json(sample: &ResourceMetricsSample) -> Value {
    json!({
        "timestamp": rfc3339(sample.timestamp),
        "cpu_cores": sample.cpu_cores,
        "cpu_usage": sample.cpu_usage,
        "memory_usage": sample.memory_usage,
        "memory_total": sample.memory_total,
        "disk_usage": sample.disk_usage,
        "disk_total": sample.disk_total,
    })
}
