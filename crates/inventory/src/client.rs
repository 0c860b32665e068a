//! Kubernetes API abstraction for testability.
//!
//! The [`ClusterApi`] trait abstracts the Kubernetes REST API, allowing
//! production code to use [`HttpClusterClient`] while tests use mock clients.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ InventoryReader  │
//! └────────┬─────────┘
//!          │
//!          ▼
//!   ┌────────────┐
//!   │ ClusterApi │ (trait)
//!   └────────────┘
//!       │      │
//!       ▼      ▼
//!   ┌──────┐ ┌──────┐
//!   │ Http │ │ Mock │
//!   └───┬──┘ └──────┘
//!       │
//!       ▼
//!   kube-apiserver
//! ```
//!
//! # Quantity Parsing
//!
//! Kubernetes reports CPU and memory as quantity strings (`250m`, `128974848n`,
//! `4Gi`). [`parse_cpu_quantity`] normalizes CPU to cores and
//! [`parse_memory_quantity`] normalizes memory to bytes. Unparseable values
//! degrade to zero instead of failing the whole read.

use std::future::Future;

use metrics::counter;
use serde::Deserialize;
use tracing::{debug, warn};

use kubeguard_core::metrics::{INVENTORY_API_REQUESTS_TOTAL, LABEL_RESULT};
use kubeguard_core::types::{ContainerRef, Workload};

use crate::config::InventoryConfig;
use crate::error::InventoryError;

/// Pod snapshot including placement details.
///
/// Extends [`Workload`] with the scheduling fields the sampler needs
/// (node name and phase) without widening the core type.
#[derive(Debug, Clone)]
pub struct PodDetail {
    /// The scan-facing workload view of this pod.
    pub workload: Workload,
    /// Node the pod is scheduled on, if any.
    pub node_name: Option<String>,
    /// Pod phase (`Running`, `Pending`, ...).
    pub phase: String,
}

impl PodDetail {
    /// Returns true when the pod is in the `Running` phase.
    pub fn is_running(&self) -> bool {
        self.phase == "Running"
    }
}

/// Node snapshot from `/api/v1/nodes`.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    /// Node name.
    pub name: String,
    /// Whether the `Ready` condition is `True`.
    pub ready: bool,
    /// CPU capacity in cores.
    pub cpu_capacity: f64,
    /// Memory capacity in bytes.
    pub memory_capacity: u64,
}

/// Per-node usage from `metrics.k8s.io`.
#[derive(Debug, Clone)]
pub struct NodeUsage {
    /// Node name.
    pub name: String,
    /// CPU usage in cores.
    pub cpu_usage: f64,
    /// Memory usage in bytes.
    pub memory_usage: u64,
}

/// Trait abstracting Kubernetes API reads.
///
/// All cluster access goes through this trait, enabling testability via
/// mocking. The trait is `Send + Sync + 'static`, allowing safe sharing
/// across async contexts. All methods are read-only; this module never
/// mutates cluster state.
///
/// # Implementations
///
/// - [`HttpClusterClient`]: Production implementation using `reqwest`
/// - Mock clients: Test implementations with canned responses
pub trait ClusterApi: Send + Sync + 'static {
    /// Lists all namespace names.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Unreachable`] when the API endpoint cannot
    /// be reached. Callers treat this as fatal for the current operation.
    fn list_namespaces(&self) -> impl Future<Output = Result<Vec<String>, InventoryError>> + Send;

    /// Lists pods in a single namespace.
    ///
    /// Failures here are scoped to one namespace; callers record them as
    /// partial failures and continue with the remaining namespaces.
    fn list_pods(
        &self,
        namespace: &str,
    ) -> impl Future<Output = Result<Vec<PodDetail>, InventoryError>> + Send;

    /// Counts services in a single namespace.
    fn count_services(
        &self,
        namespace: &str,
    ) -> impl Future<Output = Result<usize, InventoryError>> + Send;

    /// Lists all nodes with capacity and readiness.
    fn list_nodes(&self) -> impl Future<Output = Result<Vec<NodeRecord>, InventoryError>> + Send;

    /// Fetches per-node usage from the `metrics.k8s.io` aggregation API.
    ///
    /// Returns an empty list when the metrics API is not installed (404);
    /// callers then report zero usage rather than failing the sample.
    fn node_usage(&self) -> impl Future<Output = Result<Vec<NodeUsage>, InventoryError>> + Send;
}

/// Production [`ClusterApi`] implementation backed by `reqwest`.
///
/// Authenticates with a bearer token when one is configured. TLS
/// verification can be disabled for development clusters with self-signed
/// certificates.
#[derive(Debug, Clone)]
pub struct HttpClusterClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpClusterClient {
    /// Builds a client from runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Config`] when the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: &InventoryConfig) -> Result<Self, InventoryError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.insecure_skip_tls_verify)
            .build()
            .map_err(|e| InventoryError::Config(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_owned(),
            token: config.token.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, InventoryError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.get(&url);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let response = request.send().await.map_err(|e| {
            counter!(INVENTORY_API_REQUESTS_TOTAL, LABEL_RESULT => "failure").increment(1);
            InventoryError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            counter!(INVENTORY_API_REQUESTS_TOTAL, LABEL_RESULT => "failure").increment(1);
            let reason = response
                .text()
                .await
                .unwrap_or_else(|_| "no response body".to_owned());
            return Err(InventoryError::ApiResponse {
                status: status.as_u16(),
                reason: truncate_reason(&reason),
            });
        }

        let parsed = response.json::<T>().await.map_err(|e| {
            counter!(INVENTORY_API_REQUESTS_TOTAL, LABEL_RESULT => "failure").increment(1);
            InventoryError::Decode(e.to_string())
        })?;
        counter!(INVENTORY_API_REQUESTS_TOTAL, LABEL_RESULT => "success").increment(1);
        Ok(parsed)
    }
}

impl ClusterApi for HttpClusterClient {
    async fn list_namespaces(&self) -> Result<Vec<String>, InventoryError> {
        let list: ObjectList<NamespaceObject> = self.get_json("/api/v1/namespaces").await?;
        Ok(list
            .items
            .into_iter()
            .map(|ns| ns.metadata.name)
            .filter(|name| !name.is_empty())
            .collect())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodDetail>, InventoryError> {
        let path = format!("/api/v1/namespaces/{namespace}/pods");
        let list: ObjectList<PodObject> = self.get_json(&path).await?;
        debug!(namespace, pods = list.items.len(), "listed pods");
        Ok(list
            .items
            .into_iter()
            .map(|pod| pod.into_detail(namespace))
            .collect())
    }

    async fn count_services(&self, namespace: &str) -> Result<usize, InventoryError> {
        let path = format!("/api/v1/namespaces/{namespace}/services");
        let list: ObjectList<NamespaceObject> = self.get_json(&path).await?;
        Ok(list.items.len())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, InventoryError> {
        let list: ObjectList<NodeObject> = self.get_json("/api/v1/nodes").await?;
        Ok(list.items.into_iter().map(NodeObject::into_record).collect())
    }

    async fn node_usage(&self) -> Result<Vec<NodeUsage>, InventoryError> {
        let result: Result<ObjectList<NodeMetricsObject>, _> =
            self.get_json("/apis/metrics.k8s.io/v1beta1/nodes").await;
        match result {
            Ok(list) => Ok(list
                .items
                .into_iter()
                .map(|node| NodeUsage {
                    name: node.metadata.name,
                    cpu_usage: parse_cpu_quantity(&node.usage.cpu),
                    memory_usage: parse_memory_quantity(&node.usage.memory),
                })
                .collect()),
            // metrics-server not installed; usage degrades to zero
            Err(InventoryError::ApiResponse { status: 404, .. }) => {
                warn!("metrics.k8s.io not available, reporting zero usage");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

fn truncate_reason(reason: &str) -> String {
    const MAX: usize = 256;
    if reason.len() > MAX {
        let mut end = MAX;
        while !reason.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &reason[..end])
    } else {
        reason.to_owned()
    }
}

/// Parses a Kubernetes CPU quantity into cores.
///
/// Handles nanocores (`123456789n`), microcores (`250000u`), millicores
/// (`250m`) and plain core counts (`2`, `0.5`). Returns 0.0 for values it
/// cannot parse.
pub fn parse_cpu_quantity(quantity: &str) -> f64 {
    let quantity = quantity.trim();
    if quantity.is_empty() {
        return 0.0;
    }
    let (digits, scale) = if let Some(rest) = quantity.strip_suffix('n') {
        (rest, 1e-9)
    } else if let Some(rest) = quantity.strip_suffix('u') {
        (rest, 1e-6)
    } else if let Some(rest) = quantity.strip_suffix('m') {
        (rest, 1e-3)
    } else {
        (quantity, 1.0)
    };
    digits.parse::<f64>().map(|v| v * scale).unwrap_or(0.0)
}

/// Parses a Kubernetes memory quantity into bytes.
///
/// Handles binary suffixes (`Ki`, `Mi`, `Gi`, `Ti`, `Pi`), decimal suffixes
/// (`k`, `M`, `G`, `T`) and plain byte counts. Returns 0 for values it
/// cannot parse.
pub fn parse_memory_quantity(quantity: &str) -> u64 {
    let quantity = quantity.trim();
    if quantity.is_empty() {
        return 0;
    }
    const BINARY: [(&str, u64); 5] = [
        ("Pi", 1 << 50),
        ("Ti", 1 << 40),
        ("Gi", 1 << 30),
        ("Mi", 1 << 20),
        ("Ki", 1 << 10),
    ];
    for (suffix, factor) in BINARY {
        if let Some(rest) = quantity.strip_suffix(suffix) {
            return rest
                .parse::<f64>()
                .map(|v| (v * factor as f64) as u64)
                .unwrap_or(0);
        }
    }
    const DECIMAL: [(&str, u64); 4] = [
        ("T", 1_000_000_000_000),
        ("G", 1_000_000_000),
        ("M", 1_000_000),
        ("k", 1_000),
    ];
    for (suffix, factor) in DECIMAL {
        if let Some(rest) = quantity.strip_suffix(suffix) {
            return rest
                .parse::<f64>()
                .map(|v| (v * factor as f64) as u64)
                .unwrap_or(0);
        }
    }
    quantity.parse::<u64>().unwrap_or(0)
}

// --- wire types ---
// Minimal projections of the Kubernetes object schema. Unknown fields are
// ignored by serde, so API version drift in unrelated fields is harmless.

#[derive(Debug, Deserialize)]
struct ObjectList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct NamespaceObject {
    #[serde(default)]
    metadata: ObjectMeta,
}

#[derive(Debug, Deserialize)]
struct PodObject {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    spec: PodSpec,
    #[serde(default)]
    status: PodStatus,
}

impl PodObject {
    fn into_detail(self, namespace: &str) -> PodDetail {
        let containers = self
            .spec
            .containers
            .into_iter()
            .map(|c| ContainerRef {
                name: c.name,
                image: c.image,
                privileged: c.security_context.and_then(|sc| sc.privileged),
            })
            .collect();
        PodDetail {
            workload: Workload {
                namespace: namespace.to_owned(),
                name: self.metadata.name,
                containers,
                run_as_non_root: self
                    .spec
                    .security_context
                    .and_then(|sc| sc.run_as_non_root),
            },
            node_name: self.spec.node_name,
            phase: self.status.phase,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodSpec {
    #[serde(default)]
    containers: Vec<WireContainer>,
    #[serde(default)]
    security_context: Option<PodSecurityContext>,
    #[serde(default)]
    node_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireContainer {
    #[serde(default)]
    name: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    security_context: Option<ContainerSecurityContext>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodSecurityContext {
    #[serde(default)]
    run_as_non_root: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerSecurityContext {
    #[serde(default)]
    privileged: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct PodStatus {
    #[serde(default)]
    phase: String,
}

#[derive(Debug, Deserialize)]
struct NodeObject {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    status: NodeStatus,
}

impl NodeObject {
    fn into_record(self) -> NodeRecord {
        let ready = self
            .status
            .conditions
            .iter()
            .any(|c| c.kind == "Ready" && c.status == "True");
        NodeRecord {
            name: self.metadata.name,
            ready,
            cpu_capacity: parse_cpu_quantity(&self.status.capacity.cpu),
            memory_capacity: parse_memory_quantity(&self.status.capacity.memory),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct NodeStatus {
    #[serde(default)]
    capacity: QuantityPair,
    #[serde(default)]
    conditions: Vec<NodeCondition>,
}

#[derive(Debug, Default, Deserialize)]
struct QuantityPair {
    #[serde(default)]
    cpu: String,
    #[serde(default)]
    memory: String,
}

#[derive(Debug, Deserialize)]
struct NodeCondition {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct NodeMetricsObject {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    usage: QuantityPair,
}
