//! 인벤토리 조회 — 네임스페이스 순회와 부분 실패 처리
//!
//! [`InventoryReader`]는 클러스터 전체 워크로드를 네임스페이스 단위로
//! 조회합니다. 네임스페이스 목록 조회 실패는 치명적 에러지만, 개별
//! 네임스페이스의 파드 조회 실패는 부분 실패로 기록하고 나머지를
//! 계속 진행합니다.

use std::collections::HashMap;

use metrics::gauge;
use tracing::{debug, warn};

use kubeguard_core::metrics::INVENTORY_WORKLOADS;
use kubeguard_core::types::{ClusterMetricsSample, NodeInfo, ResourceCounts, Workload};

use crate::client::ClusterApi;
use crate::error::InventoryError;

/// 클러스터 전체 워크로드 조회 결과
#[derive(Debug, Clone, Default)]
pub struct WorkloadInventory {
    /// 조회된 워크로드 (조회에 성공한 네임스페이스만)
    pub workloads: Vec<Workload>,
    /// 네임스페이스 단위 부분 실패 기록
    pub partial_failures: Vec<String>,
}

/// 인벤토리 조회기
#[derive(Debug, Clone)]
pub struct InventoryReader<C> {
    client: C,
}

impl<C: ClusterApi> InventoryReader<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// 내부 클라이언트 참조를 반환합니다.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// 전체 네임스페이스의 워크로드를 조회합니다.
    ///
    /// # Errors
    ///
    /// 네임스페이스 목록 자체를 조회하지 못하면 에러를 반환합니다.
    /// 개별 네임스페이스의 파드 조회 실패는 `partial_failures`에 기록됩니다.
    pub async fn read_workloads(&self) -> Result<WorkloadInventory, InventoryError> {
        let namespaces = self.client.list_namespaces().await?;
        let mut inventory = WorkloadInventory::default();

        for namespace in &namespaces {
            match self.client.list_pods(namespace).await {
                Ok(pods) => {
                    inventory
                        .workloads
                        .extend(pods.into_iter().map(|p| p.workload));
                }
                Err(e) => {
                    warn!(namespace, error = %e, "failed to list pods, skipping namespace");
                    inventory
                        .partial_failures
                        .push(format!("namespace {namespace}: {e}"));
                }
            }
        }

        gauge!(INVENTORY_WORKLOADS).set(inventory.workloads.len() as f64);
        debug!(
            workloads = inventory.workloads.len(),
            failures = inventory.partial_failures.len(),
            "inventory read complete",
        );
        Ok(inventory)
    }

    /// 현재 리소스 개수(파드/서비스/노드)를 조회합니다.
    ///
    /// 개별 네임스페이스 조회 실패는 해당 네임스페이스를 0으로 집계하고
    /// 부분 실패 목록에 기록합니다.
    pub async fn resource_counts(
        &self,
    ) -> Result<(ResourceCounts, Vec<String>), InventoryError> {
        let namespaces = self.client.list_namespaces().await?;
        let nodes = self.client.list_nodes().await?;

        let mut counts = ResourceCounts {
            nodes: nodes.len(),
            ..ResourceCounts::default()
        };
        let mut failures = Vec::new();

        for namespace in &namespaces {
            match self.client.list_pods(namespace).await {
                Ok(pods) => counts.pods += pods.len(),
                Err(e) => failures.push(format!("pods in {namespace}: {e}")),
            }
            match self.client.count_services(namespace).await {
                Ok(count) => counts.services += count,
                Err(e) => failures.push(format!("services in {namespace}: {e}")),
            }
        }

        Ok((counts, failures))
    }

    /// 클러스터 메트릭 스냅샷을 수집합니다.
    ///
    /// 노드 목록 조회 실패는 치명적이지만, `metrics.k8s.io` 사용량 조회
    /// 실패는 사용량 0으로 강등합니다.
    pub async fn cluster_sample(&self) -> Result<ClusterMetricsSample, InventoryError> {
        let namespaces = self.client.list_namespaces().await?;
        let nodes = self.client.list_nodes().await?;

        let usage_by_node: HashMap<String, (f64, u64)> = match self.client.node_usage().await {
            Ok(usage) => usage
                .into_iter()
                .map(|u| (u.name, (u.cpu_usage, u.memory_usage)))
                .collect(),
            Err(e) => {
                warn!(error = %e, "node usage unavailable, reporting zero usage");
                HashMap::new()
            }
        };

        let mut total_pods = 0usize;
        let mut total_services = 0usize;
        let mut pods_by_node: HashMap<String, usize> = HashMap::new();
        for namespace in &namespaces {
            if let Ok(pods) = self.client.list_pods(namespace).await {
                total_pods += pods.len();
                for pod in pods.iter().filter(|p| p.is_running()) {
                    if let Some(node) = &pod.node_name {
                        *pods_by_node.entry(node.clone()).or_default() += 1;
                    }
                }
            }
            if let Ok(count) = self.client.count_services(namespace).await {
                total_services += count;
            }
        }

        let mut sample = ClusterMetricsSample {
            timestamp: std::time::SystemTime::now(),
            total_nodes: nodes.len(),
            total_pods,
            total_services,
            total_namespaces: namespaces.len(),
            cpu_usage: 0.0,
            cpu_capacity: 0.0,
            memory_usage: 0,
            memory_capacity: 0,
            nodes: Vec::with_capacity(nodes.len()),
        };

        for node in nodes {
            let (cpu_usage, memory_usage) =
                usage_by_node.get(&node.name).copied().unwrap_or((0.0, 0));
            let pods_running = pods_by_node.get(&node.name).copied().unwrap_or(0);
            sample.cpu_usage += cpu_usage;
            sample.cpu_capacity += node.cpu_capacity;
            sample.memory_usage += memory_usage;
            sample.memory_capacity += node.memory_capacity;
            sample.nodes.push(NodeInfo {
                name: node.name,
                status: if node.ready { "Ready" } else { "NotReady" }.to_owned(),
                cpu_usage,
                cpu_capacity: node.cpu_capacity,
                memory_usage,
                memory_capacity: node.memory_capacity,
                pods_running,
            });
        }

        Ok(sample)
    }
}
