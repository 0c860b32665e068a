//! 메트릭 샘플러 — 주기적 클러스터/호스트 메트릭 수집
//!
//! [`MetricsSampler`]는 백그라운드 태스크로 실행되며 설정된 주기마다
//! 클러스터 메트릭과 호스트 리소스 메트릭을 수집해 롤링 윈도에
//! 보관합니다. 스캔 실행과는 완전히 독립적입니다.
//!
//! - 수집 실패는 해당 틱만 건너뛰고 다음 틱을 계속 진행합니다.
//! - 윈도 용량 초과 시 가장 오래된 샘플부터 제거합니다.
//! - 종료는 [`tokio_util::sync::CancellationToken`]으로 전달합니다.

use std::collections::VecDeque;
use std::sync::Arc;

use metrics::{counter, gauge};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kubeguard_core::metrics::{
    LABEL_RESULT, SAMPLER_CLUSTER_CPU_USAGE, SAMPLER_CLUSTER_MEMORY_USAGE, SAMPLER_TICKS_TOTAL,
};
use kubeguard_core::types::{ClusterMetricsSample, ResourceMetricsSample};

use crate::client::ClusterApi;
use crate::config::SamplerSettings;
use crate::host::HostStats;
use crate::reader::InventoryReader;

struct SamplerState {
    cluster: VecDeque<ClusterMetricsSample>,
    host: VecDeque<ResourceMetricsSample>,
    capacity: usize,
}

impl SamplerState {
    fn push_cluster(&mut self, sample: ClusterMetricsSample) {
        if self.cluster.len() == self.capacity {
            self.cluster.pop_front();
        }
        self.cluster.push_back(sample);
    }

    fn push_host(&mut self, sample: ResourceMetricsSample) {
        if self.host.len() == self.capacity {
            self.host.pop_front();
        }
        self.host.push_back(sample);
    }
}

/// 샘플러 조회 핸들
///
/// 여러 소비자(HTTP 핸들러 등)가 복제해서 사용할 수 있습니다.
#[derive(Clone)]
pub struct SamplerHandle {
    state: Arc<RwLock<SamplerState>>,
}

impl SamplerHandle {
    /// 빈 핸들을 생성합니다.
    ///
    /// 샘플러 태스크 없이도 쓸 수 있습니다 (샘플러 비활성 구성).
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(SamplerState {
                cluster: VecDeque::with_capacity(capacity),
                host: VecDeque::with_capacity(capacity),
                capacity,
            })),
        }
    }

    /// 가장 최근 클러스터 샘플을 반환합니다 (아직 없으면 None).
    pub async fn latest_cluster(&self) -> Option<ClusterMetricsSample> {
        self.state.read().await.cluster.back().cloned()
    }

    /// 가장 최근 호스트 샘플을 반환합니다 (아직 없으면 None).
    pub async fn latest_host(&self) -> Option<ResourceMetricsSample> {
        self.state.read().await.host.back().cloned()
    }

    /// 클러스터 샘플 윈도 전체를 오래된 순으로 반환합니다.
    pub async fn cluster_window(&self) -> Vec<ClusterMetricsSample> {
        self.state.read().await.cluster.iter().cloned().collect()
    }

    /// 호스트 샘플 윈도 전체를 오래된 순으로 반환합니다.
    pub async fn host_window(&self) -> Vec<ResourceMetricsSample> {
        self.state.read().await.host.iter().cloned().collect()
    }

    async fn push_cluster(&self, sample: ClusterMetricsSample) {
        self.state.write().await.push_cluster(sample);
    }

    async fn push_host(&self, sample: ResourceMetricsSample) {
        self.state.write().await.push_host(sample);
    }
}

/// 메트릭 샘플러
///
/// [`MetricsSampler::spawn`]으로 백그라운드 태스크를 시작하고,
/// [`MetricsSampler::shutdown`]으로 정지시킵니다.
pub struct MetricsSampler {
    handle: SamplerHandle,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MetricsSampler {
    /// 샘플링 태스크를 시작합니다.
    pub fn spawn<C: ClusterApi>(reader: InventoryReader<C>, settings: SamplerSettings) -> Self {
        let handle = SamplerHandle::new(settings.window_capacity);
        let cancel = CancellationToken::new();

        let task_handle = handle.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let mut host_stats = HostStats::new();
            let mut ticker = tokio::time::interval(settings.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(interval = ?settings.interval, "metrics sampler started");

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        info!("metrics sampler stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        tick(&reader, &mut host_stats, &task_handle).await;
                    }
                }
            }
        });

        Self {
            handle,
            cancel,
            task,
        }
    }

    /// 조회 핸들을 반환합니다.
    pub fn handle(&self) -> SamplerHandle {
        self.handle.clone()
    }

    /// 샘플러를 정지하고 태스크 종료를 기다립니다.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

async fn tick<C: ClusterApi>(
    reader: &InventoryReader<C>,
    host_stats: &mut HostStats,
    handle: &SamplerHandle,
) {
    // 호스트 샘플은 로컬 수집이라 실패하지 않음
    let host_sample = host_stats.sample();
    handle.push_host(host_sample).await;

    match reader.cluster_sample().await {
        Ok(sample) => {
            gauge!(SAMPLER_CLUSTER_CPU_USAGE).set(sample.cpu_usage);
            gauge!(SAMPLER_CLUSTER_MEMORY_USAGE).set(sample.memory_usage as f64);
            counter!(SAMPLER_TICKS_TOTAL, LABEL_RESULT => "success").increment(1);
            debug!(
                nodes = sample.total_nodes,
                pods = sample.total_pods,
                "cluster sample collected",
            );
            handle.push_cluster(sample).await;
        }
        Err(e) => {
            counter!(SAMPLER_TICKS_TOTAL, LABEL_RESULT => "failure").increment(1);
            warn!(error = %e, "cluster sample failed, keeping previous window");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn cluster_sample(total_pods: usize) -> ClusterMetricsSample {
        ClusterMetricsSample {
            timestamp: SystemTime::now(),
            total_nodes: 1,
            total_pods,
            total_services: 0,
            total_namespaces: 1,
            cpu_usage: 0.5,
            cpu_capacity: 4.0,
            memory_usage: 1 << 30,
            memory_capacity: 8 << 30,
            nodes: Vec::new(),
        }
    }

    #[tokio::test]
    async fn window_evicts_oldest_at_capacity() {
        let handle = SamplerHandle::new(3);
        for i in 0..5 {
            handle.push_cluster(cluster_sample(i)).await;
        }
        let window = handle.cluster_window().await;
        assert_eq!(window.len(), 3);
        // 가장 오래된 두 개(0, 1)가 제거됨
        assert_eq!(window[0].total_pods, 2);
        assert_eq!(window[2].total_pods, 4);
    }

    #[tokio::test]
    async fn latest_returns_most_recent() {
        let handle = SamplerHandle::new(10);
        assert!(handle.latest_cluster().await.is_none());
        handle.push_cluster(cluster_sample(1)).await;
        handle.push_cluster(cluster_sample(2)).await;
        assert_eq!(handle.latest_cluster().await.unwrap().total_pods, 2);
    }

    #[tokio::test]
    async fn host_window_is_independent() {
        let handle = SamplerHandle::new(2);
        handle
            .push_host(ResourceMetricsSample {
                timestamp: SystemTime::now(),
                cpu_cores: 4,
                cpu_usage: 0.2,
                memory_usage: 1.5,
                memory_total: 16.0,
                disk_usage: 10.0,
                disk_total: 100.0,
            })
            .await;
        assert!(handle.latest_cluster().await.is_none());
        assert!(handle.latest_host().await.is_some());
    }
}
