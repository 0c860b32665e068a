//! 스캔 워커 -- 파이프라인 전체 구동
//!
//! [`ScanEngine`]은 인벤토리 → 이미지 해석 → 상관분석 → 집계 →
//! 결과 저장의 전체 파이프라인을 하나의 백그라운드 태스크로 실행합니다.
//! `start_scan()`은 실행 수락 즉시 스캔 ID를 반환하고, 진행 상황은
//! 상태 스냅샷 폴링으로 확인합니다.
//!
//! 벽시계 상한(`scan_timeout`)을 초과한 실행은 강제로 실패 처리되며,
//! 이후 새 스캔 시작이 다시 허용됩니다.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use tracing::info;

use kubeguard_core::error::{ConfigError, KubeguardError, ScanError};
use kubeguard_core::metrics::{
    LABEL_RESULT, LABEL_SEVERITY, SCAN_CVES_FOUND, SCAN_DURATION_SECONDS, SCAN_PARTIAL_FAILURES,
    SCAN_RUNS_TOTAL, SCAN_VULNERABLE_PODS,
};
use kubeguard_core::types::{PodVulnerabilityRecord, Severity, VulnerabilityFinding};
use kubeguard_inventory::{ClusterApi, InventoryReader};

use crate::checks;
use crate::config::EngineSettings;
use crate::correlate::Correlator;
use crate::error::ScanEngineError;
use crate::feed::VulnFeed;
use crate::image::CanonicalImageKey;
use crate::report::{self, ScanReport};
use crate::state::ScanStateHandle;

/// 스캔 엔진
///
/// [`ScanEngineBuilder`]로 생성합니다.
pub struct ScanEngine<C, F> {
    reader: Arc<InventoryReader<C>>,
    correlator: Arc<Correlator<F>>,
    state: ScanStateHandle,
    scan_timeout: Duration,
}

impl<C: ClusterApi, F: VulnFeed> ScanEngine<C, F> {
    /// 빌더를 생성합니다.
    pub fn builder() -> ScanEngineBuilder<C, F> {
        ScanEngineBuilder::new()
    }

    /// 상태 핸들을 반환합니다 (조회 측 공유용).
    pub fn state(&self) -> ScanStateHandle {
        self.state.clone()
    }

    /// 인벤토리 조회기 참조를 반환합니다.
    pub fn reader(&self) -> &InventoryReader<C> {
        &self.reader
    }

    /// 새 스캔 실행을 시작합니다.
    ///
    /// 수락되면 워커 태스크를 생성하고 스캔 ID를 즉시 반환합니다.
    ///
    /// # Errors
    ///
    /// 이미 실행 중인 스캔이 있으면 [`ScanError::AlreadyRunning`].
    pub async fn start_scan(&self) -> Result<String, ScanError> {
        let id = self.state.try_start().await?;

        let reader = Arc::clone(&self.reader);
        let correlator = Arc::clone(&self.correlator);
        let state = self.state.clone();
        let scan_timeout = self.scan_timeout;
        tokio::spawn(async move {
            let started = Instant::now();
            let result =
                tokio::time::timeout(scan_timeout, run_pipeline(&reader, &correlator, &state))
                    .await;
            histogram!(SCAN_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

            match result {
                Ok(Ok((report, partial_failures))) => {
                    counter!(SCAN_RUNS_TOTAL, LABEL_RESULT => "success").increment(1);
                    gauge!(SCAN_VULNERABLE_PODS).set(report.summary.vulnerable_pods as f64);
                    gauge!(SCAN_PARTIAL_FAILURES).set(partial_failures.len() as f64);
                    for severity in Severity::ranked() {
                        gauge!(SCAN_CVES_FOUND, LABEL_SEVERITY => severity.to_string())
                            .set(report.severity_histogram.count(severity) as f64);
                    }
                    state.complete(report, partial_failures).await;
                }
                Ok(Err(e)) => {
                    counter!(SCAN_RUNS_TOTAL, LABEL_RESULT => "failure").increment(1);
                    state.fail(e.to_string()).await;
                }
                Err(_) => {
                    counter!(SCAN_RUNS_TOTAL, LABEL_RESULT => "failure").increment(1);
                    let reason = ScanError::Timeout {
                        ceiling_secs: scan_timeout.as_secs(),
                    };
                    state.fail(reason.to_string()).await;
                }
            }
        });

        Ok(id)
    }
}

async fn run_pipeline<C: ClusterApi, F: VulnFeed>(
    reader: &InventoryReader<C>,
    correlator: &Correlator<F>,
    state: &ScanStateHandle,
) -> Result<(ScanReport, Vec<String>), ScanEngineError> {
    state.set_progress(5, "reading cluster inventory").await;
    let inventory = reader.read_workloads().await?;
    let mut partial_failures = inventory.partial_failures;
    let workloads = inventory.workloads;
    info!(workloads = workloads.len(), "inventory snapshot taken");

    state.set_progress(15, "resolving image references").await;
    let keys: Vec<CanonicalImageKey> = workloads
        .iter()
        .flat_map(|w| w.containers.iter())
        .map(|c| CanonicalImageKey::parse(&c.image))
        .collect();

    state.set_progress(25, "correlating vulnerabilities").await;
    let outcome = correlator.lookup_all(&keys).await;
    partial_failures.extend(outcome.partial_failures);

    let total = workloads.len().max(1);
    let mut records = Vec::with_capacity(workloads.len());
    for (index, workload) in workloads.iter().enumerate() {
        let mut findings: Vec<VulnerabilityFinding> = Vec::new();
        let mut seen = HashSet::new();
        for container in &workload.containers {
            let key = CanonicalImageKey::parse(&container.image);
            if key.is_empty() {
                continue;
            }
            if let Some(key_findings) = outcome.by_key.get(&key.to_string()) {
                for finding in &key_findings.findings {
                    if seen.insert(finding.cve_id.clone()) {
                        findings.push(finding.clone());
                    }
                }
            }
        }
        records.push(PodVulnerabilityRecord {
            namespace: workload.namespace.clone(),
            pod_name: workload.name.clone(),
            findings,
            issues: checks::security_issues(workload),
        });

        let progress = 25 + ((index + 1) * 70 / total) as u8;
        state
            .set_progress(progress, format!("processed {}/{} pods", index + 1, total))
            .await;
    }

    state.set_progress(95, "building report").await;
    Ok((report::build(records), partial_failures))
}

/// 스캔 엔진 빌더
pub struct ScanEngineBuilder<C, F> {
    client: Option<C>,
    feed: Option<F>,
    settings: EngineSettings,
}

impl<C: ClusterApi, F: VulnFeed> ScanEngineBuilder<C, F> {
    pub fn new() -> Self {
        Self {
            client: None,
            feed: None,
            settings: EngineSettings::default(),
        }
    }

    /// 클러스터 클라이언트를 지정합니다 (필수).
    pub fn cluster_client(mut self, client: C) -> Self {
        self.client = Some(client);
        self
    }

    /// 취약점 피드를 지정합니다 (필수).
    pub fn vuln_feed(mut self, feed: F) -> Self {
        self.feed = Some(feed);
        self
    }

    /// 런타임 설정을 지정합니다.
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 엔진을 조립합니다.
    ///
    /// # Errors
    ///
    /// 필수 구성 요소가 빠졌으면 설정 에러를 반환합니다.
    pub fn build(self) -> Result<ScanEngine<C, F>, KubeguardError> {
        let client = self.client.ok_or_else(|| {
            KubeguardError::Config(ConfigError::InvalidValue {
                field: "engine.cluster_client".to_owned(),
                reason: "cluster client is required".to_owned(),
            })
        })?;
        let feed = self.feed.ok_or_else(|| {
            KubeguardError::Config(ConfigError::InvalidValue {
                field: "engine.vuln_feed".to_owned(),
                reason: "vulnerability feed is required".to_owned(),
            })
        })?;

        Ok(ScanEngine {
            reader: Arc::new(InventoryReader::new(client)),
            correlator: Arc::new(Correlator::new(
                Arc::new(feed),
                self.settings.lookup_timeout,
                self.settings.lookup_concurrency,
            )),
            state: ScanStateHandle::new(self.settings.history_limit),
            scan_timeout: self.settings.scan_timeout,
        })
    }
}

impl<C: ClusterApi, F: VulnFeed> Default for ScanEngineBuilder<C, F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FileVulnFeed;
    use kubeguard_inventory::{HttpClusterClient, InventoryConfig};

    #[test]
    fn builder_requires_cluster_client() {
        let result = ScanEngine::<HttpClusterClient, FileVulnFeed>::builder()
            .vuln_feed(FileVulnFeed::empty())
            .build();
        assert!(matches!(result, Err(KubeguardError::Config(_))));
    }

    #[test]
    fn builder_requires_feed() {
        let client = HttpClusterClient::new(&InventoryConfig::default()).unwrap();
        let result = ScanEngine::<HttpClusterClient, FileVulnFeed>::builder()
            .cluster_client(client)
            .build();
        assert!(matches!(result, Err(KubeguardError::Config(_))));
    }

    #[test]
    fn builder_assembles_engine() {
        let client = HttpClusterClient::new(&InventoryConfig::default()).unwrap();
        let engine = ScanEngine::builder()
            .cluster_client(client)
            .vuln_feed(FileVulnFeed::empty())
            .settings(EngineSettings::default())
            .build();
        assert!(engine.is_ok());
    }
}
