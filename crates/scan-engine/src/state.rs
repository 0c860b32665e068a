//! 스캔 상태 기계 -- 단일 실행 보장과 결과 보관
//!
//! 프로세스 전역에서 동시에 실행 중인 스캔은 최대 하나입니다.
//! [`ScanStateHandle`]은 복제 가능한 핸들이며, 쓰기는 스캔 워커만
//! 수행하고 조회 측은 복제된 스냅샷을 받습니다.
//!
//! 상태 전이: IDLE → RUNNING → {COMPLETED, FAILED} → IDLE.
//! 실패한 실행은 이전 완료 결과를 덮어쓰지 않습니다.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::SystemTime;

use metrics::counter;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use kubeguard_core::error::ScanError;
use kubeguard_core::metrics::SCAN_REJECTED_TOTAL;
use kubeguard_core::scan::{ScanRun, ScanStatus};

use crate::report::ScanReport;

struct ScanState {
    /// 진행 중인 실행 (없으면 IDLE)
    current: Option<ScanRun>,
    /// 마지막으로 조회 가능한 실행 (초기에는 Pending 스냅샷)
    latest: ScanRun,
    /// 종료된 실행 이력 (최신이 뒤)
    history: VecDeque<ScanRun>,
    history_limit: usize,
}

impl ScanState {
    fn push_history(&mut self, run: ScanRun) {
        if self.history.len() == self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(run);
    }
}

/// 스캔 상태 핸들
#[derive(Clone)]
pub struct ScanStateHandle {
    state: Arc<RwLock<ScanState>>,
}

impl ScanStateHandle {
    /// 이력 한도를 지정해 핸들을 생성합니다.
    pub fn new(history_limit: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(ScanState {
                current: None,
                latest: ScanRun::pending(),
                history: VecDeque::new(),
                history_limit: history_limit.max(1),
            })),
        }
    }

    /// 새 스캔 실행을 시작합니다.
    ///
    /// # Errors
    ///
    /// 이미 실행 중인 스캔이 있으면 [`ScanError::AlreadyRunning`]을
    /// 반환합니다. 대기열은 없으며 호출자는 폴링 후 재시도합니다.
    pub async fn try_start(&self) -> Result<String, ScanError> {
        let mut state = self.state.write().await;
        if state.current.is_some() {
            counter!(SCAN_REJECTED_TOTAL).increment(1);
            return Err(ScanError::AlreadyRunning);
        }
        let id = Uuid::new_v4().to_string();
        state.current = Some(ScanRun::started(&id));
        info!(scan_id = %id, "scan run started");
        Ok(id)
    }

    /// 진행률과 메시지를 갱신합니다.
    ///
    /// 진행률은 실행 내에서 단조 비감소입니다. 100을 넘는 값은 100으로,
    /// 이전 값보다 작은 값은 이전 값으로 고정됩니다.
    pub async fn set_progress(&self, percent: u8, message: impl Into<String>) {
        let mut state = self.state.write().await;
        if let Some(run) = state.current.as_mut() {
            run.progress_percent = run.progress_percent.max(percent.min(100));
            run.message = message.into();
        }
    }

    /// 실행을 완료 상태로 전이하고 결과를 저장합니다.
    pub async fn complete(&self, report: ScanReport, partial_failures: Vec<String>) {
        let mut state = self.state.write().await;
        let Some(mut run) = state.current.take() else {
            warn!("complete called with no running scan");
            return;
        };
        run.status = ScanStatus::Completed;
        run.completed_at = Some(SystemTime::now());
        run.progress_percent = 100;
        run.message = "scan completed".to_owned();
        run.summary = report.summary;
        run.severity_histogram = report.severity_histogram;
        run.cves = report.cves;
        run.pods = report.pods;
        run.partial_failures = partial_failures;
        info!(
            scan_id = %run.id,
            total_pods = run.summary.total_pods,
            vulnerable_pods = run.summary.vulnerable_pods,
            total_cves = run.summary.total_cves,
            "scan run completed",
        );
        state.latest = run.clone();
        state.push_history(run);
    }

    /// 실행을 실패 상태로 전이합니다.
    ///
    /// 이전에 완료된 `latest` 결과는 보존됩니다. 실패한 실행은 이력에만
    /// 남으며, `latest`가 아직 완료 결과를 가진 적이 없을 때만 실패
    /// 스냅샷이 `latest`로 노출됩니다.
    pub async fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let mut state = self.state.write().await;
        let Some(mut run) = state.current.take() else {
            warn!("fail called with no running scan");
            return;
        };
        run.status = ScanStatus::Failed;
        run.completed_at = Some(SystemTime::now());
        run.message = reason.clone();
        warn!(scan_id = %run.id, reason = %reason, "scan run failed");
        if state.latest.status != ScanStatus::Completed {
            state.latest = run.clone();
        }
        state.push_history(run);
    }

    /// 현재 상태 스냅샷을 반환합니다.
    ///
    /// 실행 중이면 진행 중인 실행을, 아니면 마지막 결과를 복제합니다.
    pub async fn snapshot(&self) -> ScanRun {
        let state = self.state.read().await;
        match &state.current {
            Some(run) => run.clone(),
            None => state.latest.clone(),
        }
    }

    /// 종료된 실행 이력을 오래된 순으로 반환합니다.
    pub async fn history(&self) -> Vec<ScanRun> {
        self.state.read().await.history.iter().cloned().collect()
    }

    /// 실행 중 여부를 반환합니다.
    pub async fn is_running(&self) -> bool {
        self.state.read().await.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubeguard_core::scan::{ScanSummary, SeverityHistogram};

    fn empty_report() -> ScanReport {
        ScanReport {
            summary: ScanSummary::default(),
            severity_histogram: SeverityHistogram::default(),
            cves: Vec::new(),
            pods: Vec::new(),
        }
    }

    #[tokio::test]
    async fn initial_snapshot_is_pending() {
        let handle = ScanStateHandle::new(10);
        let snapshot = handle.snapshot().await;
        assert_eq!(snapshot.status, ScanStatus::Pending);
    }

    #[tokio::test]
    async fn second_start_is_rejected_until_terminal() {
        let handle = ScanStateHandle::new(10);
        let id = handle.try_start().await.unwrap();
        assert!(matches!(
            handle.try_start().await,
            Err(ScanError::AlreadyRunning),
        ));

        handle.complete(empty_report(), Vec::new()).await;
        let next = handle.try_start().await.unwrap();
        assert_ne!(id, next);
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_clamped() {
        let handle = ScanStateHandle::new(10);
        handle.try_start().await.unwrap();
        handle.set_progress(40, "correlating").await;
        handle.set_progress(20, "stale update").await;
        assert_eq!(handle.snapshot().await.progress_percent, 40);
        handle.set_progress(150, "overshoot").await;
        assert_eq!(handle.snapshot().await.progress_percent, 100);
    }

    #[tokio::test]
    async fn complete_stores_latest_and_history() {
        let handle = ScanStateHandle::new(10);
        let id = handle.try_start().await.unwrap();
        handle.complete(empty_report(), vec!["note".to_owned()]).await;

        let snapshot = handle.snapshot().await;
        assert_eq!(snapshot.status, ScanStatus::Completed);
        assert_eq!(snapshot.id, id);
        assert_eq!(snapshot.progress_percent, 100);
        assert_eq!(snapshot.partial_failures, vec!["note".to_owned()]);
        assert_eq!(handle.history().await.len(), 1);
    }

    #[tokio::test]
    async fn fail_preserves_previous_completed_latest() {
        let handle = ScanStateHandle::new(10);
        let first = handle.try_start().await.unwrap();
        handle.complete(empty_report(), Vec::new()).await;

        handle.try_start().await.unwrap();
        handle.fail("cluster unreachable: connection refused").await;

        // latest는 여전히 완료된 첫 실행
        let snapshot = handle.snapshot().await;
        assert_eq!(snapshot.status, ScanStatus::Completed);
        assert_eq!(snapshot.id, first);

        // 실패 실행은 이력에는 남음
        let history = handle.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].status, ScanStatus::Failed);
        assert!(history[1].message.contains("unreachable"));
    }

    #[tokio::test]
    async fn first_run_failure_is_visible_as_latest() {
        let handle = ScanStateHandle::new(10);
        handle.try_start().await.unwrap();
        handle.fail("boom").await;
        let snapshot = handle.snapshot().await;
        assert_eq!(snapshot.status, ScanStatus::Failed);
        assert_eq!(snapshot.message, "boom");
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let handle = ScanStateHandle::new(2);
        for _ in 0..4 {
            handle.try_start().await.unwrap();
            handle.complete(empty_report(), Vec::new()).await;
        }
        assert_eq!(handle.history().await.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_start_storm_accepts_exactly_one() {
        let handle = ScanStateHandle::new(10);
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let handle = handle.clone();
            tasks.spawn(async move { handle.try_start().await });
        }
        let mut accepted = 0;
        let mut rejected = 0;
        while let Some(result) = tasks.join_next().await {
            match result.unwrap() {
                Ok(_) => accepted += 1,
                Err(ScanError::AlreadyRunning) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(rejected, 15);
    }
}
