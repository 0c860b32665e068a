//! 스캔 실행 타입 — 스캔 생명주기와 결과 스냅샷
//!
//! [`ScanRun`]은 한 번의 인벤토리 → 상관분석 → 집계 파이프라인 실행의
//! 상태와 결과를 담는 스냅샷입니다. 상태 기계(scan-engine)가 단일 작성자로
//! 갱신하고, 조회 측은 복제본을 받습니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::types::{PodVulnerabilityRecord, Severity, VulnerabilityFinding};

/// 스캔 실행 상태
///
/// 프로세스 전역에서 동시에 `Running`일 수 있는 실행은 최대 하나입니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// 아직 스캔이 실행된 적 없음
    #[default]
    Pending,
    /// 실행 중
    Running,
    /// 정상 완료
    Completed,
    /// 실패 (이전 완료 결과는 보존됨)
    Failed,
}

impl ScanStatus {
    /// 종료 상태(Completed/Failed) 여부를 반환합니다.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// 스캔 결과 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// 스캔한 전체 파드 수
    pub total_pods: usize,
    /// 발견 항목이 있는 파드 수
    pub vulnerable_pods: usize,
    /// 유일한 CVE 수
    pub total_cves: usize,
}

/// 심각도별 CVE 개수 히스토그램
///
/// 불변식: 각 카운트의 합은 `ScanRun::cves`의 길이와 같습니다
/// (같은 CVE가 여러 파드에 영향을 줘도 한 번만 집계).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct SeverityHistogram {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unknown: usize,
}

impl SeverityHistogram {
    /// 심각도 하나를 집계합니다.
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Unknown => self.unknown += 1,
        }
    }

    /// 특정 심각도의 카운트를 반환합니다.
    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Unknown => self.unknown,
        }
    }

    /// 전체 카운트 합을 반환합니다.
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.unknown
    }
}

/// 스캔 실행 스냅샷
///
/// 실행 중에는 진행률/메시지만 갱신되고, 완료 시점에 결과 필드가
/// 원자적으로 채워집니다. 실패한 실행은 결과 필드가 비어 있으며
/// 이전 완료 결과를 덮어쓰지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRun {
    /// 실행 고유 ID
    pub id: String,
    /// 현재 상태
    pub status: ScanStatus,
    /// 시작 시각
    pub started_at: SystemTime,
    /// 완료 시각 (종료 상태에서만 Some)
    pub completed_at: Option<SystemTime>,
    /// 진행률 (0-100, 실행 내에서 단조 비감소)
    pub progress_percent: u8,
    /// 상태 메시지 (실패 사유 포함)
    pub message: String,
    /// 결과 요약
    pub summary: ScanSummary,
    /// 심각도별 CVE 히스토그램
    pub severity_histogram: SeverityHistogram,
    /// 유일 CVE 목록 (심각도 내림차순, 동률은 cve_id 오름차순)
    pub cves: Vec<VulnerabilityFinding>,
    /// 파드별 취약점 레코드
    pub pods: Vec<PodVulnerabilityRecord>,
    /// 실행을 중단시키지 않은 부분 실패 기록
    /// (네임스페이스 조회 실패, 이미지별 피드 타임아웃 등)
    pub partial_failures: Vec<String>,
}

impl ScanRun {
    /// 스캔 전 초기 스냅샷을 생성합니다.
    pub fn pending() -> Self {
        Self {
            id: String::new(),
            status: ScanStatus::Pending,
            started_at: SystemTime::UNIX_EPOCH,
            completed_at: None,
            progress_percent: 0,
            message: "no scan has been run yet".to_owned(),
            summary: ScanSummary::default(),
            severity_histogram: SeverityHistogram::default(),
            cves: Vec::new(),
            pods: Vec::new(),
            partial_failures: Vec::new(),
        }
    }

    /// 새 실행을 `Running` 상태로 생성합니다.
    pub fn started(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ScanStatus::Running,
            started_at: SystemTime::now(),
            completed_at: None,
            progress_percent: 0,
            message: "scan in progress".to_owned(),
            summary: ScanSummary::default(),
            severity_histogram: SeverityHistogram::default(),
            cves: Vec::new(),
            pods: Vec::new(),
            partial_failures: Vec::new(),
        }
    }
}

impl fmt::Display for ScanRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ScanRun({}, {}, {}%)",
            self.id, self.status, self.progress_percent,
        )
    }
}
