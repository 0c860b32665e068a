//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 클러스터 인벤토리, 취약점, 메트릭 샘플 등 모든 모듈이 공유하는
//! 데이터 구조를 정의합니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// 심각도 레벨
///
/// 취약점의 심각도를 나타냅니다.
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Unknown < Low < Medium < High < Critical`).
/// 인식할 수 없는 심각도 문자열은 버리지 않고 `Unknown`으로 분류합니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// 심각도 미상 — 피드가 값을 주지 않았거나 조회가 불완전한 경우
    #[default]
    Unknown,
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적 — 즉시 대응 필요
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다 (대소문자 구분 없음).
    ///
    /// 인식할 수 없는 값은 `None`을 반환하며, 호출자가 `Unknown`으로
    /// 강등할지 결정합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unknown" => Some(Self::Unknown),
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }

    /// 모든 심각도를 높은 순서대로 반환합니다.
    pub fn ranked() -> [Severity; 5] {
        [
            Self::Critical,
            Self::High,
            Self::Medium,
            Self::Low,
            Self::Unknown,
        ]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "UNKNOWN"),
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// 컨테이너 참조
///
/// 워크로드에 속한 단일 컨테이너의 이름과 원본 이미지 참조 문자열을 담습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRef {
    /// 컨테이너 이름
    pub name: String,
    /// 원본 이미지 참조 문자열 (예: `nginx:1.25`, `ghcr.io/acme/api@sha256:...`)
    pub image: String,
    /// privileged 모드 여부 (securityContext에서 읽음, 없으면 None)
    pub privileged: Option<bool>,
}

/// 워크로드 (파드)
///
/// 스캔 시점의 읽기 전용 스냅샷입니다. 식별자는 (namespace, name)이며
/// 매 스캔마다 클러스터에서 새로 조회합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workload {
    /// 네임스페이스
    pub namespace: String,
    /// 파드 이름
    pub name: String,
    /// 소속 컨테이너 목록 (순서 보존)
    pub containers: Vec<ContainerRef>,
    /// 파드 수준 runAsNonRoot 설정 (없으면 None)
    pub run_as_non_root: Option<bool>,
}

impl Workload {
    /// `namespace/name` 형식의 식별 키를 반환합니다.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({} containers)",
            self.namespace,
            self.name,
            self.containers.len(),
        )
    }
}

/// 취약점 발견 항목
///
/// 하나의 이미지에 대해 피드에서 매칭된 단일 CVE 레코드입니다.
/// 스캔 실행 내에서 생성된 후에는 불변입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityFinding {
    /// CVE ID (예: CVE-2024-0001)
    #[serde(rename = "id")]
    pub cve_id: String,
    /// 심각도
    pub severity: Severity,
    /// 취약점 설명
    pub description: String,
    /// 영향받는 컴포넌트 목록
    pub affected_components: Vec<String>,
    /// 수정된 버전 (있을 경우)
    pub fix_version: Option<String>,
    /// 공개 일자 (RFC 3339 문자열)
    pub published_date: Option<String>,
    /// 참조 링크
    pub link: Option<String>,
    /// 공격 벡터 (Network, Local 등)
    pub attack_vector: Option<String>,
    /// 완화 방안
    pub mitigation: Option<String>,
}

impl fmt::Display for VulnerabilityFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] (fixed: {})",
            self.cve_id,
            self.severity,
            self.fix_version.as_deref().unwrap_or("N/A"),
        )
    }
}

/// CVE가 아닌 일반 보안 이슈
///
/// 보안 컨텍스트 점검 등에서 나오는 설정 오류성 항목을 나타냅니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodIssue {
    /// 관련 리소스 (예: "Security Context")
    pub resource: String,
    /// 이슈 설명
    pub description: String,
    /// 심각도
    pub severity: Severity,
    /// 권장 조치
    pub recommendation: String,
}

/// 파드별 취약점 레코드
///
/// Workload -> ContainerRef -> 이미지 키 -> 발견 항목 조인의 결과물입니다.
/// `findings`는 cve_id 기준으로 중복이 제거됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodVulnerabilityRecord {
    /// 네임스페이스
    pub namespace: String,
    /// 파드 이름
    pub pod_name: String,
    /// CVE 발견 항목 (cve_id 기준 유일)
    pub findings: Vec<VulnerabilityFinding>,
    /// CVE가 아닌 일반 이슈
    pub issues: Vec<PodIssue>,
}

impl PodVulnerabilityRecord {
    /// CVE 발견 항목이 하나라도 있으면 true를 반환합니다.
    pub fn is_vulnerable(&self) -> bool {
        !self.findings.is_empty()
    }
}

/// 노드 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    /// 노드 이름
    pub name: String,
    /// 상태 ("Ready" / "NotReady")
    pub status: String,
    /// CPU 사용량 (코어)
    pub cpu_usage: f64,
    /// CPU 용량 (코어)
    pub cpu_capacity: f64,
    /// 메모리 사용량 (바이트)
    pub memory_usage: u64,
    /// 메모리 용량 (바이트)
    pub memory_capacity: u64,
    /// 실행 중인 파드 수
    pub pods_running: usize,
}

/// 리소스 개수 요약
///
/// `GET /resources`가 반환하는 현재 인벤토리 카운트입니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCounts {
    /// 전체 파드 수
    pub pods: usize,
    /// 전체 서비스 수
    pub services: usize,
    /// 전체 노드 수
    pub nodes: usize,
}

/// 클러스터 메트릭 스냅샷
///
/// 메트릭 샘플러가 주기마다 수집하는 시점 스냅샷입니다.
/// 스캔 실행과는 독립적으로 유지됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterMetricsSample {
    /// 수집 시각
    pub timestamp: SystemTime,
    /// 전체 노드 수
    pub total_nodes: usize,
    /// 전체 파드 수
    pub total_pods: usize,
    /// 전체 서비스 수
    pub total_services: usize,
    /// 전체 네임스페이스 수
    pub total_namespaces: usize,
    /// 클러스터 CPU 사용량 합계 (코어)
    pub cpu_usage: f64,
    /// 클러스터 CPU 용량 합계 (코어)
    pub cpu_capacity: f64,
    /// 클러스터 메모리 사용량 합계 (바이트)
    pub memory_usage: u64,
    /// 클러스터 메모리 용량 합계 (바이트)
    pub memory_capacity: u64,
    /// 노드별 메트릭
    pub nodes: Vec<NodeInfo>,
}

/// 호스트 리소스 메트릭 스냅샷
///
/// 엔진 프로세스가 실행 중인 호스트의 CPU/메모리/디스크 사용량입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceMetricsSample {
    /// 수집 시각
    pub timestamp: SystemTime,
    /// CPU 코어 수
    pub cpu_cores: usize,
    /// CPU 사용량 (코어)
    pub cpu_usage: f64,
    /// 메모리 사용량 (GB)
    pub memory_usage: f64,
    /// 메모리 전체 (GB)
    pub memory_total: f64,
    /// 디스크 사용량 (GB)
    pub disk_usage: f64,
    /// 디스크 전체 (GB)
    pub disk_total: f64,
}
