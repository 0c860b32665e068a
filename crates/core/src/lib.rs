#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod metrics;
pub mod scan;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ClusterError, ConfigError, FeedError, KubeguardError, ScanError};

// 설정
pub use config::KubeguardConfig;

// 스캔 실행
pub use scan::{ScanRun, ScanStatus, ScanSummary, SeverityHistogram};

// 도메인 타입
pub use types::{
    ClusterMetricsSample, ContainerRef, NodeInfo, PodIssue, PodVulnerabilityRecord,
    ResourceCounts, ResourceMetricsSample, Severity, VulnerabilityFinding, Workload,
};
