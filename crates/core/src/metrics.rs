//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `kubeguard_`
//! - 모듈명: `scan_`, `inventory_`, `feed_`, `sampler_`, `server_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(kubeguard_core::metrics::SCAN_RUNS_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 심각도 레이블 키 (CRITICAL, HIGH, MEDIUM, LOW, UNKNOWN)
pub const LABEL_SEVERITY: &str = "severity";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// HTTP 경로 레이블 키
pub const LABEL_PATH: &str = "path";

// ─── Scan Engine 메트릭 ─────────────────────────────────────────────

/// Scan Engine: 완료된 스캔 실행 수 (counter, label: result)
pub const SCAN_RUNS_TOTAL: &str = "kubeguard_scan_runs_total";

/// Scan Engine: 거부된 스캔 시작 요청 수 (counter)
pub const SCAN_REJECTED_TOTAL: &str = "kubeguard_scan_rejected_total";

/// Scan Engine: 마지막 스캔에서 발견된 CVE 수 (gauge, label: severity)
pub const SCAN_CVES_FOUND: &str = "kubeguard_scan_cves_found";

/// Scan Engine: 마지막 스캔의 취약 파드 수 (gauge)
pub const SCAN_VULNERABLE_PODS: &str = "kubeguard_scan_vulnerable_pods";

/// Scan Engine: 스캔 소요 시간 (histogram, 초)
pub const SCAN_DURATION_SECONDS: &str = "kubeguard_scan_duration_seconds";

/// Scan Engine: 스캔당 부분 실패 수 (gauge)
pub const SCAN_PARTIAL_FAILURES: &str = "kubeguard_scan_partial_failures";

// ─── Inventory 메트릭 ───────────────────────────────────────────────

/// Inventory: 클러스터 API 요청 수 (counter, label: result)
pub const INVENTORY_API_REQUESTS_TOTAL: &str = "kubeguard_inventory_api_requests_total";

/// Inventory: 마지막 조회의 워크로드 수 (gauge)
pub const INVENTORY_WORKLOADS: &str = "kubeguard_inventory_workloads";

// ─── Feed 메트릭 ────────────────────────────────────────────────────

/// Feed: 피드 조회 수 (counter, label: result)
pub const FEED_LOOKUPS_TOTAL: &str = "kubeguard_feed_lookups_total";

/// Feed: 조회 타임아웃 수 (counter)
pub const FEED_LOOKUP_TIMEOUTS_TOTAL: &str = "kubeguard_feed_lookup_timeouts_total";

/// Feed: 단일 키 조회 지연 시간 (histogram, 초)
pub const FEED_LOOKUP_DURATION_SECONDS: &str = "kubeguard_feed_lookup_duration_seconds";

// ─── Sampler 메트릭 ─────────────────────────────────────────────────

/// Sampler: 수집된 샘플 수 (counter, label: result)
pub const SAMPLER_TICKS_TOTAL: &str = "kubeguard_sampler_ticks_total";

/// Sampler: 클러스터 CPU 사용량 (gauge, 코어)
pub const SAMPLER_CLUSTER_CPU_USAGE: &str = "kubeguard_sampler_cluster_cpu_usage";

/// Sampler: 클러스터 메모리 사용량 (gauge, 바이트)
pub const SAMPLER_CLUSTER_MEMORY_USAGE: &str = "kubeguard_sampler_cluster_memory_usage";

// ─── Server 메트릭 ──────────────────────────────────────────────────

/// Server: 처리된 HTTP 요청 수 (counter, label: path)
pub const SERVER_REQUESTS_TOTAL: &str = "kubeguard_server_requests_total";

/// Server: 인증 실패 수 (counter)
pub const SERVER_AUTH_FAILURES_TOTAL: &str = "kubeguard_server_auth_failures_total";

/// Server: 가동 시간 (gauge, 초)
pub const SERVER_UPTIME_SECONDS: &str = "kubeguard_server_uptime_seconds";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 피드 조회 지연 시간 히스토그램 버킷 (초)
///
/// 1ms ~ 10s 범위, 네트워크 조회 분포
pub const LOOKUP_DURATION_BUCKETS: [f64; 8] = [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 10.0];

/// 스캔 소요 시간 히스토그램 버킷 (초)
///
/// 100ms ~ 600s 범위 (클러스터 전체 순회 포함)
pub const SCAN_DURATION_BUCKETS: [f64; 9] =
    [0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// `metrics::describe_counter!()`, `describe_gauge!()`, `describe_histogram!()`을
/// 호출하여 Prometheus HELP 텍스트를 설정합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `kubeguard-server`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Scan Engine
    describe_counter!(
        SCAN_RUNS_TOTAL,
        "Total number of scan runs finished, by result"
    );
    describe_counter!(
        SCAN_REJECTED_TOTAL,
        "Total number of scan start requests rejected because a scan was running"
    );
    describe_gauge!(
        SCAN_CVES_FOUND,
        "Number of unique CVEs found in the last completed scan, by severity"
    );
    describe_gauge!(
        SCAN_VULNERABLE_PODS,
        "Number of vulnerable pods in the last completed scan"
    );
    describe_histogram!(
        SCAN_DURATION_SECONDS,
        "Time to complete a single scan run in seconds"
    );
    describe_gauge!(
        SCAN_PARTIAL_FAILURES,
        "Number of partial failures recorded in the last scan run"
    );

    // Inventory
    describe_counter!(
        INVENTORY_API_REQUESTS_TOTAL,
        "Total number of cluster API requests, by result"
    );
    describe_gauge!(
        INVENTORY_WORKLOADS,
        "Number of workloads returned by the last inventory read"
    );

    // Feed
    describe_counter!(
        FEED_LOOKUPS_TOTAL,
        "Total number of vulnerability feed lookups, by result"
    );
    describe_counter!(
        FEED_LOOKUP_TIMEOUTS_TOTAL,
        "Total number of feed lookups that exceeded the per-key timeout"
    );
    describe_histogram!(
        FEED_LOOKUP_DURATION_SECONDS,
        "Time to resolve a single image key against the feed in seconds"
    );

    // Sampler
    describe_counter!(
        SAMPLER_TICKS_TOTAL,
        "Total number of metrics sampler ticks, by result"
    );
    describe_gauge!(
        SAMPLER_CLUSTER_CPU_USAGE,
        "Cluster-wide CPU usage in cores from the last sample"
    );
    describe_gauge!(
        SAMPLER_CLUSTER_MEMORY_USAGE,
        "Cluster-wide memory usage in bytes from the last sample"
    );

    // Server
    describe_counter!(
        SERVER_REQUESTS_TOTAL,
        "Total number of HTTP requests handled, by path"
    );
    describe_counter!(
        SERVER_AUTH_FAILURES_TOTAL,
        "Total number of rejected requests with missing or invalid bearer tokens"
    );
    describe_gauge!(SERVER_UPTIME_SECONDS, "Kubeguard server uptime in seconds");
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        SCAN_RUNS_TOTAL,
        SCAN_REJECTED_TOTAL,
        SCAN_CVES_FOUND,
        SCAN_VULNERABLE_PODS,
        SCAN_DURATION_SECONDS,
        SCAN_PARTIAL_FAILURES,
        INVENTORY_API_REQUESTS_TOTAL,
        INVENTORY_WORKLOADS,
        FEED_LOOKUPS_TOTAL,
        FEED_LOOKUP_TIMEOUTS_TOTAL,
        FEED_LOOKUP_DURATION_SECONDS,
        SAMPLER_TICKS_TOTAL,
        SAMPLER_CLUSTER_CPU_USAGE,
        SAMPLER_CLUSTER_MEMORY_USAGE,
        SERVER_REQUESTS_TOTAL,
        SERVER_AUTH_FAILURES_TOTAL,
        SERVER_UPTIME_SECONDS,
    ];

    #[test]
    fn all_metrics_start_with_kubeguard_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("kubeguard_"),
                "Metric '{}' does not start with 'kubeguard_' prefix",
                name
            );
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for name in ALL_METRIC_NAMES {
            assert!(seen.insert(name), "Duplicate metric name '{}'", name);
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // describe_all() should not panic even without a recorder installed
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        let labels = [LABEL_SEVERITY, LABEL_RESULT, LABEL_PATH];
        for label in &labels {
            assert_eq!(
                label.to_lowercase(),
                *label,
                "Label key '{}' should be lowercase",
                label
            );
        }
    }

    #[test]
    fn histogram_buckets_are_sorted() {
        for buckets in [&LOOKUP_DURATION_BUCKETS[..], &SCAN_DURATION_BUCKETS[..]] {
            for i in 1..buckets.len() {
                assert!(
                    buckets[i] > buckets[i - 1],
                    "Bucket values must be in ascending order"
                );
            }
        }
    }
}
