//! 집계 및 리포트 생성 -- 중복 제거, 히스토그램, 결정적 정렬
//!
//! 파드 레코드 목록을 받아 스캔 리포트를 만듭니다. 같은 입력에 대해
//! 항상 바이트 단위로 동일한 출력을 생성합니다.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use kubeguard_core::scan::{ScanSummary, SeverityHistogram};
use kubeguard_core::types::{PodVulnerabilityRecord, VulnerabilityFinding};

/// 스캔 리포트
///
/// [`build`]의 출력이며 상태 기계의 `complete()`로 전달됩니다.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// 결과 요약
    pub summary: ScanSummary,
    /// 심각도별 유일 CVE 히스토그램
    pub severity_histogram: SeverityHistogram,
    /// 유일 CVE 목록 (심각도 내림차순, 동률은 cve_id 오름차순)
    pub cves: Vec<VulnerabilityFinding>,
    /// 파드별 레코드
    pub pods: Vec<PodVulnerabilityRecord>,
}

/// 파드 레코드를 집계해 리포트를 생성합니다.
///
/// - 실행 전체에서 cve_id 기준으로 중복을 제거합니다 (여러 파드가 같은
///   CVE에 영향을 받아도 한 번만 집계).
/// - 히스토그램 카운트 합은 `cves.len()`과 같습니다.
/// - `vulnerable_pods`는 CVE 발견 항목이 있는 파드만 셉니다 (일반 이슈는
///   집계에 포함되지 않음).
pub fn build(pods: Vec<PodVulnerabilityRecord>) -> ScanReport {
    // BTreeMap이 cve_id 중복 제거와 1차 정렬을 동시에 보장
    let mut unique: BTreeMap<String, VulnerabilityFinding> = BTreeMap::new();
    for record in &pods {
        for finding in &record.findings {
            unique
                .entry(finding.cve_id.clone())
                .or_insert_with(|| finding.clone());
        }
    }

    let mut cves: Vec<VulnerabilityFinding> = unique.into_values().collect();
    cves.sort_by(|a, b| {
        Reverse(a.severity)
            .cmp(&Reverse(b.severity))
            .then_with(|| a.cve_id.cmp(&b.cve_id))
    });

    let mut histogram = SeverityHistogram::default();
    for cve in &cves {
        histogram.record(cve.severity);
    }

    let summary = ScanSummary {
        total_pods: pods.len(),
        vulnerable_pods: pods.iter().filter(|p| p.is_vulnerable()).count(),
        total_cves: cves.len(),
    };

    ScanReport {
        summary,
        severity_histogram: histogram,
        cves,
        pods,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubeguard_core::types::{PodIssue, Severity};

    fn finding(cve_id: &str, severity: Severity) -> VulnerabilityFinding {
        VulnerabilityFinding {
            cve_id: cve_id.to_owned(),
            severity,
            description: String::new(),
            affected_components: Vec::new(),
            fix_version: None,
            published_date: None,
            link: None,
            attack_vector: None,
            mitigation: None,
        }
    }

    fn record(pod_name: &str, findings: Vec<VulnerabilityFinding>) -> PodVulnerabilityRecord {
        PodVulnerabilityRecord {
            namespace: "default".to_owned(),
            pod_name: pod_name.to_owned(),
            findings,
            issues: Vec::new(),
        }
    }

    fn sample_pods() -> Vec<PodVulnerabilityRecord> {
        vec![
            record(
                "web-1",
                vec![
                    finding("CVE-2024-0002", Severity::High),
                    finding("CVE-2024-0001", Severity::Critical),
                ],
            ),
            record("web-2", vec![finding("CVE-2024-0001", Severity::Critical)]),
            record("clean", vec![]),
        ]
    }

    #[test]
    fn dedupes_cves_across_pods() {
        let report = build(sample_pods());
        assert_eq!(report.cves.len(), 2);
        assert_eq!(report.summary.total_cves, 2);
    }

    #[test]
    fn orders_by_severity_then_cve_id() {
        let pods = vec![record(
            "p",
            vec![
                finding("CVE-2024-0003", Severity::Low),
                finding("CVE-2024-0002", Severity::Critical),
                finding("CVE-2024-0001", Severity::Critical),
                finding("CVE-2024-0004", Severity::Unknown),
            ],
        )];
        let report = build(pods);
        let ids: Vec<&str> = report.cves.iter().map(|c| c.cve_id.as_str()).collect();
        assert_eq!(
            ids,
            ["CVE-2024-0001", "CVE-2024-0002", "CVE-2024-0003", "CVE-2024-0004"],
        );
    }

    #[test]
    fn histogram_sums_to_unique_cve_count() {
        let report = build(sample_pods());
        assert_eq!(report.severity_histogram.total(), report.cves.len());
        assert_eq!(report.severity_histogram.critical, 1);
        assert_eq!(report.severity_histogram.high, 1);
    }

    #[test]
    fn vulnerable_pods_counts_findings_only() {
        let mut pods = sample_pods();
        // 일반 이슈만 있는 파드는 취약 집계에 포함되지 않음
        pods[2].issues.push(PodIssue {
            resource: "Security Context".to_owned(),
            description: "Pod may run as root".to_owned(),
            severity: Severity::High,
            recommendation: "Set runAsNonRoot".to_owned(),
        });
        let report = build(pods);
        assert_eq!(report.summary.total_pods, 3);
        assert_eq!(report.summary.vulnerable_pods, 2);
    }

    #[test]
    fn build_is_idempotent() {
        let first = build(sample_pods());
        let second = build(sample_pods());
        let a = serde_json::to_vec(&first.cves).unwrap();
        let b = serde_json::to_vec(&second.cves).unwrap();
        assert_eq!(a, b);
        assert_eq!(first.severity_histogram, second.severity_histogram);
        assert_eq!(first.summary, second.summary);
    }
}
