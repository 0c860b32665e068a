//! 보안 컨텍스트 점검 -- CVE가 아닌 일반 이슈 생성
//!
//! 워크로드의 보안 컨텍스트 설정을 점검해 [`PodIssue`]를 생성합니다.
//! 여기서 나온 이슈는 파드 레코드에 첨부되지만 취약 파드 집계에는
//! 포함되지 않습니다 (집계는 CVE 발견 항목 기준).

use kubeguard_core::types::{PodIssue, Severity, Workload};

/// 워크로드 하나의 보안 컨텍스트 이슈를 점검합니다.
///
/// - `runAsNonRoot`가 true로 명시되지 않은 파드 → HIGH
/// - `privileged: true` 컨테이너 → CRITICAL
pub fn security_issues(workload: &Workload) -> Vec<PodIssue> {
    let mut issues = Vec::new();

    if workload.run_as_non_root != Some(true) {
        issues.push(PodIssue {
            resource: "Security Context".to_owned(),
            description: format!("Pod {} may run as root", workload.key()),
            severity: Severity::High,
            recommendation: "Set securityContext.runAsNonRoot to true".to_owned(),
        });
    }

    for container in &workload.containers {
        if container.privileged == Some(true) {
            issues.push(PodIssue {
                resource: "Security Context".to_owned(),
                description: format!(
                    "Container {} in pod {} runs in privileged mode",
                    container.name,
                    workload.key(),
                ),
                severity: Severity::Critical,
                recommendation: "Remove privileged: true unless strictly required".to_owned(),
            });
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubeguard_core::types::ContainerRef;

    fn workload(run_as_non_root: Option<bool>, privileged: Option<bool>) -> Workload {
        Workload {
            namespace: "default".to_owned(),
            name: "web".to_owned(),
            containers: vec![ContainerRef {
                name: "app".to_owned(),
                image: "nginx:1.25".to_owned(),
                privileged,
            }],
            run_as_non_root,
        }
    }

    #[test]
    fn hardened_pod_has_no_issues() {
        assert!(security_issues(&workload(Some(true), Some(false))).is_empty());
    }

    #[test]
    fn missing_run_as_non_root_is_high() {
        let issues = security_issues(&workload(None, None));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::High);
        assert!(issues[0].description.contains("default/web"));
    }

    #[test]
    fn explicit_root_is_high() {
        let issues = security_issues(&workload(Some(false), None));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::High);
    }

    #[test]
    fn privileged_container_is_critical() {
        let issues = security_issues(&workload(Some(true), Some(true)));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Critical);
        assert!(issues[0].description.contains("privileged"));
    }

    #[test]
    fn root_and_privileged_stack() {
        let issues = security_issues(&workload(None, Some(true)));
        assert_eq!(issues.len(), 2);
    }
}
