//! 취약점 상관분석 -- 실행 단위 메모이제이션과 동시성 제한 조회
//!
//! [`Correlator`]는 한 스캔 실행에 등장하는 모든 정규화 이미지 키를
//! 피드와 대조합니다.
//!
//! - 같은 키는 실행 내에서 한 번만 조회합니다 (메모이제이션은 실행
//!   경계에서 버려집니다).
//! - 조회는 세마포어로 동시성이 제한된 워커 풀에서 병렬 실행됩니다.
//! - 키 하나의 타임아웃/에러는 해당 키만 `incomplete`로 표시하고
//!   부분 실패로 기록할 뿐, 다른 키의 결과를 막지 않습니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use kubeguard_core::metrics::{
    FEED_LOOKUPS_TOTAL, FEED_LOOKUP_DURATION_SECONDS, FEED_LOOKUP_TIMEOUTS_TOTAL, LABEL_RESULT,
};
use kubeguard_core::types::VulnerabilityFinding;

use crate::feed::VulnFeed;
use crate::image::CanonicalImageKey;

/// 키 하나의 조회 결과
#[derive(Debug, Clone, Default)]
pub struct KeyFindings {
    /// 발견 항목 (타임아웃/에러 시 빈 목록)
    pub findings: Vec<VulnerabilityFinding>,
    /// 조회가 완료되지 못했음을 표시
    pub incomplete: bool,
}

/// 상관분석 결과 전체
#[derive(Debug, Default)]
pub struct CorrelationOutcome {
    /// 정규화 키 문자열 → 조회 결과
    pub by_key: HashMap<String, KeyFindings>,
    /// 키 단위 부분 실패 기록
    pub partial_failures: Vec<String>,
}

/// 취약점 상관분석기
pub struct Correlator<F> {
    feed: Arc<F>,
    lookup_timeout: Duration,
    lookup_concurrency: usize,
}

impl<F: VulnFeed> Correlator<F> {
    pub fn new(feed: Arc<F>, lookup_timeout: Duration, lookup_concurrency: usize) -> Self {
        Self {
            feed,
            lookup_timeout,
            // 최소 1은 보장
            lookup_concurrency: lookup_concurrency.max(1),
        }
    }

    /// 키 목록 전체를 조회합니다.
    ///
    /// 입력의 중복 키는 한 번만 조회되며, 결과 맵에는 입력에 등장한
    /// 모든 유일 키가 포함됩니다.
    pub async fn lookup_all(&self, keys: &[CanonicalImageKey]) -> CorrelationOutcome {
        let mut unique: HashMap<String, CanonicalImageKey> = HashMap::new();
        for key in keys {
            if !key.is_empty() {
                unique.entry(key.to_string()).or_insert_with(|| key.clone());
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.lookup_concurrency));
        let mut tasks = JoinSet::new();
        for (key_str, key) in unique {
            let feed = Arc::clone(&self.feed);
            let semaphore = Arc::clone(&semaphore);
            let timeout = self.lookup_timeout;
            tasks.spawn(async move {
                // 세마포어가 닫히지 않으므로 acquire는 실패하지 않음
                let _permit = semaphore.acquire_owned().await;
                let started = Instant::now();
                let result = tokio::time::timeout(timeout, feed.lookup(&key)).await;
                histogram!(FEED_LOOKUP_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
                (key_str, timeout, result)
            });
        }

        let mut outcome = CorrelationOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            let Ok((key_str, timeout, result)) = joined else {
                // 태스크 패닉은 무시하고 남은 키를 계속 처리
                continue;
            };
            match result {
                Ok(Ok(findings)) => {
                    counter!(FEED_LOOKUPS_TOTAL, LABEL_RESULT => "success").increment(1);
                    debug!(key = %key_str, findings = findings.len(), "feed lookup complete");
                    outcome.by_key.insert(
                        key_str,
                        KeyFindings {
                            findings,
                            incomplete: false,
                        },
                    );
                }
                Ok(Err(e)) => {
                    counter!(FEED_LOOKUPS_TOTAL, LABEL_RESULT => "failure").increment(1);
                    warn!(key = %key_str, error = %e, "feed lookup failed");
                    outcome
                        .partial_failures
                        .push(format!("feed lookup for {key_str}: {e}"));
                    outcome.by_key.insert(key_str, KeyFindings {
                        findings: Vec::new(),
                        incomplete: true,
                    });
                }
                Err(_) => {
                    counter!(FEED_LOOKUPS_TOTAL, LABEL_RESULT => "failure").increment(1);
                    counter!(FEED_LOOKUP_TIMEOUTS_TOTAL).increment(1);
                    warn!(key = %key_str, "feed lookup timed out");
                    outcome.partial_failures.push(format!(
                        "feed lookup for {key_str}: timed out after {}s",
                        timeout.as_secs(),
                    ));
                    outcome.by_key.insert(key_str, KeyFindings {
                        findings: Vec::new(),
                        incomplete: true,
                    });
                }
            }
        }
        outcome
    }
}
