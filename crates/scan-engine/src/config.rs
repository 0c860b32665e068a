//! 스캔 엔진 런타임 설정

use std::time::Duration;

use kubeguard_core::config::{FeedConfig, ScanConfig};

/// 엔진 런타임 설정
///
/// 통합 설정의 `[scan]`, `[feed]` 섹션에서 이 모듈이 쓰는 값만 추립니다.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// 스캔 벽시계 상한
    pub scan_timeout: Duration,
    /// 보관할 실행 이력 수
    pub history_limit: usize,
    /// 이미지 키 하나당 피드 조회 타임아웃
    pub lookup_timeout: Duration,
    /// 동시 피드 조회 상한
    pub lookup_concurrency: usize,
}

impl EngineSettings {
    /// 통합 설정에서 변환합니다.
    pub fn from_core(scan: &ScanConfig, feed: &FeedConfig) -> Self {
        Self {
            scan_timeout: Duration::from_secs(scan.timeout_secs),
            history_limit: scan.history_limit,
            lookup_timeout: Duration::from_secs(feed.lookup_timeout_secs),
            lookup_concurrency: feed.lookup_concurrency,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_core(&ScanConfig::default(), &FeedConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_core_converts_durations() {
        let mut scan = ScanConfig::default();
        scan.timeout_secs = 60;
        let mut feed = FeedConfig::default();
        feed.lookup_timeout_secs = 2;
        feed.lookup_concurrency = 4;

        let settings = EngineSettings::from_core(&scan, &feed);
        assert_eq!(settings.scan_timeout, Duration::from_secs(60));
        assert_eq!(settings.lookup_timeout, Duration::from_secs(2));
        assert_eq!(settings.lookup_concurrency, 4);
    }
}
