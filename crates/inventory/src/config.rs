//! 인벤토리 모듈 설정
//!
//! [`kubeguard_core::config::KubeguardConfig`]에서 이 모듈이 사용하는
//! 섹션만 추려 런타임 형태(`Duration` 등)로 변환합니다.

use std::time::Duration;

use kubeguard_core::config::{ClusterConfig, SamplerConfig};

/// 클러스터 클라이언트 런타임 설정
#[derive(Debug, Clone)]
pub struct InventoryConfig {
    /// Kubernetes API 서버 주소
    pub api_url: String,
    /// Bearer 토큰 (빈 문자열이면 Authorization 헤더 생략)
    pub token: String,
    /// 요청 타임아웃
    pub request_timeout: Duration,
    /// TLS 검증 생략 여부 (개발 환경 전용)
    pub insecure_skip_tls_verify: bool,
}

impl InventoryConfig {
    /// 통합 설정의 `[cluster]` 섹션에서 변환합니다.
    pub fn from_core(config: &ClusterConfig) -> Self {
        Self {
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            token: config.token.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            insecure_skip_tls_verify: config.insecure_skip_tls_verify,
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self::from_core(&ClusterConfig::default())
    }
}

/// 메트릭 샘플러 런타임 설정
#[derive(Debug, Clone)]
pub struct SamplerSettings {
    /// 샘플링 주기
    pub interval: Duration,
    /// 롤링 윈도 용량
    pub window_capacity: usize,
}

impl SamplerSettings {
    /// 통합 설정의 `[sampler]` 섹션에서 변환합니다.
    pub fn from_core(config: &SamplerConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            window_capacity: config.window_capacity,
        }
    }
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self::from_core(&SamplerConfig::default())
    }
}
