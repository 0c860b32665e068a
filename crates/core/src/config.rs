//! 설정 관리 — kubeguard.toml 파싱 및 런타임 설정
//!
//! [`KubeguardConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`KUBEGUARD_CLUSTER_API_URL=https://...` 형식)
//! 3. 설정 파일 (`kubeguard.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), kubeguard_core::error::KubeguardError> {
//! use kubeguard_core::config::KubeguardConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = KubeguardConfig::load("kubeguard.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = KubeguardConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, KubeguardError};

/// Kubeguard 통합 설정
///
/// `kubeguard.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KubeguardConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 클러스터 API 설정
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// 취약점 피드 설정
    #[serde(default)]
    pub feed: FeedConfig,
    /// 스캔 실행 설정
    #[serde(default)]
    pub scan: ScanConfig,
    /// 메트릭 샘플러 설정
    #[serde(default)]
    pub sampler: SamplerConfig,
    /// HTTP API 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl KubeguardConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, KubeguardError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, KubeguardError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KubeguardError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                KubeguardError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, KubeguardError> {
        toml::from_str(toml_str).map_err(|e| {
            KubeguardError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `KUBEGUARD_{SECTION}_{FIELD}`
    /// 예: `KUBEGUARD_CLUSTER_API_URL=https://10.0.0.1:6443`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "KUBEGUARD_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "KUBEGUARD_GENERAL_LOG_FORMAT");

        // Cluster
        override_string(&mut self.cluster.api_url, "KUBEGUARD_CLUSTER_API_URL");
        override_string(&mut self.cluster.token, "KUBEGUARD_CLUSTER_TOKEN");
        override_u64(
            &mut self.cluster.request_timeout_secs,
            "KUBEGUARD_CLUSTER_REQUEST_TIMEOUT_SECS",
        );
        override_bool(
            &mut self.cluster.insecure_skip_tls_verify,
            "KUBEGUARD_CLUSTER_INSECURE_SKIP_TLS_VERIFY",
        );

        // Feed
        override_string(&mut self.feed.mode, "KUBEGUARD_FEED_MODE");
        override_string(&mut self.feed.path, "KUBEGUARD_FEED_PATH");
        override_string(&mut self.feed.url, "KUBEGUARD_FEED_URL");
        override_u64(
            &mut self.feed.lookup_timeout_secs,
            "KUBEGUARD_FEED_LOOKUP_TIMEOUT_SECS",
        );
        override_usize(
            &mut self.feed.lookup_concurrency,
            "KUBEGUARD_FEED_LOOKUP_CONCURRENCY",
        );

        // Scan
        override_u64(&mut self.scan.timeout_secs, "KUBEGUARD_SCAN_TIMEOUT_SECS");
        override_usize(&mut self.scan.history_limit, "KUBEGUARD_SCAN_HISTORY_LIMIT");

        // Sampler
        override_bool(&mut self.sampler.enabled, "KUBEGUARD_SAMPLER_ENABLED");
        override_u64(
            &mut self.sampler.interval_secs,
            "KUBEGUARD_SAMPLER_INTERVAL_SECS",
        );
        override_usize(
            &mut self.sampler.window_capacity,
            "KUBEGUARD_SAMPLER_WINDOW_CAPACITY",
        );

        // Server
        override_string(&mut self.server.listen_addr, "KUBEGUARD_SERVER_LISTEN_ADDR");
        override_u16(&mut self.server.port, "KUBEGUARD_SERVER_PORT");
        override_csv(&mut self.server.api_tokens, "KUBEGUARD_SERVER_API_TOKENS");

        // Metrics
        override_bool(&mut self.metrics.enabled, "KUBEGUARD_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "KUBEGUARD_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "KUBEGUARD_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), KubeguardError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.cluster.api_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "cluster.api_url".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if self.cluster.request_timeout_secs == 0 || self.cluster.request_timeout_secs > 120 {
            return Err(ConfigError::InvalidValue {
                field: "cluster.request_timeout_secs".to_owned(),
                reason: "must be 1-120".to_owned(),
            }
            .into());
        }

        let valid_feed_modes = ["file", "http"];
        if !valid_feed_modes.contains(&self.feed.mode.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "feed.mode".to_owned(),
                reason: format!("must be one of: {}", valid_feed_modes.join(", ")),
            }
            .into());
        }

        if self.feed.mode == "file" && self.feed.path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "feed.path".to_owned(),
                reason: "must not be empty in file mode".to_owned(),
            }
            .into());
        }

        if self.feed.mode == "http" && self.feed.url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "feed.url".to_owned(),
                reason: "must not be empty in http mode".to_owned(),
            }
            .into());
        }

        if self.feed.lookup_timeout_secs == 0 || self.feed.lookup_timeout_secs > 60 {
            return Err(ConfigError::InvalidValue {
                field: "feed.lookup_timeout_secs".to_owned(),
                reason: "must be 1-60".to_owned(),
            }
            .into());
        }

        if self.feed.lookup_concurrency == 0 || self.feed.lookup_concurrency > 64 {
            return Err(ConfigError::InvalidValue {
                field: "feed.lookup_concurrency".to_owned(),
                reason: "must be 1-64".to_owned(),
            }
            .into());
        }

        if self.scan.timeout_secs < 10 || self.scan.timeout_secs > 3600 {
            return Err(ConfigError::InvalidValue {
                field: "scan.timeout_secs".to_owned(),
                reason: "must be 10-3600".to_owned(),
            }
            .into());
        }

        if self.scan.history_limit == 0 || self.scan.history_limit > 100 {
            return Err(ConfigError::InvalidValue {
                field: "scan.history_limit".to_owned(),
                reason: "must be 1-100".to_owned(),
            }
            .into());
        }

        if self.sampler.enabled {
            if self.sampler.interval_secs == 0 || self.sampler.interval_secs > 3600 {
                return Err(ConfigError::InvalidValue {
                    field: "sampler.interval_secs".to_owned(),
                    reason: "must be 1-3600".to_owned(),
                }
                .into());
            }
            if self.sampler.window_capacity == 0 || self.sampler.window_capacity > 10_000 {
                return Err(ConfigError::InvalidValue {
                    field: "sampler.window_capacity".to_owned(),
                    reason: "must be 1-10000".to_owned(),
                }
                .into());
            }
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_owned(),
                reason: "must not be 0".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정 (로깅)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// 클러스터 API 접근 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Kubernetes API 서버 주소
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bearer 토큰 (서비스 어카운트 토큰 등)
    #[serde(default)]
    pub token: String,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// TLS 검증 생략 여부 (개발 환경 전용)
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: String::new(),
            request_timeout_secs: default_request_timeout(),
            insecure_skip_tls_verify: false,
        }
    }
}

/// 취약점 피드 설정
///
/// 피드는 외부 데이터 소스이며 엔진은 조회만 합니다.
/// `file` 모드는 로컬 JSON 스냅샷 디렉토리, `http` 모드는 피드 서비스를
/// 이미지 키 단위로 조회합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// 피드 모드 ("file" / "http")
    #[serde(default = "default_feed_mode")]
    pub mode: String,
    /// file 모드: 피드 스냅샷 디렉토리
    #[serde(default = "default_feed_path")]
    pub path: String,
    /// http 모드: 피드 서비스 기본 URL
    #[serde(default)]
    pub url: String,
    /// 이미지 키 하나당 조회 타임아웃 (초)
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,
    /// 동시 조회 상한
    #[serde(default = "default_lookup_concurrency")]
    pub lookup_concurrency: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            mode: default_feed_mode(),
            path: default_feed_path(),
            url: String::new(),
            lookup_timeout_secs: default_lookup_timeout(),
            lookup_concurrency: default_lookup_concurrency(),
        }
    }
}

/// 스캔 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// 스캔 벽시계 상한 (초) — 초과 시 강제 실패
    #[serde(default = "default_scan_timeout")]
    pub timeout_secs: u64,
    /// 보관할 완료/실패 실행 이력 수
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_scan_timeout(),
            history_limit: default_history_limit(),
        }
    }
}

/// 메트릭 샘플러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// 샘플러 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 샘플링 주기 (초)
    #[serde(default = "default_sampler_interval")]
    pub interval_secs: u64,
    /// 롤링 윈도 용량 (초과 시 가장 오래된 샘플부터 제거)
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_sampler_interval(),
            window_capacity: default_window_capacity(),
        }
    }
}

/// HTTP API 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 바인드 주소
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// 바인드 포트
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// 허용 Bearer 토큰 목록 (비어 있으면 인증 비활성 — 개발 전용)
    #[serde(default)]
    pub api_tokens: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_server_port(),
            api_tokens: Vec::new(),
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// 메트릭 엔드포인트 활성화 여부
    #[serde(default)]
    pub enabled: bool,
    /// 메트릭 리스너 바인드 주소
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// 메트릭 리스너 포트
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    /// 스크레이프 경로
    #[serde(default = "default_metrics_endpoint")]
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: default_listen_addr(),
            port: default_metrics_port(),
            endpoint: default_metrics_endpoint(),
        }
    }
}

// --- serde 기본값 헬퍼 ---

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_log_format() -> String {
    "json".to_owned()
}

fn default_api_url() -> String {
    "https://127.0.0.1:6443".to_owned()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_feed_mode() -> String {
    "file".to_owned()
}

fn default_feed_path() -> String {
    "/var/lib/kubeguard/feed".to_owned()
}

fn default_lookup_timeout() -> u64 {
    5
}

fn default_lookup_concurrency() -> usize {
    8
}

fn default_scan_timeout() -> u64 {
    300
}

fn default_history_limit() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_sampler_interval() -> u64 {
    15
}

fn default_window_capacity() -> usize {
    120
}

fn default_listen_addr() -> String {
    "127.0.0.1".to_owned()
}

fn default_server_port() -> u16 {
    5000
}

fn default_metrics_port() -> u16 {
    9100
}

fn default_metrics_endpoint() -> String {
    "/metrics".to_owned()
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, key: &str) {
    if let Ok(value) = std::env::var(key) {
        *target = value;
    }
}

fn override_bool(target: &mut bool, key: &str) {
    if let Ok(value) = std::env::var(key) {
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" => *target = true,
            "false" | "0" | "no" => *target = false,
            _ => warn!(key, value, "ignoring invalid boolean env override"),
        }
    }
}

fn override_u64(target: &mut u64, key: &str) {
    if let Ok(value) = std::env::var(key) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value, "ignoring invalid integer env override"),
        }
    }
}

fn override_u16(target: &mut u16, key: &str) {
    if let Ok(value) = std::env::var(key) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value, "ignoring invalid port env override"),
        }
    }
}

fn override_usize(target: &mut usize, key: &str) {
    if let Ok(value) = std::env::var(key) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value, "ignoring invalid integer env override"),
        }
    }
}

fn override_csv(target: &mut Vec<String>, key: &str) {
    if let Ok(value) = std::env::var(key) {
        *target = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_is_valid() {
        let config = KubeguardConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn parse_minimal_toml() {
        let config = KubeguardConfig::parse(
            r#"
            [general]
            log_level = "debug"

            [cluster]
            api_url = "https://10.0.0.1:6443"
            "#,
        )
        .unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.cluster.api_url, "https://10.0.0.1:6443");
        // 나머지는 기본값
        assert_eq!(config.scan.timeout_secs, 300);
        assert_eq!(config.feed.mode, "file");
    }

    #[test]
    fn parse_rejects_malformed_toml() {
        let result = KubeguardConfig::parse("[general\nlog_level=");
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_bad_log_level() {
        let mut config = KubeguardConfig::default();
        config.general.log_level = "verbose".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_feed_mode() {
        let mut config = KubeguardConfig::default();
        config.feed.mode = "grpc".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_requires_url_in_http_mode() {
        let mut config = KubeguardConfig::default();
        config.feed.mode = "http".to_owned();
        config.feed.url = String::new();
        assert!(config.validate().is_err());

        config.feed.url = "http://feed.internal:8080".to_owned();
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_scan_timeout() {
        let mut config = KubeguardConfig::default();
        config.scan.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_excessive_concurrency() {
        let mut config = KubeguardConfig::default();
        config.feed.lookup_concurrency = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_history_limit() {
        let mut config = KubeguardConfig::default();
        config.scan.history_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_skips_sampler_ranges_when_disabled() {
        let mut config = KubeguardConfig::default();
        config.sampler.enabled = false;
        config.sampler.interval_secs = 0;
        config.validate().unwrap();
    }

    #[test]
    #[serial]
    fn env_override_cluster_url() {
        unsafe {
            std::env::set_var("KUBEGUARD_CLUSTER_API_URL", "https://env.example:6443");
        }
        let mut config = KubeguardConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("KUBEGUARD_CLUSTER_API_URL");
        }
        assert_eq!(config.cluster.api_url, "https://env.example:6443");
    }

    #[test]
    #[serial]
    fn env_override_api_tokens_csv() {
        unsafe {
            std::env::set_var("KUBEGUARD_SERVER_API_TOKENS", "alpha, beta ,gamma");
        }
        let mut config = KubeguardConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("KUBEGUARD_SERVER_API_TOKENS");
        }
        assert_eq!(config.server.api_tokens, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    #[serial]
    fn env_override_invalid_bool_is_ignored() {
        unsafe {
            std::env::set_var("KUBEGUARD_SAMPLER_ENABLED", "maybe");
        }
        let mut config = KubeguardConfig::default();
        let before = config.sampler.enabled;
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("KUBEGUARD_SAMPLER_ENABLED");
        }
        assert_eq!(config.sampler.enabled, before);
    }

    #[tokio::test]
    async fn from_file_loads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kubeguard.toml");
        tokio::fs::write(
            &path,
            "[scan]\ntimeout_secs = 120\nhistory_limit = 5\n",
        )
        .await
        .unwrap();

        let config = KubeguardConfig::from_file(&path).await.unwrap();
        assert_eq!(config.scan.timeout_secs, 120);
        assert_eq!(config.scan.history_limit, 5);
    }

    #[tokio::test]
    async fn from_file_missing_is_file_not_found() {
        let result = KubeguardConfig::from_file("/nonexistent/kubeguard.toml").await;
        assert!(matches!(
            result,
            Err(KubeguardError::Config(ConfigError::FileNotFound { .. })),
        ));
    }
}
