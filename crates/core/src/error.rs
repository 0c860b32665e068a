//! 에러 타입 — 도메인별 에러 정의
//!
//! 부분 실패(네임스페이스 단위 조회 실패, 이미지 단위 피드 타임아웃)는
//! 에러로 전파하지 않고 결과에 기록합니다. 여기 정의된 에러는 실행을
//! 중단시키거나 호출자에게 거부를 알리는 경우에만 사용됩니다.

/// Kubeguard 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum KubeguardError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 클러스터 API 에러
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// 스캔 실행 에러
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// 취약점 피드 에러
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 클러스터 API 에러
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// API 엔드포인트 자체에 도달 불가 — 진행 중인 스캔을 중단시킴
    #[error("cluster unreachable: {0}")]
    Unreachable(String),

    /// API가 비정상 응답을 반환
    #[error("cluster api error: status {status}: {reason}")]
    ApiResponse { status: u16, reason: String },

    /// 응답 본문 해석 실패
    #[error("cluster response decode error: {0}")]
    Decode(String),
}

/// 스캔 실행 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// 이미 실행 중인 스캔이 있음 — 호출자는 폴링 후 재시도
    #[error("scan already running")]
    AlreadyRunning,

    /// 벽시계 상한 초과로 강제 실패
    #[error("scan exceeded timeout ceiling of {ceiling_secs}s")]
    Timeout { ceiling_secs: u64 },

    /// 내부 불변식 위반 등 복구 불가 에러
    #[error("internal scan error: {0}")]
    Internal(String),
}

/// 취약점 피드 에러
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// 피드 스냅샷 로딩 실패
    #[error("feed load error: {path}: {reason}")]
    Load { path: String, reason: String },

    /// 피드 레코드 파싱 실패
    #[error("feed parse error: {0}")]
    Parse(String),

    /// 단일 키 조회 실패 (타임아웃 포함) — 호출 측에서 흡수됨
    #[error("feed lookup failed for {image}: {reason}")]
    Lookup { image: String, reason: String },
}
