//! 인벤토리 에러 타입

use kubeguard_core::error::{ClusterError, ConfigError, KubeguardError};

/// 인벤토리 모듈 에러
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// API 엔드포인트 도달 불가 (연결 거부, DNS 실패, 요청 타임아웃)
    #[error("cluster unreachable: {0}")]
    Unreachable(String),

    /// API가 비정상 상태 코드를 반환
    #[error("cluster api returned status {status}: {reason}")]
    ApiResponse { status: u16, reason: String },

    /// 응답 본문 해석 실패
    #[error("failed to decode cluster response: {0}")]
    Decode(String),

    /// 클라이언트 구성 실패 (잘못된 URL, TLS 설정 등)
    #[error("invalid cluster client configuration: {0}")]
    Config(String),
}

impl From<InventoryError> for KubeguardError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::Unreachable(reason) => {
                KubeguardError::Cluster(ClusterError::Unreachable(reason))
            }
            InventoryError::ApiResponse { status, reason } => {
                KubeguardError::Cluster(ClusterError::ApiResponse { status, reason })
            }
            InventoryError::Decode(reason) => {
                KubeguardError::Cluster(ClusterError::Decode(reason))
            }
            InventoryError::Config(reason) => KubeguardError::Config(ConfigError::InvalidValue {
                field: "cluster".to_owned(),
                reason,
            }),
        }
    }
}

impl From<reqwest::Error> for InventoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::ApiResponse {
                status: status.as_u16(),
                reason: err.to_string(),
            }
        } else {
            // 연결/타임아웃/빌드 에러는 전부 도달 불가로 취급
            Self::Unreachable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_maps_to_cluster_error() {
        let err: KubeguardError =
            InventoryError::Unreachable("connection refused".to_owned()).into();
        assert!(matches!(
            err,
            KubeguardError::Cluster(ClusterError::Unreachable(_)),
        ));
    }

    #[test]
    fn api_response_keeps_status() {
        let err: KubeguardError = InventoryError::ApiResponse {
            status: 403,
            reason: "forbidden".to_owned(),
        }
        .into();
        match err {
            KubeguardError::Cluster(ClusterError::ApiResponse { status, .. }) => {
                assert_eq!(status, 403);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn config_maps_to_config_error() {
        let err: KubeguardError = InventoryError::Config("bad url".to_owned()).into();
        assert!(matches!(err, KubeguardError::Config(_)));
    }
}
