//! 스캔 엔진 에러 타입

use kubeguard_core::error::{FeedError, KubeguardError, ScanError};
use kubeguard_inventory::InventoryError;

/// 스캔 엔진 에러
///
/// 파이프라인을 중단시키는 에러만 담습니다. 키 단위 피드 타임아웃 등
/// 부분 실패는 결과에 기록되고 여기로 오지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum ScanEngineError {
    /// 인벤토리 조회 실패 (클러스터 도달 불가 등)
    #[error("inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// 피드 구성/로딩 실패
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// 상태 기계 에러
    #[error("scan state error: {0}")]
    State(#[from] ScanError),
}

impl From<ScanEngineError> for KubeguardError {
    fn from(err: ScanEngineError) -> Self {
        match err {
            ScanEngineError::Inventory(e) => e.into(),
            ScanEngineError::Feed(e) => KubeguardError::Feed(e),
            ScanEngineError::State(e) => KubeguardError::Scan(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_error_maps_to_cluster() {
        let err: ScanEngineError =
            InventoryError::Unreachable("connection refused".to_owned()).into();
        let top: KubeguardError = err.into();
        assert!(matches!(top, KubeguardError::Cluster(_)));
    }

    #[test]
    fn state_error_maps_to_scan() {
        let err: ScanEngineError = ScanError::AlreadyRunning.into();
        let top: KubeguardError = err.into();
        assert!(matches!(top, KubeguardError::Scan(ScanError::AlreadyRunning)));
    }
}
