//! 취약점 피드 -- 로컬 JSON 스냅샷 로딩 및 HTTP 조회
//!
//! 피드는 외부에서 관리되는 데이터 소스이며 이 모듈은 조회만 합니다.
//! [`VulnFeed`] trait 뒤에 파일 구현([`FileVulnFeed`])과 HTTP
//! 구현([`HttpVulnFeed`])이 있고, 설정에 따라 [`FeedBackend`]로
//! 디스패치됩니다.
//!
//! # 스냅샷 디렉토리 구조
//!
//! ```text
//! /var/lib/kubeguard/feed/
//!   base-images.json
//!   internal.json
//! ```
//!
//! # JSON 형식
//!
//! ```json
//! [
//!   {
//!     "image": "app:1.0",
//!     "id": "CVE-2024-0001",
//!     "severity": "CRITICAL",
//!     "description": "Buffer overflow in...",
//!     "affected_components": ["openssl"],
//!     "fix_version": "1.1.1t",
//!     "published_date": "2024-01-15",
//!     "link": "https://nvd.nist.gov/vuln/detail/CVE-2024-0001",
//!     "attack_vector": "Network",
//!     "mitigation": "Upgrade to 1.1.1t"
//!   }
//! ]
//! ```
//!
//! `image` 값은 로딩 시점에 정규화되므로 `app:1.0`과
//! `docker.io/library/app:1.0`은 같은 키로 수렴합니다.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use kubeguard_core::config::FeedConfig;
use kubeguard_core::error::FeedError;
use kubeguard_core::types::{Severity, VulnerabilityFinding};

use crate::image::CanonicalImageKey;

/// 피드 스냅샷 파일 최대 크기 (50 MB)
const MAX_FEED_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// 전체 피드 엔트리 최대 개수
const MAX_FEED_ENTRIES: usize = 500_000;

/// 취약점 피드 조회 추상화
///
/// `Send + Sync + 'static`으로 async 컨텍스트 간 공유가 안전합니다.
/// 구현체는 단일 키 조회만 제공하며, 타임아웃과 동시성 제한은
/// 호출 측(`Correlator`)이 책임집니다.
pub trait VulnFeed: Send + Sync + 'static {
    /// 정규화된 이미지 키 하나에 대한 발견 항목을 조회합니다.
    ///
    /// 매칭이 없으면 빈 목록을 반환합니다. 에러는 해당 키의 조회
    /// 실패만을 의미하며 스캔 전체를 중단시키지 않습니다.
    fn lookup(
        &self,
        key: &CanonicalImageKey,
    ) -> impl Future<Output = Result<Vec<VulnerabilityFinding>, FeedError>> + Send;
}

/// 피드 엔트리 (wire 형식)
#[derive(Debug, Clone, Deserialize)]
struct FeedEntry {
    /// 영향받는 이미지 참조 (정규화 전)
    image: String,
    /// CVE ID
    id: String,
    /// 심각도 문자열 (인식 불가 시 UNKNOWN으로 강등)
    #[serde(default)]
    severity: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    affected_components: Vec<String>,
    #[serde(default)]
    fix_version: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    attack_vector: Option<String>,
    #[serde(default)]
    mitigation: Option<String>,
}

impl FeedEntry {
    fn into_finding(self) -> VulnerabilityFinding {
        VulnerabilityFinding {
            cve_id: self.id,
            severity: Severity::from_str_loose(&self.severity).unwrap_or(Severity::Unknown),
            description: self.description,
            affected_components: self.affected_components,
            fix_version: self.fix_version,
            published_date: self.published_date,
            link: self.link,
            attack_vector: self.attack_vector,
            mitigation: self.mitigation,
        }
    }
}

/// 로컬 JSON 스냅샷 피드
///
/// 디렉토리의 모든 `.json` 파일을 로드하고 정규화된 이미지 키로
/// 인덱싱합니다. 로드 후에는 불변입니다.
pub struct FileVulnFeed {
    findings: HashMap<String, Vec<VulnerabilityFinding>>,
}

impl FileVulnFeed {
    /// 빈 피드를 생성합니다 (테스트용).
    pub fn empty() -> Self {
        Self {
            findings: HashMap::new(),
        }
    }

    /// JSON 문자열에서 피드를 파싱합니다.
    pub fn from_json(json: &str) -> Result<Self, FeedError> {
        let entries: Vec<FeedEntry> =
            serde_json::from_str(json).map_err(|e| FeedError::Parse(e.to_string()))?;
        Ok(Self::from_entries(entries))
    }

    fn from_entries(entries: Vec<FeedEntry>) -> Self {
        let mut findings: HashMap<String, Vec<VulnerabilityFinding>> = HashMap::new();
        for entry in entries {
            let key = CanonicalImageKey::parse(&entry.image);
            if key.is_empty() {
                debug!(image = %entry.image, "skipping feed entry with unparseable image");
                continue;
            }
            findings
                .entry(key.to_string())
                .or_default()
                .push(entry.into_finding());
        }
        Self { findings }
    }

    /// 디렉토리에서 피드 스냅샷을 로드합니다.
    ///
    /// `.json` 확장자 파일만 읽으며, 다른 파일은 건너뜁니다.
    ///
    /// # 보안 제한
    ///
    /// - 파일당 최대 50MB (`MAX_FEED_FILE_SIZE`)
    /// - 전체 엔트리 최대 500,000개 (`MAX_FEED_ENTRIES`)
    ///
    /// # Note
    ///
    /// 이 함수는 동기 I/O를 수행합니다. async 컨텍스트에서 호출할 때는
    /// `tokio::task::spawn_blocking`으로 감싸세요.
    pub fn load_from_dir(dir_path: &Path) -> Result<Self, FeedError> {
        let dir = std::fs::read_dir(dir_path).map_err(|e| FeedError::Load {
            path: dir_path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut all_entries = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|e| FeedError::Load {
                path: dir_path.display().to_string(),
                reason: e.to_string(),
            })?;
            let file_path = entry.path();
            if file_path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let metadata = std::fs::metadata(&file_path).map_err(|e| FeedError::Load {
                path: file_path.display().to_string(),
                reason: e.to_string(),
            })?;
            if metadata.len() > MAX_FEED_FILE_SIZE {
                return Err(FeedError::Load {
                    path: file_path.display().to_string(),
                    reason: format!(
                        "file size {} bytes exceeds maximum {} bytes",
                        metadata.len(),
                        MAX_FEED_FILE_SIZE
                    ),
                });
            }

            let content = std::fs::read_to_string(&file_path).map_err(|e| FeedError::Load {
                path: file_path.display().to_string(),
                reason: e.to_string(),
            })?;
            let entries: Vec<FeedEntry> = serde_json::from_str(&content).map_err(|e| {
                FeedError::Load {
                    path: file_path.display().to_string(),
                    reason: format!("invalid feed JSON: {e}"),
                }
            })?;

            all_entries.extend(entries);
            if all_entries.len() > MAX_FEED_ENTRIES {
                return Err(FeedError::Load {
                    path: dir_path.display().to_string(),
                    reason: format!("entry count exceeds maximum {MAX_FEED_ENTRIES}"),
                });
            }
        }

        info!(
            path = %dir_path.display(),
            entries = all_entries.len(),
            "vulnerability feed snapshot loaded",
        );
        Ok(Self::from_entries(all_entries))
    }

    /// 인덱싱된 이미지 키 수를 반환합니다.
    pub fn image_count(&self) -> usize {
        self.findings.len()
    }
}

impl VulnFeed for FileVulnFeed {
    async fn lookup(
        &self,
        key: &CanonicalImageKey,
    ) -> Result<Vec<VulnerabilityFinding>, FeedError> {
        Ok(self
            .findings
            .get(&key.to_string())
            .cloned()
            .unwrap_or_default())
    }
}

/// HTTP 피드 서비스 조회
///
/// `GET {base_url}/vulnerabilities?image={canonical_key}`를 호출하며,
/// 응답 본문은 피드 엔트리와 같은 JSON 배열입니다 (단, `image` 필드는
/// 요청 키로 고정되어 있다고 가정하고 무시합니다).
#[derive(Debug, Clone)]
pub struct HttpVulnFeed {
    http: reqwest::Client,
    base_url: String,
}

impl HttpVulnFeed {
    /// 피드 서비스 URL로 클라이언트를 생성합니다.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| FeedError::Parse(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }
}

/// HTTP 피드 응답 항목 (`image` 필드 없는 축약 형식도 허용)
#[derive(Debug, Deserialize)]
struct HttpFeedEntry {
    id: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    affected_components: Vec<String>,
    #[serde(default)]
    fix_version: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    attack_vector: Option<String>,
    #[serde(default)]
    mitigation: Option<String>,
}

impl VulnFeed for HttpVulnFeed {
    async fn lookup(
        &self,
        key: &CanonicalImageKey,
    ) -> Result<Vec<VulnerabilityFinding>, FeedError> {
        let image = key.to_string();
        let url = format!("{}/vulnerabilities", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("image", image.as_str())])
            .send()
            .await
            .map_err(|e| FeedError::Lookup {
                image: image.clone(),
                reason: e.to_string(),
            })?;

        // 피드에 없는 이미지는 404로 응답할 수 있음
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(FeedError::Lookup {
                image,
                reason: format!("feed returned status {}", response.status()),
            });
        }

        let entries: Vec<HttpFeedEntry> =
            response.json().await.map_err(|e| FeedError::Lookup {
                image: image.clone(),
                reason: e.to_string(),
            })?;
        Ok(entries
            .into_iter()
            .map(|e| VulnerabilityFinding {
                cve_id: e.id,
                severity: Severity::from_str_loose(&e.severity).unwrap_or(Severity::Unknown),
                description: e.description,
                affected_components: e.affected_components,
                fix_version: e.fix_version,
                published_date: e.published_date,
                link: e.link,
                attack_vector: e.attack_vector,
                mitigation: e.mitigation,
            })
            .collect())
    }
}

/// 설정에 따라 선택되는 피드 백엔드
pub enum FeedBackend {
    /// 로컬 JSON 스냅샷
    File(FileVulnFeed),
    /// HTTP 피드 서비스
    Http(HttpVulnFeed),
}

impl FeedBackend {
    /// 통합 설정의 `[feed]` 섹션으로 백엔드를 생성합니다.
    ///
    /// file 모드에서는 스냅샷을 즉시 로드합니다.
    pub fn from_config(config: &FeedConfig) -> Result<Self, FeedError> {
        match config.mode.as_str() {
            "http" => Ok(Self::Http(HttpVulnFeed::new(
                &config.url,
                Duration::from_secs(config.lookup_timeout_secs),
            )?)),
            _ => Ok(Self::File(FileVulnFeed::load_from_dir(Path::new(
                &config.path,
            ))?)),
        }
    }
}

impl VulnFeed for FeedBackend {
    async fn lookup(
        &self,
        key: &CanonicalImageKey,
    ) -> Result<Vec<VulnerabilityFinding>, FeedError> {
        match self {
            Self::File(feed) => feed.lookup(key).await,
            Self::Http(feed) => feed.lookup(key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"[
        {
            "image": "app:1.0",
            "id": "CVE-2024-0001",
            "severity": "CRITICAL",
            "description": "Buffer overflow",
            "affected_components": ["openssl"],
            "fix_version": "1.1.1t"
        },
        {
            "image": "docker.io/library/app:1.0",
            "id": "CVE-2024-0002",
            "severity": "negligible",
            "description": "Unrecognized severity"
        },
        {
            "image": "ghcr.io/acme/api:2.0",
            "id": "CVE-2023-9999",
            "severity": "high",
            "description": "Path traversal"
        }
    ]"#;

    #[tokio::test]
    async fn short_and_canonical_spellings_share_a_key() {
        let feed = FileVulnFeed::from_json(SAMPLE_FEED).unwrap();
        // app:1.0과 docker.io/library/app:1.0이 같은 키로 수렴
        assert_eq!(feed.image_count(), 2);

        let key = CanonicalImageKey::parse("app:1.0");
        let findings = feed.lookup(&key).await.unwrap();
        assert_eq!(findings.len(), 2);
    }

    #[tokio::test]
    async fn unrecognized_severity_becomes_unknown() {
        let feed = FileVulnFeed::from_json(SAMPLE_FEED).unwrap();
        let key = CanonicalImageKey::parse("app:1.0");
        let findings = feed.lookup(&key).await.unwrap();
        let odd = findings.iter().find(|f| f.cve_id == "CVE-2024-0002").unwrap();
        assert_eq!(odd.severity, Severity::Unknown);
    }

    #[tokio::test]
    async fn unknown_image_has_no_findings() {
        let feed = FileVulnFeed::from_json(SAMPLE_FEED).unwrap();
        let key = CanonicalImageKey::parse("nginx:1.25");
        assert!(feed.lookup(&key).await.unwrap().is_empty());
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(FileVulnFeed::from_json("{not json").is_err());
    }

    #[tokio::test]
    async fn load_from_dir_reads_all_json_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("base.json"), SAMPLE_FEED).unwrap();
        std::fs::write(
            dir.path().join("extra.json"),
            r#"[{"image": "redis:7", "id": "CVE-2022-1111", "severity": "LOW"}]"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("readme.txt"), "not a feed").unwrap();

        let feed = FileVulnFeed::load_from_dir(dir.path()).unwrap();
        assert_eq!(feed.image_count(), 3);
        let key = CanonicalImageKey::parse("redis:7");
        assert_eq!(feed.lookup(&key).await.unwrap().len(), 1);
    }

    #[test]
    fn load_from_missing_dir_is_error() {
        let result = FileVulnFeed::load_from_dir(Path::new("/nonexistent/feed"));
        assert!(matches!(result, Err(FeedError::Load { .. })));
    }

    #[test]
    fn invalid_feed_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{oops").unwrap();
        match FileVulnFeed::load_from_dir(dir.path()) {
            Err(FeedError::Load { path, .. }) => assert!(path.contains("broken.json")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected load error"),
        }
    }
}
