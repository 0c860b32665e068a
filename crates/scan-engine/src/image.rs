//! 이미지 참조 해석기 — 정규화된 상관분석 키 생성
//!
//! 컨테이너 이미지 참조 문자열을 표준 문법대로 해석해 결정적인
//! [`CanonicalImageKey`]를 만듭니다. 네트워크 접근 없이 순수 함수로만
//! 동작합니다.
//!
//! 해석 규칙:
//! - 레지스트리 생략 시 `docker.io`
//! - `docker.io`의 단일 세그먼트 리포지토리는 `library/` 접두
//! - 태그 생략 시 `latest`
//! - 다이제스트(`@sha256:...`)가 있으면 태그보다 우선

use std::fmt;

/// 태그 또는 다이제스트 참조
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageReference {
    /// 태그 참조 (예: `1.25`, `latest`)
    Tag(String),
    /// 다이제스트 참조 (예: `sha256:abcd...`)
    Digest(String),
}

/// 정규화된 이미지 키
///
/// 동일한 이미지를 가리키는 서로 다른 표기가 같은 키로 수렴합니다.
/// `Display` 출력이 상관분석 캐시의 키 문자열입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalImageKey {
    /// 레지스트리 호스트 (예: `docker.io`, `ghcr.io`)
    pub registry: String,
    /// 리포지토리 경로 (예: `library/nginx`, `acme/api`)
    pub repository: String,
    /// 태그 또는 다이제스트
    pub reference: ImageReference,
}

impl CanonicalImageKey {
    /// 원본 이미지 참조 문자열을 해석합니다.
    ///
    /// 어떤 입력에도 실패하지 않습니다. 비정상 입력은 빈 리포지토리로
    /// 수렴하며 호출자가 [`CanonicalImageKey::is_empty`]로 걸러냅니다.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        // 다이제스트가 태그보다 우선
        let (body, digest) = match raw.split_once('@') {
            Some((body, digest)) => (body, Some(digest.to_owned())),
            None => (raw, None),
        };

        // 태그는 마지막 세그먼트의 콜론 뒤에만 올 수 있음
        let (path, tag) = match body.rsplit_once(':') {
            Some((path, tag)) if !tag.contains('/') => (path, Some(tag.to_owned())),
            _ => (body, None),
        };

        // 첫 세그먼트에 '.'이나 ':'가 있거나 localhost면 레지스트리
        let (registry, mut repository) = match path.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_owned(), rest.to_owned())
            }
            _ => ("docker.io".to_owned(), path.to_owned()),
        };

        if registry == "docker.io" && !repository.is_empty() && !repository.contains('/') {
            repository = format!("library/{repository}");
        }

        let reference = match digest {
            Some(digest) => ImageReference::Digest(digest),
            None => ImageReference::Tag(tag.unwrap_or_else(|| "latest".to_owned())),
        };

        Self {
            registry,
            repository,
            reference,
        }
    }

    /// 리포지토리가 비어 있으면 true (해석 불가능한 입력).
    pub fn is_empty(&self) -> bool {
        self.repository.is_empty()
    }

    /// 레지스트리와 `library/` 접두를 제외한 짧은 표기를 반환합니다.
    pub fn short_form(&self) -> String {
        let repository = self
            .repository
            .strip_prefix("library/")
            .unwrap_or(&self.repository);
        match &self.reference {
            ImageReference::Tag(tag) => format!("{repository}:{tag}"),
            ImageReference::Digest(digest) => format!("{repository}@{digest}"),
        }
    }
}

impl fmt::Display for CanonicalImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            ImageReference::Tag(tag) => {
                write!(f, "{}/{}:{}", self.registry, self.repository, tag)
            }
            ImageReference::Digest(digest) => {
                write!(f, "{}/{}@{}", self.registry, self.repository, digest)
            }
        }
    }
}
