//! Mod Manifest - mod 메타데이터 정의
//!
//! 매니페스트는 외부 발견 단계(파일 스캔/역직렬화)가 만들어 넘겨주며,
//! 발견 이후에는 불변입니다.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mod 버전
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ModVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// 버전 문자열 파싱 (예: "1.2.3")
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return None;
        }

        Some(Self {
            major: parts[0].parse().ok()?,
            minor: parts[1].parse().ok()?,
            patch: parts[2].parse().ok()?,
        })
    }

    /// 호환성 검사
    pub fn is_compatible_with(&self, other: &ModVersion) -> bool {
        // 같은 메이저 버전이면 호환
        self.major == other.major
    }
}

impl std::fmt::Display for ModVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Default for ModVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

/// Mod 의존성 - 다른 mod id에 대한 하드 의존
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModDependency {
    /// 의존하는 mod id
    pub id: String,
}

impl ModDependency {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Mod 매니페스트 - mod의 모든 메타데이터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModManifest {
    /// 고유 mod id (예: "weather.storms")
    pub id: String,

    /// 표시 이름
    pub name: String,

    /// 버전
    pub version: ModVersion,

    /// 설명
    pub description: String,

    /// 작성자
    pub author: Option<String>,

    /// 의존성 목록 (이 mod보다 먼저 활성화되어야 함)
    pub dependencies: Vec<ModDependency>,

    /// 추가 메타데이터
    pub metadata: HashMap<String, String>,
}

impl ModManifest {
    /// 새 매니페스트 생성
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: ModVersion::default(),
            description: String::new(),
            author: None,
            dependencies: vec![],
            metadata: HashMap::new(),
        }
    }

    /// 빌더 패턴: 버전 설정
    pub fn with_version(mut self, version: ModVersion) -> Self {
        self.version = version;
        self
    }

    /// 빌더 패턴: 설명 설정
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// 빌더 패턴: 작성자 설정
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// 빌더 패턴: 의존성 추가
    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(ModDependency::new(id));
        self
    }

    /// 빌더 패턴: 메타데이터 추가
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// 의존성 id 순회
    pub fn dependency_ids(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|d| d.id.as_str())
    }
}
