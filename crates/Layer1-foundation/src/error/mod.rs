//! Error types for ModKit
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// ModKit 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 이벤트 관련
    // ========================================================================
    #[error("Event error: {0}")]
    Event(String),

    // ========================================================================
    // Mod 관련
    // ========================================================================
    #[error("Mod error: {0}")]
    Mod(String),

    #[error("Mod not found: {0}")]
    ModNotFound(String),

    #[error("Mod load failed: {id} - {message}")]
    ModLoad { id: String, message: String },

    // ========================================================================
    // 의존성 관련
    // ========================================================================
    #[error("Dependency resolution failed: {0}")]
    Dependency(String),

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 배치 전체를 중단시키는 에러인지 확인
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Error::Dependency(_))
    }

    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::Dependency(_)
                | Error::ModNotFound(_)
                | Error::NotFound(_)
                | Error::InvalidInput(_)
        )
    }

    /// Mod 로드 에러 생성 헬퍼
    pub fn mod_load(id: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ModLoad {
            id: id.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
