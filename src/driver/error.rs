//! Driver Error Types
//!
//! 드라이버 에러 타입
//!
//! 풀, 드라이버, 레지스트리에서 발생하는 오류입니다. 세션 수준의 오류는
//! [`BoltError`]로 그대로 전달됩니다.

use std::time::Duration;

use thiserror::Error;

use crate::bolt::BoltError;

// ============================================================================
// DriverError
// ============================================================================

/// 드라이버 에러
#[derive(Error, Debug)]
pub enum DriverError {
    /// 세션 에러
    #[error(transparent)]
    Bolt(#[from] BoltError),

    /// 풀 생성 중 세션 연결 실패
    #[error("Pool construction failed at session {index}: {source}")]
    PoolConstruction {
        index: usize,
        #[source]
        source: BoltError,
    },

    /// 획득 시 플레이스홀더 재연결 실패
    #[error("Session reinitialization failed: {0}")]
    Reinitialization(#[source] BoltError),

    /// 획득 타임아웃
    #[error("Timed out after {0:?} waiting for a pooled session")]
    AcquireTimeout(Duration),

    /// 풀 닫힘
    #[error("Pool is closed")]
    PoolClosed,

    /// 잘못된 설정 또는 연결 문자열
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 등록되지 않은 드라이버 이름
    #[error("Unknown driver: {0}")]
    UnknownDriver(String),
}

impl DriverError {
    /// 설정 에러 생성
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// FAILURE 응답에서 온 에러면 서버 에러 코드
    pub fn server_code(&self) -> Option<&str> {
        match self.bolt_error()? {
            BoltError::Server { code, .. } => Some(code),
            _ => None,
        }
    }

    /// 원인이 된 세션 에러
    pub fn bolt_error(&self) -> Option<&BoltError> {
        match self {
            Self::Bolt(e) | Self::Reinitialization(e) => Some(e),
            Self::PoolConstruction { source, .. } => Some(source),
            _ => None,
        }
    }

    /// 나중에 재시도하면 성공할 수 있는지 여부
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AcquireTimeout(_) | Self::Reinitialization(_) => true,
            Self::Bolt(BoltError::Server { code, .. }) => code.starts_with("Neo.TransientError"),
            _ => false,
        }
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// 드라이버 결과 타입
pub type DriverResult<T> = Result<T, DriverError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::HandshakeError;

    #[test]
    fn test_error_display() {
        let err = DriverError::configuration("bad uri");
        assert_eq!(err.to_string(), "Configuration error: bad uri");

        let err = DriverError::AcquireTimeout(Duration::from_millis(50));
        assert!(err.to_string().contains("50ms"));

        let err = DriverError::PoolConstruction {
            index: 1,
            source: HandshakeError::NoCompatibleVersion.into(),
        };
        assert!(err.to_string().contains("session 1"));
    }

    #[test]
    fn test_from_bolt_error() {
        let err: DriverError = BoltError::Server {
            code: "Neo.TransientError.General.DatabaseUnavailable".into(),
            message: "down".into(),
        }
        .into();
        assert_eq!(
            err.server_code(),
            Some("Neo.TransientError.General.DatabaseUnavailable")
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retryable() {
        assert!(DriverError::AcquireTimeout(Duration::from_secs(1)).is_retryable());
        assert!(!DriverError::PoolClosed.is_retryable());
        assert!(!DriverError::UnknownDriver("x".into()).is_retryable());
        assert!(!DriverError::from(BoltError::Defunct).is_retryable());
    }
}
