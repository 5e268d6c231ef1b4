//! 에러 타입
//!
//! 도메인별 에러 정의
//!
//! 줄 단위 거부(마커 불일치, 심각도 필터링, 페이로드 손상)는 에러가 아니라
//! 분류 결과로 표현되며, 여기에는 작업 단위를 중단시키는 실패만 정의합니다.

/// verdict-relay 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 알림 전송 에러
    #[error("send error: {0}")]
    Send(#[from] SendError),

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

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 리스닝 소켓 바인드 실패 (시작 시 유일한 치명적 에러)
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 워커 풀이 이미 종료됨
    #[error("worker pool is shut down")]
    WorkerPoolClosed,
}

/// 알림 전송 에러
///
/// 전송 실패는 로그로 남기고 해당 이벤트를 버립니다 (재시도 없음).
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// 네트워크/전송 계층 실패
    #[error("transport failure: {0}")]
    Transport(String),

    /// 싱크가 요청을 거부함
    #[error("rejected by sink (status {status}): {description}")]
    Rejected { status: u16, description: String },

    /// 응답 본문을 해석할 수 없음
    #[error("invalid sink response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_address() {
        let err = PipelineError::Bind {
            addr: "0.0.0.0:514".to_owned(),
            reason: "permission denied".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("0.0.0.0:514"));
        assert!(msg.contains("permission denied"));
    }

    #[test]
    fn send_error_converts_to_relay_error() {
        let err = SendError::Rejected {
            status: 429,
            description: "Too Many Requests".to_owned(),
        };
        let relay: RelayError = err.into();
        assert!(matches!(relay, RelayError::Send(SendError::Rejected { status: 429, .. })));
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "dispatch.messages_per_minute".to_owned(),
            reason: "must be at least 1".to_owned(),
        };
        assert!(err.to_string().contains("dispatch.messages_per_minute"));
    }
}
