//! 파이프라인 에러 타입
//!
//! [`VerdictPipelineError`]는 수집/분류/전송 파이프라인 내부 에러를 표현합니다.
//! `From<VerdictPipelineError> for RelayError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use verdict_relay_core::error::{ConfigError, PipelineError, RelayError, SendError};

/// 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum VerdictPipelineError {
    /// 세션 버퍼 한도 초과
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// 번역 테이블 로딩 실패
    #[error("translation load error: {path}: {reason}")]
    TranslationLoad {
        /// 테이블 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 워커 풀 에러
    #[error(transparent)]
    Worker(#[from] WorkerPoolError),

    /// 리스닝 소켓 바인드 실패
    #[error("failed to bind {addr}: {reason}")]
    Bind {
        /// 바인드 주소
        addr: String,
        /// 실패 사유
        reason: String,
    },

    /// 서버가 이미 시작됨
    #[error("relay server already running")]
    AlreadyRunning,

    /// 알림 전송 실패
    #[error(transparent)]
    Send(#[from] SendError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 줄 프레이밍 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    /// 한 줄이 세션 버퍼 한도를 넘음
    #[error("line exceeds session limit: {buffered} bytes buffered, limit {limit}")]
    Overflow {
        /// 버퍼에 쌓인 바이트 수
        buffered: usize,
        /// 한도
        limit: usize,
    },
}

/// 워커 풀 에러
#[derive(Debug, thiserror::Error)]
pub enum WorkerPoolError {
    /// 풀이 종료되어 새 작업을 받지 않음
    #[error("worker pool is shut down")]
    Closed,

    /// 작업이 패닉 또는 취소로 끝남
    #[error("worker task failed: {0}")]
    TaskFailed(String),
}

impl From<VerdictPipelineError> for RelayError {
    fn from(err: VerdictPipelineError) -> Self {
        match err {
            VerdictPipelineError::Bind { addr, reason } => {
                RelayError::Pipeline(PipelineError::Bind { addr, reason })
            }
            VerdictPipelineError::Config { field, reason } => {
                RelayError::Config(ConfigError::InvalidValue { field, reason })
            }
            VerdictPipelineError::AlreadyRunning => {
                RelayError::Pipeline(PipelineError::AlreadyRunning)
            }
            VerdictPipelineError::Worker(WorkerPoolError::Closed) => {
                RelayError::Pipeline(PipelineError::WorkerPoolClosed)
            }
            VerdictPipelineError::Send(e) => RelayError::Send(e),
            VerdictPipelineError::Io(e) => RelayError::Io(e),
            other => RelayError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
