//! verdict-relay 핵심 타입
//!
//! 스캔 판정 이벤트, 설정, 에러, 그리고 파이프라인 확장 포인트(trait)를 정의합니다.
//! 네트워크/런타임 코드는 `verdict-relay-pipeline` 크레이트에 있습니다.

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, PipelineError, RelayError, SendError};

// 설정
pub use config::RelayConfig;

// 이벤트
pub use event::{AllowList, FilterMode, ScanVerdictEvent, ThreatLevel};

// 파이프라인 trait
pub use pipeline::{DynNotifier, Notification, Notifier, TranslationCategory, Translator};
