//! verdict-relay 파이프라인
//!
//! TCP로 들어오는 스캔 판정 로그를 줄 단위로 프레이밍하고, 워커 풀에서 분류한 뒤,
//! 유한 큐를 거쳐 속도 제한된 알림으로 전송합니다.
//!
//! ```text
//! socket bytes → LineFramer → EventClassifier (WorkerPool) → EventQueue → Dispatcher → Notifier
//! ```
//!
//! 모든 구성 요소는 [`RelayServer`]가 소유하고, 종료는 [`ShutdownCoordinator`]가 조정합니다.

pub mod classifier;
pub mod collector;
pub mod dispatcher;
pub mod error;
pub mod format;
pub mod framer;
pub mod notifier;
pub mod queue;
pub mod server;
pub mod shutdown;
pub mod translate;
pub mod worker;

pub use classifier::{Classification, EventClassifier, Rejection};
pub use dispatcher::{DispatchStats, Dispatcher, RateWindow};
pub use error::{FramingError, VerdictPipelineError, WorkerPoolError};
pub use format::MessageFormatter;
pub use framer::{LineFramer, RawLine};
pub use notifier::TelegramNotifier;
pub use queue::{EventQueue, PushOutcome, QueuePolicy};
pub use server::{RelayServer, RelayServerBuilder};
pub use shutdown::{ShutdownCoordinator, ShutdownHandle, ShutdownOutcome, ShutdownState};
pub use translate::JsonTranslator;
pub use worker::WorkerPool;
