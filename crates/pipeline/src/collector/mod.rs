//! TCP 수집 모듈 -- 연결 수락과 연결별 세션 처리
//!
//! # 구성
//! - [`Listener`]: 수락 루프, 연결마다 세션 태스크 생성
//! - [`SessionHandler`]: 연결 하나의 바이트 스트림 → 프레이밍 → 분류 → 큐
//!
//! 모든 세션은 [`SessionContext`]를 공유합니다.

pub mod listener;
pub mod session;

pub use listener::Listener;
pub use session::{SessionContext, SessionEnd, SessionHandler};
