//! 종료 조정자
//!
//! 한 번만 실행되는 정리 시퀀스
//!
//! 상태: `Idle → ShuttingDown → Stopped`. `ShuttingDown`에는 한 번만 진입하며
//! 두 번째 요청은 아무것도 하지 않습니다.
//!
//! # 종료 순서
//! 1. 취소 토큰 발행 (리스너, 모든 세션, 디스패처)
//! 2. 큐 닫기 (대기 중인 생산자 해제)
//! 3. 추적 중인 태스크가 모두 끝날 때까지 대기 (세션은 남은 조각을 분류하고 끝남)
//! 4. 워커 풀 종료 (실행 중인 분류 작업 완료 대기)
//! 5. 리스닝 소켓 닫기
//! 6. 전달되지 못한 이벤트 집계

use std::sync::{Arc, Mutex, PoisonError};

use metrics::counter;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use verdict_relay_core::event::ScanVerdictEvent;
use verdict_relay_core::metrics as m;

use crate::queue::EventQueue;
use crate::worker::WorkerPool;

/// 종료 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// 실행 중 (종료 요청 전)
    Idle,
    /// 종료 진행 중
    ShuttingDown,
    /// 종료 완료
    Stopped,
}

/// `shutdown()` 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// 이 호출이 종료 시퀀스를 수행함
    Completed {
        /// 큐에 남아 버려진 이벤트 수
        undelivered: usize,
    },
    /// 이미 다른 호출이 종료를 시작함
    AlreadyTriggered,
}

/// 종료 요청 핸들
///
/// 시그널 태스크 등 외부에서 복제해 사용합니다. 여러 번 요청해도 종료는 한 번입니다.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    requested: CancellationToken,
    state: watch::Receiver<ShutdownState>,
}

impl ShutdownHandle {
    /// 종료를 요청합니다.
    pub fn request(&self) {
        if self.requested.is_cancelled() {
            debug!("shutdown already requested");
            return;
        }
        info!("shutdown requested");
        self.requested.cancel();
    }

    /// 종료가 요청되었는지 확인합니다.
    pub fn is_requested(&self) -> bool {
        self.requested.is_cancelled()
    }

    /// 현재 상태
    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// 종료가 끝날 때까지 기다립니다.
    pub async fn wait_stopped(&self) {
        let mut state = self.state.clone();
        // 송신측이 사라지면 더 이상 상태가 바뀌지 않음
        let _ = state.wait_for(|s| *s == ShutdownState::Stopped).await;
    }
}

/// 파이프라인 종료 조정자
pub struct ShutdownCoordinator {
    state: watch::Sender<ShutdownState>,
    requested: CancellationToken,
    cancel: CancellationToken,
    tasks: TaskTracker,
    pool: Arc<WorkerPool>,
    queue: Arc<EventQueue<ScanVerdictEvent>>,
    listener: Mutex<Option<Arc<TcpListener>>>,
}

impl ShutdownCoordinator {
    /// 새 조정자를 생성합니다.
    ///
    /// `cancel`은 파이프라인 태스크가 관찰하는 토큰이고, `tasks`는 그 태스크들의 트래커입니다.
    pub fn new(
        cancel: CancellationToken,
        tasks: TaskTracker,
        pool: Arc<WorkerPool>,
        queue: Arc<EventQueue<ScanVerdictEvent>>,
    ) -> Self {
        let (state, _) = watch::channel(ShutdownState::Idle);
        Self {
            state,
            requested: CancellationToken::new(),
            cancel,
            tasks,
            pool,
            queue,
            listener: Mutex::new(None),
        }
    }

    /// 종료 시 닫을 리스닝 소켓을 등록합니다.
    pub fn with_listener(self, listener: Arc<TcpListener>) -> Self {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(listener);
        self
    }

    /// 외부에서 사용할 종료 핸들
    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            requested: self.requested.clone(),
            state: self.state.subscribe(),
        }
    }

    /// 현재 상태
    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// 종료 요청이 들어올 때까지 기다립니다.
    pub async fn wait_requested(&self) {
        self.requested.cancelled().await;
    }

    /// 종료 시퀀스를 실행합니다. 두 번째 호출부터는 아무것도 하지 않습니다.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        let mut entered = false;
        self.state.send_if_modified(|state| {
            if *state == ShutdownState::Idle {
                *state = ShutdownState::ShuttingDown;
                entered = true;
                true
            } else {
                false
            }
        });
        if !entered {
            debug!("shutdown already triggered, ignoring");
            return ShutdownOutcome::AlreadyTriggered;
        }

        info!(tasks = self.tasks.len(), "shutting down pipeline");
        self.requested.cancel();
        self.cancel.cancel();
        self.queue.close();

        self.tasks.close();
        self.tasks.wait().await;
        debug!("all pipeline tasks finished");

        self.pool.shutdown().await;

        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            drop(listener);
            info!("listening socket closed");
        }

        let undelivered = self.queue.drain().len();
        if undelivered > 0 {
            counter!(m::EVENTS_UNDELIVERED_TOTAL).increment(undelivered as u64);
            warn!(count = undelivered, "discarding undelivered events");
        }

        self.state.send_replace(ShutdownState::Stopped);
        info!("shutdown complete");
        ShutdownOutcome::Completed { undelivered }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use verdict_relay_core::event::ThreatLevel;

    use crate::queue::QueuePolicy;

    fn event(id: &str) -> ScanVerdictEvent {
        ScanVerdictEvent {
            scan_id: id.to_owned(),
            entry_point_type: "A".to_owned(),
            created: 0.0,
            state: "S".to_owned(),
            threat_level: ThreatLevel::Unknown,
            classification: "C".to_owned(),
            family: None,
            platform: None,
        }
    }

    fn coordinator() -> (ShutdownCoordinator, CancellationToken, TaskTracker, Arc<WorkerPool>) {
        let cancel = CancellationToken::new();
        let tasks = TaskTracker::new();
        let pool = Arc::new(WorkerPool::new(2));
        let queue = Arc::new(EventQueue::new(8, QueuePolicy::DropOldest));
        let coordinator =
            ShutdownCoordinator::new(cancel.clone(), tasks.clone(), Arc::clone(&pool), queue);
        (coordinator, cancel, tasks, pool)
    }

    #[tokio::test]
    async fn state_transitions_once() {
        let (coordinator, cancel, _tasks, pool) = coordinator();
        let handle = coordinator.handle();
        assert_eq!(coordinator.state(), ShutdownState::Idle);

        let outcome = coordinator.shutdown().await;
        assert_eq!(outcome, ShutdownOutcome::Completed { undelivered: 0 });
        assert_eq!(handle.state(), ShutdownState::Stopped);
        assert!(cancel.is_cancelled());
        assert!(pool.is_closed());

        assert_eq!(
            coordinator.shutdown().await,
            ShutdownOutcome::AlreadyTriggered
        );
    }

    #[tokio::test]
    async fn concurrent_triggers_run_one_sequence() {
        let (coordinator, _cancel, _tasks, pool) = coordinator();
        let (a, b) = tokio::join!(coordinator.shutdown(), coordinator.shutdown());
        let completed = [a, b]
            .iter()
            .filter(|o| matches!(o, ShutdownOutcome::Completed { .. }))
            .count();
        assert_eq!(completed, 1);
        // 풀은 이미 종료됨
        assert!(!pool.shutdown().await);
    }

    #[tokio::test]
    async fn waits_for_tracked_tasks() {
        let (coordinator, cancel, tasks, _pool) = coordinator();
        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));
        {
            let finished = Arc::clone(&finished);
            tasks.spawn(async move {
                cancel.cancelled().await;
                tokio::time::sleep(Duration::from_millis(20)).await;
                finished.store(true, std::sync::atomic::Ordering::SeqCst);
            });
        }
        coordinator.shutdown().await;
        assert!(finished.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn closes_listening_socket() {
        let listener = Arc::new(TcpListener::bind("127.0.0.1:0").await.unwrap());
        let addr = listener.local_addr().unwrap();
        let (coordinator, _cancel, _tasks, _pool) = coordinator();
        let coordinator = coordinator.with_listener(listener);

        coordinator.shutdown().await;
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn counts_undelivered_events() {
        let cancel = CancellationToken::new();
        let queue = Arc::new(EventQueue::new(8, QueuePolicy::DropOldest));
        queue.push(event("a")).await;
        queue.push(event("b")).await;
        let coordinator = ShutdownCoordinator::new(
            cancel,
            TaskTracker::new(),
            Arc::new(WorkerPool::new(1)),
            Arc::clone(&queue),
        );
        assert_eq!(
            coordinator.shutdown().await,
            ShutdownOutcome::Completed { undelivered: 2 }
        );
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn handle_request_is_idempotent() {
        let (coordinator, _cancel, _tasks, _pool) = coordinator();
        let handle = coordinator.handle();
        handle.request();
        handle.request();
        assert!(handle.is_requested());
        coordinator.wait_requested().await;

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait_stopped().await })
        };
        coordinator.shutdown().await;
        waiter.await.unwrap();
    }
}
