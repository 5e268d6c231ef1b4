//! 분류 워커 풀
//!
//! 네트워크 경로 밖에서 CPU 작업 실행
//!
//! [`WorkerPool`]은 세마포어로 동시 실행 수를 고정 크기로 제한하고,
//! 각 작업을 `spawn_blocking`으로 블로킹 스레드에서 실행합니다.
//! [`TaskTracker`]로 실행 중인 작업을 추적하여 종료 시 모두 끝날 때까지 기다립니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::error::WorkerPoolError;

/// 고정 크기 워커 풀
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    size: usize,
    closed: AtomicBool,
}

impl WorkerPool {
    /// `size`개의 워커를 가진 풀을 생성합니다. 0은 1로 취급합니다.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            tracker: TaskTracker::new(),
            size,
            closed: AtomicBool::new(false),
        }
    }

    /// 작업을 워커에서 실행하고 결과를 기다립니다.
    ///
    /// 모든 워커가 바쁘면 자리가 날 때까지 대기합니다.
    /// 풀이 종료된 뒤에는 [`WorkerPoolError::Closed`]를 반환합니다.
    pub async fn execute<F, R>(&self, job: F) -> Result<R, WorkerPoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| WorkerPoolError::Closed)?;

        let handle = self.tracker.spawn_blocking(move || {
            let _permit = permit;
            job()
        });

        handle
            .await
            .map_err(|e| WorkerPoolError::TaskFailed(e.to_string()))
    }

    /// 워커 수
    pub fn size(&self) -> usize {
        self.size
    }

    /// 현재 실행 중인 작업 수
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// 풀이 종료되었는지 확인합니다.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 새 작업 접수를 멈추고 실행 중인 작업이 끝날 때까지 기다립니다.
    ///
    /// 처음 호출한 경우에만 `true`를 반환합니다. 이후 호출은 아무것도 하지 않습니다.
    pub async fn shutdown(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("worker pool already shut down");
            return false;
        }

        self.permits.close();
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!(pending, "waiting for in-flight classification jobs");
        }
        self.tracker.wait().await;
        info!(workers = self.size, "worker pool shut down");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn execute_returns_job_result() {
        let pool = WorkerPool::new(2);
        let result = pool.execute(|| 21 * 2).await.unwrap();
        assert_eq!(result, 42);
        assert_eq!(pool.size(), 2);
    }

    #[tokio::test]
    async fn zero_size_is_clamped() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.execute(|| "ok").await.unwrap(), "ok");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_is_bounded_by_size() {
        let pool = Arc::new(WorkerPool::new(2));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                pool.execute(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn shutdown_rejects_new_jobs() {
        let pool = WorkerPool::new(1);
        assert!(pool.shutdown().await);
        assert!(pool.is_closed());
        assert!(matches!(
            pool.execute(|| ()).await,
            Err(WorkerPoolError::Closed)
        ));
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let pool = WorkerPool::new(1);
        assert!(pool.shutdown().await);
        assert!(!pool.shutdown().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_waits_for_in_flight_jobs() {
        let pool = Arc::new(WorkerPool::new(1));
        let done = Arc::new(AtomicBool::new(false));

        let job = {
            let pool = Arc::clone(&pool);
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                pool.execute(move || {
                    std::thread::sleep(Duration::from_millis(50));
                    done.store(true, Ordering::SeqCst);
                })
                .await
            })
        };

        // 작업이 시작될 때까지 대기
        while pool.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        pool.shutdown().await;
        assert!(done.load(Ordering::SeqCst));
        job.await.unwrap().unwrap();
    }
}
