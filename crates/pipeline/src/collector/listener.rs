//! TCP 리스너
//!
//! 연결 수락 루프
//!
//! 연결마다 [`SessionHandler`]를 별도 태스크로 실행합니다.
//! `max_connections`가 0이면 동시 연결 수에 제한이 없습니다.
//! 수락 에러는 로그를 남기고 잠시 쉰 뒤 계속합니다. 쉬는 동안에도 취소 신호를 받습니다.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use verdict_relay_core::metrics as m;

use super::session::{SessionContext, SessionHandler};

// 수락 에러(EMFILE 등)가 연속될 때 루프가 바쁘게 돌지 않도록 쉬는 시간
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// TCP 연결 수락기
pub struct Listener {
    listener: Arc<TcpListener>,
    ctx: Arc<SessionContext>,
    sessions: TaskTracker,
    cancel: CancellationToken,
    connection_limit: Option<Arc<Semaphore>>,
}

impl Listener {
    /// 새 리스너를 생성합니다.
    ///
    /// 세션 태스크는 `sessions` 트래커에 등록되어 종료 시 함께 기다릴 수 있습니다.
    pub fn new(
        listener: Arc<TcpListener>,
        ctx: Arc<SessionContext>,
        sessions: TaskTracker,
        cancel: CancellationToken,
        max_connections: usize,
    ) -> Self {
        let connection_limit =
            (max_connections > 0).then(|| Arc::new(Semaphore::new(max_connections)));
        Self {
            listener,
            ctx,
            sessions,
            cancel,
            connection_limit,
        }
    }

    /// 취소될 때까지 연결을 수락합니다.
    pub async fn run(self) {
        match self.listener.local_addr() {
            Ok(addr) => info!(%addr, "listener accepting connections"),
            Err(e) => warn!(error = %e, "listener started without a local address"),
        }

        loop {
            let (stream, peer) = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("listener received shutdown signal");
                    break;
                }
                result = self.listener.accept() => match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        if backoff(&self.cancel, ACCEPT_ERROR_BACKOFF).await {
                            continue;
                        }
                        info!("listener received shutdown signal");
                        break;
                    }
                },
            };

            let permit = match &self.connection_limit {
                Some(limit) => match Arc::clone(limit).try_acquire_owned() {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        counter!(m::CONNECTIONS_REJECTED_TOTAL).increment(1);
                        warn!(%peer, "max connections reached, rejecting connection");
                        continue;
                    }
                },
                None => None,
            };

            counter!(m::CONNECTIONS_ACCEPTED_TOTAL).increment(1);
            debug!(%peer, "accepted connection");

            let session =
                SessionHandler::new(stream, peer, Arc::clone(&self.ctx), self.cancel.clone());
            self.sessions.spawn(async move {
                gauge!(m::CONNECTIONS_ACTIVE).increment(1.0);
                session.run().await;
                gauge!(m::CONNECTIONS_ACTIVE).decrement(1.0);
                drop(permit);
            });
        }
    }
}

/// `delay`만큼 쉽니다. 도중에 취소되면 `false`를 반환합니다.
async fn backoff(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use verdict_relay_core::config::DEFAULT_MARKER;
    use verdict_relay_core::event::AllowList;

    use crate::classifier::EventClassifier;
    use crate::queue::{EventQueue, QueuePolicy};
    use crate::worker::WorkerPool;

    fn verdict_line(id: &str) -> String {
        format!(
            r#"{DEFAULT_MARKER} {{"scan_id":"{id}","created":0,"entry_point_type":"A","result":{{"state":"S","verdict":{{"threat_level":"UNWANTED","threat":{{"classification":"C","family":"Agent","platform":"WINDOWS"}}}}}}}}"#
        )
    }

    fn context() -> Arc<SessionContext> {
        Arc::new(SessionContext {
            classifier: Arc::new(EventClassifier::new(
                DEFAULT_MARKER,
                AllowList::from_mode("UNWANTED"),
            )),
            pool: Arc::new(WorkerPool::new(4)),
            queue: Arc::new(EventQueue::new(64, QueuePolicy::DropOldest)),
            max_session_bytes: 10_240,
        })
    }

    async fn start(
        max_connections: usize,
    ) -> (
        std::net::SocketAddr,
        Arc<SessionContext>,
        TaskTracker,
        CancellationToken,
        tokio::task::JoinHandle<()>,
    ) {
        let socket = Arc::new(TcpListener::bind("127.0.0.1:0").await.unwrap());
        let addr = socket.local_addr().unwrap();
        let ctx = context();
        let sessions = TaskTracker::new();
        let cancel = CancellationToken::new();
        let listener = Listener::new(
            socket,
            Arc::clone(&ctx),
            sessions.clone(),
            cancel.clone(),
            max_connections,
        );
        let handle = tokio::spawn(listener.run());
        (addr, ctx, sessions, cancel, handle)
    }

    #[tokio::test]
    async fn concurrent_connections_feed_the_queue() {
        let (addr, ctx, sessions, cancel, handle) = start(0).await;

        let mut clients = Vec::new();
        for i in 0..5 {
            clients.push(tokio::spawn(async move {
                let mut s = TcpStream::connect(addr).await.unwrap();
                s.write_all(format!("{}\n", verdict_line(&i.to_string())).as_bytes())
                    .await
                    .unwrap();
            }));
        }
        for c in clients {
            c.await.unwrap();
        }

        // 모든 세션이 EOF를 처리할 때까지 대기
        while ctx.queue.len() < 5 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        cancel.cancel();
        handle.await.unwrap();
        sessions.close();
        sessions.wait().await;

        let mut ids: Vec<String> = ctx.queue.drain().into_iter().map(|e| e.scan_id).collect();
        ids.sort();
        assert_eq!(ids, ["0", "1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn cancel_stops_accept_loop_and_sessions() {
        let (addr, _ctx, sessions, cancel, handle) = start(0).await;
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"partial").await.unwrap();

        // 세션이 생길 때까지 대기
        while sessions.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        cancel.cancel();
        handle.await.unwrap();
        sessions.close();
        sessions.wait().await;

        // 서버가 소켓을 닫았으므로 EOF
        let mut buf = [0u8; 8];
        let n = client.read(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn backoff_is_cut_short_by_cancel() {
        let cancel = CancellationToken::new();
        assert!(backoff(&cancel, Duration::from_millis(1)).await);

        let waiter = {
            let cancel = cancel.clone();
            tokio::spawn(async move { backoff(&cancel, Duration::from_secs(3600)).await })
        };
        cancel.cancel();
        let resumed = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(!resumed);
    }

    #[tokio::test]
    async fn connection_limit_rejects_excess_clients() {
        let (addr, _ctx, sessions, cancel, handle) = start(1).await;

        let _first = TcpStream::connect(addr).await.unwrap();
        while sessions.len() < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // 두 번째 연결은 수락 직후 닫힘
        let mut second = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(Duration::from_secs(5), second.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);
        assert_eq!(sessions.len(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }
}
