//! 세션 핸들러
//!
//! 연결 하나의 바이트 스트림을 이벤트로 변환
//!
//! 읽은 바이트를 [`LineFramer`]에 넣고, 완성된 줄마다 워커 풀에서 분류를 실행한 뒤
//! 수락된 이벤트를 큐에 넣습니다. 한 줄의 분류가 끝나야 다음 줄을 제출하므로
//! 같은 연결의 이벤트는 프레이밍 순서대로 큐에 들어갑니다.
//!
//! 피어 종료, 읽기 에러, 취소 시 소켓을 닫고 남은 조각을 분류합니다.
//! 세션 버퍼 한도를 넘으면 남은 조각은 버리고 연결을 닫습니다.

use std::net::SocketAddr;
use std::sync::Arc;

use metrics::counter;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use verdict_relay_core::event::ScanVerdictEvent;
use verdict_relay_core::metrics as m;

use crate::classifier::{Classification, EventClassifier};
use crate::framer::{LineFramer, RawLine};
use crate::queue::{EventQueue, PushOutcome};
use crate::worker::WorkerPool;

const READ_CHUNK: usize = 4096;

/// 모든 세션이 공유하는 파이프라인 구성 요소
pub struct SessionContext {
    /// 분류기
    pub classifier: Arc<EventClassifier>,
    /// 분류 워커 풀
    pub pool: Arc<WorkerPool>,
    /// 이벤트 큐
    pub queue: Arc<EventQueue<ScanVerdictEvent>>,
    /// 세션당 한 줄 한도 (바이트)
    pub max_session_bytes: usize,
}

/// 세션 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// 피어가 연결을 닫음
    PeerClosed,
    /// 읽기 에러
    ReadError,
    /// 종료 신호
    Cancelled,
    /// 세션 버퍼 한도 초과
    Overflow,
}

/// 연결 하나를 소유하는 세션
pub struct SessionHandler {
    stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<SessionContext>,
    cancel: CancellationToken,
}

impl SessionHandler {
    /// 새 세션을 생성합니다.
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        ctx: Arc<SessionContext>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stream,
            peer,
            ctx,
            cancel,
        }
    }

    /// 연결이 끝날 때까지 처리합니다.
    pub async fn run(self) -> SessionEnd {
        let Self {
            mut stream,
            peer,
            ctx,
            cancel,
        } = self;

        let mut framer = LineFramer::new(ctx.max_session_bytes, format!("tcp:{peer}"));
        let mut buf = vec![0u8; READ_CHUNK];
        let mut lines = Vec::new();

        let end = loop {
            let n = tokio::select! {
                biased;
                _ = cancel.cancelled() => break SessionEnd::Cancelled,
                result = stream.read(&mut buf) => match result {
                    Ok(0) => break SessionEnd::PeerClosed,
                    Ok(n) => n,
                    Err(e) => {
                        warn!(%peer, error = %e, "read error, closing session");
                        break SessionEnd::ReadError;
                    }
                },
            };

            let framed = framer.feed(&buf[..n], &mut lines);
            for line in lines.drain(..) {
                process_line(&ctx, line).await;
            }

            if let Err(e) = framed {
                counter!(m::FRAMING_OVERFLOWS_TOTAL).increment(1);
                warn!(%peer, error = %e, "session buffer overflow, closing connection");
                break SessionEnd::Overflow;
            }
        };

        drop(stream);
        debug!(%peer, end = ?end, "session closed");

        if end != SessionEnd::Overflow {
            if let Some(tail) = framer.flush() {
                debug!(%peer, bytes = tail.data.len(), "classifying trailing fragment");
                process_line(&ctx, tail).await;
            }
        }

        end
    }
}

async fn process_line(ctx: &SessionContext, line: RawLine) {
    counter!(m::LINES_FRAMED_TOTAL).increment(1);

    let classifier = Arc::clone(&ctx.classifier);
    let source = line.source.clone();
    let classification = match ctx.pool.execute(move || classifier.classify(&line)).await {
        Ok(c) => c,
        Err(e) => {
            warn!(source = source.as_str(), error = %e, "classification unavailable, line dropped");
            return;
        }
    };

    match classification {
        Classification::Accepted(event) => {
            counter!(m::EVENTS_ACCEPTED_TOTAL).increment(1);
            debug!(scan_id = event.scan_id.as_str(), level = %event.threat_level, "event accepted");
            if ctx.queue.push(event).await == PushOutcome::Closed {
                warn!(source = source.as_str(), "queue closed and full, event dropped");
            }
        }
        Classification::Rejected(reason) => {
            counter!(m::EVENTS_REJECTED_TOTAL, m::LABEL_REASON => reason.as_label()).increment(1);
        }
    }
}
