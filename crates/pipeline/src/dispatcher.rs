//! 디스패처
//!
//! 큐에서 이벤트를 꺼내 속도 제한에 맞춰 전송
//!
//! 매 전송 시도(성공/실패 무관) 뒤에 `60 / messages_per_minute`초 간격을 둡니다.
//! 고정 지연 방식이며 슬라이딩 윈도우가 아닙니다. 실패한 알림은 로그 후 버리고 재시도하지 않습니다.
//!
//! 취소는 간격 대기와 큐 대기 중에만 관찰됩니다. 진행 중인 전송은 끝까지 기다립니다.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use verdict_relay_core::event::ScanVerdictEvent;
use verdict_relay_core::metrics as m;
use verdict_relay_core::pipeline::{DynNotifier, Translator};

use crate::format::MessageFormatter;
use crate::queue::EventQueue;

/// 고정 간격 전송 윈도우
#[derive(Debug, Clone)]
pub struct RateWindow {
    interval: Duration,
    next_allowed: Option<Instant>,
}

impl RateWindow {
    /// 분당 `limit`회 전송을 허용하는 윈도우. 0은 1로 취급합니다.
    pub fn per_minute(limit: u32) -> Self {
        Self {
            interval: Duration::from_secs(60) / limit.max(1),
            next_allowed: None,
        }
    }

    /// 전송 간 최소 간격
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 다음 전송이 허용되는 시각 (아직 시도가 없으면 None)
    pub fn next_allowed(&self) -> Option<Instant> {
        self.next_allowed
    }

    /// 전송 시도를 기록하고 윈도우를 앞으로 옮깁니다.
    pub fn record_attempt(&mut self) {
        self.next_allowed = Some(Instant::now() + self.interval);
    }
}

/// 디스패처 종료 시 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// 전송 성공 수
    pub sent: u64,
    /// 전송 실패 수
    pub failed: u64,
}

/// 이벤트 전송 루프
pub struct Dispatcher {
    queue: Arc<EventQueue<ScanVerdictEvent>>,
    notifier: Arc<dyn DynNotifier>,
    translator: Arc<dyn Translator>,
    formatter: MessageFormatter,
    window: RateWindow,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// 새 디스패처를 생성합니다.
    pub fn new(
        queue: Arc<EventQueue<ScanVerdictEvent>>,
        notifier: Arc<dyn DynNotifier>,
        translator: Arc<dyn Translator>,
        formatter: MessageFormatter,
        window: RateWindow,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            queue,
            notifier,
            translator,
            formatter,
            window,
            cancel,
        }
    }

    /// 취소되거나 큐가 닫혀 비워질 때까지 전송을 반복합니다.
    pub async fn run(mut self) -> DispatchStats {
        let mut stats = DispatchStats::default();
        info!(
            interval_ms = self.window.interval().as_millis() as u64,
            "dispatcher started"
        );

        loop {
            if let Some(at) = self.window.next_allowed() {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    _ = sleep_until(at) => {}
                }
            }

            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                event = self.queue.pop() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            self.dispatch(&event, &mut stats).await;
            self.window.record_attempt();
        }

        info!(sent = stats.sent, failed = stats.failed, "dispatcher stopped");
        stats
    }

    async fn dispatch(&self, event: &ScanVerdictEvent, stats: &mut DispatchStats) {
        let notification = self.formatter.format(event, self.translator.as_ref());
        match self.notifier.send(&notification).await {
            Ok(()) => {
                stats.sent += 1;
                counter!(m::NOTIFICATIONS_SENT_TOTAL).increment(1);
                debug!(scan_id = event.scan_id.as_str(), "notification sent");
            }
            Err(e) => {
                stats.failed += 1;
                counter!(m::NOTIFICATIONS_FAILED_TOTAL).increment(1);
                error!(
                    scan_id = event.scan_id.as_str(),
                    error = %e,
                    "failed to send notification, event dropped"
                );
            }
        }
    }
}
