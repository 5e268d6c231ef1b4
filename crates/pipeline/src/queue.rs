//! 이벤트 큐
//!
//! 수집과 전송 사이의 유한 FIFO
//!
//! 여러 세션이 동시에 `push`하고 디스패처 하나가 `pop`합니다.
//! `pop`은 항목이 들어오거나 큐가 닫힐 때까지 대기합니다 (폴링 없음).
//!
//! # 포화 정책
//! - [`QueuePolicy::DropOldest`]: 가장 오래된 항목을 버리고 새 항목을 넣음 (기본값)
//! - [`QueuePolicy::DropNewest`]: 새 항목을 거부
//! - [`QueuePolicy::Block`]: 자리가 날 때까지 생산자를 대기시킴
//!
//! 큐가 닫힌 뒤에는 대기 중인 생산자가 풀려나고, 남은 자리가 있을 때만 `push`가 받아들여집니다.

use std::collections::VecDeque;
use std::pin::pin;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use metrics::{counter, gauge};
use tokio::sync::Notify;
use tracing::warn;

use verdict_relay_core::metrics as m;

/// 큐 포화 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueuePolicy {
    /// 가장 오래된 항목을 버림
    #[default]
    DropOldest,
    /// 새 항목을 거부
    DropNewest,
    /// 생산자 대기
    Block,
}

impl QueuePolicy {
    /// 설정 문자열 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DropOldest => "oldest",
            Self::DropNewest => "newest",
            Self::Block => "block",
        }
    }
}

impl FromStr for QueuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oldest" => Ok(Self::DropOldest),
            "newest" => Ok(Self::DropNewest),
            "block" => Ok(Self::Block),
            other => Err(format!("unknown queue policy '{other}'")),
        }
    }
}

/// `push` 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// 정상적으로 들어감
    Enqueued,
    /// 들어갔지만 가장 오래된 항목이 버려짐
    DroppedOldest,
    /// 큐가 가득 차서 거부됨
    Rejected,
    /// 큐가 닫혀 있고 자리가 없음
    Closed,
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// 유한 용량 이벤트 큐
pub struct EventQueue<T> {
    state: Mutex<State<T>>,
    item_ready: Notify,
    space_ready: Notify,
    capacity: usize,
    policy: QueuePolicy,
    dropped: AtomicU64,
}

impl<T> EventQueue<T> {
    /// 새 큐를 생성합니다. 용량 0은 1로 취급합니다.
    pub fn new(capacity: usize, policy: QueuePolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity.min(10_000)),
                closed: false,
            }),
            item_ready: Notify::new(),
            space_ready: Notify::new(),
            capacity,
            policy,
            dropped: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 항목을 넣습니다.
    ///
    /// `Block` 정책에서만 대기할 수 있습니다.
    pub async fn push(&self, item: T) -> PushOutcome {
        loop {
            let mut space = pin!(self.space_ready.notified());
            space.as_mut().enable();

            {
                let mut state = self.lock();
                if state.items.len() < self.capacity {
                    state.items.push_back(item);
                    gauge!(m::QUEUE_DEPTH).set(state.items.len() as f64);
                    drop(state);
                    self.item_ready.notify_one();
                    return PushOutcome::Enqueued;
                }
                if state.closed {
                    return PushOutcome::Closed;
                }
                match self.policy {
                    QueuePolicy::DropOldest => {
                        state.items.pop_front();
                        state.items.push_back(item);
                        drop(state);
                        self.record_drop();
                        self.item_ready.notify_one();
                        return PushOutcome::DroppedOldest;
                    }
                    QueuePolicy::DropNewest => {
                        drop(state);
                        self.record_drop();
                        return PushOutcome::Rejected;
                    }
                    QueuePolicy::Block => {}
                }
            }

            space.await;
        }
    }

    fn record_drop(&self) {
        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        counter!(m::QUEUE_DROPPED_TOTAL, m::LABEL_POLICY => self.policy.as_str()).increment(1);
        warn!(
            dropped,
            capacity = self.capacity,
            policy = self.policy.as_str(),
            "event queue full, dropped an event"
        );
    }

    /// 항목을 하나 꺼냅니다.
    ///
    /// 비어 있으면 항목이 들어올 때까지 대기합니다.
    /// 큐가 닫혔고 비어 있으면 `None`을 반환합니다.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let mut ready = pin!(self.item_ready.notified());
            ready.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    gauge!(m::QUEUE_DEPTH).set(state.items.len() as f64);
                    drop(state);
                    self.space_ready.notify_one();
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }

            ready.await;
        }
    }

    /// 큐를 닫고 대기 중인 생산자/소비자를 깨웁니다.
    pub fn close(&self) {
        self.lock().closed = true;
        self.item_ready.notify_waiters();
        self.space_ready.notify_waiters();
    }

    /// 남은 항목을 모두 꺼냅니다.
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.lock();
        let items: Vec<T> = state.items.drain(..).collect();
        gauge!(m::QUEUE_DEPTH).set(0.0);
        drop(state);
        self.space_ready.notify_waiters();
        items
    }

    /// 현재 항목 수
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// 최대 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 포화 정책
    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    /// 지금까지 버려진 항목 수
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
