//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `relay_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(verdict_relay_core::metrics::EVENTS_ACCEPTED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 거부 사유 레이블 키 (marker, malformed, filtered)
pub const LABEL_REASON: &str = "reason";

/// 큐 정책 레이블 키 (oldest, newest)
pub const LABEL_POLICY: &str = "policy";

// ─── 수집 ─────────────────────────────────────────────────────────

/// 수락된 TCP 연결 수 (counter)
pub const CONNECTIONS_ACCEPTED_TOTAL: &str = "relay_connections_accepted_total";

/// 연결 제한으로 거부된 TCP 연결 수 (counter)
pub const CONNECTIONS_REJECTED_TOTAL: &str = "relay_connections_rejected_total";

/// 현재 활성 세션 수 (gauge)
pub const CONNECTIONS_ACTIVE: &str = "relay_connections_active";

/// 프레이밍된 줄 수 (counter)
pub const LINES_FRAMED_TOTAL: &str = "relay_lines_framed_total";

/// 세션 버퍼 한도를 넘어 종료된 세션 수 (counter)
pub const FRAMING_OVERFLOWS_TOTAL: &str = "relay_framing_overflows_total";

// ─── 분류 ─────────────────────────────────────────────────────────

/// 수락된 이벤트 수 (counter)
pub const EVENTS_ACCEPTED_TOTAL: &str = "relay_events_accepted_total";

/// 거부된 줄 수 (counter, label: reason)
pub const EVENTS_REJECTED_TOTAL: &str = "relay_events_rejected_total";

// ─── 큐 ───────────────────────────────────────────────────────────

/// 현재 큐 깊이 (gauge)
pub const QUEUE_DEPTH: &str = "relay_queue_depth";

/// 큐 포화로 버려진 이벤트 수 (counter, label: policy)
pub const QUEUE_DROPPED_TOTAL: &str = "relay_queue_dropped_total";

// ─── 전송 ─────────────────────────────────────────────────────────

/// 전송 성공 알림 수 (counter)
pub const NOTIFICATIONS_SENT_TOTAL: &str = "relay_notifications_sent_total";

/// 전송 실패 알림 수 (counter)
pub const NOTIFICATIONS_FAILED_TOTAL: &str = "relay_notifications_failed_total";

/// 종료 시 전달되지 못한 이벤트 수 (counter)
pub const EVENTS_UNDELIVERED_TOTAL: &str = "relay_events_undelivered_total";

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다. 레코더가 없으면 아무 동작도 하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        CONNECTIONS_ACCEPTED_TOTAL,
        "Total number of TCP connections accepted by the listener"
    );
    describe_counter!(
        CONNECTIONS_REJECTED_TOTAL,
        "TCP connections closed immediately because the connection limit was reached"
    );
    describe_gauge!(CONNECTIONS_ACTIVE, "Number of currently open sessions");
    describe_counter!(
        LINES_FRAMED_TOTAL,
        "Total number of non-empty lines extracted from session byte streams"
    );
    describe_counter!(
        FRAMING_OVERFLOWS_TOTAL,
        "Sessions closed because a line exceeded the buffer limit"
    );

    describe_counter!(
        EVENTS_ACCEPTED_TOTAL,
        "Lines classified as scan verdict events and admitted by the filter"
    );
    describe_counter!(
        EVENTS_REJECTED_TOTAL,
        "Lines rejected by the classifier, by reason (marker, malformed, filtered)"
    );

    describe_gauge!(QUEUE_DEPTH, "Number of events waiting for dispatch");
    describe_counter!(
        QUEUE_DROPPED_TOTAL,
        "Events discarded because the queue was full, by policy"
    );

    describe_counter!(
        NOTIFICATIONS_SENT_TOTAL,
        "Notifications accepted by the sink"
    );
    describe_counter!(
        NOTIFICATIONS_FAILED_TOTAL,
        "Notifications that failed to send and were dropped"
    );
    describe_counter!(
        EVENTS_UNDELIVERED_TOTAL,
        "Events still queued when shutdown completed"
    );
}
