//! 이벤트 분류기
//!
//! 원시 줄을 판정 이벤트 또는 거부 사유로 분류
//!
//! 분류 순서:
//! 1. 마커 문자열이 없으면 [`Rejection::MarkerMismatch`] (조용히 버림)
//! 2. 첫 번째 균형 잡힌 `{...}` 구간을 JSON으로 해석, 실패 시 [`Rejection::MalformedPayload`] (경고 로그)
//! 3. 심각도가 허용 목록 밖이면 [`Rejection::SeverityFiltered`] (조용히 버림)
//! 4. 나머지 필드를 읽어 [`ScanVerdictEvent`] 생성
//!
//! 분류기는 공유 가변 상태가 없으므로 여러 워커에서 동시에 호출해도 안전합니다.

use serde::Deserialize;
use tracing::warn;

use verdict_relay_core::event::{AllowList, ScanVerdictEvent, ThreatLevel};

use crate::framer::RawLine;

/// 분류 결과
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// 전송 대상 이벤트
    Accepted(ScanVerdictEvent),
    /// 거부됨
    Rejected(Rejection),
}

impl Classification {
    /// 수락된 이벤트를 꺼냅니다.
    pub fn accepted(self) -> Option<ScanVerdictEvent> {
        match self {
            Self::Accepted(event) => Some(event),
            Self::Rejected(_) => None,
        }
    }
}

/// 거부 사유
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// 마커 문자열 없음 (처리 대상 이벤트가 아님)
    MarkerMismatch,
    /// JSON 없음 또는 디코딩 실패
    MalformedPayload(String),
    /// 허용 목록 밖의 심각도
    SeverityFiltered(String),
}

impl Rejection {
    /// 메트릭 레이블 값
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::MarkerMismatch => "marker",
            Self::MalformedPayload(_) => "malformed",
            Self::SeverityFiltered(_) => "filtered",
        }
    }
}

#[derive(Deserialize)]
struct WireEvent {
    scan_id: String,
    entry_point_type: String,
    created: f64,
    result: WireResult,
}

#[derive(Deserialize)]
struct WireResult {
    state: String,
    verdict: WireVerdict,
}

#[derive(Deserialize)]
struct WireVerdict {
    threat: WireThreat,
}

#[derive(Deserialize)]
struct WireThreat {
    classification: String,
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    platform: Option<String>,
}

/// 스캔 판정 이벤트 분류기
#[derive(Debug, Clone)]
pub struct EventClassifier {
    marker: String,
    allow_list: AllowList,
}

impl EventClassifier {
    /// 새 분류기를 생성합니다.
    pub fn new(marker: impl Into<String>, allow_list: AllowList) -> Self {
        Self {
            marker: marker.into(),
            allow_list,
        }
    }

    /// 설정된 마커
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// 허용 목록
    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// 한 줄을 분류합니다.
    pub fn classify(&self, line: &RawLine) -> Classification {
        let text = line.text();
        match self.classify_text(&text) {
            Ok(event) => Classification::Accepted(event),
            Err(rejection) => {
                if let Rejection::MalformedPayload(reason) = &rejection {
                    warn!(
                        source = line.source.as_str(),
                        reason = reason.as_str(),
                        "dropping malformed scan verdict payload"
                    );
                }
                Classification::Rejected(rejection)
            }
        }
    }

    fn classify_text(&self, text: &str) -> Result<ScanVerdictEvent, Rejection> {
        if !text.contains(self.marker.as_str()) {
            return Err(Rejection::MarkerMismatch);
        }

        let json = extract_json_object(text)
            .ok_or_else(|| Rejection::MalformedPayload("no JSON object found".to_owned()))?;

        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| Rejection::MalformedPayload(e.to_string()))?;

        let level_str = value
            .pointer("/result/verdict/threat_level")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                Rejection::MalformedPayload("missing result.verdict.threat_level".to_owned())
            })?;

        // 알 수 없는 심각도(예: CLEAN)는 어떤 모드에서도 허용되지 않음
        let level = match level_str.parse::<ThreatLevel>() {
            Ok(level) if self.allow_list.allows(level) => level,
            _ => return Err(Rejection::SeverityFiltered(level_str.to_owned())),
        };

        let wire: WireEvent = serde_json::from_value(value)
            .map_err(|e| Rejection::MalformedPayload(e.to_string()))?;

        Ok(ScanVerdictEvent {
            scan_id: wire.scan_id,
            entry_point_type: wire.entry_point_type,
            created: wire.created,
            state: wire.result.state,
            threat_level: level,
            classification: wire.result.verdict.threat.classification,
            family: wire.result.verdict.threat.family,
            platform: wire.result.verdict.threat.platform,
        })
    }
}

/// 텍스트에서 첫 번째 균형 잡힌 `{...}` 구간을 찾습니다.
///
/// 문자열 리터럴 안의 중괄호와 이스케이프는 무시합니다.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
