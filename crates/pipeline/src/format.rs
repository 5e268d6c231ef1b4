//! 알림 메시지 포맷
//!
//! 이벤트 코드를 번역하고, 생성 시각을 UTC와 설정된 오프셋 두 가지로 렌더링하며,
//! 스캔 작업 페이지로 가는 딥 링크를 만듭니다. 본문은 HTML 서식이며 모든 동적 값은 이스케이프됩니다.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use reqwest::Url;

use verdict_relay_core::event::ScanVerdictEvent;
use verdict_relay_core::pipeline::{Notification, TranslationCategory, Translator};

use crate::error::VerdictPipelineError;

/// 패밀리가 없을 때 표시 문자열
pub const FAMILY_PLACEHOLDER: &str = "Malware family not determined";

/// 대상 플랫폼이 없을 때 표시 문자열
pub const PLATFORM_PLACEHOLDER: &str = "Target OS not determined";

/// 딥 링크 버튼 레이블
pub const LINK_LABEL: &str = "Open task";

const TIME_FORMAT: &str = "%H:%M // %d %B";

/// 이벤트 → 알림 변환기
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    base_url: Url,
    offset: FixedOffset,
}

impl MessageFormatter {
    /// 새 포매터를 생성합니다.
    ///
    /// `base_url`에 스킴이 없으면 `https://`를 붙입니다.
    /// 경로를 붙일 수 없는 URL(`mailto:` 등)은 설정 에러입니다.
    pub fn new(base_url: &str, utc_offset_hours: i32) -> Result<Self, VerdictPipelineError> {
        let offset = utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| VerdictPipelineError::Config {
                field: "dispatch.utc_offset_hours".to_owned(),
                reason: format!("{utc_offset_hours} is not a valid offset"),
            })?;

        let trimmed = base_url.trim().trim_end_matches('/');
        let candidate = if trimmed.contains("://") {
            trimmed.to_owned()
        } else {
            format!("https://{trimmed}")
        };
        let base_url = Url::parse(&candidate)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| VerdictPipelineError::Config {
                field: "dispatch.base_url".to_owned(),
                reason: format!("'{base_url}' is not a usable base URL"),
            })?;

        Ok(Self { base_url, offset })
    }

    /// 스캔 작업 페이지 URL
    ///
    /// `scan_id`는 경로 세그먼트 하나로 퍼센트 인코딩됩니다.
    pub fn deep_link(&self, scan_id: &str) -> String {
        let mut url = self.base_url.clone();
        // new()에서 cannot-be-a-base URL을 걸러 내므로 항상 Ok
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("tasks").push(scan_id);
        }
        url.into()
    }

    /// 이벤트 하나를 알림으로 만듭니다.
    pub fn format(&self, event: &ScanVerdictEvent, translator: &dyn Translator) -> Notification {
        let translate = |category, code: &str| -> String {
            escape_html(translator.lookup(category, code).unwrap_or(code))
        };

        let level = translate(TranslationCategory::ThreatLevel, event.threat_level.as_str());
        let state = translate(TranslationCategory::ResultState, &event.state);
        let entry = translate(TranslationCategory::EntryPointType, &event.entry_point_type);
        let classification = translate(
            TranslationCategory::ThreatClassification,
            &event.classification,
        );
        let family = escape_html(
            event
                .family
                .as_deref()
                .filter(|f| !f.is_empty())
                .unwrap_or(FAMILY_PLACEHOLDER),
        );
        let platform = if event.has_platform() {
            escape_html(event.platform.as_deref().unwrap_or_default())
        } else {
            PLATFORM_PLACEHOLDER.to_owned()
        };

        let created_utc = render_time(event.created, Utc.fix());
        let created_local = render_time(event.created, self.offset);

        let text = format!(
            "<b>{level}</b>\n\n\
             <b>Scan state:</b> {state}\n\
             <b>Source:</b> {entry}\n\n\
             <b>Malware classification:</b> {classification}\n\
             <b>Malware family:</b> {family}\n\
             <b>Target OS:</b> {platform}\n\n\
             <b>Verdict received at:</b>\n\
             {created_utc} // UTC\n\
             {created_local} // UTC{offset}",
            offset = OffsetLabel(self.offset),
        );

        Notification {
            text,
            link: self.deep_link(&event.scan_id),
            link_label: LINK_LABEL.to_owned(),
        }
    }
}

struct OffsetLabel(FixedOffset);

impl std::fmt::Display for OffsetLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hours = self.0.local_minus_utc() / 3600;
        write!(f, "{hours:+}")
    }
}

/// 유닉스 초를 주어진 오프셋의 `HH:MM // DD Month` 형식으로 렌더링합니다.
pub fn render_time(created: f64, offset: FixedOffset) -> String {
    let secs = created.floor();
    let nanos = ((created - secs) * 1e9) as u32;
    match DateTime::<Utc>::from_timestamp(secs as i64, nanos) {
        Some(dt) => dt.with_timezone(&offset).format(TIME_FORMAT).to_string(),
        None => created.to_string(),
    }
}

/// Telegram HTML 모드용 최소 이스케이프
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
