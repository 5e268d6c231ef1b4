//! 이벤트 타입
//!
//! 스캔 판정 이벤트와 심각도 필터
//!
//! [`ScanVerdictEvent`]는 분류기가 생성하고 큐를 거쳐 디스패처가 소비하는
//! 파이프라인의 기본 단위입니다. 생성 이후에는 변경되지 않습니다.
//!
//! [`AllowList`]는 시작 시 한 번 설정된 필터 모드에서 만들어지며,
//! 어떤 심각도의 이벤트를 알림으로 보낼지 결정합니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 대상 플랫폼이 없음을 나타내는 와이어 센티널 값
pub const NO_PLATFORM: &str = "NO_PLATFORM";

/// 위협 심각도
///
/// 엄격도 순서: `Unknown` < `Unwanted` < `Dangerous`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatLevel {
    /// 판정 불가
    Unknown,
    /// 원치 않는 소프트웨어
    Unwanted,
    /// 위험
    Dangerous,
}

impl ThreatLevel {
    /// 와이어 표현을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Unwanted => "UNWANTED",
            Self::Dangerous => "DANGEROUS",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreatLevel {
    type Err = UnknownThreatLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNKNOWN" => Ok(Self::Unknown),
            "UNWANTED" => Ok(Self::Unwanted),
            "DANGEROUS" => Ok(Self::Dangerous),
            other => Err(UnknownThreatLevel(other.to_owned())),
        }
    }
}

/// 알 수 없는 심각도 문자열 (예: `CLEAN`)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown threat level: {0}")]
pub struct UnknownThreatLevel(pub String);

/// 심각도 필터 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// 모든 심각도 허용
    All,
    /// `UNWANTED` 이상
    Unwanted,
    /// `DANGEROUS`만
    Dangerous,
}

impl FilterMode {
    /// 모드가 허용하는 심각도 목록 (엄격도 오름차순)
    pub fn levels(&self) -> &'static [ThreatLevel] {
        match self {
            Self::All => &[
                ThreatLevel::Unknown,
                ThreatLevel::Unwanted,
                ThreatLevel::Dangerous,
            ],
            Self::Unwanted => &[ThreatLevel::Unwanted, ThreatLevel::Dangerous],
            Self::Dangerous => &[ThreatLevel::Dangerous],
        }
    }
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALL" => Ok(Self::All),
            "UNWANTED" => Ok(Self::Unwanted),
            "DANGEROUS" => Ok(Self::Dangerous),
            other => Err(format!("unknown filter mode '{other}'")),
        }
    }
}

/// 허용 심각도 목록
///
/// 알 수 없는 모드는 빈 목록이 되어 모든 이벤트가 거부됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    levels: Vec<ThreatLevel>,
}

impl AllowList {
    /// 설정된 모드 문자열에서 허용 목록을 만듭니다.
    pub fn from_mode(mode: &str) -> Self {
        match mode.parse::<FilterMode>() {
            Ok(mode) => Self {
                levels: mode.levels().to_vec(),
            },
            Err(reason) => {
                tracing::warn!(
                    mode,
                    reason = reason.as_str(),
                    "unknown filter mode, every event will be rejected"
                );
                Self::default()
            }
        }
    }

    /// 해당 심각도가 허용되는지 확인합니다.
    pub fn allows(&self, level: ThreatLevel) -> bool {
        self.levels.contains(&level)
    }

    /// 허용 심각도 목록
    pub fn levels(&self) -> &[ThreatLevel] {
        &self.levels
    }

    /// 아무것도 허용하지 않는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// 스캔 판정 이벤트
///
/// 와이어 JSON의 중첩 구조(`result.verdict.threat.*`)를 평탄화한 형태입니다.
/// 코드 값은 번역 없이 원본 그대로 보관하며, 표시 문자열 변환은 디스패처가 수행합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanVerdictEvent {
    /// 스캔 식별자
    pub scan_id: String,
    /// 진입점 유형 코드
    pub entry_point_type: String,
    /// 생성 시각 (유닉스 초)
    pub created: f64,
    /// 스캔 상태 코드
    pub state: String,
    /// 위협 심각도
    pub threat_level: ThreatLevel,
    /// 위협 분류 코드
    pub classification: String,
    /// 악성코드 패밀리 (판정되지 않은 경우 None)
    pub family: Option<String>,
    /// 대상 플랫폼 (없으면 None 또는 [`NO_PLATFORM`])
    pub platform: Option<String>,
}

impl ScanVerdictEvent {
    /// 실제 대상 플랫폼 값이 있는지 확인합니다.
    pub fn has_platform(&self) -> bool {
        matches!(self.platform.as_deref(), Some(p) if p != NO_PLATFORM)
    }
}

impl fmt::Display for ScanVerdictEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ScanVerdict[{}] {} state={} entry={}",
            self.scan_id, self.threat_level, self.state, self.entry_point_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> ScanVerdictEvent {
        ScanVerdictEvent {
            scan_id: "scan-1".to_owned(),
            entry_point_type: "API".to_owned(),
            created: 1_700_000_000.0,
            state: "FULL".to_owned(),
            threat_level: ThreatLevel::Dangerous,
            classification: "TROJAN".to_owned(),
            family: None,
            platform: Some(NO_PLATFORM.to_owned()),
        }
    }

    #[test]
    fn threat_level_parses_wire_names() {
        assert_eq!("UNKNOWN".parse::<ThreatLevel>(), Ok(ThreatLevel::Unknown));
        assert_eq!("UNWANTED".parse::<ThreatLevel>(), Ok(ThreatLevel::Unwanted));
        assert_eq!("DANGEROUS".parse::<ThreatLevel>(), Ok(ThreatLevel::Dangerous));
        assert!("CLEAN".parse::<ThreatLevel>().is_err());
        assert!("dangerous".parse::<ThreatLevel>().is_err());
    }

    #[test]
    fn threat_level_ordering_follows_strictness() {
        assert!(ThreatLevel::Unknown < ThreatLevel::Unwanted);
        assert!(ThreatLevel::Unwanted < ThreatLevel::Dangerous);
    }

    #[test]
    fn allow_list_modes_are_nested() {
        let all = AllowList::from_mode("ALL");
        let unwanted = AllowList::from_mode("UNWANTED");
        let dangerous = AllowList::from_mode("DANGEROUS");

        for level in dangerous.levels() {
            assert!(unwanted.allows(*level));
        }
        for level in unwanted.levels() {
            assert!(all.allows(*level));
        }
        assert_eq!(all.levels().len(), 3);
        assert!(!unwanted.allows(ThreatLevel::Unknown));
        assert!(!dangerous.allows(ThreatLevel::Unwanted));
    }

    #[test]
    fn unknown_mode_yields_empty_allow_list() {
        let list = AllowList::from_mode("CRITICAL");
        assert!(list.is_empty());
        assert!(!list.allows(ThreatLevel::Dangerous));

        // 대소문자 구분
        assert!(AllowList::from_mode("all").is_empty());
    }

    #[test]
    fn platform_sentinel_is_not_a_platform() {
        let mut event = sample_event();
        assert!(!event.has_platform());

        event.platform = None;
        assert!(!event.has_platform());

        event.platform = Some("WINDOWS".to_owned());
        assert!(event.has_platform());
    }

    #[test]
    fn event_display_contains_scan_id() {
        let event = sample_event();
        let s = event.to_string();
        assert!(s.contains("scan-1"));
        assert!(s.contains("DANGEROUS"));
    }

    #[test]
    fn threat_level_serde_uses_wire_names() {
        let json = serde_json::to_string(&ThreatLevel::Unwanted).unwrap();
        assert_eq!(json, "\"UNWANTED\"");
        let back: ThreatLevel = serde_json::from_str("\"DANGEROUS\"").unwrap();
        assert_eq!(back, ThreatLevel::Dangerous);
    }
}
