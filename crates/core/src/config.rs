//! 설정 관리
//!
//! Relay.toml 파싱 및 런타임 설정
//!
//! [`RelayConfig`]는 모든 구성 요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선, daemon에서 적용)
//! 2. 환경변수 (`RELAY_FILTER_MODE=DANGEROUS` 형식)
//! 3. 설정 파일 (`relay.toml`, 선택)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), verdict_relay_core::error::RelayError> {
//! use verdict_relay_core::config::RelayConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = RelayConfig::load("relay.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = RelayConfig::parse("[filter]\nmode = \"DANGEROUS\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, RelayError};

/// 기본 이벤트 마커 문자열
pub const DEFAULT_MARKER: &str = "- scan_machine.final_result -";

/// verdict-relay 통합 설정
///
/// `relay.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 구성 요소는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// TCP 리스너 설정
    #[serde(default)]
    pub listener: ListenerConfig,
    /// 이벤트 필터 설정
    #[serde(default)]
    pub filter: FilterConfig,
    /// 워커 풀 / 큐 설정
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// 디스패처 설정
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Telegram 싱크 설정
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl RelayConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일 없이 기본값과 환경변수만으로 설정을 만듭니다.
    pub fn from_env() -> Result<Self, RelayError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RelayError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                RelayError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, RelayError> {
        toml::from_str(toml_str).map_err(|e| {
            RelayError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `RELAY_{SECTION}_{FIELD}`
    /// 예: `RELAY_DISPATCH_UTC_OFFSET_HOURS=3`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "RELAY_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "RELAY_GENERAL_LOG_FORMAT");

        // Listener
        override_string(&mut self.listener.bind, "RELAY_LISTENER_BIND");
        override_parsed(
            &mut self.listener.max_session_bytes,
            "RELAY_LISTENER_MAX_SESSION_BYTES",
        );
        override_parsed(
            &mut self.listener.max_connections,
            "RELAY_LISTENER_MAX_CONNECTIONS",
        );

        // Filter
        override_string(&mut self.filter.mode, "RELAY_FILTER_MODE");
        override_string(&mut self.filter.marker, "RELAY_FILTER_MARKER");

        // Pipeline
        override_parsed(
            &mut self.pipeline.worker_threads,
            "RELAY_PIPELINE_WORKER_THREADS",
        );
        override_parsed(
            &mut self.pipeline.queue_capacity,
            "RELAY_PIPELINE_QUEUE_CAPACITY",
        );
        override_string(&mut self.pipeline.queue_policy, "RELAY_PIPELINE_QUEUE_POLICY");

        // Dispatch
        override_parsed(
            &mut self.dispatch.messages_per_minute,
            "RELAY_DISPATCH_MESSAGES_PER_MINUTE",
        );
        override_parsed(
            &mut self.dispatch.utc_offset_hours,
            "RELAY_DISPATCH_UTC_OFFSET_HOURS",
        );
        override_string(&mut self.dispatch.base_url, "RELAY_DISPATCH_BASE_URL");
        override_string(
            &mut self.dispatch.translations_dir,
            "RELAY_DISPATCH_TRANSLATIONS_DIR",
        );

        // Telegram
        override_string(&mut self.telegram.bot_token, "RELAY_TELEGRAM_BOT_TOKEN");
        override_parsed(&mut self.telegram.chat_id, "RELAY_TELEGRAM_CHAT_ID");
        override_string(&mut self.telegram.api_url, "RELAY_TELEGRAM_API_URL");
        override_parsed(
            &mut self.telegram.request_timeout_secs,
            "RELAY_TELEGRAM_REQUEST_TIMEOUT_SECS",
        );

        // Metrics
        override_parsed(&mut self.metrics.enabled, "RELAY_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "RELAY_METRICS_LISTEN_ADDR");
        override_parsed(&mut self.metrics.port, "RELAY_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 알 수 없는 필터 모드는 에러가 아닙니다 (빈 허용 목록으로 동작).
    pub fn validate(&self) -> Result<(), RelayError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.listener.bind.is_empty() {
            return Err(invalid("listener.bind", "must not be empty"));
        }

        if self.listener.max_session_bytes == 0 {
            return Err(invalid("listener.max_session_bytes", "must be greater than 0"));
        }

        if self.filter.marker.is_empty() {
            return Err(invalid("filter.marker", "must not be empty"));
        }

        const MAX_WORKER_THREADS: usize = 256;
        if self.pipeline.worker_threads == 0 || self.pipeline.worker_threads > MAX_WORKER_THREADS
        {
            return Err(invalid(
                "pipeline.worker_threads",
                format!("must be 1-{MAX_WORKER_THREADS}"),
            ));
        }

        if self.pipeline.queue_capacity == 0 {
            return Err(invalid("pipeline.queue_capacity", "must be greater than 0"));
        }

        let valid_policies = ["oldest", "newest", "block"];
        if !valid_policies.contains(&self.pipeline.queue_policy.as_str()) {
            return Err(invalid(
                "pipeline.queue_policy",
                format!("must be one of: {}", valid_policies.join(", ")),
            ));
        }

        if self.dispatch.messages_per_minute == 0 {
            return Err(invalid("dispatch.messages_per_minute", "must be at least 1"));
        }

        if !(-12..=14).contains(&self.dispatch.utc_offset_hours) {
            return Err(invalid("dispatch.utc_offset_hours", "must be in -12..=14"));
        }

        if self.telegram.request_timeout_secs == 0 {
            return Err(invalid(
                "telegram.request_timeout_secs",
                "must be greater than 0",
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must not be 0 when metrics are enabled"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> RelayError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// TCP 리스너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// 바인드 주소 (예: "0.0.0.0:514")
    pub bind: String,
    /// 세션당 한 줄의 최대 크기 (바이트, 구분자 제외)
    pub max_session_bytes: usize,
    /// 최대 동시 연결 수 (0 = 제한 없음)
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:514".to_owned(),
            max_session_bytes: 10_240,
            max_connections: 0,
        }
    }
}

/// 이벤트 필터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// 심각도 필터 모드 (ALL, UNWANTED, DANGEROUS)
    pub mode: String,
    /// 처리 대상 이벤트를 식별하는 마커 문자열
    pub marker: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            mode: "ALL".to_owned(),
            marker: DEFAULT_MARKER.to_owned(),
        }
    }
}

/// 워커 풀 / 이벤트 큐 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 분류 워커 수
    pub worker_threads: usize,
    /// 이벤트 큐 최대 용량
    pub queue_capacity: usize,
    /// 큐가 가득 찼을 때의 정책 (oldest, newest, block)
    pub queue_policy: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 8,
            queue_capacity: 10_000,
            queue_policy: "oldest".to_owned(),
        }
    }
}

/// 디스패처 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// 분당 최대 전송 수
    pub messages_per_minute: u32,
    /// 표시용 UTC 오프셋 (시간)
    pub utc_offset_hours: i32,
    /// 딥 링크 기본 주소 (호스트 또는 URL)
    pub base_url: String,
    /// 번역 테이블 디렉토리 (빈 문자열이면 원시 코드 사용)
    pub translations_dir: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            messages_per_minute: 20,
            utc_offset_hours: 0,
            base_url: "localhost".to_owned(),
            translations_dir: String::new(),
        }
    }
}

/// Telegram 싱크 설정
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// 봇 토큰
    pub bot_token: String,
    /// 대상 채팅 ID
    pub chat_id: i64,
    /// Bot API 기본 URL
    pub api_url: String,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: 0,
            api_url: "https://api.telegram.org".to_owned(),
            request_timeout_secs: 30,
        }
    }
}

// 토큰이 로그에 남지 않도록 Debug를 직접 구현
impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("api_url", &self.api_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 메트릭 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 리슨 주소
    pub listen_addr: String,
    /// 리슨 포트
    pub port: u16,
    /// 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.trim().parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = std::any::type_name::<T>(),
                "failed to parse env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = RelayConfig::default();
        assert_eq!(config.listener.bind, "0.0.0.0:514");
        assert_eq!(config.listener.max_session_bytes, 10_240);
        assert_eq!(config.filter.marker, DEFAULT_MARKER);
        assert_eq!(config.pipeline.worker_threads, 8);
        assert_eq!(config.dispatch.messages_per_minute, 20);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        RelayConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = RelayConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.pipeline.queue_policy, "oldest");
    }

    #[test]
    fn partial_toml_merges_with_defaults() {
        let toml = r#"
[filter]
mode = "DANGEROUS"

[dispatch]
utc_offset_hours = 3
base_url = "sandbox.example.org"
"#;
        let config = RelayConfig::parse(toml).unwrap();
        assert_eq!(config.filter.mode, "DANGEROUS");
        // marker는 기본값 유지
        assert_eq!(config.filter.marker, DEFAULT_MARKER);
        assert_eq!(config.dispatch.utc_offset_hours, 3);
        assert_eq!(config.dispatch.messages_per_minute, 20);
    }

    #[test]
    fn invalid_toml_returns_parse_error() {
        let err = RelayConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            RelayError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn unknown_filter_mode_is_not_a_config_error() {
        let mut config = RelayConfig::default();
        config.filter.mode = "EVERYTHING".to_owned();
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_rate_limit() {
        let mut config = RelayConfig::default();
        config.dispatch.messages_per_minute = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("messages_per_minute"));
    }

    #[test]
    fn validate_rejects_out_of_range_offset() {
        let mut config = RelayConfig::default();
        config.dispatch.utc_offset_hours = 15;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("utc_offset_hours"));
    }

    #[test]
    fn validate_rejects_unknown_queue_policy() {
        let mut config = RelayConfig::default();
        config.pipeline.queue_policy = "random".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("queue_policy"));
    }

    #[test]
    fn validate_rejects_zero_workers_and_empty_marker() {
        let mut config = RelayConfig::default();
        config.pipeline.worker_threads = 0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.filter.marker.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn telegram_debug_redacts_token() {
        let config = TelegramConfig {
            bot_token: "123456:secret".to_owned(),
            ..Default::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    #[serial]
    fn env_override_applies_to_sections() {
        // SAFETY: serial 테스트로 실행되므로 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe {
            std::env::set_var("RELAY_FILTER_MODE", "UNWANTED");
            std::env::set_var("RELAY_TELEGRAM_CHAT_ID", "-1001234567890");
            std::env::set_var("RELAY_DISPATCH_UTC_OFFSET_HOURS", "-5");
        }
        let mut config = RelayConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.filter.mode, "UNWANTED");
        assert_eq!(config.telegram.chat_id, -1_001_234_567_890);
        assert_eq!(config.dispatch.utc_offset_hours, -5);
        unsafe {
            std::env::remove_var("RELAY_FILTER_MODE");
            std::env::remove_var("RELAY_TELEGRAM_CHAT_ID");
            std::env::remove_var("RELAY_DISPATCH_UTC_OFFSET_HOURS");
        }
    }

    #[test]
    #[serial]
    fn env_override_invalid_number_keeps_original() {
        let mut val: u32 = 20;
        // SAFETY: serial 테스트로 실행되므로 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe { std::env::set_var("TEST_RELAY_BAD_U32", "twenty") };
        override_parsed(&mut val, "TEST_RELAY_BAD_U32");
        assert_eq!(val, 20);
        unsafe { std::env::remove_var("TEST_RELAY_BAD_U32") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_RELAY_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = RelayConfig::from_file("/nonexistent/path/relay.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RelayError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    #[serial]
    async fn load_reads_file_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "[pipeline]\nworker_threads = 4\n").unwrap();

        let config = RelayConfig::load(&path).await.unwrap();
        assert_eq!(config.pipeline.worker_threads, 4);

        std::fs::write(&path, "[pipeline]\nworker_threads = 0\n").unwrap();
        assert!(RelayConfig::load(&path).await.is_err());
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = RelayConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = RelayConfig::parse(&toml_str).unwrap();
        assert_eq!(config.listener.bind, parsed.listener.bind);
        assert_eq!(config.filter.marker, parsed.filter.marker);
    }
}
