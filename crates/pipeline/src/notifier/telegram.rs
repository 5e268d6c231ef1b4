//! Telegram Bot API 알림 싱크
//!
//! `POST {api_url}/bot{token}/sendMessage`로 HTML 서식 메시지와
//! 딥 링크 버튼 하나를 가진 인라인 키보드를 보냅니다.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use verdict_relay_core::config::TelegramConfig;
use verdict_relay_core::error::SendError;
use verdict_relay_core::pipeline::{Notification, Notifier};

use crate::error::VerdictPipelineError;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    reply_markup: InlineKeyboardMarkup<'a>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardMarkup<'a> {
    inline_keyboard: [[InlineKeyboardButton<'a>; 1]; 1],
}

#[derive(Debug, Serialize)]
struct InlineKeyboardButton<'a> {
    text: &'a str,
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram 알림 싱크
pub struct TelegramNotifier {
    client: reqwest::Client,
    endpoint: String,
    chat_id: i64,
}

impl TelegramNotifier {
    /// 설정에서 notifier를 생성합니다.
    pub fn new(config: &TelegramConfig) -> Result<Self, VerdictPipelineError> {
        if config.bot_token.is_empty() {
            return Err(VerdictPipelineError::Config {
                field: "telegram.bot_token".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| VerdictPipelineError::Config {
                field: "telegram".to_owned(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let endpoint = format!(
            "{}/bot{}/sendMessage",
            config.api_url.trim_end_matches('/'),
            config.bot_token
        );

        Ok(Self {
            client,
            endpoint,
            chat_id: config.chat_id,
        })
    }

    fn request_body<'a>(&self, notification: &'a Notification) -> SendMessageRequest<'a> {
        SendMessageRequest {
            chat_id: self.chat_id,
            text: &notification.text,
            parse_mode: "HTML",
            reply_markup: InlineKeyboardMarkup {
                inline_keyboard: [[InlineKeyboardButton {
                    text: &notification.link_label,
                    url: &notification.link,
                }]],
            },
        }
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), SendError> {
        let body = self.request_body(notification);

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            // 에러 메시지에 토큰이 포함된 URL이 남지 않도록 제거
            .map_err(|e| SendError::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| SendError::Transport(e.without_url().to_string()))?;

        let parsed: Option<ApiResponse> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            let description = parsed
                .and_then(|r| r.description)
                .unwrap_or_else(|| status.to_string());
            return Err(SendError::Rejected {
                status: status.as_u16(),
                description,
            });
        }

        match parsed {
            Some(ApiResponse { ok: true, .. }) => {
                debug!(chat_id = self.chat_id, "telegram message delivered");
                Ok(())
            }
            Some(ApiResponse { description, .. }) => Err(SendError::Rejected {
                status: status.as_u16(),
                description: description.unwrap_or_else(|| "ok=false".to_owned()),
            }),
            None => Err(SendError::InvalidResponse(text)),
        }
    }
}
