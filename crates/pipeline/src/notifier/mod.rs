//! 알림 싱크 구현
//!
//! - [`TelegramNotifier`]: Telegram Bot API `sendMessage`

pub mod telegram;

pub use telegram::TelegramNotifier;
