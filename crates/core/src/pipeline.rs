//! 파이프라인 trait
//!
//! 외부 협력자(번역 테이블, 알림 싱크) 확장 포인트 정의

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::SendError;

/// dyn-compatible trait에서 사용하는 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 번역 테이블 카테고리
///
/// 각 카테고리는 원시 코드 값을 표시 문자열로 매핑하는 테이블 하나에 대응합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranslationCategory {
    /// 위협 심각도 (`UNKNOWN`, `UNWANTED`, `DANGEROUS`)
    ThreatLevel,
    /// 스캔 결과 상태
    ResultState,
    /// 진입점 유형
    EntryPointType,
    /// 위협 분류
    ThreatClassification,
}

impl TranslationCategory {
    /// 모든 카테고리
    pub const ALL: [TranslationCategory; 4] = [
        Self::ThreatLevel,
        Self::ResultState,
        Self::EntryPointType,
        Self::ThreatClassification,
    ];

    /// 테이블 파일 이름 (확장자 제외)
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::ThreatLevel => "threat_level",
            Self::ResultState => "result_state",
            Self::EntryPointType => "entry_point_type",
            Self::ThreatClassification => "threat_classification",
        }
    }
}

impl fmt::Display for TranslationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

/// 코드 → 표시 문자열 번역기
///
/// 매핑이 없으면 `None`을 반환하며, 호출자는 원시 코드를 그대로 사용합니다.
pub trait Translator: Send + Sync {
    /// 카테고리 내에서 코드를 조회합니다.
    fn lookup(&self, category: TranslationCategory, code: &str) -> Option<&str>;
}

/// 싱크로 보낼 알림 한 건
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// 본문 (HTML 서식)
    pub text: String,
    /// 딥 링크 URL
    pub link: String,
    /// 딥 링크 버튼 레이블
    pub link_label: String,
}

/// 알림 전송 싱크
///
/// 외부 속도 정책의 적용을 받으며, 호출자는 호출 간격을 직접 제한해야 합니다.
pub trait Notifier: Send + Sync {
    /// 알림 한 건을 전송합니다.
    fn send(
        &self,
        notification: &Notification,
    ) -> impl Future<Output = Result<(), SendError>> + Send;
}

/// dyn-compatible 알림 싱크
///
/// `Notifier`는 RPITIT를 사용하므로 `dyn Notifier`가 불가합니다.
/// `DynNotifier`는 `BoxFuture`를 반환하여 `Arc<dyn DynNotifier>`로 보관할 수 있게 합니다.
pub trait DynNotifier: Send + Sync {
    /// 알림 한 건을 전송합니다.
    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), SendError>>;
}

/// Notifier를 구현한 타입은 자동으로 DynNotifier도 구현됩니다.
impl<T: Notifier> DynNotifier for T {
    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), SendError>> {
        Box::pin(Notifier::send(self, notification))
    }
}
