//! JSON 번역 테이블
//!
//! 디렉토리 안의 `<category>.json` 파일(코드 → 표시 문자열 평면 객체)을 읽어
//! [`Translator`]를 구현합니다. 파일이 없는 카테고리는 원시 코드를 그대로 사용합니다.

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use verdict_relay_core::pipeline::{TranslationCategory, Translator};

use crate::error::VerdictPipelineError;

/// JSON 파일 기반 번역기
#[derive(Debug, Clone, Default)]
pub struct JsonTranslator {
    tables: HashMap<TranslationCategory, HashMap<String, String>>,
}

impl JsonTranslator {
    /// 테이블이 하나도 없는 번역기 (모든 코드를 그대로 표시)
    pub fn empty() -> Self {
        Self::default()
    }

    /// 디렉토리에서 모든 카테고리 테이블을 읽습니다.
    ///
    /// 없는 파일은 경고 후 건너뛰고, 읽을 수 없거나 형식이 틀린 파일은 에러입니다.
    pub async fn load_dir(dir: impl AsRef<Path>) -> Result<Self, VerdictPipelineError> {
        let dir = dir.as_ref();
        let mut translator = Self::empty();

        for category in TranslationCategory::ALL {
            let path = dir.join(format!("{}.json", category.file_stem()));
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(
                        path = %path.display(),
                        %category,
                        "translation table not found, raw codes will be shown"
                    );
                    continue;
                }
                Err(e) => {
                    return Err(VerdictPipelineError::TranslationLoad {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    });
                }
            };

            let table: HashMap<String, String> =
                serde_json::from_str(&content).map_err(|e| {
                    VerdictPipelineError::TranslationLoad {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    }
                })?;

            info!(%category, entries = table.len(), "loaded translation table");
            translator.tables.insert(category, table);
        }

        Ok(translator)
    }

    /// 매핑 하나를 추가합니다.
    pub fn with_entry(
        mut self,
        category: TranslationCategory,
        code: impl Into<String>,
        display: impl Into<String>,
    ) -> Self {
        self.tables
            .entry(category)
            .or_default()
            .insert(code.into(), display.into());
        self
    }

    /// 카테고리의 매핑 수
    pub fn len(&self, category: TranslationCategory) -> usize {
        self.tables.get(&category).map_or(0, HashMap::len)
    }
}

impl Translator for JsonTranslator {
    fn lookup(&self, category: TranslationCategory, code: &str) -> Option<&str> {
        self.tables
            .get(&category)
            .and_then(|table| table.get(code))
            .map(String::as_str)
    }
}
