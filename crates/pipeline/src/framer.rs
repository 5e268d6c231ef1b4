//! 줄 프레이머
//!
//! 바이트 스트림을 개행 단위 레코드로 복원
//!
//! TCP 읽기는 임의 크기로 쪼개져 도착하므로, [`LineFramer`]는 연결별 버퍼에
//! 바이트를 누적하고 `\n`이 나올 때마다 그 앞까지를 한 줄로 잘라냅니다.
//! 마지막 구분자 뒤의 바이트는 다음 `feed`까지 버퍼에 남습니다.
//!
//! 한 줄이 한도를 넘으면 완성 여부와 관계없이 [`FramingError::Overflow`]를
//! 반환하고 버퍼를 비웁니다. 읽기가 어떻게 쪼개져 도착해도 결과는 같습니다.
//! 호출자는 연결을 닫아야 합니다.

use bytes::{Bytes, BytesMut};

use crate::error::FramingError;

const DELIMITER: u8 = b'\n';

/// 프레이밍된 한 줄
///
/// 앞뒤 공백이 제거된 상태이며 비어 있지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 줄 내용
    pub data: Bytes,
    /// 수신 소스 (예: "tcp:10.0.0.5:50514")
    pub source: String,
}

impl RawLine {
    /// 새 RawLine을 생성합니다.
    pub fn new(data: impl Into<Bytes>, source: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            source: source.into(),
        }
    }

    /// UTF-8로 해석한 내용 (잘못된 바이트는 대체 문자로 치환)
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// 연결별 줄 프레이머
pub struct LineFramer {
    buffer: BytesMut,
    max_bytes: usize,
    source: String,
}

impl LineFramer {
    /// 새 프레이머를 생성합니다.
    ///
    /// `max_bytes`는 구분자를 제외한 한 줄의 최대 바이트 수입니다.
    pub fn new(max_bytes: usize, source: impl Into<String>) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_bytes.min(64 * 1024)),
            max_bytes,
            source: source.into(),
        }
    }

    /// 읽은 바이트를 추가하고 완성된 줄을 `out`에 넣습니다.
    ///
    /// 오버플로우가 나도 이미 완성된 줄은 `out`에 남아 있습니다.
    pub fn feed(&mut self, chunk: &[u8], out: &mut Vec<RawLine>) -> Result<(), FramingError> {
        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|b| *b == DELIMITER) {
            if pos > self.max_bytes {
                self.buffer.clear();
                return Err(FramingError::Overflow {
                    buffered: pos,
                    limit: self.max_bytes,
                });
            }
            let line = self.buffer.split_to(pos + 1);
            if let Some(raw) = self.make_line(&line[..pos]) {
                out.push(raw);
            }
        }

        if self.buffer.len() > self.max_bytes {
            let buffered = self.buffer.len();
            self.buffer.clear();
            return Err(FramingError::Overflow {
                buffered,
                limit: self.max_bytes,
            });
        }

        Ok(())
    }

    /// 연결 종료 시 남은 조각을 마지막 줄로 내보냅니다.
    pub fn flush(&mut self) -> Option<RawLine> {
        let rest = self.buffer.split();
        self.make_line(&rest)
    }

    /// 현재 버퍼에 남아 있는 바이트 수
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn make_line(&self, bytes: &[u8]) -> Option<RawLine> {
        let trimmed = bytes.trim_ascii();
        if trimmed.is_empty() {
            return None;
        }
        Some(RawLine::new(
            Bytes::copy_from_slice(trimmed),
            self.source.clone(),
        ))
    }
}
