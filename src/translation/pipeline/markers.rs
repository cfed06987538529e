//! 批次标记协议
//!
//! 一次请求内的每一行都带上形如 `[[SLT_BATCH_<nonce>_<index>]]` 的前缀，
//! 各行以换行拼接后整体发送给翻译服务。
//!
//! 语法：
//! ```text
//! request  = line *( "\n" line )
//! line     = marker " " text
//! marker   = "[[" "SLT_BATCH_" nonce "_" index "]]"
//! nonce    = 8 * lowercase-hex
//! index    = 1*DIGIT              ; 从 0 开始
//! ```
//!
//! 解码时标记之间允许出现空白，大小写不敏感；行号取自标记本身而不是出现顺序，
//! 因此翻译服务打乱行序也能还原。响应里完全没有标记时，依次尝试 `|||`
//! 分隔和按行拆分，只有段数恰好相等才接受。

use std::sync::atomic::{AtomicU64, Ordering};

use regex::Regex;

use super::filters::{collapse_whitespace, normalize_translation};
use crate::translation::config::constants;
use crate::translation::error::{TranslationError, TranslationResult};

static NONCE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// 生成一次请求使用的随机串
pub fn generate_nonce() -> String {
    let counter = NONCE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let now = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let mut hasher = blake3::Hasher::new();
    hasher.update(&now.to_le_bytes());
    hasher.update(&counter.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());

    let hex = hasher.finalize().to_hex();
    hex.as_str()[..constants::NONCE_LEN].to_string()
}

/// 解码时采用的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    Markers,
    PlainDelimiter,
    Newlines,
    Single,
}

/// 标记编解码器，一个实例对应一次请求
#[derive(Debug, Clone)]
pub struct MarkerCodec {
    nonce: String,
    pattern: Regex,
}

impl MarkerCodec {
    /// 使用新生成的随机串
    pub fn new() -> TranslationResult<Self> {
        Self::with_nonce(&generate_nonce())
    }

    pub fn with_nonce(nonce: &str) -> TranslationResult<Self> {
        let nonce = nonce.to_ascii_lowercase();
        if nonce.is_empty() || !nonce.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TranslationError::InvalidInput(format!(
                "批次随机串只能包含字母和数字: {}",
                nonce
            )));
        }

        let pattern = Regex::new(&format!(
            r"(?i)\[\[\s*{}[\s_]*{}[\s_]*(\d+)\s*\]\]",
            regex::escape(constants::MARKER_PREFIX).replace('_', r"[\s_]*"),
            regex::escape(&nonce)
        ))
        .map_err(|e| TranslationError::InternalError(format!("标记正则编译失败: {}", e)))?;

        Ok(Self { nonce, pattern })
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn marker(&self, index: usize) -> String {
        format!("[[{}_{}_{}]]", constants::MARKER_PREFIX, self.nonce, index)
    }

    /// 为每一行加上标记并以换行拼接
    pub fn encode(&self, lines: &[String]) -> String {
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{} {}", self.marker(i), collapse_whitespace(line)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 把响应还原成 `expected` 行，顺序与输入一致
    pub fn decode(&self, response: &str, expected: usize) -> TranslationResult<Vec<String>> {
        self.decode_with_strategy(response, expected)
            .map(|(lines, _)| lines)
    }

    pub fn decode_with_strategy(
        &self,
        response: &str,
        expected: usize,
    ) -> TranslationResult<(Vec<String>, DecodeStrategy)> {
        let found: Vec<(usize, usize, usize)> = self
            .pattern
            .captures_iter(response)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let index = caps.get(1)?.as_str().parse::<usize>().ok()?;
                Some((index, whole.start(), whole.end()))
            })
            .collect();

        if found.is_empty() {
            return decode_without_markers(response, expected);
        }

        if found.len() != expected {
            return Err(TranslationError::ProtocolMismatch {
                expected,
                found: found.len(),
            });
        }

        let mut slots: Vec<Option<String>> = vec![None; expected];
        for (pos, &(index, _, end)) in found.iter().enumerate() {
            let segment_end = found.get(pos + 1).map_or(response.len(), |next| next.1);
            let slot = slots.get_mut(index).ok_or(TranslationError::ProtocolMismatch {
                expected,
                found: found.len(),
            })?;
            if slot.is_some() {
                // 重复的行号说明有行被合并或复制
                return Err(TranslationError::ProtocolMismatch {
                    expected,
                    found: found.len(),
                });
            }
            *slot = Some(normalize_translation(&response[end..segment_end]));
        }

        let lines = slots.into_iter().map(Option::unwrap_or_default).collect();
        Ok((lines, DecodeStrategy::Markers))
    }
}

fn decode_without_markers(
    response: &str,
    expected: usize,
) -> TranslationResult<(Vec<String>, DecodeStrategy)> {
    if expected == 1 {
        return Ok((vec![normalize_translation(response)], DecodeStrategy::Single));
    }

    let by_delimiter: Vec<&str> = response.split(constants::PLAIN_DELIMITER).collect();
    if by_delimiter.len() == expected {
        tracing::debug!("响应中没有标记，按 ||| 分隔还原 {} 行", expected);
        let lines = by_delimiter.into_iter().map(normalize_translation).collect();
        return Ok((lines, DecodeStrategy::PlainDelimiter));
    }

    let by_newline: Vec<&str> = response
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    if by_newline.len() == expected {
        tracing::debug!("响应中没有标记，按行拆分还原 {} 行", expected);
        let lines = by_newline.into_iter().map(normalize_translation).collect();
        return Ok((lines, DecodeStrategy::Newlines));
    }

    Err(TranslationError::ProtocolMismatch {
        expected,
        found: by_newline.len(),
    })
}
