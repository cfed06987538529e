//! 批次翻译协议
//!
//! 把 N 行未缓存的歌词变成 N 行译文，尽量减少往返次数。降级阶梯：
//! 1. 整批一次请求，每行带标记
//! 2. 按固定大小分块（默认 6 行）逐块请求，任一块失败则整批失败
//! 3. 以上都失败时换下一个翻译服务，每个服务只走一遍阶梯
//! 4. 全部失败时原文原样返回，`was_translated = false`
//!
//! 只有取消会以错误形式返回给调用方。

use std::sync::Arc;

use super::filters::normalize_translation;
use super::markers::MarkerCodec;
use crate::translation::config::{constants, TranslationConfig};
use crate::translation::core::engine::{CancelToken, RequestExecutor};
use crate::translation::error::{log_error, TranslationError, TranslationResult};
use crate::translation::providers::{ProviderChain, Translator};

/// 单行翻译结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedLine {
    pub text: String,
    pub was_translated: bool,
}

impl TranslatedLine {
    fn untouched(original: &str) -> Self {
        Self {
            text: original.to_string(),
            was_translated: false,
        }
    }
}

/// 成功的阶梯层级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchTier {
    /// 整批单次请求
    Single,
    /// 分块请求
    Chunked,
    /// 全部失败，原文返回
    Fallback,
    /// 没有需要翻译的行
    Empty,
}

/// 一次批次翻译的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub lines: Vec<TranslatedLine>,
    pub tier: BatchTier,
    /// 成功的翻译服务
    pub vendor: Option<String>,
    pub detected_lang: Option<String>,
}

impl BatchOutcome {
    fn fallback(lines: &[String]) -> Self {
        Self {
            lines: lines.iter().map(|l| TranslatedLine::untouched(l)).collect(),
            tier: BatchTier::Fallback,
            vendor: None,
            detected_lang: None,
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.text.clone()).collect()
    }
}

struct TierResult {
    lines: Vec<String>,
    detected_lang: Option<String>,
}

/// 批次翻译器
pub struct BatchTranslator {
    executor: Arc<RequestExecutor>,
    chunk_size: usize,
}

impl BatchTranslator {
    pub fn new(executor: Arc<RequestExecutor>, chunk_size: usize) -> Self {
        Self {
            executor,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn from_config(executor: Arc<RequestExecutor>, config: &TranslationConfig) -> Self {
        Self::new(executor, config.chunk_size)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    /// 依次用服务链中的每个服务尝试整个降级阶梯
    pub async fn translate_lines(
        &self,
        chain: &ProviderChain,
        lines: &[String],
        target_lang: &str,
        cancel: &CancelToken,
    ) -> TranslationResult<BatchOutcome> {
        if lines.is_empty() {
            return Ok(BatchOutcome {
                lines: Vec::new(),
                tier: BatchTier::Empty,
                vendor: None,
                detected_lang: None,
            });
        }

        for translator in chain.iter() {
            cancel.check()?;

            match self
                .run_ladder(translator.as_ref(), lines, target_lang, cancel)
                .await
            {
                Ok((tier, result)) => {
                    tracing::debug!(
                        "{} 翻译完成: {} 行，层级 {:?}",
                        translator.name(),
                        lines.len(),
                        tier
                    );
                    return Ok(Self::assemble(lines, result, tier, translator.name()));
                }
                Err(TranslationError::Cancelled) => return Err(TranslationError::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        "{} 全部层级失败，尝试下一个翻译服务: {}",
                        translator.name(),
                        e
                    );
                }
            }
        }

        tracing::warn!("所有翻译服务均失败，{} 行保留原文", lines.len());
        Ok(BatchOutcome::fallback(lines))
    }

    async fn run_ladder(
        &self,
        translator: &dyn Translator,
        lines: &[String],
        target_lang: &str,
        cancel: &CancelToken,
    ) -> TranslationResult<(BatchTier, TierResult)> {
        let single_error = match self.translate_group(translator, lines, target_lang, cancel).await
        {
            Ok(result) => return Ok((BatchTier::Single, result)),
            Err(TranslationError::Cancelled) => return Err(TranslationError::Cancelled),
            Err(e) => e,
        };

        if lines.len() <= self.chunk_size {
            return Err(single_error);
        }

        log_error(&single_error);
        tracing::warn!(
            "整批请求失败，改为每 {} 行一块 ({} 行)",
            self.chunk_size,
            lines.len()
        );

        let mut merged = Vec::with_capacity(lines.len());
        let mut detected_lang = None;
        for chunk in lines.chunks(self.chunk_size) {
            let result = self.translate_group(translator, chunk, target_lang, cancel).await?;
            merged.extend(result.lines);
            detected_lang = detected_lang.or(result.detected_lang);
        }

        Ok((
            BatchTier::Chunked,
            TierResult {
                lines: merged,
                detected_lang,
            },
        ))
    }

    /// 一次请求翻译一组行；单行时不加标记
    async fn translate_group(
        &self,
        translator: &dyn Translator,
        lines: &[String],
        target_lang: &str,
        cancel: &CancelToken,
    ) -> TranslationResult<TierResult> {
        if let [line] = lines {
            let output = self
                .executor
                .translate(translator, line, target_lang, cancel)
                .await?;
            return Ok(TierResult {
                lines: vec![normalize_translation(&output.text)],
                detected_lang: output.detected_lang,
            });
        }

        let codec = MarkerCodec::new()?;
        let payload = codec.encode(lines);
        let output = self
            .executor
            .translate(translator, &payload, target_lang, cancel)
            .await?;

        let decoded = codec.decode(&output.text, lines.len()).map_err(|e| {
            tracing::debug!("批次 {} 解码失败: {}", codec.nonce(), e);
            e
        })?;

        Ok(TierResult {
            lines: decoded,
            detected_lang: output.detected_lang,
        })
    }

    fn assemble(
        lines: &[String],
        result: TierResult,
        tier: BatchTier,
        vendor: &str,
    ) -> BatchOutcome {
        let translated = lines
            .iter()
            .zip(result.lines)
            .map(|(original, text)| {
                if text.is_empty() {
                    TranslatedLine::untouched(original)
                } else {
                    TranslatedLine {
                        text,
                        was_translated: true,
                    }
                }
            })
            .collect();

        BatchOutcome {
            lines: translated,
            tier,
            vendor: Some(vendor.to_string()),
            detected_lang: result.detected_lang,
        }
    }
}

impl Default for BatchTranslator {
    fn default() -> Self {
        Self::new(
            Arc::new(RequestExecutor::from_config(&TranslationConfig::default())),
            constants::DEFAULT_CHUNK_SIZE,
        )
    }
}
