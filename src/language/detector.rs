//! 语言检测器
//!
//! 两级启发式，先便宜后昂贵：文字脚本占比 → 停用词命中率。
//! 两者都达不到 0.7 置信度时，对前 500 个字符发起一次远程检测。
//! 结果按曲目缓存在会话内，重复进入同一首歌不会重复请求。

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use super::script::{detect_script, ScriptCounts};
use super::stopwords::detect_stopwords;
use crate::translation::config::{constants, TranslationConfig};
use crate::translation::core::engine::{CancelToken, RequestExecutor};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::filters::is_decorative_line;
use crate::translation::providers::ProviderChain;

/// 判定来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    Script,
    Stopwords,
    Remote,
    Unknown,
}

/// 检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub lang: String,
    /// 取值 [0, 1]
    pub confidence: f64,
    pub source: DetectionSource,
}

impl DetectionResult {
    pub fn unknown() -> Self {
        Self {
            lang: "und".to_string(),
            confidence: 0.0,
            source: DetectionSource::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.confidence <= 0.0
    }
}

/// 是否跳过翻译的判定
#[derive(Debug, Clone, PartialEq)]
pub struct SkipDecision {
    pub skip: bool,
    pub detected: DetectionResult,
    pub reason: Option<String>,
}

impl SkipDecision {
    pub fn detected_language(&self) -> &str {
        &self.detected.lang
    }
}

/// 取语言代码的主干部分：`zh-CN` → `zh`，并合并旧代码
pub fn base_language(code: &str) -> String {
    let base = code
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    match base.as_str() {
        "iw" => "he".to_string(),
        "in" => "id".to_string(),
        "ji" => "yi".to_string(),
        "jw" => "jv".to_string(),
        _ => base,
    }
}

/// 同一语言（忽略地区）
pub fn same_language(a: &str, b: &str) -> bool {
    let a = base_language(a);
    !a.is_empty() && a == base_language(b)
}

/// 仅用启发式判定
pub fn detect_heuristic(text: &str) -> DetectionResult {
    if let Some(guess) = detect_script(text) {
        return DetectionResult {
            lang: guess.lang.to_string(),
            confidence: guess.confidence,
            source: DetectionSource::Script,
        };
    }

    // 停用词只对拉丁字母为主的文本有意义
    if ScriptCounts::count(text).latin_share_of_letters() >= 0.5 {
        if let Some(guess) = detect_stopwords(text) {
            return DetectionResult {
                lang: guess.lang.to_string(),
                confidence: guess.confidence,
                source: DetectionSource::Stopwords,
            };
        }
    }

    DetectionResult::unknown()
}

/// 取开头、中间、结尾各 5 行非装饰行作为检测样本
pub fn build_sample(lines: &[String]) -> String {
    let content: Vec<&str> = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !is_decorative_line(l))
        .collect();

    let per_section = constants::SAMPLE_LINES_PER_SECTION;
    if content.len() <= per_section * 3 {
        return content.join("\n");
    }

    let middle_start = content.len() / 2 - per_section / 2;
    let mut picked = Vec::with_capacity(per_section * 3);
    picked.extend_from_slice(&content[..per_section]);
    picked.extend_from_slice(&content[middle_start..middle_start + per_section]);
    picked.extend_from_slice(&content[content.len() - per_section..]);
    picked.join("\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// 语言检测器
pub struct LanguageDetector {
    executor: Arc<RequestExecutor>,
    providers: ProviderChain,
    sample_chars: usize,
    session: Mutex<LruCache<String, DetectionResult>>,
}

impl LanguageDetector {
    pub fn new(
        executor: Arc<RequestExecutor>,
        providers: ProviderChain,
        sample_chars: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(constants::DETECTION_SESSION_CAPACITY)
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            executor,
            providers,
            sample_chars: sample_chars.max(1),
            session: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn from_config(
        executor: Arc<RequestExecutor>,
        providers: ProviderChain,
        config: &TranslationConfig,
    ) -> Self {
        Self::new(executor, providers, config.detection_sample_chars)
    }

    fn cached(&self, track_id: &str) -> Option<DetectionResult> {
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        session.get(track_id).cloned()
    }

    fn remember(&self, track_id: &str, result: &DetectionResult) {
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        session.put(track_id.to_string(), result.clone());
    }

    /// 清空会话缓存
    pub fn forget_session(&self) {
        self.session.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// 完整检测：启发式不足时调用一次远程检测
    pub async fn detect(
        &self,
        text: &str,
        track_id: Option<&str>,
        cancel: &CancelToken,
    ) -> TranslationResult<DetectionResult> {
        if let Some(result) = track_id.and_then(|id| self.cached(id)) {
            tracing::debug!(
                "命中会话语言缓存: {} -> {}",
                track_id.unwrap_or_default(),
                result.lang
            );
            return Ok(result);
        }

        let heuristic = detect_heuristic(text);
        let result = if heuristic.confidence >= constants::HEURISTIC_ACCEPT_CONFIDENCE {
            heuristic
        } else {
            self.detect_remote(text, heuristic, cancel).await?
        };

        if let Some(id) = track_id {
            self.remember(id, &result);
        }
        Ok(result)
    }

    async fn detect_remote(
        &self,
        text: &str,
        heuristic: DetectionResult,
        cancel: &CancelToken,
    ) -> TranslationResult<DetectionResult> {
        let Some(provider) = self.providers.primary() else {
            return Ok(heuristic);
        };

        let sample = truncate_chars(text, self.sample_chars);
        if sample.trim().is_empty() {
            return Ok(DetectionResult::unknown());
        }

        match self
            .executor
            .detect_language(provider.as_ref(), sample, cancel)
            .await
        {
            Ok(lang) => {
                let lang = lang.trim().to_ascii_lowercase();
                if lang.is_empty() || lang == "und" || lang == "auto" {
                    tracing::debug!("远程检测无法确定语言");
                    Ok(DetectionResult::unknown())
                } else {
                    Ok(DetectionResult {
                        lang: base_language(&lang),
                        confidence: constants::REMOTE_DETECTION_CONFIDENCE,
                        source: DetectionSource::Remote,
                    })
                }
            }
            Err(TranslationError::Cancelled) => Err(TranslationError::Cancelled),
            Err(e) => {
                tracing::warn!("远程语言检测失败，使用启发式结果: {}", e);
                Ok(heuristic)
            }
        }
    }

    /// 判断歌词是否已经是目标语言
    pub async fn should_skip_translation(
        &self,
        lines: &[String],
        target_lang: &str,
        track_id: Option<&str>,
        cancel: &CancelToken,
    ) -> TranslationResult<SkipDecision> {
        let sample = build_sample(lines);
        let quick = detect_heuristic(&sample);

        if quick.confidence >= constants::SKIP_CONFIDENCE && same_language(&quick.lang, target_lang)
        {
            tracing::info!(
                "歌词已是目标语言 {} (置信度 {:.2})，跳过翻译",
                target_lang,
                quick.confidence
            );
            if let Some(id) = track_id {
                self.remember(id, &quick);
            }
            return Ok(SkipDecision {
                skip: true,
                reason: Some(format!("歌词已是目标语言 {}", quick.lang)),
                detected: quick,
            });
        }

        let full_text: Vec<&str> = lines
            .iter()
            .map(|l| l.as_str())
            .filter(|l| !is_decorative_line(l))
            .collect();
        let detected = self.detect(&full_text.join("\n"), track_id, cancel).await?;

        let skip = detected.confidence >= constants::SKIP_CONFIDENCE
            && same_language(&detected.lang, target_lang);
        let reason = skip.then(|| format!("歌词已是目标语言 {}", detected.lang));

        Ok(SkipDecision {
            skip,
            detected,
            reason,
        })
    }
}
