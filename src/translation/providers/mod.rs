//! 翻译服务抽象
//!
//! 批次协议只依赖 [`Translator`]，具体的 HTTP 服务在 `providers` 特性下提供。

use std::sync::Arc;

use async_trait::async_trait;

use crate::translation::error::{TranslationError, TranslationResult};

#[cfg(feature = "providers")]
pub mod deeplx;
#[cfg(feature = "providers")]
pub mod google;

#[cfg(feature = "providers")]
pub use deeplx::DeepLxTranslator;
#[cfg(feature = "providers")]
pub use google::GoogleTranslator;

/// 一次翻译调用的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorOutput {
    pub text: String,
    /// 服务识别出的源语言
    pub detected_lang: Option<String>,
}

impl TranslatorOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            detected_lang: None,
        }
    }

    pub fn with_detected(mut self, lang: impl Into<String>) -> Self {
        self.detected_lang = Some(lang.into());
        self
    }
}

/// 远程翻译服务
#[async_trait]
pub trait Translator: Send + Sync {
    /// 服务名称，写入缓存条目的 vendor 字段
    fn name(&self) -> &str;

    async fn translate(&self, text: &str, target_lang: &str) -> TranslationResult<TranslatorOutput>;

    /// 检测语言，默认借用一次翻译调用返回的源语言
    async fn detect_language(&self, sample: &str) -> TranslationResult<String> {
        let output = self.translate(sample, "en").await?;
        output
            .detected_lang
            .filter(|lang| !lang.trim().is_empty())
            .ok_or_else(|| {
                TranslationError::ProviderUnavailable(format!("{} 未返回源语言", self.name()))
            })
    }
}

/// 按优先级排列的翻译服务链
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn Translator>>,
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderChain")
            .field("providers", &self.names())
            .finish()
    }
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn Translator>>) -> Self {
        Self { providers }
    }

    /// 首选服务排在最前，其余保持原有顺序
    pub fn ordered(providers: Vec<Arc<dyn Translator>>, preferred: &str) -> Self {
        let (mut first, rest): (Vec<_>, Vec<_>) = providers
            .into_iter()
            .partition(|p| p.name().eq_ignore_ascii_case(preferred));

        if first.is_empty() {
            tracing::warn!("首选翻译服务 {} 不存在，按默认顺序使用", preferred);
        }

        first.extend(rest);
        Self { providers: first }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Translator>> {
        self.providers.iter()
    }

    pub fn primary(&self) -> Option<&Arc<dyn Translator>> {
        self.providers.first()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// 根据配置构建内置 HTTP 翻译服务链
#[cfg(feature = "providers")]
pub fn build_providers(
    config: &crate::translation::config::TranslationConfig,
) -> TranslationResult<ProviderChain> {
    let mut providers: Vec<Arc<dyn Translator>> = Vec::new();

    for name in &config.providers {
        match name.to_ascii_lowercase().as_str() {
            "google" => providers.push(Arc::new(GoogleTranslator::new(
                &config.google_endpoint,
                config.request_timeout(),
            )?)),
            "deeplx" => providers.push(Arc::new(DeepLxTranslator::new(
                &config.deeplx_url,
                config.request_timeout(),
            )?)),
            other => {
                return Err(TranslationError::ConfigError(format!(
                    "未知的翻译服务: {}",
                    other
                )))
            }
        }
    }

    Ok(ProviderChain::ordered(providers, &config.preferred_provider))
}
