//! DeepLX 翻译服务

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{Translator, TranslatorOutput};
use crate::translation::error::{TranslationError, TranslationResult};

#[derive(Debug, Serialize)]
struct DeepLxRequest<'a> {
    text: &'a str,
    source_lang: &'a str,
    target_lang: String,
}

#[derive(Debug, Deserialize)]
struct DeepLxResponse {
    code: u16,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    source_lang: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// DeepLX 翻译服务
pub struct DeepLxTranslator {
    client: reqwest::Client,
    endpoint: Url,
}

impl DeepLxTranslator {
    pub fn new(endpoint: &str, timeout: Duration) -> TranslationResult<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            TranslationError::ConfigError(format!("DeepLX 接口地址无效 {}: {}", endpoint, e))
        })?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Translator for DeepLxTranslator {
    fn name(&self) -> &str {
        "deeplx"
    }

    async fn translate(
        &self,
        text: &str,
        target_lang: &str,
    ) -> TranslationResult<TranslatorOutput> {
        let request = DeepLxRequest {
            text,
            source_lang: "auto",
            target_lang: target_lang.to_ascii_uppercase(),
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationError::Http {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let body = response.text().await?;
        parse_deeplx_response(&body)
    }
}

pub fn parse_deeplx_response(body: &str) -> TranslationResult<TranslatorOutput> {
    let parsed: DeepLxResponse = serde_json::from_str(body)
        .map_err(|e| TranslationError::ParseError(format!("DeepLX 响应解析失败: {}", e)))?;

    if parsed.code != 200 {
        return Err(TranslationError::Http {
            status: parsed.code,
            message: parsed.message.unwrap_or_else(|| "DeepLX 返回错误".to_string()),
        });
    }

    let text = parsed
        .data
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| TranslationError::ParseError("DeepLX 返回空译文".to_string()))?;

    let mut output = TranslatorOutput::new(text);
    if let Some(lang) = parsed.source_lang.filter(|l| !l.is_empty()) {
        output = output.with_detected(lang.to_ascii_lowercase());
    }
    Ok(output)
}
