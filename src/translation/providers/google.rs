//! Google 翻译（免密钥 gtx 接口）

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::{Translator, TranslatorOutput};
use crate::translation::error::{TranslationError, TranslationResult};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";

/// Google 翻译服务
pub struct GoogleTranslator {
    client: reqwest::Client,
    endpoint: Url,
}

impl GoogleTranslator {
    pub fn new(endpoint: &str, timeout: Duration) -> TranslationResult<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            TranslationError::ConfigError(format!("Google 接口地址无效 {}: {}", endpoint, e))
        })?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, endpoint })
    }

    fn google_lang(lang: &str) -> &str {
        match lang {
            "zh" => "zh-CN",
            "he" => "iw",
            other => other,
        }
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    fn name(&self) -> &str {
        "google"
    }

    async fn translate(
        &self,
        text: &str,
        target_lang: &str,
    ) -> TranslationResult<TranslatorOutput> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("client", "gtx")
            .append_pair("sl", "auto")
            .append_pair("tl", Self::google_lang(target_lang))
            .append_pair("dt", "t");

        // 正文放在表单里，整首歌的批次也不会撑爆 URL
        let response = self
            .client
            .post(url)
            .form(&[("q", text)])
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
        parse_gtx_response(&body)
    }
}

/// 解析 gtx 返回的嵌套数组：`[[["译文","原文",...],...],null,"源语言",...]`
pub fn parse_gtx_response(body: &str) -> TranslationResult<TranslatorOutput> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| TranslationError::ParseError(format!("Google 响应不是有效 JSON: {}", e)))?;

    let sentences = value
        .get(0)
        .and_then(|v| v.as_array())
        .ok_or_else(|| TranslationError::ParseError("Google 响应缺少译文数组".to_string()))?;

    let text: String = sentences
        .iter()
        .filter_map(|sentence| sentence.get(0).and_then(|v| v.as_str()))
        .collect();

    if text.trim().is_empty() {
        return Err(TranslationError::ParseError("Google 返回空译文".to_string()));
    }

    let mut output = TranslatorOutput::new(text);
    if let Some(lang) = value.get(2).and_then(|v| v.as_str()) {
        output = output.with_detected(lang);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_joins_sentence_fragments() {
        let body = concat!(
            r#"[[["Hello, ","Привет, ",null,null,10],["world","мир",null,null,10]],"#,
            r#"null,"ru",null,null,null,1]"#
        );
        let output = parse_gtx_response(body).unwrap();
        assert_eq!(output.text, "Hello, world");
        assert_eq!(output.detected_lang.as_deref(), Some("ru"));
    }

    #[test]
    fn test_parse_rejects_malformed_payloads() {
        assert!(matches!(
            parse_gtx_response("<html>"),
            Err(TranslationError::ParseError(_))
        ));
        assert!(matches!(
            parse_gtx_response(r#"{"error":1}"#),
            Err(TranslationError::ParseError(_))
        ));
        assert!(matches!(
            parse_gtx_response(r#"[[],null,"en"]"#),
            Err(TranslationError::ParseError(_))
        ));
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        let err = GoogleTranslator::new("not a url", Duration::from_secs(1)).err();
        assert!(matches!(err, Some(TranslationError::ConfigError(_))));
    }
}
