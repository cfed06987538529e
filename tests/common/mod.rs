// 集成测试公共模块
//
// 提供脚本化的翻译服务、歌词样本与服务构建器

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use slt::sync::{LineTimingRecord, LiveLine};
use slt::translation::{
    MemoryStore, ProviderChain, TranslationConfig, TranslationError, TranslationResult,
    TranslationService, Translator, TranslatorOutput,
};
use slt::utils::clock::ManualClock;

/// 脚本化翻译服务的行为
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// 原样转大写，标记保留
    Upper,
    /// 超过给定行数时丢掉标记并把所有行合并成一行
    StripMarkersAbove(usize),
    /// 按行倒序返回（标记保留）
    Reverse,
    /// 总是返回给定状态码
    Fail(u16),
}

/// 按脚本应答并记录所有请求的翻译服务
pub struct ScriptedTranslator {
    name: &'static str,
    script: Script,
    detected: Option<&'static str>,
    gate: Option<Arc<Notify>>,
    payloads: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedTranslator {
    pub fn new(name: &'static str, script: Script) -> Self {
        Self {
            name,
            script,
            detected: None,
            gate: None,
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn upper() -> Self {
        Self::new("upper", Script::Upper)
    }

    pub fn with_detected(mut self, lang: &'static str) -> Self {
        self.detected = Some(lang);
        self
    }

    /// 每次请求都要等 `gate` 放行
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }

    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Translator for ScriptedTranslator {
    fn name(&self) -> &str {
        self.name
    }

    async fn translate(&self, text: &str, _target: &str) -> TranslationResult<TranslatorOutput> {
        self.payloads.lock().unwrap().push(text.to_string());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let body = match self.script {
            Script::Upper => text.to_uppercase(),
            Script::StripMarkersAbove(limit) if text.lines().count() > limit => text
                .to_uppercase()
                .lines()
                .map(|l| l.rsplit("]] ").next().unwrap_or(l).to_string())
                .collect::<Vec<_>>()
                .join(" "),
            Script::StripMarkersAbove(_) => text.to_uppercase(),
            Script::Reverse => {
                let mut lines: Vec<String> = text.lines().map(str::to_uppercase).collect();
                lines.reverse();
                lines.join("\n")
            }
            Script::Fail(status) => {
                return Err(TranslationError::Http {
                    status,
                    message: "scripted failure".to_string(),
                })
            }
        };

        let output = TranslatorOutput::new(body);
        Ok(match self.detected {
            Some(lang) => output.with_detected(lang),
            None => output,
        })
    }
}

/// 测试用配置：不节流、不跳过同语言歌词
#[allow(dead_code)]
pub fn test_config(target: &str) -> TranslationConfig {
    TranslationConfig {
        min_request_interval_ms: 0,
        skip_same_language: false,
        ..TranslationConfig::with_target(target)
    }
}

/// 内存存储 + 手动时钟的服务
#[allow(dead_code)]
pub fn build_service(
    config: TranslationConfig,
    vendors: Vec<Arc<ScriptedTranslator>>,
) -> (Arc<TranslationService>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let providers = ProviderChain::new(
        vendors
            .into_iter()
            .map(|v| v as Arc<dyn Translator>)
            .collect(),
    );
    let service = TranslationService::new(
        config,
        providers,
        Arc::new(MemoryStore::new()),
        clock.clone(),
    )
    .expect("service should build");
    (Arc::new(service), clock)
}

/// `n` 行编号歌词
#[allow(dead_code)]
pub fn numbered_lines(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("line number {}", i)).collect()
}

#[allow(dead_code)]
pub fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// 30 行俄语歌词
#[allow(dead_code)]
pub fn cyrillic_lyrics() -> Vec<String> {
    const VERSES: [&str; 5] = [
        "Я помню чудное мгновенье",
        "Передо мной явилась ты",
        "Как мимолётное виденье",
        "Как гений чистой красоты",
        "В томленьях грусти безнадежной",
    ];
    (0..30).map(|i| VERSES[i % VERSES.len()].to_string()).collect()
}

/// 每行一秒的时间轴
#[allow(dead_code)]
pub fn timed_records(texts: &[&str]) -> Vec<LineTimingRecord> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let start = i as f64 * 1000.0;
            LineTimingRecord::new(*text, start, start + 1000.0)
        })
        .collect()
}

#[allow(dead_code)]
pub fn live_lines(texts: &[&str]) -> Vec<LiveLine> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| LiveLine::new(*text, i as u64))
        .collect()
}
