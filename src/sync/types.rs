//! 时间轴数据结构

use serde::{Deserialize, Serialize};

/// 单个词的时间信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordTiming {
    pub text: String,
    pub start_ms: f64,
    pub end_ms: f64,
    /// 与下一个词同属一个单词（音节拆分）
    #[serde(default)]
    pub is_part_of_word: bool,
}

/// 一行歌词的时间信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineTimingRecord {
    pub text: String,
    pub start_ms: f64,
    pub end_ms: f64,
    #[serde(default)]
    pub is_instrumental: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<WordTiming>>,
}

impl LineTimingRecord {
    pub fn new(text: impl Into<String>, start_ms: f64, end_ms: f64) -> Self {
        Self {
            text: text.into(),
            start_ms,
            end_ms,
            is_instrumental: false,
            words: None,
        }
    }

    /// 找不到匹配时使用的零时长占位
    pub fn placeholder(text: impl Into<String>) -> Self {
        Self::new(text, 0.0, 0.0)
    }

    pub fn is_placeholder(&self) -> bool {
        self.start_ms == 0.0 && self.end_ms == 0.0 && !self.is_instrumental
    }

    /// 有人声且文本非空
    pub fn is_vocal(&self) -> bool {
        !self.is_instrumental && !self.text.trim().is_empty()
    }

    pub fn contains(&self, playback_ms: f64) -> bool {
        !self.is_placeholder() && playback_ms >= self.start_ms && playback_ms < self.end_ms
    }

    /// 时间比例，夹在 [0, 1]
    pub fn time_ratio(&self, playback_ms: f64) -> Option<f64> {
        let span = self.end_ms - self.start_ms;
        if self.is_placeholder() || span <= 0.0 {
            return None;
        }
        Some(((playback_ms - self.start_ms) / span).clamp(0.0, 1.0))
    }
}

/// 对齐方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentStrategy {
    /// 行数一致，按位置对应
    Positional,
    /// 行数不一致，按归一化文本精确匹配
    TextMatch,
}

/// 对齐结果，长度等于界面上实际渲染的行数
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentResult {
    pub records: Vec<LineTimingRecord>,
    pub strategy: AlignmentStrategy,
    /// 拿到真实时间信息的行数
    pub matched: usize,
}

impl AlignmentResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 当前播放位置所在的行
    pub fn active_line(&self, playback_ms: f64) -> Option<usize> {
        self.records
            .iter()
            .rposition(|record| record.contains(playback_ms))
    }
}

/// 同步循环读取的不可变快照
///
/// 翻译流水线每次整体替换，同步循环永远看不到写了一半的数据。
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot {
    pub track_id: Option<String>,
    /// 每个渲染行对应的译文
    pub translations: Vec<String>,
    pub alignment: AlignmentResult,
    /// 单调递增的版本号
    pub generation: u64,
}
