//! 宿主接口
//!
//! 页面结构、播放器状态与渲染都属于宿主，这里只定义同步所需的最小契约。

use async_trait::async_trait;

/// 界面上当前渲染的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveLine {
    pub text: String,
    /// 宿主用来定位渲染节点的句柄
    pub handle: u64,
}

impl LiveLine {
    pub fn new(text: impl Into<String>, handle: u64) -> Self {
        Self {
            text: text.into(),
            handle,
        }
    }
}

/// 读取当前渲染行
#[async_trait]
pub trait LiveLineSource: Send + Sync {
    async fn live_lines(&self) -> Vec<LiveLine>;
}

/// 固定的渲染行列表
#[async_trait]
impl LiveLineSource for Vec<LiveLine> {
    async fn live_lines(&self) -> Vec<LiveLine> {
        self.clone()
    }
}

/// 原文单词的演唱进度
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OriginalWordSignal {
    /// 连续进度，取值约 [-20, 100]
    pub position: Option<f64>,
    /// 宿主标记该词已唱过
    pub sung: bool,
    /// 逐字母进度
    pub letters: Vec<f64>,
}

impl OriginalWordSignal {
    pub fn continuous(position: f64) -> Self {
        Self {
            position: Some(position),
            sung: position >= 100.0,
            letters: Vec::new(),
        }
    }

    pub fn sung(sung: bool) -> Self {
        Self {
            position: None,
            sung,
            letters: Vec::new(),
        }
    }
}

/// 原文一行的进度信号
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OriginalSignal {
    pub words: Vec<OriginalWordSignal>,
}

impl OriginalSignal {
    /// 每个词都有连续进度时才可直接使用
    pub fn positions(&self) -> Option<Vec<f64>> {
        if self.words.is_empty() {
            return None;
        }
        self.words.iter().map(|w| w.position).collect()
    }

    /// 已唱词数占比
    pub fn sung_ratio(&self) -> Option<f64> {
        if self.words.is_empty() {
            return None;
        }
        let sung = self.words.iter().filter(|w| w.sung).count();
        Some(sung as f64 / self.words.len() as f64)
    }
}

/// 播放器状态
pub trait PlaybackSource: Send + Sync {
    fn playback_ms(&self) -> f64;

    fn current_track_id(&self) -> Option<String> {
        None
    }

    /// 原文渲染暴露的进度信号
    fn original_signal(&self, _line_index: usize) -> Option<OriginalSignal> {
        None
    }

    /// 宿主直接给出的当前行，优先于时间查找
    fn active_line(&self) -> Option<usize> {
        None
    }
}

/// 单词的显示阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordPhase {
    Future,
    Active,
    Past,
}

/// 一个译文词的渲染帧
#[derive(Debug, Clone, PartialEq)]
pub struct WordFrame {
    pub text: String,
    pub position: f64,
    pub phase: WordPhase,
    pub latched: bool,
    pub letters: Vec<f64>,
}

/// 当前行的渲染帧
#[derive(Debug, Clone, PartialEq)]
pub struct LineFrame {
    pub line_index: usize,
    pub words: Vec<WordFrame>,
}

/// 接收渲染帧
pub trait FrameSink: Send {
    fn render(&mut self, frame: &LineFrame);

    /// 行切换时通知上一行已结束
    fn line_finished(&mut self, _line_index: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_require_every_word() {
        let full = OriginalSignal {
            words: vec![
                OriginalWordSignal::continuous(10.0),
                OriginalWordSignal::continuous(-20.0),
            ],
        };
        assert_eq!(full.positions(), Some(vec![10.0, -20.0]));

        let partial = OriginalSignal {
            words: vec![OriginalWordSignal::continuous(10.0), OriginalWordSignal::sung(false)],
        };
        assert_eq!(partial.positions(), None);
        assert_eq!(partial.sung_ratio(), Some(0.0));
    }

    #[tokio::test]
    async fn test_vec_is_a_live_source() {
        let lines = vec![LiveLine::new("a", 1), LiveLine::new("b", 2)];
        assert_eq!(lines.live_lines().await.len(), 2);
    }
}
