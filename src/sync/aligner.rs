//! 行对齐
//!
//! 外部时间轴（M 行，可能含间奏）与界面渲染行（L 行）对齐，输出恰好 L 条记录：
//! 1. 过滤出有人声且非空的外部行（M'）
//! 2. M' == L 时按位置直接对应
//! 3. 否则每隔 600ms 重新读取渲染行，最多 8 次，等待界面追上数据
//! 4. 仍不一致时按归一化文本精确匹配，匹配不到的行用零时长占位
//!
//! 宁可缺少时间信息，也不挂上错误的时间。

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::time::sleep;

use super::host::{LiveLine, LiveLineSource};
use super::types::{AlignmentResult, AlignmentStrategy, LineTimingRecord};
use crate::translation::config::{constants, TranslationConfig};
use crate::translation::core::engine::CancelToken;
use crate::translation::error::TranslationResult;
use crate::translation::pipeline::filters::normalize_for_match;

/// 行对齐器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAligner {
    retry_attempts: usize,
    retry_interval: Duration,
}

impl Default for LineAligner {
    fn default() -> Self {
        Self {
            retry_attempts: constants::DEFAULT_ALIGNMENT_RETRY_ATTEMPTS,
            retry_interval: Duration::from_millis(constants::DEFAULT_ALIGNMENT_RETRY_INTERVAL_MS),
        }
    }
}

impl LineAligner {
    pub fn new(retry_attempts: usize, retry_interval: Duration) -> Self {
        Self {
            retry_attempts,
            retry_interval,
        }
    }

    pub fn from_config(config: &TranslationConfig) -> Self {
        Self::new(config.alignment_retry_attempts, config.alignment_retry_interval())
    }

    /// 只保留有人声的外部行
    pub fn vocal_lines(external: &[LineTimingRecord]) -> Vec<LineTimingRecord> {
        external.iter().filter(|r| r.is_vocal()).cloned().collect()
    }

    /// 对齐并返回最终使用的渲染行
    pub async fn align(
        &self,
        external: &[LineTimingRecord],
        source: &dyn LiveLineSource,
        cancel: &CancelToken,
    ) -> TranslationResult<(AlignmentResult, Vec<LiveLine>)> {
        let vocal = Self::vocal_lines(external);
        let mut live = source.live_lines().await;

        let mut attempt = 0;
        while live.len() != vocal.len() && attempt < self.retry_attempts {
            attempt += 1;
            tracing::debug!(
                "渲染行数 {} 与时间轴行数 {} 不一致，{}ms 后重读 ({}/{})",
                live.len(),
                vocal.len(),
                self.retry_interval.as_millis(),
                attempt,
                self.retry_attempts
            );
            sleep(self.retry_interval).await;
            cancel.check()?;
            live = source.live_lines().await;
        }

        let texts: Vec<String> = live.iter().map(|l| l.text.clone()).collect();
        Ok((Self::align_vocal(vocal, &texts), live))
    }

    /// 不重试的对齐，渲染行只需文本
    pub fn align_lists(external: &[LineTimingRecord], live: &[String]) -> AlignmentResult {
        Self::align_vocal(Self::vocal_lines(external), live)
    }

    fn align_vocal(vocal: Vec<LineTimingRecord>, live: &[String]) -> AlignmentResult {
        if vocal.len() == live.len() {
            let matched = vocal.len();
            return AlignmentResult {
                records: vocal,
                strategy: AlignmentStrategy::Positional,
                matched,
            };
        }

        tracing::warn!(
            "行数仍不一致 (时间轴 {} 行，渲染 {} 行)，改用文本匹配",
            vocal.len(),
            live.len()
        );
        Self::text_match(vocal, live)
    }

    fn text_match(vocal: Vec<LineTimingRecord>, live: &[String]) -> AlignmentResult {
        // 同一文本按出现顺序依次消费，重复的副歌各自拿到自己的时间
        let mut by_text: HashMap<String, VecDeque<LineTimingRecord>> = HashMap::new();
        for record in vocal {
            by_text
                .entry(normalize_for_match(&record.text))
                .or_default()
                .push_back(record);
        }

        let mut matched = 0;
        let records = live
            .iter()
            .map(|text| {
                let key = normalize_for_match(text);
                let hit = if key.is_empty() {
                    None
                } else {
                    by_text.get_mut(&key).and_then(|queue| queue.pop_front())
                };

                match hit {
                    Some(record) => {
                        matched += 1;
                        record
                    }
                    None => {
                        tracing::debug!("渲染行没有匹配的时间信息: {}", text);
                        LineTimingRecord::placeholder(text.clone())
                    }
                }
            })
            .collect();

        AlignmentResult {
            records,
            strategy: AlignmentStrategy::TextMatch,
            matched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(text: &str, start: f64) -> LineTimingRecord {
        LineTimingRecord::new(text, start, start + 1000.0)
    }

    fn instrumental() -> LineTimingRecord {
        LineTimingRecord {
            is_instrumental: true,
            ..LineTimingRecord::new("", 0.0, 5000.0)
        }
    }

    /// 前几次读取返回不完整列表，之后稳定
    struct Lagging {
        reads: AtomicUsize,
        stable_after: usize,
        full: Vec<LiveLine>,
    }

    #[async_trait]
    impl LiveLineSource for Lagging {
        async fn live_lines(&self) -> Vec<LiveLine> {
            let read = self.reads.fetch_add(1, Ordering::SeqCst);
            if read < self.stable_after {
                self.full[..1].to_vec()
            } else {
                self.full.clone()
            }
        }
    }

    #[test]
    fn test_instrumental_and_empty_lines_are_filtered() {
        let external = vec![instrumental(), record("a", 0.0), record("  ", 1.0), record("b", 2.0)];
        let result = LineAligner::align_lists(&external, &["a".into(), "b".into()]);
        assert_eq!(result.strategy, AlignmentStrategy::Positional);
        assert_eq!(result.records[1].text, "b");
    }

    #[test]
    fn test_repeated_lines_consume_in_order() {
        let external = vec![record("la la", 0.0), record("verse", 1000.0), record("la la", 2000.0)];
        let live: Vec<String> =
            vec!["La la!".into(), "extra".into(), "verse".into(), "la la".into()];

        let result = LineAligner::align_lists(&external, &live);
        assert_eq!(result.strategy, AlignmentStrategy::TextMatch);
        assert_eq!(result.records[0].start_ms, 0.0);
        assert!(result.records[1].is_placeholder());
        assert_eq!(result.records[2].start_ms, 1000.0);
        assert_eq!(result.records[3].start_ms, 2000.0);
        assert_eq!(result.matched, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_live_lines_to_stabilize() {
        let source = Lagging {
            reads: AtomicUsize::new(0),
            stable_after: 3,
            full: vec![LiveLine::new("a", 1), LiveLine::new("b", 2)],
        };
        let external = vec![record("a", 0.0), record("b", 1000.0)];

        let (result, live) = LineAligner::default()
            .align(&external, &source, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(result.strategy, AlignmentStrategy::Positional);
        assert_eq!(live.len(), 2);
        assert_eq!(source.reads.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_retry_budget() {
        let source = Lagging {
            reads: AtomicUsize::new(0),
            stable_after: usize::MAX,
            full: vec![LiveLine::new("a", 1), LiveLine::new("b", 2)],
        };
        let external = vec![record("a", 0.0), record("b", 1000.0)];

        let (result, live) = LineAligner::default()
            .align(&external, &source, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(result.strategy, AlignmentStrategy::TextMatch);
        assert_eq!(live.len(), 1);
        assert_eq!(result.records.len(), 1);
        assert_eq!(source.reads.load(Ordering::SeqCst), 9);
    }
}
