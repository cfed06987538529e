//! 逐词进度同步
//!
//! 每个节拍为当前行的每个译文词计算一个渐变位置（-20 表示未开始，100 表示已唱完）。
//!
//! 进度来源按优先级：
//! 1. 原文每个词都有连续进度，且译文词数与原文相同时逐一对应
//! 2. 词数不同时按比例分配：同一原文词对应的多个译文词依次推进，
//!    多个原文词对应一个译文词时取平均
//! 3. 只有"已唱"标记时用已唱比例
//! 4. 时间轴带逐词时间时按词计时（音节合并成词），同样按比例分配
//! 5. 最后用播放时间在行内的比例
//!
//! 行激活期间位置只增不减，小幅前进按平滑系数阻尼，大幅跳变立即生效；
//! 达到锁定阈值后固定在最大值，直到换行。字母进度同样只增不减。

use std::ops::Range;

use super::host::{LineFrame, OriginalSignal, WordFrame, WordPhase};
use super::types::{LineTimingRecord, WordTiming};
use crate::language::Script;
use crate::translation::config::{constants, SyncConfig};

/// 小于该增量时直接到位，避免无限逼近
const SNAP_EPSILON: f64 = 0.05;

/// 单个译文词的进度状态，随行切换重建
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordProgressState {
    pub gradient_position: f64,
    pub latched_to_max: bool,
}

impl Default for WordProgressState {
    fn default() -> Self {
        Self {
            gradient_position: constants::PROGRESS_MIN,
            latched_to_max: false,
        }
    }
}

impl WordProgressState {
    /// 朝目标推进一步，返回新的位置
    pub fn advance(&mut self, target: f64, config: &SyncConfig) -> f64 {
        if self.latched_to_max {
            return constants::PROGRESS_MAX;
        }

        let target = target.clamp(constants::PROGRESS_MIN, constants::PROGRESS_MAX);
        let delta = target - self.gradient_position;

        if delta > config.jump_threshold || (delta > 0.0 && delta < SNAP_EPSILON) {
            self.gradient_position = target;
        } else if delta > 0.0 {
            self.gradient_position += delta * config.smoothing_factor;
        }

        if self.gradient_position >= config.latch_threshold {
            self.latched_to_max = true;
            self.gradient_position = constants::PROGRESS_MAX;
        }

        self.gradient_position
    }

    pub fn phase(&self) -> WordPhase {
        if self.latched_to_max || self.gradient_position >= constants::PROGRESS_MAX {
            WordPhase::Past
        } else if self.gradient_position <= 0.0 {
            WordPhase::Future
        } else {
            WordPhase::Active
        }
    }
}

/// 本次节拍使用的进度来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSource {
    /// 原文逐词进度，词数一致
    Direct,
    /// 原文逐词进度，按比例分配
    Proportional,
    /// 原文已唱词数比例
    SungRatio,
    /// 时间轴中的逐词时间
    WordTimed,
    /// 播放时间比例
    Timed,
    /// 没有任何进度信息（占位行）
    Unavailable,
}

/// 一次节拍的输入
#[derive(Debug, Clone, Copy)]
pub struct TickInput<'a> {
    pub line_index: usize,
    pub translated: &'a str,
    pub line: &'a LineTimingRecord,
    pub original: Option<&'a OriginalSignal>,
    pub playback_ms: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct WordTarget {
    position: f64,
    letters: Option<Vec<f64>>,
}

/// 译文词与原文词的对应关系
#[derive(Debug, Clone, PartialEq, Eq)]
struct Coverage {
    originals: Range<usize>,
    group: usize,
    offset: usize,
}

/// 进度同步引擎，只服务当前激活的一行
#[derive(Debug, Clone)]
pub struct ProgressSyncEngine {
    config: SyncConfig,
    line_index: Option<usize>,
    states: Vec<WordProgressState>,
    /// 上一帧每个词的字母进度
    letters: Vec<Vec<f64>>,
    last_source: Option<ProgressSource>,
}

impl Default for ProgressSyncEngine {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

impl ProgressSyncEngine {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            line_index: None,
            states: Vec::new(),
            letters: Vec::new(),
            last_source: None,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn current_line(&self) -> Option<usize> {
        self.line_index
    }

    pub fn states(&self) -> &[WordProgressState] {
        &self.states
    }

    pub fn last_source(&self) -> Option<ProgressSource> {
        self.last_source
    }

    /// 丢弃所有状态（换歌或快照替换）
    pub fn reset(&mut self) {
        self.line_index = None;
        self.states.clear();
        self.letters.clear();
        self.last_source = None;
    }

    fn begin_line(&mut self, line_index: usize, words: usize) {
        tracing::trace!("进度同步切换到第 {} 行 ({} 个词)", line_index, words);
        self.line_index = Some(line_index);
        self.states = vec![WordProgressState::default(); words];
        self.letters = vec![Vec::new(); words];
    }

    /// 推进一个节拍并返回当前行的渲染帧
    pub fn tick(&mut self, input: TickInput<'_>) -> LineFrame {
        let words = split_words(input.translated);
        if self.line_index != Some(input.line_index) || self.states.len() != words.len() {
            self.begin_line(input.line_index, words.len());
        }

        let (targets, source) = compute_targets(
            words.len(),
            input.original,
            input.line,
            input.playback_ms,
        );
        self.last_source = Some(source);

        let config = &self.config;
        let frames = words
            .into_iter()
            .zip(self.states.iter_mut().zip(self.letters.iter_mut()))
            .zip(targets)
            .map(|((text, (state, previous)), target)| {
                let position = state.advance(target.position, config);
                let mut letters = letter_positions(&text, state, target.letters.as_deref());
                for (letter, &before) in letters.iter_mut().zip(previous.iter()) {
                    *letter = letter.max(before);
                }
                previous.clone_from(&letters);
                WordFrame {
                    text,
                    position,
                    phase: state.phase(),
                    latched: state.latched_to_max,
                    letters,
                }
            })
            .collect();

        LineFrame {
            line_index: input.line_index,
            words: frames,
        }
    }
}

/// 拆分译文词
///
/// 按空白拆分；不用空格分词的汉字/假名逐字拆开，标点附在相邻的字上。
pub fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();

    for token in text.split_whitespace() {
        if !token.chars().any(is_unspaced) {
            words.push(token.to_string());
            continue;
        }

        let mut pending = String::new();
        for c in token.chars() {
            if is_unspaced(c) && pending.chars().any(is_unspaced) {
                words.push(std::mem::take(&mut pending));
            }
            pending.push(c);
        }
        if !pending.is_empty() {
            words.push(pending);
        }
    }

    words
}

fn is_unspaced(c: char) -> bool {
    matches!(Script::of(c), Some(Script::Han) | Some(Script::Kana))
}

fn compute_targets(
    count: usize,
    original: Option<&OriginalSignal>,
    line: &LineTimingRecord,
    playback_ms: f64,
) -> (Vec<WordTarget>, ProgressSource) {
    if count == 0 {
        return (Vec::new(), ProgressSource::Unavailable);
    }

    if let Some(signal) = original {
        if let Some(positions) = signal.positions() {
            let source = if positions.len() == count {
                ProgressSource::Direct
            } else {
                ProgressSource::Proportional
            };
            let targets = coverage(count, positions.len())
                .into_iter()
                .map(|span| word_target(Some(signal), &positions, &span))
                .collect();
            return (targets, source);
        }

        if let Some(ratio) = signal.sung_ratio() {
            return (sweep_targets(count, ratio), ProgressSource::SungRatio);
        }
    }

    let timed = line
        .words
        .as_deref()
        .and_then(|words| timed_positions(words, playback_ms));
    if let Some(positions) = timed {
        let targets = coverage(count, positions.len())
            .into_iter()
            .map(|span| word_target(None, &positions, &span))
            .collect();
        return (targets, ProgressSource::WordTimed);
    }

    match line.time_ratio(playback_ms) {
        Some(ratio) => (sweep_targets(count, ratio), ProgressSource::Timed),
        None => (
            vec![
                WordTarget {
                    position: constants::PROGRESS_MIN,
                    letters: None,
                };
                count
            ],
            ProgressSource::Unavailable,
        ),
    }
}

/// 计算每个译文词覆盖的原文词
fn coverage(translated: usize, originals: usize) -> Vec<Coverage> {
    if translated >= originals {
        let owner: Vec<usize> = (0..translated).map(|i| i * originals / translated).collect();
        owner
            .iter()
            .enumerate()
            .map(|(i, &o)| {
                let first = owner.iter().position(|&x| x == o).unwrap_or(i);
                let group = owner.iter().filter(|&&x| x == o).count();
                Coverage {
                    originals: o..o + 1,
                    group,
                    offset: i - first,
                }
            })
            .collect()
    } else {
        (0..translated)
            .map(|i| Coverage {
                originals: i * originals / translated..(i + 1) * originals / translated,
                group: 1,
                offset: 0,
            })
            .collect()
    }
}

fn word_target(signal: Option<&OriginalSignal>, positions: &[f64], span: &Coverage) -> WordTarget {
    let covered = &positions[span.originals.clone()];
    let progress = covered.iter().sum::<f64>() / covered.len().max(1) as f64;

    // 原文词内部的 [0,1] 区间再切成 group 段，依次推进
    let fraction = progress.clamp(0.0, constants::PROGRESS_MAX) / constants::PROGRESS_MAX;
    let local = (fraction * span.group as f64 - span.offset as f64).clamp(0.0, 1.0);
    let position = if local > 0.0 {
        local * constants::PROGRESS_MAX
    } else if span.offset == 0 {
        progress.clamp(constants::PROGRESS_MIN, 0.0)
    } else {
        constants::PROGRESS_MIN
    };

    WordTarget {
        position,
        letters: signal.and_then(|signal| source_letters(signal, span)),
    }
}

/// 按逐词时间计算原文每个词的进度，音节先合并成词
fn timed_positions(words: &[WordTiming], playback_ms: f64) -> Option<Vec<f64>> {
    let mut spans: Vec<(f64, f64)> = Vec::new();
    let mut joined = false;
    for word in words {
        match spans.last_mut() {
            Some(span) if joined => span.1 = span.1.max(word.end_ms),
            _ => spans.push((word.start_ms, word.end_ms)),
        }
        joined = word.is_part_of_word;
    }

    if spans.is_empty() {
        return None;
    }

    let positions = spans
        .into_iter()
        .map(|(start, end)| {
            if playback_ms < start {
                constants::PROGRESS_MIN
            } else if end <= start || playback_ms >= end {
                constants::PROGRESS_MAX
            } else {
                (playback_ms - start) / (end - start) * constants::PROGRESS_MAX
            }
        })
        .collect();
    Some(positions)
}

/// 原文字母进度中属于该译文词的一段
fn source_letters(signal: &OriginalSignal, span: &Coverage) -> Option<Vec<f64>> {
    let letters: Vec<f64> = signal.words[span.originals.clone()]
        .iter()
        .flat_map(|w| w.letters.iter().copied())
        .collect();
    if letters.len() < 2 {
        return None;
    }

    let start = span.offset * letters.len() / span.group;
    let end = (span.offset + 1) * letters.len() / span.group;
    let slice = &letters[start..end.max(start)];
    if slice.is_empty() {
        Some(letters)
    } else {
        Some(slice.to_vec())
    }
}

/// 按整行比例依次扫过每个词
fn sweep_targets(count: usize, ratio: f64) -> Vec<WordTarget> {
    let covered = ratio.clamp(0.0, 1.0) * count as f64;
    (0..count)
        .map(|i| WordTarget {
            position: sweep_position(covered - i as f64),
            letters: None,
        })
        .collect()
}

fn sweep_position(local: f64) -> f64 {
    let local = local.clamp(0.0, 1.0);
    if local > 0.0 {
        local * constants::PROGRESS_MAX
    } else {
        constants::PROGRESS_MIN
    }
}

fn letter_positions(text: &str, state: &WordProgressState, source: Option<&[f64]>) -> Vec<f64> {
    let n = text.chars().count().max(1);
    if state.latched_to_max {
        return vec![constants::PROGRESS_MAX; n];
    }

    match source {
        Some(letters) if !letters.is_empty() => (0..n)
            .map(|j| {
                letters[j * letters.len() / n]
                    .clamp(constants::PROGRESS_MIN, constants::PROGRESS_MAX)
            })
            .collect(),
        _ => {
            let covered = state.gradient_position.max(0.0) / constants::PROGRESS_MAX * n as f64;
            (0..n).map(|j| sweep_position(covered - j as f64)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::host::OriginalWordSignal;

    fn line() -> LineTimingRecord {
        LineTimingRecord::new("original", 0.0, 1000.0)
    }

    fn continuous(positions: &[f64]) -> OriginalSignal {
        OriginalSignal {
            words: positions.iter().map(|&p| OriginalWordSignal::continuous(p)).collect(),
        }
    }

    fn tick(
        engine: &mut ProgressSyncEngine,
        translated: &str,
        original: Option<&OriginalSignal>,
        playback_ms: f64,
    ) -> LineFrame {
        let line = line();
        engine.tick(TickInput {
            line_index: 0,
            translated,
            line: &line,
            original,
            playback_ms,
        })
    }

    #[test]
    fn test_split_words() {
        assert_eq!(split_words(" hello   world "), vec!["hello", "world"]);
        assert_eq!(split_words("你好世界"), vec!["你", "好", "世", "界"]);
        assert_eq!(split_words("「你好，世界」"), vec!["「你", "好，", "世", "界」"]);
        assert!(split_words("   ").is_empty());
    }

    #[test]
    fn test_direct_mapping_when_counts_match() {
        let mut engine = ProgressSyncEngine::default();
        let signal = continuous(&[50.0, -20.0]);
        let frame = tick(&mut engine, "a b", Some(&signal), 0.0);

        assert_eq!(engine.last_source(), Some(ProgressSource::Direct));
        assert_eq!(frame.words[0].position, 50.0);
        assert_eq!(frame.words[0].phase, WordPhase::Active);
        assert_eq!(frame.words[1].position, -20.0);
        assert_eq!(frame.words[1].phase, WordPhase::Future);
    }

    #[test]
    fn test_one_original_word_advances_translations_sequentially() {
        let mut engine = ProgressSyncEngine::default();
        let signal = continuous(&[50.0]);
        let frame = tick(&mut engine, "first second", Some(&signal), 0.0);

        assert_eq!(engine.last_source(), Some(ProgressSource::Proportional));
        assert_eq!(frame.words[0].position, 100.0);
        assert!(frame.words[0].latched);
        assert_eq!(frame.words[1].position, -20.0);
    }

    #[test]
    fn test_many_original_words_are_averaged() {
        let mut engine = ProgressSyncEngine::default();
        let signal = continuous(&[100.0, 100.0, 0.0, 0.0]);
        let frame = tick(&mut engine, "x y", Some(&signal), 0.0);

        assert_eq!(frame.words[0].position, 100.0);
        assert_eq!(frame.words[1].position, 0.0);
        assert_eq!(frame.words[1].phase, WordPhase::Future);
    }

    #[test]
    fn test_sung_ratio_then_time_fallback() {
        let mut engine = ProgressSyncEngine::default();
        let signal = OriginalSignal {
            words: vec![OriginalWordSignal::sung(true), OriginalWordSignal::sung(false)],
        };
        let frame = tick(&mut engine, "a b c d", Some(&signal), 0.0);
        assert_eq!(engine.last_source(), Some(ProgressSource::SungRatio));
        let positions: Vec<f64> = frame.words.iter().map(|w| w.position).collect();
        assert_eq!(positions, vec![100.0, 100.0, -20.0, -20.0]);

        let mut engine = ProgressSyncEngine::default();
        let frame = tick(&mut engine, "a b", None, 500.0);
        assert_eq!(engine.last_source(), Some(ProgressSource::Timed));
        assert_eq!(frame.words[0].position, 100.0);
        assert_eq!(frame.words[1].position, -20.0);
    }

    #[test]
    fn test_placeholder_line_has_no_progress() {
        let mut engine = ProgressSyncEngine::default();
        let placeholder = LineTimingRecord::placeholder("lost");
        let frame = engine.tick(TickInput {
            line_index: 3,
            translated: "a b",
            line: &placeholder,
            original: None,
            playback_ms: 500.0,
        });
        assert_eq!(engine.last_source(), Some(ProgressSource::Unavailable));
        assert!(frame.words.iter().all(|w| w.phase == WordPhase::Future));
    }

    #[test]
    fn test_small_steps_are_smoothed() {
        let mut engine = ProgressSyncEngine::default();
        tick(&mut engine, "a", Some(&continuous(&[10.0])), 0.0);
        let frame = tick(&mut engine, "a", Some(&continuous(&[20.0])), 0.0);

        let expected = 10.0 + 10.0 * constants::DEFAULT_SMOOTHING_FACTOR;
        assert!((frame.words[0].position - expected).abs() < 1e-9);
    }

    #[test]
    fn test_latch_pins_until_line_changes() {
        let mut engine = ProgressSyncEngine::default();
        tick(&mut engine, "a", Some(&continuous(&[97.0])), 0.0);
        let frame = tick(&mut engine, "a", Some(&continuous(&[40.0])), 0.0);
        assert_eq!(frame.words[0].position, 100.0);
        assert_eq!(frame.words[0].phase, WordPhase::Past);

        let next = line();
        let frame = engine.tick(TickInput {
            line_index: 1,
            translated: "a",
            line: &next,
            original: Some(&continuous(&[40.0])),
            playback_ms: 0.0,
        });
        assert_eq!(frame.words[0].position, 40.0);
        assert!(!frame.words[0].latched);
    }

    #[test]
    fn test_letters_follow_original_letter_progress() {
        let mut engine = ProgressSyncEngine::default();
        let signal = OriginalSignal {
            words: vec![OriginalWordSignal {
                position: Some(30.0),
                sung: false,
                letters: vec![100.0, 50.0, 0.0, -20.0],
            }],
        };
        let frame = tick(&mut engine, "ab", Some(&signal), 0.0);
        assert_eq!(frame.words[0].letters, vec![100.0, 0.0]);
    }

    #[test]
    fn test_letters_sweep_without_letter_signal() {
        let mut engine = ProgressSyncEngine::default();
        let frame = tick(&mut engine, "abcd", Some(&continuous(&[50.0])), 0.0);
        assert_eq!(frame.words[0].letters, vec![100.0, 100.0, -20.0, -20.0]);
    }

    #[test]
    fn test_word_timing_merges_syllables() {
        let word = |text: &str, start_ms: f64, end_ms: f64, is_part_of_word: bool| WordTiming {
            text: text.to_string(),
            start_ms,
            end_ms,
            is_part_of_word,
        };
        let mut line = line();
        line.words = Some(vec![
            word("lo", 0.0, 200.0, true),
            word("ving", 200.0, 400.0, false),
            word("you", 600.0, 1000.0, false),
        ]);

        let mut engine = ProgressSyncEngine::default();
        let frame = engine.tick(TickInput {
            line_index: 0,
            translated: "dich lieben",
            line: &line,
            original: None,
            playback_ms: 300.0,
        });

        // "lo" + "ving" 合并为 0..400，"you" 尚未开始
        assert_eq!(engine.last_source(), Some(ProgressSource::WordTimed));
        assert_eq!(frame.words[0].position, 75.0);
        assert_eq!(frame.words[1].position, -20.0);

        let positions = timed_positions(line.words.as_deref().unwrap(), 800.0).unwrap();
        assert_eq!(positions, vec![100.0, 50.0]);
        assert!(timed_positions(&[], 800.0).is_none());
    }

    #[test]
    fn test_letters_never_regress() {
        let mut engine = ProgressSyncEngine::default();
        let mut previous: Vec<f64> = Vec::new();

        for t in 0..200usize {
            let noise = ((t * 31) % 7) as f64 * 10.0;
            let signal = OriginalSignal {
                words: vec![OriginalWordSignal {
                    position: Some(30.0),
                    sung: false,
                    letters: vec![60.0 - noise, 20.0 - noise, -noise],
                }],
            };
            let frame = tick(&mut engine, "abc", Some(&signal), 0.0);
            let letters = frame.words[0].letters.clone();
            for (next, prev) in letters.iter().zip(&previous) {
                assert!(next >= prev, "字母回退: {} -> {}", prev, next);
            }
            previous = letters;
        }
        assert_eq!(previous, vec![60.0, 20.0, 0.0]);
    }

    #[test]
    fn test_monotonic_under_noisy_input() {
        for translated in ["solo", "one two three"] {
            let mut engine = ProgressSyncEngine::default();
            let mut history: Vec<Vec<f64>> = Vec::new();

            for t in 0..1000 {
                let base = -20.0 + t as f64 * 0.12;
                let noise = ((t * 37) % 11) as f64 - 5.0;
                let signal = continuous(&[base + noise * 3.0]);
                let frame = tick(&mut engine, translated, Some(&signal), 0.0);
                history.push(frame.words.iter().map(|w| w.position).collect());
            }

            for pair in history.windows(2) {
                for (prev, next) in pair[0].iter().zip(&pair[1]) {
                    assert!(next >= prev, "{} 回退: {} -> {}", translated, prev, next);
                }
            }
            assert!(engine.states().iter().all(|s| s.latched_to_max));
        }
    }
}
