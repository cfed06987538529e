//! 时间轴对齐与逐词进度同步
//!
//! - `types`: 时间轴记录与对齐结果
//! - `host`: 宿主提供的渲染行、播放状态与渲染接口
//! - `aligner`: 外部时间轴与渲染行对齐
//! - `progress`: 逐词渐变进度
//! - `ticker`: 固定节拍的同步循环

pub mod aligner;
pub mod host;
pub mod progress;
pub mod ticker;
pub mod types;

pub use aligner::LineAligner;
pub use host::{
    FrameSink, LineFrame, LiveLine, LiveLineSource, OriginalSignal, OriginalWordSignal,
    PlaybackSource, WordFrame, WordPhase,
};
pub use progress::{split_words, ProgressSource, ProgressSyncEngine, TickInput, WordProgressState};
pub use ticker::{SyncDriver, SyncLoop};
pub use types::{AlignmentResult, AlignmentStrategy, LineTimingRecord, SyncSnapshot, WordTiming};
