//! # SLT 同步歌词翻译库
//!
//! 把播放客户端中流式显示的歌词翻译成目标语言，并与原文保持时间同步，
//! 逐词呈现卡拉OK式的演唱进度。
//!
//! ## 模块组织
//!
//! - `translation` - 翻译核心（配置、缓存、批次协议、翻译服务）
//! - `language` - 语言检测（文字脚本启发式、停用词启发式、远程检测）
//! - `sync` - 行对齐与逐词进度同步
//! - `env` - 类型安全的环境变量
//! - `utils` - 时钟等工具

pub mod env;
pub mod language;
pub mod sync;
pub mod translation;
pub mod utils;

// Re-export commonly used items for convenience
pub use language::{DetectionResult, LanguageDetector, SkipDecision};
pub use sync::{
    AlignmentResult, LineAligner, LineTimingRecord, ProgressSyncEngine, SyncLoop, SyncSnapshot,
    WordTiming,
};
pub use translation::{
    TranslateOutcome, TranslationConfig, TranslationError, TranslationResult, TranslationService,
};
