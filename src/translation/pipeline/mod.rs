//! 翻译管道
//!
//! 文本过滤、批次标记协议与降级阶梯

pub mod batch;
pub mod filters;
pub mod markers;

// 重新导出主要类型
pub use batch::{BatchOutcome, BatchTier, BatchTranslator, TranslatedLine};
pub use filters::{
    collapse_whitespace, is_decorative_line, normalize_for_match, normalize_translation,
};
pub use markers::{generate_nonce, DecodeStrategy, MarkerCodec};
