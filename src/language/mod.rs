//! # 语言检测模块
//!
//! - `script` - Unicode 脚本占比启发式
//! - `stopwords` - 拉丁字母语言的停用词启发式
//! - `detector` - 组合启发式、远程检测与会话缓存

pub mod detector;
pub mod script;
pub mod stopwords;

pub use detector::{
    base_language, build_sample, detect_heuristic, same_language, DetectionResult,
    DetectionSource, LanguageDetector, SkipDecision,
};
pub use script::{detect_script, Script};
pub use stopwords::detect_stopwords;
