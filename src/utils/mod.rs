//! # 工具模块
//!
//! - `clock` - 可替换的时钟，缓存过期判断与测试使用

pub mod clock;

// Re-export commonly used items for convenience
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
