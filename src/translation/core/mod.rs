//! 翻译核心
//!
//! - **服务层** (`service.rs`): 统一的翻译入口，协调缓存、语言检测、批次协议与对齐
//! - **引擎层** (`engine.rs`): 节流、重试、取消与请求统计
//!
//! ```text
//! TranslationService (service.rs)
//!     ├── TranslationCache (storage/cache.rs)
//!     ├── LanguageDetector (language/detector.rs)
//!     ├── BatchTranslator (pipeline/batch.rs)
//!     │       └── RequestExecutor (engine.rs)
//!     └── LineAligner (sync/aligner.rs)
//! ```

pub mod engine;
pub mod service;

pub use engine::{
    CancelToken, EngineStats, EngineStatsSnapshot, RateLimiter, RequestExecutor, RetryPolicy,
};
pub use service::{
    map_translations, HealthLevel, HealthStatus, ServiceStats, ServiceStatsSnapshot,
    TrackTranslation, TranslateOutcome, TranslateRequest, TranslationService,
};
