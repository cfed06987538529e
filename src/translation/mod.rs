//! 翻译模块
//!
//! 采用清晰的模块化架构：
//! - **core**: 翻译服务与请求执行引擎
//! - **pipeline**: 文本过滤、批次标记协议与降级阶梯
//! - **providers**: 远程翻译服务
//! - **storage**: 行缓存与曲目缓存
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use slt::translation::{TranslateRequest, TranslationConfig, TranslationService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TranslationConfig::with_target("zh");
//! let service = TranslationService::with_defaults(config)?;
//!
//! let lines = vec!["Hello darkness my old friend".to_string()];
//! let outcome = service
//!     .translate_track(TranslateRequest::new(lines).with_track("spotify:track:1"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块 - 常量、翻译配置与配置加载
pub mod config;

/// 核心模块 - 翻译服务、节流、重试与取消
pub mod core;

/// 错误处理模块 - 统一的错误类型和处理机制
pub mod error;

/// 翻译管道模块 - 过滤、标记协议与批次降级
pub mod pipeline;

/// 翻译服务模块 - `Translator` 抽象与内置 HTTP 服务
pub mod providers;

/// 存储管理模块 - 键值存储与两级翻译缓存
pub mod storage;

// ============================================================================
// 核心API导出
// ============================================================================

pub use core::{
    CancelToken, HealthLevel, HealthStatus, ServiceStats, TrackTranslation, TranslateOutcome,
    TranslateRequest, TranslationService,
};

pub use config::{constants, ConfigManager, SyncConfig, TranslationConfig};

pub use error::{ErrorCategory, ErrorSeverity, TranslationError, TranslationResult};

// ============================================================================
// 高级API导出
// ============================================================================

pub use pipeline::{BatchOutcome, BatchTier, BatchTranslator, MarkerCodec, TranslatedLine};

pub use providers::{ProviderChain, Translator, TranslatorOutput};

pub use storage::{CacheStats, KvStore, MemoryStore, RedbStore, TranslationCache};

// ============================================================================
// 便利函数
// ============================================================================

/// 检查翻译配置文件是否存在
pub fn config_file_exists() -> bool {
    config::config_file_exists()
}

/// 加载翻译配置：配置文件、环境变量，最后是默认值
pub fn load_translation_config(target_lang: &str) -> TranslationConfig {
    config::load_translation_config(target_lang)
}

/// 在指定位置生成示例配置文件
pub fn generate_example_config(path: &str) -> TranslationResult<()> {
    ConfigManager::generate_example_config(path)?;
    tracing::info!("已生成示例配置文件: {}", path);
    Ok(())
}

// ============================================================================
// 模块信息
// ============================================================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MODULE_NAME: &str = "translation";

/// 模块信息
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub name: String,
    pub version: String,
    pub features: Vec<String>,
}

/// 获取模块信息
pub fn get_module_info() -> ModuleInfo {
    ModuleInfo {
        name: MODULE_NAME.to_string(),
        version: VERSION.to_string(),
        features: get_enabled_features(),
    }
}

fn get_enabled_features() -> Vec<String> {
    let mut features = vec![
        "line_track_cache".to_string(),
        "batch_markers".to_string(),
        "language_detection".to_string(),
        "alignment".to_string(),
        "progress_sync".to_string(),
    ];

    #[cfg(feature = "providers")]
    features.push("http_providers".to_string());

    #[cfg(feature = "cli")]
    features.push("cli".to_string());

    features
}

/// 模块初始化日志
pub fn init() {
    tracing::info!("翻译模块 v{} 已加载", VERSION);
    tracing::debug!("启用的功能: {:?}", get_enabled_features());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_info() {
        let info = get_module_info();
        assert_eq!(info.name, "translation");
        assert_eq!(info.version, VERSION);
        assert!(info.features.iter().any(|f| f == "batch_markers"));
    }
}
