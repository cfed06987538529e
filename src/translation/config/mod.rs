//! 翻译配置管理模块
//!
//! 支持配置文件、环境变量和默认值，外加全局常量

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, SyncConfig, TranslationConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 批次协议
    pub const MARKER_PREFIX: &str = "SLT_BATCH";
    pub const PLAIN_DELIMITER: &str = "|||";
    pub const DEFAULT_CHUNK_SIZE: usize = 6;
    pub const NONCE_LEN: usize = 8;

    // 请求节流与重试
    pub const DEFAULT_MIN_REQUEST_INTERVAL_MS: u64 = 100;
    pub const DEFAULT_MAX_RETRY_ATTEMPTS: usize = 3;
    pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;
    pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 2000;
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

    // 默认翻译服务
    pub const DEFAULT_GOOGLE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";
    pub const DEFAULT_DEEPLX_URL: &str = "http://localhost:1188/translate";
    pub const DEFAULT_PROVIDERS: &[&str] = &["google", "deeplx"];

    // 缓存
    pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;
    pub const DEFAULT_LINE_CACHE_CAPACITY: usize = 500;
    pub const DEFAULT_LINE_CACHE_TTL_DAYS: u32 = 7;
    pub const DEFAULT_TRACK_CACHE_CAPACITY: usize = 100;
    pub const DEFAULT_TRACK_CACHE_TTL_DAYS: u32 = 14;
    pub const LINE_CACHE_KEY: &str = "slt:line-cache";
    pub const TRACK_INDEX_KEY: &str = "slt:track-index";
    pub const TRACK_KEY_PREFIX: &str = "slt:track:";

    // 语言检测
    pub const DEFAULT_DETECTION_SAMPLE_CHARS: usize = 500;
    pub const SCRIPT_SHARE_THRESHOLD: f64 = 0.20;
    pub const SCRIPT_CONFIDENCE_CAP: f64 = 0.95;
    pub const STOPWORD_CONFIDENCE_CAP: f64 = 0.8;
    pub const STOPWORD_MIN_HITS: usize = 3;
    pub const STOPWORD_MIN_RATIO: f64 = 0.15;
    pub const STOPWORD_LEAD_FACTOR: f64 = 1.5;
    pub const HEURISTIC_ACCEPT_CONFIDENCE: f64 = 0.7;
    pub const SKIP_CONFIDENCE: f64 = 0.8;
    pub const REMOTE_DETECTION_CONFIDENCE: f64 = 0.9;
    pub const SAMPLE_LINES_PER_SECTION: usize = 5;
    pub const DETECTION_SESSION_CAPACITY: usize = 64;

    // 行对齐
    pub const DEFAULT_ALIGNMENT_RETRY_ATTEMPTS: usize = 8;
    pub const DEFAULT_ALIGNMENT_RETRY_INTERVAL_MS: u64 = 600;

    // 进度同步
    pub const PROGRESS_MIN: f64 = -20.0;
    pub const PROGRESS_MAX: f64 = 100.0;
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;
    pub const DEFAULT_LATCH_THRESHOLD: f64 = 96.0;
    pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.68;
    pub const DEFAULT_JUMP_THRESHOLD: f64 = 15.0;

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "slt.toml",
        ".slt.toml",
        "slt.json",
        "~/.config/slt/config.toml",
        "/etc/slt/config.toml",
    ];
}

/// 便利函数
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(shellexpand::tilde(path).as_ref()).exists())
}

/// 加载配置，失败时退回默认配置
pub fn load_translation_config(target_lang: &str) -> TranslationConfig {
    match ConfigManager::new() {
        Ok(manager) => manager.config_for(target_lang),
        Err(e) => {
            tracing::warn!("配置加载失败，使用默认配置: {}", e);
            TranslationConfig::with_target(target_lang)
        }
    }
}
