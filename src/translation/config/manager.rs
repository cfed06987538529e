//! 配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::env::EnvResult;
use crate::translation::error::{TranslationError, TranslationResult};

/// 逐词进度同步参数
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// 同步循环的固定节拍
    pub tick_interval_ms: u64,
    /// 进度达到该值后锁定到最大值
    pub latch_threshold: f64,
    /// 小幅前进时的平滑系数
    pub smoothing_factor: f64,
    /// 超过该增量的跳变立即生效
    pub jump_threshold: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: constants::DEFAULT_TICK_INTERVAL_MS,
            latch_threshold: constants::DEFAULT_LATCH_THRESHOLD,
            smoothing_factor: constants::DEFAULT_SMOOTHING_FACTOR,
            jump_threshold: constants::DEFAULT_JUMP_THRESHOLD,
        }
    }
}

impl SyncConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// 翻译配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // 基础配置
    pub target_lang: String,
    pub preferred_provider: String,
    pub providers: Vec<String>,
    pub deeplx_url: String,
    pub google_endpoint: String,
    pub request_timeout_secs: u64,

    // 节流与重试
    pub min_request_interval_ms: u64,
    pub max_retry_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,

    // 批次配置
    pub chunk_size: usize,

    // 缓存配置
    pub cache_enabled: bool,
    pub cache_path: Option<PathBuf>,
    pub line_cache_capacity: usize,
    pub line_cache_ttl_days: u32,
    pub track_cache_capacity: usize,
    pub track_cache_ttl_days: u32,

    // 语言检测
    pub skip_same_language: bool,
    pub detection_sample_chars: usize,

    // 行对齐
    pub alignment_retry_attempts: usize,
    pub alignment_retry_interval_ms: u64,

    pub sync: SyncConfig,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            target_lang: "en".to_string(),
            preferred_provider: constants::DEFAULT_PROVIDERS[0].to_string(),
            providers: constants::DEFAULT_PROVIDERS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            deeplx_url: constants::DEFAULT_DEEPLX_URL.to_string(),
            google_endpoint: constants::DEFAULT_GOOGLE_ENDPOINT.to_string(),
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT.as_secs(),

            min_request_interval_ms: constants::DEFAULT_MIN_REQUEST_INTERVAL_MS,
            max_retry_attempts: constants::DEFAULT_MAX_RETRY_ATTEMPTS,
            retry_base_delay_ms: constants::DEFAULT_RETRY_BASE_DELAY_MS,
            retry_max_delay_ms: constants::DEFAULT_RETRY_MAX_DELAY_MS,

            chunk_size: constants::DEFAULT_CHUNK_SIZE,

            cache_enabled: true,
            cache_path: None,
            line_cache_capacity: constants::DEFAULT_LINE_CACHE_CAPACITY,
            line_cache_ttl_days: constants::DEFAULT_LINE_CACHE_TTL_DAYS,
            track_cache_capacity: constants::DEFAULT_TRACK_CACHE_CAPACITY,
            track_cache_ttl_days: constants::DEFAULT_TRACK_CACHE_TTL_DAYS,

            skip_same_language: true,
            detection_sample_chars: constants::DEFAULT_DETECTION_SAMPLE_CHARS,

            alignment_retry_attempts: constants::DEFAULT_ALIGNMENT_RETRY_ATTEMPTS,
            alignment_retry_interval_ms: constants::DEFAULT_ALIGNMENT_RETRY_INTERVAL_MS,

            sync: SyncConfig::default(),
        }
    }
}

impl TranslationConfig {
    /// 创建带指定目标语言的默认配置
    pub fn with_target(target_lang: &str) -> Self {
        Self {
            target_lang: target_lang.to_string(),
            ..Self::default()
        }
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.target_lang.trim().is_empty() {
            return Err(TranslationError::ConfigError("目标语言不能为空".to_string()));
        }

        if self.providers.is_empty() {
            return Err(TranslationError::ConfigError("至少需要一个翻译服务".to_string()));
        }

        if self.chunk_size == 0 {
            return Err(TranslationError::ConfigError("分块大小不能为0".to_string()));
        }

        if self.max_retry_attempts == 0 {
            return Err(TranslationError::ConfigError("重试次数不能为0".to_string()));
        }

        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            return Err(TranslationError::ConfigError(
                "最大退避时间不能小于基础退避时间".to_string(),
            ));
        }

        if self.cache_enabled && (self.line_cache_capacity == 0 || self.track_cache_capacity == 0)
        {
            return Err(TranslationError::ConfigError(
                "启用缓存时缓存容量不能为0".to_string(),
            ));
        }

        if self.line_cache_ttl_days == 0 || self.track_cache_ttl_days == 0 {
            return Err(TranslationError::ConfigError("缓存有效期不能为0天".to_string()));
        }

        if self.detection_sample_chars == 0 {
            return Err(TranslationError::ConfigError("检测样本长度不能为0".to_string()));
        }

        if !(self.sync.smoothing_factor > 0.0 && self.sync.smoothing_factor <= 1.0) {
            return Err(TranslationError::ConfigError(format!(
                "平滑系数必须在 (0, 1] 之间: {}",
                self.sync.smoothing_factor
            )));
        }

        let latch = self.sync.latch_threshold;
        if !(latch > 0.0 && latch <= constants::PROGRESS_MAX) {
            return Err(TranslationError::ConfigError(format!(
                "锁定阈值必须在 (0, 100] 之间: {}",
                self.sync.latch_threshold
            )));
        }

        if self.sync.jump_threshold <= 0.0 {
            return Err(TranslationError::ConfigError("跳变阈值必须大于0".to_string()));
        }

        Ok(())
    }

    /// 应用环境变量覆盖（仅处理显式设置的变量）
    pub fn apply_env_overrides(&mut self) -> EnvResult<()> {
        use crate::env::{cache, translation, EnvVar};

        if let Some(target_lang) = translation::TargetLang::get_set() {
            self.target_lang = target_lang?;
        }

        if let Some(provider) = translation::Provider::get_set() {
            self.preferred_provider = provider?;
            tracing::info!("环境变量覆盖首选翻译服务: {}", self.preferred_provider);
        }

        if let Some(url) = translation::DeeplxUrl::get_set() {
            self.deeplx_url = url?;
            tracing::info!("环境变量覆盖 DeepLX 地址: {}", self.deeplx_url);
        }

        if let Some(interval) = translation::MinRequestInterval::get_set() {
            self.min_request_interval_ms = interval?.as_millis() as u64;
        }

        if let Some(chunk_size) = translation::ChunkSize::get_set() {
            self.chunk_size = chunk_size?;
        }

        if let Some(skip) = translation::SkipSameLanguage::get_set() {
            self.skip_same_language = skip?;
        }

        if let Some(enabled) = cache::Enabled::get_set() {
            self.cache_enabled = enabled?;
        }

        if let Some(path) = cache::Path::get_set() {
            self.cache_path = Some(path?);
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    pub fn alignment_retry_interval(&self) -> Duration {
        Duration::from_millis(self.alignment_retry_interval_ms)
    }

    pub fn line_cache_ttl_ms(&self) -> i64 {
        i64::from(self.line_cache_ttl_days) * constants::DAY_MS
    }

    pub fn track_cache_ttl_ms(&self) -> i64 {
        i64::from(self.track_cache_ttl_days) * constants::DAY_MS
    }
}

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: TranslationConfig,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 搜索默认路径并创建配置管理器
    pub fn new() -> TranslationResult<Self> {
        Self::load_dotenv();

        let source = Self::find_config_file();
        let config = match &source {
            Some(path) => {
                tracing::info!("加载配置文件: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                tracing::info!("未找到配置文件，使用默认配置");
                TranslationConfig::default()
            }
        };

        Self::finish(config, source)
    }

    /// 从指定文件创建配置管理器
    pub fn from_path<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        Self::load_dotenv();

        let expanded = PathBuf::from(shellexpand::tilde(&path.as_ref().to_string_lossy()).as_ref());
        if !expanded.exists() {
            return Err(TranslationError::ConfigError(format!(
                "配置文件不存在: {}",
                expanded.display()
            )));
        }

        tracing::info!("加载配置文件: {}", expanded.display());
        let config = Self::load_from_file(&expanded)?;
        Self::finish(config, Some(expanded))
    }

    fn finish(mut config: TranslationConfig, source: Option<PathBuf>) -> TranslationResult<Self> {
        config
            .apply_env_overrides()
            .map_err(|e| TranslationError::ConfigError(e.to_string()))?;
        config.validate()?;

        Ok(Self { config, source })
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslationConfig {
        &self.config
    }

    /// 配置来源文件
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// 以指定目标语言派生配置
    pub fn config_for(&self, target_lang: &str) -> TranslationConfig {
        if self.config.target_lang == target_lang {
            return self.config.clone();
        }

        TranslationConfig {
            target_lang: target_lang.to_string(),
            ..self.config.clone()
        }
    }

    fn find_config_file() -> Option<PathBuf> {
        constants::CONFIG_PATHS
            .iter()
            .map(|path| PathBuf::from(shellexpand::tilde(path).as_ref()))
            .find(|path| path.exists())
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &Path) -> TranslationResult<TranslationConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::ConfigError(format!("读取配置文件失败: {}", e)))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析TOML配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> TranslationResult<()> {
        let config = TranslationConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| TranslationError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
