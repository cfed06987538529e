//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 网络错误（连接失败、响应中断等）
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 翻译服务返回的HTTP错误状态
    #[error("HTTP错误 {status}: {message}")]
    Http { status: u16, message: String },

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 解析错误（翻译服务返回了畸形负载）
    #[error("解析错误: {0}")]
    ParseError(String),

    /// 批次协议解码失败：恢复出的行数与期望不一致
    #[error("批次协议不匹配: 期望 {expected} 行，得到 {found} 行")]
    ProtocolMismatch { expected: usize, found: usize },

    /// 存储配额不足
    #[error("存储配额已满")]
    StorageQuota,

    /// 存储后端错误
    #[error("存储错误: {0}")]
    StorageError(String),

    /// 缓存错误
    #[error("缓存错误: {0}")]
    CacheError(String),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 操作被取消（例如切歌）
    #[error("操作已取消")]
    Cancelled,

    /// 没有可用的翻译服务
    #[error("翻译服务不可用: {0}")]
    ProviderUnavailable(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    ///
    /// 4xx 类请求错误视为该次调用的致命错误，不重试；
    /// 协议不匹配只会升级到更粗粒度的批次层级，同样不重试。
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::NetworkError(_) => true,
            TranslationError::TimeoutError(_) => true,
            TranslationError::ParseError(_) => true,
            TranslationError::Http { status, .. } => !(400..500).contains(status),
            TranslationError::ProviderUnavailable(_) => true,
            TranslationError::InternalError(_) => true,
            TranslationError::ProtocolMismatch { .. } => false,
            TranslationError::Cancelled => false,
            TranslationError::ConfigError(_) => false,
            TranslationError::InvalidInput(_) => false,
            TranslationError::StorageQuota => false,
            TranslationError::StorageError(_) => false,
            TranslationError::CacheError(_) => false,
            TranslationError::SerializationError(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::NetworkError(_) => ErrorSeverity::Warning,
            TranslationError::Http { status, .. } if *status >= 500 => ErrorSeverity::Warning,
            TranslationError::Http { .. } => ErrorSeverity::Error,
            TranslationError::TimeoutError(_) => ErrorSeverity::Warning,
            TranslationError::ParseError(_) => ErrorSeverity::Warning,
            TranslationError::ProtocolMismatch { .. } => ErrorSeverity::Info,
            TranslationError::StorageQuota => ErrorSeverity::Warning,
            TranslationError::StorageError(_) => ErrorSeverity::Error,
            TranslationError::CacheError(_) => ErrorSeverity::Warning,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::Cancelled => ErrorSeverity::Info,
            TranslationError::ProviderUnavailable(_) => ErrorSeverity::Error,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::NetworkError(_) => ErrorCategory::Network,
            TranslationError::TimeoutError(_) => ErrorCategory::Network,
            TranslationError::Http { status, .. } if (400..500).contains(status) => {
                ErrorCategory::Request
            }
            TranslationError::Http { .. } => ErrorCategory::Network,
            TranslationError::ParseError(_) => ErrorCategory::Protocol,
            TranslationError::ProtocolMismatch { .. } => ErrorCategory::Protocol,
            TranslationError::StorageQuota => ErrorCategory::Storage,
            TranslationError::StorageError(_) => ErrorCategory::Storage,
            TranslationError::CacheError(_) => ErrorCategory::Storage,
            TranslationError::InvalidInput(_) => ErrorCategory::Input,
            TranslationError::Cancelled => ErrorCategory::Cancellation,
            TranslationError::ProviderUnavailable(_) => ErrorCategory::Service,
            TranslationError::SerializationError(_) => ErrorCategory::Serialization,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        let suffix = format!(" (上下文: {})", context);

        match &mut self {
            TranslationError::ConfigError(msg)
            | TranslationError::NetworkError(msg)
            | TranslationError::TimeoutError(msg)
            | TranslationError::ParseError(msg)
            | TranslationError::StorageError(msg)
            | TranslationError::CacheError(msg)
            | TranslationError::InvalidInput(msg)
            | TranslationError::ProviderUnavailable(msg)
            | TranslationError::SerializationError(msg)
            | TranslationError::InternalError(msg) => msg.push_str(&suffix),
            TranslationError::Http { message, .. } => message.push_str(&suffix),
            TranslationError::ProtocolMismatch { .. }
            | TranslationError::StorageQuota
            | TranslationError::Cancelled => {}
        }

        self
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Request,
    Protocol,
    Storage,
    Input,
    Cancellation,
    Service,
    Serialization,
    Internal,
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::StorageError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

impl From<redb::Error> for TranslationError {
    fn from(error: redb::Error) -> Self {
        match error {
            redb::Error::Io(e) if e.kind() == std::io::ErrorKind::StorageFull => {
                TranslationError::StorageQuota
            }
            other => TranslationError::StorageError(format!("redb错误: {}", other)),
        }
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

#[cfg(feature = "providers")]
impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(error.to_string())
        } else if let Some(status) = error.status() {
            TranslationError::Http {
                status: status.as_u16(),
                message: error.to_string(),
            }
        } else if error.is_decode() {
            TranslationError::ParseError(error.to_string())
        } else {
            TranslationError::NetworkError(error.to_string())
        }
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误统计信息
#[derive(Debug, Clone, Default)]
pub struct ErrorStats {
    pub total_errors: usize,
    pub by_category: std::collections::HashMap<ErrorCategory, usize>,
    pub by_severity: std::collections::HashMap<ErrorSeverity, usize>,
    pub retryable_errors: usize,
    pub critical_errors: usize,
}

impl ErrorStats {
    /// 记录错误
    pub fn record_error(&mut self, error: &TranslationError) {
        self.total_errors += 1;

        let category = error.category();
        *self.by_category.entry(category).or_insert(0) += 1;

        let severity = error.severity();
        *self.by_severity.entry(severity).or_insert(0) += 1;

        if error.is_retryable() {
            self.retryable_errors += 1;
        }

        if severity == ErrorSeverity::Critical {
            self.critical_errors += 1;
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Default::default();
    }

    /// 获取错误率
    pub fn error_rate(&self, total_operations: usize) -> f64 {
        if total_operations == 0 {
            0.0
        } else {
            self.total_errors as f64 / total_operations as f64
        }
    }
}

/// 按严重程度记录错误
pub fn log_error(error: &TranslationError) {
    match error.severity() {
        ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
        ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
        ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
        ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
    }
}
