//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问，所有变量都以 `SLT_` 开头

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 只有在变量被显式设置时才返回值
    fn get_set() -> Option<EnvResult<T>> {
        env::var(Self::NAME).ok().map(|value| Self::parse(&value))
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "SLT_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 目标语言
    pub struct TargetLang;
    impl EnvVar<String> for TargetLang {
        const NAME: &'static str = "SLT_TARGET_LANG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str =
            "Target language for translation (ISO 639-1, optional region)";

        fn parse(value: &str) -> EnvResult<String> {
            parse_lang_code(value, Self::NAME)
        }
    }

    /// 首选翻译服务
    pub struct Provider;
    impl EnvVar<String> for Provider {
        const NAME: &'static str = "SLT_PROVIDER";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Preferred translation vendor (google, deeplx)";

        fn parse(value: &str) -> EnvResult<String> {
            let name = value.trim().to_lowercase();
            if name.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Provider name cannot be empty".to_string(),
                });
            }
            Ok(name)
        }
    }

    /// DeepLX API 地址
    pub struct DeeplxUrl;
    impl EnvVar<String> for DeeplxUrl {
        const NAME: &'static str = "SLT_DEEPLX_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "DeepLX translation endpoint URL";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(url.to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API URL must start with http:// or https://".to_string(),
                })
            }
        }
    }

    /// 两次请求之间的最小间隔
    pub struct MinRequestInterval;
    impl EnvVar<Duration> for MinRequestInterval {
        const NAME: &'static str = "SLT_MIN_REQUEST_INTERVAL_MS";
        const DEFAULT: Option<Duration> = Some(Duration::from_millis(100));
        const DESCRIPTION: &'static str = "Minimum spacing between outbound vendor calls (ms)";

        fn parse(value: &str) -> EnvResult<Duration> {
            let millis = parse_positive_usize(value, Self::NAME, 0, 60_000)?;
            Ok(Duration::from_millis(millis as u64))
        }
    }

    /// 分块大小
    pub struct ChunkSize;
    impl EnvVar<usize> for ChunkSize {
        const NAME: &'static str = "SLT_CHUNK_SIZE";
        const DEFAULT: Option<usize> = Some(6);
        const DESCRIPTION: &'static str = "Lines per request in the chunked batch tier";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 100)
        }
    }

    /// 同语言时跳过翻译
    pub struct SkipSameLanguage;
    impl EnvVar<bool> for SkipSameLanguage {
        const NAME: &'static str = "SLT_SKIP_SAME_LANGUAGE";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str =
            "Skip translation when lyrics are already in the target language";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 缓存启用状态
    pub struct Enabled;
    impl EnvVar<bool> for Enabled {
        const NAME: &'static str = "SLT_CACHE_ENABLED";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Enable line and track caches";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 持久化缓存文件
    pub struct Path;
    impl EnvVar<PathBuf> for Path {
        const NAME: &'static str = "SLT_CACHE_PATH";
        const DEFAULT: Option<PathBuf> = None;
        const DESCRIPTION: &'static str = "Path of the redb key-value store backing the caches";

        fn parse(value: &str) -> EnvResult<PathBuf> {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Cache path cannot be empty".to_string(),
                });
            }
            Ok(PathBuf::from(shellexpand::tilde(trimmed).as_ref()))
        }
    }
}

// ============================================================================
// 解析辅助函数
// ============================================================================

fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Invalid boolean '{}'. Use: true/false, 1/0, yes/no, on/off", value),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let number: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid non-negative integer".to_string(),
    })?;

    if number < min || number > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value must be between {} and {}", min, max),
        });
    }

    Ok(number)
}

fn parse_lang_code(value: &str, var_name: &str) -> EnvResult<String> {
    let code = value.trim();
    let mut parts = code.splitn(2, ['-', '_']);
    let base = parts.next().unwrap_or_default();
    let region_ok = parts
        .next()
        .map_or(true, |r| !r.is_empty() && r.chars().all(|c| c.is_ascii_alphanumeric()));

    if (2..=3).contains(&base.len()) && base.chars().all(|c| c.is_ascii_alphabetic()) && region_ok {
        Ok(code.to_string())
    } else {
        Err(EnvError {
            variable: var_name.to_string(),
            message: "Language code must look like 'ru', 'ja' or 'zh-CN'".to_string(),
        })
    }
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    docs.push_str("## Core\n\n");
    docs.push_str(&format!(
        "- `{}`: {}\n",
        core::LogLevel::NAME,
        core::LogLevel::DESCRIPTION
    ));

    docs.push_str("\n## Translation\n\n");
    docs.push_str(&format!(
        "- `{}`: {}\n",
        translation::TargetLang::NAME,
        translation::TargetLang::DESCRIPTION
    ));
    docs.push_str(&format!(
        "- `{}`: {}\n",
        translation::Provider::NAME,
        translation::Provider::DESCRIPTION
    ));
    docs.push_str(&format!(
        "- `{}`: {}\n",
        translation::DeeplxUrl::NAME,
        translation::DeeplxUrl::DESCRIPTION
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        translation::MinRequestInterval::NAME,
        translation::MinRequestInterval::DESCRIPTION,
        translation::MinRequestInterval::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        translation::ChunkSize::NAME,
        translation::ChunkSize::DESCRIPTION,
        translation::ChunkSize::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        translation::SkipSameLanguage::NAME,
        translation::SkipSameLanguage::DESCRIPTION,
        translation::SkipSameLanguage::DEFAULT
    ));

    docs.push_str("\n## Cache\n\n");
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        cache::Enabled::NAME,
        cache::Enabled::DESCRIPTION,
        cache::Enabled::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {}\n",
        cache::Path::NAME,
        cache::Path::DESCRIPTION
    ));

    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_parsing() {
        assert!(cache::Enabled::parse("true").unwrap());
        assert!(cache::Enabled::parse("1").unwrap());
        assert!(cache::Enabled::parse("YES").unwrap());
        assert!(!cache::Enabled::parse("off").unwrap());
        assert!(!translation::SkipSameLanguage::parse("0").unwrap());

        assert!(cache::Enabled::parse("maybe").is_err());
    }

    #[test]
    fn test_lang_code_validation() {
        assert_eq!(translation::TargetLang::parse("ru").unwrap(), "ru");
        assert_eq!(translation::TargetLang::parse(" zh-CN ").unwrap(), "zh-CN");
        assert!(translation::TargetLang::parse("russian").is_err());
        assert!(translation::TargetLang::parse("zh-").is_err());
        assert!(translation::TargetLang::parse("").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert!(translation::DeeplxUrl::parse("http://localhost:1188/translate").is_ok());
        assert!(translation::DeeplxUrl::parse("ftp://example.com").is_err());
    }

    #[test]
    fn test_numeric_validation() {
        assert_eq!(translation::ChunkSize::parse("6").unwrap(), 6);
        assert!(translation::ChunkSize::parse("0").is_err());
        assert!(translation::ChunkSize::parse("many").is_err());
        assert_eq!(
            translation::MinRequestInterval::parse("250").unwrap(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_log_level_default() {
        assert_eq!(core::LogLevel::parse("DEBUG").unwrap(), "debug");
        assert!(core::LogLevel::parse("loud").is_err());
    }

    #[test]
    fn test_generate_docs_lists_variables() {
        let docs = generate_env_docs();
        assert!(docs.contains("SLT_TARGET_LANG"));
        assert!(docs.contains("SLT_CACHE_PATH"));
    }
}
