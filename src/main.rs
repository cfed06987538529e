//! slt 命令行入口

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slt::env::{core::LogLevel, EnvVar};
use slt::sync::{LineAligner, LineTimingRecord};
use slt::translation::{
    CancelToken, ConfigManager, TranslateOutcome, TranslateRequest, TranslationConfig,
    TranslationService,
};

/// 同步歌词翻译
#[derive(Parser, Debug)]
#[command(name = "slt", version, about = "Synced lyrics translator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径（默认搜索 slt.toml 等位置）
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 翻译歌词文件，每行一句
    Translate {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// 目标语言
        #[arg(long, short = 'l', value_name = "LANG")]
        lang: Option<String>,

        /// 曲目标识，启用曲目缓存
        #[arg(long, value_name = "ID")]
        track: Option<String>,

        /// 首选翻译服务 (google, deeplx)
        #[arg(long, value_name = "NAME")]
        provider: Option<String>,
    },

    /// 检测歌词语言并判断是否需要翻译
    Detect {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long, short = 'l', value_name = "LANG")]
        lang: Option<String>,
    },

    /// 把 JSON 时间轴与歌词文件对齐
    Align {
        /// 渲染的歌词行
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// LineTimingRecord 数组
        #[arg(long, value_name = "JSON")]
        timing: PathBuf,
    },

    /// 管理翻译缓存
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// 生成示例配置文件
    InitConfig {
        #[arg(value_name = "PATH", default_value = "slt.toml")]
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// 显示缓存统计
    Stats,
    /// 清空缓存
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let cli = Cli::parse();
    slt::translation::init();

    match cli.command {
        Commands::Translate {
            file,
            lang,
            track,
            provider,
        } => {
            let mut config = load_config(cli.config.as_deref(), lang.as_deref())?;
            if let Some(provider) = provider {
                config.preferred_provider = provider;
            }
            let service = TranslationService::with_defaults(config)?;

            let mut request = TranslateRequest::new(read_lines(&file)?);
            if let Some(track) = track {
                request = request.with_track(track);
            }
            let originals = request.lines.clone();

            match service.translate_track(request).await? {
                TranslateOutcome::Translated(result) => {
                    for line in &result.lines {
                        println!("{}", line);
                    }
                    tracing::info!(
                        "完成: {} 行，行缓存命中 {}，服务 {}",
                        result.lines.len(),
                        result.line_cache_hits,
                        result.vendor.as_deref().unwrap_or("-")
                    );
                    if !result.fully_translated {
                        eprintln!("部分歌词未能翻译，保留原文");
                    }
                }
                TranslateOutcome::Skipped(decision) => {
                    eprintln!(
                        "跳过翻译: {}",
                        decision.reason.as_deref().unwrap_or("已是目标语言")
                    );
                    for line in &originals {
                        println!("{}", line);
                    }
                }
                TranslateOutcome::Ignored => eprintln!("已有翻译任务在途"),
            }

            let stats = service.stats().snapshot();
            tracing::debug!("服务统计: {:?}", stats);
        }

        Commands::Detect { file, lang } => {
            let config = load_config(cli.config.as_deref(), lang.as_deref())?;
            let target = config.target_lang.clone();
            let service = TranslationService::with_defaults(config)?;

            let lines = read_lines(&file)?;
            let decision = service
                .detector()
                .should_skip_translation(&lines, &target, None, &CancelToken::new())
                .await?;

            println!("语言: {}", decision.detected_language());
            println!("置信度: {:.2}", decision.detected.confidence);
            println!("来源: {:?}", decision.detected.source);
            println!("跳过翻译到 {}: {}", target, decision.skip);
        }

        Commands::Align { file, timing } => {
            let live = read_lines(&file)?;
            let raw = std::fs::read_to_string(&timing)?;
            let external: Vec<LineTimingRecord> = serde_json::from_str(&raw)?;

            let alignment = LineAligner::align_lists(&external, &live);
            println!(
                "策略: {:?}，{} / {} 行有时间信息",
                alignment.strategy,
                alignment.matched,
                alignment.len()
            );
            for (record, text) in alignment.records.iter().zip(&live) {
                if record.is_placeholder() {
                    println!("   --.--  {}", text);
                } else {
                    println!("{:>8.2}  {}", record.start_ms / 1000.0, text);
                }
            }
        }

        Commands::Cache { action } => {
            let config = load_config(cli.config.as_deref(), None)?;
            let service = TranslationService::with_defaults(config)?;

            match action {
                CacheAction::Stats => match service.cache_stats() {
                    Some(stats) => {
                        println!(
                            "条目: {} (行 {}，曲目 {})",
                            stats.entries, stats.line_entries, stats.track_entries
                        );
                        println!("占用: {} 字节", stats.size_bytes);
                        if let Some(oldest) = stats.oldest_timestamp {
                            let when = chrono::DateTime::from_timestamp_millis(oldest)
                                .map(|t| t.to_rfc3339())
                                .unwrap_or_else(|| oldest.to_string());
                            println!("最早: {}", when);
                        }
                    }
                    None => println!("缓存已禁用"),
                },
                CacheAction::Clear => {
                    service.clear_cache()?;
                    println!("缓存已清空");
                }
            }
        }

        Commands::InitConfig { path } => {
            ConfigManager::generate_example_config(&path)?;
            println!("已生成示例配置文件: {}", path.display());
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| format!("slt={}", LogLevel::get_or_default("info".to_string())));

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(
    path: Option<&Path>,
    lang: Option<&str>,
) -> Result<TranslationConfig, Box<dyn std::error::Error>> {
    let manager = match path {
        Some(path) => ConfigManager::from_path(path)?,
        None => ConfigManager::new()?,
    };

    let mut config = match lang {
        Some(lang) => manager.config_for(lang),
        None => manager.get_config().clone(),
    };

    if config.cache_enabled && config.cache_path.is_none() {
        config.cache_path = default_cache_path();
    }

    Ok(config)
}

/// 平台数据目录下的 redb 文件
fn default_cache_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "slt").map(|dirs| dirs.data_dir().join("cache.redb"))
}

fn read_lines(path: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().map(str::to_string).collect())
}
