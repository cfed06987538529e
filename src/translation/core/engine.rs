//! 请求执行引擎
//!
//! 所有发往翻译服务的调用都经过这里：
//! - **节流**: 共享的 [`RateLimiter`] 保证相邻两次请求的开始时间至少间隔 100ms，
//!   同一时刻最多只有一个请求在途
//! - **重试**: 指数退避（100ms 起，每次翻倍，上限 2s），4xx 错误不重试
//! - **取消**: 每次网络调用前检查 [`CancelToken`]，切歌时协作式中止
//! - **统计**: 原子计数器记录请求、重试与字符数

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::translation::config::TranslationConfig;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::providers::{Translator, TranslatorOutput};

/// 协作式取消标记
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 已取消时返回 `Cancelled`
    pub fn check(&self) -> TranslationResult<()> {
        if self.is_cancelled() {
            Err(TranslationError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// 最小间隔节流器
///
/// 持有锁直到请求完成，因此请求是串行的。
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_start: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// 等待到允许发起下一次请求后执行 `call`
    pub async fn run<F, Fut, T>(&self, call: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let mut last_start = self.last_start.lock().await;

        if let Some(previous) = *last_start {
            let ready_at = previous + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                sleep(ready_at - now).await;
            }
        }

        *last_start = Some(Instant::now());
        call().await
    }
}

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次失败（从 1 开始）后的等待时间
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1u32 << shift);
        delay.min(self.max_delay)
    }
}

/// 请求执行器
///
/// 组合节流、重试与取消，批次协议和语言检测共用同一个实例。
#[derive(Debug)]
pub struct RequestExecutor {
    limiter: RateLimiter,
    policy: RetryPolicy,
    stats: EngineStats,
}

impl RequestExecutor {
    pub fn new(min_interval: Duration, policy: RetryPolicy) -> Self {
        Self {
            limiter: RateLimiter::new(min_interval),
            policy,
            stats: EngineStats::default(),
        }
    }

    pub fn from_config(config: &TranslationConfig) -> Self {
        Self::new(
            config.min_request_interval(),
            RetryPolicy {
                max_attempts: config.max_retry_attempts.max(1),
                base_delay: config.retry_base_delay(),
                max_delay: config.retry_max_delay(),
            },
        )
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// 带节流与重试的翻译调用
    pub async fn translate(
        &self,
        translator: &dyn Translator,
        text: &str,
        target_lang: &str,
        cancel: &CancelToken,
    ) -> TranslationResult<TranslatorOutput> {
        self.stats.add_characters_sent(text.chars().count());

        let output = self
            .with_retry(translator.name(), cancel, || {
                translator.translate(text, target_lang)
            })
            .await?;

        self.stats.add_characters_received(output.text.chars().count());
        Ok(output)
    }

    /// 带节流与重试的语言检测调用
    pub async fn detect_language(
        &self,
        translator: &dyn Translator,
        sample: &str,
        cancel: &CancelToken,
    ) -> TranslationResult<String> {
        self.with_retry(translator.name(), cancel, || {
            translator.detect_language(sample)
        })
        .await
    }

    async fn with_retry<F, Fut, T>(
        &self,
        vendor: &str,
        cancel: &CancelToken,
        mut call: F,
    ) -> TranslationResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = TranslationResult<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            cancel.check()?;
            self.stats.inc_requests();

            let started = Instant::now();
            let result = self.limiter.run(&mut call).await;
            self.stats.add_request_time(started.elapsed());
            match result {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    self.stats.inc_request_errors();

                    if !e.is_retryable() {
                        tracing::debug!("{} 请求失败，不重试: {}", vendor, e);
                        return Err(e);
                    }

                    if attempt >= max_attempts {
                        tracing::warn!(
                            "{} 请求失败，已重试 {} 次: {}",
                            vendor,
                            max_attempts,
                            e
                        );
                        let context = format!("{} 已重试 {} 次", vendor, max_attempts);
                        return Err(e.with_context(context));
                    }

                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        "{} 请求失败，{}ms后重试 (尝试 {}/{}): {}",
                        vendor,
                        delay.as_millis(),
                        attempt + 1,
                        max_attempts,
                        e
                    );
                    self.stats.inc_retries();
                    sleep(delay).await;
                }
            }
        }
    }
}

/// 请求统计（线程安全）
#[derive(Debug, Default)]
pub struct EngineStats {
    pub requests: AtomicUsize,
    pub request_errors: AtomicUsize,
    pub retries: AtomicUsize,
    pub characters_sent: AtomicUsize,
    pub characters_received: AtomicUsize,
    /// 请求耗时累计（微秒），包含节流等待
    pub total_request_time: AtomicU64,
}

/// 统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStatsSnapshot {
    pub requests: usize,
    pub request_errors: usize,
    pub retries: usize,
    pub characters_sent: usize,
    pub characters_received: usize,
    pub request_time: Duration,
}

impl EngineStats {
    pub fn inc_requests(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_request_errors(&self) {
        self.request_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retries(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_characters_sent(&self, count: usize) {
        self.characters_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_characters_received(&self, count: usize) {
        self.characters_received.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_request_time(&self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.total_request_time.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            request_errors: self.request_errors.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            characters_sent: self.characters_sent.load(Ordering::Relaxed),
            characters_received: self.characters_received.load(Ordering::Relaxed),
            request_time: Duration::from_micros(self.total_request_time.load(Ordering::Relaxed)),
        }
    }

    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.request_errors.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.characters_sent.store(0, Ordering::Relaxed);
        self.characters_received.store(0, Ordering::Relaxed);
        self.total_request_time.store(0, Ordering::Relaxed);
    }
}
