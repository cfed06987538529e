//! 翻译服务
//!
//! 统一的入口，串起一次翻译的完整流程：
//!
//! ```text
//! 曲目缓存 ──命中──▶ 返回
//!    │未命中
//!    ▼
//! 语言检测 ──已是目标语言──▶ 跳过
//!    │
//!    ▼
//! 行缓存逐行查询 ──▶ 未缓存行去重 ──▶ 批次协议 ──▶ 写回两级缓存
//! ```
//!
//! 同一时刻最多一个翻译任务在途，新的触发在完成前被忽略；切歌通过
//! [`CancelToken`] 协作式取消，之后到达的请求等待被取消的任务退出再执行。对齐结果以不可变快照整体发布给同步循环。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{watch, Notify};

use super::engine::{CancelToken, EngineStatsSnapshot, RequestExecutor};
use crate::language::{LanguageDetector, SkipDecision};
use crate::sync::{LineAligner, LineTimingRecord, LiveLine, LiveLineSource, SyncSnapshot};
use crate::translation::config::TranslationConfig;
use crate::translation::error::{log_error, ErrorStats, TranslationError, TranslationResult};
use crate::translation::pipeline::batch::{BatchTier, BatchTranslator};
use crate::translation::pipeline::filters::{is_decorative_line, normalize_for_match};
use crate::translation::providers::ProviderChain;
use crate::translation::storage::{CacheSettings, CacheStats, KvStore, TranslationCache};
use crate::utils::clock::SharedClock;

/// 全部来自行缓存时写入曲目缓存的 vendor
const CACHE_VENDOR: &str = "cache";

/// 一次翻译请求
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslateRequest {
    pub track_id: Option<String>,
    pub lines: Vec<String>,
    /// 覆盖配置中的目标语言
    pub target_lang: Option<String>,
}

impl TranslateRequest {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines,
            ..Self::default()
        }
    }

    pub fn with_track(mut self, track_id: impl Into<String>) -> Self {
        self.track_id = Some(track_id.into());
        self
    }

    pub fn with_target(mut self, target_lang: impl Into<String>) -> Self {
        self.target_lang = Some(target_lang.into());
        self
    }
}

/// 一首歌的翻译结果，与输入行一一对应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTranslation {
    pub lines: Vec<String>,
    pub target_lang: String,
    pub source_lang: Option<String>,
    pub from_track_cache: bool,
    pub line_cache_hits: usize,
    pub vendor: Option<String>,
    /// 批次协议成功的层级，全部命中缓存时为 `None`
    pub tier: Option<BatchTier>,
    /// 每一行都拿到了译文
    pub fully_translated: bool,
}

/// 翻译请求的结果
#[derive(Debug, Clone, PartialEq)]
pub enum TranslateOutcome {
    Translated(TrackTranslation),
    /// 歌词已是目标语言
    Skipped(SkipDecision),
    /// 已有任务在途，本次触发被忽略
    Ignored,
}

impl TranslateOutcome {
    pub fn translation(&self) -> Option<&TrackTranslation> {
        match self {
            TranslateOutcome::Translated(t) => Some(t),
            _ => None,
        }
    }
}

/// 在途标记，离开作用域时自动清除
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
    exited: &'a Notify,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
        self.exited.notify_waiters();
    }
}

/// 统一的翻译服务
///
/// 所有状态由一个实例持有，通过 `Arc<TranslationService>` 在翻译任务、
/// 切歌事件与同步循环之间共享。
pub struct TranslationService {
    config: TranslationConfig,
    providers: ProviderChain,
    executor: Arc<RequestExecutor>,
    batch: BatchTranslator,
    detector: LanguageDetector,
    aligner: LineAligner,
    cache: Option<TranslationCache>,

    in_flight: AtomicBool,
    pass_exited: Notify,
    /// 在途任务持有的取消标记
    active_pass: Mutex<CancelToken>,
    cancel: Mutex<CancelToken>,
    current_track: Mutex<Option<String>>,

    snapshots: watch::Sender<Option<Arc<SyncSnapshot>>>,
    generation: AtomicU64,

    stats: ServiceStats,
    error_stats: Mutex<ErrorStats>,
}

impl TranslationService {
    /// 用给定的翻译服务链与存储创建服务
    pub fn new(
        config: TranslationConfig,
        providers: ProviderChain,
        store: Arc<dyn KvStore>,
        clock: SharedClock,
    ) -> TranslationResult<Self> {
        config.validate()?;

        if providers.is_empty() {
            return Err(TranslationError::ProviderUnavailable(
                "没有可用的翻译服务".to_string(),
            ));
        }

        let executor = Arc::new(RequestExecutor::from_config(&config));
        let batch = BatchTranslator::from_config(Arc::clone(&executor), &config);
        let detector =
            LanguageDetector::from_config(Arc::clone(&executor), providers.clone(), &config);
        let aligner = LineAligner::from_config(&config);

        let cache = if config.cache_enabled {
            Some(TranslationCache::new(
                store,
                clock,
                CacheSettings::from(&config),
            ))
        } else {
            tracing::info!("翻译缓存已禁用");
            None
        };

        tracing::info!(
            "翻译服务初始化完成: 目标语言 {}, 服务 {:?}",
            config.target_lang,
            providers.names()
        );

        let (snapshots, _) = watch::channel(None);

        Ok(Self {
            config,
            providers,
            executor,
            batch,
            detector,
            aligner,
            cache,
            in_flight: AtomicBool::new(false),
            pass_exited: Notify::new(),
            active_pass: Mutex::new(CancelToken::new()),
            cancel: Mutex::new(CancelToken::new()),
            current_track: Mutex::new(None),
            snapshots,
            generation: AtomicU64::new(0),
            stats: ServiceStats::default(),
            error_stats: Mutex::new(ErrorStats::default()),
        })
    }

    /// 使用内置 HTTP 翻译服务与配置指定的存储
    #[cfg(feature = "providers")]
    pub fn with_defaults(config: TranslationConfig) -> TranslationResult<Self> {
        use crate::translation::providers::build_providers;
        use crate::translation::storage::{MemoryStore, RedbStore};
        use crate::utils::clock::SystemClock;

        let providers = build_providers(&config)?;
        let store: Arc<dyn KvStore> = match (config.cache_enabled, config.cache_path.as_ref()) {
            (true, Some(path)) => Arc::new(RedbStore::open(path)?),
            _ => Arc::new(MemoryStore::new()),
        };

        Self::new(config, providers, store, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn providers(&self) -> &ProviderChain {
        &self.providers
    }

    pub fn detector(&self) -> &LanguageDetector {
        &self.detector
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn current_track(&self) -> Option<String> {
        self.current_track
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn current_token(&self) -> CancelToken {
        self.cancel.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 换上新的取消标记，返回旧的
    fn swap_token(&self, token: CancelToken) -> CancelToken {
        std::mem::replace(
            &mut *self.cancel.lock().unwrap_or_else(|e| e.into_inner()),
            token,
        )
    }

    /// 开始新一轮任务
    fn begin_pass(&self) -> CancelToken {
        let token = CancelToken::new();
        self.swap_token(token.clone());
        *self.active_pass.lock().unwrap_or_else(|e| e.into_inner()) = token.clone();
        token
    }

    fn active_pass_cancelled(&self) -> bool {
        self.active_pass
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_cancelled()
    }

    /// 占用在途标记；在途任务已被取消时等它退出，否则返回 `None`
    async fn acquire_pass(&self) -> Option<InFlightGuard<'_>> {
        loop {
            // 先登记等待，避免错过检查与等待之间的退出通知
            let exited = self.pass_exited.notified();

            if self
                .in_flight
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Some(InFlightGuard {
                    flag: &self.in_flight,
                    exited: &self.pass_exited,
                });
            }

            if !self.active_pass_cancelled() {
                return None;
            }

            tracing::debug!("在途任务已取消，等待其退出");
            exited.await;
        }
    }

    // ------------------------------------------------------------------
    // 翻译流水线
    // ------------------------------------------------------------------

    /// 翻译一首歌的全部歌词
    ///
    /// 只有取消以错误返回；翻译服务全部失败时返回原文（`fully_translated = false`）。
    pub async fn translate_track(
        &self,
        request: TranslateRequest,
    ) -> TranslationResult<TranslateOutcome> {
        let Some(_guard) = self.acquire_pass().await else {
            tracing::debug!("已有翻译任务在途，忽略本次触发");
            self.stats.inc_passes_ignored();
            return Ok(TranslateOutcome::Ignored);
        };

        if let Some(track) = request.track_id.as_deref() {
            *self.current_track.lock().unwrap_or_else(|e| e.into_inner()) =
                Some(track.to_string());
        }

        let cancel = self.begin_pass();
        let target = request
            .target_lang
            .clone()
            .unwrap_or_else(|| self.config.target_lang.clone());

        self.stats.inc_passes_started();
        let started = Instant::now();
        let result = self.run_pass(&request, &target, &cancel).await;
        self.stats.add_processing_time(started.elapsed());

        match &result {
            Ok(TranslateOutcome::Translated(_)) => self.stats.inc_translations_completed(),
            Ok(TranslateOutcome::Skipped(_)) => self.stats.inc_passes_skipped(),
            Ok(TranslateOutcome::Ignored) => {}
            Err(TranslationError::Cancelled) => {
                tracing::info!("翻译任务已取消");
                self.stats.inc_passes_cancelled();
            }
            Err(e) => {
                log_error(e);
                self.stats.inc_errors();
                self.error_stats
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .record_error(e);
            }
        }

        result
    }

    async fn run_pass(
        &self,
        request: &TranslateRequest,
        target: &str,
        cancel: &CancelToken,
    ) -> TranslationResult<TranslateOutcome> {
        let lines = &request.lines;
        let track_id = request.track_id.as_deref();

        if lines.is_empty() {
            return Ok(TranslateOutcome::Translated(TrackTranslation {
                lines: Vec::new(),
                target_lang: target.to_string(),
                source_lang: None,
                from_track_cache: false,
                line_cache_hits: 0,
                vendor: None,
                tier: None,
                fully_translated: true,
            }));
        }

        // 1. 曲目缓存
        if let (Some(cache), Some(track)) = (&self.cache, track_id) {
            if let Some(entry) = cache.get_track(track, target, lines.len()) {
                tracing::info!("命中曲目缓存: {} ({} 行)", track, entry.lines.len());
                self.stats.inc_track_cache_hits();
                return Ok(TranslateOutcome::Translated(TrackTranslation {
                    lines: entry.lines,
                    target_lang: target.to_string(),
                    source_lang: Some(entry.source_lang),
                    from_track_cache: true,
                    line_cache_hits: 0,
                    vendor: Some(entry.vendor),
                    tier: None,
                    fully_translated: true,
                }));
            }
        }

        // 2. 语言检测
        let mut source_lang = None;
        if self.config.skip_same_language {
            let decision = self
                .detector
                .should_skip_translation(lines, target, track_id, cancel)
                .await?;
            if decision.skip {
                return Ok(TranslateOutcome::Skipped(decision));
            }
            if !decision.detected.is_unknown() {
                source_lang = Some(decision.detected.lang);
            }
        }

        cancel.check()?;

        // 3. 行缓存，装饰行原样保留
        let mut resolved: Vec<Option<String>> = vec![None; lines.len()];
        let mut uncached: Vec<String> = Vec::new();
        let mut slots: Vec<(usize, usize)> = Vec::new();
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let mut line_cache_hits = 0;

        for (i, line) in lines.iter().enumerate() {
            if is_decorative_line(line) {
                resolved[i] = Some(line.clone());
                continue;
            }

            if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(target, line)) {
                line_cache_hits += 1;
                self.stats.inc_cache_hits();
                resolved[i] = Some(hit);
                continue;
            }

            self.stats.inc_cache_misses();
            let slot = *seen.entry(line.as_str()).or_insert_with(|| {
                uncached.push(line.clone());
                uncached.len() - 1
            });
            slots.push((i, slot));
        }

        tracing::debug!(
            "{} 行中 {} 行命中行缓存，{} 行待翻译 (去重后)",
            lines.len(),
            line_cache_hits,
            uncached.len()
        );

        // 4. 批次协议
        self.stats.add_lines_sent(uncached.len());
        let outcome = self
            .batch
            .translate_lines(&self.providers, &uncached, target, cancel)
            .await?;

        // 切歌后的结果不写入缓存
        cancel.check()?;

        let mut fully_translated = true;
        for &(i, slot) in &slots {
            match outcome.lines.get(slot) {
                Some(line) => {
                    fully_translated &= line.was_translated;
                    resolved[i] = Some(line.text.clone());
                }
                None => fully_translated = false,
            }
        }

        let final_lines: Vec<String> = resolved
            .into_iter()
            .zip(lines)
            .map(|(resolved, original)| resolved.unwrap_or_else(|| original.clone()))
            .collect();

        if source_lang.is_none() {
            source_lang = outcome.detected_lang.clone();
        }

        // 5. 写回缓存
        if let Some(cache) = &self.cache {
            let vendor = outcome.vendor.as_deref().unwrap_or(CACHE_VENDOR);

            let pairs: Vec<(String, String)> = uncached
                .iter()
                .zip(&outcome.lines)
                .filter(|(_, line)| line.was_translated)
                .map(|(original, line)| (original.clone(), line.text.clone()))
                .collect();
            if !pairs.is_empty() && !cache.set_many(target, &pairs, vendor) {
                tracing::warn!("行缓存写入失败，本次结果不缓存");
            }

            if fully_translated {
                if let Some(track) = track_id {
                    let source = source_lang.as_deref().unwrap_or("auto");
                    if !cache.set_track(track, target, source, &final_lines, vendor) {
                        tracing::warn!("曲目缓存写入失败: {}", track);
                    }
                }
            }
        }

        Ok(TranslateOutcome::Translated(TrackTranslation {
            lines: final_lines,
            target_lang: target.to_string(),
            source_lang,
            from_track_cache: false,
            line_cache_hits,
            vendor: outcome.vendor,
            tier: Some(outcome.tier),
            fully_translated,
        }))
    }

    /// 切歌：取消在途任务并清空当前快照
    ///
    /// 返回曲目是否真的发生了变化。
    pub fn track_changed(&self, new_track: Option<&str>) -> bool {
        let mut current = self.current_track.lock().unwrap_or_else(|e| e.into_inner());
        if current.as_deref() == new_track {
            return false;
        }

        tracing::info!(
            "曲目切换: {} -> {}",
            current.as_deref().unwrap_or("-"),
            new_track.unwrap_or("-")
        );
        *current = new_track.map(str::to_string);
        drop(current);

        self.swap_token(CancelToken::new()).cancel();
        self.clear_alignment();
        true
    }

    /// 取消在途任务
    pub fn cancel_current(&self) {
        self.swap_token(CancelToken::new()).cancel();
    }

    // ------------------------------------------------------------------
    // 对齐与快照
    // ------------------------------------------------------------------

    /// 对齐时间轴并整体替换同步快照
    ///
    /// `originals` 与 `translations` 是同一次翻译的输入与输出。
    pub async fn publish_alignment(
        &self,
        track_id: Option<&str>,
        originals: &[String],
        translations: &[String],
        external: &[LineTimingRecord],
        source: &dyn LiveLineSource,
    ) -> TranslationResult<Arc<SyncSnapshot>> {
        let cancel = self.current_token();
        let (alignment, live) = self.aligner.align(external, source, &cancel).await?;
        cancel.check()?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(SyncSnapshot {
            track_id: track_id.map(str::to_string),
            translations: map_translations(originals, translations, &live),
            alignment,
            generation,
        });

        tracing::info!(
            "发布同步快照 #{}: {} 行，{} 行有时间信息",
            generation,
            snapshot.alignment.len(),
            snapshot.alignment.matched
        );
        self.snapshots.send_replace(Some(Arc::clone(&snapshot)));
        Ok(snapshot)
    }

    /// 同步循环使用的快照接收端
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<SyncSnapshot>>> {
        self.snapshots.subscribe()
    }

    pub fn current_snapshot(&self) -> Option<Arc<SyncSnapshot>> {
        self.snapshots.borrow().clone()
    }

    pub fn clear_alignment(&self) {
        self.snapshots.send_replace(None);
    }

    // ------------------------------------------------------------------
    // 缓存与统计
    // ------------------------------------------------------------------

    /// 清空两级缓存与会话语言缓存
    pub fn clear_cache(&self) -> TranslationResult<()> {
        self.detector.forget_session();
        match &self.cache {
            Some(cache) => cache.clear(),
            None => Ok(()),
        }
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(TranslationCache::stats)
    }

    pub fn stats(&self) -> &ServiceStats {
        &self.stats
    }

    pub fn engine_stats(&self) -> EngineStatsSnapshot {
        self.executor.stats().snapshot()
    }

    pub fn error_stats(&self) -> ErrorStats {
        self.error_stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 重置所有统计
    pub fn reset_stats(&self) {
        self.stats.reset();
        self.executor.stats().reset();
        self.error_stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .reset();
    }

    /// 检查各组件状态
    pub fn health(&self) -> HealthStatus {
        let mut components = HashMap::new();

        components.insert("providers".to_string(), HealthLevel::Healthy);
        components.insert(
            "cache".to_string(),
            if self.cache.is_some() {
                HealthLevel::Healthy
            } else {
                HealthLevel::Degraded
            },
        );

        let errors = self.error_stats();
        let passes = self.stats.passes_started.load(Ordering::Relaxed);
        let error_level = if errors.critical_errors > 0 {
            HealthLevel::Unhealthy
        } else if errors.error_rate(passes) > 0.5 {
            HealthLevel::Degraded
        } else {
            HealthLevel::Healthy
        };
        components.insert("errors".to_string(), error_level);

        let overall = if components.values().any(|&l| l == HealthLevel::Unhealthy) {
            HealthLevel::Unhealthy
        } else if components.values().all(|&l| l == HealthLevel::Healthy) {
            HealthLevel::Healthy
        } else {
            HealthLevel::Degraded
        };

        HealthStatus {
            overall,
            components,
        }
    }
}

/// 把译文映射到实际渲染的行
///
/// 行数一致时按位置对应，否则按归一化原文依次匹配，找不到的行显示原文。
pub fn map_translations(
    originals: &[String],
    translations: &[String],
    live: &[LiveLine],
) -> Vec<String> {
    if originals.len() == live.len() && translations.len() == live.len() {
        return translations.to_vec();
    }

    let mut by_text: HashMap<String, VecDeque<&String>> = HashMap::new();
    for (original, translation) in originals.iter().zip(translations) {
        by_text
            .entry(normalize_for_match(original))
            .or_default()
            .push_back(translation);
    }

    live.iter()
        .map(|line| {
            by_text
                .get_mut(&normalize_for_match(&line.text))
                .and_then(VecDeque::pop_front)
                .cloned()
                .unwrap_or_else(|| line.text.clone())
        })
        .collect()
}

/// 服务运行统计（线程安全）
#[derive(Debug, Default)]
pub struct ServiceStats {
    pub passes_started: AtomicUsize,
    pub passes_ignored: AtomicUsize,
    pub passes_skipped: AtomicUsize,
    pub passes_cancelled: AtomicUsize,
    pub translations_completed: AtomicUsize,
    pub track_cache_hits: AtomicUsize,
    pub cache_hits: AtomicUsize,
    pub cache_misses: AtomicUsize,
    pub lines_sent: AtomicUsize,
    /// 总处理时间（微秒）
    pub processing_time: AtomicU64,
    pub errors_encountered: AtomicUsize,
}

/// 统计快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStatsSnapshot {
    pub passes_started: usize,
    pub passes_ignored: usize,
    pub passes_skipped: usize,
    pub passes_cancelled: usize,
    pub translations_completed: usize,
    pub track_cache_hits: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub lines_sent: usize,
    pub processing_time: Duration,
    pub errors_encountered: usize,
}

impl ServiceStatsSnapshot {
    /// 行缓存命中率
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

impl ServiceStats {
    pub fn inc_passes_started(&self) {
        self.passes_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_passes_ignored(&self) {
        self.passes_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_passes_skipped(&self) {
        self.passes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_passes_cancelled(&self) {
        self.passes_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_translations_completed(&self) {
        self.translations_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_track_cache_hits(&self) {
        self.track_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_lines_sent(&self, count: usize) {
        self.lines_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_processing_time(&self, duration: Duration) {
        self.processing_time
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn inc_errors(&self) {
        self.errors_encountered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            passes_started: self.passes_started.load(Ordering::Relaxed),
            passes_ignored: self.passes_ignored.load(Ordering::Relaxed),
            passes_skipped: self.passes_skipped.load(Ordering::Relaxed),
            passes_cancelled: self.passes_cancelled.load(Ordering::Relaxed),
            translations_completed: self.translations_completed.load(Ordering::Relaxed),
            track_cache_hits: self.track_cache_hits.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            lines_sent: self.lines_sent.load(Ordering::Relaxed),
            processing_time: Duration::from_micros(self.processing_time.load(Ordering::Relaxed)),
            errors_encountered: self.errors_encountered.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.passes_started,
            &self.passes_ignored,
            &self.passes_skipped,
            &self.passes_cancelled,
            &self.translations_completed,
            &self.track_cache_hits,
            &self.cache_hits,
            &self.cache_misses,
            &self.lines_sent,
            &self.errors_encountered,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.processing_time.store(0, Ordering::Relaxed);
    }
}

/// 组件健康状态
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub overall: HealthLevel,
    pub components: HashMap<String, HealthLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Unhealthy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::providers::{Translator, TranslatorOutput};
    use crate::translation::storage::MemoryStore;
    use crate::utils::clock::ManualClock;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    /// 把整段文本转成大写，记录每次请求
    #[derive(Default)]
    struct Upper {
        payloads: StdMutex<Vec<String>>,
    }

    impl Upper {
        fn requests(&self) -> usize {
            self.payloads.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Translator for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        async fn translate(&self, text: &str, _: &str) -> TranslationResult<TranslatorOutput> {
            self.payloads.lock().unwrap().push(text.to_string());
            Ok(TranslatorOutput::new(text.to_uppercase()).with_detected("en"))
        }
    }

    fn config() -> TranslationConfig {
        TranslationConfig {
            min_request_interval_ms: 0,
            skip_same_language: false,
            ..TranslationConfig::with_target("de")
        }
    }

    fn service(vendor: Arc<Upper>) -> TranslationService {
        TranslationService::new(
            config(),
            ProviderChain::new(vec![vendor]),
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(1_000)),
        )
        .unwrap()
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_duplicates_sent_once_and_decorative_lines_kept() {
        let vendor = Arc::new(Upper::default());
        let service = service(vendor.clone());

        let request = TranslateRequest::new(lines(&["la la", "[Chorus]", "la la", "end"]));
        let outcome = service.translate_track(request).await.unwrap();
        let translation = outcome.translation().unwrap();

        assert_eq!(translation.lines, lines(&["LA LA", "[Chorus]", "LA LA", "END"]));
        assert!(translation.fully_translated);
        assert_eq!(vendor.requests(), 1);
        assert_eq!(vendor.payloads.lock().unwrap()[0].lines().count(), 2);
    }

    #[tokio::test]
    async fn test_second_pass_uses_track_cache() {
        let vendor = Arc::new(Upper::default());
        let service = service(vendor.clone());
        let request = TranslateRequest::new(lines(&["one", "two"])).with_track("t1");

        service.translate_track(request.clone()).await.unwrap();
        let outcome = service.translate_track(request).await.unwrap();

        let translation = outcome.translation().unwrap();
        assert!(translation.from_track_cache);
        assert_eq!(translation.lines, lines(&["ONE", "TWO"]));
        assert_eq!(vendor.requests(), 1);
        assert_eq!(service.stats().snapshot().track_cache_hits, 1);
    }

    #[tokio::test]
    async fn test_line_cache_shared_across_tracks() {
        let vendor = Arc::new(Upper::default());
        let service = service(vendor.clone());

        service
            .translate_track(TranslateRequest::new(lines(&["shared", "a"])).with_track("t1"))
            .await
            .unwrap();
        let outcome = service
            .translate_track(TranslateRequest::new(lines(&["shared", "b"])).with_track("t2"))
            .await
            .unwrap();

        let translation = outcome.translation().unwrap();
        assert_eq!(translation.line_cache_hits, 1);
        assert_eq!(vendor.payloads.lock().unwrap()[1], "b");
    }

    #[tokio::test]
    async fn test_track_change_clears_snapshot() {
        let service = service(Arc::new(Upper::default()));
        let live = vec![LiveLine::new("one", 1)];
        let external = vec![LineTimingRecord::new("one", 0.0, 1000.0)];

        service
            .publish_alignment(Some("t1"), &lines(&["one"]), &lines(&["EINS"]), &external, &live)
            .await
            .unwrap();
        assert!(service.current_snapshot().is_some());

        assert!(service.track_changed(Some("t2")));
        assert!(service.current_snapshot().is_none());
        assert!(!service.track_changed(Some("t2")));
    }

    #[tokio::test]
    async fn test_publish_after_cancel_current() {
        let service = service(Arc::new(Upper::default()));
        let live = vec![LiveLine::new("one", 1)];
        let external = vec![LineTimingRecord::new("one", 0.0, 1000.0)];

        service.cancel_current();
        let snapshot = service
            .publish_alignment(None, &lines(&["one"]), &lines(&["EINS"]), &external, &live)
            .await
            .unwrap();

        assert_eq!(snapshot.translations, lines(&["EINS"]));
        assert_eq!(snapshot.generation, 1);
    }

    #[test]
    fn test_map_translations_by_text_when_counts_differ() {
        let originals = lines(&["Hello!", "world"]);
        let translations = lines(&["HALLO", "WELT"]);
        let live = vec![
            LiveLine::new("hello", 1),
            LiveLine::new("♪", 2),
            LiveLine::new("World", 3),
        ];

        assert_eq!(
            map_translations(&originals, &translations, &live),
            lines(&["HALLO", "♪", "WELT"])
        );
    }

    #[test]
    fn test_empty_provider_chain_rejected() {
        let result = TranslationService::new(
            config(),
            ProviderChain::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(0)),
        );
        assert!(matches!(result, Err(TranslationError::ProviderUnavailable(_))));
    }

    #[test]
    fn test_stats_snapshot_and_reset() {
        let stats = ServiceStats::default();
        stats.inc_cache_hits();
        stats.inc_cache_hits();
        stats.inc_cache_misses();
        stats.add_processing_time(Duration::from_millis(3));

        let snapshot = stats.snapshot();
        assert!((snapshot.cache_hit_rate() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(snapshot.processing_time, Duration::from_millis(3));

        stats.reset();
        assert_eq!(stats.snapshot(), ServiceStatsSnapshot::default());
    }
}
