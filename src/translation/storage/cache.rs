//! 翻译缓存模块
//!
//! 两级缓存：
//! - 行缓存：以 `(目标语言, 原文)` 为键，7 天过期，最多 500 条
//! - 曲目缓存：以 `(曲目, 目标语言)` 为键保存整首歌的译文，14 天过期，最多 100 首
//!
//! 所有数据都写穿到 [`KvStore`]，写入失败不会向调用方报错。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::kv::KvStore;
use crate::translation::config::{constants, TranslationConfig};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::filters::normalize_translation;
use crate::utils::SharedClock;

// ============================================================================
// 核心类型
// ============================================================================

/// 行缓存条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCacheEntry {
    pub translation: String,
    pub timestamp_ms: i64,
    pub vendor: String,
}

/// 曲目缓存条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackCacheEntry {
    pub source_lang: String,
    pub target_lang: String,
    pub lines: Vec<String>,
    pub timestamp_ms: i64,
    pub vendor: String,
}

/// 缓存容量与有效期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub line_capacity: usize,
    pub line_ttl_ms: i64,
    pub track_capacity: usize,
    pub track_ttl_ms: i64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            line_capacity: constants::DEFAULT_LINE_CACHE_CAPACITY,
            line_ttl_ms: i64::from(constants::DEFAULT_LINE_CACHE_TTL_DAYS) * constants::DAY_MS,
            track_capacity: constants::DEFAULT_TRACK_CACHE_CAPACITY,
            track_ttl_ms: i64::from(constants::DEFAULT_TRACK_CACHE_TTL_DAYS) * constants::DAY_MS,
        }
    }
}

impl From<&TranslationConfig> for CacheSettings {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            line_capacity: config.line_cache_capacity,
            line_ttl_ms: config.line_cache_ttl_ms(),
            track_capacity: config.track_cache_capacity,
            track_ttl_ms: config.track_cache_ttl_ms(),
        }
    }
}

/// 缓存统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// 行条目与曲目条目之和
    pub entries: usize,
    pub line_entries: usize,
    pub track_entries: usize,
    /// 持久化数据的近似字节数
    pub size_bytes: usize,
    pub oldest_timestamp: Option<i64>,
}

#[derive(Debug, Default)]
struct CacheState {
    lines: HashMap<String, LineCacheEntry>,
}

/// 两级翻译缓存
pub struct TranslationCache {
    store: Arc<dyn KvStore>,
    clock: SharedClock,
    settings: CacheSettings,
    state: Mutex<CacheState>,
}

fn line_key(lang: &str, text: &str) -> String {
    format!("{}:{}", lang, text)
}

/// 曲目缓存在存储中的键
pub fn track_storage_key(track_id: &str, lang: &str) -> String {
    let digest = blake3::hash(format!("{}|{}", track_id, lang).as_bytes());
    format!("{}{}", constants::TRACK_KEY_PREFIX, digest.to_hex())
}

impl TranslationCache {
    /// 创建缓存并从存储中载入行缓存
    pub fn new(store: Arc<dyn KvStore>, clock: SharedClock, settings: CacheSettings) -> Self {
        let lines = match Self::load_lines(store.as_ref()) {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!("行缓存载入失败，从空缓存开始: {}", e);
                HashMap::new()
            }
        };

        tracing::debug!("行缓存载入 {} 条", lines.len());

        Self {
            store,
            clock,
            settings,
            state: Mutex::new(CacheState { lines }),
        }
    }

    fn load_lines(store: &dyn KvStore) -> TranslationResult<HashMap<String, LineCacheEntry>> {
        match store.get(constants::LINE_CACHE_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(HashMap::new()),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn settings(&self) -> CacheSettings {
        self.settings
    }

    // ------------------------------------------------------------------
    // 行缓存
    // ------------------------------------------------------------------

    /// 查询单行译文，过期条目视为不存在
    pub fn get(&self, lang: &str, text: &str) -> Option<String> {
        let now = self.clock.now_ms();
        let state = self.lock_state();

        let entry = state.lines.get(&line_key(lang, text))?;
        if now - entry.timestamp_ms > self.settings.line_ttl_ms {
            return None;
        }

        let normalized = normalize_translation(&entry.translation);
        if normalized.is_empty() {
            None
        } else {
            Some(normalized)
        }
    }

    /// 写入单行译文
    pub fn set(&self, lang: &str, text: &str, translation: &str, vendor: &str) -> bool {
        self.set_many(lang, &[(text.to_string(), translation.to_string())], vendor)
    }

    /// 批量写入行译文，只持久化一次
    ///
    /// 返回是否成功持久化。配额不足时清空行缓存后仅保留本次写入再试一次，
    /// 第二次失败直接放弃缓存。
    pub fn set_many(&self, lang: &str, pairs: &[(String, String)], vendor: &str) -> bool {
        let now = self.clock.now_ms();
        let fresh: Vec<(String, LineCacheEntry)> = pairs
            .iter()
            .filter_map(|(text, translation)| {
                let normalized = normalize_translation(translation);
                if normalized.is_empty() {
                    return None;
                }
                Some((
                    line_key(lang, text),
                    LineCacheEntry {
                        translation: normalized,
                        timestamp_ms: now,
                        vendor: vendor.to_string(),
                    },
                ))
            })
            .collect();

        if fresh.is_empty() {
            return true;
        }

        let mut state = self.lock_state();
        for (key, entry) in &fresh {
            state.lines.insert(key.clone(), entry.clone());
        }
        self.evict_lines(&mut state.lines, now);

        match self.persist_lines(&state.lines) {
            Ok(()) => true,
            Err(TranslationError::StorageQuota) => {
                tracing::warn!("存储配额不足，清空行缓存后重试");
                state.lines.clear();
                // 先释放旧数据，配额才有空间容纳重试写入
                if let Err(e) = self.store.remove(constants::LINE_CACHE_KEY) {
                    tracing::debug!("清除行缓存存储失败: {}", e);
                }
                state.lines.extend(fresh);
                self.evict_lines(&mut state.lines, now);

                match self.persist_lines(&state.lines) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!("行缓存写入再次失败，本次不缓存: {}", e);
                        state.lines.clear();
                        false
                    }
                }
            }
            Err(e) => {
                tracing::warn!("行缓存写入失败: {}", e);
                false
            }
        }
    }

    /// 过期优先淘汰，然后按时间戳从旧到新淘汰，直到不超过容量
    fn evict_lines(&self, lines: &mut HashMap<String, LineCacheEntry>, now: i64) {
        if lines.len() <= self.settings.line_capacity {
            return;
        }

        let ttl = self.settings.line_ttl_ms;
        let before = lines.len();
        lines.retain(|_, entry| now - entry.timestamp_ms <= ttl);

        if lines.len() > self.settings.line_capacity {
            let mut by_age: Vec<(i64, String)> = lines
                .iter()
                .map(|(key, entry)| (entry.timestamp_ms, key.clone()))
                .collect();
            by_age.sort();

            let excess = lines.len() - self.settings.line_capacity;
            for (_, key) in by_age.into_iter().take(excess) {
                lines.remove(&key);
            }
        }

        tracing::debug!("行缓存淘汰 {} 条", before - lines.len());
    }

    fn persist_lines(&self, lines: &HashMap<String, LineCacheEntry>) -> TranslationResult<()> {
        let raw = serde_json::to_string(lines)?;
        self.store.set(constants::LINE_CACHE_KEY, &raw)
    }

    /// 行缓存条目数
    pub fn line_count(&self) -> usize {
        self.lock_state().lines.len()
    }

    // ------------------------------------------------------------------
    // 曲目缓存
    // ------------------------------------------------------------------

    /// 查询整首歌译文
    ///
    /// 缓存的行数与当前请求的行数不一致时视为未命中。
    pub fn get_track(
        &self,
        track_id: &str,
        lang: &str,
        expected_lines: usize,
    ) -> Option<TrackCacheEntry> {
        let key = track_storage_key(track_id, lang);
        let raw = match self.store.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("读取曲目缓存失败 {}: {}", track_id, e);
                return None;
            }
        };

        let mut entry: TrackCacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("曲目缓存损坏 {}: {}", track_id, e);
                return None;
            }
        };

        if self.clock.now_ms() - entry.timestamp_ms > self.settings.track_ttl_ms {
            tracing::debug!("曲目缓存已过期: {}", track_id);
            return None;
        }

        if entry.lines.len() != expected_lines {
            tracing::debug!(
                "曲目缓存行数不一致 {}: 缓存 {} 行，请求 {} 行",
                track_id,
                entry.lines.len(),
                expected_lines
            );
            return None;
        }

        entry.lines = entry.lines.iter().map(|l| normalize_translation(l)).collect();
        Some(entry)
    }

    /// 写入整首歌译文并维护先进先出索引
    pub fn set_track(
        &self,
        track_id: &str,
        lang: &str,
        source_lang: &str,
        lines: &[String],
        vendor: &str,
    ) -> bool {
        let key = track_storage_key(track_id, lang);
        let entry = TrackCacheEntry {
            source_lang: source_lang.to_string(),
            target_lang: lang.to_string(),
            lines: lines.iter().map(|l| normalize_translation(l)).collect(),
            timestamp_ms: self.clock.now_ms(),
            vendor: vendor.to_string(),
        };

        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("曲目缓存序列化失败: {}", e);
                return false;
            }
        };

        let written = match self.store.set(&key, &raw) {
            Ok(()) => true,
            Err(TranslationError::StorageQuota) => {
                tracing::warn!("存储配额不足，清空行缓存后重试写入曲目缓存");
                self.evict_line_tier();
                match self.store.set(&key, &raw) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!("曲目缓存写入再次失败，本次不缓存: {}", e);
                        false
                    }
                }
            }
            Err(e) => {
                tracing::warn!("曲目缓存写入失败: {}", e);
                false
            }
        };

        if written {
            self.push_track_index(key);
        }
        written
    }

    fn evict_line_tier(&self) {
        self.lock_state().lines.clear();
        if let Err(e) = self.store.remove(constants::LINE_CACHE_KEY) {
            tracing::warn!("清除行缓存存储失败: {}", e);
        }
    }

    fn load_track_index(&self) -> VecDeque<String> {
        match self.store.get(constants::TRACK_INDEX_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("曲目索引损坏，重建索引: {}", e);
                VecDeque::new()
            }),
            Ok(None) => VecDeque::new(),
            Err(e) => {
                tracing::warn!("读取曲目索引失败: {}", e);
                VecDeque::new()
            }
        }
    }

    fn push_track_index(&self, key: String) {
        let mut index = self.load_track_index();
        index.retain(|k| k != &key);
        index.push_back(key);

        while index.len() > self.settings.track_capacity {
            if let Some(oldest) = index.pop_front() {
                tracing::debug!("淘汰最早写入的曲目缓存: {}", oldest);
                if let Err(e) = self.store.remove(&oldest) {
                    tracing::warn!("删除曲目缓存失败: {}", e);
                }
            }
        }

        let result = serde_json::to_string(&index)
            .map_err(TranslationError::from)
            .and_then(|raw| self.store.set(constants::TRACK_INDEX_KEY, &raw));
        if let Err(e) = result {
            tracing::warn!("曲目索引写入失败: {}", e);
        }
    }

    /// 曲目缓存条目数
    pub fn track_count(&self) -> usize {
        self.load_track_index().len()
    }

    // ------------------------------------------------------------------
    // 管理
    // ------------------------------------------------------------------

    /// 清空两级缓存
    pub fn clear(&self) -> TranslationResult<()> {
        self.lock_state().lines.clear();
        self.store.remove(constants::LINE_CACHE_KEY)?;

        for key in self.load_track_index() {
            self.store.remove(&key)?;
        }
        self.store.remove(constants::TRACK_INDEX_KEY)?;

        tracing::info!("翻译缓存已清空");
        Ok(())
    }

    /// 统计条目数、占用字节与最早时间戳
    pub fn stats(&self) -> CacheStats {
        let (line_entries, line_bytes, oldest_line) = {
            let state = self.lock_state();
            let bytes = serde_json::to_string(&state.lines)
                .map(|raw| raw.len())
                .unwrap_or(0);
            let oldest = state.lines.values().map(|e| e.timestamp_ms).min();
            (state.lines.len(), bytes, oldest)
        };

        let mut track_entries = 0;
        let mut track_bytes = 0;
        let mut oldest_track: Option<i64> = None;
        for key in self.load_track_index() {
            let Ok(Some(raw)) = self.store.get(&key) else {
                continue;
            };
            track_entries += 1;
            track_bytes += raw.len();
            if let Ok(entry) = serde_json::from_str::<TrackCacheEntry>(&raw) {
                oldest_track = Some(
                    oldest_track.map_or(entry.timestamp_ms, |t| t.min(entry.timestamp_ms)),
                );
            }
        }

        let oldest_timestamp = match (oldest_line, oldest_track) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        CacheStats {
            entries: line_entries + track_entries,
            line_entries,
            track_entries,
            size_bytes: line_bytes + track_bytes,
            oldest_timestamp,
        }
    }
}
