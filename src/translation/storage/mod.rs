//! 存储模块
//!
//! 提供键值存储后端与两级翻译缓存。

pub mod cache;
pub mod kv;

pub use cache::{
    track_storage_key, CacheSettings, CacheStats, LineCacheEntry, TrackCacheEntry, TranslationCache,
};
pub use kv::{KvStore, MemoryStore, RedbStore};
