//! 键值存储后端
//!
//! 缓存只依赖一个通用的字符串键值存储。写入可能因配额不足失败，
//! 调用方需要处理 [`TranslationError::StorageQuota`]。

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use redb::{Database, ReadableTable, TableDefinition};

use crate::translation::error::{TranslationError, TranslationResult};

/// 通用键值存储
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> TranslationResult<Option<String>>;

    /// 写入键值，配额不足时返回 `StorageQuota`
    fn set(&self, key: &str, value: &str) -> TranslationResult<()>;

    fn remove(&self, key: &str) -> TranslationResult<()>;
}

// ============================================================================
// 内存存储
// ============================================================================

/// 进程内存储，可设置字节配额
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建带字节配额的存储（键和值的字节数之和）
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// 当前占用的字节数
    pub fn used_bytes(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> TranslationResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> TranslationResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(TranslationError::StorageQuota);
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> TranslationResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// redb 持久化存储
// ============================================================================

const KV_TABLE: TableDefinition<&str, &str> = TableDefinition::new("slt_kv");

fn db_error<E: Into<redb::Error>>(error: E) -> TranslationError {
    TranslationError::from(error.into())
}

/// 基于 redb 单表的持久化存储
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// 打开或创建数据库文件
    pub fn open<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(path).map_err(db_error)?;

        // 预先建表，读事务不必处理表不存在的情况
        let txn = db.begin_write().map_err(db_error)?;
        txn.open_table(KV_TABLE).map_err(db_error)?;
        txn.commit().map_err(db_error)?;

        tracing::info!("打开缓存数据库: {}", path.display());
        Ok(Self { db })
    }
}

impl KvStore for RedbStore {
    fn get(&self, key: &str) -> TranslationResult<Option<String>> {
        let txn = self.db.begin_read().map_err(db_error)?;
        let table = txn.open_table(KV_TABLE).map_err(db_error)?;
        let value = table.get(key).map_err(db_error)?;
        Ok(value.map(|guard| guard.value().to_string()))
    }

    fn set(&self, key: &str, value: &str) -> TranslationResult<()> {
        let txn = self.db.begin_write().map_err(db_error)?;
        {
            let mut table = txn.open_table(KV_TABLE).map_err(db_error)?;
            table.insert(key, value).map_err(db_error)?;
        }
        txn.commit().map_err(db_error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> TranslationResult<()> {
        let txn = self.db.begin_write().map_err(db_error)?;
        {
            let mut table = txn.open_table(KV_TABLE).map_err(db_error)?;
            table.remove(key).map_err(db_error)?;
        }
        txn.commit().map_err(db_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_basic_operations() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);

        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
        assert_eq!(store.used_bytes(), 2);
    }

    #[test]
    fn test_memory_store_quota() {
        let store = MemoryStore::with_quota(10);
        store.set("k", "12345").unwrap();
        assert_eq!(store.used_bytes(), 6);

        // 覆盖同一个键不重复计算旧值
        store.set("k", "123456789").unwrap();

        let err = store.set("other", "xx").unwrap_err();
        assert!(matches!(err, TranslationError::StorageQuota));
    }

    #[test]
    fn test_redb_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.redb");

        {
            let store = RedbStore::open(&path).unwrap();
            store.set("slt:line-cache", "{}").unwrap();
            store.set("slt:track-index", "[]").unwrap();
            store.remove("slt:track-index").unwrap();
        }

        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get("slt:line-cache").unwrap().as_deref(), Some("{}"));
        assert_eq!(store.get("slt:track-index").unwrap(), None);
    }
}
