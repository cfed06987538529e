//! 缓存系统集成测试

use std::sync::Arc;

use slt::translation::constants::DAY_MS;
use slt::translation::storage::CacheSettings;
use slt::translation::{KvStore, MemoryStore, RedbStore, TranslateRequest, TranslationCache};
use slt::utils::clock::ManualClock;

mod common {
    include!("common/mod.rs");
}

use common::{build_service, lines, test_config, ScriptedTranslator};

const START_MS: i64 = 1_700_000_000_000;

fn memory_cache() -> (TranslationCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START_MS));
    let cache = TranslationCache::new(
        Arc::new(MemoryStore::new()),
        clock.clone(),
        CacheSettings::default(),
    );
    (cache, clock)
}

/// 测试重复写入同一行是幂等的
#[test]
fn test_line_writes_are_idempotent() {
    let (cache, _clock) = memory_cache();

    assert!(cache.set("de", "hello", "  Hallo  ", "google"));
    assert!(cache.set("de", "hello", "Hallo", "google"));

    assert_eq!(cache.line_count(), 1);
    assert_eq!(cache.get("de", "hello").as_deref(), Some("Hallo"));
    assert!(cache.get("fr", "hello").is_none());

    println!("✅ Idempotent line cache test passed");
}

/// 测试行缓存恰好 7 天时仍命中，再过 1 毫秒过期
#[test]
fn test_line_ttl_boundary() {
    let (cache, clock) = memory_cache();
    cache.set("de", "night", "Nacht", "google");

    clock.advance(7 * DAY_MS);
    assert_eq!(cache.get("de", "night").as_deref(), Some("Nacht"));

    clock.advance(1);
    assert!(cache.get("de", "night").is_none());

    println!("✅ Line TTL boundary test passed");
}

/// 测试写入第 501 条时淘汰最早的一条
#[test]
fn test_capacity_evicts_oldest_entry() {
    let (cache, clock) = memory_cache();

    for i in 0..501 {
        cache.set("de", &format!("line {}", i), &format!("Zeile {}", i), "google");
        clock.advance(1);
    }

    assert_eq!(cache.line_count(), 500);
    assert!(cache.get("de", "line 0").is_none());
    assert_eq!(cache.get("de", "line 1").as_deref(), Some("Zeile 1"));
    assert_eq!(cache.get("de", "line 500").as_deref(), Some("Zeile 500"));

    println!("✅ Line cache eviction test passed");
}

/// 测试曲目缓存只在行数一致时命中
#[test]
fn test_track_cache_is_gated_by_line_count() {
    let (cache, _clock) = memory_cache();
    let translated = lines(&["EINS", "ZWEI", "DREI", "VIER", "FÜNF"]);

    assert!(cache.set_track("spotify:track:1", "de", "en", &translated, "google"));

    let hit = cache.get_track("spotify:track:1", "de", 5).unwrap();
    assert_eq!(hit.lines, translated);
    assert_eq!(hit.source_lang, "en");

    assert!(cache.get_track("spotify:track:1", "de", 6).is_none());
    assert!(cache.get_track("spotify:track:1", "fr", 5).is_none());
    assert!(cache.get_track("spotify:track:2", "de", 5).is_none());

    println!("✅ Track cache gating test passed");
}

/// 测试 redb 存储在重新打开后保留两级缓存
#[test]
fn test_redb_cache_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.redb");
    let clock = Arc::new(ManualClock::new(START_MS));

    {
        let store: Arc<dyn KvStore> = Arc::new(RedbStore::open(&path).unwrap());
        let cache = TranslationCache::new(store, clock.clone(), CacheSettings::default());
        cache.set("ja", "love", "愛", "google");
        cache.set_track("t1", "ja", "en", &lines(&["愛"]), "google");
    }

    let store: Arc<dyn KvStore> = Arc::new(RedbStore::open(&path).unwrap());
    let cache = TranslationCache::new(store, clock, CacheSettings::default());

    assert_eq!(cache.get("ja", "love").as_deref(), Some("愛"));
    assert!(cache.get_track("t1", "ja", 1).is_some());

    let stats = cache.stats();
    assert_eq!(stats.line_entries, 1);
    assert_eq!(stats.track_entries, 1);
    assert_eq!(stats.oldest_timestamp, Some(START_MS));

    println!("✅ redb persistence test passed");
}

/// 测试配额不足时丢弃旧行缓存，新的写入仍然成功
#[test]
fn test_quota_pressure_keeps_latest_write() {
    let clock = Arc::new(ManualClock::new(START_MS));
    let cache = TranslationCache::new(
        Arc::new(MemoryStore::with_quota(400)),
        clock,
        CacheSettings::default(),
    );

    for i in 0..20 {
        cache.set("de", &format!("line {}", i), &format!("Zeile {}", i), "google");
    }

    assert_eq!(cache.get("de", "line 19").as_deref(), Some("Zeile 19"));
    assert!(cache.line_count() < 20);

    println!("✅ Quota pressure test passed");
}

/// 测试服务清空缓存后重新请求翻译服务
#[tokio::test]
async fn test_service_clear_cache() {
    let vendor = Arc::new(ScriptedTranslator::upper());
    let (service, _clock) = build_service(test_config("de"), vec![vendor.clone()]);
    let request = TranslateRequest::new(lines(&["one", "two"])).with_track("t1");

    service.translate_track(request.clone()).await.unwrap();
    let stats = service.cache_stats().unwrap();
    assert_eq!(stats.line_entries, 2);
    assert_eq!(stats.track_entries, 1);

    service.clear_cache().unwrap();
    assert_eq!(service.cache_stats().unwrap().entries, 0);

    service.translate_track(request).await.unwrap();
    assert_eq!(vendor.requests(), 2);

    println!("✅ Service cache clear test passed");
}

/// 测试禁用缓存时不写入任何条目
#[tokio::test]
async fn test_disabled_cache() {
    let vendor = Arc::new(ScriptedTranslator::upper());
    let config = slt::TranslationConfig {
        cache_enabled: false,
        ..test_config("de")
    };
    let (service, _clock) = build_service(config, vec![vendor.clone()]);
    let request = TranslateRequest::new(lines(&["one", "two"])).with_track("t1");

    service.translate_track(request.clone()).await.unwrap();
    service.translate_track(request).await.unwrap();

    assert!(service.cache_stats().is_none());
    assert_eq!(vendor.requests(), 2);

    println!("✅ Disabled cache test passed");
}
