//! 批次标记协议集成测试

use std::sync::Arc;
use std::time::Duration;

use slt::translation::{
    BatchTier, BatchTranslator, CancelToken, MarkerCodec, ProviderChain, Translator,
};
use slt::translation::core::{RequestExecutor, RetryPolicy};

mod common {
    include!("common/mod.rs");
}

use common::{numbered_lines, Script, ScriptedTranslator};

fn batch_translator(chunk_size: usize) -> BatchTranslator {
    BatchTranslator::new(
        Arc::new(RequestExecutor::new(Duration::ZERO, RetryPolicy::default())),
        chunk_size,
    )
}

fn chain(vendors: &[Arc<ScriptedTranslator>]) -> ProviderChain {
    ProviderChain::new(
        vendors
            .iter()
            .map(|v| Arc::clone(v) as Arc<dyn Translator>)
            .collect(),
    )
}

fn upper(lines: &[String]) -> Vec<String> {
    lines.iter().map(|l| l.to_uppercase()).collect()
}

/// 测试任意行数、服务打乱行序时仍按输入顺序还原
#[tokio::test]
async fn test_round_trip_with_reordered_response() {
    let vendor = Arc::new(ScriptedTranslator::new("reverse", Script::Reverse));
    let chain = chain(&[vendor.clone()]);
    let translator = batch_translator(6);

    for n in 1..=50 {
        let lines = numbered_lines(n);
        let outcome = translator
            .translate_lines(&chain, &lines, "de", &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.tier, BatchTier::Single, "{} 行应一次请求完成", n);
        assert_eq!(outcome.texts(), upper(&lines), "{} 行顺序错乱", n);
    }

    // 每个行数恰好一次请求
    assert_eq!(vendor.requests(), 50);

    println!("✅ Reordered round trip test passed");
}

/// 测试编码后的负载携带本批次独有的标记
#[tokio::test]
async fn test_payload_carries_batch_markers() {
    let vendor = Arc::new(ScriptedTranslator::upper());
    let chain = chain(&[vendor.clone()]);

    batch_translator(6)
        .translate_lines(&chain, &numbered_lines(3), "de", &CancelToken::new())
        .await
        .unwrap();

    let payload = &vendor.payloads()[0];
    let lines: Vec<&str> = payload.lines().collect();
    assert_eq!(lines.len(), 3);
    for (i, line) in lines.iter().enumerate() {
        assert!(line.starts_with("[[SLT_BATCH_"), "缺少标记: {}", line);
        assert!(line.contains(&format!("_{}]] ", i)));
    }

    // 不同批次的随机串不同，旧响应不会被误认
    let first = MarkerCodec::new().unwrap();
    let second = MarkerCodec::new().unwrap();
    assert_ne!(first.nonce(), second.nonce());

    println!("✅ Batch marker payload test passed");
}

/// 测试整批失败后按 6 行一块重试，结果顺序不变
#[tokio::test]
async fn test_chunk_fallback_for_eight_lines() {
    let vendor = Arc::new(ScriptedTranslator::new("merging", Script::StripMarkersAbove(6)));
    let chain = chain(&[vendor.clone()]);
    let lines = numbered_lines(8);

    let outcome = batch_translator(6)
        .translate_lines(&chain, &lines, "de", &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.tier, BatchTier::Chunked);
    assert_eq!(outcome.texts(), upper(&lines));
    assert_eq!(outcome.vendor.as_deref(), Some("merging"));

    let payloads = vendor.payloads();
    assert_eq!(payloads.len(), 3);
    assert_eq!(payloads[0].lines().count(), 8);
    assert_eq!(payloads[1].lines().count(), 6);
    assert_eq!(payloads[2].lines().count(), 2);

    println!("✅ Chunk fallback test passed");
}

/// 测试服务端错误会重试，然后换下一个服务
#[tokio::test(start_paused = true)]
async fn test_server_errors_retry_then_fall_through() {
    let broken = Arc::new(ScriptedTranslator::new("broken", Script::Fail(503)));
    let working = Arc::new(ScriptedTranslator::upper());
    let chain = chain(&[broken.clone(), working.clone()]);
    let lines = numbered_lines(4);

    let outcome = batch_translator(6)
        .translate_lines(&chain, &lines, "de", &CancelToken::new())
        .await
        .unwrap();

    // 4 行不足一块，没有分块层级；503 重试到上限 3 次
    assert_eq!(broken.requests(), 3);
    assert_eq!(working.requests(), 1);
    assert_eq!(outcome.vendor.as_deref(), Some("upper"));
    assert_eq!(outcome.texts(), upper(&lines));

    println!("✅ Vendor fall-through test passed");
}

/// 测试所有服务失败时原文返回并标记未翻译
#[tokio::test]
async fn test_total_failure_returns_originals() {
    let first = Arc::new(ScriptedTranslator::new("first", Script::Fail(403)));
    let second = Arc::new(ScriptedTranslator::new("second", Script::Fail(404)));
    let chain = chain(&[first.clone(), second.clone()]);
    let lines = numbered_lines(3);

    let outcome = batch_translator(6)
        .translate_lines(&chain, &lines, "de", &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.tier, BatchTier::Fallback);
    assert_eq!(outcome.texts(), lines);
    assert!(outcome.vendor.is_none());
    assert!(outcome.lines.iter().all(|l| !l.was_translated));
    assert_eq!(first.requests(), 1);
    assert_eq!(second.requests(), 1);

    println!("✅ Total failure fallback test passed");
}
