use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::advance;

use super::*;

const MIB: u64 = 1024 * 1024;

fn policy() -> CachePolicy {
    CachePolicy {
        sweep_interval: Duration::from_secs(30),
        grace_period: Duration::from_secs(60),
        idle_timeout: Duration::from_secs(180),
        memory_threshold: 512 * MIB,
    }
}

/// Registry whose memory probe always reports `rss`.
fn registry_at(rss: Option<u64>) -> Arc<CacheRegistry> {
    CacheRegistry::with_probe(policy(), move || rss)
}

fn output(s: &str) -> Output {
    Output::from(s.as_bytes())
}

// ----------------------------------------------------------------------------
// Cache
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn get_set_clear() {
    let registry = registry_at(None);
    let cache: Cache<u32> = Cache::new(&registry);

    assert_eq!(cache.get(), None);
    assert_eq!(cache.last_accessed(), None);

    cache.set(7);
    assert_eq!(cache.get(), Some(7));
    assert!(cache.last_accessed().is_some());

    cache.clear();
    assert_eq!(cache.get(), None);
    assert_eq!(cache.last_accessed(), None);
}

#[tokio::test(start_paused = true)]
async fn get_refreshes_access_time() {
    let registry = registry_at(None);
    let cache: Cache<u32> = Cache::new(&registry);
    cache.set(1);
    let first = cache.last_accessed();

    advance(Duration::from_secs(5)).await;
    cache.get();
    assert!(cache.last_accessed() > first);
}

#[tokio::test(start_paused = true)]
async fn stale_epoch_is_not_committed() {
    let registry = registry_at(None);
    let cache: Cache<u32> = Cache::new(&registry);

    let epoch = cache.epoch();
    cache.clear();
    assert!(!cache.set_if_current(epoch, 1));
    assert!(!cache.is_set());

    assert!(cache.set_if_current(cache.epoch(), 2));
    assert_eq!(cache.get(), Some(2));
}

#[test]
fn dropped_cache_leaves_registry() {
    let registry = registry_at(None);
    let cache: Cache<u32> = Cache::new(&registry);
    let shared = cache.clone();
    assert_eq!(registry.len(), 1);

    drop(cache);
    assert_eq!(registry.len(), 1);
    drop(shared);
    assert_eq!(registry.len(), 0);
    assert_eq!(registry.sweep().live, 0);
}

// ----------------------------------------------------------------------------
// Sweep
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn idle_cache_is_cleared_after_timeout() {
    let registry = registry_at(None);
    let cache: Cache<u32> = Cache::new(&registry);
    cache.set(1);

    advance(Duration::from_secs(179)).await;
    assert_eq!(registry.sweep().expired, 0);
    assert!(cache.is_set());

    advance(Duration::from_secs(2)).await;
    let report = registry.sweep();
    assert_eq!(report.expired, 1);
    assert_eq!(report.live, 1);
    assert!(!cache.is_set());
}

#[tokio::test(start_paused = true)]
async fn sweeper_task_clears_idle_cache() {
    let registry = registry_at(None);
    let cache: Cache<u32> = Cache::new(&registry);
    cache.set(1);

    assert!(registry.start_sweeper());
    assert!(!registry.start_sweeper());

    // The 180s tick sees exactly the timeout; the 210s tick clears it.
    tokio::time::sleep(Duration::from_secs(211)).await;
    assert!(!cache.is_set());

    registry.stop_sweeper();
}

#[tokio::test(start_paused = true)]
async fn empty_cache_is_never_idle() {
    let registry = registry_at(Some(u64::MAX));
    let cache: Cache<u32> = Cache::new(&registry);
    cache.set(1);
    cache.clear();

    advance(Duration::from_secs(600)).await;
    assert_eq!(registry.sweep(), SweepReport { live: 1, ..Default::default() });
}

#[tokio::test(start_paused = true)]
async fn grace_period_protects_recent_access_under_pressure() {
    let registry = registry_at(Some(4096 * MIB));
    let cache: Cache<u32> = Cache::new(&registry);
    cache.set(1);

    advance(Duration::from_secs(59)).await;
    let report = registry.sweep();
    assert_eq!(report.evicted(), 0);
    assert!(cache.is_set());
}

#[tokio::test(start_paused = true)]
async fn pressure_clears_oldest_until_below_threshold() {
    // Over budget until the first eviction.
    let probes = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&probes);
    let registry = CacheRegistry::with_probe(policy(), move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        Some(if n == 0 { 1024 * MIB } else { 128 * MIB })
    });

    let oldest: Cache<u32> = Cache::new(&registry);
    let middle: Cache<u32> = Cache::new(&registry);
    let newest: Cache<u32> = Cache::new(&registry);

    oldest.set(1);
    advance(Duration::from_secs(10)).await;
    middle.set(2);
    advance(Duration::from_secs(10)).await;
    newest.set(3);
    advance(Duration::from_secs(70)).await;

    let report = registry.sweep();
    assert_eq!(report.expired, 0);
    assert_eq!(report.pressured, 1);
    assert!(!oldest.is_set());
    assert!(middle.is_set());
    assert!(newest.is_set());
}

#[tokio::test(start_paused = true)]
async fn unknown_memory_disables_pressure_tier() {
    let registry = registry_at(None);
    let cache: Cache<u32> = Cache::new(&registry);
    cache.set(1);

    advance(Duration::from_secs(90)).await;
    assert_eq!(registry.sweep().evicted(), 0);
    assert!(cache.is_set());
}

// ----------------------------------------------------------------------------
// Tee
// ----------------------------------------------------------------------------

#[tokio::test]
async fn tee_forwards_chunks_and_caches_concatenation() {
    let registry = registry_at(None);
    let cache: Cache<Output> = Cache::new(&registry);

    let (tx, upstream) = ContentStream::channel(1);
    let mut downstream = tee_to_cache(upstream, cache.clone(), cache.epoch());

    let feeder = tokio::spawn(async move {
        for chunk in ["<h1>", "hello", "</h1>"] {
            tx.send(Ok(chunk.as_bytes().to_vec())).await.unwrap();
        }
    });

    let mut received = Vec::new();
    while let Some(chunk) = downstream.next().await {
        received.push(String::from_utf8(chunk.unwrap()).unwrap());
    }
    feeder.await.unwrap();

    assert_eq!(received, vec!["<h1>", "hello", "</h1>"]);
    assert_eq!(cache.get(), Some(output("<h1>hello</h1>")));
}

#[tokio::test]
async fn tee_error_reaches_consumer_and_leaves_cache_unset() {
    let registry = registry_at(None);
    let cache: Cache<Output> = Cache::new(&registry);

    let upstream = ContentStream::from_chunks([
        Ok(b"partial".to_vec()),
        Err(anyhow::anyhow!("render exploded")),
        Ok(b"never".to_vec()),
    ]);
    let mut downstream = tee_to_cache(upstream, cache.clone(), cache.epoch());

    assert_eq!(downstream.next().await.unwrap().unwrap(), b"partial");
    let err = downstream.next().await.unwrap().unwrap_err();
    assert!(err.to_string().contains("render exploded"));
    assert!(downstream.next().await.is_none());

    assert!(!cache.is_set());
}

#[tokio::test]
async fn tee_discards_copy_after_invalidation() {
    let registry = registry_at(None);
    let cache: Cache<Output> = Cache::new(&registry);

    let epoch = cache.epoch();
    cache.clear();
    let downstream = tee_to_cache(
        ContentStream::from_chunks([Ok(b"old".to_vec())]),
        cache.clone(),
        epoch,
    );

    assert_eq!(downstream.collect().await.unwrap(), b"old");
    assert!(!cache.is_set());
}

#[tokio::test]
async fn collect_fails_on_error_chunk() {
    let stream = ContentStream::from_chunks([Ok(b"a".to_vec()), Err(anyhow::anyhow!("boom"))]);
    assert!(stream.collect().await.is_err());
}
