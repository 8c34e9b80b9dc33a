//! Tests for [`ParameterCache`]: TTL expiry, concurrent access and sweeping.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parameter_extension::{CacheConfig, ParameterCache};
use tokio_util::sync::CancellationToken;

// =========================================================================
// Expiry
// =========================================================================

#[tokio::test]
async fn entry_expires_after_ttl() {
    let cache = ParameterCache::new(&CacheConfig::new().ttl(Duration::from_millis(50)));

    cache.insert("parameter", "value");
    assert_eq!(cache.get("parameter").as_deref(), Some("value"));

    tokio::time::sleep(Duration::from_millis(100)).await;

    // Expired entries are a miss even before any sweep runs
    assert!(cache.get("parameter").is_none());
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn explicit_ttl_overrides_default() {
    let cache = ParameterCache::new(&CacheConfig::new().ttl(Duration::from_secs(60)));

    cache.set("short", "a", Duration::from_millis(30));
    cache.insert("long", "b");

    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(cache.get("short").is_none());
    assert_eq!(cache.get("long").as_deref(), Some("b"));
}

#[tokio::test]
async fn set_after_expiry_revives_key() {
    let cache = ParameterCache::new(&CacheConfig::new().ttl(Duration::from_millis(30)));

    cache.insert("parameter", "old");
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(cache.get("parameter").is_none());

    cache.insert("parameter", "new");
    assert_eq!(cache.get("parameter").as_deref(), Some("new"));
    assert_eq!(cache.len(), 1);
}

// =========================================================================
// Concurrency
// =========================================================================

#[test]
fn concurrent_readers_never_see_partial_values() {
    let cache = Arc::new(ParameterCache::new(&CacheConfig::default()));
    let values = ["aaaaaaaaaaaaaaaa", "bbbbbbbbbbbbbbbb"];
    cache.insert("parameter", values[0]);

    let writers: Vec<_> = (0..4)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for n in 0..500 {
                    cache.insert("parameter", values[(i + n) % 2]);
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for _ in 0..500 {
                    let value = cache.get("parameter").unwrap();
                    assert!(values.contains(&value.as_str()), "torn read: {value}");
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }
    assert_eq!(cache.len(), 1);
}

#[test]
fn completed_set_is_visible_to_later_get_on_other_thread() {
    let cache = Arc::new(ParameterCache::new(&CacheConfig::default()));

    let writer = Arc::clone(&cache);
    thread::spawn(move || writer.insert("parameter", "written"))
        .join()
        .unwrap();

    assert_eq!(cache.get("parameter").as_deref(), Some("written"));
}

// =========================================================================
// Sweeper
// =========================================================================

#[tokio::test]
async fn sweeper_purges_expired_entries() {
    let config = CacheConfig::new()
        .ttl(Duration::from_millis(20))
        .cleanup_interval(Duration::from_millis(30));
    let cache = Arc::new(ParameterCache::new(&config));
    let shutdown = CancellationToken::new();
    let sweeper = Arc::clone(&cache).spawn_sweeper(shutdown.clone());

    cache.insert("parameter", "value");
    assert_eq!(cache.len(), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(cache.is_empty(), "expired entry should have been swept");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), sweeper)
        .await
        .expect("sweeper should stop on cancellation")
        .unwrap();
}

#[tokio::test]
async fn sweeper_keeps_live_entries() {
    let config = CacheConfig::new()
        .ttl(Duration::from_secs(60))
        .cleanup_interval(Duration::from_millis(20));
    let cache = Arc::new(ParameterCache::new(&config));
    let shutdown = CancellationToken::new();
    let _sweeper = Arc::clone(&cache).spawn_sweeper(shutdown.clone());

    cache.insert("parameter", "value");
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert_eq!(cache.get("parameter").as_deref(), Some("value"));
    shutdown.cancel();
}
