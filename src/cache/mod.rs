//! TTL cache for fetched parameter values.
//!
//! [`ParameterCache`] is a small synchronised map with an expiry timestamp
//! per entry. Expiry is checked lazily on every read: an entry whose
//! deadline has passed is reported as a miss and never served. A periodic
//! sweep ([`ParameterCache::spawn_sweeper`]) reclaims memory held by dead
//! entries but is not needed for correctness.
//!
//! The cache never fetches on its own. Filling it on a miss is the job of
//! [`CachingParameterServer`](crate::server::CachingParameterServer).

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::telemetry;

/// Configuration for the parameter cache.
///
/// ```rust
/// # use parameter_extension::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .ttl(Duration::from_secs(10))
///     .cleanup_interval(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live applied by [`ParameterCache::insert`]. Default: 30 seconds.
    pub ttl: Duration,
    /// Interval between expired-entry sweeps. Default: 1 minute.
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new config with the default TTL and sweep interval.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default time-to-live.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the sweep interval.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

/// A cached value and the instant it stops being served.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: String,
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Thread-safe TTL cache keyed on parameter name.
///
/// Callers share it behind an `Arc`; all locking is internal. A `set` replaces
/// the whole entry under the write lock, so concurrent readers see either the
/// previous entry or the new one.
pub struct ParameterCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    config: CacheConfig,
}

impl ParameterCache {
    /// Create an empty cache.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config: config.clone(),
        }
    }

    /// The TTL applied by [`insert`](Self::insert).
    pub fn default_ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Look up a live value.
    ///
    /// Returns `None` when the key is absent or its entry has expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                Some(entry.value.clone())
            }
            _ => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
        }
    }

    /// Install or replace the entry for `key`, live for `ttl` from now.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        let entry = CacheEntry {
            value: value.into(),
            expires_at: Instant::now() + ttl,
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), entry);
    }

    /// Install or replace the entry for `key` with the configured TTL.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.set(key, value, self.config.ttl);
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict all entries.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Periodically purge expired entries until `shutdown` is cancelled.
    ///
    /// Uses the configured `cleanup_interval`. Must be called within a tokio
    /// runtime.
    pub fn spawn_sweeper(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let interval = self.config.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = self.purge_expired();
                        if removed > 0 {
                            debug!(removed, "purged expired cache entries");
                        }
                    }
                }
            }
        })
    }
}
