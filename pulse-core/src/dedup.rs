//! Dedup cache operations against a [`KvStore`], built on the value types in
//! [`crate::domain::id_cache`].
//!
//! Grounded in `single_pass_cleaner.py::_is_duplicate` / `_add_to_cache`:
//! membership is checked first, the fingerprint is recorded second, and a
//! time-windowed cache additionally prunes members whose score falls outside
//! the window before reporting status.

use crate::domain::{CacheMode, CacheStatus, DEFAULT_WINDOW};
use crate::error::Result;
use crate::store::{KeyKind, KvStore};
use std::time::Duration;

/// A dedup cache bound to one Redis key, with a mode (permanent set vs.
/// time-windowed sorted set) detected from the key's existing structure.
pub struct IdCache<'s> {
    store: &'s dyn KvStore,
    key: String,
    mode: CacheMode,
    window: Duration,
}

impl<'s> IdCache<'s> {
    /// Detects the key's current structure and opens a cache handle. A key
    /// that doesn't exist yet defaults to time-windowed (spec §3: permanent
    /// caches are an explicit opt-in via pre-existing deployment state).
    pub async fn open(store: &'s dyn KvStore, key: &str, window: Duration) -> Result<Self> {
        let mode = match store.key_kind(key).await? {
            KeyKind::Set => CacheMode::Permanent,
            _ => CacheMode::TimeWindow,
        };
        Ok(Self {
            store,
            key: key.to_string(),
            mode,
            window,
        })
    }

    pub async fn open_default_window(store: &'s dyn KvStore, key: &str) -> Result<Self> {
        Self::open(store, key, DEFAULT_WINDOW).await
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    /// True if `fingerprint` is already present. For a time-windowed cache
    /// this also prunes entries that fell out of the window, so a stale
    /// fingerprint no longer reads as a duplicate.
    pub async fn is_duplicate(&self, fingerprint: &str, now_secs: f64) -> Result<bool> {
        match self.mode {
            CacheMode::Permanent => self.store.sismember(&self.key, fingerprint).await,
            CacheMode::TimeWindow => {
                let cutoff = now_secs - self.window.as_secs_f64();
                self.store.zremrangebyscore(&self.key, f64::MIN, cutoff).await?;
                Ok(self.store.zscore(&self.key, fingerprint).await?.is_some())
            }
        }
    }

    pub async fn add(&self, fingerprint: &str, now_secs: f64) -> Result<()> {
        match self.mode {
            CacheMode::Permanent => self.store.sadd(&self.key, fingerprint).await,
            CacheMode::TimeWindow => self.store.zadd(&self.key, fingerprint, now_secs).await,
        }
    }

    /// Cache-state preamble (spec §7 / `SPEC_FULL.md` §2): total entries and
    /// how many are outside the active window. Always zero expired for a
    /// permanent cache.
    pub async fn status(&self, now_secs: f64) -> Result<CacheStatus> {
        match self.mode {
            CacheMode::Permanent => Ok(CacheStatus {
                mode: self.mode,
                total_entries: self.store.scard(&self.key).await?,
                expired_entries: 0,
            }),
            CacheMode::TimeWindow => {
                let total = self.store.zcard(&self.key).await?;
                let cutoff = now_secs - self.window.as_secs_f64();
                let expired = self
                    .store
                    .zrangebyscore(&self.key, f64::MIN, cutoff)
                    .await?
                    .len() as u64;
                Ok(CacheStatus {
                    mode: self.mode,
                    total_entries: total,
                    expired_entries: expired,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn fresh_key_defaults_to_time_window_mode() {
        let store = MemoryStore::new();
        let cache = IdCache::open_default_window(&store, "ids").await.unwrap();
        assert_eq!(cache.mode(), CacheMode::TimeWindow);
    }

    #[tokio::test]
    async fn existing_set_key_is_detected_as_permanent() {
        let store = MemoryStore::new();
        store.sadd("ids", "seed").await.unwrap();
        let cache = IdCache::open_default_window(&store, "ids").await.unwrap();
        assert_eq!(cache.mode(), CacheMode::Permanent);
    }

    #[tokio::test]
    async fn duplicate_detection_round_trips() {
        let store = MemoryStore::new();
        let cache = IdCache::open_default_window(&store, "ids").await.unwrap();
        assert!(!cache.is_duplicate("fp1", 1_000.0).await.unwrap());
        cache.add("fp1", 1_000.0).await.unwrap();
        assert!(cache.is_duplicate("fp1", 1_000.0).await.unwrap());
    }

    #[tokio::test]
    async fn entries_outside_the_window_stop_counting_as_duplicates() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(60);
        let cache = IdCache::open(&store, "ids", window).await.unwrap();
        cache.add("fp1", 1_000.0).await.unwrap();
        assert!(cache.is_duplicate("fp1", 1_030.0).await.unwrap());
        assert!(!cache.is_duplicate("fp1", 1_100.0).await.unwrap());
    }

    #[tokio::test]
    async fn status_reports_expired_entries_in_a_time_window_cache() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(60);
        let cache = IdCache::open(&store, "ids", window).await.unwrap();
        cache.add("old", 1_000.0).await.unwrap();
        cache.add("fresh", 1_090.0).await.unwrap();
        let status = cache.status(1_100.0).await.unwrap();
        assert_eq!(status.total_entries, 2);
        assert_eq!(status.expired_entries, 1);
        assert_eq!(status.valid_entries(), 1);
    }
}
