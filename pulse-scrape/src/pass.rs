//! The scraper's single-pass algorithm: drain every injected adapter,
//! stamp a normalized `timestamp` so the shared retention trimmer can read
//! it, append to `raw_queue`, then trim (spec §4.4).
//!
//! Grounded in `control_center.py::CrawlerControlCenter.run_once`'s
//! per-source dispatch and per-source statistics dict, and in
//! `reddit_crawler.py` stamping a numeric `timestamp` field (`int(submission
//! .created_utc)`) onto every record it produces.

use crate::adapter::SourceAdapter;
use chrono::Utc;
use pulse_core::config::{ChannelNames, RetentionSettings};
use pulse_core::retention::{self, RetentionPolicy};
use pulse_core::store::KvStore;
use pulse_core::time;
use pulse_core::Result;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub fetched: u64,
    pub appended: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PassStats {
    pub per_source: HashMap<String, SourceStats>,
    pub total_appended: u64,
    pub raw_queue_len: u64,
}

/// Drains every adapter once, appends whatever it returns, then applies the
/// shared age/size retention trim to `raw_queue`.
pub async fn run_once(
    store: &dyn KvStore,
    channels: &ChannelNames,
    retention: &RetentionSettings,
    adapters: &[Box<dyn SourceAdapter>],
) -> Result<PassStats> {
    let mut stats = PassStats::default();

    for adapter in adapters {
        let mut source_stats = SourceStats::default();
        match adapter.fetch().await {
            Ok(items) => {
                source_stats.fetched = items.len() as u64;
                for item in items {
                    match append_one(store, &channels.raw_queue, item) {
                        Ok(payload) => {
                            if let Err(e) = store.lpush(&channels.raw_queue, &payload).await {
                                warn!("store error appending raw item from {}: {e}", adapter.name());
                                source_stats.errors += 1;
                                continue;
                            }
                            source_stats.appended += 1;
                        }
                        Err(e) => {
                            warn!("failed to serialize raw item from {}: {e}", adapter.name());
                            source_stats.errors += 1;
                        }
                    }
                }
            }
            Err(e) => {
                warn!("adapter {} failed: {e}", adapter.name());
                source_stats.errors += 1;
            }
        }
        stats.total_appended += source_stats.appended;
        stats.per_source.insert(adapter.name().to_string(), source_stats);
    }

    let now_secs = Utc::now().timestamp() as f64;
    let policy = RetentionPolicy {
        max_age: Duration::from_secs(retention.max_age_secs),
        max_length: retention.max_queue_length,
    };
    if let Err(e) = retention::apply(store, &channels.raw_queue, "timestamp", policy, now_secs).await {
        warn!("raw_queue retention trim failed: {e}");
    }

    stats.raw_queue_len = store.llen(&channels.raw_queue).await.unwrap_or(0);
    Ok(stats)
}

/// Stamps a numeric `timestamp` (Unix seconds) derived from whichever
/// accepted time field the item already carries, leaving every other field
/// untouched (spec §3: no validation enforced at scrape time). Items with no
/// parseable time field get the current instant, so the retention trimmer
/// always has something to read.
fn append_one(_store: &dyn KvStore, _key: &str, item: pulse_core::RawItem) -> std::result::Result<String, serde_json::Error> {
    let mut fields = item.0;
    let iso = time::extract_created_at(&fields).unwrap_or_else(|| time::to_iso_seconds(Utc::now()));
    let unix_seconds = chrono::DateTime::parse_from_rfc3339(&iso.replace('Z', "+00:00"))
        .map(|dt| dt.timestamp() as f64)
        .unwrap_or_else(|_| Utc::now().timestamp() as f64);
    fields.insert("timestamp".to_string(), serde_json::json!(unix_seconds));
    serde_json::to_string(&serde_json::Value::Object(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::test_support::FixedAdapter;
    use pulse_core::store::MemoryStore;
    use pulse_core::RawItem;
    use serde_json::json;

    fn raw(fields: serde_json::Value) -> RawItem {
        match fields {
            serde_json::Value::Object(m) => RawItem::new(m),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn no_adapters_yields_zero_stats_and_no_mutation() {
        let store = MemoryStore::new();
        let channels = ChannelNames::default();
        let stats = run_once(&store, &channels, &RetentionSettings::default(), &[]).await.unwrap();
        assert_eq!(stats.total_appended, 0);
        assert_eq!(stats.raw_queue_len, 0);
    }

    #[tokio::test]
    async fn appends_fetched_items_and_tracks_per_source_stats() {
        let store = MemoryStore::new();
        let channels = ChannelNames::default();
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(FixedAdapter::new(
            "reddit",
            vec![
                raw(json!({"post_id": "p1", "source": "reddit", "text": "hello", "created_utc": 1_709_634_600})),
                raw(json!({"post_id": "p2", "source": "reddit", "text": "world", "created_utc": 1_709_634_700})),
            ],
        ))];

        let stats = run_once(&store, &channels, &RetentionSettings::default(), &adapters).await.unwrap();

        assert_eq!(stats.total_appended, 2);
        assert_eq!(stats.raw_queue_len, 2);
        let reddit_stats = stats.per_source.get("reddit").unwrap();
        assert_eq!(reddit_stats.fetched, 2);
        assert_eq!(reddit_stats.appended, 2);
        assert_eq!(reddit_stats.errors, 0);

        let entries = store.lrange(&channels.raw_queue, 0, -1).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&entries[0]).unwrap();
        assert!(parsed.get("timestamp").and_then(serde_json::Value::as_f64).is_some());
    }

    #[tokio::test]
    async fn a_failing_adapter_is_isolated_from_the_others() {
        struct FailingAdapter;
        #[async_trait::async_trait]
        impl SourceAdapter for FailingAdapter {
            fn name(&self) -> &str {
                "broken"
            }
            async fn fetch(&self) -> Result<Vec<RawItem>> {
                Err(pulse_core::PulseError::Internal("boom".into()))
            }
        }

        let store = MemoryStore::new();
        let channels = ChannelNames::default();
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![
            Box::new(FailingAdapter),
            Box::new(FixedAdapter::new("rss", vec![raw(json!({"guid": "g1", "source": "rss", "text": "item"}))])),
        ];

        let stats = run_once(&store, &channels, &RetentionSettings::default(), &adapters).await.unwrap();
        assert_eq!(stats.total_appended, 1);
        assert_eq!(stats.per_source.get("broken").unwrap().errors, 1);
        assert_eq!(stats.per_source.get("rss").unwrap().appended, 1);
    }
}
