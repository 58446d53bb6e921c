//! The cleaner's single-pass algorithm (spec §4.2).
//!
//! Grounded in `single_pass_cleaner.py::clean_once`: one pass reads the
//! entire current `raw_queue`, validates and deduplicates each entry,
//! normalizes survivors into `CleanItem`s, appends them to `clean_queue`,
//! then trims both queues by age/size and reports counters.

use chrono::Utc;
use pulse_core::config::{ChannelNames, RetentionSettings};
use pulse_core::dedup::IdCache;
use pulse_core::fingerprint::{Fingerprint, FingerprintOrigin};
use pulse_core::retention::{self, RetentionPolicy};
use pulse_core::store::KvStore;
use pulse_core::{CleanItem, Result};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub processed: u64,
    pub cleaned: u64,
    pub duplicate: u64,
    pub invalid: u64,
    pub clean_queue_len: u64,
}

pub async fn run_once(
    store: &dyn KvStore,
    channels: &ChannelNames,
    retention: &RetentionSettings,
    batch_size: usize,
) -> Result<PassStats> {
    let mut stats = PassStats::default();

    let len = store.llen(&channels.raw_queue).await?;
    if len == 0 {
        stats.clean_queue_len = store.llen(&channels.clean_queue).await?;
        return Ok(stats);
    }

    let entries = store.lrange(&channels.raw_queue, 0, -1).await?;
    let id_cache = IdCache::open(
        store,
        &channels.dedup_key,
        Duration::from_secs(retention.dedup_window_secs),
    )
    .await?;

    let mut seen_this_pass: std::collections::HashSet<String> = std::collections::HashSet::new();

    for batch in entries.chunks(batch_size) {
        for raw in batch {
            stats.processed += 1;
            let now = Utc::now();
            let now_secs = now.timestamp() as f64;

            let record: Map<String, Value> = match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(m)) => m,
                Ok(_) | Err(_) => {
                    stats.invalid += 1;
                    continue;
                }
            };

            if !passes_validation(&record) {
                stats.invalid += 1;
                continue;
            }

            let fingerprint = Fingerprint::compute(&record);

            if seen_this_pass.contains(&fingerprint.value) {
                stats.duplicate += 1;
                continue;
            }
            match id_cache.is_duplicate(&fingerprint.value, now_secs).await {
                Ok(true) => {
                    stats.duplicate += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("dedup lookup failed, aborting pass: {e}");
                    stats.clean_queue_len = store.llen(&channels.clean_queue).await.unwrap_or(0);
                    return Ok(stats);
                }
            }
            seen_this_pass.insert(fingerprint.value.clone());

            let id = match fingerprint.origin {
                FingerprintOrigin::SourceId | FingerprintOrigin::Url => fingerprint.value.clone(),
                FingerprintOrigin::Hash => format!("generated_{}", now.timestamp_millis()),
            };

            let item = match CleanItem::from_raw(&record, id, now) {
                Ok(item) => item,
                Err(_) => {
                    stats.invalid += 1;
                    continue;
                }
            };

            let payload = match serde_json::to_string(&item) {
                Ok(p) => p,
                Err(e) => {
                    warn!("failed to serialize clean item: {e}");
                    stats.invalid += 1;
                    continue;
                }
            };

            if let Err(e) = store.lpush(&channels.clean_queue, &payload).await {
                warn!("store error appending clean item, aborting pass: {e}");
                stats.clean_queue_len = store.llen(&channels.clean_queue).await.unwrap_or(0);
                return Ok(stats);
            }
            if let Err(e) = id_cache.add(&fingerprint.value, now_secs).await {
                warn!("store error recording fingerprint: {e}");
            }

            stats.cleaned += 1;
        }
    }

    let now_secs = Utc::now().timestamp() as f64;
    let policy = RetentionPolicy {
        max_age: Duration::from_secs(retention.max_age_secs),
        max_length: retention.max_queue_length,
    };
    if let Err(e) = retention::apply(store, &channels.clean_queue, "timestamp", policy, now_secs).await {
        warn!("clean_queue retention trim failed: {e}");
    }

    stats.clean_queue_len = store.llen(&channels.clean_queue).await.unwrap_or(0);
    Ok(stats)
}

/// Spec §4.2 step 4: non-empty `source`, and at least one non-empty text
/// field among `text`/`content`/`title` after trimming.
fn passes_validation(record: &Map<String, Value>) -> bool {
    let source_ok = record
        .get("source")
        .and_then(Value::as_str)
        .map(|s| !s.trim().is_empty())
        .unwrap_or(false);
    if !source_ok {
        return false;
    }
    ["text", "content", "title"].iter().any(|field| {
        record
            .get(*field)
            .and_then(Value::as_str)
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    })
}
