//! Shared queue retention logic used by `pulse-scrape` (raw queue) and
//! `pulse-clean` (clean queue).
//!
//! Grounded in `cleaner.py::_clean_old_data`. Both queues are pushed to the
//! head (`LPUSH`), so the head holds the newest entry and the tail holds the
//! oldest. Age trimming scans from the tail, removing a contiguous run of
//! aged-out entries and stopping at the first fresh one (items are only
//! approximately time-ordered, so the scan is a prefix-of-staleness
//! heuristic, not a guarantee). A size backstop then caps whatever remains
//! to `max_length`, keeping the newest (head) end.

use crate::error::Result;
use crate::store::KvStore;
use serde_json::Value;
use std::time::Duration;

/// Default hard cap on a queue's length, matching the Python scraper's
/// `max_items` default.
pub const DEFAULT_MAX_LENGTH: u64 = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub max_age: Duration,
    pub max_length: u64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(24 * 60 * 60),
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimOutcome {
    pub removed_by_age: u64,
    pub removed_by_size: u64,
}

/// Applies a policy to `key`, a list of JSON records each carrying a
/// `timestamp` (Unix seconds) field under `timestamp_field`. An entry with a
/// missing or unparseable timestamp is kept (spec's conservative rule) and
/// also ends the stale run, since the scan assumes monotonically-aging
/// entries toward the tail.
pub async fn apply(
    store: &dyn KvStore,
    key: &str,
    timestamp_field: &str,
    policy: RetentionPolicy,
    now_secs: f64,
) -> Result<TrimOutcome> {
    let len = store.llen(key).await?;
    if len == 0 {
        return Ok(TrimOutcome::default());
    }

    let cutoff = now_secs - policy.max_age.as_secs_f64();
    let items = store.lrange(key, 0, -1).await?;
    let mut stale_count = 0usize;
    for raw in items.iter().rev() {
        let ts = serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|v| v.get(timestamp_field).and_then(Value::as_f64))
            .unwrap_or(f64::MAX);
        if ts < cutoff {
            stale_count += 1;
        } else {
            break;
        }
    }

    let mut removed_by_age = 0u64;
    if stale_count as u64 == len {
        store.delete(key).await?;
        return Ok(TrimOutcome {
            removed_by_age: len,
            removed_by_size: 0,
        });
    }
    if stale_count > 0 {
        store.ltrim(key, 0, (len as isize) - (stale_count as isize) - 1).await?;
        removed_by_age = stale_count as u64;
    }

    let remaining = len - removed_by_age;
    let mut removed_by_size = 0u64;
    if remaining > policy.max_length {
        removed_by_size = remaining - policy.max_length;
        store.ltrim(key, 0, (policy.max_length as isize) - 1).await?;
    }

    Ok(TrimOutcome {
        removed_by_age,
        removed_by_size,
    })
}
