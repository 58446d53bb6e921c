//! Dedup cache semantics shared by `pulse-scrape` and `pulse-clean`.
//!
//! Grounded in `cache_manager.py` / `single_pass_cleaner.py::_is_duplicate` /
//! `_add_to_cache`: a cache key backs either a permanent set (membership
//! only) or a time-windowed sorted set (score = insertion timestamp, members
//! outside the window are considered expired and pruned lazily). Which
//! variant a given key uses is a deployment choice, not something the
//! fingerprint knows about, so the mode is detected from the key's existing
//! structure at startup and defaults to time-window when the key is absent.

use std::time::Duration;

/// Default window for a fresh time-windowed cache (spec §6.5
/// `deduplication.window_hours`, default 24 h).
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Permanent,
    TimeWindow,
}

/// A point-in-time read of a cache's size and age distribution, used for the
/// startup "cache status" log line (spec §7 / `SPEC_FULL.md` §2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStatus {
    pub mode: CacheMode,
    pub total_entries: u64,
    pub expired_entries: u64,
}

impl CacheStatus {
    pub fn valid_entries(&self) -> u64 {
        self.total_entries.saturating_sub(self.expired_entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_entries_excludes_expired() {
        let status = CacheStatus {
            mode: CacheMode::TimeWindow,
            total_entries: 100,
            expired_entries: 30,
        };
        assert_eq!(status.valid_entries(), 70);
    }

    #[test]
    fn valid_entries_saturates_at_zero() {
        let status = CacheStatus {
            mode: CacheMode::Permanent,
            total_entries: 5,
            expired_entries: 9,
        };
        assert_eq!(status.valid_entries(), 0);
    }
}
