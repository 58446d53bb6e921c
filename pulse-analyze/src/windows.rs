//! Time-window computation for one analytics pass (spec §4.3.2).
//!
//! Grounded in `history_analyzer.py::generate_history_data`'s bucketing,
//! generalized to the current-window/history-window split spec §4.3.2
//! describes.

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};

#[derive(Debug, Clone, Copy)]
pub struct TimeWindows {
    pub t_last: DateTime<Utc>,
    pub t_end: DateTime<Utc>,
    pub current_start: DateTime<Utc>,
    pub current_end: DateTime<Utc>,
    /// 24 half-open `[start, end)` hourly slots ending at `t_end`, oldest
    /// first.
    pub history_slots: [(DateTime<Utc>, DateTime<Utc>); 24],
}

impl TimeWindows {
    /// `t_last` is the max `created_at` across ingested records;
    /// `current_window_minutes` is the configured current-window width
    /// (default 60).
    pub fn compute(t_last: DateTime<Utc>, current_window_minutes: i64) -> Self {
        let t_end = round_up_to_hour(t_last);
        let current_start = t_last - ChronoDuration::minutes(current_window_minutes);

        let mut history_slots = [(t_end, t_end); 24];
        for (i, slot) in history_slots.iter_mut().enumerate() {
            // i=0..23, slot i starts at t_end - (24-i) hours.
            let start = t_end - ChronoDuration::hours(24 - i as i64);
            let end = start + ChronoDuration::hours(1);
            *slot = (start, end);
        }

        Self {
            t_last,
            t_end,
            current_start,
            current_end: t_last,
            history_slots,
        }
    }
}

fn round_up_to_hour(dt: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = dt
        .with_minute(0)
        .unwrap()
        .with_second(0)
        .unwrap()
        .with_nanosecond(0)
        .unwrap();
    if dt == truncated {
        truncated
    } else {
        truncated + ChronoDuration::hours(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rounds_up_to_the_next_whole_hour() {
        let t_last = Utc.with_ymd_and_hms(2025, 1, 1, 9, 50, 0).unwrap();
        let w = TimeWindows::compute(t_last, 60);
        assert_eq!(w.t_end, Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn on_the_hour_stays_put() {
        let t_last = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let w = TimeWindows::compute(t_last, 60);
        assert_eq!(w.t_end, t_last);
    }

    #[test]
    fn history_slots_are_24_consecutive_hours_ending_at_t_end() {
        // S3
        let t_last = Utc.with_ymd_and_hms(2025, 1, 1, 9, 50, 0).unwrap();
        let w = TimeWindows::compute(t_last, 60);
        assert_eq!(w.history_slots.len(), 24);
        assert_eq!(w.history_slots[0].0, Utc.with_ymd_and_hms(2024, 12, 31, 10, 0, 0).unwrap());
        assert_eq!(w.history_slots[23].0, Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap());
        assert_eq!(w.history_slots[23].1, w.t_end);
        for pair in w.history_slots.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
    }
}
