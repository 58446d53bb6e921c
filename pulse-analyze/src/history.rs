//! Per-keyword 24-hour history series (spec §4.3.4).
//!
//! Grounded in `history_analyzer.py::generate_history_data`.

use crate::tokenize::tokenize;
use crate::windows::TimeWindows;
use pulse_core::CleanItem;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistoryPoint {
    pub timestamp: String,
    pub frequency: u64,
}

/// Builds the 24-point series for `keyword`. Always exactly 24 entries
/// (I3), one per slot in `windows.history_slots`, oldest first.
pub fn series_for_keyword(records: &[CleanItem], windows: &TimeWindows, keyword: &str) -> Vec<HistoryPoint> {
    windows
        .history_slots
        .iter()
        .map(|&(start, end)| {
            let frequency = records
                .iter()
                .filter(|r| {
                    parse_created_at(r)
                        .map(|ts| ts >= start && ts < end)
                        .unwrap_or(false)
                })
                .filter(|r| tokenize(&r.analytics_text()).iter().any(|t| t == keyword))
                .count() as u64;
            HistoryPoint {
                timestamp: pulse_core::time::to_iso_seconds(start),
                frequency,
            }
        })
        .collect()
}

fn parse_created_at(record: &CleanItem) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(&record.created_at.replace('Z', "+00:00"))
        .ok()
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(created_at: &str, text: &str) -> CleanItem {
        CleanItem {
            id: "x".into(),
            source: "reuters".into(),
            created_at: created_at.into(),
            timestamp: 0.0,
            cleaned_at: "2025-01-01T09:50:00Z".into(),
            title: None,
            text: Some(text.to_string()),
            content: None,
            url: None,
            sentiment: None,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn always_returns_exactly_24_points() {
        let t_last = chrono::Utc.with_ymd_and_hms(2025, 1, 1, 9, 50, 0).unwrap();
        let windows = TimeWindows::compute(t_last, 60);
        let points = series_for_keyword(&[], &windows, "bitcoin");
        assert_eq!(points.len(), 24);
        assert!(points.iter().all(|p| p.frequency == 0));
    }

    #[test]
    fn counts_matches_within_the_right_slot() {
        // S3-flavored: a handful of bitcoin mentions scattered across hours
        let t_last = chrono::Utc.with_ymd_and_hms(2025, 1, 1, 9, 50, 0).unwrap();
        let windows = TimeWindows::compute(t_last, 60);
        let records = vec![
            item("2025-01-01T03:15:00Z", "bitcoin rallies"),
            item("2025-01-01T03:45:00Z", "bitcoin news"),
            item("2025-01-01T05:10:00Z", "bitcoin dips"),
            item("2025-01-01T06:00:00Z", "ethereum news"),
        ];
        let points = series_for_keyword(&records, &windows, "bitcoin");
        let nonzero: Vec<_> = points.iter().filter(|p| p.frequency > 0).collect();
        assert_eq!(nonzero.len(), 2);
        assert_eq!(points.len(), 24);
    }
}
