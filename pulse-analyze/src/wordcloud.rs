//! Word cloud generation (spec §4.3.5): top-N tokens by current-window
//! frequency.

use crate::tokenize::tokenize;
use crate::windows::TimeWindows;
use pulse_core::CleanItem;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WordCloudEntry {
    pub text: String,
    pub value: u64,
}

/// Top `n` tokens by frequency within the current window, descending by
/// value (I4).
pub fn compute(records: &[CleanItem], windows: &TimeWindows, n: usize) -> Vec<WordCloudEntry> {
    let mut freq: HashMap<String, u64> = HashMap::new();
    for record in records {
        let Some(ts) = parse_created_at(record) else {
            continue;
        };
        if ts < windows.current_start || ts > windows.current_end {
            continue;
        }
        for token in tokenize(&record.analytics_text()) {
            *freq.entry(token).or_insert(0) += 1;
        }
    }

    let mut entries: Vec<WordCloudEntry> = freq
        .into_iter()
        .map(|(text, value)| WordCloudEntry { text, value })
        .collect();
    entries.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.text.cmp(&b.text)));
    entries.truncate(n);
    entries
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

    fn item(text: &str) -> CleanItem {
        CleanItem {
            id: "x".into(),
            source: "reuters".into(),
            created_at: "2025-01-01T09:50:00Z".into(),
            timestamp: 0.0,
            cleaned_at: "2025-01-01T09:51:00Z".into(),
            title: None,
            text: Some(text.to_string()),
            content: None,
            url: None,
            sentiment: None,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn ranks_by_frequency_descending_and_caps_at_n() {
        let t_last = chrono::Utc.with_ymd_and_hms(2025, 1, 1, 9, 50, 0).unwrap();
        let windows = TimeWindows::compute(t_last, 60);
        let records = vec![
            item("bitcoin bitcoin ethereum"),
            item("bitcoin stocks"),
            item("ethereum"),
        ];
        let cloud = compute(&records, &windows, 2);
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud[0].text, "bitcoin");
        assert_eq!(cloud[0].value, 3);
    }
}
