//! Recent-items news feed (spec §4.3.6).
//!
//! Grounded in `text_analyzer.py`'s feed assembly: sort by recency, take the
//! first `limit`, and derive a single-label sentiment per item from the same
//! percentage breakdown §4.3.3 uses, restricted to records sharing that
//! item's id.

use crate::keywords::breakdown_for_matching;
use pulse_core::CleanItem;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub publish_time: String,
    pub source: String,
    pub url: String,
    pub sentiment: String,
}

/// The most recent `limit` records, newest first.
pub fn compute(records: &[CleanItem], limit: usize) -> Vec<NewsItem> {
    let mut sorted: Vec<&CleanItem> = records.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted
        .into_iter()
        .take(limit)
        .map(|record| NewsItem {
            title: title_for(record),
            publish_time: record.created_at.clone(),
            source: record.source.clone(),
            url: record.url.clone().unwrap_or_default(),
            sentiment: derived_sentiment(records, record),
        })
        .collect()
}

fn title_for(record: &CleanItem) -> String {
    record
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| record.text.clone().unwrap_or_default())
}

/// Single-label sentiment for one item, derived from the same
/// `positive`/`negative` breakdown `keywords::sentiment_breakdown` uses,
/// over every record sharing this item's id. There's no third "neutral"
/// outcome: `negative` always absorbs the remainder, so with no sentiment
/// data at all `positive` is 0 and `negative` is 100.
fn derived_sentiment(records: &[CleanItem], item: &CleanItem) -> String {
    let matching: Vec<&CleanItem> = records.iter().filter(|r| r.id == item.id).collect();
    let breakdown = breakdown_for_matching(&matching);
    if breakdown.positive >= breakdown.negative {
        "positive".to_string()
    } else {
        "negative".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, created_at: &str, title: Option<&str>, sentiment: Option<&str>) -> CleanItem {
        CleanItem {
            id: id.to_string(),
            source: "reuters".to_string(),
            created_at: created_at.to_string(),
            timestamp: 0.0,
            cleaned_at: created_at.to_string(),
            title: title.map(str::to_string),
            text: Some("fallback text".to_string()),
            content: None,
            url: Some("https://example.com".to_string()),
            sentiment: sentiment.map(str::to_string),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn sorts_newest_first_and_respects_limit() {
        let records = vec![
            item("a", "2024-03-05T09:00:00Z", Some("old"), None),
            item("b", "2024-03-05T11:00:00Z", Some("newest"), None),
            item("c", "2024-03-05T10:00:00Z", Some("middle"), None),
        ];
        let feed = compute(&records, 2);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].title, "newest");
        assert_eq!(feed[1].title, "middle");
    }

    #[test]
    fn falls_back_to_text_when_title_missing() {
        let records = vec![item("a", "2024-03-05T09:00:00Z", None, None)];
        let feed = compute(&records, 10);
        assert_eq!(feed[0].title, "fallback text");
    }

    #[test]
    fn derives_positive_label_when_bullish_dominates() {
        let records = vec![
            item("a", "2024-03-05T09:00:00Z", Some("t"), Some("Bullish")),
            item("a", "2024-03-05T09:05:00Z", Some("t"), Some("Bullish")),
        ];
        let feed = compute(&records, 10);
        assert_eq!(feed[0].sentiment, "positive");
    }

    #[test]
    fn defaults_to_negative_with_no_sentiment_data() {
        let records = vec![item("a", "2024-03-05T09:00:00Z", Some("t"), None)];
        let feed = compute(&records, 10);
        assert_eq!(feed[0].sentiment, "negative");
    }
}
