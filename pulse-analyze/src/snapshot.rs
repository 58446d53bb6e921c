//! Assembly and persistence of one analytics pass's output (spec §4.3.7).
//!
//! Grounded in `processer/Analysis/main.py::_generate_output_data` for the
//! metadata shape (`timestamp`, `update_interval`, `news_sources`) and
//! `_calculate_news_sources` for the source-distribution count (ties broken
//! by first-seen order, a missing/blank source folded into `Unknown`), and
//! in `sentiment_updater.py::get_queue_stats` for the bounded
//! sentiment-coverage scan.

use crate::history::HistoryPoint;
use crate::keywords::TrendingKeyword;
use crate::newsfeed::NewsItem;
use crate::wordcloud::WordCloudEntry;
use pulse_core::config::ChannelNames;
use pulse_core::store::KvStore;
use pulse_core::{CleanItem, PulseError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

const SENTIMENT_COVERAGE_SCAN_LIMIT: u64 = 1000;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SentimentCoverage {
    pub queue_length: u64,
    pub has_sentiment: u64,
    pub missing_sentiment: u64,
    pub scanned_items: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotMetadata {
    pub timestamp: String,
    pub update_interval: i64,
    pub news_sources: Vec<(String, u64)>,
    pub sentiment_coverage: SentimentCoverage,
}

#[derive(Debug, Clone)]
pub struct AnalyticsSnapshot {
    pub metadata: SnapshotMetadata,
    pub trending_keywords: Vec<TrendingKeyword>,
    pub word_cloud: Vec<WordCloudEntry>,
    pub news_feed: Vec<NewsItem>,
    pub history_data: HashMap<String, Vec<HistoryPoint>>,
}

/// Value-counts `records` by `source`, `Unknown` substituted for a
/// missing/blank value, ordered descending by count with ties broken by
/// first-seen order (matches `pandas.Series.value_counts` on the original's
/// insertion-ordered `dict`).
fn news_sources(records: &[CleanItem]) -> Vec<(String, u64)> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, u64> = HashMap::new();
    for record in records {
        let source = if record.source.trim().is_empty() {
            "Unknown".to_string()
        } else {
            record.source.clone()
        };
        if !counts.contains_key(&source) {
            order.push(source.clone());
        }
        *counts.entry(source).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, u64)> = order.into_iter().map(|s| (s.clone(), counts[&s])).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// Scans at most the first 1000 entries of `clean_queue` reporting how many
/// already carry a sentiment label.
async fn sentiment_coverage(store: &dyn KvStore, clean_queue_key: &str) -> Result<SentimentCoverage> {
    let queue_length = store.llen(clean_queue_key).await?;
    let scan_upper = queue_length.min(SENTIMENT_COVERAGE_SCAN_LIMIT);
    let mut has_sentiment = 0u64;
    let mut missing_sentiment = 0u64;
    if scan_upper > 0 {
        let entries = store.lrange(clean_queue_key, 0, scan_upper as isize - 1).await?;
        for raw in &entries {
            match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(value) => {
                    let has = value
                        .get("sentiment")
                        .and_then(serde_json::Value::as_str)
                        .map(|s| !s.trim().is_empty())
                        .unwrap_or(false);
                    if has {
                        has_sentiment += 1;
                    } else {
                        missing_sentiment += 1;
                    }
                }
                Err(_) => missing_sentiment += 1,
            }
        }
    }
    Ok(SentimentCoverage {
        queue_length,
        has_sentiment,
        missing_sentiment,
        scanned_items: scan_upper,
    })
}

/// Builds the full snapshot from one pass's already-computed sections.
pub async fn build(
    store: &dyn KvStore,
    clean_queue_key: &str,
    records: &[CleanItem],
    update_interval_minutes: i64,
    trending_keywords: Vec<TrendingKeyword>,
    word_cloud: Vec<WordCloudEntry>,
    news_feed: Vec<NewsItem>,
    history_data: HashMap<String, Vec<HistoryPoint>>,
) -> Result<AnalyticsSnapshot> {
    let coverage = sentiment_coverage(store, clean_queue_key).await?;
    let metadata = SnapshotMetadata {
        timestamp: pulse_core::time::to_iso_seconds(chrono::Utc::now()),
        update_interval: update_interval_minutes,
        news_sources: news_sources(records),
        sentiment_coverage: coverage,
    };
    Ok(AnalyticsSnapshot {
        metadata,
        trending_keywords,
        word_cloud,
        news_feed,
        history_data,
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PublishStats {
    pub keywords_count: u64,
    pub history_count: u64,
}

/// Serializes every section as its own JSON-string key under `channels`'
/// snapshot prefix, TTL'd, overwriting whatever the prior pass left.
pub async fn publish(store: &dyn KvStore, channels: &ChannelNames, snapshot: &AnalyticsSnapshot, ttl: Duration) -> Result<PublishStats> {
    let metadata_json = serde_json::to_string(&snapshot.metadata).map_err(PulseError::from)?;
    store.set_ex(&channels.metadata_key(), &metadata_json, ttl).await?;

    let keywords_json = serde_json::to_string(&snapshot.trending_keywords).map_err(PulseError::from)?;
    store.set_ex(&channels.trending_keywords_key(), &keywords_json, ttl).await?;

    let word_cloud_json = serde_json::to_string(&snapshot.word_cloud).map_err(PulseError::from)?;
    store.set_ex(&channels.word_cloud_key(), &word_cloud_json, ttl).await?;

    let news_feed_json = serde_json::to_string(&snapshot.news_feed).map_err(PulseError::from)?;
    store.set_ex(&channels.news_feed_key(), &news_feed_json, ttl).await?;

    for (keyword, series) in &snapshot.history_data {
        let series_json = serde_json::to_string(series).map_err(PulseError::from)?;
        store.set_ex(&channels.history_key(keyword), &series_json, ttl).await?;
    }

    Ok(PublishStats {
        keywords_count: snapshot.trending_keywords.len() as u64,
        history_count: snapshot.history_data.len() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::store::MemoryStore;

    fn item(source: &str, sentiment: Option<&str>) -> CleanItem {
        CleanItem {
            id: "x".into(),
            source: source.into(),
            created_at: "2024-03-05T10:30:00Z".into(),
            timestamp: 0.0,
            cleaned_at: "2024-03-05T10:31:00Z".into(),
            title: None,
            text: Some("text".into()),
            content: None,
            url: None,
            sentiment: sentiment.map(str::to_string),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn news_sources_ranks_by_count_descending() {
        let records = vec![item("reuters", None), item("reuters", None), item("reddit", None)];
        let ranked = news_sources(&records);
        assert_eq!(ranked[0], ("reuters".to_string(), 2));
        assert_eq!(ranked[1], ("reddit".to_string(), 1));
    }

    #[test]
    fn blank_source_becomes_unknown() {
        let records = vec![item("", None)];
        let ranked = news_sources(&records);
        assert_eq!(ranked[0].0, "Unknown");
    }

    #[tokio::test]
    async fn sentiment_coverage_counts_labeled_vs_missing() {
        let store = MemoryStore::new();
        store.lpush("clean_queue", &serde_json::to_string(&item("a", Some("Bullish"))).unwrap()).await.unwrap();
        store.lpush("clean_queue", &serde_json::to_string(&item("a", None)).unwrap()).await.unwrap();
        let coverage = sentiment_coverage(&store, "clean_queue").await.unwrap();
        assert_eq!(coverage.queue_length, 2);
        assert_eq!(coverage.has_sentiment, 1);
        assert_eq!(coverage.missing_sentiment, 1);
        assert_eq!(coverage.scanned_items, 2);
    }

    #[tokio::test]
    async fn publish_writes_one_key_per_section_with_ttl() {
        let store = MemoryStore::new();
        let channels = ChannelNames::default();
        let snapshot = build(&store, &channels.clean_queue, &[], 5, Vec::new(), Vec::new(), Vec::new(), HashMap::new())
            .await
            .unwrap();
        let stats = publish(&store, &channels, &snapshot, Duration::from_secs(86_400)).await.unwrap();
        assert_eq!(stats.keywords_count, 0);
        assert!(store.get(&channels.metadata_key()).await.unwrap().is_some());
        assert!(store.get(&channels.trending_keywords_key()).await.unwrap().is_some());
        assert!(store.get(&channels.word_cloud_key()).await.unwrap().is_some());
        assert!(store.get(&channels.news_feed_key()).await.unwrap().is_some());
    }
}
