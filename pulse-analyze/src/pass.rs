//! The analytics engine's single-pass algorithm (spec §4.3).
//!
//! Grounded in `processer/Analysis/main.py::run_analysis`'s top-to-bottom
//! sequence: load queue, fill sentiment, compute windows, derive every
//! section, emit. Mirrors `pulse_clean::pass::run_once`'s shape (load once,
//! compute, publish).

use crate::sentiment::{QueueRecord, SentimentOracle};
use crate::snapshot::{self, AnalyticsSnapshot, PublishStats};
use crate::{history, keywords, newsfeed, windows::TimeWindows, wordcloud};
use pulse_core::config::{AnalyticsSettings, ChannelNames};
use pulse_core::store::KvStore;
use pulse_core::{CleanItem, Result};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct PassStats {
    pub records_read: u64,
    pub sentiment_filled: u64,
    pub keywords_count: u64,
    pub history_count: u64,
}

/// Runs one analytics pass: reads `clean_queue` non-destructively, fills
/// missing sentiment, computes every snapshot section, and publishes the
/// result. Returns `Ok(default stats)` on an empty queue without touching
/// the prior snapshot (the prior pass's TTL'd keys simply age out on their
/// own, matching the "each pass fully overwrites" contract only when there
/// is new data to overwrite with).
pub async fn run_once(
    store: &dyn KvStore,
    channels: &ChannelNames,
    settings: &AnalyticsSettings,
    oracle: &dyn SentimentOracle,
    fallback: &dyn SentimentOracle,
) -> Result<PassStats> {
    let mut stats = PassStats::default();

    let raw_entries = store.lrange(&channels.clean_queue, 0, -1).await?;
    if raw_entries.is_empty() {
        return Ok(stats);
    }
    stats.records_read = raw_entries.len() as u64;

    let mut queue_records: Vec<QueueRecord> = Vec::with_capacity(raw_entries.len());
    for raw in raw_entries {
        if let Ok(item) = serde_json::from_str::<CleanItem>(&raw) {
            queue_records.push(QueueRecord { raw, item });
        }
    }

    if settings.sentiment_enabled {
        let fill_stats = crate::sentiment::fill_sentiments(
            store,
            &channels.clean_queue,
            &mut queue_records,
            oracle,
            fallback,
            settings.sentiment_batch_size,
            settings.sentiment_defer_write_back,
        )
        .await?;
        stats.sentiment_filled = fill_stats.filled;
    }

    let records: Vec<CleanItem> = queue_records.into_iter().map(|r| r.item).collect();

    let Some(t_last) = latest_created_at(&records) else {
        return Ok(stats);
    };
    let time_windows = TimeWindows::compute(t_last, settings.current_window_minutes);

    let trending = keywords::compute(&records, &time_windows, settings.trending_keywords_count);
    let cloud = wordcloud::compute(&records, &time_windows, settings.word_cloud_count);
    let feed = newsfeed::compute(&records, settings.news_feed_limit);

    let mut history_data: HashMap<String, Vec<history::HistoryPoint>> = HashMap::new();
    for entry in &trending {
        let series = history::series_for_keyword(&records, &time_windows, &entry.keyword);
        history_data.insert(entry.keyword.clone(), series);
    }

    let snapshot: AnalyticsSnapshot = snapshot::build(
        store,
        &channels.clean_queue,
        &records,
        settings.current_window_minutes,
        trending,
        cloud,
        feed,
        history_data,
    )
    .await?;

    let publish_stats: PublishStats = snapshot::publish(
        store,
        channels,
        &snapshot,
        Duration::from_secs(settings.snapshot_ttl_secs),
    )
    .await?;

    stats.keywords_count = publish_stats.keywords_count;
    stats.history_count = publish_stats.history_count;

    Ok(stats)
}

fn latest_created_at(records: &[CleanItem]) -> Option<chrono::DateTime<chrono::Utc>> {
    records
        .iter()
        .filter_map(|r| {
            chrono::DateTime::parse_from_rfc3339(&r.created_at.replace('Z', "+00:00"))
                .ok()
                .map(|dt| dt.with_timezone(&chrono::Utc))
        })
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::HeuristicOracle;
    use pulse_core::store::MemoryStore;
    use serde_json::json;

    async fn seed(store: &MemoryStore, key: &str, record: serde_json::Value) {
        store.lpush(key, &record.to_string()).await.unwrap();
    }

    #[tokio::test]
    async fn empty_clean_queue_yields_default_stats_without_writes() {
        // I8-adjacent
        let store = MemoryStore::new();
        let channels = ChannelNames::default();
        let oracle = HeuristicOracle;
        let stats = run_once(&store, &channels, &AnalyticsSettings::default(), &oracle, &oracle)
            .await
            .unwrap();
        assert_eq!(stats.records_read, 0);
        assert!(store.get(&channels.metadata_key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn a_full_pass_produces_every_section_and_publishes() {
        let store = MemoryStore::new();
        let channels = ChannelNames::default();
        for (id, text, created_at) in [
            ("a", "bitcoin rallies as markets surge", "2024-03-05T09:00:00Z"),
            ("b", "bitcoin slides on weak data", "2024-03-05T09:10:00Z"),
            ("c", "ethereum steady amid bitcoin news", "2024-03-05T09:20:00Z"),
        ] {
            seed(
                &store,
                &channels.clean_queue,
                json!({
                    "id": id,
                    "source": "reuters",
                    "created_at": created_at,
                    "timestamp": 0.0,
                    "cleaned_at": created_at,
                    "text": text,
                }),
            )
            .await;
        }

        let oracle = HeuristicOracle;
        let stats = run_once(&store, &channels, &AnalyticsSettings::default(), &oracle, &oracle)
            .await
            .unwrap();

        assert_eq!(stats.records_read, 3);
        assert_eq!(stats.sentiment_filled, 3);
        assert!(stats.keywords_count > 0);
        assert_eq!(stats.history_count, stats.keywords_count);

        let metadata = store.get(&channels.metadata_key()).await.unwrap();
        assert!(metadata.is_some());
        let trending = store.get(&channels.trending_keywords_key()).await.unwrap();
        assert!(trending.unwrap().contains("bitcoin"));
    }
}
