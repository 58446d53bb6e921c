//! Read-side assembly of the analytics snapshot (spec §4.5).
//!
//! `pulse-serve` never deserializes into `pulse-analyze`'s section types —
//! it only depends on `pulse-core`, and each section is already a
//! self-contained JSON string by the time it lands in the store (spec
//! §4.3.7). Sections are therefore read back as opaque [`serde_json::Value`]
//! and handed to clients as-is; a missing key returns the section's
//! empty-shape default rather than an error (spec §4.5's `GET snapshot`
//! contract).

use pulse_core::config::ChannelNames;
use pulse_core::store::KvStore;
use pulse_core::Result;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// The section names `GET section/<name>` accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Metadata,
    TrendingKeywords,
    WordCloud,
    NewsFeed,
    HistoryData,
}

impl Section {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "metadata" => Some(Self::Metadata),
            "trending_keywords" => Some(Self::TrendingKeywords),
            "word_cloud" => Some(Self::WordCloud),
            "news_feed" => Some(Self::NewsFeed),
            "history_data" => Some(Self::HistoryData),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::TrendingKeywords => "trending_keywords",
            Self::WordCloud => "word_cloud",
            Self::NewsFeed => "news_feed",
            Self::HistoryData => "history_data",
        }
    }

    /// The empty shape returned when the key is absent, per spec §4.5
    /// ("return its empty-shape default (empty list / object)").
    fn empty(&self) -> Value {
        match self {
            Self::Metadata => Value::Object(serde_json::Map::new()),
            Self::HistoryData => Value::Object(serde_json::Map::new()),
            _ => Value::Array(Vec::new()),
        }
    }
}

/// Reads one single-string-key section, falling back to its empty shape if
/// the key is absent or (defensively) unparseable.
async fn read_single(store: &dyn KvStore, key: &str, section: Section) -> Result<Value> {
    match store.get(key).await? {
        Some(raw) => Ok(serde_json::from_str(&raw).unwrap_or_else(|_| section.empty())),
        None => Ok(section.empty()),
    }
}

/// Reads every `history_data:<keyword>` key under the snapshot prefix and
/// assembles them into one `{keyword: [...]}` object, sorted by keyword for
/// deterministic output.
pub async fn read_history_data(store: &dyn KvStore, channels: &ChannelNames) -> Result<Value> {
    let prefix = format!("{}:history_data:", channels.snapshot_prefix);
    let keys = store.keys_with_prefix(&prefix).await?;
    let mut series: BTreeMap<String, Value> = BTreeMap::new();
    for key in keys {
        let Some(keyword) = key.strip_prefix(&prefix) else {
            continue;
        };
        if let Some(raw) = store.get(&key).await? {
            if let Ok(value) = serde_json::from_str::<Value>(&raw) {
                series.insert(keyword.to_string(), value);
            }
        }
    }
    Ok(Value::Object(series.into_iter().map(|(k, v)| (k, v)).collect()))
}

pub async fn read_section(store: &dyn KvStore, channels: &ChannelNames, section: Section) -> Result<Value> {
    match section {
        Section::Metadata => read_single(store, &channels.metadata_key(), section).await,
        Section::TrendingKeywords => read_single(store, &channels.trending_keywords_key(), section).await,
        Section::WordCloud => read_single(store, &channels.word_cloud_key(), section).await,
        Section::NewsFeed => read_single(store, &channels.news_feed_key(), section).await,
        Section::HistoryData => read_history_data(store, channels).await,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub metadata: Value,
    pub trending_keywords: Value,
    pub word_cloud: Value,
    pub news_feed: Value,
    pub history_data: Value,
}

/// `GET snapshot`: every section read in one shot, each falling back to its
/// own empty default independently (spec §4.5's best-effort cross-key
/// consistency — a reader may see section N from one pass and section N+1
/// from the next, and that's fine).
pub async fn read_snapshot(store: &dyn KvStore, channels: &ChannelNames) -> Result<Snapshot> {
    Ok(Snapshot {
        metadata: read_section(store, channels, Section::Metadata).await?,
        trending_keywords: read_section(store, channels, Section::TrendingKeywords).await?,
        word_cloud: read_section(store, channels, Section::WordCloud).await?,
        news_feed: read_section(store, channels, Section::NewsFeed).await?,
        history_data: read_section(store, channels, Section::HistoryData).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::store::MemoryStore;

    #[tokio::test]
    async fn missing_sections_return_empty_shapes() {
        let store = MemoryStore::new();
        let channels = ChannelNames::default();
        let snapshot = read_snapshot(&store, &channels).await.unwrap();
        assert_eq!(snapshot.metadata, Value::Object(serde_json::Map::new()));
        assert_eq!(snapshot.trending_keywords, Value::Array(Vec::new()));
        assert_eq!(snapshot.word_cloud, Value::Array(Vec::new()));
        assert_eq!(snapshot.news_feed, Value::Array(Vec::new()));
        assert_eq!(snapshot.history_data, Value::Object(serde_json::Map::new()));
    }

    #[tokio::test]
    async fn present_section_is_parsed_from_its_json_string() {
        let store = MemoryStore::new();
        let channels = ChannelNames::default();
        store
            .set(&channels.word_cloud_key(), r#"[{"text":"bitcoin","value":9}]"#)
            .await
            .unwrap();
        let section = read_section(&store, &channels, Section::WordCloud).await.unwrap();
        assert_eq!(section[0]["text"], "bitcoin");
    }

    #[tokio::test]
    async fn history_data_is_assembled_from_per_keyword_keys() {
        let store = MemoryStore::new();
        let channels = ChannelNames::default();
        store
            .set(&channels.history_key("bitcoin"), r#"[{"timestamp":"t","frequency":3}]"#)
            .await
            .unwrap();
        store
            .set(&channels.history_key("ethereum"), r#"[{"timestamp":"t","frequency":1}]"#)
            .await
            .unwrap();
        let history = read_section(&store, &channels, Section::HistoryData).await.unwrap();
        assert_eq!(history["bitcoin"][0]["frequency"], 3);
        assert_eq!(history["ethereum"][0]["frequency"], 1);
    }

    #[test]
    fn section_name_round_trips() {
        for s in [
            Section::Metadata,
            Section::TrendingKeywords,
            Section::WordCloud,
            Section::NewsFeed,
            Section::HistoryData,
        ] {
            assert_eq!(Section::parse(s.name()), Some(s));
        }
        assert_eq!(Section::parse("bogus"), None);
    }
}
