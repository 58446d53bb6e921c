//! Sentiment labels, the oracle abstraction, and the two write-back modes
//! (spec §4.3.1).
//!
//! Grounded in `sentiment_updater.py`: `update_sentiment_in_queue` is the
//! immediate per-batch remove+append path; `batch_update_sentiments` is the
//! deferred single-scan path. The oracle itself is grounded in the design
//! note (`SPEC_FULL.md` §9 / spec §9): "replace the lazy singleton predictor
//! with explicit construction and dependency injection" — `SentimentOracle`
//! is constructed once at stage startup and handed to the analyzer.

use async_trait::async_trait;
use pulse_core::store::{KvStore, ListRewrite};
use pulse_core::{CleanItem, PulseError, Result};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentLabel {
    Bullish,
    Bearish,
    Neutral,
}

impl SentimentLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Bullish => "Bullish",
            SentimentLabel::Bearish => "Bearish",
            SentimentLabel::Neutral => "neutral",
        }
    }

    /// Maps a raw label (including legacy synonyms the source accumulated
    /// across sources) onto the canonical three.
    pub fn normalize(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "bullish" | "positive" | "pos" | "buy" => Some(SentimentLabel::Bullish),
            "bearish" | "negative" | "neg" | "sell" => Some(SentimentLabel::Bearish),
            "neutral" | "none" | "hold" => Some(SentimentLabel::Neutral),
            "" => None,
            _ => None,
        }
    }
}

/// External sentiment classifier. Implementations may call out to a model
/// server; batch size is the caller's concern (spec §4.3.1: default 32/128).
#[async_trait]
pub trait SentimentOracle: Send + Sync {
    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<SentimentLabel>>;
}

const BULLISH_WORDS: &[&str] = &[
    "bullish", "surge", "rally", "soar", "gain", "growth", "upgrade", "beat", "record", "breakout",
    "buy", "outperform", "upside", "strong", "profit",
];
const BEARISH_WORDS: &[&str] = &[
    "bearish", "plunge", "crash", "slump", "downgrade", "miss", "recession", "sell", "loss",
    "decline", "weak", "underperform", "downside", "risk", "default",
];

/// Lexicon-based fallback used when the real oracle is unavailable and
/// `sentiment.fallback_to_heuristic` is enabled (spec §7 Oracle failure).
#[derive(Debug, Default)]
pub struct HeuristicOracle;

#[async_trait]
impl SentimentOracle for HeuristicOracle {
    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<SentimentLabel>> {
        Ok(texts.iter().map(|t| classify_one(t)).collect())
    }
}

fn classify_one(text: &str) -> SentimentLabel {
    let lower = text.to_lowercase();
    let bull = BULLISH_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let bear = BEARISH_WORDS.iter().filter(|w| lower.contains(*w)).count();
    match bull.cmp(&bear) {
        std::cmp::Ordering::Greater => SentimentLabel::Bullish,
        std::cmp::Ordering::Less => SentimentLabel::Bearish,
        std::cmp::Ordering::Equal => SentimentLabel::Neutral,
    }
}

/// One record read from `clean_queue`, paired with its original serialized
/// form so a write-back can `LREM` the exact stored value.
pub struct QueueRecord {
    pub raw: String,
    pub item: CleanItem,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentFillStats {
    pub filled: u64,
    pub oracle_batches: u64,
    pub oracle_failures: u64,
}

/// Fills missing/empty sentiment on every record, batching oracle calls.
/// When `defer_write_back` is true, write-backs to `clean_queue` are
/// accumulated and flushed as a single `apply_list_rewrites` pipeline after
/// every batch finishes; otherwise each record is written back to the
/// store immediately.
pub async fn fill_sentiments(
    store: &dyn KvStore,
    clean_queue_key: &str,
    records: &mut [QueueRecord],
    oracle: &dyn SentimentOracle,
    fallback: &dyn SentimentOracle,
    batch_size: usize,
    defer_write_back: bool,
) -> Result<SentimentFillStats> {
    let mut stats = SentimentFillStats::default();
    let missing_indices: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.item.sentiment.as_deref().unwrap_or("").trim().is_empty())
        .map(|(i, _)| i)
        .collect();

    let mut pending_updates: HashMap<String, String> = HashMap::new();

    for chunk in missing_indices.chunks(batch_size.max(1)) {
        let texts: Vec<String> = chunk.iter().map(|&i| records[i].item.analytics_text()).collect();
        let labels = match oracle.classify_batch(&texts).await {
            Ok(labels) => labels,
            Err(e) => {
                tracing::warn!("sentiment oracle batch failed, falling back to heuristic: {e}");
                stats.oracle_failures += 1;
                fallback.classify_batch(&texts).await?
            }
        };
        stats.oracle_batches += 1;

        for (&idx, label) in chunk.iter().zip(labels.into_iter()) {
            let old_raw = records[idx].raw.clone();
            records[idx].item.sentiment = Some(label.as_str().to_string());
            let new_raw = serde_json::to_string(&records[idx].item).map_err(PulseError::from)?;
            records[idx].raw = new_raw.clone();
            stats.filled += 1;

            if defer_write_back {
                pending_updates.insert(old_raw, new_raw);
            } else {
                apply_write_back(store, clean_queue_key, &old_raw, &new_raw).await?;
            }
        }
    }

    if defer_write_back {
        let rewrites: Vec<ListRewrite> = pending_updates
            .iter()
            .map(|(old_raw, new_raw)| ListRewrite {
                key: clean_queue_key,
                old_value: old_raw,
                new_value: new_raw,
            })
            .collect();
        store.apply_list_rewrites(&rewrites).await?;
    }

    Ok(stats)
}

async fn apply_write_back(store: &dyn KvStore, key: &str, old_raw: &str, new_raw: &str) -> Result<()> {
    store.lrem(key, 1, old_raw).await?;
    store.lpush(key, new_raw).await?;
    Ok(())
}
