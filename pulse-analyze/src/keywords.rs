//! Trending keyword computation (spec §4.3.3).
//!
//! Grounded in `text_analyzer.py::calculate_growth_rate` /
//! `calculate_trend_score` and `sentiment_analyzer.py::
//! analyze_sentiment_distribution`, ported verbatim including the
//! hard-coded historical-mean divisor (`SPEC_FULL.md` §4, Open Question 1 —
//! preserved as-is, not "fixed").

use crate::sentiment::SentimentLabel;
use crate::tokenize::tokenize;
use crate::windows::TimeWindows;
use pulse_core::CleanItem;
use serde::Serialize;
use std::collections::HashMap;

/// The divisor the source's legacy design applies to the history-window
/// token count when computing a historical mean. Retained verbatim; see
/// the design notes above.
pub const HISTORY_MEAN_DIVISOR_LEGACY: f64 = 48.0;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SentimentBreakdown {
    pub positive: f64,
    pub negative: f64,
    pub total_comments: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendingKeyword {
    pub rank: usize,
    pub keyword: String,
    pub current_frequency: u64,
    pub growth_rate: f64,
    pub trend_score: f64,
    pub sentiment: SentimentBreakdown,
}

/// Computes the top-K trending keywords over `records`, given the already
/// resolved [`TimeWindows`] for this pass.
pub fn compute(records: &[CleanItem], windows: &TimeWindows, top_k: usize) -> Vec<TrendingKeyword> {
    let mut current_freq: HashMap<String, u64> = HashMap::new();
    let mut history_freq: HashMap<String, u64> = HashMap::new();

    for record in records {
        let Some(created_at) = parse_created_at(record) else {
            continue;
        };
        let tokens = tokenize(&record.analytics_text());

        if created_at >= windows.current_start && created_at <= windows.current_end {
            for token in &tokens {
                *current_freq.entry(token.clone()).or_insert(0) += 1;
            }
        }
        let history_start = windows.history_slots[0].0;
        if created_at >= history_start && created_at < windows.t_end {
            for token in &tokens {
                *history_freq.entry(token.clone()).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<(&String, &u64)> = current_freq.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(top_k);

    let max_current = ranked.first().map(|(_, c)| **c).unwrap_or(1).max(1) as f64;

    ranked
        .into_iter()
        .enumerate()
        .map(|(i, (keyword, &current))| {
            let hist_count = *history_freq.get(keyword).unwrap_or(&0);
            let hist_mean = hist_count as f64 / HISTORY_MEAN_DIVISOR_LEGACY;
            let growth_rate = growth_rate(current as f64, hist_mean);
            let trend_score = trend_score(current as f64, max_current, growth_rate);
            let sentiment = sentiment_breakdown(records, keyword);
            TrendingKeyword {
                rank: i + 1,
                keyword: keyword.clone(),
                current_frequency: current,
                growth_rate,
                trend_score,
                sentiment,
            }
        })
        .collect()
}

fn growth_rate(current: f64, hist_mean: f64) -> f64 {
    if hist_mean == 0.0 {
        if current == 0.0 {
            0.0
        } else {
            100.0
        }
    } else {
        (current - hist_mean) / hist_mean * 100.0
    }
}

fn trend_score(current: f64, max_current: f64, growth_rate: f64) -> f64 {
    let freq_score = current / max_current;
    let growth_score = (growth_rate.abs() / 100.0).min(1.0);
    let score = 0.6 * freq_score + 0.4 * growth_score;
    (score * 100.0).round() / 100.0
}

/// Percentage of matching records that are Bullish (`positive`) vs. Bearish
/// (`negative`), normalized to sum to 100 with the remainder assigned to
/// `negative` (spec §4.3.3). This is the shared convention every sentiment
/// rollup in this crate builds on; "matching" is up to the caller (by
/// keyword here, by item id in `newsfeed::derived_sentiment`).
pub fn breakdown_for_matching(matching: &[&CleanItem]) -> SentimentBreakdown {
    let total = matching.len() as u64;
    if total == 0 {
        return SentimentBreakdown {
            positive: 0.0,
            negative: 0.0,
            total_comments: 0,
        };
    }

    let bullish = matching
        .iter()
        .filter(|r| {
            r.sentiment
                .as_deref()
                .and_then(SentimentLabel::normalize)
                .map(|s| s == SentimentLabel::Bullish)
                .unwrap_or(false)
        })
        .count() as f64;

    let positive = (bullish / total as f64 * 100.0).round();
    let negative = 100.0 - positive;

    SentimentBreakdown {
        positive,
        negative,
        total_comments: total,
    }
}

pub fn sentiment_breakdown(records: &[CleanItem], keyword: &str) -> SentimentBreakdown {
    let keyword_lower = keyword.to_lowercase();
    let matching: Vec<&CleanItem> = records
        .iter()
        .filter(|r| r.analytics_text().to_lowercase().contains(&keyword_lower))
        .collect();
    breakdown_for_matching(&matching)
}

fn parse_created_at(record: &CleanItem) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(&record.created_at.replace('Z', "+00:00"))
        .ok()
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_special_cases() {
        // S4
        assert_eq!(growth_rate(0.0, 0.0), 0.0);
        assert_eq!(growth_rate(5.0, 0.0), 100.0);
        assert_eq!(growth_rate(10.0, 2.0), 400.0);
    }

    #[test]
    fn trend_score_combines_frequency_and_growth() {
        // current == max_current (freq_score=1.0), growth 400% clamps to 1.0
        assert_eq!(trend_score(10.0, 10.0, 400.0), 1.0);
        // half the max frequency, zero growth
        assert_eq!(trend_score(5.0, 10.0, 0.0), 0.3);
    }

    #[test]
    fn sentiment_percentages_sum_to_100() {
        // I6
        let mut r1 = sample_item("bitcoin surges", Some("Bullish"));
        let mut r2 = sample_item("bitcoin falls", Some("Bearish"));
        r1.id = "1".into();
        r2.id = "2".into();
        let breakdown = sentiment_breakdown(&[r1, r2], "bitcoin");
        assert_eq!(breakdown.positive + breakdown.negative, 100.0);
        assert_eq!(breakdown.total_comments, 2);
    }

    fn sample_item(text: &str, sentiment: Option<&str>) -> CleanItem {
        CleanItem {
            id: "x".into(),
            source: "reuters".into(),
            created_at: "2024-03-05T10:30:00Z".into(),
            timestamp: 1_709_634_600.0,
            cleaned_at: "2024-03-05T10:31:00Z".into(),
            title: None,
            text: Some(text.to_string()),
            content: None,
            url: None,
            sentiment: sentiment.map(str::to_string),
            extra: serde_json::Map::new(),
        }
    }
}
