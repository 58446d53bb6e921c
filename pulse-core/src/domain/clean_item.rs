//! `CleanItem`: the validated, normalized record that flows from
//! `pulse-clean` into DB-CLEAN, and from there into `pulse-analyze`.
//!
//! Grounded in `single_pass_cleaner.py::_clean_data` / `_validate_data`. The
//! Python version is a loosely-typed dict; spec §9's design note resolves
//! that into required fields plus a passthrough `extra` map so source-specific
//! fields (subreddit, symbol, author...) survive without the struct knowing
//! about every source ahead of time.

use crate::error::{PulseError, Result};
use crate::time;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A cleaned, deduplicated, normalized record ready for analytics.
///
/// `created_at` and `timestamp` describe the same instant in two
/// representations (ISO-8601 and Unix seconds) per the Open Question
/// resolution in `SPEC_FULL.md` §4: both are derived from one parsed value so
/// they can never disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanItem {
    pub id: String,
    pub source: String,
    pub created_at: String,
    pub timestamp: f64,
    pub cleaned_at: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,

    /// Curated passthrough fields named in spec §3 (`author`, `score`,
    /// `comments`, `tags`, `subreddit`, `symbol`, `symbols`, ...) that the
    /// pipeline carries but never reads structurally.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

const EXTRA_ALLOW_LIST: &[&str] = &[
    "author", "score", "comments", "tags", "subreddit", "symbol", "symbols",
];

impl CleanItem {
    /// Builds a `CleanItem` from a raw JSON record, performing the
    /// normalization and validation steps of spec §4.2 (steps 4-9): text
    /// trimming and whitespace collapse, HTML tag stripping, timestamp
    /// normalization, and the "at least one populated text field" rule.
    ///
    /// Does not compute the id or dedup check: the caller supplies `id`
    /// (from [`crate::fingerprint::Fingerprint`]) since that decision also
    /// needs the `IdCache` lookup, which lives above this layer.
    ///
    /// `now` stamps `cleaned_at` and, per spec §4.2 step 7, also becomes
    /// `created_at`/`timestamp` when the record carries no parseable time
    /// field at all (missing timestamp is not a validation failure).
    pub fn from_raw(record: &Map<String, Value>, id: String, now: DateTime<Utc>) -> Result<Self> {
        let source = record
            .get("source")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PulseError::Validation("missing source field".into()))?;
        if source.trim().is_empty() {
            return Err(PulseError::Validation("empty source field".into()));
        }

        let created_at = time::extract_created_at(record).unwrap_or_else(|| time::to_iso_seconds(now));
        let timestamp = chrono::DateTime::parse_from_rfc3339(&created_at.replace('Z', "+00:00"))
            .map(|dt| dt.timestamp() as f64)
            .unwrap_or_else(|_| now.timestamp() as f64);

        let title = clean_text_field(record.get("title"));
        let text = clean_text_field(record.get("text"));
        let content = clean_text_field(record.get("content"));

        if title.is_none() && text.is_none() && content.is_none() {
            return Err(PulseError::Validation(
                "no non-empty text in title/text/content".into(),
            ));
        }

        let url = record
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|s| !s.trim().is_empty());
        let sentiment = record
            .get("sentiment")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut extra = Map::new();
        for field in EXTRA_ALLOW_LIST {
            if let Some(v) = record.get(*field) {
                extra.insert((*field).to_string(), v.clone());
            }
        }

        Ok(CleanItem {
            id,
            source,
            created_at,
            timestamp,
            cleaned_at: time::to_iso_seconds(now),
            title,
            text,
            content,
            url,
            sentiment,
            extra,
        })
    }

    /// The text analytics should tokenize: first non-empty of
    /// `title`, `text`, `content`, joined when more than one is present.
    pub fn analytics_text(&self) -> String {
        [&self.title, &self.text, &self.content]
            .into_iter()
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Trims whitespace, collapses internal runs of whitespace, and strips HTML
/// tags (`single_pass_cleaner.py` uses a `re.sub(r"<[^>]+>", "", text)`
/// equivalent). Returns `None` if nothing non-empty remains.
fn clean_text_field(value: Option<&Value>) -> Option<String> {
    let raw = value.and_then(Value::as_str)?;
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;
    for c in raw.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            _ => out.push(c),
        }
    }
    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-05T10:31:00+00:00")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn builds_a_minimal_valid_item() {
        let r = obj(json!({
            "source": "reuters",
            "title": "Fed holds rates steady",
            "created_at": "2024-03-05T10:30:00Z",
        }));
        let item = CleanItem::from_raw(&r, "news_1".into(), fixed_now()).unwrap();
        assert_eq!(item.title.unwrap(), "Fed holds rates steady");
        assert_eq!(item.created_at, "2024-03-05T10:30:00Z");
        assert_eq!(item.timestamp, 1_709_634_600.0);
        assert_eq!(item.cleaned_at, "2024-03-05T10:31:00Z");
    }

    #[test]
    fn strips_html_and_collapses_whitespace() {
        let r = obj(json!({
            "source": "rss",
            "content": "<p>Hello   <b>world</b></p>\n\n",
            "created_at": "2024-03-05T10:30:00Z",
        }));
        let item = CleanItem::from_raw(&r, "x".into(), fixed_now()).unwrap();
        assert_eq!(item.content.unwrap(), "Hello world");
    }

    #[test]
    fn rejects_missing_text_fields() {
        let r = obj(json!({"source": "reuters", "created_at": "2024-03-05T10:30:00Z"}));
        assert!(CleanItem::from_raw(&r, "x".into(), fixed_now()).is_err());
    }

    #[test]
    fn defaults_timestamp_to_now_when_unparseable() {
        let r = obj(json!({"source": "reuters", "title": "hi"}));
        let item = CleanItem::from_raw(&r, "x".into(), fixed_now()).unwrap();
        assert_eq!(item.created_at, "2024-03-05T10:31:00Z");
        assert_eq!(item.timestamp, fixed_now().timestamp() as f64);
    }

    #[test]
    fn preserves_curated_extras() {
        let r = obj(json!({
            "source": "reddit",
            "title": "$TSLA to the moon",
            "created_at": "2024-03-05T10:30:00Z",
            "subreddit": "wallstreetbets",
            "score": 420,
            "not_in_allow_list": "dropped",
        }));
        let item = CleanItem::from_raw(&r, "x".into(), fixed_now()).unwrap();
        assert_eq!(item.extra.get("subreddit").unwrap(), "wallstreetbets");
        assert_eq!(item.extra.get("score").unwrap(), 420);
        assert!(!item.extra.contains_key("not_in_allow_list"));
    }

    #[test]
    fn analytics_text_joins_populated_fields() {
        let r = obj(json!({
            "source": "reuters",
            "title": "Headline",
            "text": "Body",
            "created_at": "2024-03-05T10:30:00Z",
        }));
        let item = CleanItem::from_raw(&r, "x".into(), fixed_now()).unwrap();
        assert_eq!(item.analytics_text(), "Headline Body");
    }
}
