//! Fingerprint derivation for deduplication.
//!
//! Grounded in `single_pass_cleaner.py::_get_item_id` (id/url/hash fallback
//! chain) and `_clean_data`'s `id` derivation, generalized per spec §3 to the
//! full set of origin-native id fields.

use serde_json::{Map, Value};

const ID_FIELDS: &[&str] = &["id", "post_id", "comment_id", "tweet_id", "guid", "message_id"];

/// Where a fingerprint's value came from. The cleaner needs this (not just
/// the fingerprint string) to decide what to stamp as `CleanItem.id`: a
/// source-native id or URL is reused verbatim as the id, but a hash
/// fallback is used only for dedup — the id field instead gets a synthetic
/// `generated_<ms>` stamp (spec §4.2 step 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintOrigin {
    SourceId,
    Url,
    Hash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub value: String,
    pub origin: FingerprintOrigin,
}

impl Fingerprint {
    pub fn compute(record: &Map<String, Value>) -> Self {
        for field in ID_FIELDS {
            if let Some(v) = record.get(*field) {
                if let Some(s) = coerce_to_string(v) {
                    return Fingerprint {
                        value: s,
                        origin: FingerprintOrigin::SourceId,
                    };
                }
            }
        }

        if let Some(url) = record.get("url").and_then(Value::as_str) {
            if !url.trim().is_empty() {
                return Fingerprint {
                    value: url.to_string(),
                    origin: FingerprintOrigin::Url,
                };
            }
        }

        let title = record.get("title").and_then(Value::as_str).unwrap_or("");
        let source = record.get("source").and_then(Value::as_str).unwrap_or("");
        let content = format!("{title}_{source}");
        let digest = md5::compute(content.as_bytes());
        Fingerprint {
            value: format!("{digest:x}"),
            origin: FingerprintOrigin::Hash,
        }
    }
}

fn coerce_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn prefers_source_native_id() {
        let r = obj(json!({"id": "news_12345", "url": "https://x", "title": "t", "source": "reuters"}));
        let fp = Fingerprint::compute(&r);
        assert_eq!(fp.value, "news_12345");
        assert_eq!(fp.origin, FingerprintOrigin::SourceId);
    }

    #[test]
    fn falls_back_to_post_id() {
        let r = obj(json!({"post_id": "p1", "source": "reddit"}));
        let fp = Fingerprint::compute(&r);
        assert_eq!(fp.value, "p1");
        assert_eq!(fp.origin, FingerprintOrigin::SourceId);
    }

    #[test]
    fn falls_back_to_url() {
        let r = obj(json!({"url": "https://example.com/a", "source": "rss"}));
        let fp = Fingerprint::compute(&r);
        assert_eq!(fp.value, "https://example.com/a");
        assert_eq!(fp.origin, FingerprintOrigin::Url);
    }

    #[test]
    fn falls_back_to_md5_of_title_and_source() {
        let r = obj(json!({"title": "Hello", "source": "reuters"}));
        let fp = Fingerprint::compute(&r);
        let expected = format!("{:x}", md5::compute(b"Hello_reuters"));
        assert_eq!(fp.value, expected);
        assert_eq!(fp.origin, FingerprintOrigin::Hash);
    }

    #[test]
    fn comments_on_a_post_get_distinct_fingerprints() {
        // S2: a post and its comments must not collapse to one fingerprint.
        let post = obj(json!({"id": "news_12345", "source": "reuters"}));
        let c1 = obj(json!({"post_id": "news_12345", "comment_id": "c1", "source": "reddit"}));
        let c2 = obj(json!({"post_id": "news_12345", "comment_id": "c2", "source": "reddit"}));
        assert_eq!(Fingerprint::compute(&post).value, "news_12345");
        assert_eq!(Fingerprint::compute(&c1).value, "c1");
        assert_eq!(Fingerprint::compute(&c2).value, "c2");
    }
}
