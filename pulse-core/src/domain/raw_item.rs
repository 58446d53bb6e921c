//! The scraper's unit of work: whatever JSON a source adapter produced.
//!
//! Spec §3 deliberately leaves `RawItem` unvalidated at ingress — the
//! cleaner is the validation point — so this is a thin wrapper around a JSON
//! object rather than a strict struct. Source adapters themselves are out of
//! scope (spec §1); this type is what they would hand to `pulse-scrape`.

use serde_json::{Map, Value};

/// A raw crawler contribution, pre-validation. The source itself is
/// identified by `SourceAdapter::name()`'s free-form string (spec §3 lists
/// seven source kinds as examples, not a closed set a crawler must pick
/// from), so there's no separate source-tag enum here.
#[derive(Debug, Clone)]
pub struct RawItem(pub Map<String, Value>);

impl RawItem {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Value::Object(self.0.clone()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => {
                // Keep the error shape consistent with a normal parse failure
                // rather than panicking on an unexpected top-level JSON type.
                let _ = other;
                Err(serde_json::from_str::<Map<String, Value>>("null").unwrap_err())
            }
        }
    }
}
