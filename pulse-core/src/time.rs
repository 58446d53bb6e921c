//! Timestamp normalization.
//!
//! Mirrors `single_pass_cleaner.py::_parse_time_field`: a record's publish
//! instant can arrive as a Unix timestamp (int or float, seconds), a numeric
//! string, an ISO-8601 string (with or without a trailing `Z`), or one of a
//! handful of common human-readable formats. All of them normalize to
//! `YYYY-MM-DDTHH:MM:SSZ`.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

const FALLBACK_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d",
];

/// Renders an instant as `YYYY-MM-DDTHH:MM:SSZ`, truncating to second
/// precision regardless of the input's resolution.
pub fn to_iso_seconds(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Parses one of the accepted time field shapes in a JSON record, returning
/// the normalized ISO string, or `None` if nothing recognizable was found.
pub fn parse_time_value(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_f64().and_then(unix_seconds_to_iso),
        Value::String(s) => parse_time_str(s),
        _ => None,
    }
}

fn parse_time_str(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    // Purely numeric string: treat as a Unix timestamp.
    if is_numeric_string(s) {
        if let Ok(f) = s.parse::<f64>() {
            if let Some(iso) = unix_seconds_to_iso(f) {
                return Some(iso);
            }
        }
    }

    // ISO-8601, accepting a trailing `Z` in place of an explicit offset.
    let normalized = s.replace('Z', "+00:00");
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(to_iso_seconds(dt.with_timezone(&Utc)));
    }

    for fmt in FALLBACK_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(to_iso_seconds(Utc.from_utc_datetime(&naive)));
        }
        if *fmt == "%Y-%m-%d" {
            if let Ok(date) = chrono::NaiveDate::parse_from_str(s, fmt) {
                let naive = date.and_hms_opt(0, 0, 0)?;
                return Some(to_iso_seconds(Utc.from_utc_datetime(&naive)));
            }
        }
    }

    None
}

fn is_numeric_string(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn unix_seconds_to_iso(seconds: f64) -> Option<String> {
    let whole = seconds.trunc() as i64;
    let nanos = ((seconds.fract()) * 1_000_000_000.0).round() as u32;
    Utc.timestamp_opt(whole, nanos)
        .single()
        .map(to_iso_seconds)
}

/// Finds the first field (in precedence order) carrying a value that parses
/// as a timestamp, normalizing it. Order matches the cleaner's field
/// precedence: `created_at`, `created_utc`, `published`, `published_at`,
/// `timestamp`, `time`, `datetime`, `date`.
pub fn extract_created_at(record: &serde_json::Map<String, Value>) -> Option<String> {
    const FIELDS: &[&str] = &[
        "created_at",
        "created_utc",
        "published",
        "published_at",
        "timestamp",
        "time",
        "datetime",
        "date",
    ];
    for field in FIELDS {
        if let Some(value) = record.get(*field) {
            if let Some(iso) = parse_time_value(value) {
                return Some(iso);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_unix_seconds_int() {
        let v = json!(1_704_067_200i64); // 2024-01-01T00:00:00Z
        assert_eq!(
            parse_time_value(&v).unwrap(),
            "2024-01-01T00:00:00Z".to_string()
        );
    }

    #[test]
    fn parses_unix_seconds_numeric_string() {
        let v = json!("1704067200");
        assert_eq!(parse_time_value(&v).unwrap(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn parses_iso_with_trailing_z() {
        let v = json!("2024-03-05T10:30:00Z");
        assert_eq!(parse_time_value(&v).unwrap(), "2024-03-05T10:30:00Z");
    }

    #[test]
    fn parses_common_space_separated_format() {
        let v = json!("2024-03-05 10:30:00");
        assert_eq!(parse_time_value(&v).unwrap(), "2024-03-05T10:30:00Z");
    }

    #[test]
    fn parses_date_only() {
        let v = json!("2024-03-05");
        assert_eq!(parse_time_value(&v).unwrap(), "2024-03-05T00:00:00Z");
    }

    #[test]
    fn rejects_garbage() {
        let v = json!("not a time");
        assert!(parse_time_value(&v).is_none());
    }

    #[test]
    fn round_trip_is_stable() {
        // R2: re-parsing and re-emitting an emitted timestamp is a no-op.
        let v = json!("2024-03-05T10:30:00Z");
        let once = parse_time_value(&v).unwrap();
        let twice = parse_time_value(&json!(once.clone())).unwrap();
        assert_eq!(once, twice);
    }
}
