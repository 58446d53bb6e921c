//! Layered configuration loading: built-in defaults, then an optional TOML
//! file, then environment variables, the same precedence
//! `ferrex-server/src/infra/config/loader.rs`'s `ConfigLoader` applies,
//! built on the `config` crate's builder instead of the teacher's hand-rolled
//! merge (the crate already speaks the "defaults, then file, then env"
//! layering natively).
//!
//! CLI flags are the final layer; each binary's `clap::Parser` struct
//! overlays its own flags onto the loaded [`PulseConfig`] after this module
//! hands it back (spec §6.4).

use crate::error::{PulseError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_raw_queue() -> String {
    "raw_data_queue".to_string()
}

fn default_clean_queue() -> String {
    "clean_data_queue".to_string()
}

fn default_dedup_key() -> String {
    "seen_ids".to_string()
}

fn default_scrape_channel() -> String {
    "scrape_done".to_string()
}

fn default_clean_channel() -> String {
    "clean_done".to_string()
}

fn default_analytics_channel() -> String {
    "analytics_done".to_string()
}

fn default_snapshot_prefix() -> String {
    "processed_data".to_string()
}

fn default_snapshot_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_queue_length() -> u64 {
    crate::retention::DEFAULT_MAX_LENGTH
}

fn default_max_age_secs() -> u64 {
    24 * 60 * 60
}

fn default_dedup_window_secs() -> u64 {
    crate::domain::DEFAULT_WINDOW.as_secs()
}

fn default_history_mean_divisor() -> f64 {
    48.0
}

fn default_batch_size() -> usize {
    100
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_current_window_minutes() -> i64 {
    60
}

fn default_history_hours() -> i64 {
    24
}

fn default_trending_keywords_count() -> usize {
    10
}

fn default_word_cloud_count() -> usize {
    20
}

fn default_news_feed_limit() -> usize {
    20
}

fn default_true() -> bool {
    true
}

fn default_dedup_mode() -> String {
    "time_window".to_string()
}

/// Queue, key, and channel names, centralized so none of the four binaries
/// hardcode a name a deployment might need to change (Open Question
/// resolution in `SPEC_FULL.md` §4: names are config-driven, defaults only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelNames {
    #[serde(default = "default_raw_queue")]
    pub raw_queue: String,
    #[serde(default = "default_clean_queue")]
    pub clean_queue: String,
    #[serde(default = "default_dedup_key")]
    pub dedup_key: String,
    #[serde(default = "default_scrape_channel")]
    pub scrape_done: String,
    #[serde(default = "default_clean_channel")]
    pub clean_done: String,
    #[serde(default = "default_analytics_channel")]
    pub analytics_done: String,
    /// Prefix under which each analytics section is stored as its own
    /// JSON-string key (spec §6.1: `processed_data:metadata`,
    /// `processed_data:trending_keywords`, etc).
    #[serde(default = "default_snapshot_prefix")]
    pub snapshot_prefix: String,
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self {
            raw_queue: default_raw_queue(),
            clean_queue: default_clean_queue(),
            dedup_key: default_dedup_key(),
            scrape_done: default_scrape_channel(),
            clean_done: default_clean_channel(),
            analytics_done: default_analytics_channel(),
            snapshot_prefix: default_snapshot_prefix(),
        }
    }
}

impl ChannelNames {
    pub fn metadata_key(&self) -> String {
        format!("{}:metadata", self.snapshot_prefix)
    }

    pub fn trending_keywords_key(&self) -> String {
        format!("{}:trending_keywords", self.snapshot_prefix)
    }

    pub fn word_cloud_key(&self) -> String {
        format!("{}:word_cloud", self.snapshot_prefix)
    }

    pub fn news_feed_key(&self) -> String {
        format!("{}:news_feed", self.snapshot_prefix)
    }

    pub fn history_key(&self, keyword: &str) -> String {
        format!("{}:history_data:{}", self.snapshot_prefix, keyword)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionSettings {
    #[serde(default = "default_max_queue_length")]
    pub max_queue_length: u64,
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            max_queue_length: default_max_queue_length(),
            max_age_secs: default_max_age_secs(),
            dedup_window_secs: default_dedup_window_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSettings {
    #[serde(default = "default_history_mean_divisor")]
    pub history_mean_divisor: f64,
    #[serde(default = "default_batch_size")]
    pub sentiment_batch_size: usize,
    #[serde(default = "default_snapshot_ttl_secs")]
    pub snapshot_ttl_secs: u64,
    #[serde(default = "default_current_window_minutes")]
    pub current_window_minutes: i64,
    /// Fixed at 24 one-hour slots regardless of this value (spec §4.3.2);
    /// kept as a config knob only because spec §6.5 names it.
    #[serde(default = "default_history_hours")]
    pub history_hours: i64,
    #[serde(default = "default_trending_keywords_count")]
    pub trending_keywords_count: usize,
    #[serde(default = "default_word_cloud_count")]
    pub word_cloud_count: usize,
    #[serde(default = "default_news_feed_limit")]
    pub news_feed_limit: usize,
    #[serde(default = "default_true")]
    pub sentiment_enabled: bool,
    #[serde(default = "default_true")]
    pub sentiment_defer_write_back: bool,
    #[serde(default = "default_true")]
    pub sentiment_fallback_to_heuristic: bool,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            history_mean_divisor: default_history_mean_divisor(),
            sentiment_batch_size: default_batch_size(),
            snapshot_ttl_secs: default_snapshot_ttl_secs(),
            current_window_minutes: default_current_window_minutes(),
            history_hours: default_history_hours(),
            trending_keywords_count: default_trending_keywords_count(),
            word_cloud_count: default_word_cloud_count(),
            news_feed_limit: default_news_feed_limit(),
            sentiment_enabled: default_true(),
            sentiment_defer_write_back: default_true(),
            sentiment_fallback_to_heuristic: default_true(),
        }
    }
}

/// Deduplication policy knobs (spec §6.5 `deduplication.*`). `mode` is
/// advisory only: [`crate::dedup::IdCache::open`] detects the live mode from
/// the key's actual structure and only falls back to this value when the key
/// doesn't exist yet, per spec §4.2's "`none` is treated as time-window by
/// default" rule — so `mode` here only matters the very first time a fresh
/// deployment touches the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupSettings {
    #[serde(default = "default_dedup_mode")]
    pub mode: String,
    #[serde(default)]
    pub clear_on_start: bool,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            mode: default_dedup_mode(),
            clear_on_start: false,
        }
    }
}

fn default_serve_host() -> String {
    "0.0.0.0".to_string()
}

fn default_serve_port() -> u16 {
    8080
}

fn default_ws_push_interval_secs() -> u64 {
    5
}

/// Read-API bind address and push cadence (spec §4.5, §6.5). `pulse-serve`
/// is the only binary that reads this section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeSettings {
    #[serde(default = "default_serve_host")]
    pub host: String,
    #[serde(default = "default_serve_port")]
    pub port: u16,
    /// How often an open WebSocket subscription re-pushes its subscribed
    /// sections, absent a faster external trigger (no push-on-write hook
    /// exists since Serve never writes and Analyze runs in a separate
    /// process; spec §4.5 only requires a live stream, not a push latency).
    #[serde(default = "default_ws_push_interval_secs")]
    pub ws_push_interval_secs: u64,
}

impl Default for ServeSettings {
    fn default() -> Self {
        Self {
            host: default_serve_host(),
            port: default_serve_port(),
            ws_push_interval_secs: default_ws_push_interval_secs(),
        }
    }
}

/// The config surface shared by all four binaries; each binary only reads
/// the sub-sections it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default)]
    pub channels: ChannelNames,
    #[serde(default)]
    pub retention: RetentionSettings,
    #[serde(default)]
    pub analytics: AnalyticsSettings,
    #[serde(default)]
    pub dedup: DedupSettings,
    #[serde(default)]
    pub serve: ServeSettings,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_batch_size")]
    pub clean_batch_size: usize,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            channels: ChannelNames::default(),
            retention: RetentionSettings::default(),
            analytics: AnalyticsSettings::default(),
            dedup: DedupSettings::default(),
            serve: ServeSettings::default(),
            poll_interval_secs: default_poll_interval_secs(),
            clean_batch_size: default_batch_size(),
        }
    }
}

/// Loads defaults, layers an optional TOML file (path defaults to
/// `pulse.toml` in the working directory if `path` is `None` and the file
/// exists), then environment variables prefixed `PULSE__` with `__` as the
/// nesting separator (e.g. `PULSE__CHANNELS__RAW_QUEUE`).
pub fn load(path: Option<&Path>) -> Result<PulseConfig> {
    let _ = dotenvy::dotenv();

    let defaults = PulseConfig::default();
    let mut builder = config::Config::builder()
        .set_default("redis_url", defaults.redis_url.clone())
        .map_err(cfg_err)?
        .set_default("poll_interval_secs", defaults.poll_interval_secs)
        .map_err(cfg_err)?
        .set_default("channels.raw_queue", defaults.channels.raw_queue.clone())
        .map_err(cfg_err)?
        .set_default("channels.clean_queue", defaults.channels.clean_queue.clone())
        .map_err(cfg_err)?
        .set_default("channels.dedup_key", defaults.channels.dedup_key.clone())
        .map_err(cfg_err)?
        .set_default("channels.scrape_done", defaults.channels.scrape_done.clone())
        .map_err(cfg_err)?
        .set_default("channels.clean_done", defaults.channels.clean_done.clone())
        .map_err(cfg_err)?
        .set_default(
            "channels.analytics_done",
            defaults.channels.analytics_done.clone(),
        )
        .map_err(cfg_err)?
        .set_default("channels.snapshot_prefix", defaults.channels.snapshot_prefix.clone())
        .map_err(cfg_err)?
        .set_default("retention.max_queue_length", defaults.retention.max_queue_length)
        .map_err(cfg_err)?
        .set_default("retention.max_age_secs", defaults.retention.max_age_secs)
        .map_err(cfg_err)?
        .set_default(
            "retention.dedup_window_secs",
            defaults.retention.dedup_window_secs,
        )
        .map_err(cfg_err)?
        .set_default(
            "analytics.history_mean_divisor",
            defaults.analytics.history_mean_divisor,
        )
        .map_err(cfg_err)?
        .set_default(
            "analytics.sentiment_batch_size",
            defaults.analytics.sentiment_batch_size as i64,
        )
        .map_err(cfg_err)?
        .set_default("analytics.snapshot_ttl_secs", defaults.analytics.snapshot_ttl_secs)
        .map_err(cfg_err)?
        .set_default(
            "analytics.current_window_minutes",
            defaults.analytics.current_window_minutes,
        )
        .map_err(cfg_err)?
        .set_default("analytics.history_hours", defaults.analytics.history_hours)
        .map_err(cfg_err)?
        .set_default(
            "analytics.trending_keywords_count",
            defaults.analytics.trending_keywords_count as i64,
        )
        .map_err(cfg_err)?
        .set_default(
            "analytics.word_cloud_count",
            defaults.analytics.word_cloud_count as i64,
        )
        .map_err(cfg_err)?
        .set_default(
            "analytics.news_feed_limit",
            defaults.analytics.news_feed_limit as i64,
        )
        .map_err(cfg_err)?
        .set_default("analytics.sentiment_enabled", defaults.analytics.sentiment_enabled)
        .map_err(cfg_err)?
        .set_default(
            "analytics.sentiment_defer_write_back",
            defaults.analytics.sentiment_defer_write_back,
        )
        .map_err(cfg_err)?
        .set_default(
            "analytics.sentiment_fallback_to_heuristic",
            defaults.analytics.sentiment_fallback_to_heuristic,
        )
        .map_err(cfg_err)?
        .set_default("dedup.mode", defaults.dedup.mode.clone())
        .map_err(cfg_err)?
        .set_default("dedup.clear_on_start", defaults.dedup.clear_on_start)
        .map_err(cfg_err)?
        .set_default("serve.host", defaults.serve.host.clone())
        .map_err(cfg_err)?
        .set_default("serve.port", defaults.serve.port as i64)
        .map_err(cfg_err)?
        .set_default(
            "serve.ws_push_interval_secs",
            defaults.serve.ws_push_interval_secs,
        )
        .map_err(cfg_err)?
        .set_default("clean_batch_size", defaults.clean_batch_size as i64)
        .map_err(cfg_err)?;

    let file_path = path.map(Path::to_path_buf).unwrap_or_else(|| Path::new("pulse.toml").to_path_buf());
    builder = builder.add_source(config::File::from(file_path).required(false));
    builder = builder.add_source(
        config::Environment::with_prefix("PULSE")
            .separator("__")
            .try_parsing(true),
    );

    builder
        .build()
        .map_err(cfg_err)?
        .try_deserialize()
        .map_err(cfg_err)
}

fn cfg_err(e: config::ConfigError) -> PulseError {
    PulseError::Config(e.to_string())
}
