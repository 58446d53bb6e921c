//! `pulse-clean`: validates, deduplicates, and normalizes `raw_queue` into
//! `clean_queue`, triggered by `scrape_done` notifications or a poll timer.
//!
//! Grounded in `cleaner.py::EventDrivenCleaner`'s `run_event_driven` /
//! `run_continuous` dispatch and the startup/shutdown bootstrap shape of
//! `ferrex-server`'s `main.rs`.

mod pass;

use clap::{Parser, ValueEnum};
use pulse_core::fabric::{Fabric, Notification, RedisFabric, WaitOutcome};
use pulse_core::shutdown::ShutdownFlag;
use pulse_core::store::{KvStore, RedisStore};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    EventDriven,
    Continuous,
    Once,
}

#[derive(Parser, Debug)]
#[command(name = "pulse-clean", about = "Cleans raw_queue into clean_queue")]
struct Args {
    #[arg(long, value_enum, default_value = "event-driven")]
    mode: Mode,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = pulse_core::config::load(args.config.as_deref())?;

    info!(mode = ?args.mode, redis_url = %config.redis_url, "pulse-clean starting");

    let store = RedisStore::connect(&config.redis_url).await?;
    let shutdown = ShutdownFlag::new();
    install_signal_handler(shutdown.clone());

    match args.mode {
        Mode::Once => {
            run_and_log_pass(&store, &config).await?;
        }
        Mode::Continuous => {
            while !shutdown.is_tripped() {
                run_and_log_pass(&store, &config).await?;
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(config.poll_interval_secs)) => {}
                    _ = shutdown.wait() => {}
                }
            }
        }
        Mode::EventDriven => {
            let fabric = RedisFabric::new(&config.redis_url)?;
            let mut subscription = fabric.subscribe(&config.channels.scrape_done).await?;
            while !shutdown.is_tripped() {
                let outcome = tokio::select! {
                    outcome = subscription.wait_or_poll(Duration::from_secs(1)) => outcome.unwrap_or_else(|e| {
                        warn!("notification wait failed, treating as timeout: {e}");
                        WaitOutcome::TimedOut
                    }),
                    _ = shutdown.wait() => WaitOutcome::TimedOut,
                };
                if shutdown.is_tripped() {
                    break;
                }
                match outcome {
                    WaitOutcome::Notified(_) => {
                        run_and_log_pass(&store, &config).await?;
                    }
                    WaitOutcome::TimedOut => continue,
                }
            }
        }
    }

    info!("pulse-clean shutting down");
    Ok(())
}

async fn run_and_log_pass(store: &RedisStore, config: &pulse_core::config::PulseConfig) -> anyhow::Result<()> {
    let cache_status = pulse_core::dedup::IdCache::open(
        store,
        &config.channels.dedup_key,
        Duration::from_secs(config.retention.dedup_window_secs),
    )
    .await?
    .status(chrono::Utc::now().timestamp() as f64)
    .await?;
    info!(
        total = cache_status.total_entries,
        valid = cache_status.valid_entries(),
        expired = cache_status.expired_entries,
        "id cache status before pass"
    );

    let stats = pass::run_once(
        store,
        &config.channels,
        &config.retention,
        config.clean_batch_size,
    )
    .await?;

    info!(
        processed = stats.processed,
        cleaned = stats.cleaned,
        duplicate = stats.duplicate,
        invalid = stats.invalid,
        clean_queue_len = stats.clean_queue_len,
        "clean pass complete"
    );

    let fabric = RedisFabric::new(&config.redis_url)?;
    let notification = Notification::new("clean_done")
        .with_stat("processed", stats.processed)
        .with_stat("cleaned", stats.cleaned)
        .with_stat("duplicate", stats.duplicate)
        .with_stat("invalid", stats.invalid)
        .with_stat("queue_length", stats.clean_queue_len);
    if let Err(e) = fabric.publish(&config.channels.clean_done, notification).await {
        warn!("failed to publish clean_done: {e}");
    }

    Ok(())
}

fn install_signal_handler(flag: ShutdownFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.trip();
        }
    });
}
