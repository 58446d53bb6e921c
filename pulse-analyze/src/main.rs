//! `pulse-analyze`: produces one `AnalyticsSnapshot` from `clean_queue` on
//! each `clean_done` notification or a poll timer.
//!
//! Grounded in `processer/Analysis/main.py`'s `run_analysis` dispatch and
//! the startup/shutdown bootstrap shape of `ferrex-server`'s `main.rs`, same
//! as `pulse-clean`'s binary.

mod history;
mod keywords;
mod newsfeed;
mod pass;
mod sentiment;
mod snapshot;
mod tokenize;
mod windows;
mod wordcloud;

use clap::{Parser, ValueEnum};
use pulse_core::fabric::{Fabric, Notification, RedisFabric, WaitOutcome};
use pulse_core::shutdown::ShutdownFlag;
use pulse_core::store::{KvStore, RedisStore};
use sentiment::HeuristicOracle;
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
#[command(name = "pulse-analyze", about = "Produces an analytics snapshot from clean_queue")]
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

    info!(mode = ?args.mode, redis_url = %config.redis_url, "pulse-analyze starting");

    let store = RedisStore::connect(&config.redis_url).await?;
    let shutdown = ShutdownFlag::new();
    install_signal_handler(shutdown.clone());

    // The real oracle is the same heuristic lexicon used as the failure
    // fallback until an external classifier is wired in (spec §9's
    // dependency-injection design note; spec §7's oracle-failure path).
    let oracle = HeuristicOracle;
    let fallback = HeuristicOracle;

    match args.mode {
        Mode::Once => {
            run_and_log_pass(&store, &config, &oracle, &fallback).await?;
        }
        Mode::Continuous => {
            while !shutdown.is_tripped() {
                run_and_log_pass(&store, &config, &oracle, &fallback).await?;
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(config.poll_interval_secs)) => {}
                    _ = shutdown.wait() => {}
                }
            }
        }
        Mode::EventDriven => {
            let fabric = RedisFabric::new(&config.redis_url)?;
            let mut subscription = fabric.subscribe(&config.channels.clean_done).await?;
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
                        run_and_log_pass(&store, &config, &oracle, &fallback).await?;
                    }
                    WaitOutcome::TimedOut => continue,
                }
            }
        }
    }

    info!("pulse-analyze shutting down");
    Ok(())
}

async fn run_and_log_pass(
    store: &RedisStore,
    config: &pulse_core::config::PulseConfig,
    oracle: &HeuristicOracle,
    fallback: &HeuristicOracle,
) -> anyhow::Result<()> {
    let stats = pass::run_once(store, &config.channels, &config.analytics, oracle, fallback).await?;

    info!(
        records_read = stats.records_read,
        sentiment_filled = stats.sentiment_filled,
        keywords_count = stats.keywords_count,
        history_count = stats.history_count,
        "analytics pass complete"
    );

    if stats.records_read == 0 {
        return Ok(());
    }

    let fabric = RedisFabric::new(&config.redis_url)?;
    let notification = Notification::new("analytics_done")
        .with_stat("keywords_count", stats.keywords_count)
        .with_stat("history_count", stats.history_count);
    if let Err(e) = fabric.publish(&config.channels.analytics_done, notification).await {
        warn!("failed to publish analytics_done: {e}");
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
