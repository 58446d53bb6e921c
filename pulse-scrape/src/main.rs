//! `pulse-scrape`: drains injected source adapters into `raw_queue`, trims
//! it, and publishes `scrape_done`.
//!
//! Grounded in `control_center.py`'s single-process run loop and the
//! startup/shutdown bootstrap shape of `ferrex-server`'s `main.rs`. Unlike
//! Clean/Analyze (spec §6.4: `--mode`), Scrape's CLI is `--loop` +
//! `--interval` only — there is no event-driven mode because nothing
//! upstream of Scrape publishes a completion notification.

mod adapter;
mod pass;

use adapter::SourceAdapter;
use clap::Parser;
use pulse_core::fabric::{Fabric, Notification, RedisFabric};
use pulse_core::shutdown::ShutdownFlag;
use pulse_core::store::{KvStore, RedisStore};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "pulse-scrape", about = "Ingests source records into raw_queue")]
struct Args {
    /// Run continuously, sleeping `--interval` seconds between passes.
    /// Without this flag, runs a single pass and exits.
    #[arg(long)]
    r#loop: bool,

    #[arg(long, default_value_t = 60)]
    interval: u64,

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

    info!(
        looping = args.r#loop,
        interval = args.interval,
        redis_url = %config.redis_url,
        "pulse-scrape starting"
    );

    let store = RedisStore::connect(&config.redis_url).await?;
    let shutdown = ShutdownFlag::new();
    install_signal_handler(shutdown.clone());

    // No source adapters are wired in this repo (spec §1 Out-of-scope: the
    // raw crawlers themselves); a deployment injects concrete `SourceAdapter`
    // implementations here.
    let adapters: Vec<Box<dyn SourceAdapter>> = Vec::new();
    if adapters.is_empty() {
        warn!("no source adapters configured; passes will append nothing");
    }

    if args.r#loop {
        while !shutdown.is_tripped() {
            run_and_log_pass(&store, &config, &adapters).await?;
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(args.interval)) => {}
                _ = shutdown.wait() => {}
            }
        }
    } else {
        run_and_log_pass(&store, &config, &adapters).await?;
    }

    info!("pulse-scrape shutting down");
    Ok(())
}

async fn run_and_log_pass(
    store: &RedisStore,
    config: &pulse_core::config::PulseConfig,
    adapters: &[Box<dyn SourceAdapter>],
) -> anyhow::Result<()> {
    let stats = pass::run_once(store, &config.channels, &config.retention, adapters).await?;

    info!(
        total_appended = stats.total_appended,
        raw_queue_len = stats.raw_queue_len,
        sources = stats.per_source.len(),
        "scrape pass complete"
    );

    let fabric = RedisFabric::new(&config.redis_url)?;
    let mut notification = Notification::new("scrape_done")
        .with_stat("total_appended", stats.total_appended)
        .with_stat("queue_length", stats.raw_queue_len);
    for (source, source_stats) in &stats.per_source {
        notification = notification.with_stat(format!("{source}_appended"), source_stats.appended);
    }
    if let Err(e) = fabric.publish(&config.channels.scrape_done, notification).await {
        warn!("failed to publish scrape_done: {e}");
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
