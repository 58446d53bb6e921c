//! `pulse-serve`: the read-only HTTP/WebSocket API exposing the analytics
//! snapshot to dashboards (spec §4.5). Unlike the other three binaries it
//! has no pass loop — it's a plain request/response server over `KvStore`,
//! with Axum bootstrapped the way `ferrex-server/src/main.rs` does (build
//! runtime, init tracing, load config, construct state, serve until a
//! signal).

mod routes;
mod sections;
mod state;
mod ws;

use clap::Parser;
use pulse_core::store::{KvStore, RedisStore};
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pulse-serve", about = "Read-only HTTP/WebSocket API over the analytics snapshot")]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = pulse_core::config::load(args.config.as_deref())?;

    let addr = args
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.serve.host, config.serve.port).parse().expect("valid bind address"));

    info!(redis_url = %config.redis_url, %addr, "pulse-serve starting");

    let store: Arc<dyn KvStore> = Arc::new(RedisStore::connect(&config.redis_url).await?);
    let state = AppState::new(store, &config);

    let app = routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("pulse-serve listening on {addr}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("pulse-serve shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
