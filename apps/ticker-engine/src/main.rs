//! Ticker Engine Binary
//!
//! Starts the feed pipeline and health server.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin ticker-engine
//! ```
//!
//! # Environment Variables
//!
//! All optional:
//! - `TICKER_FEED_URL`: ticker stream URL (default: wss://api.upbit.com/websocket/v1)
//! - `TICKER_DOMESTIC_QUOTE`: domestic quote currency (default: KRW)
//! - `TICKER_MARKETS`: comma-separated startup markets (default: KRW-BTC,KRW-ETH,KRW-XRP)
//! - `TICKER_HEALTH_PORT`: health check HTTP port (default: 8082)
//! - `TICKER_CHANNEL_CAPACITY`: per-market fan-out capacity (default: 1024)
//! - `TICKER_HEARTBEAT_INTERVAL_SECS` / `TICKER_HEARTBEAT_TIMEOUT_SECS`
//! - `TICKER_RECONNECT_DELAY_INITIAL_MS` / `TICKER_RECONNECT_DELAY_MAX_SECS` /
//!   `TICKER_RECONNECT_DELAY_MULTIPLIER` / `TICKER_RECONNECT_JITTER`
//! - `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_SERVICE_NAME`
//! - `RUST_LOG`: log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use ticker_engine::infrastructure::telemetry;
use ticker_engine::infrastructure::upbit::heartbeat::KeepAliveConfig;
use ticker_engine::infrastructure::upbit::reconnect::BackoffConfig;
use ticker_engine::{
    EngineConfig, FeedConfig, FeedEvent, FeedStatus, HealthServer, HealthServerState, HubConfig,
    TickerCache, TickerClient, TickerHub, init_metrics, run_feed_pipeline,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
#[allow(clippy::expect_used)]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("starting ticker engine");

    let _metrics_handle = init_metrics();

    let config = EngineConfig::from_env();
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let cache = Arc::new(TickerCache::new());
    let hub = Arc::new(TickerHub::new(HubConfig {
        channel_capacity: config.hub.channel_capacity,
    }));
    let feed_status = Arc::new(FeedStatus::new());

    // Health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&feed_status),
        Arc::clone(&cache),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );

    // Feed client
    let feed_config = FeedConfig {
        url: config.feed.url.clone(),
        domestic_quote: config.feed.domestic_quote.clone(),
        backoff: BackoffConfig {
            initial: config.websocket.reconnect_delay_initial,
            cap: config.websocket.reconnect_delay_max,
            multiplier: config.websocket.reconnect_delay_multiplier,
            jitter: config.websocket.reconnect_jitter,
        },
        keep_alive: KeepAliveConfig {
            ping_interval: config.websocket.heartbeat_interval,
            pong_grace: config.websocket.heartbeat_timeout,
        },
    };

    let (event_tx, event_rx) = mpsc::channel::<FeedEvent>(1024);
    let client = Arc::new(TickerClient::new(
        feed_config,
        event_tx,
        shutdown_token.clone(),
    ));
    client.subscribe(&config.feed.markets);

    // Feed pipeline
    let pipeline_cache = Arc::clone(&cache);
    let pipeline_hub = Arc::clone(&hub);
    let pipeline_status = Arc::clone(&feed_status);
    let pipeline_cancel = shutdown_token.clone();
    tokio::spawn(async move {
        run_feed_pipeline(
            event_rx,
            pipeline_cache,
            pipeline_hub,
            pipeline_status,
            pipeline_cancel,
        )
        .await;
    });

    // Feed client connection loop
    let client_handle = Arc::clone(&client);
    tokio::spawn(async move {
        if let Err(e) = client_handle.run().await {
            tracing::error!(error = %e, "feed client error");
        }
    });

    // Health server
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "health server error");
        }
    });

    tracing::info!("ticker engine ready");

    await_shutdown(shutdown_token).await;

    tracing::info!("ticker engine stopped");
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &EngineConfig) {
    tracing::info!(
        feed_url = %config.feed.url,
        domestic_quote = %config.feed.domestic_quote,
        markets = config.feed.markets.len(),
        health_port = config.server.health_port,
        channel_capacity = config.hub.channel_capacity,
        "configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "graceful shutdown started"
    );
}
