//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, feed status reporting, and Prometheus
//! metrics. Used by container orchestrators and monitoring systems.
//!
//! # Endpoints
//!
//! - `GET /health` - JSON health status
//! - `GET /healthz` - liveness probe (simple OK)
//! - `GET /readyz` - readiness probe (feed connected or cache populated)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::FeedStatus;
use crate::infrastructure::cache::TickerCache;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Engine version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Feed connection status.
    pub feed: FeedInfo,
    /// Cache statistics.
    pub cache: CacheInfo,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Feed connected.
    Healthy,
    /// Feed down but cached prices are still being served.
    Degraded,
    /// Feed down with nothing cached.
    Unhealthy,
}

/// Feed connection status.
#[derive(Debug, Clone, Serialize)]
pub struct FeedInfo {
    /// Connection state name.
    pub state: String,
    /// Whether the feed is connected.
    pub connected: bool,
    /// Ticks received since startup.
    pub ticks_received: u64,
    /// Reconnect attempts since the last successful connect.
    pub reconnect_attempts: u32,
    /// Time of the most recent tick.
    pub last_tick_at: Option<DateTime<Utc>>,
}

/// Cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    /// Markets with a cached tick.
    pub markets: usize,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    feed_status: Arc<FeedStatus>,
    cache: Arc<TickerCache>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(version: String, feed_status: Arc<FeedStatus>, cache: Arc<TickerCache>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            feed_status,
            cache,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("health server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    // A stale cache is still servable; only an empty cache with no feed
    // makes the engine useless to consumers.
    let is_ready = state.feed_status.is_connected() || !state.cache.is_empty();

    if is_ready {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let connection_state = state.feed_status.state();
    let connected = state.feed_status.is_connected();
    let cached_markets = state.cache.len();

    let status = determine_health_status(connected, cached_markets);

    HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        feed: FeedInfo {
            state: connection_state.as_str().to_string(),
            connected,
            ticks_received: state.feed_status.ticks_received(),
            reconnect_attempts: state.feed_status.reconnect_attempts(),
            last_tick_at: state.feed_status.last_tick_at(),
        },
        cache: CacheInfo {
            markets: cached_markets,
        },
    }
}

const fn determine_health_status(connected: bool, cached_markets: usize) -> HealthStatus {
    if connected {
        HealthStatus::Healthy
    } else if cached_markets > 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
