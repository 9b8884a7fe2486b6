#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access
    )
)]

//! Ticker Engine - Market Data Normalization + Valuation Cache
//!
//! Maintains a single WebSocket connection to the exchange ticker feed,
//! normalizes heterogeneous tick payloads into canonical records, caches
//! the latest tick per market, and serves live per-holding valuations to
//! in-process consumers.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and arithmetic
//!   - `market`: Canonical market keys and fuzzy candidates
//!   - `ticker`: Canonical tick records and change-sign conventions
//!   - `valuation`: Per-holding valuation with source precedence
//!
//! - **Application**: Pipeline wiring and the consumer-facing service
//!   - `services`: Feed pipeline, ticker service, portfolio summaries
//!
//! - **Infrastructure**: External integrations
//!   - `upbit`: WebSocket client, payload codec, keep-alive, backoff
//!   - `cache`: Last-tick store with per-market write sequences
//!   - `broadcast`: Per-market fan-out to subscribers
//!   - `config`: Environment-driven settings
//!   - `health`: Health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//! Exchange WS ──► Codec ──► Cache ──┬──► TickerService reads
//!                                   └──► Per-market fan-out ──► Consumers
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core ticker and valuation types.
pub mod domain;

/// Application layer - Pipeline wiring and the consumer-facing service.
pub mod application;

/// Infrastructure layer - External integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::market::{MarketInfo, MarketKey};
pub use domain::ticker::{CanonicalTick, ChangeDirection};
pub use domain::valuation::{HeldPosition, Valuation, compute as compute_valuation};

// Application services
pub use application::services::{
    ConnectionState, FeedStatus, PortfolioSummary, PositionValuation, TickerService,
    run_feed_pipeline,
};

// Infrastructure config
pub use infrastructure::config::{
    EngineConfig, FeedSettings, HubSettings, ServerSettings, WebSocketSettings,
};

// Feed client
pub use infrastructure::upbit::{FeedConfig, FeedError, FeedEvent, TickerClient, TickerCodec};

// Cache and fan-out (for integration tests)
pub use infrastructure::broadcast::{HubConfig, TickerHub, TickerUpdate};
pub use infrastructure::cache::{CacheEntry, TickerCache};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
