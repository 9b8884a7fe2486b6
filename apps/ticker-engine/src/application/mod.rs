//! Application Layer - Pipeline wiring and the consumer-facing service.

/// Feed pipeline, ticker service, and portfolio valuation helpers.
pub mod services;

pub use services::{
    ConnectionState, FeedStatus, PortfolioSummary, PositionValuation, TickerService,
    run_feed_pipeline,
};
