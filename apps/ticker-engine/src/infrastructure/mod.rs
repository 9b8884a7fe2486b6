//! Infrastructure Layer - External integrations and operational plumbing.

/// Per-market fan-out of cached tick updates.
pub mod broadcast;

/// Last-tick cache.
pub mod cache;

/// Environment-driven configuration.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics.
pub mod metrics;

/// OpenTelemetry tracing.
pub mod telemetry;

/// Upbit feed client and payload normalization.
pub mod upbit;
