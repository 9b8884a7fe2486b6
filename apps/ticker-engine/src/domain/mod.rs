//! Domain Layer - Core ticker and valuation types.
//!
//! This layer contains the core domain types for market keys, canonical
//! ticks and position valuation, with no transport dependencies.

/// Market key canonicalization and catalog types.
pub mod market;

/// Canonical tick types.
pub mod ticker;

/// Position valuation.
pub mod valuation;
