//! Upbit Feed Integration
//!
//! WebSocket client, payload normalization, keep-alive, and reconnect
//! handling for the exchange ticker stream.

/// Raw payload normalization.
pub mod codec;

/// Field alias tables for the duck-typed feed.
pub mod fields;

/// Connection keep-alive.
pub mod heartbeat;

/// Reconnect backoff.
pub mod reconnect;

/// WebSocket feed client.
pub mod client;

pub use client::{FeedConfig, FeedError, FeedEvent, TickerClient};
pub use codec::{CodecError, TickerCodec};
