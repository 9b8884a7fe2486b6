//! Configuration
//!
//! Environment-driven settings for the engine.

/// Settings types and environment loading.
pub mod settings;

pub use settings::{EngineConfig, FeedSettings, HubSettings, ServerSettings, WebSocketSettings};
