//! Engine Configuration Settings
//!
//! Configuration types for the ticker engine, loaded from environment
//! variables. Every setting has a working default; the public ticker feed
//! needs no credentials.

use std::time::Duration;

/// Feed source settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// WebSocket URL of the ticker stream.
    pub url: String,
    /// Quote currency for which 24h trade value is retained.
    pub domestic_quote: String,
    /// Markets to subscribe at startup.
    pub markets: Vec<String>,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: "wss://api.upbit.com/websocket/v1".to_string(),
            domestic_quote: "KRW".to_string(),
            markets: vec![
                "KRW-BTC".to_string(),
                "KRW-ETH".to_string(),
                "KRW-XRP".to_string(),
            ],
        }
    }
}

/// WebSocket connection settings.
#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    /// Keep-alive ping interval.
    pub heartbeat_interval: Duration,
    /// Grace period for an unanswered ping.
    pub heartbeat_timeout: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Jitter fraction applied to each reconnection delay (0.1 = ±10%).
    pub reconnect_jitter: f64,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(20),
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            reconnect_jitter: 0.1,
        }
    }
}

/// Fan-out hub settings.
#[derive(Debug, Clone)]
pub struct HubSettings {
    /// Buffered updates per market channel.
    pub channel_capacity: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8082 }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Feed source settings.
    pub feed: FeedSettings,
    /// WebSocket connection settings.
    pub websocket: WebSocketSettings,
    /// Fan-out hub settings.
    pub hub: HubSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl EngineConfig {
    /// Create configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let feed_defaults = FeedSettings::default();
        let feed = FeedSettings {
            url: parse_env_string("TICKER_FEED_URL", feed_defaults.url),
            domestic_quote: parse_env_string("TICKER_DOMESTIC_QUOTE", feed_defaults.domestic_quote),
            markets: parse_env_markets("TICKER_MARKETS", feed_defaults.markets),
        };

        let ws_defaults = WebSocketSettings::default();
        let websocket = WebSocketSettings {
            heartbeat_interval: parse_env_duration_secs(
                "TICKER_HEARTBEAT_INTERVAL_SECS",
                ws_defaults.heartbeat_interval,
            ),
            heartbeat_timeout: parse_env_duration_secs(
                "TICKER_HEARTBEAT_TIMEOUT_SECS",
                ws_defaults.heartbeat_timeout,
            ),
            reconnect_delay_initial: parse_env_duration_millis(
                "TICKER_RECONNECT_DELAY_INITIAL_MS",
                ws_defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "TICKER_RECONNECT_DELAY_MAX_SECS",
                ws_defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env_f64(
                "TICKER_RECONNECT_DELAY_MULTIPLIER",
                ws_defaults.reconnect_delay_multiplier,
            ),
            reconnect_jitter: parse_env_f64("TICKER_RECONNECT_JITTER", ws_defaults.reconnect_jitter),
        };

        let hub = HubSettings {
            channel_capacity: parse_env_usize(
                "TICKER_CHANNEL_CAPACITY",
                HubSettings::default().channel_capacity,
            ),
        };

        let server = ServerSettings {
            health_port: parse_env_u16("TICKER_HEALTH_PORT", ServerSettings::default().health_port),
        };

        Self {
            feed,
            websocket,
            hub,
            server,
        }
    }
}

fn parse_env_string(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

fn parse_env_markets(key: &str, default: Vec<String>) -> Vec<String> {
    std::env::var(key)
        .ok()
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect::<Vec<_>>()
        })
        .filter(|markets| !markets.is_empty())
        .unwrap_or(default)
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
