//! Prometheus Metrics
//!
//! Counters and gauges for the feed pipeline, exposed in Prometheus format
//! at `/metrics` on the health server port.
//!
//! # Metrics Categories
//!
//! - **Frames**: normalized ticks and dropped frames
//! - **Connection**: feed link state, disconnects, reconnect attempts
//! - **Cache**: markets with a cached tick
//! - **Fan-out**: updates delivered to subscribers, ingest-to-publish latency

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

fn register_metrics() {
    describe_counter!(
        "ticker_engine_ticks_normalized_total",
        "Total feed frames normalized into canonical ticks"
    );
    describe_counter!(
        "ticker_engine_frames_dropped_total",
        "Total feed frames dropped as malformed"
    );
    describe_counter!(
        "ticker_engine_disconnects_total",
        "Total feed connection losses"
    );
    describe_counter!(
        "ticker_engine_reconnect_attempts_total",
        "Total feed reconnection attempts"
    );
    describe_counter!(
        "ticker_engine_updates_delivered_total",
        "Total tick updates delivered to subscribers"
    );

    describe_gauge!(
        "ticker_engine_feed_connected",
        "Whether the upstream feed connection is live (1) or down (0)"
    );
    describe_gauge!(
        "ticker_engine_cached_markets",
        "Number of markets with a cached tick"
    );
    describe_gauge!(
        "ticker_engine_subscribed_markets",
        "Number of markets in the feed subscription set"
    );

    describe_histogram!(
        "ticker_engine_ingest_to_publish_seconds",
        "Latency from frame normalization to fan-out publish"
    );
}

/// Record a frame normalized into a canonical tick.
pub fn record_tick_normalized() {
    counter!("ticker_engine_ticks_normalized_total").increment(1);
}

/// Record a malformed frame dropped by the codec.
pub fn record_frame_dropped() {
    counter!("ticker_engine_frames_dropped_total").increment(1);
}

/// Record a lost feed connection.
pub fn record_disconnect() {
    counter!("ticker_engine_disconnects_total").increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect_attempt() {
    counter!("ticker_engine_reconnect_attempts_total").increment(1);
}

/// Record tick updates delivered to fan-out subscribers.
pub fn record_updates_delivered(count: u64) {
    counter!("ticker_engine_updates_delivered_total").increment(count);
}

/// Update the feed connection gauge.
pub fn set_feed_connected(connected: bool) {
    gauge!("ticker_engine_feed_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Update the cached-market count.
pub fn set_cached_markets(count: f64) {
    gauge!("ticker_engine_cached_markets").set(count);
}

/// Update the subscribed-market count.
pub fn set_subscribed_markets(count: f64) {
    gauge!("ticker_engine_subscribed_markets").set(count);
}

/// Record the latency from a tick's normalization to its fan-out publish.
pub fn record_ingest_latency(seconds: f64) {
    histogram!("ticker_engine_ingest_to_publish_seconds").record(seconds);
}
