//! Reconnect Backoff
//!
//! Capped exponential backoff with jitter for the upstream feed connection.
//! The ingest loop retries indefinitely; a market-data cache with a stale
//! entry beats one with no entry, so giving up is never the right call.

use std::time::Duration;

use rand::Rng;

/// Backoff tuning knobs.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first reconnect attempt.
    pub initial: Duration,
    /// Ceiling for the computed delay, before jitter.
    pub cap: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Jitter fraction (0.1 = ±10% randomization).
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            cap: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

/// Backoff state for one connection lifecycle.
///
/// Delays are a pure function of the attempt counter, so a [`reset`] after a
/// successful connect restores the full sequence.
///
/// [`reset`]: Backoff::reset
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    /// Create a backoff tracker.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay to sleep before the next attempt, with jitter applied.
    ///
    /// Advances the attempt counter. Never refuses: retries are unbounded.
    #[must_use]
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.jittered(self.base_delay(self.attempt));
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Attempts made since the last reset.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Clear the attempt counter after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt = 0;
    }

    /// `initial * multiplier^attempt`, capped.
    fn base_delay(&self, attempt: u32) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let scaled = self.config.initial.as_millis() as f64
            * self
                .config
                .multiplier
                .powi(i32::try_from(attempt).unwrap_or(i32::MAX));

        let cap_millis = u64::try_from(self.config.cap.as_millis()).unwrap_or(u64::MAX);
        if !scaled.is_finite() {
            return Duration::from_millis(cap_millis);
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = (scaled.max(0.0) as u64).min(cap_millis);
        Duration::from_millis(millis)
    }

    fn jittered(&self, base: Duration) -> Duration {
        if self.config.jitter <= 0.0 {
            return base;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = base.as_millis() as f64;
        let range = base_millis * self.config.jitter;
        let offset: f64 = rand::rng().random_range(-range..=range);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted = (base_millis + offset).max(1.0) as u64;
        Duration::from_millis(adjusted)
    }
}
