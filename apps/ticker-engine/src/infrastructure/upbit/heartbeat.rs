//! Connection Keep-Alive
//!
//! The exchange drops idle WebSocket connections, so the client pings on an
//! interval and watches for the pong. A missed pong past the grace period is
//! reported as a dead link and the ingest loop tears the connection down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Keep-alive tuning knobs.
#[derive(Debug, Clone)]
pub struct KeepAliveConfig {
    /// Interval between outbound pings.
    pub ping_interval: Duration,
    /// How long a ping may go unanswered before the link is declared dead.
    pub pong_grace: Duration,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_grace: Duration::from_secs(20),
        }
    }
}

/// Signals from the keep-alive task to the connection loop.
#[derive(Debug, Clone, Copy)]
pub enum KeepAliveSignal {
    /// Time to send a ping frame.
    Ping,
    /// The pong grace period elapsed; reconnect.
    LinkDead,
}

/// Pong bookkeeping shared between the read path and the keep-alive task.
#[derive(Debug)]
pub struct LinkHealth {
    last_pong: RwLock<Instant>,
    awaiting_pong: AtomicBool,
}

impl Default for LinkHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkHealth {
    /// Fresh state for a new connection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_pong: RwLock::new(Instant::now()),
            awaiting_pong: AtomicBool::new(false),
        }
    }

    /// Record an inbound pong frame.
    pub fn pong_received(&self) {
        *self.last_pong.write() = Instant::now();
        self.awaiting_pong.store(false, Ordering::SeqCst);
    }

    /// Record that a ping went out.
    pub fn ping_sent(&self) {
        self.awaiting_pong.store(true, Ordering::SeqCst);
    }

    /// Whether a ping is outstanding.
    #[must_use]
    pub fn awaiting_pong(&self) -> bool {
        self.awaiting_pong.load(Ordering::SeqCst)
    }

    /// Elapsed time since the last pong.
    #[must_use]
    pub fn silence(&self) -> Duration {
        self.last_pong.read().elapsed()
    }

    /// Reset for a fresh connection.
    pub fn reset(&self) {
        *self.last_pong.write() = Instant::now();
        self.awaiting_pong.store(false, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn backdate_pong(&self, age: Duration) {
        if let Some(past) = Instant::now().checked_sub(age) {
            *self.last_pong.write() = past;
        }
    }
}

/// Keep-alive task for one connection.
///
/// Runs until cancelled or until it declares the link dead.
pub struct KeepAlive {
    config: KeepAliveConfig,
    health: Arc<LinkHealth>,
    signal_tx: mpsc::Sender<KeepAliveSignal>,
    cancel: CancellationToken,
}

impl KeepAlive {
    /// Create a keep-alive task.
    #[must_use]
    pub const fn new(
        config: KeepAliveConfig,
        health: Arc<LinkHealth>,
        signal_tx: mpsc::Sender<KeepAliveSignal>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            health,
            signal_tx,
            cancel,
        }
    }

    /// Run the keep-alive loop.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.config.ping_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("keep-alive task cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if self.tick().await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    /// One keep-alive cycle: timeout check, then a ping request.
    async fn tick(&self) -> Result<(), ()> {
        if self.health.awaiting_pong() {
            let silence = self.health.silence();
            if silence > self.config.pong_grace {
                tracing::warn!(
                    silence_secs = silence.as_secs(),
                    grace_secs = self.config.pong_grace.as_secs(),
                    "pong overdue, declaring link dead"
                );
                let _ = self.signal_tx.send(KeepAliveSignal::LinkDead).await;
                return Err(());
            }
        }

        if self.signal_tx.send(KeepAliveSignal::Ping).await.is_err() {
            tracing::debug!("signal channel closed, stopping keep-alive");
            return Err(());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_starts_without_outstanding_ping() {
        let health = LinkHealth::new();
        assert!(!health.awaiting_pong());
        assert!(health.silence() < Duration::from_millis(100));
    }

    #[test]
    fn pong_clears_outstanding_ping() {
        let health = LinkHealth::new();
        health.ping_sent();
        assert!(health.awaiting_pong());

        health.pong_received();
        assert!(!health.awaiting_pong());
    }

    #[test]
    fn reset_clears_outstanding_ping() {
        let health = LinkHealth::new();
        health.ping_sent();
        health.reset();
        assert!(!health.awaiting_pong());
    }

    #[tokio::test]
    async fn emits_ping_signals() {
        let config = KeepAliveConfig {
            ping_interval: Duration::from_millis(50),
            pong_grace: Duration::from_secs(1),
        };
        let health = Arc::new(LinkHealth::new());
        let (signal_tx, mut signal_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let task = KeepAlive::new(config, health, signal_tx, cancel.clone());
        let handle = tokio::spawn(task.run());

        let signal = tokio::time::timeout(Duration::from_millis(200), signal_rx.recv())
            .await
            .expect("should receive signal")
            .expect("channel should stay open");
        assert!(matches!(signal, KeepAliveSignal::Ping));

        cancel.cancel();
        handle.await.expect("task should finish");
    }

    #[tokio::test]
    async fn declares_link_dead_after_grace() {
        let config = KeepAliveConfig {
            ping_interval: Duration::from_millis(50),
            pong_grace: Duration::from_millis(100),
        };
        let health = Arc::new(LinkHealth::new());
        let (signal_tx, mut signal_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        health.ping_sent();
        health.backdate_pong(Duration::from_millis(200));

        let task = KeepAlive::new(config, health, signal_tx, cancel.clone());
        let handle = tokio::spawn(task.run());

        let mut saw_dead_link = false;
        while let Ok(Some(signal)) =
            tokio::time::timeout(Duration::from_millis(500), signal_rx.recv()).await
        {
            if matches!(signal, KeepAliveSignal::LinkDead) {
                saw_dead_link = true;
                break;
            }
        }

        assert!(saw_dead_link, "should declare the link dead");
        cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_millis(100), handle).await;
    }

    #[tokio::test]
    async fn stops_on_cancellation() {
        let config = KeepAliveConfig {
            ping_interval: Duration::from_secs(10),
            pong_grace: Duration::from_secs(10),
        };
        let health = Arc::new(LinkHealth::new());
        let (signal_tx, _signal_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let task = KeepAlive::new(config, health, signal_tx, cancel.clone());
        let handle = tokio::spawn(task.run());

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_millis(100), handle).await;
        assert!(result.is_ok(), "task should stop on cancellation");
    }
}
