//! Configuration for the protocol client.

use std::time::Duration;

use crate::connection::ServerInfo;

/// Calibration probes per connection.
pub const DEFAULT_PROBE_COUNT: usize = 10;
/// Credits granted when calibration completes.
pub const DEFAULT_INITIAL_CREDITS: u32 = 5;
/// Frame capture cadence.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(250);
/// How long to wait for each probe echo before failing the connection.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// How long training mode stays on after a person is registered.
pub const DEFAULT_TRAINING_WINDOW: Duration = Duration::from_secs(10);

/// Configuration for [`FaceClient`](crate::client::FaceClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The server to connect to.
    pub server: ServerInfo,
    /// Number of calibration probes (≥ 1).
    pub probe_count: usize,
    /// Starting credit balance.
    pub initial_credits: u32,
    /// Scheduler tick interval.
    pub frame_interval: Duration,
    /// Per-probe echo deadline.
    pub probe_timeout: Duration,
    /// Auto-off delay for training mode after registering a person.
    pub training_window: Duration,
}

impl ClientConfig {
    /// Configuration with defaults for the given server.
    pub fn new(server: ServerInfo) -> Self {
        Self {
            server,
            probe_count: DEFAULT_PROBE_COUNT,
            initial_credits: DEFAULT_INITIAL_CREDITS,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            training_window: DEFAULT_TRAINING_WINDOW,
        }
    }

    /// Set the probe count (clamped to at least 1).
    pub fn with_probe_count(mut self, count: usize) -> Self {
        self.probe_count = count.max(1);
        self
    }

    pub fn with_initial_credits(mut self, credits: u32) -> Self {
        self.initial_credits = credits;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_training_window(mut self, window: Duration) -> Self {
        self.training_window = window;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(ServerInfo::new("127.0.0.1:9000", "Local"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.probe_count, 10);
        assert_eq!(cfg.initial_credits, 5);
        assert_eq!(cfg.frame_interval, Duration::from_millis(250));
    }

    #[test]
    fn probe_count_clamped() {
        let cfg = ClientConfig::default().with_probe_count(0);
        assert_eq!(cfg.probe_count, 1);
    }
}
