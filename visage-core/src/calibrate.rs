//! Round-trip latency calibration over a freshly opened connection.
//!
//! Probes are strictly sequential — the next one goes out only after
//! the previous echo came back — so each echo pairs unambiguously with
//! its send without a correlation id. The first few samples are
//! discarded as connection warm-up noise before statistics are
//! computed.

use std::time::Instant;

use crate::error::VisageError;

/// Leading samples excluded from RTT statistics (warm-up noise).
pub const WARMUP_SAMPLES: usize = 5;

// ── RttReport ────────────────────────────────────────────────────

/// RTT statistics over the post-warm-up samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RttStats {
    pub mean_ms: f64,
    pub stdev_ms: f64,
    /// How many samples contributed.
    pub samples: usize,
}

/// Outcome of a completed calibration session.
///
/// A session whose target does not exceed the warm-up discard has no
/// usable samples; that is reported explicitly rather than producing
/// NaN statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RttReport {
    Measured(RttStats),
    InsufficientSamples { echoes: usize },
}

impl std::fmt::Display for RttReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Measured(stats) => {
                write!(f, "{:.2} ms (σ = {:.2})", stats.mean_ms, stats.stdev_ms)
            }
            Self::InsufficientSamples { echoes } => {
                write!(f, "insufficient samples ({echoes} echoes)")
            }
        }
    }
}

// ── CalibrationSession ───────────────────────────────────────────

/// Bookkeeping for one sequential probe exchange.
///
/// Invariant: `sent.len() == received.len() + {0, 1}` — at most one
/// probe in flight. A session is created per connection and never
/// reused.
#[derive(Debug)]
pub struct CalibrationSession {
    sent: Vec<Instant>,
    received: Vec<Instant>,
    target: usize,
}

impl CalibrationSession {
    pub fn new(target: usize) -> Self {
        Self {
            sent: Vec::with_capacity(target),
            received: Vec::with_capacity(target),
            target,
        }
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn probes_sent(&self) -> usize {
        self.sent.len()
    }

    pub fn echoes_received(&self) -> usize {
        self.received.len()
    }

    /// A probe has been sent and its echo has not yet arrived.
    pub fn probe_outstanding(&self) -> bool {
        self.sent.len() > self.received.len()
    }

    pub fn is_complete(&self) -> bool {
        self.received.len() >= self.target
    }

    /// Record that a probe was just sent.
    pub fn record_probe(&mut self) -> Result<(), VisageError> {
        self.record_probe_at(Instant::now())
    }

    /// Record a probe send with an explicit timestamp (useful for testing).
    pub fn record_probe_at(&mut self, when: Instant) -> Result<(), VisageError> {
        if self.is_complete() {
            return Err(VisageError::Calibration("probe after completion"));
        }
        if self.probe_outstanding() {
            return Err(VisageError::Calibration("probe already in flight"));
        }
        self.sent.push(when);
        Ok(())
    }

    /// Record the echo of the outstanding probe.
    ///
    /// Returns the number of echoes received so far.
    pub fn record_echo(&mut self) -> Result<usize, VisageError> {
        self.record_echo_at(Instant::now())
    }

    /// Record an echo with an explicit timestamp (useful for testing).
    pub fn record_echo_at(&mut self, when: Instant) -> Result<usize, VisageError> {
        if !self.probe_outstanding() {
            return Err(VisageError::Calibration("echo without outstanding probe"));
        }
        self.received.push(when);
        Ok(self.received.len())
    }

    /// RTT statistics over samples past the warm-up discard.
    ///
    /// Mean and population standard deviation of `received - sent`,
    /// in milliseconds.
    pub fn report(&self) -> RttReport {
        let total = self.received.len();
        if total <= WARMUP_SAMPLES {
            return RttReport::InsufficientSamples { echoes: total };
        }

        let diffs: Vec<f64> = (WARMUP_SAMPLES..total)
            .map(|i| self.received[i].duration_since(self.sent[i]).as_secs_f64() * 1e3)
            .collect();

        let n = diffs.len() as f64;
        let mean = diffs.iter().sum::<f64>() / n;
        let variance = diffs.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;

        RttReport::Measured(RttStats {
            mean_ms: mean,
            stdev_ms: variance.sqrt(),
            samples: diffs.len(),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────
