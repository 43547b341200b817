//! Periodic frame capture and transmission.
//!
//! Capture cadence is decoupled from transmission eligibility: the
//! tick fires at a fixed interval no matter what, and each tick
//! re-checks the gates (connection open, streaming phase, source
//! ready, credit available) before doing anything. The scheduler has
//! no detached timer — it is owned and polled by the client driver,
//! and dies with it.

use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::warn;

use crate::client::ClientContext;
use crate::connection::Connection;
use crate::message::OutboundMessage;
use crate::source::FrameSource;

// ── TickOutcome ──────────────────────────────────────────────────

/// What one scheduling tick did, naming the gate that stopped it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was captured and sent.
    Sent,
    /// Connection is not open.
    NotOpen,
    /// Calibration has not completed (or the phase is terminal).
    NotStreaming,
    /// The frame source cannot capture right now.
    SourceNotReady,
    /// No credit available; backpressure engaged.
    NoCredit,
    /// The source failed; the consumed credit was refunded.
    CaptureFailed,
}

// ── FrameScheduler ───────────────────────────────────────────────

/// Drives periodic frame submission attempts.
pub struct FrameScheduler {
    ticker: Interval,
    frames_sent: u64,
}

impl FrameScheduler {
    pub fn new(tick_interval: Duration) -> Self {
        let mut ticker = interval(tick_interval);
        // A stalled loop should not burst-fire to catch up.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker,
            frames_sent: 0,
        }
    }

    /// Total frames sent since construction.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Wait for the next tick.
    pub async fn tick(&mut self) {
        self.ticker.tick().await;
    }

    /// Run one transmission attempt.
    ///
    /// Checks the gates in order and stops at the first one that
    /// fails; a skipped tick has no side effects. A passing tick
    /// consumes one credit, captures one frame, and sends it tagged
    /// with the active identity.
    pub async fn attempt<S: FrameSource>(
        &mut self,
        ctx: &mut ClientContext,
        conn: &Connection,
        source: &mut S,
    ) -> TickOutcome {
        if !conn.is_open() {
            return TickOutcome::NotOpen;
        }
        if !ctx.phase.is_streaming() {
            return TickOutcome::NotStreaming;
        }
        if !source.is_ready() {
            return TickOutcome::SourceNotReady;
        }
        if !ctx.credits.try_consume() {
            return TickOutcome::NoCredit;
        }

        match source.capture().await {
            Ok(frame) => {
                conn.send(&OutboundMessage::Frame {
                    data_url: frame.to_data_url(),
                    identity: ctx.active_identity,
                });
                self.frames_sent += 1;
                TickOutcome::Sent
            }
            Err(e) => {
                warn!(error = %e, "frame capture failed");
                // No frame went out for the consumed credit.
                ctx.credits.replenish();
                TickOutcome::CaptureFailed
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
