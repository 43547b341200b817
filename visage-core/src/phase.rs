//! Client-visible lifecycle state machine.
//!
//! Models the full protocol lifecycle with validated transitions that
//! return `Result` instead of panicking.

use std::time::Instant;

use crate::error::VisageError;

// ── ClientPhase ──────────────────────────────────────────────────

/// The current phase of the protocol client.
///
/// ```text
///  Disconnected ──► Connecting ──► Calibrating ──► Streaming
///       ▲               │               │              │
///       │               ▼               ▼              ▼
///       └───────── Closed / Error ◄─────┴──────────────┘
/// ```
///
/// `Streaming` is the only phase in which the frame scheduler performs
/// real sends. `Closed` and `Error` are terminal for the current
/// connection; recovery means opening a new one (`begin_connect` is
/// valid again from either).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClientPhase {
    /// No active connection. Initial state.
    #[default]
    Disconnected,

    /// Transport establishment in progress.
    Connecting,

    /// Transport is up; sequential RTT probes in flight.
    Calibrating,

    /// Calibration complete, snapshot pushed; frames flow under credit.
    Streaming {
        /// When streaming began.
        since: Instant,
    },

    /// The connection was closed (locally or by the peer).
    Closed,

    /// The transport or calibration failed.
    Error,
}

impl std::fmt::Display for ClientPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Calibrating => write!(f, "Calibrating"),
            Self::Streaming { .. } => write!(f, "Streaming"),
            Self::Closed => write!(f, "Closed"),
            Self::Error => write!(f, "Error"),
        }
    }
}

impl ClientPhase {
    pub fn is_calibrating(&self) -> bool {
        matches!(self, Self::Calibrating)
    }

    /// Returns `true` when calibration is complete and frames may flow.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Error)
    }

    /// How long the client has been streaming.
    ///
    /// Returns `None` for any other phase.
    pub fn streaming_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Streaming { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Disconnected`, `Closed`, `Error` (a fresh
    /// connection after a terminal phase).
    pub fn begin_connect(&mut self) -> Result<(), VisageError> {
        match self {
            Self::Disconnected | Self::Closed | Self::Error => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(VisageError::Transition(
                "cannot connect: a connection is already in progress",
            )),
        }
    }

    /// Transition to `Calibrating`.
    ///
    /// Valid from: `Connecting`.
    pub fn begin_calibration(&mut self) -> Result<(), VisageError> {
        match self {
            Self::Connecting => {
                *self = Self::Calibrating;
                Ok(())
            }
            _ => Err(VisageError::Transition(
                "cannot calibrate: not in Connecting state",
            )),
        }
    }

    /// Transition to `Streaming`.
    ///
    /// Valid from: `Calibrating`.
    pub fn begin_streaming(&mut self) -> Result<(), VisageError> {
        match self {
            Self::Calibrating => {
                *self = Self::Streaming {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(VisageError::Transition(
                "cannot stream: not in Calibrating state",
            )),
        }
    }

    /// Force-transition to `Closed`. Valid from any phase; idempotent.
    pub fn mark_closed(&mut self) {
        *self = Self::Closed;
    }

    /// Force-transition to `Error`. Valid from any phase.
    pub fn mark_error(&mut self) {
        *self = Self::Error;
    }
}

// ── Tests ────────────────────────────────────────────────────────
