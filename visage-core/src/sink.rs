//! The render-sink seam.
//!
//! The client reports everything the embedding UI needs as [`UiEvent`]s
//! on an unbounded channel; the UI side owns the receiver and renders
//! however it likes. The client never blocks on the sink.

use tokio::sync::mpsc;

use crate::calibrate::RttReport;
use crate::snapshot::SnapshotSummary;

/// Sender half of the render-sink channel.
pub type UiSender = mpsc::UnboundedSender<UiEvent>;

// ── ServerStatus ─────────────────────────────────────────────────

/// Connection status line for the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerStatus {
    Connecting { server: String },
    Connected { server: String },
    Disconnected,
    Failed { reason: String },
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting { server } => write!(f, "Connecting to {server}…"),
            Self::Connected { server } => write!(f, "Connected to {server}"),
            Self::Disconnected => write!(f, "Disconnected."),
            Self::Failed { reason } => write!(f, "Connection failed: {reason}"),
        }
    }
}

// ── UiStatus ─────────────────────────────────────────────────────

/// The instruction/status line shown to the person in front of the
/// camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiStatus {
    Idle,
    LookAtCamera,
    Smile,
    Success,
    Failure,
    PleaseRegister,
}

impl std::fmt::Display for UiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, ""),
            Self::LookAtCamera => write!(f, "Please look at your webcam for 5 seconds."),
            Self::Smile => write!(f, "Smile :)"),
            Self::Success => write!(f, "Success!"),
            Self::Failure => write!(f, "Fail. Try again."),
            Self::PleaseRegister => write!(f, "Please login or register."),
        }
    }
}

// ── UiEvent ──────────────────────────────────────────────────────

/// Everything the client pushes to the render sink.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Connection status changed.
    ServerStatus(ServerStatus),

    /// Calibration finished for `server`.
    Rtt { server: String, report: RttReport },

    /// Identities detected in the most recent frame, resolved to
    /// display labels.
    Detections { labels: Vec<String> },

    /// Annotated copy of the most recent frame (encoded image).
    AnnotatedFrame { content: String },

    /// A t-SNE visualization artifact, shown modally.
    TsneArtifact { content: String },

    /// The instruction/status line changed.
    Status(UiStatus),

    /// The snapshot collections changed (image added/removed, person
    /// registered, training toggled).
    SnapshotChanged(SnapshotSummary),
}
