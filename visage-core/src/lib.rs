//! # visage-core
//!
//! Streaming protocol client for a remote face-recognition service.
//!
//! The client keeps one persistent duplex connection to the server and
//! runs the full protocol lifecycle over it:
//!
//! ```text
//!  Disconnected ──► Connecting ──► Calibrating ──► Streaming
//!                                      │               │
//!                  RTT probes (strictly sequential)    │
//!                  ALL_STATE snapshot push (once)      │
//!                                                      ▼
//!                                    FRAME sends under credit
//!                                    backpressure; server events
//!                                    dispatched to the render sink
//! ```
//!
//! This crate contains:
//! - **Messages**: `OutboundMessage` / `InboundMessage` — the JSON wire
//!   protocol as exhaustive tagged enums
//! - **Codec**: `WireCodec` for framed JSON text over TCP via `tokio_util`
//! - **Connection**: managed transport with event delivery and stale-event
//!   filtering
//! - **Calibration**: `CalibrationSession` — sequential RTT probes with
//!   warm-up discard
//! - **Flow control**: `CreditController` — consume/replenish credits
//! - **Scheduling**: `FrameScheduler` — gated periodic frame submission
//! - **State**: `ClientSnapshot` (images, people, training flag) and the
//!   `ALL_STATE` synchronizer
//! - **Driver**: `FaceClient` — the single-writer event loop tying it all
//!   together, with `ClientHandle` for local operations
//! - **Error**: `VisageError` — typed, `thiserror`-based error hierarchy

pub mod calibrate;
pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod credit;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod phase;
pub mod scheduler;
pub mod sink;
pub mod snapshot;
pub mod source;
pub mod sync;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use calibrate::{CalibrationSession, RttReport, RttStats, WARMUP_SAMPLES};
pub use client::{ClientCommand, ClientContext, ClientHandle, FaceClient};
pub use codec::{MAX_MESSAGE_SIZE, WireCodec};
pub use config::ClientConfig;
pub use connection::{ConnEvent, ConnEventKind, Connection, ConnectionState, ServerInfo};
pub use credit::CreditController;
pub use error::VisageError;
pub use message::{Identity, InboundMessage, OutboundMessage};
pub use phase::ClientPhase;
pub use scheduler::{FrameScheduler, TickOutcome};
pub use sink::{ServerStatus, UiEvent, UiSender, UiStatus};
pub use snapshot::{ClientSnapshot, FACE_CROP_DIM, ImageRecord, PixelBuffer, SnapshotSummary};
pub use source::{CapturedFrame, FrameSource};
