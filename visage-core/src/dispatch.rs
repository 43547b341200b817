//! Inbound message routing.
//!
//! Every server message lands here exactly once and is mapped to its
//! effect: calibration advance, credit replenishment, snapshot
//! mutation, or a render-sink notification. Nothing in this module can
//! fail the connection — bad payloads and unknown kinds are logged at
//! the parse layer and never reach the match.

use tracing::{debug, trace, warn};

use crate::client::ClientContext;
use crate::connection::Connection;
use crate::credit::CreditController;
use crate::message::{InboundMessage, OutboundMessage};
use crate::sink::{UiEvent, UiSender, UiStatus};
use crate::snapshot::{ImageRecord, PixelBuffer};
use crate::sync;

/// Route one inbound message to its effect.
pub fn dispatch(msg: InboundMessage, ctx: &mut ClientContext, conn: &Connection, ui: &UiSender) {
    match msg {
        InboundMessage::Null => on_probe_echo(ctx, conn, ui),

        InboundMessage::Processed => {
            ctx.credits.replenish();
            trace!(balance = ctx.credits.balance(), "frame acknowledged");
        }

        InboundMessage::NewImage {
            hash,
            identity,
            content,
            representation,
        } => {
            let image = match PixelBuffer::from_bgr(&content) {
                Ok(image) => image,
                Err(e) => {
                    warn!(%hash, error = %e, "discarding NEW_IMAGE with bad pixel payload");
                    return;
                }
            };
            let stored = ctx.snapshot.add_image(ImageRecord {
                hash: hash.clone(),
                identity,
                image,
                representation,
            });
            if stored {
                let _ = ui.send(UiEvent::SnapshotChanged(ctx.snapshot.summary()));
            } else {
                warn!(%hash, "duplicate image hash from server");
            }
        }

        InboundMessage::Identities { identities } => {
            let labels = identities
                .iter()
                .map(|&id| ctx.snapshot.label_for(id))
                .collect();
            let _ = ui.send(UiEvent::Detections { labels });
        }

        InboundMessage::Annotated { content } => {
            let _ = ui.send(UiEvent::AnnotatedFrame { content });
        }

        InboundMessage::TsneData { content } => {
            let _ = ui.send(UiEvent::TsneArtifact { content });
        }

        InboundMessage::CertifiedSuccess => {
            let _ = ui.send(UiEvent::Status(UiStatus::Success));
        }

        InboundMessage::CertifiedFail { val } => {
            let status = match val {
                0 => UiStatus::Failure,
                1 => UiStatus::PleaseRegister,
                other => {
                    warn!(val = other, "unrecognized certification failure code");
                    return;
                }
            };
            let _ = ui.send(UiEvent::Status(status));
        }
    }
}

/// Handle one probe echo.
///
/// Advances the calibration session; on the final echo this publishes
/// the RTT report, pushes the snapshot (exactly once), grants the
/// initial credit balance, and opens the streaming phase — in that
/// order, so `ALL_STATE` always precedes the first `FRAME`.
fn on_probe_echo(ctx: &mut ClientContext, conn: &Connection, ui: &UiSender) {
    if ctx.calibration.is_complete() {
        debug!("ignoring probe echo after calibration completion");
        return;
    }
    if let Err(e) = ctx.calibration.record_echo() {
        warn!(error = %e, "ignoring unexpected probe echo");
        return;
    }

    if ctx.calibration.is_complete() {
        let _ = ui.send(UiEvent::Rtt {
            server: conn.server().name.clone(),
            report: ctx.calibration.report(),
        });
        sync::push_state(ctx, conn);
        ctx.credits = CreditController::new(ctx.config.initial_credits);
        if let Err(e) = ctx.phase.begin_streaming() {
            warn!(error = %e, "calibration completed in unexpected phase");
        }
    } else {
        conn.send(&OutboundMessage::Null);
        if let Err(e) = ctx.calibration.record_probe() {
            warn!(error = %e, "failed to record probe send");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
