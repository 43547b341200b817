//! Snapshot reconciliation after calibration.
//!
//! A freshly connected server knows nothing about this client, so the
//! first real message after calibration is one atomic `ALL_STATE`
//! carrying every stored image, every identity label, and the training
//! flag. It is sent at most once per calibration completion and is not
//! retried — a failed push surfaces as a connection event.

use tracing::{debug, warn};

use crate::client::ClientContext;
use crate::connection::Connection;
use crate::message::OutboundMessage;

/// Push the full client snapshot to the server.
///
/// Guarded by the context's per-connection `synced` flag; a second
/// call within the same calibration cycle is refused. Returns whether
/// a push was enqueued.
pub fn push_state(ctx: &mut ClientContext, conn: &Connection) -> bool {
    if ctx.synced {
        warn!("snapshot already pushed for this connection");
        return false;
    }

    debug!(
        images = ctx.snapshot.images().len(),
        people = ctx.snapshot.people().len(),
        training = ctx.snapshot.training(),
        "pushing full state snapshot"
    );
    conn.send(&OutboundMessage::AllState {
        images: ctx.snapshot.images().to_vec(),
        people: ctx.snapshot.people().to_vec(),
        training: ctx.snapshot.training(),
    });
    ctx.synced = true;
    true
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::connection::ServerInfo;

    #[tokio::test]
    async fn pushes_at_most_once_per_connection() {
        let mut ctx = ClientContext::new(ClientConfig::default());
        let conn = Connection::open(ServerInfo::new("127.0.0.1:1", "dead"));

        assert!(push_state(&mut ctx, &conn));
        assert!(ctx.synced);
        assert!(!push_state(&mut ctx, &conn));

        // A new connection resets the guard.
        ctx.reset_for_connection();
        assert!(push_state(&mut ctx, &conn));
    }
}
