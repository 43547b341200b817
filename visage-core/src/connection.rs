//! Managed duplex connection to a recognition server.
//!
//! A [`Connection`] owns the transport: opening it spawns a task that
//! establishes the TCP stream, frames it with [`WireCodec`], and pumps
//! both directions through channels. Lifecycle changes and inbound
//! text are delivered as [`ConnEvent`]s tagged with the connection's
//! process-unique id, so events from a superseded connection (after a
//! server switch) can be recognized and discarded. Transport failures
//! surface as events, never as thrown faults.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use crate::codec::WireCodec;
use crate::error::VisageError;
use crate::message::OutboundMessage;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

// ── ServerInfo ───────────────────────────────────────────────────

/// A recognition server: socket address plus a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub address: String,
    pub name: String,
}

impl ServerInfo {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

// ── ConnectionState ──────────────────────────────────────────────

/// Transport-level lifecycle of a single [`Connection`] instance.
///
/// `Closed` and `Error` are terminal; recovery means opening a new
/// `Connection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Closed,
    Error,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Error)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
            Self::Error => write!(f, "Error"),
        }
    }
}

// ── Events ───────────────────────────────────────────────────────

/// What happened on the transport.
#[derive(Debug)]
pub enum ConnEventKind {
    /// The stream is established and ready for traffic.
    Opened,
    /// One inbound JSON text message.
    Message(String),
    /// The peer closed the stream.
    Closed,
    /// The transport failed (connect refused, codec error, write error).
    Error(VisageError),
}

/// An event from a specific connection instance.
#[derive(Debug)]
pub struct ConnEvent {
    pub conn_id: u64,
    pub kind: ConnEventKind,
}

// ── Connection ───────────────────────────────────────────────────

/// A managed connection to one recognition server.
pub struct Connection {
    id: u64,
    server: ServerInfo,
    state: ConnectionState,
    outbound: Option<mpsc::UnboundedSender<String>>,
    events: mpsc::Receiver<ConnEvent>,
}

impl Connection {
    /// Start connecting to `server`.
    ///
    /// Returns immediately in the `Connecting` state; establishment
    /// success or failure arrives as the first [`ConnEvent`]. Must be
    /// called within a tokio runtime.
    pub fn open(server: ServerInfo) -> Self {
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(256);

        tokio::spawn(run_transport(
            id,
            server.address.clone(),
            outbound_rx,
            event_tx,
        ));

        Self {
            id,
            server,
            state: ConnectionState::Connecting,
            outbound: Some(outbound_tx),
            events: event_rx,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn server(&self) -> &ServerInfo {
        &self.server
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Fire-and-forget enqueue of one outbound message.
    ///
    /// Sending while the connection is not `Open` is a caller error:
    /// it is logged and dropped, never retried.
    pub fn send(&self, message: &OutboundMessage) {
        if !self.state.is_open() {
            warn!(state = %self.state, "dropping outbound message: connection is not open");
            return;
        }
        let Some(tx) = &self.outbound else {
            warn!("dropping outbound message: connection is closing");
            return;
        };
        match serde_json::to_string(message) {
            Ok(text) => {
                if tx.send(text).is_err() {
                    warn!("dropping outbound message: transport task is gone");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode outbound message"),
        }
    }

    /// Close the connection. Idempotent.
    ///
    /// Dropping the outbound channel lets the writer task flush and
    /// shut down the write half; the peer sees a clean FIN.
    pub fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.outbound = None;
        self.state = ConnectionState::Closed;
    }

    /// Receive the next event from this connection's transport,
    /// updating the tracked state.
    ///
    /// Returns `None` once the transport task is gone and all queued
    /// events have been drained.
    pub async fn event(&mut self) -> Option<ConnEvent> {
        let ev = self.events.recv().await?;
        debug_assert_eq!(ev.conn_id, self.id);
        match ev.kind {
            ConnEventKind::Opened => {
                // A locally closed connection stays closed even if the
                // stream came up in the meantime.
                if self.state == ConnectionState::Connecting {
                    self.state = ConnectionState::Open;
                }
            }
            ConnEventKind::Closed => {
                if !self.state.is_terminal() {
                    self.state = ConnectionState::Closed;
                }
            }
            ConnEventKind::Error(_) => {
                if !self.state.is_terminal() {
                    self.state = ConnectionState::Error;
                }
            }
            ConnEventKind::Message(_) => {}
        }
        Some(ev)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("server", &self.server)
            .field("state", &self.state)
            .finish()
    }
}

// ── Transport task ───────────────────────────────────────────────

async fn run_transport(
    conn_id: u64,
    address: String,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    event_tx: mpsc::Sender<ConnEvent>,
) {
    let stream = match TcpStream::connect(&address).await {
        Ok(s) => s,
        Err(e) => {
            let _ = event_tx
                .send(ConnEvent {
                    conn_id,
                    kind: ConnEventKind::Error(e.into()),
                })
                .await;
            return;
        }
    };

    if event_tx
        .send(ConnEvent {
            conn_id,
            kind: ConnEventKind::Opened,
        })
        .await
        .is_err()
    {
        // Connection handle already dropped.
        return;
    }

    let (mut writer, mut reader) = Framed::new(stream, WireCodec).split();

    // Writer task: client -> network
    let writer_events = event_tx.clone();
    tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if let Err(e) = writer.send(text).await {
                let _ = writer_events
                    .send(ConnEvent {
                        conn_id,
                        kind: ConnEventKind::Error(e),
                    })
                    .await;
                return;
            }
        }
        // Outbound channel closed: local close(). Flush and FIN.
        let _ = writer.close().await;
    });

    // Reader loop: network -> client
    while let Some(result) = reader.next().await {
        match result {
            Ok(text) => {
                if event_tx
                    .send(ConnEvent {
                        conn_id,
                        kind: ConnEventKind::Message(text),
                    })
                    .await
                    .is_err()
                {
                    // Connection handle dropped; stop reading.
                    return;
                }
            }
            Err(e) => {
                debug!(conn_id, error = %e, "transport read error");
                let _ = event_tx
                    .send(ConnEvent {
                        conn_id,
                        kind: ConnEventKind::Error(e),
                    })
                    .await;
                return;
            }
        }
    }

    let _ = event_tx
        .send(ConnEvent {
            conn_id,
            kind: ConnEventKind::Closed,
        })
        .await;
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn ephemeral_server() -> (TcpListener, ServerInfo) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, ServerInfo::new(addr.to_string(), "test"))
    }

    async fn next_event(conn: &mut Connection) -> ConnEvent {
        tokio::time::timeout(Duration::from_secs(5), conn.event())
            .await
            .expect("timeout")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn open_delivers_opened_event() {
        let (listener, info) = ephemeral_server().await;
        let mut conn = Connection::open(info);
        assert_eq!(conn.state(), ConnectionState::Connecting);

        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });
        let ev = next_event(&mut conn).await;
        assert!(matches!(ev.kind, ConnEventKind::Opened));
        assert_eq!(ev.conn_id, conn.id());
        assert!(conn.is_open());
        accept.await.unwrap();
    }

    #[tokio::test]
    async fn connect_refused_delivers_error_event() {
        // Bind then drop to get a port nothing listens on.
        let (listener, info) = ephemeral_server().await;
        drop(listener);

        let mut conn = Connection::open(info);
        let ev = next_event(&mut conn).await;
        assert!(matches!(ev.kind, ConnEventKind::Error(_)));
        assert_eq!(conn.state(), ConnectionState::Error);
    }

    #[tokio::test]
    async fn send_roundtrip() {
        let (listener, info) = ephemeral_server().await;
        let mut conn = Connection::open(info);
        let (stream, _) = listener.accept().await.unwrap();
        let mut server = Framed::new(stream, WireCodec);

        let ev = next_event(&mut conn).await;
        assert!(matches!(ev.kind, ConnEventKind::Opened));

        conn.send(&OutboundMessage::Null);
        let text = tokio::time::timeout(Duration::from_secs(5), server.next())
            .await
            .expect("timeout")
            .expect("eof")
            .expect("codec");
        assert_eq!(text, r#"{"type":"NULL"}"#);

        // Server -> client.
        server.send(r#"{"type":"PROCESSED"}"#.to_string()).await.unwrap();
        let ev = next_event(&mut conn).await;
        match ev.kind {
            ConnEventKind::Message(text) => assert_eq!(text, r#"{"type":"PROCESSED"}"#),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_before_open_is_dropped() {
        let (listener, info) = ephemeral_server().await;
        let mut conn = Connection::open(info);

        // Still Connecting — this send must be a no-op.
        conn.send(&OutboundMessage::Null);

        let (stream, _) = listener.accept().await.unwrap();
        let mut server = Framed::new(stream, WireCodec);
        let ev = next_event(&mut conn).await;
        assert!(matches!(ev.kind, ConnEventKind::Opened));

        // This one goes through; the earlier one must not appear first.
        conn.send(&OutboundMessage::Training { val: true });
        let text = tokio::time::timeout(Duration::from_secs(5), server.next())
            .await
            .expect("timeout")
            .expect("eof")
            .expect("codec");
        assert!(text.contains("TRAINING"));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_fins_peer() {
        let (listener, info) = ephemeral_server().await;
        let mut conn = Connection::open(info);
        let (stream, _) = listener.accept().await.unwrap();
        let mut server = Framed::new(stream, WireCodec);

        let ev = next_event(&mut conn).await;
        assert!(matches!(ev.kind, ConnEventKind::Opened));

        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);

        // Peer observes end-of-stream.
        let eof = tokio::time::timeout(Duration::from_secs(5), server.next())
            .await
            .expect("timeout");
        assert!(eof.is_none());
    }

    #[tokio::test]
    async fn peer_close_delivers_closed_event() {
        let (listener, info) = ephemeral_server().await;
        let mut conn = Connection::open(info);
        let (stream, _) = listener.accept().await.unwrap();

        let ev = next_event(&mut conn).await;
        assert!(matches!(ev.kind, ConnEventKind::Opened));

        drop(stream);
        let ev = next_event(&mut conn).await;
        assert!(matches!(ev.kind, ConnEventKind::Closed));
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn connection_ids_are_unique() {
        let (listener, info) = ephemeral_server().await;
        let a = Connection::open(info.clone());
        let b = Connection::open(info);
        assert_ne!(a.id(), b.id());
        drop(listener);
    }
}
