//! The protocol client driver.
//!
//! [`FaceClient`] owns the connection, the client context, the frame
//! scheduler, and the frame source, and runs one `select!` event loop
//! over all of them. Every piece of state is mutated inside that loop
//! — one writer at a time, no locks — and every local edit operation
//! sends its protocol message in the same turn as the mutation so the
//! server never diverges from the snapshot.

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::calibrate::CalibrationSession;
use crate::config::ClientConfig;
use crate::connection::{ConnEvent, ConnEventKind, Connection, ServerInfo};
use crate::credit::CreditController;
use crate::dispatch;
use crate::error::VisageError;
use crate::message::{Identity, InboundMessage, OutboundMessage};
use crate::phase::ClientPhase;
use crate::scheduler::FrameScheduler;
use crate::sink::{ServerStatus, UiEvent, UiSender, UiStatus};
use crate::snapshot::ClientSnapshot;
use crate::source::FrameSource;

// ── ClientContext ────────────────────────────────────────────────

/// All mutable client state, held in one place and passed explicitly
/// to the dispatcher, scheduler, and synchronizer.
#[derive(Debug)]
pub struct ClientContext {
    pub config: ClientConfig,
    pub phase: ClientPhase,
    pub calibration: CalibrationSession,
    pub credits: CreditController,
    pub snapshot: ClientSnapshot,
    /// The identity frames are tagged with; set when a person is
    /// registered or selected.
    pub active_identity: Identity,
    /// Whether `ALL_STATE` has been pushed on the current connection.
    pub synced: bool,
}

impl ClientContext {
    pub fn new(config: ClientConfig) -> Self {
        let calibration = CalibrationSession::new(config.probe_count);
        Self {
            phase: ClientPhase::default(),
            calibration,
            // Credits are granted when calibration completes.
            credits: CreditController::new(0),
            snapshot: ClientSnapshot::new(),
            active_identity: Identity::Unknown,
            synced: false,
            config,
        }
    }

    /// Reset per-connection state. The snapshot survives — that is the
    /// point of the sync push.
    pub fn reset_for_connection(&mut self) {
        self.calibration = CalibrationSession::new(self.config.probe_count);
        self.credits = CreditController::new(0);
        self.synced = false;
    }
}

// ── Commands ─────────────────────────────────────────────────────

/// Local edit operations, submitted from the render-sink side.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    /// Register a new identity label and enter training mode.
    AddPerson(String),
    /// Toggle training mode.
    SetTraining(bool),
    /// Request a certification attempt.
    TryCertify,
    /// Request a t-SNE visualization artifact.
    RequestTsne,
    /// Relabel a stored image.
    UpdateIdentity { hash: String, identity: Identity },
    /// Delete a stored image.
    RemoveImage { hash: String },
    /// Select the identity context for outgoing frames.
    SetActiveIdentity(Identity),
    /// Close the current connection and connect to another server.
    SwitchServer(ServerInfo),
    /// Close the connection and end the run loop.
    Shutdown,
}

/// Clonable handle for submitting [`ClientCommand`]s to a running
/// client.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    tx: mpsc::UnboundedSender<ClientCommand>,
}

impl ClientHandle {
    fn submit(&self, cmd: ClientCommand) {
        if self.tx.send(cmd).is_err() {
            warn!("client is gone; command dropped");
        }
    }

    pub fn add_person(&self, label: impl Into<String>) {
        self.submit(ClientCommand::AddPerson(label.into()));
    }

    pub fn set_training(&self, training: bool) {
        self.submit(ClientCommand::SetTraining(training));
    }

    pub fn try_certify(&self) {
        self.submit(ClientCommand::TryCertify);
    }

    pub fn request_tsne(&self) {
        self.submit(ClientCommand::RequestTsne);
    }

    pub fn update_identity(&self, hash: impl Into<String>, identity: Identity) {
        self.submit(ClientCommand::UpdateIdentity {
            hash: hash.into(),
            identity,
        });
    }

    pub fn remove_image(&self, hash: impl Into<String>) {
        self.submit(ClientCommand::RemoveImage { hash: hash.into() });
    }

    pub fn set_active_identity(&self, identity: Identity) {
        self.submit(ClientCommand::SetActiveIdentity(identity));
    }

    pub fn switch_server(&self, server: ServerInfo) {
        self.submit(ClientCommand::SwitchServer(server));
    }

    pub fn shutdown(&self) {
        self.submit(ClientCommand::Shutdown);
    }
}

// ── FaceClient ───────────────────────────────────────────────────

/// One step of the event loop, owned so handlers can borrow freely.
enum Step {
    Conn(Option<ConnEvent>),
    Tick,
    Command(Option<ClientCommand>),
    ProbeTimeout,
    TrainingExpired,
}

/// The streaming protocol client.
///
/// Construct with [`connect`](Self::connect), keep a
/// [`handle`](Self::handle) for local operations, then drive it with
/// [`run`](Self::run).
pub struct FaceClient<S: FrameSource> {
    ctx: ClientContext,
    conn: Connection,
    scheduler: FrameScheduler,
    source: S,
    ui: UiSender,
    cmd_tx: mpsc::UnboundedSender<ClientCommand>,
    cmd_rx: mpsc::UnboundedReceiver<ClientCommand>,
    /// Deadline for the outstanding calibration probe, if any.
    probe_deadline: Option<Instant>,
    /// Probe count the deadline was armed for.
    armed_probes: usize,
    /// When training mode switches itself off.
    training_deadline: Option<Instant>,
    /// The connection's event channel is exhausted.
    conn_events_done: bool,
}

impl<S: FrameSource> FaceClient<S> {
    /// Start connecting to the configured server.
    ///
    /// Returns immediately; the lifecycle proceeds inside
    /// [`run`](Self::run). Must be called within a tokio runtime.
    pub fn connect(config: ClientConfig, source: S, ui: UiSender) -> Self {
        let conn = Connection::open(config.server.clone());
        let scheduler = FrameScheduler::new(config.frame_interval);
        let mut ctx = ClientContext::new(config);
        if let Err(e) = ctx.phase.begin_connect() {
            warn!(error = %e, "unexpected initial phase");
        }
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let _ = ui.send(UiEvent::ServerStatus(ServerStatus::Connecting {
            server: conn.server().name.clone(),
        }));

        Self {
            ctx,
            conn,
            scheduler,
            source,
            ui,
            cmd_tx,
            cmd_rx,
            probe_deadline: None,
            armed_probes: 0,
            training_deadline: None,
            conn_events_done: false,
        }
    }

    /// A handle for submitting local operations.
    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            tx: self.cmd_tx.clone(),
        }
    }

    /// The client's current state (phase, snapshot, credits, …).
    pub fn context(&self) -> &ClientContext {
        &self.ctx
    }

    /// Run the event loop until [`ClientHandle::shutdown`] is called.
    pub async fn run(mut self) -> Result<(), VisageError> {
        loop {
            let step = self.next_step().await;
            match step {
                Step::Conn(Some(ev)) => {
                    if ev.conn_id == self.conn.id() {
                        self.on_conn_event(ev.kind);
                    } else {
                        debug!(conn_id = ev.conn_id, "ignoring event from superseded connection");
                    }
                }
                Step::Conn(None) => {
                    self.conn_events_done = true;
                    if !self.ctx.phase.is_terminal() {
                        self.ctx.phase.mark_closed();
                        let _ = self.ui.send(UiEvent::ServerStatus(ServerStatus::Disconnected));
                    }
                }
                Step::Tick => {
                    let outcome = self
                        .scheduler
                        .attempt(&mut self.ctx, &self.conn, &mut self.source)
                        .await;
                    trace!(?outcome, "scheduler tick");
                }
                Step::Command(Some(cmd)) => {
                    if self.on_command(cmd) {
                        return Ok(());
                    }
                }
                Step::Command(None) => return Ok(()),
                Step::ProbeTimeout => self.on_probe_timeout(),
                Step::TrainingExpired => self.on_training_expired(),
            }
            self.rearm_probe_deadline();
        }
    }

    async fn next_step(&mut self) -> Step {
        let probe_deadline = self.probe_deadline;
        let training_deadline = self.training_deadline;
        let conn_events_done = self.conn_events_done;

        tokio::select! {
            cmd = self.cmd_rx.recv() => Step::Command(cmd),
            ev = self.conn.event(), if !conn_events_done => Step::Conn(ev),
            _ = deadline(probe_deadline) => Step::ProbeTimeout,
            _ = deadline(training_deadline) => Step::TrainingExpired,
            _ = self.scheduler.tick() => Step::Tick,
        }
    }

    // ── Connection events ────────────────────────────────────────

    fn on_conn_event(&mut self, kind: ConnEventKind) {
        match kind {
            ConnEventKind::Opened => {
                info!(server = %self.conn.server(), "connection open; calibrating");
                if let Err(e) = self.ctx.phase.begin_calibration() {
                    warn!(error = %e, "ignoring unexpected open");
                    return;
                }
                // The calibration session never outlives a connection.
                self.ctx.reset_for_connection();
                self.armed_probes = 0;
                let _ = self.ui.send(UiEvent::ServerStatus(ServerStatus::Connected {
                    server: self.conn.server().name.clone(),
                }));

                // First probe; the rest are echo-driven.
                self.conn.send(&OutboundMessage::Null);
                if let Err(e) = self.ctx.calibration.record_probe() {
                    warn!(error = %e, "failed to record first probe");
                }
            }

            ConnEventKind::Message(text) => match InboundMessage::parse(&text) {
                Ok(msg) => dispatch::dispatch(msg, &mut self.ctx, &self.conn, &self.ui),
                Err(VisageError::UnknownType(kind)) => {
                    warn!(message_type = %kind, "unrecognized message type");
                }
                Err(e) => warn!(error = %e, "malformed inbound message"),
            },

            ConnEventKind::Closed => {
                info!(server = %self.conn.server(), "connection closed");
                self.ctx.phase.mark_closed();
                let _ = self.ui.send(UiEvent::ServerStatus(ServerStatus::Disconnected));
            }

            ConnEventKind::Error(e) => {
                warn!(server = %self.conn.server(), error = %e, "connection failed");
                self.ctx.phase.mark_error();
                let _ = self.ui.send(UiEvent::ServerStatus(ServerStatus::Failed {
                    reason: e.to_string(),
                }));
            }
        }
    }

    // ── Deadlines ────────────────────────────────────────────────

    /// Keep the probe deadline in step with the calibration session:
    /// armed once per outstanding probe, cleared otherwise.
    fn rearm_probe_deadline(&mut self) {
        if self.ctx.phase.is_calibrating() && self.ctx.calibration.probe_outstanding() {
            let sent = self.ctx.calibration.probes_sent();
            if self.armed_probes != sent {
                self.armed_probes = sent;
                self.probe_deadline = Some(Instant::now() + self.ctx.config.probe_timeout);
            }
        } else {
            self.probe_deadline = None;
        }
    }

    fn on_probe_timeout(&mut self) {
        self.probe_deadline = None;
        if !self.ctx.phase.is_calibrating() || self.ctx.calibration.is_complete() {
            return;
        }
        error!(
            server = %self.conn.server(),
            timeout = ?self.ctx.config.probe_timeout,
            echoes = self.ctx.calibration.echoes_received(),
            "calibration probe timed out"
        );
        self.ctx.phase.mark_error();
        self.conn.close();
        let _ = self.ui.send(UiEvent::ServerStatus(ServerStatus::Failed {
            reason: "calibration timed out".to_string(),
        }));
    }

    fn on_training_expired(&mut self) {
        self.training_deadline = None;
        if self.ctx.snapshot.training() {
            debug!("training window elapsed");
            self.apply_training(false);
        }
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Apply one local operation. Returns `true` on shutdown.
    fn on_command(&mut self, cmd: ClientCommand) -> bool {
        match cmd {
            ClientCommand::AddPerson(label) => {
                let label = label.trim().to_string();
                if label.is_empty() {
                    debug!("ignoring empty person label");
                    return false;
                }
                let idx = self.ctx.snapshot.add_person(label.clone());
                self.ctx.active_identity = Identity::Known(idx);
                self.conn.send(&OutboundMessage::AddPerson { val: label });
                self.apply_training(true);
                self.training_deadline =
                    Some(Instant::now() + self.ctx.config.training_window);
                let _ = self.ui.send(UiEvent::Status(UiStatus::LookAtCamera));
            }

            ClientCommand::SetTraining(training) => {
                self.apply_training(training);
                if !training {
                    self.training_deadline = None;
                }
            }

            ClientCommand::TryCertify => {
                self.conn.send(&OutboundMessage::TryCertify { val: true });
                let _ = self.ui.send(UiEvent::Status(UiStatus::Smile));
            }

            ClientCommand::RequestTsne => {
                self.conn.send(&OutboundMessage::ReqTsne {
                    people: self.ctx.snapshot.people().to_vec(),
                });
            }

            ClientCommand::UpdateIdentity { hash, identity } => {
                if self.ctx.snapshot.update_identity(&hash, identity) {
                    self.conn
                        .send(&OutboundMessage::UpdateIdentity { hash, idx: identity });
                    let _ = self
                        .ui
                        .send(UiEvent::SnapshotChanged(self.ctx.snapshot.summary()));
                } else {
                    debug!(%hash, "relabel for unknown image hash");
                }
            }

            ClientCommand::RemoveImage { hash } => {
                if self.ctx.snapshot.remove_image(&hash) {
                    self.conn.send(&OutboundMessage::RemoveImage { hash });
                    let _ = self
                        .ui
                        .send(UiEvent::SnapshotChanged(self.ctx.snapshot.summary()));
                } else {
                    debug!(%hash, "remove for unknown image hash");
                }
            }

            ClientCommand::SetActiveIdentity(identity) => {
                if let Identity::Known(idx) = identity {
                    if idx >= self.ctx.snapshot.people().len() {
                        warn!(idx, "ignoring unregistered identity index");
                        return false;
                    }
                }
                self.ctx.active_identity = identity;
            }

            ClientCommand::SwitchServer(server) => self.switch_server(server),

            ClientCommand::Shutdown => {
                self.conn.close();
                self.ctx.phase.mark_closed();
                let _ = self.ui.send(UiEvent::ServerStatus(ServerStatus::Disconnected));
                return true;
            }
        }
        false
    }

    /// Flip the training flag and tell the server, in the same turn.
    fn apply_training(&mut self, training: bool) {
        self.ctx.snapshot.set_training(training);
        self.conn.send(&OutboundMessage::Training { val: training });
        if !training {
            let _ = self.ui.send(UiEvent::Status(UiStatus::Idle));
        }
        let _ = self
            .ui
            .send(UiEvent::SnapshotChanged(self.ctx.snapshot.summary()));
    }

    /// Close the current connection and restart the lifecycle against
    /// another server. The snapshot carries over and is pushed to the
    /// new server after its calibration.
    fn switch_server(&mut self, server: ServerInfo) {
        info!(%server, "switching server");
        self.conn.close();
        self.ctx.phase.mark_closed();
        self.ctx.reset_for_connection();
        self.armed_probes = 0;
        self.probe_deadline = None;
        self.conn_events_done = false;
        if let Err(e) = self.ctx.phase.begin_connect() {
            warn!(error = %e, "unexpected phase during server switch");
        }
        self.conn = Connection::open(server);
        let _ = self.ui.send(UiEvent::ServerStatus(ServerStatus::Connecting {
            server: self.conn.server().name.clone(),
        }));
    }
}

/// Sleep until `at`, or forever when there is no deadline.
async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CapturedFrame;
    use async_trait::async_trait;

    struct NullSource;

    #[async_trait]
    impl FrameSource for NullSource {
        fn is_ready(&self) -> bool {
            false
        }

        async fn capture(&mut self) -> Result<CapturedFrame, VisageError> {
            Err(VisageError::Capture("no frames".to_string()))
        }
    }

    fn test_client() -> (
        FaceClient<NullSource>,
        mpsc::UnboundedReceiver<UiEvent>,
    ) {
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let config = ClientConfig::new(ServerInfo::new("127.0.0.1:1", "dead"));
        let client = FaceClient::connect(config, NullSource, ui_tx);
        (client, ui_rx)
    }

    #[tokio::test]
    async fn connect_reports_connecting_status() {
        let (client, mut ui_rx) = test_client();
        assert_eq!(client.context().phase, ClientPhase::Connecting);
        match ui_rx.try_recv().unwrap() {
            UiEvent::ServerStatus(ServerStatus::Connecting { server }) => {
                assert_eq!(server, "dead");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn add_person_registers_and_enters_training() {
        let (mut client, mut ui_rx) = test_client();
        let _ = ui_rx.try_recv();

        assert!(!client.on_command(ClientCommand::AddPerson("alice".to_string())));
        assert_eq!(client.ctx.snapshot.people(), ["alice".to_string()]);
        assert_eq!(client.ctx.active_identity, Identity::Known(0));
        assert!(client.ctx.snapshot.training());
        assert!(client.training_deadline.is_some());

        let events: Vec<UiEvent> = std::iter::from_fn(|| ui_rx.try_recv().ok()).collect();
        assert!(events.contains(&UiEvent::Status(UiStatus::LookAtCamera)));
    }

    #[tokio::test]
    async fn empty_person_label_is_ignored() {
        let (mut client, _ui_rx) = test_client();
        client.on_command(ClientCommand::AddPerson("   ".to_string()));
        assert!(client.ctx.snapshot.people().is_empty());
        assert!(!client.ctx.snapshot.training());
    }

    #[tokio::test]
    async fn training_window_expiry_turns_training_off() {
        let (mut client, _ui_rx) = test_client();
        client.on_command(ClientCommand::AddPerson("alice".to_string()));
        assert!(client.ctx.snapshot.training());

        client.on_training_expired();
        assert!(!client.ctx.snapshot.training());
        assert!(client.training_deadline.is_none());
    }

    #[tokio::test]
    async fn unregistered_active_identity_is_refused() {
        let (mut client, _ui_rx) = test_client();
        client.on_command(ClientCommand::SetActiveIdentity(Identity::Known(3)));
        assert_eq!(client.ctx.active_identity, Identity::Unknown);

        client.on_command(ClientCommand::AddPerson("alice".to_string()));
        client.on_command(ClientCommand::SetActiveIdentity(Identity::Unknown));
        assert_eq!(client.ctx.active_identity, Identity::Unknown);
        client.on_command(ClientCommand::SetActiveIdentity(Identity::Known(0)));
        assert_eq!(client.ctx.active_identity, Identity::Known(0));
    }

    #[tokio::test]
    async fn remove_unknown_hash_sends_nothing_and_keeps_state() {
        let (mut client, mut ui_rx) = test_client();
        let _ = ui_rx.try_recv();

        client.on_command(ClientCommand::RemoveImage {
            hash: "missing".to_string(),
        });
        // No snapshot notification — nothing changed.
        assert!(ui_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn shutdown_ends_the_loop() {
        let (mut client, _ui_rx) = test_client();
        assert!(client.on_command(ClientCommand::Shutdown));
        assert!(client.ctx.phase.is_terminal());
        assert_eq!(client.conn.state(), crate::connection::ConnectionState::Closed);
    }

    #[tokio::test]
    async fn switch_server_resets_connection_state() {
        let (mut client, _ui_rx) = test_client();
        let old_id = client.conn.id();
        client.ctx.synced = true;

        client.on_command(ClientCommand::SwitchServer(ServerInfo::new(
            "127.0.0.1:2",
            "other",
        )));
        assert_ne!(client.conn.id(), old_id);
        assert_eq!(client.ctx.phase, ClientPhase::Connecting);
        assert!(!client.ctx.synced);
        assert_eq!(client.ctx.calibration.probes_sent(), 0);
    }

    #[tokio::test]
    async fn probe_timeout_fails_the_connection() {
        let (mut client, mut ui_rx) = test_client();
        let _ = ui_rx.try_recv();
        client.ctx.phase = ClientPhase::Calibrating;
        client.ctx.calibration.record_probe().unwrap();

        client.on_probe_timeout();
        assert_eq!(client.ctx.phase, ClientPhase::Error);
        let events: Vec<UiEvent> = std::iter::from_fn(|| ui_rx.try_recv().ok()).collect();
        assert!(events.iter().any(|e| matches!(
            e,
            UiEvent::ServerStatus(ServerStatus::Failed { .. })
        )));
    }
}
