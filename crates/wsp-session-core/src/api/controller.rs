//! Call controller - owns one session and its runner task

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::events::CallEvent;
use crate::adapters::{MediaEngine, PeerConnectionEngine};
use crate::codec::{ByeReason, Invitation, HANDOVER_CODE};
use crate::config::SessionConfig;
use crate::errors::{Result, SessionError};
use crate::handover::HandoverCoordinator;
use crate::session::{Session, SessionSnapshot, TerminationReason};
use crate::state_machine::dispatch::{spawn_peer_connection_forwarder, spawn_transport_forwarder};
use crate::state_machine::{ActionContext, SessionEvent, StateMachine};
use crate::state_table::{CallState, Role, SessionId, MASTER_TABLE};
use crate::transport::{ChannelEndpoint, ChannelKind};

/// The externally owned engines a call runs on
#[derive(Clone)]
pub struct CallEngines {
    pub peer_connection: Arc<dyn PeerConnectionEngine>,
    pub media: Arc<dyn MediaEngine>,
}

impl CallEngines {
    pub fn new(peer_connection: Arc<dyn PeerConnectionEngine>, media: Arc<dyn MediaEngine>) -> Self {
        Self {
            peer_connection,
            media,
        }
    }
}

/// Handle to a single call.
///
/// All session mutation happens on a dedicated runner task; the controller
/// only posts events to it and observes the published snapshot.
pub struct CallController {
    session_id: SessionId,
    role: Role,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    notifier: broadcast::Sender<CallEvent>,
    runner: JoinHandle<()>,
}

impl CallController {
    /// Place a call: acquire media and send the invitation over `relay`
    pub async fn start_call(
        config: SessionConfig,
        engines: CallEngines,
        invitation: Invitation,
        relay: ChannelEndpoint,
    ) -> Result<Self> {
        Self::launch(Role::Caller, config, engines, relay, SessionEvent::StartCall(invitation))
    }

    /// Answer an invitation that arrived on `relay`
    pub async fn accept_invite(
        config: SessionConfig,
        engines: CallEngines,
        invitation: Invitation,
        relay: ChannelEndpoint,
    ) -> Result<Self> {
        Self::launch(Role::Callee, config, engines, relay, SessionEvent::InviteReceived(invitation))
    }

    fn launch(
        role: Role,
        config: SessionConfig,
        engines: CallEngines,
        relay: ChannelEndpoint,
        initial: SessionEvent,
    ) -> Result<Self> {
        config.validate()?;
        if relay.kind() != ChannelKind::Relay {
            return Err(SessionError::config(format!(
                "call must start on a relay channel, got {}",
                relay.kind()
            )));
        }

        let session_id = SessionId::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notifier, _) = broadcast::channel(config.event_buffer);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::initial());

        let ChannelEndpoint { transport, events } = relay;
        let handover = Arc::new(HandoverCoordinator::new(transport));

        let (pc_tx, pc_rx) = mpsc::unbounded_channel();
        engines.peer_connection.attach(pc_tx);

        let session = Session::new(session_id.clone(), role, config.history_limit);
        let mut ctx = ActionContext::new(
            session_id.clone(),
            Arc::new(config),
            engines.peer_connection,
            engines.media,
            handover,
            events_tx.clone(),
            notifier.clone(),
        );
        ctx.track_forwarder(
            Some(ChannelKind::Relay),
            spawn_transport_forwarder(ChannelKind::Relay, events, events_tx.clone()),
        );
        ctx.track_forwarder(None, spawn_peer_connection_forwarder(pc_rx, events_tx.clone()));

        let machine = StateMachine::new(MASTER_TABLE.clone(), session, ctx, snapshot_tx);
        let runner = tokio::spawn(run_session(machine, events_rx, initial));

        info!("Created {} session {}", role, session_id);

        Ok(Self {
            session_id,
            role,
            events_tx,
            snapshot_rx,
            notifier,
            runner,
        })
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> CallState {
        self.snapshot_rx.borrow().state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Subscribe to call events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.notifier.subscribe()
    }

    /// Hang up with `code` and wait until the session is torn down.
    ///
    /// Code 101 is reserved for handover and rejected. Ending a call that
    /// already terminated is a no-op.
    pub async fn end_call(&self, code: i64, description: impl Into<String>) -> Result<()> {
        if code == HANDOVER_CODE {
            return Err(SessionError::invalid_state(
                "bye code 101 is reserved for transport handover",
            ));
        }
        if self.state().is_terminal() {
            debug!("Session {} already terminated", self.session_id);
            return Ok(());
        }

        let reason = ByeReason::new(code, description);
        if self.events_tx.send(SessionEvent::HangupRequested(reason)).is_err() {
            debug!("Session {} runner already stopped", self.session_id);
        }
        self.wait_terminated().await;
        Ok(())
    }

    /// Hang up normally (`bye{200}`)
    pub async fn hangup(&self) -> Result<()> {
        let reason = ByeReason::normal_hangup();
        self.end_call(reason.code, reason.description).await
    }

    /// Wait until the session reaches `target` or a later state.
    ///
    /// Fails if the session terminates first, unless `target` is `Terminated`.
    pub async fn wait_for_state(&self, target: CallState) -> Result<CallState> {
        let mut rx = self.snapshot_rx.clone();
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if snapshot.state.is_terminal() && !target.is_terminal() {
                    return Err(SessionError::invalid_state(format!(
                        "session terminated before reaching {}",
                        target
                    )));
                }
                if snapshot.state.rank() >= target.rank() {
                    return Ok(snapshot.state);
                }
            }
            if rx.changed().await.is_err() {
                return Err(SessionError::internal("session runner stopped"));
            }
        }
    }

    /// Wait for termination and return why it happened
    pub async fn wait_terminated(&self) -> Option<TerminationReason> {
        let mut rx = self.snapshot_rx.clone();
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if snapshot.state.is_terminal() {
                    return snapshot.termination.clone();
                }
            }
            if rx.changed().await.is_err() {
                return rx.borrow().termination.clone();
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.runner.is_finished()
    }
}

impl std::fmt::Debug for CallController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallController")
            .field("session_id", &self.session_id)
            .field("role", &self.role)
            .field("state", &self.state())
            .finish()
    }
}

/// Drain the session's event queue until it terminates
async fn run_session(
    mut machine: StateMachine,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    initial: SessionEvent,
) {
    let session_id = machine.session().session_id.clone();
    debug!("Session runner for {} started", session_id);

    machine.handle(initial).await;
    while !machine.is_terminated() {
        match events.recv().await {
            Some(event) => {
                machine.handle(event).await;
            }
            None => break,
        }
    }

    debug!("Session runner for {} exiting", session_id);
}
