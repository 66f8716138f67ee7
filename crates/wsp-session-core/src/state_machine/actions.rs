use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::dispatch::spawn_transport_forwarder;
use super::events::SessionEvent;
use crate::adapters::{MediaEngine, NegotiationStep, PeerConnectionEngine};
use crate::api::CallEvent;
use crate::candidate_buffer::{BufferDecision, CandidateBuffer};
use crate::codec::Message;
use crate::config::SessionConfig;
use crate::errors::{Result, SessionError};
use crate::handover::{HandoverCoordinator, HandoverOutcome};
use crate::session::Session;
use crate::state_table::{Action, SessionId};
use crate::transport::{ChannelEndpoint, ChannelKind};

/// Everything an action can touch besides the session itself
pub struct ActionContext {
    pub session_id: SessionId,
    pub config: Arc<SessionConfig>,
    pub peer_connection: Arc<dyn PeerConnectionEngine>,
    pub media: Arc<dyn MediaEngine>,
    pub handover: Arc<HandoverCoordinator>,
    pub candidates: CandidateBuffer,
    notifier: broadcast::Sender<CallEvent>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    pending_direct_channel: Option<ChannelEndpoint>,
    negotiations: Vec<JoinHandle<()>>,
    forwarders: Vec<(Option<ChannelKind>, JoinHandle<()>)>,
    followups: VecDeque<SessionEvent>,
    torn_down: bool,
}

impl ActionContext {
    pub fn new(
        session_id: SessionId,
        config: Arc<SessionConfig>,
        peer_connection: Arc<dyn PeerConnectionEngine>,
        media: Arc<dyn MediaEngine>,
        handover: Arc<HandoverCoordinator>,
        event_tx: mpsc::UnboundedSender<SessionEvent>,
        notifier: broadcast::Sender<CallEvent>,
    ) -> Self {
        Self {
            session_id,
            config,
            peer_connection,
            media,
            handover,
            candidates: CandidateBuffer::new(),
            notifier,
            event_tx,
            pending_direct_channel: None,
            negotiations: Vec::new(),
            forwarders: Vec::new(),
            followups: VecDeque::new(),
            torn_down: false,
        }
    }

    /// Track a background forwarder so teardown can stop it.
    /// `channel` is `None` for the peer connection forwarder.
    pub fn track_forwarder(&mut self, channel: Option<ChannelKind>, handle: JoinHandle<()>) {
        self.forwarders.push((channel, handle));
    }

    pub fn notify(&self, event: CallEvent) {
        // No subscribers is fine
        let _ = self.notifier.send(event);
    }

    /// Queue an event to run right after the current one
    pub fn push_followup(&mut self, event: SessionEvent) {
        self.followups.push_back(event);
    }

    pub fn take_followups(&mut self) -> VecDeque<SessionEvent> {
        std::mem::take(&mut self.followups)
    }

    pub(crate) fn stage_direct_channel(&mut self, endpoint: ChannelEndpoint) {
        self.pending_direct_channel = Some(endpoint);
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Number of negotiation tasks that have not finished
    pub fn pending_negotiations(&self) -> usize {
        self.negotiations.iter().filter(|h| !h.is_finished()).count()
    }

    async fn send(&self, message: Message) -> Result<()> {
        self.handover.send(&message).await.map(|_| ())
    }

    /// Run one engine call under the negotiation deadline
    async fn with_deadline<T, F>(&self, step: NegotiationStep, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let deadline = self.config.negotiation_timeout();
        match tokio::time::timeout(deadline, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(negotiation_error(step, e)),
            Err(_) => Err(SessionError::negotiation_timeout(step, deadline.as_millis() as u64)),
        }
    }

    /// Start create-offer or create-answer off the session task.
    /// The result comes back as a new event.
    fn spawn_negotiation(&mut self, step: NegotiationStep) {
        let peer_connection = self.peer_connection.clone();
        let event_tx = self.event_tx.clone();
        let deadline = self.config.negotiation_timeout();
        let session_id = self.session_id.clone();

        let handle = tokio::spawn(async move {
            let result = match step {
                NegotiationStep::CreateOffer => {
                    tokio::time::timeout(deadline, peer_connection.create_offer()).await
                }
                _ => tokio::time::timeout(deadline, peer_connection.create_answer()).await,
            };
            let event = match result {
                Ok(Ok(description)) if step == NegotiationStep::CreateOffer => {
                    SessionEvent::OfferCreated(description)
                }
                Ok(Ok(description)) => SessionEvent::AnswerCreated(description),
                Ok(Err(e)) => SessionEvent::NegotiationFailed(negotiation_error(step, e)),
                Err(_) => SessionEvent::NegotiationTimeout(SessionError::negotiation_timeout(
                    step,
                    deadline.as_millis() as u64,
                )),
            };
            debug!("Negotiation step {} finished for session {}", step, session_id);
            let _ = event_tx.send(event);
        });

        self.negotiations.retain(|h| !h.is_finished());
        self.negotiations.push(handle);
    }

    async fn add_remote_candidate(&self, candidate: &crate::codec::Candidate) {
        // A bad candidate only loses one connectivity path
        if let Err(e) = self.peer_connection.add_candidate(candidate).await {
            warn!("Engine rejected remote candidate for session {}: {}", self.session_id, e);
        }
    }

    fn attach_direct_channel(&mut self, endpoint: ChannelEndpoint) {
        let ChannelEndpoint { transport, events } = endpoint;
        if self.handover.attach_direct(transport) {
            let forwarder = spawn_transport_forwarder(ChannelKind::Direct, events, self.event_tx.clone());
            self.track_forwarder(Some(ChannelKind::Direct), forwarder);
        }
    }

    fn stop_forwarder(&mut self, channel: ChannelKind) {
        for (kind, handle) in &self.forwarders {
            if *kind == Some(channel) {
                handle.abort();
            }
        }
    }

    /// Release everything the session holds. Runs at most once.
    async fn teardown(&mut self, session: &mut Session) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        let dropped = self.candidates.discard();
        if dropped > 0 {
            debug!("Discarded {} buffered candidates for session {}", dropped, session.session_id);
        }

        for handle in self.negotiations.drain(..) {
            handle.abort();
        }

        let closed = self.handover.close_all().await;
        debug!("Closed {} channels for session {}", closed, session.session_id);

        for stream in [session.local_stream.take(), session.remote_stream.take()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = self.media.release_stream(&stream).await {
                warn!("Failed to release stream {}: {}", stream.id, e);
            }
        }

        // Drop whatever was staged but never consumed
        self.pending_direct_channel = None;
        session.pending_remote_stream = None;

        for (_, handle) in self.forwarders.drain(..) {
            handle.abort();
        }
        info!("Session {} torn down", session.session_id);
    }
}

fn negotiation_error(step: NegotiationStep, error: SessionError) -> SessionError {
    match error {
        SessionError::NegotiationFailure { .. } | SessionError::NegotiationTimeout { .. } => error,
        other => SessionError::negotiation(step, other.to_string()),
    }
}

fn missing(what: &str) -> SessionError {
    SessionError::internal(format!("{} not staged for action", what))
}

/// Execute an action from the state table
pub async fn execute_action(
    action: Action,
    session: &mut Session,
    ctx: &mut ActionContext,
) -> Result<()> {
    debug!("Executing action {:?} for session {}", action, session.session_id);

    match action {
        // Media
        Action::AcquireLocalMedia => {
            if session.local_stream.is_some() {
                debug!("Local media already acquired");
                return Ok(());
            }
            let stream = ctx.media.acquire_local_stream().await?;
            session.local_stream = Some(stream.clone());
            ctx.peer_connection.add_local_stream(&stream).await?;
            info!("Acquired local stream {} for session {}", stream.id, session.session_id);
        }
        Action::StoreRemoteStream => {
            if let Some(stream) = session.pending_remote_stream.take() {
                info!("Remote stream {} added to session {}", stream.id, session.session_id);
                session.remote_stream = Some(stream.clone());
                ctx.notify(CallEvent::RemoteStreamAdded {
                    session_id: session.session_id.clone(),
                    stream,
                });
            }
        }

        // Outbound messages
        Action::SendInvite => {
            let invitation = session.invitation.as_ref().ok_or_else(|| missing("invitation"))?;
            info!("Inviting {} on behalf of {}", invitation.callee.uri, invitation.caller.uri);
            ctx.send(Message::invite(invitation)).await?;
        }
        Action::SendRinging => {
            ctx.send(Message::ringing()).await?;
        }
        Action::SendOffer => {
            let offer = session.local_description.as_ref().ok_or_else(|| missing("offer"))?;
            ctx.send(Message::offer(offer)).await?;
        }
        Action::SendAnswer => {
            let answer = session.local_description.as_ref().ok_or_else(|| missing("answer"))?;
            ctx.send(Message::answer(answer)).await?;
        }
        Action::SendLocalCandidate => {
            let candidate = session
                .pending_local_candidate
                .take()
                .ok_or_else(|| missing("local candidate"))?;
            if ctx.handover.awaiting_direct() {
                debug!("Relay released and direct channel not attached yet, dropping local candidate");
                return Ok(());
            }
            ctx.send(Message::ice_candidate(&candidate)).await?;
        }
        Action::SendBye => {
            let Some(reason) = session.pending_bye.take() else {
                debug!("No bye to send for session {}", session.session_id);
                return Ok(());
            };
            let active = ctx.handover.active_kind();
            if ctx.handover.is_closed(active) {
                debug!("Active {} channel already closed, not sending bye", active);
                return Ok(());
            }
            info!("Sending bye {} ({}) for session {}", reason.code, reason.description, session.session_id);
            ctx.send(Message::bye(&reason)).await?;
        }

        // Negotiation
        Action::RequestOffer => ctx.spawn_negotiation(NegotiationStep::CreateOffer),
        Action::RequestAnswer => ctx.spawn_negotiation(NegotiationStep::CreateAnswer),
        Action::ApplyLocalDescription => {
            let description = session
                .pending_local_description
                .take()
                .ok_or_else(|| missing("local description"))?;
            let pc = ctx.peer_connection.clone();
            ctx.with_deadline(
                NegotiationStep::SetLocalDescription,
                pc.set_local_description(&description),
            )
            .await?;
            session.local_description = Some(description);
            session.local_description_applied = true;
        }
        Action::ApplyRemoteDescription => {
            let description = session
                .pending_remote_description
                .take()
                .ok_or_else(|| missing("remote description"))?;
            let pc = ctx.peer_connection.clone();
            ctx.with_deadline(
                NegotiationStep::SetRemoteDescription,
                pc.set_remote_description(&description),
            )
            .await?;
            session.remote_description = Some(description);
            session.remote_description_applied = true;
        }
        Action::FlushCandidates => {
            let flushed = ctx.candidates.on_remote_description_applied();
            if !flushed.is_empty() {
                debug!("Flushing {} buffered candidates for session {}", flushed.len(), session.session_id);
            }
            for candidate in &flushed {
                ctx.add_remote_candidate(candidate).await;
            }
        }
        Action::RouteRemoteCandidate => {
            let candidate = session
                .pending_remote_candidate
                .take()
                .ok_or_else(|| missing("remote candidate"))?;
            match ctx.candidates.offer(candidate) {
                BufferDecision::Forward(candidate) => ctx.add_remote_candidate(&candidate).await,
                BufferDecision::Buffered => {
                    debug!("Buffered remote candidate ({} waiting)", ctx.candidates.len())
                }
                BufferDecision::Discarded => debug!("Dropped remote candidate after teardown"),
            }
        }

        // Direct channel and handover
        Action::CreateDirectChannel => {
            let label = ctx.config.data_channel_label.clone();
            let endpoint = ctx.peer_connection.create_direct_channel(&label).await?;
            debug!("Created direct channel '{}' for session {}", label, session.session_id);
            ctx.attach_direct_channel(endpoint);
        }
        Action::AttachDirectChannel => {
            if let Some(endpoint) = ctx.pending_direct_channel.take() {
                debug!("Peer opened direct channel for session {}", session.session_id);
                ctx.attach_direct_channel(endpoint);
            }
        }
        Action::RecordDirectChannelOpen => {
            debug!("Direct channel open before answer, deferring handover");
            session.direct_channel_open_pending = true;
        }
        Action::BeginHandover => {
            session.direct_channel_open_pending = false;
            if let HandoverOutcome::Completed { notice_channel } = ctx.handover.begin_handover().await? {
                ctx.notify(CallEvent::HandoverStarted {
                    session_id: session.session_id.clone(),
                    notice_channel,
                });
            }
        }
        Action::AcceptRemoteHandover => {
            if ctx.handover.on_remote_handover_notice().await? {
                ctx.stop_forwarder(ChannelKind::Relay);
            }
        }

        // Coordination
        Action::CheckDeferredEvents => {
            if session.remote_stream.is_some() {
                ctx.push_followup(SessionEvent::CheckConnected);
            }
            if session.direct_channel_open_pending {
                ctx.push_followup(SessionEvent::DirectChannelOpened);
            }
        }

        // Termination
        Action::ReportProtocolViolation => {
            let reason = session
                .termination
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "protocol violation".to_string());
            warn!("Protocol violation in session {}: {}", session.session_id, reason);
            ctx.notify(CallEvent::ProtocolViolation {
                session_id: session.session_id.clone(),
                reason,
            });
        }
        Action::CloseActiveTransport => {
            let active = ctx.handover.active_kind();
            ctx.handover.close_channel(active).await?;
        }
        Action::Teardown => ctx.teardown(session).await,
    }

    Ok(())
}
