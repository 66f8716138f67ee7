use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::actions::{execute_action, ActionContext};
use super::dispatch::translate_transport_event;
use super::events::SessionEvent;
use super::guards::check_guard;
use crate::api::CallEvent;
use crate::codec::ByeReason;
use crate::errors::SessionError;
use crate::session::{Session, SessionSnapshot, TerminationReason, TransitionRecord};
use crate::state_table::{Action, CallState, EventType, MasterStateTable, StateKey};

/// What happened to one event
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// Transition found and all actions ran
    Applied,
    /// Dropped before lookup: terminated session or filtered transport traffic
    Discarded,
    /// No transition for this state
    NoTransition,
    /// A guard was not satisfied
    GuardRejected,
    /// An action failed; the state did not change
    Failed(SessionError),
}

/// Result of processing an event
#[derive(Debug, Clone)]
pub struct ProcessEventResult {
    pub old_state: CallState,
    pub next_state: Option<CallState>,
    pub event: Option<EventType>,
    pub actions_executed: Vec<Action>,
    pub outcome: EventOutcome,
}

impl ProcessEventResult {
    fn skipped(old_state: CallState, event: Option<EventType>, outcome: EventOutcome) -> Self {
        Self {
            old_state,
            next_state: None,
            event,
            actions_executed: Vec::new(),
            outcome,
        }
    }
}

/// Table-driven executor for a single session.
///
/// Owned by the session's runner task. Events are handled one at a time,
/// together with any follow-up events their actions queue.
pub struct StateMachine {
    table: Arc<MasterStateTable>,
    session: Session,
    ctx: ActionContext,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl StateMachine {
    pub fn new(
        table: Arc<MasterStateTable>,
        session: Session,
        ctx: ActionContext,
        snapshot_tx: watch::Sender<SessionSnapshot>,
    ) -> Self {
        Self {
            table,
            session,
            ctx,
            snapshot_tx,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn context(&self) -> &ActionContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ActionContext {
        &mut self.ctx
    }

    pub fn is_terminated(&self) -> bool {
        self.session.call_state.is_terminal()
    }

    /// Process an event and everything it queues, then publish a snapshot
    pub async fn handle(&mut self, event: SessionEvent) -> Vec<ProcessEventResult> {
        let mut results = Vec::new();
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            results.push(self.process_event(event).await);
            // Follow-ups run before anything else queued behind them
            let mut followups = self.ctx.take_followups();
            followups.append(&mut queue);
            queue = followups;
        }

        self.publish_snapshot();
        results
    }

    /// Process a single event through the state table
    pub async fn process_event(&mut self, event: SessionEvent) -> ProcessEventResult {
        let old_state = self.session.call_state;

        let event = match event {
            SessionEvent::Transport { channel, event } => {
                match translate_transport_event(channel, event, &self.ctx.handover) {
                    Some(event) => event,
                    None => return ProcessEventResult::skipped(old_state, None, EventOutcome::Discarded),
                }
            }
            other => other,
        };
        let Some(event_type) = event.event_type() else {
            return ProcessEventResult::skipped(old_state, None, EventOutcome::Discarded);
        };

        if old_state.is_terminal() {
            debug!(
                "Session {} terminated, discarding {}",
                self.session.session_id, event_type
            );
            return ProcessEventResult::skipped(old_state, Some(event_type), EventOutcome::Discarded);
        }

        let key = StateKey {
            role: self.session.role,
            state: old_state,
            event: event_type,
        };

        let Some(transition) = self.table.get(&key).cloned() else {
            if event_type.is_wire_message() {
                let violation = SessionError::state_violation(event_type.to_string(), old_state.to_string());
                warn!("Session {}: {}", self.session.session_id, violation);
                self.ctx.notify(CallEvent::StateViolation {
                    session_id: self.session.session_id.clone(),
                    event: event_type,
                    state: old_state,
                });
            } else {
                debug!(
                    "No transition for {:?} {} in {}",
                    self.session.role, event_type, old_state
                );
            }
            return ProcessEventResult::skipped(old_state, Some(event_type), EventOutcome::NoTransition);
        };

        for guard in &transition.guards {
            if !check_guard(*guard, &self.session, &self.ctx) {
                debug!("Guard {:?} not satisfied for {} in {}", guard, event_type, old_state);
                return ProcessEventResult::skipped(
                    old_state,
                    Some(event_type),
                    EventOutcome::GuardRejected,
                );
            }
        }

        self.stage_event(event);

        let started = Instant::now();
        let mut record = TransitionRecord::new(old_state, event_type);
        let terminating = transition.next_state == Some(CallState::Terminated);
        let mut failure = None;

        for action in &transition.actions {
            match execute_action(*action, &mut self.session, &mut self.ctx).await {
                Ok(()) => record.actions_executed.push(*action),
                Err(e) if terminating => {
                    // Best effort on the way out
                    warn!("Action {:?} failed during termination: {}", action, e);
                    record.errors.push(e.to_string());
                }
                Err(e) => {
                    error!(
                        "Action {:?} failed in session {} ({} on {}): {}",
                        action, self.session.session_id, event_type, old_state, e
                    );
                    record.errors.push(e.to_string());
                    failure = Some(e);
                    break;
                }
            }
        }
        self.clear_staged();

        let actions_executed = record.actions_executed.clone();
        record.duration_ms = started.elapsed().as_millis() as u64;

        if let Some(error) = failure {
            self.session.history.record_transition(record);
            self.ctx.push_followup(SessionEvent::from_error(error.clone()));
            return ProcessEventResult {
                old_state,
                next_state: None,
                event: Some(event_type),
                actions_executed,
                outcome: EventOutcome::Failed(error),
            };
        }

        if let Some(next_state) = transition.next_state {
            if next_state != old_state {
                self.enter_state(next_state, event_type);
            }
        }
        record.to_state = transition.next_state;
        self.session.history.record_transition(record);

        ProcessEventResult {
            old_state,
            next_state: transition.next_state,
            event: Some(event_type),
            actions_executed,
            outcome: EventOutcome::Applied,
        }
    }

    fn enter_state(&mut self, next_state: CallState, event_type: EventType) {
        let old_state = self.session.call_state;
        let session_id = self.session.session_id.clone();
        self.session.transition_to(next_state);
        debug!(
            "Session {} ({}) {} -> {} on {}",
            session_id, self.session.role, old_state, next_state, event_type
        );

        self.ctx.notify(CallEvent::StateChanged {
            session_id: session_id.clone(),
            from: old_state,
            to: next_state,
        });

        match next_state {
            CallState::Transferred => {
                info!("Session {} signaling now runs on the direct channel", session_id);
                self.ctx.notify(CallEvent::HandoverCompleted { session_id });
            }
            CallState::Terminated => {
                let reason = self.session.termination.clone();
                match &reason {
                    Some(reason) => info!("Session {} terminated: {}", session_id, reason),
                    None => info!("Session {} terminated", session_id),
                }
                self.ctx.notify(CallEvent::Terminated { session_id, reason });
            }
            _ => {}
        }
        self.publish_snapshot();
    }

    /// Move the event payload onto the session for the actions to consume
    fn stage_event(&mut self, event: SessionEvent) {
        let session = &mut self.session;
        match event {
            SessionEvent::StartCall(invitation) | SessionEvent::InviteReceived(invitation) => {
                session.invitation = Some(invitation);
            }
            SessionEvent::OfferReceived(description) | SessionEvent::AnswerReceived(description) => {
                session.pending_remote_description = Some(description);
            }
            SessionEvent::OfferCreated(description) | SessionEvent::AnswerCreated(description) => {
                session.pending_local_description = Some(description);
            }
            SessionEvent::CandidateReceived(candidate) => {
                session.pending_remote_candidate = Some(candidate);
            }
            SessionEvent::CandidateGenerated(candidate) => {
                session.pending_local_candidate = Some(candidate);
            }
            SessionEvent::RemoteStreamAdded(stream) => {
                session.pending_remote_stream = Some(stream);
            }
            SessionEvent::DirectChannelReceived(endpoint) => {
                self.ctx.stage_direct_channel(endpoint);
            }
            SessionEvent::HangupRequested(reason) => {
                session.pending_bye = Some(reason.clone());
                session.set_termination(TerminationReason::LocalHangup(reason));
            }
            SessionEvent::ByeReceived(reason) => {
                session.set_termination(TerminationReason::RemoteHangup(reason));
            }
            SessionEvent::ProtocolViolation(error) => {
                session.set_termination(TerminationReason::ProtocolViolation(error.to_string()));
            }
            SessionEvent::NegotiationFailed(error) => {
                session.pending_bye = error.termination_bye();
                session.set_termination(TerminationReason::NegotiationFailure(error.to_string()));
            }
            SessionEvent::NegotiationTimeout(error) => {
                session.pending_bye = error.termination_bye();
                session.set_termination(TerminationReason::NegotiationTimeout(error.to_string()));
            }
            SessionEvent::TransportFailed(error) => {
                session.set_termination(TerminationReason::TransportFailure(error.to_string()));
            }
            SessionEvent::LocalFailure(error) => {
                session.pending_bye = Some(
                    error
                        .termination_bye()
                        .unwrap_or_else(|| ByeReason::new(500, "Internal error")),
                );
                session.set_termination(TerminationReason::LocalFailure(error.to_string()));
            }
            SessionEvent::RingingReceived
            | SessionEvent::HandoverNoticeReceived(_)
            | SessionEvent::DirectChannelOpened
            | SessionEvent::CheckConnected
            | SessionEvent::Transport { .. } => {}
        }
    }

    /// Staged payloads live for one transition only
    fn clear_staged(&mut self) {
        let session = &mut self.session;
        session.pending_local_description = None;
        session.pending_remote_description = None;
        session.pending_remote_candidate = None;
        session.pending_local_candidate = None;
        session.pending_bye = None;
        session.pending_remote_stream = None;
    }

    fn publish_snapshot(&self) {
        let snapshot = self.session.snapshot(self.ctx.handover.active_kind());
        self.snapshot_tx.send_replace(snapshot);
    }
}
