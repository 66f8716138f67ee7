use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use super::history::SessionHistory;
use crate::adapters::MediaStream;
use crate::codec::{ByeReason, Candidate, Invitation, SessionDescription};
use crate::state_table::{CallState, Role, SessionId};
use crate::transport::ChannelKind;

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// We sent the bye
    LocalHangup(ByeReason),
    /// The peer sent the bye
    RemoteHangup(ByeReason),
    ProtocolViolation(String),
    NegotiationFailure(String),
    NegotiationTimeout(String),
    TransportFailure(String),
    LocalFailure(String),
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::LocalHangup(bye) => {
                write!(f, "local hangup ({} {})", bye.code, bye.description)
            }
            TerminationReason::RemoteHangup(bye) => {
                write!(f, "remote hangup ({} {})", bye.code, bye.description)
            }
            TerminationReason::ProtocolViolation(reason) => write!(f, "protocol violation: {}", reason),
            TerminationReason::NegotiationFailure(reason) => write!(f, "negotiation failure: {}", reason),
            TerminationReason::NegotiationTimeout(reason) => write!(f, "negotiation timeout: {}", reason),
            TerminationReason::TransportFailure(reason) => write!(f, "transport failure: {}", reason),
            TerminationReason::LocalFailure(reason) => write!(f, "local failure: {}", reason),
        }
    }
}

/// Point-in-time view of a session for observers
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: CallState,
    pub remote_description_applied: bool,
    pub local_description_applied: bool,
    pub active_channel: ChannelKind,
    pub termination: Option<TerminationReason>,
}

impl SessionSnapshot {
    pub fn initial() -> Self {
        Self {
            state: CallState::Idle,
            remote_description_applied: false,
            local_description_applied: false,
            active_channel: ChannelKind::Relay,
            termination: None,
        }
    }
}

/// The call session entity
#[derive(Debug)]
pub struct Session {
    pub session_id: SessionId,
    pub role: Role,
    pub call_state: CallState,
    pub invitation: Option<Invitation>,

    pub remote_description_applied: bool,
    pub local_description_applied: bool,
    pub local_description: Option<SessionDescription>,
    pub remote_description: Option<SessionDescription>,

    pub local_stream: Option<MediaStream>,
    pub remote_stream: Option<MediaStream>,

    /// Direct channel opened before the session was answered
    pub direct_channel_open_pending: bool,

    pub termination: Option<TerminationReason>,

    // Staged event payloads, consumed by actions
    pub(crate) pending_local_description: Option<SessionDescription>,
    pub(crate) pending_remote_description: Option<SessionDescription>,
    pub(crate) pending_remote_candidate: Option<Candidate>,
    pub(crate) pending_local_candidate: Option<Candidate>,
    pub(crate) pending_bye: Option<ByeReason>,
    pub(crate) pending_remote_stream: Option<MediaStream>,

    pub history: SessionHistory,
    pub created_at: Instant,
    pub entered_state_at: Instant,
}

impl Session {
    pub fn new(session_id: SessionId, role: Role, history_limit: usize) -> Self {
        let now = Instant::now();
        Self {
            session_id,
            role,
            call_state: CallState::Idle,
            invitation: None,
            remote_description_applied: false,
            local_description_applied: false,
            local_description: None,
            remote_description: None,
            local_stream: None,
            remote_stream: None,
            direct_channel_open_pending: false,
            termination: None,
            pending_local_description: None,
            pending_remote_description: None,
            pending_remote_candidate: None,
            pending_local_candidate: None,
            pending_bye: None,
            pending_remote_stream: None,
            history: SessionHistory::new(history_limit),
            created_at: now,
            entered_state_at: now,
        }
    }

    pub fn transition_to(&mut self, next: CallState) {
        self.call_state = next;
        self.entered_state_at = Instant::now();
    }

    /// Record why the session is ending. The first reason wins.
    pub fn set_termination(&mut self, reason: TerminationReason) {
        if self.termination.is_none() {
            self.termination = Some(reason);
        }
    }

    pub fn snapshot(&self, active_channel: ChannelKind) -> SessionSnapshot {
        SessionSnapshot {
            state: self.call_state,
            remote_description_applied: self.remote_description_applied,
            local_description_applied: self.local_description_applied,
            active_channel,
            termination: self.termination.clone(),
        }
    }
}
