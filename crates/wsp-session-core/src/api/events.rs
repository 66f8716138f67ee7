use crate::adapters::MediaStream;
use crate::session::TerminationReason;
use crate::state_table::{CallState, EventType, SessionId};
use crate::transport::ChannelKind;

/// Notifications published to controller subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    /// The session moved to a new state
    StateChanged {
        session_id: SessionId,
        from: CallState,
        to: CallState,
    },

    /// A wire message arrived that the current state does not accept.
    /// The session keeps going.
    StateViolation {
        session_id: SessionId,
        event: EventType,
        state: CallState,
    },

    /// The peer sent something undecodable; the session is ending
    ProtocolViolation {
        session_id: SessionId,
        reason: String,
    },

    /// This side sent its handover notice
    HandoverStarted {
        session_id: SessionId,
        notice_channel: ChannelKind,
    },

    /// Both sides have moved signaling to the direct channel
    HandoverCompleted { session_id: SessionId },

    RemoteStreamAdded {
        session_id: SessionId,
        stream: MediaStream,
    },

    Terminated {
        session_id: SessionId,
        reason: Option<TerminationReason>,
    },
}

impl CallEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            CallEvent::StateChanged { session_id, .. }
            | CallEvent::StateViolation { session_id, .. }
            | CallEvent::ProtocolViolation { session_id, .. }
            | CallEvent::HandoverStarted { session_id, .. }
            | CallEvent::HandoverCompleted { session_id }
            | CallEvent::RemoteStreamAdded { session_id, .. }
            | CallEvent::Terminated { session_id, .. } => session_id,
        }
    }
}
