use crate::adapters::{MediaStream, PeerConnectionEvent};
use crate::codec::{ByeReason, Candidate, Invitation, SessionDescription};
use crate::errors::SessionError;
use crate::state_table::EventType;
use crate::transport::{ChannelEndpoint, ChannelKind, TransportEvent};

/// Everything that can happen to a session, with its payload
#[derive(Debug)]
pub enum SessionEvent {
    // Local commands
    StartCall(Invitation),
    HangupRequested(ByeReason),

    // Wire messages
    InviteReceived(Invitation),
    RingingReceived,
    OfferReceived(SessionDescription),
    AnswerReceived(SessionDescription),
    CandidateReceived(Candidate),
    HandoverNoticeReceived(ByeReason),
    ByeReceived(ByeReason),

    // Peer connection engine
    OfferCreated(SessionDescription),
    AnswerCreated(SessionDescription),
    CandidateGenerated(Candidate),
    RemoteStreamAdded(MediaStream),
    DirectChannelReceived(ChannelEndpoint),
    DirectChannelOpened,

    // Internal coordination
    CheckConnected,

    /// Raw transport traffic, translated before table lookup
    Transport { channel: ChannelKind, event: TransportEvent },

    // Failures
    ProtocolViolation(SessionError),
    NegotiationFailed(SessionError),
    NegotiationTimeout(SessionError),
    TransportFailed(SessionError),
    LocalFailure(SessionError),
}

impl SessionEvent {
    /// Table key for this event; raw transport traffic has none
    pub fn event_type(&self) -> Option<EventType> {
        let event_type = match self {
            SessionEvent::StartCall(_) => EventType::StartCall,
            SessionEvent::HangupRequested(_) => EventType::HangupRequested,
            SessionEvent::InviteReceived(_) => EventType::InviteReceived,
            SessionEvent::RingingReceived => EventType::RingingReceived,
            SessionEvent::OfferReceived(_) => EventType::OfferReceived,
            SessionEvent::AnswerReceived(_) => EventType::AnswerReceived,
            SessionEvent::CandidateReceived(_) => EventType::CandidateReceived,
            SessionEvent::HandoverNoticeReceived(_) => EventType::HandoverNoticeReceived,
            SessionEvent::ByeReceived(_) => EventType::ByeReceived,
            SessionEvent::OfferCreated(_) => EventType::OfferCreated,
            SessionEvent::AnswerCreated(_) => EventType::AnswerCreated,
            SessionEvent::CandidateGenerated(_) => EventType::CandidateGenerated,
            SessionEvent::RemoteStreamAdded(_) => EventType::RemoteStreamAdded,
            SessionEvent::DirectChannelReceived(_) => EventType::DirectChannelReceived,
            SessionEvent::DirectChannelOpened => EventType::DirectChannelOpened,
            SessionEvent::CheckConnected => EventType::CheckConnected,
            SessionEvent::Transport { .. } => return None,
            SessionEvent::ProtocolViolation(_) => EventType::ProtocolViolation,
            SessionEvent::NegotiationFailed(_) => EventType::NegotiationFailed,
            SessionEvent::NegotiationTimeout(_) => EventType::NegotiationTimeout,
            SessionEvent::TransportFailed(_) => EventType::TransportFailed,
            SessionEvent::LocalFailure(_) => EventType::LocalFailure,
        };
        Some(event_type)
    }

    /// The fatal event a failed action turns into
    pub fn from_error(error: SessionError) -> Self {
        match error {
            SessionError::MalformedMessage { .. } | SessionError::ProtocolViolation { .. } => {
                SessionEvent::ProtocolViolation(error)
            }
            SessionError::NegotiationFailure { .. } => SessionEvent::NegotiationFailed(error),
            SessionError::NegotiationTimeout { .. } => SessionEvent::NegotiationTimeout(error),
            SessionError::TransportFailure { .. } => SessionEvent::TransportFailed(error),
            _ => SessionEvent::LocalFailure(error),
        }
    }
}

impl From<PeerConnectionEvent> for SessionEvent {
    fn from(event: PeerConnectionEvent) -> Self {
        match event {
            PeerConnectionEvent::CandidateGenerated(candidate) => SessionEvent::CandidateGenerated(candidate),
            PeerConnectionEvent::RemoteStreamAdded(stream) => SessionEvent::RemoteStreamAdded(stream),
            PeerConnectionEvent::DirectChannelReceived(endpoint) => {
                SessionEvent::DirectChannelReceived(endpoint)
            }
        }
    }
}
