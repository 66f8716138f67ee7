//! Error types for the WSP session core

use thiserror::Error;

use crate::adapters::NegotiationStep;
use crate::codec::ByeReason;
use crate::transport::ChannelKind;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while driving a signaling session
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// Wire form violates the codec contract, or a payload has the wrong shape
    #[error("Malformed message: {reason}")]
    MalformedMessage { reason: String },

    /// Peer broke the protocol in a way that ends the session
    #[error("Protocol violation: {reason}")]
    ProtocolViolation { reason: String },

    /// Structurally valid message arriving in a state that does not expect it
    #[error("Event {event} not expected in state {state}")]
    StateViolation { event: String, state: String },

    /// A peer connection engine call rejected
    #[error("Negotiation failed during {step}: {reason}")]
    NegotiationFailure { step: NegotiationStep, reason: String },

    /// A peer connection engine call did not resolve before the deadline
    #[error("Negotiation step {step} timed out after {timeout_ms}ms")]
    NegotiationTimeout { step: NegotiationStep, timeout_ms: u64 },

    /// Send or receive failed on a transport
    #[error("Transport failure on {channel} channel: {reason}")]
    TransportFailure { channel: ChannelKind, reason: String },

    /// Media engine could not provide or release a stream
    #[error("Media failure: {reason}")]
    MediaFailure { reason: String },

    /// Operation not allowed right now
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SessionError {
    /// Create a malformed message error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage { reason: reason.into() }
    }

    /// Create a protocol violation error
    pub fn protocol_violation(reason: impl Into<String>) -> Self {
        Self::ProtocolViolation { reason: reason.into() }
    }

    /// Create a state violation error
    pub fn state_violation(event: impl Into<String>, state: impl Into<String>) -> Self {
        Self::StateViolation {
            event: event.into(),
            state: state.into(),
        }
    }

    /// Create a negotiation failure error
    pub fn negotiation(step: NegotiationStep, reason: impl Into<String>) -> Self {
        Self::NegotiationFailure {
            step,
            reason: reason.into(),
        }
    }

    /// Create a negotiation timeout error
    pub fn negotiation_timeout(step: NegotiationStep, timeout_ms: u64) -> Self {
        Self::NegotiationTimeout { step, timeout_ms }
    }

    /// Create a transport failure error
    pub fn transport(channel: ChannelKind, reason: impl Into<String>) -> Self {
        Self::TransportFailure {
            channel,
            reason: reason.into(),
        }
    }

    /// Create a media failure error
    pub fn media(reason: impl Into<String>) -> Self {
        Self::MediaFailure { reason: reason.into() }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState { message: message.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Whether this error ends the session
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::StateViolation { .. } | Self::InvalidState { .. } | Self::Configuration { .. }
        )
    }

    /// Bye sent to the peer when this error terminates the session.
    ///
    /// Protocol and transport failures close the channel without a bye.
    pub fn termination_bye(&self) -> Option<ByeReason> {
        match self {
            Self::NegotiationFailure { step, .. } => {
                Some(ByeReason::new(500, format!("Negotiation failed during {}", step)))
            }
            Self::NegotiationTimeout { .. } => Some(ByeReason::new(408, "Negotiation timed out")),
            Self::MediaFailure { .. } => Some(ByeReason::new(500, "Media unavailable")),
            Self::Internal { .. } => Some(ByeReason::new(500, "Internal error")),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err.to_string())
    }
}
