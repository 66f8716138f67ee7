//! WSP signaling session core
//!
//! Drives a two-party call over the WSP signaling protocol: invitation, ringing,
//! offer/answer negotiation, connectivity candidates and termination. Once the
//! direct peer channel opens, signaling moves off the relay onto that channel.
//!
//! The call lifecycle is a role-keyed state table ([`state_table::MASTER_TABLE`])
//! executed by [`state_machine::StateMachine`]. Applications use
//! [`api::CallController`] and plug in their own [`adapters::PeerConnectionEngine`],
//! [`adapters::MediaEngine`] and relay [`transport::SignalingTransport`].

pub mod adapters;
pub mod api;
pub mod candidate_buffer;
pub mod codec;
pub mod config;
pub mod errors;
pub mod handover;
pub mod logging;
pub mod session;
pub mod state_machine;
pub mod state_table;
pub mod transport;

// Re-export commonly used types
pub use adapters::{MediaEngine, MediaStream, PeerConnectionEngine, PeerConnectionEvent};
pub use api::{CallController, CallEngines, CallEvent};
pub use codec::{ByeReason, CallParty, Candidate, Invitation, Keyword, Message, SessionDescription};
pub use config::SessionConfig;
pub use errors::{Result, SessionError};
pub use session::{SessionSnapshot, TerminationReason};
pub use state_table::{CallState, EventType, Role, SessionId};
pub use transport::{ChannelEndpoint, ChannelKind, SignalingTransport, TransportEvent};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        ByeReason, CallController, CallEngines, CallEvent, CallParty, CallState, Candidate,
        ChannelEndpoint, ChannelKind, Invitation, MediaEngine, MediaStream, Message,
        PeerConnectionEngine, PeerConnectionEvent, Result, Role, SessionConfig, SessionDescription,
        SessionError, SessionSnapshot, SignalingTransport, TerminationReason, TransportEvent,
    };
}
