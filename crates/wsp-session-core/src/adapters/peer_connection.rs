//! Peer connection engine contract
//!
//! The engine owns offer/answer generation and connectivity probing. The
//! session core only sequences its four negotiation calls and relays the
//! events it emits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

use super::media::MediaStream;
use crate::codec::{Candidate, SessionDescription};
use crate::errors::Result;
use crate::transport::ChannelEndpoint;

/// The four suspension points of offer/answer negotiation
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum NegotiationStep {
    CreateOffer,
    CreateAnswer,
    SetLocalDescription,
    SetRemoteDescription,
}

impl fmt::Display for NegotiationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationStep::CreateOffer => write!(f, "create-offer"),
            NegotiationStep::CreateAnswer => write!(f, "create-answer"),
            NegotiationStep::SetLocalDescription => write!(f, "set-local-description"),
            NegotiationStep::SetRemoteDescription => write!(f, "set-remote-description"),
        }
    }
}

/// Events the engine reports back to the session
#[derive(Debug)]
pub enum PeerConnectionEvent {
    /// A local connectivity candidate to trickle to the peer
    CandidateGenerated(Candidate),
    /// The peer's media stream arrived
    RemoteStreamAdded(MediaStream),
    /// The peer opened the direct signaling channel
    DirectChannelReceived(ChannelEndpoint),
}

#[async_trait]
pub trait PeerConnectionEngine: Send + Sync {
    /// Hand the engine the sender its events should go to
    fn attach(&self, events: mpsc::UnboundedSender<PeerConnectionEvent>);

    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, description: &SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, description: &SessionDescription) -> Result<()>;

    /// Add a remote connectivity candidate
    async fn add_candidate(&self, candidate: &Candidate) -> Result<()>;

    /// Attach the local media stream before negotiating
    async fn add_local_stream(&self, stream: &MediaStream) -> Result<()>;

    /// Create the direct signaling channel with the given label
    async fn create_direct_channel(&self, label: &str) -> Result<ChannelEndpoint>;
}
