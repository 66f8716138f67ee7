//! Signaling transport abstractions
//!
//! A session talks to its peer over two channels: the server-mediated relay
//! and, once connectivity is established, the direct peer channel. Both are
//! driven through [`SignalingTransport`]; inbound traffic arrives as
//! [`TransportEvent`]s on the receiver paired with the transport.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::errors::Result;

pub mod memory;

pub use memory::{memory_pair, MemoryEndpoint, MemoryTransport};

/// Which of the two signaling channels a transport is
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Server-mediated channel (e.g. the WSP socket)
    Relay,
    /// Peer-mediated channel (e.g. the `wsp` data channel)
    Direct,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Relay => write!(f, "relay"),
            ChannelKind::Direct => write!(f, "direct"),
        }
    }
}

/// Events surfaced by a transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Channel became usable (direct channels only)
    Opened,
    /// Wire bytes from the peer
    MessageReceived(Bytes),
    /// Channel was closed by the peer or the network
    Closed,
    /// Channel failed
    Error(String),
}

/// Outbound half of a signaling channel
#[async_trait]
pub trait SignalingTransport: Send + Sync + fmt::Debug {
    /// Which channel this is
    fn kind(&self) -> ChannelKind;

    /// Send wire bytes to the peer
    async fn send(&self, payload: Bytes) -> Result<()>;

    /// Close the channel
    async fn close(&self) -> Result<()>;
}

/// A transport together with the receiver for its inbound events
pub struct ChannelEndpoint {
    pub transport: Arc<dyn SignalingTransport>,
    pub events: mpsc::Receiver<TransportEvent>,
}

impl ChannelEndpoint {
    pub fn new(transport: Arc<dyn SignalingTransport>, events: mpsc::Receiver<TransportEvent>) -> Self {
        Self { transport, events }
    }

    pub fn kind(&self) -> ChannelKind {
        self.transport.kind()
    }
}

impl fmt::Debug for ChannelEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelEndpoint")
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}
