//! In-process transport pair
//!
//! Two endpoints wired back to back over tokio channels. Used for loopback
//! calls and tests; behaves like a real channel in that sends fail once
//! either side has closed.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{ChannelEndpoint, ChannelKind, SignalingTransport, TransportEvent};
use crate::errors::{Result, SessionError};

#[derive(Debug)]
pub struct MemoryTransport {
    kind: ChannelKind,
    /// Inbound queue of the other side
    peer_tx: mpsc::Sender<TransportEvent>,
    /// Our own inbound queue, for local notifications
    local_tx: mpsc::Sender<TransportEvent>,
    closed: Arc<AtomicBool>,
    peer_closed: Arc<AtomicBool>,
    sent: AtomicUsize,
}

/// One side of a memory pair
pub struct MemoryEndpoint {
    pub transport: Arc<MemoryTransport>,
    pub events: mpsc::Receiver<TransportEvent>,
}

impl From<MemoryEndpoint> for ChannelEndpoint {
    fn from(endpoint: MemoryEndpoint) -> Self {
        ChannelEndpoint::new(endpoint.transport, endpoint.events)
    }
}

/// Create two connected endpoints of the given kind
pub fn memory_pair(kind: ChannelKind, capacity: usize) -> (MemoryEndpoint, MemoryEndpoint) {
    let (a_tx, a_rx) = mpsc::channel(capacity.max(1));
    let (b_tx, b_rx) = mpsc::channel(capacity.max(1));
    let a_flag = Arc::new(AtomicBool::new(false));
    let b_flag = Arc::new(AtomicBool::new(false));

    let a = MemoryTransport {
        kind,
        peer_tx: b_tx.clone(),
        local_tx: a_tx.clone(),
        closed: a_flag.clone(),
        peer_closed: b_flag.clone(),
        sent: AtomicUsize::new(0),
    };
    let b = MemoryTransport {
        kind,
        peer_tx: a_tx,
        local_tx: b_tx,
        closed: b_flag,
        peer_closed: a_flag,
        sent: AtomicUsize::new(0),
    };

    (
        MemoryEndpoint { transport: Arc::new(a), events: a_rx },
        MemoryEndpoint { transport: Arc::new(b), events: b_rx },
    )
}

impl MemoryTransport {
    /// Announce the channel as open to both sides
    pub async fn signal_open(&self) {
        let _ = self.local_tx.send(TransportEvent::Opened).await;
        let _ = self.peer_tx.send(TransportEvent::Opened).await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Messages successfully handed to the peer
    pub fn sent_count(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalingTransport for MemoryTransport {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(&self, payload: Bytes) -> Result<()> {
        if self.is_closed() {
            return Err(SessionError::transport(self.kind, "channel closed"));
        }
        if self.peer_closed.load(Ordering::SeqCst) {
            return Err(SessionError::transport(self.kind, "peer closed the channel"));
        }
        trace!("{} memory transport sending {} bytes", self.kind, payload.len());
        self.peer_tx
            .send(TransportEvent::MessageReceived(payload))
            .await
            .map_err(|_| SessionError::transport(self.kind, "peer receiver dropped"))?;
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!("{} memory transport closed", self.kind);
        let _ = self.peer_tx.try_send(TransportEvent::Closed);
        Ok(())
    }
}
