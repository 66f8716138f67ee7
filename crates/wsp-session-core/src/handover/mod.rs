//! Handover coordinator - owns the active signaling transport
//!
//! Every outbound send reads the active transport fresh from here. The only
//! writer is the handover itself: relay until the direct channel opens, then
//! direct for the rest of the call.

use arc_swap::ArcSwap;
use bytes::Bytes;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::codec::{ByeReason, Message};
use crate::errors::{Result, SessionError};
use crate::transport::{ChannelKind, SignalingTransport};

/// The transport currently selected for outbound sends
#[derive(Debug, Clone)]
pub struct ActiveChannel {
    pub kind: ChannelKind,
    pub transport: Arc<dyn SignalingTransport>,
}

/// Result of [`HandoverCoordinator::begin_handover`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoverOutcome {
    /// Notice sent on `notice_channel`, active transport is now direct
    Completed { notice_channel: ChannelKind },
    /// This side had already transferred
    AlreadyTransferred,
}

pub struct HandoverCoordinator {
    relay: Arc<dyn SignalingTransport>,
    direct: RwLock<Option<Arc<dyn SignalingTransport>>>,
    active: ArcSwap<ActiveChannel>,
    self_transferred: AtomicBool,
    remote_notice_seen: AtomicBool,
    relay_closed: AtomicBool,
    direct_closed: AtomicBool,
}

impl HandoverCoordinator {
    pub fn new(relay: Arc<dyn SignalingTransport>) -> Self {
        let active = ActiveChannel {
            kind: ChannelKind::Relay,
            transport: relay.clone(),
        };
        Self {
            relay,
            direct: RwLock::new(None),
            active: ArcSwap::from_pointee(active),
            self_transferred: AtomicBool::new(false),
            remote_notice_seen: AtomicBool::new(false),
            relay_closed: AtomicBool::new(false),
            direct_closed: AtomicBool::new(false),
        }
    }

    /// Transport for the next outbound send. Never cache the result.
    pub fn active_transport(&self) -> Arc<ActiveChannel> {
        self.active.load_full()
    }

    pub fn active_kind(&self) -> ChannelKind {
        self.active.load().kind
    }

    /// Register the direct channel. Returns false if one was already attached.
    pub fn attach_direct(&self, transport: Arc<dyn SignalingTransport>) -> bool {
        let mut slot = self.direct.write();
        if slot.is_some() {
            warn!("Direct channel already attached, ignoring the new one");
            return false;
        }
        debug!("Direct channel attached");
        *slot = Some(transport.clone());
        drop(slot);

        // Peer already moved off the relay, nothing else would swap us over
        if self.remote_notice_seen() {
            self.swap_to_direct(transport);
            info!("Direct channel attached after peer transferred, now sending on direct");
        }
        true
    }

    pub fn has_direct(&self) -> bool {
        self.direct.read().is_some()
    }

    pub fn is_self_transferred(&self) -> bool {
        self.self_transferred.load(Ordering::SeqCst)
    }

    pub fn remote_notice_seen(&self) -> bool {
        self.remote_notice_seen.load(Ordering::SeqCst)
    }

    /// Peer transferred but our direct channel has not shown up yet
    pub fn awaiting_direct(&self) -> bool {
        self.remote_notice_seen() && !self.has_direct()
    }

    pub fn is_closed(&self, kind: ChannelKind) -> bool {
        self.closed_flag(kind).load(Ordering::SeqCst)
    }

    /// Encode and send on whichever transport is active right now
    pub async fn send(&self, message: &Message) -> Result<ChannelKind> {
        let active = self.active_transport();
        debug!("Sending {} on {} channel", message.keyword, active.kind);
        active.transport.send(Bytes::from(message.encode())).await?;
        Ok(active.kind)
    }

    /// Switch from relay to direct after the direct channel opened.
    ///
    /// Sends the `bye{101}` notice once on the currently active transport,
    /// then swaps. When the relay is already gone the notice goes out on
    /// the direct channel instead.
    pub async fn begin_handover(&self) -> Result<HandoverOutcome> {
        if self
            .self_transferred
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Handover already signaled, ignoring");
            return Ok(HandoverOutcome::AlreadyTransferred);
        }

        let Some(direct) = self.direct.read().clone() else {
            self.self_transferred.store(false, Ordering::SeqCst);
            return Err(SessionError::invalid_state(
                "direct channel opened but was never attached",
            ));
        };

        let notice = Message::bye(&ByeReason::handover());
        let notice_channel = if self.is_closed(ChannelKind::Relay) {
            direct.send(Bytes::from(notice.encode())).await?;
            ChannelKind::Direct
        } else {
            let current = self.active_transport();
            current.transport.send(Bytes::from(notice.encode())).await?;
            current.kind
        };

        self.swap_to_direct(direct);
        info!("Handover signaled on {} channel, now sending on direct", notice_channel);
        Ok(HandoverOutcome::Completed { notice_channel })
    }

    /// Peer sent `bye{101}`: release the relay.
    ///
    /// Returns false when the notice was already handled.
    pub async fn on_remote_handover_notice(&self) -> Result<bool> {
        if self
            .remote_notice_seen
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Duplicate handover notice, ignoring");
            return Ok(false);
        }

        match self.direct.read().clone() {
            Some(direct) => self.swap_to_direct(direct),
            None => warn!("Peer transferred before our direct channel was attached"),
        }
        self.close_channel(ChannelKind::Relay).await?;
        info!("Peer transferred, relay channel released");
        Ok(true)
    }

    /// Record that the peer or network closed a channel
    pub fn mark_remote_closed(&self, kind: ChannelKind) {
        self.closed_flag(kind).store(true, Ordering::SeqCst);
    }

    /// Close one channel, at most once
    pub async fn close_channel(&self, kind: ChannelKind) -> Result<bool> {
        let transport = match kind {
            ChannelKind::Relay => Some(self.relay.clone()),
            ChannelKind::Direct => self.direct.read().clone(),
        };
        let Some(transport) = transport else {
            return Ok(false);
        };
        if self
            .closed_flag(kind)
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(false);
        }
        debug!("Closing {} channel", kind);
        transport.close().await?;
        Ok(true)
    }

    /// Close every channel that is still open. Errors are logged, not returned.
    pub async fn close_all(&self) -> usize {
        let mut closed = 0;
        for kind in [ChannelKind::Relay, ChannelKind::Direct] {
            match self.close_channel(kind).await {
                Ok(true) => closed += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to close {} channel: {}", kind, e),
            }
        }
        closed
    }

    fn swap_to_direct(&self, direct: Arc<dyn SignalingTransport>) {
        let current = self.active.load();
        if current.kind == ChannelKind::Direct {
            return;
        }
        self.active.store(Arc::new(ActiveChannel {
            kind: ChannelKind::Direct,
            transport: direct,
        }));
    }

    fn closed_flag(&self, kind: ChannelKind) -> &AtomicBool {
        match kind {
            ChannelKind::Relay => &self.relay_closed,
            ChannelKind::Direct => &self.direct_closed,
        }
    }
}

impl fmt::Debug for HandoverCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandoverCoordinator")
            .field("active", &self.active_kind())
            .field("has_direct", &self.has_direct())
            .field("self_transferred", &self.is_self_transferred())
            .field("remote_notice_seen", &self.remote_notice_seen())
            .field("relay_closed", &self.is_closed(ChannelKind::Relay))
            .field("direct_closed", &self.is_closed(ChannelKind::Direct))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;
    use crate::transport::{memory_pair, TransportEvent};
    use pretty_assertions::assert_eq;

    async fn next_message(events: &mut tokio::sync::mpsc::Receiver<TransportEvent>) -> Message {
        match events.recv().await {
            Some(TransportEvent::MessageReceived(bytes)) => decode(&bytes).unwrap(),
            other => panic!("expected a message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_begin_handover_twice_sends_once() {
        let (relay, mut relay_peer) = memory_pair(ChannelKind::Relay, 8);
        let (direct, _direct_peer) = memory_pair(ChannelKind::Direct, 8);
        let coordinator = HandoverCoordinator::new(relay.transport.clone());
        assert!(coordinator.attach_direct(direct.transport.clone()));

        let first = coordinator.begin_handover().await.unwrap();
        let second = coordinator.begin_handover().await.unwrap();

        assert_eq!(first, HandoverOutcome::Completed { notice_channel: ChannelKind::Relay });
        assert_eq!(second, HandoverOutcome::AlreadyTransferred);
        assert_eq!(relay.transport.sent_count(), 1);
        assert_eq!(coordinator.active_kind(), ChannelKind::Direct);

        let notice = next_message(&mut relay_peer.events).await;
        assert!(notice.is_handover_notice());
    }

    #[tokio::test]
    async fn test_sends_after_handover_use_direct() {
        let (relay, _relay_peer) = memory_pair(ChannelKind::Relay, 8);
        let (direct, mut direct_peer) = memory_pair(ChannelKind::Direct, 8);
        let coordinator = HandoverCoordinator::new(relay.transport.clone());
        coordinator.attach_direct(direct.transport.clone());

        assert_eq!(coordinator.send(&Message::ringing()).await.unwrap(), ChannelKind::Relay);
        coordinator.begin_handover().await.unwrap();
        assert_eq!(coordinator.send(&Message::ringing()).await.unwrap(), ChannelKind::Direct);

        assert_eq!(relay.transport.sent_count(), 2);
        assert_eq!(next_message(&mut direct_peer.events).await, Message::ringing());
    }

    #[tokio::test]
    async fn test_remote_notice_closes_relay_once() {
        let (relay, mut relay_peer) = memory_pair(ChannelKind::Relay, 8);
        let (direct, _direct_peer) = memory_pair(ChannelKind::Direct, 8);
        let coordinator = HandoverCoordinator::new(relay.transport.clone());
        coordinator.attach_direct(direct.transport.clone());

        assert!(coordinator.on_remote_handover_notice().await.unwrap());
        assert!(!coordinator.on_remote_handover_notice().await.unwrap());

        assert!(relay.transport.is_closed());
        assert_eq!(coordinator.active_kind(), ChannelKind::Direct);
        assert_eq!(relay_peer.events.recv().await, Some(TransportEvent::Closed));
        assert!(relay_peer.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notice_goes_direct_when_relay_already_closed() {
        let (relay, _relay_peer) = memory_pair(ChannelKind::Relay, 8);
        let (direct, mut direct_peer) = memory_pair(ChannelKind::Direct, 8);
        let coordinator = HandoverCoordinator::new(relay.transport.clone());
        coordinator.attach_direct(direct.transport.clone());

        coordinator.on_remote_handover_notice().await.unwrap();
        let outcome = coordinator.begin_handover().await.unwrap();

        assert_eq!(outcome, HandoverOutcome::Completed { notice_channel: ChannelKind::Direct });
        assert_eq!(relay.transport.sent_count(), 0);
        assert!(next_message(&mut direct_peer.events).await.is_handover_notice());
    }

    #[tokio::test]
    async fn test_direct_attached_after_remote_notice_becomes_active() {
        let (relay, _relay_peer) = memory_pair(ChannelKind::Relay, 8);
        let (direct, mut direct_peer) = memory_pair(ChannelKind::Direct, 8);
        let coordinator = HandoverCoordinator::new(relay.transport.clone());

        assert!(coordinator.on_remote_handover_notice().await.unwrap());
        assert_eq!(coordinator.active_kind(), ChannelKind::Relay);
        assert!(coordinator.awaiting_direct());

        assert!(coordinator.attach_direct(direct.transport.clone()));
        assert_eq!(coordinator.active_kind(), ChannelKind::Direct);
        assert!(!coordinator.awaiting_direct());

        assert_eq!(coordinator.send(&Message::ringing()).await.unwrap(), ChannelKind::Direct);
        assert_eq!(relay.transport.sent_count(), 0);
        assert_eq!(next_message(&mut direct_peer.events).await, Message::ringing());
    }

    #[tokio::test]
    async fn test_begin_handover_without_direct_fails() {
        let (relay, _relay_peer) = memory_pair(ChannelKind::Relay, 8);
        let coordinator = HandoverCoordinator::new(relay.transport.clone());

        assert!(coordinator.begin_handover().await.is_err());
        assert!(!coordinator.is_self_transferred());
        assert_eq!(coordinator.active_kind(), ChannelKind::Relay);
    }

    #[tokio::test]
    async fn test_close_all_is_idempotent() {
        let (relay, _relay_peer) = memory_pair(ChannelKind::Relay, 8);
        let (direct, _direct_peer) = memory_pair(ChannelKind::Direct, 8);
        let coordinator = HandoverCoordinator::new(relay.transport.clone());
        coordinator.attach_direct(direct.transport.clone());

        assert_eq!(coordinator.close_all().await, 2);
        assert_eq!(coordinator.close_all().await, 0);
        assert!(relay.transport.is_closed());
        assert!(direct.transport.is_closed());
    }
}
