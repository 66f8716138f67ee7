//! Inbound routing: transport traffic and engine callbacks into session events

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::events::SessionEvent;
use crate::adapters::PeerConnectionEvent;
use crate::codec::{self, Keyword, Message};
use crate::errors::{Result, SessionError};
use crate::handover::HandoverCoordinator;
use crate::transport::{ChannelKind, TransportEvent};

/// Map a decoded message to its session event.
///
/// Fails with `MalformedMessage` when the content does not have the shape
/// its keyword requires.
pub fn dispatch_message(message: Message) -> Result<SessionEvent> {
    let event = match message.keyword {
        Keyword::Invite => SessionEvent::InviteReceived(message.content_as()?),
        Keyword::Ringing => SessionEvent::RingingReceived,
        Keyword::Offer => SessionEvent::OfferReceived(message.content_as()?),
        Keyword::Answer => SessionEvent::AnswerReceived(message.content_as()?),
        Keyword::IceCandidate => SessionEvent::CandidateReceived(message.content_as()?),
        Keyword::Bye => {
            let reason = message.bye_reason()?;
            if reason.is_handover() {
                SessionEvent::HandoverNoticeReceived(reason)
            } else {
                SessionEvent::ByeReceived(reason)
            }
        }
    };
    Ok(event)
}

/// Turn raw transport traffic into a session event, or `None` to drop it
pub fn translate_transport_event(
    channel: ChannelKind,
    event: TransportEvent,
    handover: &HandoverCoordinator,
) -> Option<SessionEvent> {
    match event {
        TransportEvent::Opened => match channel {
            ChannelKind::Direct => Some(SessionEvent::DirectChannelOpened),
            ChannelKind::Relay => None,
        },
        TransportEvent::MessageReceived(bytes) => {
            if handover.is_closed(channel) {
                debug!("Dropping message on closed {} channel", channel);
                return None;
            }
            trace!("Received {} bytes on {} channel", bytes.len(), channel);
            let event = codec::decode(&bytes)
                .and_then(dispatch_message)
                .unwrap_or_else(SessionEvent::ProtocolViolation);
            Some(event)
        }
        TransportEvent::Closed | TransportEvent::Error(_) => {
            if handover.is_closed(channel) {
                return None;
            }
            let reason = match event {
                TransportEvent::Error(reason) => reason,
                _ => "closed by peer".to_string(),
            };
            handover.mark_remote_closed(channel);
            if handover.active_kind() == channel {
                Some(SessionEvent::TransportFailed(SessionError::transport(channel, reason)))
            } else {
                warn!("Inactive {} channel went away: {}", channel, reason);
                None
            }
        }
    }
}

/// Pump a transport's inbound events into the session queue
pub fn spawn_transport_forwarder(
    channel: ChannelKind,
    mut events: mpsc::Receiver<TransportEvent>,
    session_tx: mpsc::UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if session_tx.send(SessionEvent::Transport { channel, event }).is_err() {
                break;
            }
        }
        debug!("{} channel forwarder finished", channel);
    })
}

/// Pump peer connection engine callbacks into the session queue
pub fn spawn_peer_connection_forwarder(
    mut events: mpsc::UnboundedReceiver<PeerConnectionEvent>,
    session_tx: mpsc::UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if session_tx.send(SessionEvent::from(event)).is_err() {
                break;
            }
        }
        debug!("Peer connection forwarder finished");
    })
}
