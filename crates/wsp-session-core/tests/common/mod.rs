//! Shared helpers for the session integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Level;

use wsp_session_core::adapters::{MediaEngine, MediaStream, PeerConnectionEngine, PeerConnectionEvent};
use wsp_session_core::codec::decode;
use wsp_session_core::logging::{setup_logging, LoggingConfig};
use wsp_session_core::transport::{memory_pair, MemoryEndpoint, MemoryTransport};
use wsp_session_core::{
    CallController, CallEngines, CallParty, CallState, Candidate, ChannelEndpoint, ChannelKind,
    Invitation, Message, Result, SessionConfig, SessionDescription, SessionError, SignalingTransport,
    TransportEvent,
};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    // Only the first test in a binary gets to install it
    let _ = setup_logging(LoggingConfig::new(Level::DEBUG, "wsp-tests"));
}

pub fn test_config() -> SessionConfig {
    SessionConfig::default().with_negotiation_timeout(Duration::from_secs(2))
}

pub fn invitation() -> Invitation {
    Invitation::new(
        CallParty::new("wsp:alice@example.com").with_name("Alice"),
        CallParty::new("wsp:bob@example.com"),
    )
}

pub fn candidate(n: u32) -> Candidate {
    Candidate(json!({
        "candidate": format!("candidate:{} 1 udp 2122260223 10.0.0.{} 5000{} typ host", n, n, n),
        "sdpMid": "0",
        "sdpMLineIndex": 0
    }))
}

pub fn offer_sdp() -> SessionDescription {
    SessionDescription(json!({"type": "offer", "sdp": "v=0 mock-offer"}))
}

pub fn answer_sdp() -> SessionDescription {
    SessionDescription(json!({"type": "answer", "sdp": "v=0 mock-answer"}))
}

/// Every call the session made on the peer connection engine
#[derive(Debug, Clone, PartialEq)]
pub enum PcCall {
    CreateOffer,
    CreateAnswer,
    SetLocalDescription(SessionDescription),
    SetRemoteDescription(SessionDescription),
    AddCandidate(Candidate),
    AddLocalStream(MediaStream),
    CreateDirectChannel(String),
}

/// Scriptable peer connection engine
pub struct MockPeerConnection {
    calls: Mutex<Vec<PcCall>>,
    events: Mutex<Option<mpsc::UnboundedSender<PeerConnectionEvent>>>,
    direct_channel: Mutex<Option<ChannelEndpoint>>,
    /// Far side of a channel we made up ourselves, kept alive
    spare_direct: Mutex<Option<MemoryEndpoint>>,
    create_delay: Mutex<Option<Duration>>,
    fail_create: AtomicBool,
}

impl MockPeerConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            events: Mutex::new(None),
            direct_channel: Mutex::new(None),
            spare_direct: Mutex::new(None),
            create_delay: Mutex::new(None),
            fail_create: AtomicBool::new(false),
        })
    }

    /// Endpoint handed out by the next `create_direct_channel`
    pub fn set_direct_channel(&self, endpoint: ChannelEndpoint) {
        *self.direct_channel.lock() = Some(endpoint);
    }

    /// Slow down create-offer and create-answer
    pub fn delay_create(&self, delay: Duration) {
        *self.create_delay.lock() = Some(delay);
    }

    pub fn fail_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    /// Push an engine event into the session
    pub fn emit(&self, event: PeerConnectionEvent) {
        let sender = self.events.lock().clone();
        let sender = sender.expect("engine not attached to a session");
        sender.send(event).expect("session dropped the engine channel");
    }

    pub fn calls(&self) -> Vec<PcCall> {
        self.calls.lock().clone()
    }

    pub fn added_candidates(&self) -> Vec<Candidate> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                PcCall::AddCandidate(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, predicate: impl Fn(&PcCall) -> bool) -> Option<usize> {
        self.calls.lock().iter().position(predicate)
    }

    fn record(&self, call: PcCall) {
        self.calls.lock().push(call);
    }

    async fn create(&self, offer: bool) -> Result<SessionDescription> {
        let delay = *self.create_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(SessionError::internal("codec mismatch"));
        }
        Ok(if offer { offer_sdp() } else { answer_sdp() })
    }
}

#[async_trait]
impl PeerConnectionEngine for MockPeerConnection {
    fn attach(&self, events: mpsc::UnboundedSender<PeerConnectionEvent>) {
        *self.events.lock() = Some(events);
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.record(PcCall::CreateOffer);
        self.create(true).await
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.record(PcCall::CreateAnswer);
        self.create(false).await
    }

    async fn set_local_description(&self, description: &SessionDescription) -> Result<()> {
        self.record(PcCall::SetLocalDescription(description.clone()));
        Ok(())
    }

    async fn set_remote_description(&self, description: &SessionDescription) -> Result<()> {
        self.record(PcCall::SetRemoteDescription(description.clone()));
        Ok(())
    }

    async fn add_candidate(&self, candidate: &Candidate) -> Result<()> {
        self.record(PcCall::AddCandidate(candidate.clone()));
        Ok(())
    }

    async fn add_local_stream(&self, stream: &MediaStream) -> Result<()> {
        self.record(PcCall::AddLocalStream(stream.clone()));
        Ok(())
    }

    async fn create_direct_channel(&self, label: &str) -> Result<ChannelEndpoint> {
        self.record(PcCall::CreateDirectChannel(label.to_string()));
        if let Some(endpoint) = self.direct_channel.lock().take() {
            return Ok(endpoint);
        }
        let (ours, theirs) = memory_pair(ChannelKind::Direct, 32);
        *self.spare_direct.lock() = Some(theirs);
        Ok(ours.into())
    }
}

/// Media engine that hands out numbered local streams
pub struct MockMedia {
    next_id: AtomicUsize,
    fail_acquire: AtomicBool,
    released: Mutex<Vec<MediaStream>>,
}

impl MockMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicUsize::new(0),
            fail_acquire: AtomicBool::new(false),
            released: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_acquire(&self) {
        self.fail_acquire.store(true, Ordering::SeqCst);
    }

    pub fn released(&self) -> Vec<MediaStream> {
        self.released.lock().clone()
    }
}

#[async_trait]
impl MediaEngine for MockMedia {
    async fn acquire_local_stream(&self) -> Result<MediaStream> {
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(SessionError::media("no capture device"));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(MediaStream::local(format!("local-{}", id)))
    }

    async fn release_stream(&self, stream: &MediaStream) -> Result<()> {
        self.released.lock().push(stream.clone());
        Ok(())
    }
}

pub fn engines(pc: &Arc<MockPeerConnection>, media: &Arc<MockMedia>) -> CallEngines {
    CallEngines::new(pc.clone(), media.clone())
}

/// Next decoded message on a raw endpoint, skipping open notifications
pub async fn next_message(events: &mut mpsc::Receiver<TransportEvent>) -> Message {
    loop {
        let event = tokio::time::timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("channel dropped");
        match event {
            TransportEvent::MessageReceived(bytes) => return decode(&bytes).expect("undecodable message"),
            TransportEvent::Opened => continue,
            other => panic!("expected a message, got {:?}", other),
        }
    }
}

/// Next raw event on an endpoint
pub async fn next_event(events: &mut mpsc::Receiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for a transport event")
        .expect("channel dropped")
}

pub async fn send_raw(transport: &MemoryTransport, wire: &str) {
    transport
        .send(Bytes::from(wire.to_string()))
        .await
        .expect("send failed");
}

pub async fn send_message(transport: &MemoryTransport, message: &Message) {
    send_raw(transport, &message.encode()).await;
}

/// Poll `condition` until it holds or the wait runs out
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_for(controller: &CallController, state: CallState) {
    let reached = tokio::time::timeout(WAIT, controller.wait_for_state(state))
        .await
        .expect("timed out waiting for state");
    assert!(reached.is_ok(), "session ended before {}: {:?}", state, reached);
}

/// One end of a test call
pub struct Party {
    pub controller: CallController,
    pub pc: Arc<MockPeerConnection>,
    pub media: Arc<MockMedia>,
}

/// Caller placed on a raw relay endpoint the test drives by hand
pub struct CallerUnderTest {
    pub party: Party,
    pub remote: MemoryEndpoint,
}

pub async fn start_caller(config: SessionConfig) -> CallerUnderTest {
    let (local, mut remote) = memory_pair(ChannelKind::Relay, 64);
    let pc = MockPeerConnection::new();
    let media = MockMedia::new();
    let controller = CallController::start_call(config, engines(&pc, &media), invitation(), local.into())
        .await
        .expect("start_call failed");

    let invite = next_message(&mut remote.events).await;
    assert_eq!(invite, Message::invite(&invitation()));

    CallerUnderTest {
        party: Party { controller, pc, media },
        remote,
    }
}

/// Callee answering an invitation, with the test playing the caller
pub struct CalleeUnderTest {
    pub party: Party,
    pub remote: MemoryEndpoint,
}

pub async fn start_callee(config: SessionConfig, pc: Arc<MockPeerConnection>) -> CalleeUnderTest {
    let (local, remote) = memory_pair(ChannelKind::Relay, 64);
    let media = MockMedia::new();
    let controller = CallController::accept_invite(config, engines(&pc, &media), invitation(), local.into())
        .await
        .expect("accept_invite failed");

    CalleeUnderTest {
        party: Party { controller, pc, media },
        remote,
    }
}

/// Two real sessions wired back to back over a relay and a direct pair
pub struct TwoPartyCall {
    pub caller: Party,
    pub callee: Party,
    /// The caller's end of the direct channel, until delivered
    caller_direct: Option<ChannelEndpoint>,
    direct: Arc<MemoryTransport>,
}

impl TwoPartyCall {
    pub async fn start(config: SessionConfig) -> Self {
        let (relay_caller, relay_callee) = memory_pair(ChannelKind::Relay, 64);
        let (direct_caller, direct_callee) = memory_pair(ChannelKind::Direct, 64);
        let direct = direct_caller.transport.clone();

        let caller_pc = MockPeerConnection::new();
        let caller_media = MockMedia::new();
        let caller = CallController::start_call(
            config.clone(),
            engines(&caller_pc, &caller_media),
            invitation(),
            relay_caller.into(),
        )
        .await
        .expect("start_call failed");

        // The callee only exists once the invite arrives
        let MemoryEndpoint { transport, mut events } = relay_callee;
        let invite = next_message(&mut events).await;
        let offered: Invitation = invite.content_as().expect("invite content");

        let callee_pc = MockPeerConnection::new();
        callee_pc.set_direct_channel(direct_callee.into());
        let callee_media = MockMedia::new();
        let callee = CallController::accept_invite(
            config,
            engines(&callee_pc, &callee_media),
            offered,
            ChannelEndpoint::new(transport, events),
        )
        .await
        .expect("accept_invite failed");

        Self {
            caller: Party {
                controller: caller,
                pc: caller_pc,
                media: caller_media,
            },
            callee: Party {
                controller: callee,
                pc: callee_pc,
                media: callee_media,
            },
            caller_direct: Some(direct_caller.into()),
            direct,
        }
    }

    /// The caller's engine reports the channel the callee opened
    pub fn deliver_direct_channel(&mut self) {
        let endpoint = self.caller_direct.take().expect("direct channel already delivered");
        self.caller
            .pc
            .emit(PeerConnectionEvent::DirectChannelReceived(endpoint));
    }

    /// Both ends of the direct channel report open
    pub async fn open_direct(&self) {
        self.direct.signal_open().await;
    }

    pub fn add_remote_streams(&self) {
        self.caller
            .pc
            .emit(PeerConnectionEvent::RemoteStreamAdded(MediaStream::remote("callee-media")));
        self.callee
            .pc
            .emit(PeerConnectionEvent::RemoteStreamAdded(MediaStream::remote("caller-media")));
    }
}
