//! End-to-end calls between two sessions over in-memory channels

mod common;

use common::*;
use pretty_assertions::assert_eq;
use wsp_session_core::adapters::PeerConnectionEvent;
use wsp_session_core::transport::memory_pair;
use wsp_session_core::{
    ByeReason, CallEvent, CallState, ChannelKind, Keyword, Message, TerminationReason, TransportEvent,
};

#[tokio::test]
async fn test_call_reaches_transferred_and_hangs_up() {
    init_tracing();
    let mut call = TwoPartyCall::start(test_config()).await;
    let mut caller_events = call.caller.controller.subscribe();

    wait_for(&call.caller.controller, CallState::Answered).await;
    wait_for(&call.callee.controller, CallState::Answered).await;

    let caller_snapshot = call.caller.controller.snapshot();
    assert!(caller_snapshot.remote_description_applied);
    assert!(caller_snapshot.local_description_applied);
    assert_eq!(caller_snapshot.active_channel, ChannelKind::Relay);

    call.add_remote_streams();
    wait_for(&call.caller.controller, CallState::Connected).await;
    wait_for(&call.callee.controller, CallState::Connected).await;

    call.deliver_direct_channel();
    call.open_direct().await;

    wait_for(&call.caller.controller, CallState::Transferred).await;
    wait_for(&call.callee.controller, CallState::Transferred).await;
    assert_eq!(call.caller.controller.snapshot().active_channel, ChannelKind::Direct);
    assert_eq!(call.callee.controller.snapshot().active_channel, ChannelKind::Direct);

    call.caller.controller.end_call(200, "User ended call normally").await.unwrap();
    assert_eq!(call.caller.controller.state(), CallState::Terminated);

    let callee_reason = tokio::time::timeout(WAIT, call.callee.controller.wait_terminated())
        .await
        .unwrap();
    assert_eq!(
        callee_reason,
        Some(TerminationReason::RemoteHangup(ByeReason::normal_hangup()))
    );
    assert_eq!(
        call.caller.controller.snapshot().termination,
        Some(TerminationReason::LocalHangup(ByeReason::normal_hangup()))
    );

    // Local and remote stream, each released once
    assert_eq!(call.caller.media.released().len(), 2);
    assert_eq!(call.callee.media.released().len(), 2);

    let mut saw_handover = false;
    while let Ok(event) = caller_events.try_recv() {
        if matches!(event, CallEvent::HandoverCompleted { .. }) {
            saw_handover = true;
        }
    }
    assert!(saw_handover);
}

#[tokio::test]
async fn test_negotiation_order() {
    let call = TwoPartyCall::start(test_config()).await;
    wait_for(&call.caller.controller, CallState::Answered).await;
    wait_for(&call.callee.controller, CallState::Answered).await;

    let callee_calls = call.callee.pc.calls();
    assert_eq!(callee_calls[0], PcCall::AddLocalStream(wsp_session_core::MediaStream::local("local-0")));
    assert_eq!(callee_calls[1], PcCall::CreateDirectChannel("wsp".to_string()));
    assert_eq!(callee_calls[2], PcCall::CreateOffer);
    assert_eq!(callee_calls[3], PcCall::SetLocalDescription(offer_sdp()));
    assert_eq!(callee_calls[4], PcCall::SetRemoteDescription(answer_sdp()));

    let caller_calls = call.caller.pc.calls();
    let remote = caller_calls
        .iter()
        .position(|c| *c == PcCall::SetRemoteDescription(offer_sdp()))
        .unwrap();
    let create = caller_calls.iter().position(|c| *c == PcCall::CreateAnswer).unwrap();
    let local = caller_calls
        .iter()
        .position(|c| *c == PcCall::SetLocalDescription(answer_sdp()))
        .unwrap();
    assert!(remote < create && create < local);

    call.caller.controller.hangup().await.unwrap();
}

#[tokio::test]
async fn test_stream_before_answer_connects_on_answer() {
    let call = TwoPartyCall::start(test_config()).await;
    wait_for(&call.callee.controller, CallState::OfferSent).await;

    // Callee media shows up while it still waits for the answer
    call.callee
        .pc
        .emit(PeerConnectionEvent::RemoteStreamAdded(wsp_session_core::MediaStream::remote("early")));

    wait_for(&call.callee.controller, CallState::Connected).await;
    call.callee.controller.hangup().await.unwrap();
}

#[tokio::test]
async fn test_early_direct_open_is_replayed_after_answer() {
    let mut call = TwoPartyCall::start(test_config()).await;
    wait_for(&call.callee.controller, CallState::Ringing).await;

    // Direct channel comes up before anyone answered
    call.deliver_direct_channel();
    call.open_direct().await;

    wait_for(&call.caller.controller, CallState::Transferred).await;
    wait_for(&call.callee.controller, CallState::Transferred).await;

    call.callee.controller.hangup().await.unwrap();
    let reason = tokio::time::timeout(WAIT, call.caller.controller.wait_terminated())
        .await
        .unwrap();
    assert!(matches!(reason, Some(TerminationReason::RemoteHangup(bye)) if bye.code == 200));
}

#[tokio::test]
async fn test_local_candidates_follow_the_active_transport() {
    let mut call = TwoPartyCall::start(test_config()).await;
    wait_for(&call.caller.controller, CallState::Answered).await;
    wait_for(&call.callee.controller, CallState::Answered).await;

    // Over the relay
    call.callee.pc.emit(PeerConnectionEvent::CandidateGenerated(candidate(1)));
    let caller_pc = call.caller.pc.clone();
    wait_until(|| caller_pc.added_candidates().len() == 1).await;

    call.deliver_direct_channel();
    call.open_direct().await;
    wait_for(&call.caller.controller, CallState::Transferred).await;
    wait_for(&call.callee.controller, CallState::Transferred).await;

    // The relay is gone on both sides now, so this can only go direct
    call.callee.pc.emit(PeerConnectionEvent::CandidateGenerated(candidate(2)));
    wait_until(|| caller_pc.added_candidates().len() == 2).await;
    assert_eq!(caller_pc.added_candidates(), vec![candidate(1), candidate(2)]);

    call.caller.controller.hangup().await.unwrap();
}

#[tokio::test]
async fn test_peer_transfers_before_direct_channel_arrives() {
    let CallerUnderTest { party, mut remote } = start_caller(test_config()).await;

    send_message(&remote.transport, &Message::ringing()).await;
    send_message(&remote.transport, &Message::offer(&offer_sdp())).await;
    assert_eq!(next_message(&mut remote.events).await.keyword, Keyword::Answer);
    wait_for(&party.controller, CallState::Answered).await;

    // Peer's notice beats our engine's channel event
    send_message(&remote.transport, &Message::bye(&ByeReason::handover())).await;
    wait_for(&party.controller, CallState::Transferring).await;
    assert_eq!(next_event(&mut remote.events).await, TransportEvent::Closed);

    // Nowhere to send this one yet
    party.pc.emit(PeerConnectionEvent::CandidateGenerated(candidate(1)));

    let (ours, mut theirs) = memory_pair(ChannelKind::Direct, 32);
    party.pc.emit(PeerConnectionEvent::DirectChannelReceived(ours.into()));
    let controller = &party.controller;
    wait_until(|| controller.snapshot().active_channel == ChannelKind::Direct).await;

    theirs.transport.signal_open().await;
    wait_for(&party.controller, CallState::Transferred).await;
    assert!(next_message(&mut theirs.events).await.is_handover_notice());

    party.pc.emit(PeerConnectionEvent::CandidateGenerated(candidate(2)));
    assert_eq!(next_message(&mut theirs.events).await, Message::ice_candidate(&candidate(2)));
    assert!(!party.controller.state().is_terminal());

    party.controller.hangup().await.unwrap();
    let bye = next_message(&mut theirs.events).await;
    assert_eq!(bye.bye_reason().unwrap(), ByeReason::normal_hangup());
    assert_eq!(
        party.controller.snapshot().termination,
        Some(TerminationReason::LocalHangup(ByeReason::normal_hangup()))
    );

    // Relay saw nothing after the close
    assert!(remote.events.try_recv().is_err());
}
