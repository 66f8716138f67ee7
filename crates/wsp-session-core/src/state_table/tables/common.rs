use crate::state_table::{
    Action, CallState, EventType, Guard, Role, StateTableBuilder, Transition,
};

/// States after the invitation went out and before the answer landed
const NEGOTIATING: &[CallState] = &[
    CallState::Invited,
    CallState::Ringing,
    CallState::OfferSent,
    CallState::OfferReceived,
];

/// Every non-terminal state past Idle
const IN_CALL: &[CallState] = &[
    CallState::Invited,
    CallState::Ringing,
    CallState::OfferSent,
    CallState::OfferReceived,
    CallState::Answered,
    CallState::Connected,
    CallState::Transferring,
    CallState::Transferred,
];

/// Add transitions that apply to both caller and callee
pub fn add_common_transitions(builder: &mut StateTableBuilder) {
    for role in Role::ALL {
        add_candidate_transitions(builder, role);
        add_media_transitions(builder, role);
        add_handover_transitions(builder, role);
        add_termination_transitions(builder, role);
    }
}

fn add_candidate_transitions(builder: &mut StateTableBuilder, role: Role) {
    // Remote candidates never change state
    builder.add_for_states(
        role,
        IN_CALL,
        EventType::CandidateReceived,
        Transition::stay(vec![Action::RouteRemoteCandidate]),
    );

    // Local candidates go out on whatever transport is active at send time
    builder.add_for_states(
        role,
        IN_CALL,
        EventType::CandidateGenerated,
        Transition::stay(vec![Action::SendLocalCandidate]),
    );
}

fn add_media_transitions(builder: &mut StateTableBuilder, role: Role) {
    for state in IN_CALL {
        if *state == CallState::Answered {
            continue;
        }
        builder.add_transition(
            role,
            *state,
            EventType::RemoteStreamAdded,
            Transition::stay(vec![Action::StoreRemoteStream]),
        );
    }

    // Answered -> Connected: peer media is flowing
    builder.add_transition(
        role,
        CallState::Answered,
        EventType::RemoteStreamAdded,
        Transition::to(CallState::Connected, vec![Action::StoreRemoteStream]),
    );

    // Answered -> Connected: stream arrived before the answer did
    builder.add_transition(
        role,
        CallState::Answered,
        EventType::CheckConnected,
        Transition::to(CallState::Connected, vec![]).guarded(Guard::HasRemoteStream),
    );
}

fn add_handover_transitions(builder: &mut StateTableBuilder, role: Role) {
    // The peer may transfer before our engine reports the channel
    builder.add_for_states(
        role,
        IN_CALL,
        EventType::DirectChannelReceived,
        Transition::stay(vec![Action::AttachDirectChannel]),
    );

    // Opened too early, replayed once Answered
    builder.add_for_states(
        role,
        NEGOTIATING,
        EventType::DirectChannelOpened,
        Transition::stay(vec![Action::RecordDirectChannelOpen]),
    );

    // Answered/Connected -> Transferring: we transfer first
    builder.add_for_states(
        role,
        &[CallState::Answered, CallState::Connected],
        EventType::DirectChannelOpened,
        Transition::to(CallState::Transferring, vec![Action::BeginHandover]),
    );

    // Answered/Connected -> Transferring: peer transferred first
    builder.add_for_states(
        role,
        &[CallState::Answered, CallState::Connected],
        EventType::HandoverNoticeReceived,
        Transition::to(CallState::Transferring, vec![Action::AcceptRemoteHandover]),
    );

    // Transferring -> Transferred: whichever half was missing
    builder.add_transition(
        role,
        CallState::Transferring,
        EventType::HandoverNoticeReceived,
        Transition::to(CallState::Transferred, vec![Action::AcceptRemoteHandover])
            .guarded(Guard::SelfHandoverDone),
    );
    builder.add_transition(
        role,
        CallState::Transferring,
        EventType::DirectChannelOpened,
        Transition::to(CallState::Transferred, vec![Action::BeginHandover])
            .guarded(Guard::RemoteHandoverObserved),
    );

    // Transferred: duplicates are no-ops
    builder.add_transition(
        role,
        CallState::Transferred,
        EventType::HandoverNoticeReceived,
        Transition::stay(vec![]),
    );
    builder.add_transition(
        role,
        CallState::Transferred,
        EventType::DirectChannelOpened,
        Transition::stay(vec![]),
    );
}

fn add_termination_transitions(builder: &mut StateTableBuilder, role: Role) {
    builder.add_wildcard(
        role,
        EventType::HangupRequested,
        Transition::to(CallState::Terminated, vec![Action::SendBye, Action::Teardown]),
    );

    builder.add_wildcard(
        role,
        EventType::ByeReceived,
        Transition::to(CallState::Terminated, vec![Action::Teardown]),
    );

    builder.add_wildcard(
        role,
        EventType::ProtocolViolation,
        Transition::to(
            CallState::Terminated,
            vec![
                Action::ReportProtocolViolation,
                Action::CloseActiveTransport,
                Action::Teardown,
            ],
        ),
    );

    for event in [
        EventType::NegotiationFailed,
        EventType::NegotiationTimeout,
        EventType::LocalFailure,
    ] {
        builder.add_wildcard(
            role,
            event,
            Transition::to(CallState::Terminated, vec![Action::SendBye, Action::Teardown]),
        );
    }

    builder.add_wildcard(
        role,
        EventType::TransportFailed,
        Transition::to(CallState::Terminated, vec![Action::Teardown]),
    );
}
