use crate::state_table::{Action, CallState, EventType, Role, StateTableBuilder, Transition};

/// Add all callee transitions to the table
pub fn add_callee_transitions(builder: &mut StateTableBuilder) {
    // Idle -> Ringing: invite routed to us
    builder.add_transition(
        Role::Callee,
        CallState::Idle,
        EventType::InviteReceived,
        Transition::to(
            CallState::Ringing,
            vec![
                Action::SendRinging,
                Action::AcquireLocalMedia,
                Action::CreateDirectChannel,
                Action::RequestOffer,
            ],
        ),
    );

    // Ringing -> OfferSent: offer is ready
    builder.add_transition(
        Role::Callee,
        CallState::Ringing,
        EventType::OfferCreated,
        Transition::to(
            CallState::OfferSent,
            vec![Action::ApplyLocalDescription, Action::SendOffer],
        ),
    );

    // OfferSent -> Answered: apply the answer and release held candidates
    builder.add_transition(
        Role::Callee,
        CallState::OfferSent,
        EventType::AnswerReceived,
        Transition::to(
            CallState::Answered,
            vec![
                Action::ApplyRemoteDescription,
                Action::FlushCandidates,
                Action::CheckDeferredEvents,
            ],
        ),
    );
}
