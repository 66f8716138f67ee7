use crate::state_table::{Action, CallState, EventType, Role, StateTableBuilder, Transition};

/// Add all caller transitions to the table
pub fn add_caller_transitions(builder: &mut StateTableBuilder) {
    // Idle -> Invited: start the call
    builder.add_transition(
        Role::Caller,
        CallState::Idle,
        EventType::StartCall,
        Transition::to(
            CallState::Invited,
            vec![Action::AcquireLocalMedia, Action::SendInvite],
        ),
    );

    // Invited -> Ringing: informational only
    builder.add_state_change(
        Role::Caller,
        CallState::Invited,
        EventType::RingingReceived,
        CallState::Ringing,
    );

    // Ringing -> OfferReceived: apply the offer, release held candidates, start the answer
    builder.add_transition(
        Role::Caller,
        CallState::Ringing,
        EventType::OfferReceived,
        Transition::to(
            CallState::OfferReceived,
            vec![
                Action::ApplyRemoteDescription,
                Action::FlushCandidates,
                Action::RequestAnswer,
            ],
        ),
    );

    // OfferReceived -> Answered: answer is ready
    builder.add_transition(
        Role::Caller,
        CallState::OfferReceived,
        EventType::AnswerCreated,
        Transition::to(
            CallState::Answered,
            vec![
                Action::ApplyLocalDescription,
                Action::SendAnswer,
                Action::CheckDeferredEvents,
            ],
        ),
    );
}
