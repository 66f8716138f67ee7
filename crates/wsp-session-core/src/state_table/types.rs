use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Session ID type
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(format!("session-{}", uuid::Uuid::new_v4()))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role in the call, fixed when the session is created
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Role {
    /// Sends the invite and answers the offer
    Caller,
    /// Receives the invite and makes the offer
    Callee,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Caller, Role::Callee];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Caller => write!(f, "caller"),
            Role::Callee => write!(f, "callee"),
        }
    }
}

/// Call states
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum CallState {
    Idle,
    Invited,
    Ringing,
    OfferSent,
    OfferReceived,
    Answered,
    Connected,
    Transferring,
    Transferred,
    Terminated,
}

impl CallState {
    pub const ALL: [CallState; 10] = [
        CallState::Idle,
        CallState::Invited,
        CallState::Ringing,
        CallState::OfferSent,
        CallState::OfferReceived,
        CallState::Answered,
        CallState::Connected,
        CallState::Transferring,
        CallState::Transferred,
        CallState::Terminated,
    ];

    /// Every state except `Terminated`
    pub const ACTIVE: [CallState; 9] = [
        CallState::Idle,
        CallState::Invited,
        CallState::Ringing,
        CallState::OfferSent,
        CallState::OfferReceived,
        CallState::Answered,
        CallState::Connected,
        CallState::Transferring,
        CallState::Transferred,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Terminated)
    }

    /// Position along the call lifecycle. Transitions never lower it.
    pub fn rank(&self) -> u8 {
        match self {
            CallState::Idle => 0,
            CallState::Invited => 1,
            CallState::Ringing => 2,
            CallState::OfferSent | CallState::OfferReceived => 3,
            CallState::Answered => 4,
            CallState::Connected => 5,
            CallState::Transferring => 6,
            CallState::Transferred => 7,
            CallState::Terminated => 8,
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Key for looking up transitions in the state table
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct StateKey {
    pub role: Role,
    pub state: CallState,
    pub event: EventType,
}

/// Event types that trigger transitions.
///
/// Payloads travel on `SessionEvent`; the table only keys on the type.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum EventType {
    // Local commands
    StartCall,
    HangupRequested,

    // Wire messages
    InviteReceived,
    RingingReceived,
    OfferReceived,
    AnswerReceived,
    CandidateReceived,
    HandoverNoticeReceived,
    ByeReceived,

    // Peer connection engine
    OfferCreated,
    AnswerCreated,
    CandidateGenerated,
    RemoteStreamAdded,
    DirectChannelReceived,
    DirectChannelOpened,

    // Internal coordination
    CheckConnected,

    // Failures
    ProtocolViolation,
    NegotiationFailed,
    NegotiationTimeout,
    TransportFailed,
    LocalFailure,
}

impl EventType {
    /// Whether this event came from a message on the wire
    pub fn is_wire_message(&self) -> bool {
        matches!(
            self,
            EventType::InviteReceived
                | EventType::RingingReceived
                | EventType::OfferReceived
                | EventType::AnswerReceived
                | EventType::CandidateReceived
                | EventType::HandoverNoticeReceived
                | EventType::ByeReceived
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Transition definition - what happens when an event occurs in a state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Conditions that must be true for this transition
    pub guards: Vec<Guard>,

    /// Actions to execute, in order
    pub actions: Vec<Action>,

    /// Next state (if changing)
    pub next_state: Option<CallState>,
}

impl Transition {
    pub fn to(next_state: CallState, actions: Vec<Action>) -> Self {
        Self {
            guards: vec![],
            actions,
            next_state: Some(next_state),
        }
    }

    pub fn stay(actions: Vec<Action>) -> Self {
        Self {
            guards: vec![],
            actions,
            next_state: None,
        }
    }

    pub fn guarded(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }
}

/// Guards that must be satisfied for a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Guard {
    /// A remote media stream has been stored
    HasRemoteStream,
    /// This side already sent its handover notice
    SelfHandoverDone,
    /// The peer's handover notice was already processed
    RemoteHandoverObserved,
}

/// Actions to execute during a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    // Media
    AcquireLocalMedia,
    StoreRemoteStream,

    // Outbound messages
    SendInvite,
    SendRinging,
    SendOffer,
    SendAnswer,
    SendLocalCandidate,
    SendBye,

    // Negotiation
    RequestOffer,
    RequestAnswer,
    ApplyLocalDescription,
    ApplyRemoteDescription,
    FlushCandidates,
    RouteRemoteCandidate,

    // Direct channel and handover
    CreateDirectChannel,
    AttachDirectChannel,
    RecordDirectChannelOpen,
    BeginHandover,
    AcceptRemoteHandover,

    // Coordination
    CheckDeferredEvents,

    // Termination
    ReportProtocolViolation,
    CloseActiveTransport,
    Teardown,
}

/// The master transition table
#[derive(Debug, Clone, Default)]
pub struct MasterStateTable {
    transitions: HashMap<StateKey, Transition>,
    /// Transitions that apply to every non-terminal state
    wildcard_transitions: HashMap<(Role, EventType), Transition>,
}

/// Type alias for external use
pub type StateTable = MasterStateTable;

impl MasterStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: StateKey, transition: Transition) {
        self.transitions.insert(key, transition);
    }

    /// Insert a wildcard transition that applies to any non-terminal state
    pub fn insert_wildcard(&mut self, role: Role, event: EventType, transition: Transition) {
        self.wildcard_transitions.insert((role, event), transition);
    }

    /// Exact match first, then the wildcard. `Terminated` has no transitions.
    pub fn get(&self, key: &StateKey) -> Option<&Transition> {
        if key.state.is_terminal() {
            return None;
        }
        self.transitions
            .get(key)
            .or_else(|| self.wildcard_transitions.get(&(key.role, key.event)))
    }

    pub fn has_transition(&self, key: &StateKey) -> bool {
        self.get(key).is_some()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len() + self.wildcard_transitions.len()
    }

    /// Collect all states referenced in this state table
    pub fn collect_used_states(&self) -> HashSet<CallState> {
        let mut states = HashSet::new();

        for (key, transition) in &self.transitions {
            states.insert(key.state);
            if let Some(next_state) = transition.next_state {
                states.insert(next_state);
            }
        }

        for transition in self.wildcard_transitions.values() {
            if let Some(next_state) = transition.next_state {
                states.insert(next_state);
            }
        }

        states
    }

    /// Check the structural invariants of the table.
    ///
    /// No transition may lower a state's rank, nothing may leave
    /// `Terminated`, and every non-terminal state each role uses must be
    /// able to reach `Terminated`.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (key, transition) in &self.transitions {
            if key.state.is_terminal() {
                errors.push(format!("Transition out of terminal state: {:?}", key));
            }
            if let Some(next) = transition.next_state {
                if next.rank() < key.state.rank() {
                    errors.push(format!(
                        "Backward transition {:?} -> {:?} on {:?} for {:?}",
                        key.state, next, key.event, key.role
                    ));
                }
            }
        }

        for role in Role::ALL {
            let reaches_terminal = self
                .wildcard_transitions
                .iter()
                .any(|((r, _), t)| *r == role && t.next_state == Some(CallState::Terminated));
            if !reaches_terminal {
                errors.push(format!("Role {:?} has no wildcard path to Terminated", role));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
