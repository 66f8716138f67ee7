use super::types::*;

/// Incrementally assembles a [`MasterStateTable`]
pub struct StateTableBuilder {
    table: MasterStateTable,
}

impl StateTableBuilder {
    pub fn new() -> Self {
        Self {
            table: MasterStateTable::new(),
        }
    }

    pub fn add_transition(&mut self, role: Role, state: CallState, event: EventType, transition: Transition) -> &mut Self {
        self.table.insert(StateKey { role, state, event }, transition);
        self
    }

    /// A transition with no guards or actions that only changes state
    pub fn add_state_change(&mut self, role: Role, state: CallState, event: EventType, next_state: CallState) -> &mut Self {
        self.add_transition(role, state, event, Transition::to(next_state, vec![]))
    }

    /// Same transition for several states
    pub fn add_for_states(&mut self, role: Role, states: &[CallState], event: EventType, transition: Transition) -> &mut Self {
        for state in states {
            self.add_transition(role, *state, event, transition.clone());
        }
        self
    }

    /// Applies in every non-terminal state without an exact entry
    pub fn add_wildcard(&mut self, role: Role, event: EventType, transition: Transition) -> &mut Self {
        self.table.insert_wildcard(role, event, transition);
        self
    }

    pub fn build(self) -> MasterStateTable {
        self.table
    }
}

impl Default for StateTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}
