use std::collections::VecDeque;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::state_table::{Action, CallState, EventType};

/// One processed event
#[derive(Debug, Clone)]
pub struct TransitionRecord {
    pub timestamp: Instant,
    pub timestamp_ms: u64,
    /// Set by [`SessionHistory::record_transition`]
    pub sequence: u64,
    pub from_state: CallState,
    pub event: EventType,
    pub to_state: Option<CallState>,
    pub actions_executed: Vec<Action>,
    pub duration_ms: u64,
    pub errors: Vec<String>,
}

impl TransitionRecord {
    pub fn new(from_state: CallState, event: EventType) -> Self {
        Self {
            timestamp: Instant::now(),
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            sequence: 0,
            from_state,
            event,
            to_state: None,
            actions_executed: vec![],
            duration_ms: 0,
            errors: vec![],
        }
    }
}

/// Ring buffer of recent transitions
#[derive(Debug, Clone)]
pub struct SessionHistory {
    max_transitions: usize,
    transitions: VecDeque<TransitionRecord>,
    pub total_transitions: u64,
    pub total_errors: u64,
}

impl SessionHistory {
    pub fn new(max_transitions: usize) -> Self {
        Self {
            max_transitions,
            transitions: VecDeque::with_capacity(max_transitions.min(64)),
            total_transitions: 0,
            total_errors: 0,
        }
    }

    pub fn record_transition(&mut self, mut record: TransitionRecord) {
        record.sequence = self.total_transitions;
        self.total_transitions += 1;
        if !record.errors.is_empty() {
            self.total_errors += 1;
        }
        if self.max_transitions == 0 {
            return;
        }
        if self.transitions.len() == self.max_transitions {
            self.transitions.pop_front();
        }
        self.transitions.push_back(record);
    }

    /// Most recent first
    pub fn get_recent(&self, count: usize) -> Vec<TransitionRecord> {
        self.transitions.iter().rev().take(count).cloned().collect()
    }

    pub fn get_errors(&self) -> Vec<TransitionRecord> {
        self.transitions
            .iter()
            .filter(|r| !r.errors.is_empty())
            .cloned()
            .collect()
    }

    /// States visited, oldest first
    pub fn state_path(&self) -> Vec<CallState> {
        let mut path = Vec::new();
        for record in &self.transitions {
            if path.is_empty() {
                path.push(record.from_state);
            }
            if let Some(to) = record.to_state {
                if path.last() != Some(&to) {
                    path.push(to);
                }
            }
        }
        path
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }
}
