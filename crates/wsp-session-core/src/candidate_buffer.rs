//! Buffering of remote connectivity candidates
//!
//! Candidates can arrive before the remote description has been applied.
//! They are held here in arrival order and handed back exactly once when the
//! description lands. The buffer does no I/O; the state machine forwards what
//! it returns to the peer connection engine.

use std::collections::VecDeque;

use crate::codec::Candidate;

/// What to do with an offered candidate
#[derive(Debug, Clone, PartialEq)]
pub enum BufferDecision {
    /// Remote description already applied, forward now
    Forward(Candidate),
    /// Held until the remote description is applied
    Buffered,
    /// Session is over, drop it
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BufferState {
    Buffering,
    Flushed,
    Discarded,
}

#[derive(Debug)]
pub struct CandidateBuffer {
    pending: VecDeque<Candidate>,
    state: BufferState,
    received_total: u64,
}

impl CandidateBuffer {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            state: BufferState::Buffering,
            received_total: 0,
        }
    }

    /// Offer a remote candidate
    pub fn offer(&mut self, candidate: Candidate) -> BufferDecision {
        match self.state {
            BufferState::Buffering => {
                self.received_total += 1;
                self.pending.push_back(candidate);
                BufferDecision::Buffered
            }
            BufferState::Flushed => {
                self.received_total += 1;
                BufferDecision::Forward(candidate)
            }
            BufferState::Discarded => BufferDecision::Discarded,
        }
    }

    /// Drain held candidates in arrival order.
    ///
    /// Only the first call returns anything; afterwards every offered
    /// candidate is forwarded directly.
    pub fn on_remote_description_applied(&mut self) -> Vec<Candidate> {
        if self.state != BufferState::Buffering {
            return Vec::new();
        }
        self.state = BufferState::Flushed;
        self.pending.drain(..).collect()
    }

    /// Drop everything held and refuse further candidates
    pub fn discard(&mut self) -> usize {
        self.state = BufferState::Discarded;
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_flushed(&self) -> bool {
        self.state == BufferState::Flushed
    }

    pub fn is_discarded(&self) -> bool {
        self.state == BufferState::Discarded
    }

    /// Candidates accepted since creation, buffered or forwarded
    pub fn received_total(&self) -> u64 {
        self.received_total
    }
}

impl Default for CandidateBuffer {
    fn default() -> Self {
        Self::new()
    }
}
