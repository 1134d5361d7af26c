use std::collections::HashMap;

use super::domain::{AssessmentId, CorrelatedMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaiterState {
    Pending,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Waiter {
    assessment_id: AssessmentId,
    state: WaiterState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Armed,
    AlreadyPending,
    /// The key was pending for another assessment, which no longer receives it.
    TakenOver(AssessmentId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved(AssessmentId),
    Duplicate(AssessmentId),
    Unknown,
}

/// Waiters keyed by correlated message. Each armed waiter resolves exactly once; later
/// deliveries of the same key report `Duplicate` until the key is armed again.
#[derive(Debug, Default)]
pub struct WaiterTable {
    waiters: HashMap<CorrelatedMessage, Waiter>,
}

impl WaiterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, message: CorrelatedMessage, assessment_id: AssessmentId) -> Registration {
        match self.waiters.get(&message) {
            Some(waiter) if waiter.state == WaiterState::Pending => {
                if waiter.assessment_id == assessment_id {
                    return Registration::AlreadyPending;
                }
                let previous = waiter.assessment_id;
                self.arm(message, assessment_id);
                Registration::TakenOver(previous)
            }
            _ => {
                self.arm(message, assessment_id);
                Registration::Armed
            }
        }
    }

    fn arm(&mut self, message: CorrelatedMessage, assessment_id: AssessmentId) {
        self.waiters.insert(
            message,
            Waiter {
                assessment_id,
                state: WaiterState::Pending,
            },
        );
    }

    pub fn resolve(&mut self, message: &CorrelatedMessage) -> Resolution {
        match self.waiters.get_mut(message) {
            Some(waiter) if waiter.state == WaiterState::Pending => {
                waiter.state = WaiterState::Resolved;
                Resolution::Resolved(waiter.assessment_id)
            }
            Some(waiter) => Resolution::Duplicate(waiter.assessment_id),
            None => Resolution::Unknown,
        }
    }

    /// The run a key is currently armed for.
    pub fn pending_holder(&self, message: &CorrelatedMessage) -> Option<AssessmentId> {
        self.waiters
            .get(message)
            .filter(|waiter| waiter.state == WaiterState::Pending)
            .map(|waiter| waiter.assessment_id)
    }

    /// Drops every pending waiter of a finished run.
    pub fn release(&mut self, assessment_id: AssessmentId) {
        self.waiters.retain(|_, waiter| {
            !(waiter.assessment_id == assessment_id && waiter.state == WaiterState::Pending)
        });
    }
}
