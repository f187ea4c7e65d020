use std::collections::HashMap;

use crate::invocation::InvocationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FireState {
    Waiting,
    Fired,
}

/// Idempotency guard keyed by invocation id.
///
/// Observers may ask for the same pending invocation to be dispatched any
/// number of times; only the first request runs the dispatch thunk. Two
/// invocations of the same endpoint are tracked independently.
#[derive(Debug, Default)]
pub struct RequestTracker {
    entries: HashMap<InvocationId, FireState>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an invocation that has not been dispatched yet.
    pub fn track(&mut self, id: InvocationId) {
        self.entries.entry(id).or_insert(FireState::Waiting);
    }

    /// Run `thunk` if and only if this is the first fire for `id`.
    pub fn fire_once<R>(&mut self, id: InvocationId, thunk: impl FnOnce() -> R) -> Option<R> {
        let state = self.entries.entry(id).or_insert(FireState::Waiting);
        if *state == FireState::Fired {
            tracing::trace!(invocation_id = %id, "Dispatch already fired, skipping");
            return None;
        }
        *state = FireState::Fired;
        Some(thunk())
    }

    pub fn has_fired(&self, id: InvocationId) -> bool {
        self.entries.get(&id) == Some(&FireState::Fired)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
