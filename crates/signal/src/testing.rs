//! A mock [`ThreadDirectory`] for integration tests, shared with the
//! colocated unit tests in `api.rs`.

extern crate std;

use std::collections::HashMap;
use std::sync::Mutex;
use std::vec::Vec;

use crate::state::SignalState;
use crate::thread::{ThreadDirectory, ThreadId};

/// A small, fixed process tree with no real scheduler behind it: `is_blocked`
/// and the unblock-request queue are plain recorded facts, not live state.
pub struct MockDirectory {
    current: ThreadId,
    states: HashMap<ThreadId, SignalState>,
    parents: HashMap<ThreadId, ThreadId>,
    blocked: HashMap<ThreadId, bool>,
    unblock_requests: Mutex<Vec<ThreadId>>,
}

impl MockDirectory {
    pub fn new(current: ThreadId) -> Self {
        Self {
            current,
            states: HashMap::new(),
            parents: HashMap::new(),
            blocked: HashMap::new(),
            unblock_requests: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_thread(mut self, tid: ThreadId, parent: Option<ThreadId>) -> Self {
        self.states.insert(tid, SignalState::new());
        if let Some(p) = parent {
            self.parents.insert(tid, p);
        }
        self
    }

    #[must_use]
    pub fn blocking(mut self, tid: ThreadId) -> Self {
        self.blocked.insert(tid, true);
        self
    }

    pub fn unblock_requests(&self) -> Vec<ThreadId> {
        self.unblock_requests.lock().unwrap().clone()
    }
}

impl ThreadDirectory for MockDirectory {
    fn current(&self) -> ThreadId {
        self.current
    }

    fn signal_state(&self, tid: ThreadId) -> Option<&SignalState> {
        self.states.get(&tid)
    }

    fn is_blocked(&self, tid: ThreadId) -> bool {
        *self.blocked.get(&tid).unwrap_or(&false)
    }

    fn parent_of(&self, tid: ThreadId) -> Option<ThreadId> {
        self.parents.get(&tid).copied()
    }

    fn push_unblock_request(&self, tid: ThreadId) {
        self.unblock_requests.lock().unwrap().push(tid);
    }
}
