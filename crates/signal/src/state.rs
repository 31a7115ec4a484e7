//! Per-thread signal state: the blocking mask and pending KILL/USR records.

use core::sync::atomic::{AtomicU16, Ordering};

use nk_utils::Mutex;

use crate::mask::SigSet;
use crate::thread::ThreadId;

/// At most one pending KILL and one pending USR record per thread
/// (invariant 11): a sender, or nothing. UBLOCK has no pending record at
/// all; it either wakes the target immediately or is queued on the
/// out-of-scope global unblock list via `ThreadDirectory::push_unblock_request`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PendingSignals {
    pub kill_sender: Option<ThreadId>,
    pub usr_sender: Option<ThreadId>,
}

impl PendingSignals {
    pub const fn new() -> Self {
        Self { kill_sender: None, usr_sender: None }
    }
}

/// One thread's mask plus its pending-signal slots.
pub struct SignalState {
    mask: AtomicU16,
    pending: Mutex<PendingSignals>,
}

impl SignalState {
    pub const fn new() -> Self {
        Self {
            mask: AtomicU16::new(0),
            pending: Mutex::new(PendingSignals::new()),
        }
    }

    pub fn mask(&self) -> SigSet {
        SigSet::from_bits_retain(self.mask.load(Ordering::Acquire))
    }

    pub fn set_mask(&self, set: SigSet) {
        self.mask.store(set.bits(), Ordering::Release);
    }

    pub fn is_blocked(&self, set: SigSet) -> bool {
        self.mask().intersects(set)
    }

    pub fn pending(&self) -> &Mutex<PendingSignals> {
        &self.pending
    }
}

impl Default for SignalState {
    fn default() -> Self {
        Self::new()
    }
}
