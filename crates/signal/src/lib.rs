//! Per-thread signal mask and pending-signal bookkeeping.
//!
//! Five fixed signals (CHLD, CPU, UBLOCK, USR, KILL), a 16-bit mask per
//! thread, and bounded pending-signal slots instead of a general queue:
//! `kill`'s own case analysis never needs more than one pending KILL and
//! one pending USR record per target (invariant 11).
#![cfg_attr(not(feature = "std"), no_std)]

pub mod api;
pub mod error;
pub mod mask;
pub mod state;
#[cfg(feature = "std")]
pub mod testing;
pub mod thread;

pub use api::{kill, signal_, sigprocmask, Disposition};
pub use error::SignalError;
pub use mask::{sigaddset, sigdelset, sigemptyset, sigfillset, MaskHow, SigSet, Signal};
pub use state::{PendingSignals, SignalState};
pub use thread::{ThreadDirectory, ThreadId, ROOT_TID};

/// `signal_` collapsed to the C-style `0`/`-1` contract.
pub fn signal_errno(dir: &dyn ThreadDirectory, sig: u8, disp: Disposition) -> i32 {
    error::to_errno(signal_(dir, sig, disp))
}

/// `kill` collapsed to the C-style `0`/`-1` contract.
pub fn kill_errno(dir: &dyn ThreadDirectory, target: ThreadId, sig: u8) -> i32 {
    error::to_errno(kill(dir, target, sig))
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn errno_wrappers_collapse_errors() {
        struct Empty;
        impl ThreadDirectory for Empty {
            fn current(&self) -> ThreadId {
                1
            }
            fn signal_state(&self, _tid: ThreadId) -> Option<&SignalState> {
                None
            }
            fn is_blocked(&self, _tid: ThreadId) -> bool {
                false
            }
            fn parent_of(&self, _tid: ThreadId) -> Option<ThreadId> {
                None
            }
            fn push_unblock_request(&self, _tid: ThreadId) {}
        }

        let dir = Empty;
        assert_eq!(signal_errno(&dir, 9, Disposition::Ignore), -1);
        assert_eq!(kill_errno(&dir, 1, 4), -1);
    }
}
