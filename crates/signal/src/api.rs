//! Core signal operations: `signal_`, `kill`, `sigprocmask`.
//!
//! Every function here takes a `&dyn ThreadDirectory` rather than reaching
//! for global state, so the logic is exercised against a mock directory in
//! tests; `lib.rs` re-exports thin wrappers for kernel callers.

use log::{debug, trace, warn};

use crate::error::SignalError;
use crate::mask::{self, MaskHow, SigSet, Signal};
use crate::thread::{ThreadDirectory, ThreadId};

/// `SIG_DFL`/`SIG_IGN`-style disposition for `signal_`. KILL never accepts
/// either: its mask bit is fixed regardless of what's requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Mask the signal: delivery is blocked until unmasked.
    Ignore,
    /// Unmask the signal: default delivery behavior applies.
    Default,
}

/// Sets or clears `sig`'s bit in the calling thread's mask.
///
/// `sig == KILL` is accepted but never changes anything: KILL's mask bit,
/// per spec.md §9 open question 4, is never consulted by `kill`.
pub fn signal_(
    dir: &dyn ThreadDirectory,
    sig: u8,
    disp: Disposition,
) -> Result<(), SignalError> {
    let sig = Signal::from_number(sig)?;
    if matches!(sig, Signal::Kill) {
        trace!("signal_: KILL disposition requests are accepted and ignored");
        return Ok(());
    }

    let tid = dir.current();
    let state = dir.signal_state(tid).ok_or(SignalError::UnknownTarget)?;
    let bit = SigSet::from_bits_retain(1u16 << (sig as u8));
    let mask = state.mask();
    let new_mask = match disp {
        Disposition::Ignore => mask | bit,
        Disposition::Default => mask & !bit,
    };
    debug!("signal_: tid={tid} sig={sig:?} mask {mask:?} -> {new_mask:?}");
    state.set_mask(new_mask);
    Ok(())
}

/// Reads the calling thread's mask, applies `how`/`set`, and returns the
/// mask as it was *before* the update (invariant 10).
pub fn sigprocmask(dir: &dyn ThreadDirectory, how: MaskHow, set: SigSet) -> Result<SigSet, SignalError> {
    let tid = dir.current();
    let state = dir.signal_state(tid).ok_or(SignalError::UnknownTarget)?;
    let old = state.mask();
    let new = mask::apply(old, how, set);
    state.set_mask(new);
    Ok(old)
}

/// Sends `sig` to `target`. See spec.md §4.6 for the three per-signal cases;
/// anything else (unknown signal, unknown target) fails.
pub fn kill(dir: &dyn ThreadDirectory, target: ThreadId, sig: u8) -> Result<(), SignalError> {
    let sig = Signal::from_number(sig)?;
    let state = dir.signal_state(target).ok_or(SignalError::UnknownTarget)?;

    match sig {
        Signal::Ublock => {
            if state.is_blocked(SigSet::UBLOCK) {
                warn!("kill: UBLOCK masked at target={target}");
                return Err(SignalError::Masked);
            }
            if dir.is_blocked(target) {
                dir.push_unblock_request(target);
                debug!("kill: UBLOCK queued for target={target}");
            }
            Ok(())
        }
        Signal::Usr => {
            if state.is_blocked(SigSet::USR) {
                return Err(SignalError::Masked);
            }
            let caller = dir.current();
            let mut pending = state.pending().lock();
            pending.usr_sender = Some(caller);
            debug!("kill: USR pending for target={target} from caller={caller}");
            Ok(())
        }
        Signal::Kill => {
            let caller = dir.current();
            if !is_ancestor(dir, caller, target) {
                warn!("kill: KILL denied, caller={caller} is not an ancestor of target={target}");
                return Err(SignalError::PermissionDenied);
            }
            let mut pending = state.pending().lock();
            pending.kill_sender = Some(caller);
            debug!("kill: KILL pending for target={target} from caller={caller}");
            Ok(())
        }
        Signal::Chld | Signal::Cpu => Err(SignalError::InvalidSignal),
    }
}

/// Walks `target`'s parent chain looking for `caller`. `caller == target`
/// succeeds on the loop's first iteration (scenario S6): self is its own
/// ancestor. Terminates at the root without a match ⇒ not an ancestor.
fn is_ancestor(dir: &dyn ThreadDirectory, caller: ThreadId, target: ThreadId) -> bool {
    let mut cur = target;
    loop {
        if cur == caller {
            return true;
        }
        match dir.parent_of(cur) {
            Some(parent) => cur = parent,
            None => return false,
        }
    }
}
