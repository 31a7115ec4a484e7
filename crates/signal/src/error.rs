//! Internal error taxonomy for the signal API.
//!
//! The public surface collapses every failure to `-1` (spec.md's C-style
//! contract); this richer enum exists so unit tests, and any caller that
//! wants more than a bare sentinel, can tell *why* an operation failed,
//! the same split `VfsError` makes between its internal variants and
//! `to_errno()`.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalError {
    /// A signal number outside `0..=4`.
    InvalidSignal,
    /// The target is currently masking the signal being sent.
    Masked,
    /// No thread with that TID is known to the directory.
    UnknownTarget,
    /// `kill(_, KILL)` from a thread that is not an ancestor of the target.
    PermissionDenied,
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::InvalidSignal => "invalid signal number",
            Self::Masked => "signal masked at target",
            Self::UnknownTarget => "unknown thread id",
            Self::PermissionDenied => "permission denied",
        };
        f.write_str(msg)
    }
}

impl SignalError {
    /// Collapse to spec.md's public contract: 0 on success, -1 on any error.
    pub fn to_errno(self) -> i32 {
        -1
    }
}

/// `Ok(())` becomes 0, any `Err` becomes -1, per spec.md §6's error codes.
pub fn to_errno(result: Result<(), SignalError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.to_errno(),
    }
}
