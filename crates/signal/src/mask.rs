//! The signal mask bitset and the five signal numbers it's built from.

use bitflags::bitflags;

use crate::error::SignalError;

/// Signal numbers, fixed by the enumeration in spec.md §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Signal {
    Chld = 0,
    Cpu = 1,
    Ublock = 2,
    Usr = 3,
    Kill = 4,
}

impl Signal {
    pub fn from_number(n: u8) -> Result<Self, SignalError> {
        match n {
            0 => Ok(Self::Chld),
            1 => Ok(Self::Cpu),
            2 => Ok(Self::Ublock),
            3 => Ok(Self::Usr),
            4 => Ok(Self::Kill),
            _ => Err(SignalError::InvalidSignal),
        }
    }

    fn bit(self) -> u16 {
        1u16 << (self as u8)
    }
}

bitflags! {
    /// An opaque 16-bit bitset over the five signals; bit `k` is signal `k`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SigSet: u16 {
        const CHLD   = 1 << 0;
        const CPU    = 1 << 1;
        const UBLOCK = 1 << 2;
        const USR    = 1 << 3;
        const KILL   = 1 << 4;
    }
}

/// `*s := 0`.
pub fn sigemptyset() -> SigSet {
    SigSet::empty()
}

/// `*s := 31`, all five signals, including KILL's bit. `signal_`/`kill`
/// never actually consult KILL's bit (resolves spec.md §9 open question 4).
pub fn sigfillset() -> SigSet {
    SigSet::all()
}

/// Reject `k ∉ [0, 4]`; otherwise set bit `k`.
pub fn sigaddset(s: SigSet, k: u8) -> Result<SigSet, SignalError> {
    let sig = Signal::from_number(k)?;
    Ok(s | SigSet::from_bits_retain(sig.bit()))
}

/// Reject `k ∉ [0, 4]`; otherwise clear bit `k`.
pub fn sigdelset(s: SigSet, k: u8) -> Result<SigSet, SignalError> {
    let sig = Signal::from_number(k)?;
    Ok(s & !SigSet::from_bits_retain(sig.bit()))
}

/// How [`sigprocmask`](crate::api::sigprocmask) combines the current mask
/// with the caller-supplied set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskHow {
    Block,
    Unblock,
    SetMask,
}

pub fn apply(current: SigSet, how: MaskHow, set: SigSet) -> SigSet {
    match how {
        MaskHow::Block => current | set,
        MaskHow::Unblock => current & !set,
        MaskHow::SetMask => set,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fillset_includes_kill_bit() {
        assert!(sigfillset().contains(SigSet::KILL));
        assert_eq!(sigfillset().bits(), 31);
    }

    #[test]
    fn addset_rejects_out_of_range() {
        assert_eq!(sigaddset(sigemptyset(), 5), Err(SignalError::InvalidSignal));
    }

    #[test]
    fn addset_and_delset_round_trip() {
        let s = sigaddset(sigemptyset(), 3).unwrap();
        assert!(s.contains(SigSet::USR));
        let s = sigdelset(s, 3).unwrap();
        assert!(!s.contains(SigSet::USR));
    }

    #[test]
    fn block_unblock_setmask() {
        let base = SigSet::CHLD;
        let blocked = apply(base, MaskHow::Block, SigSet::USR);
        assert_eq!(blocked, SigSet::CHLD | SigSet::USR);

        let unblocked = apply(blocked, MaskHow::Unblock, SigSet::CHLD);
        assert_eq!(unblocked, SigSet::USR);

        let set = apply(unblocked, MaskHow::SetMask, SigSet::KILL);
        assert_eq!(set, SigSet::KILL);
    }
}
