#![cfg_attr(not(feature = "std"), no_std)]

//! Shared primitives for the allocator and signal crates: the lock type
//! both of them build on, and a minimal intrusive doubly-linked list.
//!
//! The page allocator and thread scheduler do not live here; those are
//! the embedding kernel's responsibility, reached only through the traits
//! `nk-alloc` and `nk-signal` define for themselves.

pub mod list;

// Re-export spin's mutex as the crate's lock API so callers never name
// `spin` directly, same indirection the teacher workspace uses.
pub use spin::{Mutex, MutexGuard};

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_mutex_basic() {
        let lock = Mutex::new(42);
        {
            let mut guard = lock.lock();
            assert_eq!(*guard, 42);
            *guard = 43;
        }
        assert_eq!(*lock.lock(), 43);
    }
}
