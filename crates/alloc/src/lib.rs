#![cfg_attr(not(feature = "std"), no_std)]

//! A page-backed, size-segregated block allocator implementing classic
//! power-of-two buddy discipline: split on demand, coalesce on free.
//!
//! Two allocation paths share one API. Requests at or below the top small
//! class (`PAGE_SIZE / 4`) are served from size-class free lists, splitting
//! a larger free block (or a fresh page) down to the target class as
//! needed. Larger requests get their own run of whole pages (a "big
//! arena") with no size class involved.
//!
//! The page source and thread scheduler this crate would sit on top of in
//! a real kernel are out of scope here, reached only through the
//! [`PageSource`] trait (see [`page`]).

pub mod allocator;
pub mod arena;
pub mod classes;
pub mod descriptor;
pub mod page;
pub mod registry;

#[cfg(feature = "std")]
pub mod testing;

pub use allocator::Allocator;
pub use page::PageSource;

#[cfg(all(test, feature = "std"))]
mod tests {
    use crate::testing::MockPages;
    use crate::Allocator;

    fn new_allocator() -> Allocator<MockPages> {
        Allocator::new(MockPages::new())
    }

    #[test]
    fn alloc_zero_returns_none() {
        let a = new_allocator();
        assert!(a.alloc(0).is_none());
    }

    #[test]
    fn free_of_null_is_a_no_op() {
        let a = new_allocator();
        a.free(None);
    }

    #[test]
    fn realloc_null_is_alloc() {
        let a = new_allocator();
        let p = a.realloc(None, 32).unwrap();
        a.free(Some(p));
    }

    #[test]
    fn realloc_zero_frees_and_returns_none() {
        let a = new_allocator();
        let p = a.alloc(32).unwrap();
        assert!(a.realloc(Some(p), 0).is_none());
        assert_eq!(a.registry_len(), 0);
    }

    #[test]
    fn realloc_preserves_prefix() {
        let a = new_allocator();
        let p = a.alloc(16).unwrap();
        // SAFETY: p has at least 16 usable bytes.
        unsafe { core::ptr::write_bytes(p.as_ptr(), 0xab, 16) };
        let q = a.realloc(Some(p), 100).unwrap();
        // SAFETY: q has at least 100 usable bytes; the first 16 came from p.
        let bytes = unsafe { core::slice::from_raw_parts(q.as_ptr(), 16) };
        assert!(bytes.iter().all(|&b| b == 0xab));
        a.free(Some(q));
    }

    #[test]
    fn calloc_overflow_returns_none() {
        let a = new_allocator();
        assert!(a.calloc(usize::MAX, 2).is_none());
    }

    #[test]
    fn calloc_zeroes_the_region() {
        let a = new_allocator();
        let p = a.calloc(10, 10).unwrap();
        // SAFETY: calloc(10, 10) guarantees 100 zeroed bytes at p.
        let bytes = unsafe { core::slice::from_raw_parts(p.as_ptr(), 100) };
        assert!(bytes.iter().all(|&b| b == 0));
        a.free(Some(p));
    }
}
