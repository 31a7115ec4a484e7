//! A host-backed [`PageSource`] for exercising this crate without a real
//! kernel underneath it. Only compiled under the `std` feature.
//!
//! `expect_used` is relaxed here only: this module backs tests, never a
//! real kernel's page allocator, so a broken invariant should panic loudly
//! rather than propagate a `Result` nobody downstream would handle.
#![allow(clippy::expect_used)]

extern crate std;

use std::vec::Vec;

use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use nk_utils::Mutex;

use crate::classes::PAGE_SIZE;
use crate::page::PageSource;

/// Backed by leaked, page-aligned heap buffers; tracks every live
/// allocation so tests can assert the allocator returned every page it
/// took.
pub struct MockPages {
    live: Mutex<Vec<(usize, usize)>>, // (base, pages)
    freed_calls: AtomicUsize,
}

impl MockPages {
    pub fn new() -> Self {
        Self {
            live: Mutex::new(Vec::new()),
            freed_calls: AtomicUsize::new(0),
        }
    }

    pub fn freed_calls(&self) -> usize {
        self.freed_calls.load(Ordering::SeqCst)
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }
}

impl Default for MockPages {
    fn default() -> Self {
        Self::new()
    }
}

impl PageSource for MockPages {
    fn page_alloc(&self, pages: usize) -> Option<NonNull<u8>> {
        let layout = core::alloc::Layout::from_size_align(pages * PAGE_SIZE, PAGE_SIZE).ok()?;
        // SAFETY: layout has non-zero size.
        let raw = unsafe { std::alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw)?;
        self.live.lock().push((ptr.as_ptr() as usize, pages));
        Some(ptr)
    }

    unsafe fn page_free(&self, base: NonNull<u8>, pages: usize) {
        self.freed_calls.fetch_add(1, Ordering::SeqCst);
        let mut live = self.live.lock();
        let idx = live
            .iter()
            .position(|&(b, p)| b == base.as_ptr() as usize && p == pages)
            .expect("freeing a region never handed out");
        live.remove(idx);
        let layout =
            core::alloc::Layout::from_size_align(pages * PAGE_SIZE, PAGE_SIZE).expect("valid layout");
        // SAFETY: base/pages match a prior page_alloc, per caller contract.
        unsafe { std::alloc::dealloc(base.as_ptr(), layout) };
    }
}
