//! The boundary between this crate and the embedding kernel's page allocator.
//!
//! `nk-alloc` never maps or owns physical memory itself; it only carves pages
//! it is handed into size-segregated blocks. A real kernel implements
//! [`PageSource`] over its own frame allocator.

use core::ptr::NonNull;

/// Supplies whole pages to the block allocator and reclaims them.
///
/// Implementations must hand back zeroed-or-not-care memory of exactly
/// `pages * PAGE_SIZE` bytes, page-aligned. `nk-alloc` never reads page
/// contents before writing its own arena header into them.
pub trait PageSource {
    /// Allocate `pages` contiguous, page-aligned pages. `None` on exhaustion.
    fn page_alloc(&self, pages: usize) -> Option<NonNull<u8>>;

    /// Return a region previously obtained from `page_alloc` with the same
    /// `pages` count.
    ///
    /// # Safety
    /// `base` must be a pointer previously returned by `page_alloc(pages)`
    /// on this same source, not yet freed.
    unsafe fn page_free(&self, base: NonNull<u8>, pages: usize);
}
