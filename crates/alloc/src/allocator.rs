//! Allocator core: `alloc`, `free`, `realloc`, `calloc`, `dump_free_memory`.
//!
//! Ties the size-class descriptors (C3), arena registry (C5), and the page
//! source (C1, external) together. Every public method takes `&self`; all
//! mutable state lives behind the descriptor and registry locks.

use core::fmt::Write as _;
use core::ptr::NonNull;

use crate::arena::{arena_of, ArenaHeader, NO_CLASS};
use crate::classes::{class_index_for, CLASS_SIZES, MIN_BLOCK_SIZE, NUM_CLASSES, PAGE_SIZE};
use crate::descriptor::DescriptorTable;
use crate::page::PageSource;
use crate::registry::Registry;

pub struct Allocator<P: PageSource> {
    descriptors: DescriptorTable,
    registry: Registry,
    pages: P,
}

impl<P: PageSource> Allocator<P> {
    pub const fn new(pages: P) -> Self {
        Self {
            descriptors: DescriptorTable::new(),
            registry: Registry::new(),
            pages,
        }
    }

    /// Pages needed to host a big allocation of `size` bytes plus its header.
    fn pages_for_big(size: usize) -> usize {
        let needed = size + ArenaHeader::data_offset();
        needed.div_ceil(PAGE_SIZE)
    }

    fn init_arena_header(base: NonNull<u8>) -> NonNull<ArenaHeader> {
        let header = base.cast::<ArenaHeader>();
        // SAFETY: base is a freshly obtained, page-aligned, writable page;
        // large enough for ArenaHeader (PAGE_SIZE comfortably exceeds it).
        unsafe { core::ptr::write_bytes(header.as_ptr(), 0, 1) };
        header
    }

    /// Carve a fresh page into a single top-class block and register it.
    fn new_small_arena(&self) -> Option<NonNull<ArenaHeader>> {
        let base = self.pages.page_alloc(1)?;
        let mut arena = Self::init_arena_header(base);
        // SAFETY: arena was just written above, uniquely owned here.
        unsafe { arena.as_mut() }.init_small();
        let data_addr = unsafe { arena.as_ref() }.data_addr();
        let top_idx = NUM_CLASSES - 1;
        let finest_start = unsafe { arena.as_ref() }.finest_index_of(data_addr);
        let finest_count = CLASS_SIZES[top_idx] / MIN_BLOCK_SIZE;
        // SAFETY: dereferencing the arena pointer to reach a &self method;
        // the slots table's own lock is what makes the write safe, not
        // exclusivity (this arena is not yet linked anywhere, but nothing
        // here depends on that for the slots write itself).
        unsafe { arena.as_ref() }.set_class_range(finest_start, finest_count, top_idx as u8);
        // SAFETY: arena is freshly initialized and not yet linked anywhere.
        unsafe { self.registry.insert(arena) };
        Some(arena)
    }

    /// Halve the block at `addr` (currently class `cur_idx`) down to
    /// `target_idx`, pushing the other half onto each intermediate class's
    /// free list along the way. Returns the address of the remaining half.
    fn split_down(
        &self,
        arena: NonNull<ArenaHeader>,
        mut addr: usize,
        mut cur_idx: usize,
        target_idx: usize,
    ) -> usize {
        while cur_idx > target_idx {
            let child_idx = cur_idx - 1;
            let child_size = CLASS_SIZES[child_idx];
            let right_addr = addr + child_size;

            // SAFETY: dereferencing the arena pointer to reach a &self
            // method. `addr` itself is exclusively ours (either freshly
            // carved from a page only this call has touched, or just popped
            // from a descriptor free list under that descriptor's lock),
            // but the slots table it indexes into is shared with any other
            // thread splitting or coalescing elsewhere in the same arena;
            // `set_class_range` takes its own lock for that range write.
            let hdr = unsafe { arena.as_ref() };
            let finest_start = hdr.finest_index_of(addr);
            let finest_count = CLASS_SIZES[cur_idx] / MIN_BLOCK_SIZE;
            hdr.set_class_range(finest_start, finest_count, child_idx as u8);

            log::trace!(
                "split: class {} -> {} at {:#x}, pushing buddy {:#x}",
                CLASS_SIZES[cur_idx],
                child_size,
                addr,
                right_addr
            );

            // SAFETY: right_addr is a freshly carved, exclusively-owned
            // block of `child_size` bytes, not linked anywhere yet.
            unsafe { self.descriptors.get(child_idx).push(right_addr) };

            cur_idx = child_idx;
        }
        addr
    }

    /// Class index currently governing the block starting at `addr`, read
    /// from the arena's out-of-band tracking table.
    fn class_of(arena: &ArenaHeader, addr: usize) -> usize {
        let finest = arena.finest_index_of(addr);
        let tag = arena.class_at(finest);
        assert!(tag != NO_CLASS, "misaligned free pointer");
        tag as usize
    }

    /// `alloc` for the small-block path: find or make a block of
    /// `target_idx`'s class, returning its address.
    fn alloc_small(&self, target_idx: usize) -> Option<NonNull<u8>> {
        if let Some(addr) = self.descriptors.get(target_idx).pop() {
            return NonNull::new(addr as *mut u8);
        }

        // Fast-path miss: look upward for a larger nonempty class.
        for source_idx in (target_idx + 1)..NUM_CLASSES {
            if let Some(addr) = self.descriptors.get(source_idx).pop() {
                // SAFETY: addr was just popped, exclusively ours; its arena
                // is recoverable and intact by invariant 1.
                let arena = unsafe { arena_of(NonNull::new_unchecked(addr as *mut u8)) };
                let final_addr = self.split_down(arena, addr, source_idx, target_idx);
                return NonNull::new(final_addr as *mut u8);
            }
        }

        // Fresh-arena path: nothing free anywhere at or above the target.
        let arena = self.new_small_arena()?;
        let top_idx = NUM_CLASSES - 1;
        let data_addr = unsafe { arena.as_ref() }.data_addr();
        log::debug!("new small arena at {:#x}", arena.as_ptr() as usize);
        let final_addr = self.split_down(arena, data_addr, top_idx, target_idx);
        NonNull::new(final_addr as *mut u8)
    }

    pub fn alloc(&self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }

        match class_index_for(size) {
            Some(idx) => self.alloc_small(idx),
            None => {
                let pages = Self::pages_for_big(size);
                let base = self.pages.page_alloc(pages)?;
                let mut arena = Self::init_arena_header(base);
                // SAFETY: arena freshly written above, exclusively owned here.
                unsafe { arena.as_mut() }.init_big(pages as u32);
                log::debug!("new big arena at {:#x}, {} pages", base.as_ptr() as usize, pages);
                let data_addr = unsafe { arena.as_ref() }.data_addr();
                NonNull::new(data_addr as *mut u8)
            }
        }
    }

    pub fn free(&self, ptr: Option<NonNull<u8>>) {
        let Some(ptr) = ptr else { return };

        let arena = unsafe { arena_of(ptr) };
        // SAFETY: arena header was written by this allocator if `ptr` is a
        // live pointer it handed out, per invariant 1.
        unsafe { arena.as_ref() }.check_magic();

        if !unsafe { arena.as_ref() }.is_small() {
            let num_pages = unsafe { arena.as_ref() }.num_pages();
            log::debug!("free big arena at {:#x}, {} pages", arena.as_ptr() as usize, num_pages);
            // SAFETY: base is the page-aligned start of a region this
            // allocator obtained from `page_alloc(num_pages)`.
            unsafe { self.pages.page_free(arena.cast(), num_pages) };
            return;
        }

        let mut addr = ptr.as_ptr() as usize;
        let mut class_idx = Self::class_of(unsafe { arena.as_ref() }, addr);

        loop {
            if class_idx == NUM_CLASSES - 1 {
                break;
            }

            let class_size = CLASS_SIZES[class_idx];
            let data_addr = unsafe { arena.as_ref() }.data_addr();
            let i = (addr - data_addr) / class_size;
            let buddy_addr = data_addr + (i ^ 1) * class_size;

            let desc = self.descriptors.get(class_idx);
            // SAFETY: buddy_addr, if it is a live free block, sits on
            // exactly this descriptor's free list (every unused block of a
            // class is on that class's list, by invariant 4). The check
            // (is the buddy there?) and the mutation (remove it, or else
            // push addr) happen under one lock acquisition in
            // `remove_buddy_or_push`, so two threads freeing the same
            // buddy pair at the same time cannot both see "not found" and
            // both push, leaving the pair stuck un-coalesced.
            let buddy_found = unsafe { desc.remove_buddy_or_push(buddy_addr, addr) };

            if !buddy_found {
                return;
            }

            let parent_addr = addr.min(buddy_addr);
            let parent_idx = class_idx + 1;
            log::trace!(
                "coalesce: {:#x} + buddy {:#x} -> class {} at {:#x}",
                addr,
                buddy_addr,
                CLASS_SIZES[parent_idx],
                parent_addr
            );

            // SAFETY: dereferencing the arena pointer to reach a &self
            // method; the slots table is shared with any other thread
            // splitting or coalescing elsewhere in this arena, and
            // `set_class_range` takes its own lock for the range it writes.
            let hdr = unsafe { arena.as_ref() };
            let finest_start = hdr.finest_index_of(parent_addr);
            let finest_count = CLASS_SIZES[parent_idx] / MIN_BLOCK_SIZE;
            hdr.set_class_range(finest_start, finest_count, parent_idx as u8);

            addr = parent_addr;
            class_idx = parent_idx;
        }

        log::debug!("reclaiming arena at {:#x}", arena.as_ptr() as usize);
        // SAFETY: arena is linked (every small arena in circulation is, by
        // invariant 6) and is now fully coalesced, safe to tear down.
        unsafe {
            self.registry.remove(arena);
            self.pages.page_free(arena.cast(), 1);
        }
    }

    /// Usable size of a live pointer, for `realloc`'s copy length.
    ///
    /// # Safety
    /// `ptr` must be a live pointer previously returned by this allocator.
    unsafe fn usable_size(&self, ptr: NonNull<u8>) -> usize {
        let arena = unsafe { arena_of(ptr) };
        let hdr = unsafe { arena.as_ref() };
        hdr.check_magic();
        if hdr.is_small() {
            let class_idx = Self::class_of(hdr, ptr.as_ptr() as usize);
            CLASS_SIZES[class_idx]
        } else {
            hdr.num_pages() * PAGE_SIZE - ArenaHeader::data_offset()
        }
    }

    pub fn realloc(&self, ptr: Option<NonNull<u8>>, n: usize) -> Option<NonNull<u8>> {
        let Some(p) = ptr else {
            return self.alloc(n);
        };
        if n == 0 {
            self.free(Some(p));
            return None;
        }

        // SAFETY: p is a live pointer per this function's own contract.
        let old_size = unsafe { self.usable_size(p) };
        let new_ptr = self.alloc(n)?;
        let copy_len = old_size.min(n);
        // SAFETY: both regions are at least copy_len bytes, non-overlapping
        // (new_ptr is a freshly obtained, disjoint block).
        unsafe { core::ptr::copy_nonoverlapping(p.as_ptr(), new_ptr.as_ptr(), copy_len) };
        self.free(Some(p));
        Some(new_ptr)
    }

    pub fn calloc(&self, a: usize, b: usize) -> Option<NonNull<u8>> {
        let s = a.wrapping_mul(b);
        if s < a || s < b {
            return None;
        }
        let ptr = self.alloc(s)?;
        // SAFETY: alloc(s) guarantees at least s usable bytes at ptr.
        unsafe { core::ptr::write_bytes(ptr.as_ptr(), 0, s) };
        Some(ptr)
    }

    /// Write a human-readable dump of every small arena's free blocks, one
    /// section per arena, one line per class. Big arenas are excluded.
    pub fn dump_free_memory(&self, out: &mut dyn core::fmt::Write) -> core::fmt::Result {
        let mut any = false;
        self.registry.for_each(|arena| {
            any = true;
            let base = arena.as_ptr() as usize;
            let _ = writeln!(out, "arena {base:#x}:");
            for idx in 0..NUM_CLASSES {
                let desc = self.descriptors.get(idx);
                let _ = write!(out, "  class {}:", desc.block_size());
                desc.free_addresses(|addr| {
                    // SAFETY: addr is a currently-free block; its arena is
                    // recoverable by the same round-down-to-page rule.
                    let owner = unsafe { arena_of(NonNull::new_unchecked(addr as *mut u8)) };
                    if owner == arena {
                        let _ = write!(out, " {addr:#x}");
                    }
                });
                let _ = writeln!(out);
            }
        });
        if !any {
            writeln!(out, "(no small arenas in circulation)")?;
        }
        Ok(())
    }

    pub fn registry_len(&self) -> usize {
        self.registry.len()
    }

    /// The page source this allocator was built with, for inspection in
    /// tests.
    pub fn pages(&self) -> &P {
        &self.pages
    }
}
