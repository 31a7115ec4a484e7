//! Per-size-class free lists.
//!
//! Each [`Descriptor`] owns one free list shared by every arena currently
//! contributing blocks of that class: a block born in one page can sit on
//! the same list as a block born in another. The list node is written
//! directly into the free block's own memory; it is only ever read back
//! while the block is actually on the list.

use core::ptr::NonNull;

use nk_utils::list::{IntrusiveList, ListNode};
use nk_utils::Mutex;

use crate::classes::{CLASS_SIZES, NUM_CLASSES};

/// Doubly-linked free-list node, laid over a free block's own storage.
///
/// Exactly two pointers: the smallest class (16 bytes on a 64-bit target)
/// has room for nothing else. Once a block is handed back to a caller the
/// memory is the caller's to use; the node is rewritten from scratch the
/// next time the block is freed.
#[repr(C)]
struct FreeBlockNode {
    next: Option<NonNull<FreeBlockNode>>,
    prev: Option<NonNull<FreeBlockNode>>,
}

impl ListNode for FreeBlockNode {
    fn next(&self) -> Option<NonNull<Self>> {
        self.next
    }
    fn prev(&self) -> Option<NonNull<Self>> {
        self.prev
    }
    fn set_next(&mut self, next: Option<NonNull<Self>>) {
        self.next = next;
    }
    fn set_prev(&mut self, prev: Option<NonNull<Self>>) {
        self.prev = prev;
    }
}

/// One size class: its block size and the free list of currently-unused
/// blocks of that size, across every arena.
pub struct Descriptor {
    block_size: usize,
    free_list: Mutex<IntrusiveList<FreeBlockNode>>,
}

impl Descriptor {
    const fn new(block_size: usize) -> Self {
        Self {
            block_size,
            free_list: Mutex::new(IntrusiveList::new()),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Push a block at `addr` onto this class's free list.
    ///
    /// # Safety
    /// `addr` must point to `self.block_size` bytes this allocator owns,
    /// not currently linked on any free list.
    pub unsafe fn push(&self, addr: usize) {
        debug_assert!(addr != 0, "null block address");
        // SAFETY: addr is non-null and points to writable memory of at
        // least size_of::<FreeBlockNode>(), guaranteed by the caller
        // contract (block_size >= 16).
        let mut node = unsafe { NonNull::new_unchecked(addr as *mut FreeBlockNode) };
        let mut list = self.free_list.lock();
        unsafe { list.push_front(node.as_mut()) };
    }

    /// Pop the head of this class's free list, if any, atomically under the
    /// list's own lock. There is no separate peek step.
    pub fn pop(&self) -> Option<usize> {
        let mut list = self.free_list.lock();
        list.pop_front().map(|n| n.as_ptr() as usize)
    }

    /// Remove a specific block (by address) from this class's free list, if
    /// it is currently on it. Used by coalescing to claim a known buddy.
    ///
    /// # Safety
    /// `addr` must be either not linked on any list, or linked on exactly
    /// this list.
    pub unsafe fn remove(&self, addr: usize) -> bool {
        let mut list = self.free_list.lock();
        list.remove_where(|n| core::ptr::from_ref(n) as usize == addr)
            .is_some()
    }

    /// Claim `buddy_addr` if it is currently free, or else push `addr`,
    /// under a single lock acquisition.
    ///
    /// Coalescing needs "is the buddy free?" and "remove it / push mine"
    /// to happen as one step: taking the lock twice (once in `remove`,
    /// once in `push`) leaves a window where two threads freeing the two
    /// halves of the same pair can each see the buddy absent and each push
    /// their own half, so the pair never recombines (spec.md invariants 2
    /// and 6). Returns `true` if the buddy was found and removed, `false`
    /// if `addr` was pushed instead.
    ///
    /// # Safety
    /// `buddy_addr` must be either not linked on any list, or linked on
    /// exactly this list. `addr` must point to `self.block_size` bytes this
    /// allocator owns, not currently linked on any free list.
    pub unsafe fn remove_buddy_or_push(&self, buddy_addr: usize, addr: usize) -> bool {
        let mut list = self.free_list.lock();
        if list
            .remove_where(|n| core::ptr::from_ref(n) as usize == buddy_addr)
            .is_some()
        {
            return true;
        }
        debug_assert!(addr != 0, "null block address");
        // SAFETY: addr is non-null and points to writable memory of at
        // least size_of::<FreeBlockNode>(), guaranteed by the caller
        // contract (block_size >= 16).
        let mut node = unsafe { NonNull::new_unchecked(addr as *mut FreeBlockNode) };
        unsafe { list.push_front(node.as_mut()) };
        false
    }

    pub fn free_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Addresses currently on this class's free list, for diagnostics.
    pub fn free_addresses(&self, mut f: impl FnMut(usize)) {
        let list = self.free_list.lock();
        let mut cursor = list.head();
        while let Some(node) = cursor {
            f(node.as_ptr() as usize);
            // SAFETY: node is linked into the list we're holding the lock for.
            cursor = unsafe { node.as_ref() }.next();
        }
    }
}

/// The fixed table of size-class descriptors, ascending by block size.
pub struct DescriptorTable {
    descriptors: [Descriptor; NUM_CLASSES],
}

impl DescriptorTable {
    pub const fn new() -> Self {
        let mut descriptors = [const { Descriptor::new(0) }; NUM_CLASSES];
        let mut i = 0;
        while i < NUM_CLASSES {
            descriptors[i] = Descriptor::new(CLASS_SIZES[i]);
            i += 1;
        }
        Self { descriptors }
    }

    pub fn get(&self, class_idx: usize) -> &Descriptor {
        &self.descriptors[class_idx]
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(align(16))]
    struct Block([u8; 32]);

    fn addr_of(block: &Block) -> usize {
        core::ptr::from_ref(block) as usize
    }

    #[test]
    fn push_then_pop_returns_same_address() {
        let desc = Descriptor::new(16);
        let mut block = Block([0; 32]);
        let addr = addr_of(&mut block);
        // SAFETY: block is stack-allocated, at least 16 bytes, not linked
        // on any free list.
        unsafe { desc.push(addr) };
        assert_eq!(desc.pop(), Some(addr));
        assert_eq!(desc.pop(), None);
    }

    #[test]
    fn remove_buddy_or_push_finds_existing_buddy() {
        let desc = Descriptor::new(16);
        let mut buddy = Block([0; 32]);
        let mut mine = Block([0; 32]);
        let buddy_addr = addr_of(&mut buddy);
        let mine_addr = addr_of(&mut mine);
        // SAFETY: buddy is stack-allocated, at least 16 bytes, not linked
        // on any free list.
        unsafe { desc.push(buddy_addr) };
        // SAFETY: buddy_addr is linked on this list; mine_addr is ours and
        // unlinked.
        let found = unsafe { desc.remove_buddy_or_push(buddy_addr, mine_addr) };
        assert!(found, "buddy must be found and removed");
        assert_eq!(desc.free_count(), 0, "neither half is left on the list");
    }

    #[test]
    fn remove_buddy_or_push_pushes_when_buddy_absent() {
        let desc = Descriptor::new(16);
        let mut mine = Block([0; 32]);
        let mine_addr = addr_of(&mut mine);
        // SAFETY: mine_addr is ours, unlinked, at least 16 bytes; the buddy
        // address is a synthetic non-matching address, never dereferenced
        // since the (empty) list has nothing to compare it against.
        let found = unsafe { desc.remove_buddy_or_push(mine_addr + 16, mine_addr) };
        assert!(!found, "no buddy on an empty list");
        assert_eq!(desc.free_count(), 1);
        assert_eq!(desc.pop(), Some(mine_addr));
    }
}
