//! Arena header, written into the first bytes of every page this crate owns.
//!
//! Every live pointer this crate hands out can recover its owning arena in
//! O(1): round the pointer down to a page boundary and reinterpret those
//! bytes as an [`ArenaHeader`]. This is the only mechanism for finding the
//! arena from a pointer, there is no side table keyed by address.

use core::ptr::NonNull;

use nk_utils::list::ListNode;
use nk_utils::Mutex;

use crate::classes::{FINEST_SLOTS, PAGE_SIZE};

/// Sentinel written into every arena header. A pointer whose rounded-down
/// page does not start with this value did not come from this allocator (or
/// the arena has been corrupted); either is fatal.
pub const ARENA_MAGIC: u32 = 0x4255_4459; // "BUDY"

/// Which class currently governs a [`FINEST_SLOTS`] position, or "no block
/// starts here" for positions mid-block.
pub const NO_CLASS: u8 = 0xff;

/// Header occupying the start of every page owned by this allocator.
///
/// Present for both small and big arenas (`num_pages == 0` vs `> 0`) so that
/// [`arena_of`] can read the discriminant without knowing the variant ahead
/// of time, matching the single `struct arena` the buddy layer is
/// distilled from. `registry_next`/`registry_prev`/`slots` are unused by big
/// arenas, which are never linked into the registry.
#[repr(C)]
pub struct ArenaHeader {
    magic: u32,
    /// `0` for a small arena (size-class blocks); otherwise the page count
    /// of a big, oversized allocation.
    num_pages: u32,
    registry_next: Option<NonNull<ArenaHeader>>,
    registry_prev: Option<NonNull<ArenaHeader>>,
    /// Out-of-band class tracking, one entry per `MIN_BLOCK_SIZE`-sized
    /// position within the arena's single top-class span. Entries covering
    /// a larger, currently-uncombined block all read back that block's
    /// class index; `NO_CLASS` marks a position never reached by `alloc`.
    ///
    /// A class tag cannot live inside the block it describes: the smallest
    /// class (16 bytes) is exactly two pointers, leaving no room for a
    /// size field once the free-list links are also needed. Keeping the
    /// tag here, rather than in the block's own memory, is the same
    /// out-of-band trick the page frame table uses for block order.
    ///
    /// Unlike that frame table's `order` field, this table is read and
    /// mutated from both `alloc`'s split path and `free`'s coalesce path
    /// with no outer lock serializing the two (spec.md §5 allows concurrent
    /// `alloc`/`free`). The frame table gets away with a bare field only
    /// because its owner is itself `&mut self` behind one allocator-wide
    /// lock; this table has no such owner, so it carries its own lock.
    slots: Mutex<[u8; FINEST_SLOTS]>,
}

impl ArenaHeader {
    pub fn init_small(&mut self) {
        self.magic = ARENA_MAGIC;
        self.num_pages = 0;
        self.registry_next = None;
        self.registry_prev = None;
        self.slots = Mutex::new([NO_CLASS; FINEST_SLOTS]);
    }

    pub fn init_big(&mut self, num_pages: u32) {
        debug_assert!(num_pages > 0);
        self.magic = ARENA_MAGIC;
        self.num_pages = num_pages;
        self.registry_next = None;
        self.registry_prev = None;
        self.slots = Mutex::new([NO_CLASS; FINEST_SLOTS]);
    }

    pub fn check_magic(&self) {
        assert_eq!(self.magic, ARENA_MAGIC, "corrupt arena header");
    }

    pub fn is_small(&self) -> bool {
        self.num_pages == 0
    }

    pub fn num_pages(&self) -> usize {
        self.num_pages as usize
    }

    /// Byte offset from the arena base to the first usable data byte,
    /// rounded up to the platform's pointer alignment.
    pub fn data_offset() -> usize {
        let align = core::mem::align_of::<ArenaHeader>();
        (core::mem::size_of::<ArenaHeader>() + align - 1) & !(align - 1)
    }

    /// Base address of the page this header sits at the front of.
    pub fn base_addr(&self) -> usize {
        core::ptr::from_ref(self) as usize
    }

    pub fn data_addr(&self) -> usize {
        self.base_addr() + Self::data_offset()
    }

    /// Index into `slots` for a data-region address.
    pub fn finest_index_of(&self, addr: usize) -> usize {
        (addr - self.data_addr()) / crate::classes::MIN_BLOCK_SIZE
    }

    pub fn class_at(&self, finest_idx: usize) -> u8 {
        self.slots.lock()[finest_idx]
    }

    /// Mark `count` consecutive finest-granularity positions, starting at
    /// `start`, as belonging to class `class_idx`.
    ///
    /// Takes `&self`, not `&mut self`: the table is guarded by its own lock
    /// so this can be called from splitting and coalescing on the same
    /// arena at the same time from different threads.
    pub fn set_class_range(&self, start: usize, count: usize, class_idx: u8) {
        self.slots.lock()[start..start + count].fill(class_idx);
    }
}

impl ListNode for ArenaHeader {
    fn next(&self) -> Option<NonNull<Self>> {
        self.registry_next
    }
    fn prev(&self) -> Option<NonNull<Self>> {
        self.registry_prev
    }
    fn set_next(&mut self, next: Option<NonNull<Self>>) {
        self.registry_next = next;
    }
    fn set_prev(&mut self, prev: Option<NonNull<Self>>) {
        self.registry_prev = prev;
    }
}

/// Recover the owning arena header from any pointer this allocator handed
/// out, by rounding down to the page it lives in.
///
/// # Safety
/// `ptr` must be a live pointer previously returned by this allocator's
/// `alloc`/`calloc`/`realloc`.
pub unsafe fn arena_of(ptr: NonNull<u8>) -> NonNull<ArenaHeader> {
    let page_base = (ptr.as_ptr() as usize) & !(PAGE_SIZE - 1);
    // SAFETY: page_base is the start of the page `ptr` falls within, which
    // this allocator wrote a valid ArenaHeader into before handing out ptr.
    unsafe { NonNull::new_unchecked(page_base as *mut ArenaHeader) }
}
