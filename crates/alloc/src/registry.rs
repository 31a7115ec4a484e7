//! The small-arena registry: every page currently hosting size-class blocks,
//! tracked so a page with no blocks handed out can be found and reclaimed.
//!
//! Big arenas (oversized, whole-page allocations) are never linked here.

use core::ptr::NonNull;

use nk_utils::list::{IntrusiveList, ListNode};
use nk_utils::Mutex;

use crate::arena::ArenaHeader;

pub struct Registry {
    arenas: Mutex<IntrusiveList<ArenaHeader>>,
}

impl Registry {
    pub const fn new() -> Self {
        Self {
            arenas: Mutex::new(IntrusiveList::new()),
        }
    }

    /// Link a freshly initialized small arena into the registry.
    ///
    /// # Safety
    /// `arena` must not already be linked into this or any other registry.
    pub unsafe fn insert(&self, mut arena: NonNull<ArenaHeader>) {
        let mut list = self.arenas.lock();
        // SAFETY: caller guarantees arena is unlinked.
        unsafe { list.push_front(arena.as_mut()) };
    }

    /// Unlink an arena, e.g. just before its page is returned to the page
    /// source.
    ///
    /// # Safety
    /// `arena` must currently be linked into this registry.
    pub unsafe fn remove(&self, mut arena: NonNull<ArenaHeader>) {
        let mut list = self.arenas.lock();
        // SAFETY: caller guarantees arena is linked here.
        unsafe { list.remove(arena.as_mut()) };
    }

    pub fn len(&self) -> usize {
        self.arenas.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.arenas.lock().is_empty()
    }

    /// Visit every registered small arena, for diagnostics.
    pub fn for_each(&self, mut f: impl FnMut(NonNull<ArenaHeader>)) {
        let list = self.arenas.lock();
        let mut cursor = list.head();
        while let Some(arena) = cursor {
            f(arena);
            // SAFETY: arena is linked into the list we're holding the lock for.
            cursor = unsafe { arena.as_ref() }.next();
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
