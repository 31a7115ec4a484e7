//! End-to-end scenarios against a host-backed page source: each mirrors one
//! concrete allocation pattern the buddy layer must handle correctly.

use nk_alloc::testing::MockPages;
use nk_alloc::Allocator;

fn new_allocator() -> Allocator<MockPages> {
    Allocator::new(MockPages::new())
}

#[test]
fn small_alloc_on_empty_heap_splits_down_and_fully_coalesces() {
    let a = new_allocator();
    let p = a.alloc(40).expect("alloc(40) should succeed");
    assert_eq!(a.registry_len(), 1, "one arena backs the request");

    let mut out = std::string::String::new();
    a.dump_free_memory(&mut out).unwrap();
    for class in ["class 512:", "class 256:", "class 128:", "class 64:"] {
        assert!(out.contains(class), "missing {class} in dump:\n{out}");
    }

    a.free(Some(p));
    assert_eq!(a.registry_len(), 0, "full coalescence returns the page");
    assert_eq!(a.pages().live_count(), 0);
    assert_eq!(a.pages().freed_calls(), 1);
}

#[test]
fn oversized_alloc_uses_one_page() {
    let a = new_allocator();
    let p = a.alloc(3000).expect("3000 + header fits one page");
    assert_eq!(a.registry_len(), 0, "big arenas are never registered");
    a.free(Some(p));
    assert_eq!(a.pages().live_count(), 0);
    assert_eq!(a.pages().freed_calls(), 1);
}

#[test]
fn oversized_alloc_spans_two_pages() {
    let a = new_allocator();
    let p = a.alloc(5000).expect("5000 + header needs two pages");
    a.free(Some(p));
    assert_eq!(a.pages().live_count(), 0);
    assert_eq!(a.pages().freed_calls(), 1);
}

#[test]
fn minimum_class_buddies_are_exactly_one_block_size_apart() {
    let a = new_allocator();
    let x = a.alloc(16).unwrap();
    let y = a.alloc(16).unwrap();
    let diff = (x.as_ptr() as usize).abs_diff(y.as_ptr() as usize);
    assert_eq!(diff, 16, "x and y must be class-16 buddies");
    assert_eq!(a.registry_len(), 1, "both came from the same fresh arena");

    a.free(Some(x));
    a.free(Some(y));
    assert_eq!(a.registry_len(), 0, "freeing both coalesces all the way up");
}

#[test]
fn calloc_detects_overflow_and_zeroes_otherwise() {
    let a = new_allocator();
    assert!(a.calloc(usize::MAX, 2).is_none());

    let p = a.calloc(10, 10).unwrap();
    // SAFETY: calloc(10, 10) guarantees 100 zeroed, contiguous bytes.
    let bytes = unsafe { core::slice::from_raw_parts(p.as_ptr(), 100) };
    assert!(bytes.iter().all(|&b| b == 0));
    a.free(Some(p));
}

#[test]
fn interleaved_small_allocations_all_reclaim() {
    let a = new_allocator();
    let mut ptrs: std::vec::Vec<_> = (0..40).map(|_| a.alloc(40).unwrap()).collect();
    // Free every other one first, then the rest, to exercise out-of-order
    // coalescing rather than a neat LIFO unwind.
    let odd: std::vec::Vec<_> = ptrs.iter().step_by(2).copied().collect();
    ptrs.retain(|p| !odd.contains(p));
    for p in odd.into_iter().chain(ptrs) {
        a.free(Some(p));
    }
    assert_eq!(a.registry_len(), 0);
    assert_eq!(a.pages().live_count(), 0);
}

#[test]
fn realloc_grows_and_preserves_prefix_across_a_class_change() {
    let a = new_allocator();
    let p = a.alloc(16).unwrap();
    // SAFETY: p has at least 16 usable bytes.
    unsafe { core::ptr::write_bytes(p.as_ptr(), 0x5a, 16) };

    let q = a.realloc(Some(p), 900).unwrap();
    // SAFETY: q has at least 900 usable bytes; the first 16 are preserved.
    let bytes = unsafe { core::slice::from_raw_parts(q.as_ptr(), 16) };
    assert!(bytes.iter().all(|&b| b == 0x5a));

    a.free(Some(q));
    assert_eq!(a.registry_len(), 0);
}
