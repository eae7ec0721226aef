use arenalloc::{Arena, ArenaAlloc, HEADER_SIZE, HostArena, InitError, MIN_SIZE, WORD};

/// A fresh allocator over its own mapping. The mapping is returned alongside
/// so it is dropped after the allocator.
fn heap(len: usize) -> (HostArena, ArenaAlloc) {
    let host = HostArena::map(len).unwrap();
    let allocator = ArenaAlloc::new(unsafe { host.arena() });

    (host, allocator)
}

#[test]
fn simple_allocation() {
    let (_host, mut heap) = heap(64 * 1024);

    let ptr = heap.allocate(10 * size_of::<i32>());
    assert!(!ptr.is_null());

    unsafe { heap.release(ptr) };
}

#[test]
fn simple_unique_addresses() {
    let (_host, mut heap) = heap(64 * 1024);
    let size = 10 * size_of::<i32>();

    let ptr1 = heap.allocate(size);
    let ptr2 = heap.allocate(size);

    assert!(ptr1.wrapping_add(size) <= ptr2 || ptr2.wrapping_add(size) <= ptr1);

    unsafe {
        heap.release(ptr1);
        heap.release(ptr2);
    }
}

#[test]
fn min_block_allocation() {
    let (_host, mut heap) = heap(64 * 1024);

    let ptr = heap.allocate(MIN_SIZE / 2);
    assert!(!ptr.is_null());

    let block = heap.blocks().find(|block| block.payload.as_ptr() == ptr).unwrap();
    assert!(block.size >= MIN_SIZE);
    assert!(!block.free);

    unsafe { heap.release(ptr) };
}

#[test]
fn memory_alignment() {
    let (_host, mut heap) = heap(64 * 1024);

    for size in [1, 2, 3, 5, 10 * size_of::<i32>(), 77, 1000] {
        let ptr = heap.allocate(size);
        assert_eq!(ptr.addr() % 8, 0, "memory not aligned to 8-byte boundary");
        assert_eq!(ptr.addr() % WORD, 0);
    }
}

#[test]
fn coalescing_blocks() {
    let (_host, mut heap) = heap(4096);
    let size = 10 * size_of::<i32>();

    let ptr1 = heap.allocate(size);
    let ptr2 = heap.allocate(size);
    assert!(!ptr1.is_null() && !ptr2.is_null());

    // Use up the rest so the freed pair is the only place left.
    let rest = heap.allocate(heap.stats().largest_free);
    assert!(!rest.is_null());
    assert!(heap.allocate(1).is_null());

    unsafe {
        heap.release(ptr1);
        heap.release(ptr2);
    }

    let ptr3 = heap.allocate(2 * size);
    assert_eq!(ptr3, ptr1);
    assert!(heap.check().is_ok());
}

#[test]
fn not_first_fit_strategy() {
    let (_host, mut heap) = heap(64 * 1024);
    let size = 20 * size_of::<i32>();

    let ptr1 = heap.allocate(size);
    let ptr2 = heap.allocate(size);
    let ptr3 = heap.allocate(size);
    assert!(!ptr1.is_null() && !ptr2.is_null() && !ptr3.is_null());

    unsafe {
        heap.release(ptr1);
        heap.release(ptr3);
    }

    let ptr4 = heap.allocate(size);
    assert_ne!(ptr4, ptr1, "allocator uses first-fit");
    assert!(ptr4 >= ptr3, "allocator did not use the expected block");

    unsafe {
        heap.release(ptr2);
        heap.release(ptr4);
    }
}

#[test]
fn init_twice_does_not_reset_the_heap() {
    let (_host, mut heap) = heap(64 * 1024);

    let ptr = heap.allocate(128);
    unsafe { ptr.write_bytes(0x5A, 128) };
    let stats = heap.stats();

    assert_eq!(heap.init(), Ok(()));
    assert_eq!(heap.stats(), stats);

    let other = heap.allocate(128);
    assert!(other.addr() >= ptr.addr() + 128 || other.addr() + 128 <= ptr.addr());
    assert!((0..128).all(|i| unsafe { *ptr.add(i) } == 0x5A));
}

#[test]
fn exhausted_heap_returns_null_until_space_is_released() {
    let (_host, mut heap) = heap(4096);
    heap.init().unwrap();

    let free = heap.stats().free_bytes;
    let half = (free - HEADER_SIZE) / 2 / WORD * WORD;

    let a = heap.allocate(half);
    let b = heap.allocate(half);
    assert!(!a.is_null() && !b.is_null());
    assert!(heap.allocate(MIN_SIZE).is_null());
    assert!(heap.allocate(half).is_null());

    unsafe { heap.release(a) };
    assert!(heap.allocate(2 * half).is_null());
    assert_eq!(heap.allocate(half), a);

    unsafe {
        heap.release(a);
        heap.release(b);
    }
    assert!(!heap.allocate(free).is_null());
}

#[test]
fn arena_too_small_for_a_block_stays_unusable() {
    let buf: &'static mut [u8] = Box::leak(Box::new([0u8; 2 * HEADER_SIZE]));
    let mut heap = ArenaAlloc::new(Arena::from_slice(buf));

    assert!(matches!(heap.init(), Err(InitError::ArenaTooSmall { .. })));
    assert!(heap.allocate(0).is_null());
    assert!(heap.allocate(1).is_null());
    assert!(!heap.is_initialized());
}

#[test]
fn oversized_request_fails_cleanly() {
    let (_host, mut heap) = heap(4096);

    assert!(heap.allocate(usize::MAX).is_null());
    assert!(heap.allocate(1 << 20).is_null());
    assert!(!heap.allocate(64).is_null());
    assert!(heap.check().is_ok());
}
