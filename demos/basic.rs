use arenalloc::{ArenaAlloc, HostArena};

fn log_alloc(addr: *mut u8, size: usize) {
    println!("Requested {size} bytes of memory");
    println!("Received this address: {addr:?}");
}

fn main() {
    let host = HostArena::map(64 * 1024).expect("could not map an arena");
    let mut allocator = ArenaAlloc::new(unsafe { host.arena() });

    let addr1 = allocator.allocate(size_of::<u64>());
    log_alloc(addr1, size_of::<u64>());

    let addr2 = allocator.allocate(8);
    log_alloc(addr2, 8);

    let addr3 = allocator.allocate(16);
    log_alloc(addr3, 16);

    unsafe {
        allocator.release(addr1);
        allocator.release(addr3);
    }

    // Next-fit: the search carries on after addr3 instead of reusing addr1.
    let addr4 = allocator.allocate(8);
    log_alloc(addr4, 8);

    unsafe {
        allocator.release(addr2);
        allocator.release(addr4);
    }

    for block in &allocator {
        println!("{:p}: {} bytes, free = {}", block.payload, block.size, block.free);
    }
    println!("{:?}", allocator.stats());
}
