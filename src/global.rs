use core::{
    alloc::{GlobalAlloc, Layout},
    ptr,
};

use log::trace;
use spin::{Mutex, MutexGuard};

use crate::{Arena, ArenaAlloc, WORD};

/// [`ArenaAlloc`] behind a spin lock, usable as the `#[global_allocator]`.
///
/// ```rust,no_run
/// use arenalloc::{Arena, GlobalArena};
///
/// const HEAP_SIZE: usize = 1 << 20;
/// static mut HEAP: [u8; HEAP_SIZE] = [0; HEAP_SIZE];
///
/// #[global_allocator]
/// static ALLOCATOR: GlobalArena =
///     GlobalArena::new(unsafe { Arena::from_raw_parts(&raw mut HEAP as *mut u8, HEAP_SIZE) });
/// ```
///
/// Only word alignment is supported. Layouts asking for more get a null
/// pointer, which the standard collections report as an allocation error.
///
/// The lock is held while logging, so a logger installed next to this
/// allocator must not allocate itself.
pub struct GlobalArena {
    heap: Mutex<ArenaAlloc>,
}

impl GlobalArena {
    pub const fn new(arena: Arena) -> Self {
        Self { heap: Mutex::new(ArenaAlloc::new(arena)) }
    }

    /// Direct access to the allocator, to look at stats or check the heap.
    pub fn lock(&self) -> MutexGuard<'_, ArenaAlloc> {
        self.heap.lock()
    }
}

unsafe impl GlobalAlloc for GlobalArena {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > WORD {
            trace!("alloc({layout:?}) -> null, alignment above {WORD}");
            return ptr::null_mut();
        }

        self.heap.lock().allocate(layout.size())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        unsafe { self.heap.lock().release(ptr) }
    }
}
