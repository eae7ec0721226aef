//! # arenalloc
//!
//! A heap allocator for environments without one. The host hands over a
//! single fixed [`Arena`] and [`ArenaAlloc`] serves `allocate` / `release`
//! out of it, no system allocator and no syscalls involved.
//!
//! Every block has a one word header preceding the memory the user gets:
//!
//! ```text
//! +-------------------------------+
//! | Header   | Actual memory block|
//! +-------------------------------+
//!            ^
//!            returned pointer
//! ```
//!
//! Headers link to the next header in address order and the last one links
//! back to the first, so the whole arena is one circular list:
//!
//! ```text
//!   +-----------------------------------------------------------------+
//!   v                                                                 |
//! +------+------+   +------+------+   +------+----------+   +------+  |
//! | used | .... |-->| free | .... |-->| used | ........ |-->| last |--+
//! +------+------+   +------+------+   +------+----------+   +------+
//!                       ^
//!                     cursor
//! ```
//!
//! Allocation is *next-fit*: the search starts where the previous one
//! stopped instead of at the first block, so recently freed low blocks are
//! only reused once the cursor comes around again.
//!
//! ## Crate Structure
//!
//! ```text
//!   arenalloc
//!   ├── arena    - Arena bounds supplied by the host
//!   ├── block    - Tagged block header (internal)
//!   ├── error    - InitError, HeapCorruption, ArenaError
//!   ├── global   - GlobalArena, a GlobalAlloc over a spin lock
//!   ├── kernel   - HostArena, arena memory mapped from the OS (feature `host`)
//!   ├── list     - Heap walk, statistics and integrity check
//!   └── utils    - Alignment helpers
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use arenalloc::{Arena, ArenaAlloc};
//!
//! static mut HEAP: [u8; 4096] = [0; 4096];
//!
//! let arena = unsafe { Arena::from_raw_parts(&raw mut HEAP as *mut u8, 4096) };
//! let mut heap = ArenaAlloc::new(arena);
//!
//! let ptr = heap.allocate(64);
//! assert!(!ptr.is_null());
//! unsafe { heap.release(ptr) };
//! ```
#![no_std]

#[cfg(test)]
extern crate std;

mod arena;
mod block;
pub mod error;
pub mod global;
#[cfg(all(feature = "host", any(unix, windows)))]
pub mod kernel;
mod list;
pub mod utils;

use core::{mem, ptr::{self, NonNull}};

use log::{debug, trace, warn};

use crate::{block::BlockPtr, utils::request_size};

pub use crate::{
    arena::Arena,
    block::HEADER_SIZE,
    error::{ArenaError, HeapCorruption, InitError},
    global::GlobalArena,
    list::{BlockInfo, Blocks, HeapStats},
};

#[cfg(all(feature = "host", any(unix, windows)))]
pub use crate::kernel::HostArena;

/// Machine word size. Every header and every returned pointer is aligned to
/// this, and every payload size is a multiple of it.
pub const WORD: usize = mem::size_of::<usize>();

/// The minimum payload a block can have. Smaller requests are rounded up to
/// this and no split leaves a free block smaller than it.
pub const MIN_SIZE: usize = 8;

/// Block bookkeeping of an initialized arena.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Ring {
    /// Block at the aligned arena start.
    pub first: BlockPtr,
    /// Sentinel at the aligned arena end, never free and never handed out.
    pub last: BlockPtr,
    /// Where the next search starts.
    pub cursor: BlockPtr,
}

/// Next-fit allocator over a single [`Arena`].
///
/// The allocator is created empty and lays out its blocks on the first call
/// to [`ArenaAlloc::allocate`] (or an explicit [`ArenaAlloc::init`]). It
/// never asks for more memory and never gives the arena back.
pub struct ArenaAlloc {
    arena: Arena,
    ring: Option<Ring>,
}

// SAFETY: the allocator is the only one touching its arena, moving it to
// another thread moves that exclusive access with it.
unsafe impl Send for ArenaAlloc {}

impl ArenaAlloc {
    pub const fn new(arena: Arena) -> Self {
        Self { arena, ring: None }
    }

    pub fn arena(&self) -> Arena {
        self.arena
    }

    pub fn is_initialized(&self) -> bool {
        self.ring.is_some()
    }

    pub(crate) fn ring(&self) -> Option<&Ring> {
        self.ring.as_ref()
    }

    /// Lays out the arena as one free block followed by the sentinel.
    ///
    /// Calling it on an allocator that is already in use does nothing. If the
    /// arena is too small the allocator stays uninitialized and every
    /// allocation will return null.
    pub fn init(&mut self) -> Result<(), InitError> {
        if self.ring.is_some() {
            return Ok(());
        }

        let (start, capacity) = self.arena.usable().inspect_err(|err| {
            warn!("arena at {:p} ({} bytes) unusable: {err}", self.arena.start(), self.arena.len());
        })?;

        // SAFETY: `usable` keeps both headers word aligned and inside the
        // arena, with room for at least `MIN_SIZE` bytes between them.
        let (first, last) = unsafe { BlockPtr::ring(start, start.add(capacity - HEADER_SIZE)) };

        debug!(
            "heap initialized at {:#x}..{:#x}, {} bytes free",
            first.addr(),
            last.addr() + HEADER_SIZE,
            first.size()
        );

        self.ring = Some(Ring { first, last, cursor: first });

        Ok(())
    }

    /// Returns a word aligned pointer to at least `size` usable bytes (never
    /// less than [`MIN_SIZE`]), or null if no free block is large enough.
    pub fn allocate(&mut self, size: usize) -> *mut u8 {
        if self.init().is_err() {
            return ptr::null_mut();
        }

        let Some(needed) = request_size(size) else {
            trace!("allocate({size}) -> null, size overflows");
            return ptr::null_mut();
        };

        let Some(ring) = self.ring.as_mut() else {
            return ptr::null_mut();
        };

        match ring.next_fit(needed) {
            Some(block) => {
                trace!("allocate({size}) -> {:p}, {} bytes", block.payload(), block.size());
                block.payload().as_ptr()
            }
            None => {
                trace!("allocate({size}) -> null, no free block of {needed} bytes");
                ptr::null_mut()
            }
        }
    }

    /// Gives a block back to the allocator. Null is ignored.
    ///
    /// Pointers outside the heap and blocks that are already free are
    /// detected and ignored, anything subtler cannot be.
    ///
    /// **SAFETY**: `ptr` must be null or a pointer returned by
    /// [`ArenaAlloc::allocate`] on this allocator that has not been released
    /// since. The memory must not be used afterwards.
    pub unsafe fn release(&mut self, ptr: *mut u8) {
        let Some(payload) = NonNull::new(ptr) else {
            return;
        };

        let Some(ring) = self.ring.as_mut() else {
            warn!("release({ptr:p}) on an uninitialized heap, ignored");
            return;
        };

        if !ring.owns(payload) {
            warn!("release({ptr:p}) outside of the heap, ignored");
            return;
        }

        let block = unsafe { BlockPtr::from_payload(payload) };
        if block.is_free() {
            warn!("release({ptr:p}) of a block that is already free, ignored");
            return;
        }

        block.set_free(true);

        // Merge forward right away. A free block before this one is merged
        // by the next search that needs the space.
        if block.next().is_free() {
            let absorbed = block.absorb_next();
            if ring.cursor == absorbed {
                ring.cursor = block;
            }
        }

        trace!("release({ptr:p}), {} bytes free at {:#x}", block.size(), block.addr());
    }
}

impl Ring {
    /// Whether `payload` could be the payload of one of our blocks.
    fn owns(&self, payload: NonNull<u8>) -> bool {
        let addr = payload.as_ptr().addr();

        addr % WORD == 0 && addr >= self.first.addr() + HEADER_SIZE && addr < self.last.addr()
    }

    /// Walks the ring once, starting at the cursor, and takes the first free
    /// block that fits `needed` bytes.
    ///
    /// Free blocks that are too small swallow free neighbours after them
    /// until they fit or hit a used block. That is what eventually merges a
    /// freed block with a free block in front of it.
    fn next_fit(&mut self, needed: usize) -> Option<BlockPtr> {
        let mut start = self.cursor;
        let mut block = start;

        loop {
            if block.is_free() {
                while block.size() < needed && block.next().is_free() {
                    // Whoever absorbs the starting block becomes the new
                    // start, otherwise the walk would never see it again.
                    if block.absorb_next() == start {
                        start = block;
                    }
                }

                if block.size() >= needed {
                    self.take(block, needed);
                    return Some(block);
                }
            }

            block = block.next();
            if block == start {
                break;
            }
        }

        self.cursor = start;

        None
    }

    /// Marks `block` as used for `needed` bytes, splitting off the tail as a
    /// new free block when it is big enough to be useful on its own.
    fn take(&mut self, block: BlockPtr, needed: usize) {
        if block.size() - needed >= HEADER_SIZE + MIN_SIZE {
            let rest = block.split(needed);

            if rest.next().is_free() {
                rest.absorb_next();
            }
        }

        block.set_free(false);
        self.cursor = block.next();
    }
}
