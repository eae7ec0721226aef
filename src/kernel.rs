//! Arena memory for hosted environments.
//!
//! On bare metal the arena is whatever region the linker script or the boot
//! code sets aside. When running under an operating system (tests, tools,
//! demos) somebody still has to produce that region, so [`HostArena`] asks the
//! kernel for a fresh mapping. The allocator itself never calls into this
//! module: the arena is mapped once, up front, and never grown.

use core::{
    mem,
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering},
};

use log::debug;

use crate::{Arena, error::ArenaError};

/// Virtual memory page size of the computer, usually 4096. Zero until the
/// first query, we can't know it at compile time.
static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

/// Carrier for the platform specific implementation of [`PlatformMemory`].
pub(crate) struct Kernel;

/// This trait provides an abstraction to handle low level memory operations
/// and syscalls. The arena has nothing to do with the concrete APIs offered
/// by each kernel.
trait PlatformMemory {
    /// Request a memory region of size `len`. It returns a pointer to the
    /// given location or None if the underlying syscall fails.
    unsafe fn request_memory(len: usize) -> Option<NonNull<u8>>;

    /// Returns the memory of size `len` starting from `addr` back to the kernel.
    unsafe fn return_memory(addr: NonNull<u8>, len: usize);

    /// Returns the virtual memory page size of the computer in bytes.
    unsafe fn page_size() -> usize;
}

/// Page size of the host, queried once and cached.
#[inline]
pub fn page_size() -> usize {
    match PAGE_SIZE.load(Ordering::Relaxed) {
        0 => {
            let size = unsafe { Kernel::page_size() };
            PAGE_SIZE.store(size, Ordering::Relaxed);
            size
        }
        size => size,
    }
}

/// A private, zero-filled, read-write mapping to be used as an [`Arena`].
///
/// The mapping is returned to the kernel when this value is dropped, unless
/// it was turned into a permanent arena with [`HostArena::leak`].
#[derive(Debug)]
pub struct HostArena {
    addr: NonNull<u8>,
    len: usize,
}

impl HostArena {
    /// Maps at least `len` bytes, rounded up to whole pages.
    pub fn map(len: usize) -> Result<Self, ArenaError> {
        if len == 0 {
            return Err(ArenaError::ZeroLength);
        }

        let page = page_size();
        let len = len.checked_add(page - 1).ok_or(ArenaError::MapFailed { len })? & !(page - 1);

        let addr = unsafe { Kernel::request_memory(len) }.ok_or(ArenaError::MapFailed { len })?;
        debug!("mapped {len} bytes at {addr:p} for an arena");

        Ok(Self { addr, len })
    }

    /// Size of the mapping in bytes, always a multiple of [`page_size`].
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Describes the mapping as an arena.
    ///
    /// **SAFETY**: this `HostArena` must outlive every allocator built over
    /// the returned arena, and only one allocator may use it at a time.
    pub unsafe fn arena(&self) -> Arena {
        unsafe { Arena::from_raw_parts(self.addr.as_ptr(), self.len) }
    }

    /// Gives up ownership of the mapping, it stays mapped until the process
    /// exits.
    pub fn leak(self) -> Arena {
        // SAFETY: the mapping is never unmapped after this, and `self` is
        // consumed so no other arena can be made from it.
        let arena = unsafe { self.arena() };
        mem::forget(self);

        arena
    }
}

impl Drop for HostArena {
    fn drop(&mut self) {
        debug!("unmapping {} bytes at {:p}", self.len, self.addr);
        unsafe { Kernel::return_memory(self.addr, self.len) }
    }
}

#[cfg(unix)]
mod unix {
    use super::{Kernel, PlatformMemory};

    use libc::{c_void, mmap, munmap, size_t};

    use core::ptr::{self, NonNull};

    impl PlatformMemory for Kernel {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            // Anonymous private pages, zero filled and never backed by a file.
            let addr = unsafe {
                mmap(
                    ptr::null_mut(),
                    len as size_t,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                    -1,
                    0,
                )
            };

            if addr == libc::MAP_FAILED {
                return None;
            }

            NonNull::new(addr.cast())
        }

        unsafe fn return_memory(addr: NonNull<u8>, len: usize) {
            unsafe {
                munmap(addr.as_ptr().cast::<c_void>(), len as size_t);
            }
        }

        unsafe fn page_size() -> usize {
            unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) as usize }
        }
    }
}

#[cfg(windows)]
mod windows {
    use core::{ffi::c_void, mem::MaybeUninit, ptr::NonNull};

    use super::{Kernel, PlatformMemory};

    use windows::Win32::System::{Memory, SystemInformation};

    impl PlatformMemory for Kernel {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            // Reserved and committed at once, an arena is touched right away.
            let addr = unsafe {
                Memory::VirtualAlloc(
                    None,
                    len,
                    Memory::MEM_RESERVE | Memory::MEM_COMMIT,
                    Memory::PAGE_READWRITE,
                )
            };

            NonNull::new(addr.cast())
        }

        unsafe fn return_memory(addr: NonNull<u8>, _len: usize) {
            unsafe {
                let _ = Memory::VirtualFree(addr.as_ptr().cast::<c_void>(), 0, Memory::MEM_RELEASE);
            }
        }

        unsafe fn page_size() -> usize {
            unsafe {
                let mut system_info = MaybeUninit::uninit();
                SystemInformation::GetSystemInfo(system_info.as_mut_ptr());

                system_info.assume_init().dwPageSize as usize
            }
        }
    }
}
