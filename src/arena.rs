use core::ptr::NonNull;

use crate::{HEADER_SIZE, MIN_SIZE, WORD, error::InitError, utils::{align_down, align_up}};

/// The fixed region of memory handed to the allocator by whoever hosts it.
///
/// An `Arena` is only a pair of bounds, it doesn't own anything. The memory
/// behind it must stay valid, and must not be touched by anyone else, for as
/// long as an allocator is using it. It is never grown, shrunk or returned.
///
/// ```text
///   start                                                 start + len
///     |                                                         |
///     v                                                         v
///     +--+------------------------------------------------+--+--+
///     |//| first (free)                                    |la|//|
///     +--+------------------------------------------------+--+--+
///      ^                                                    ^  ^
///      alignment slack                         sentinel ----+  slack
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Arena {
    start: *mut u8,
    len: usize,
}

impl Arena {
    /// Describes the `len` bytes starting at `start`.
    ///
    /// **SAFETY**: the whole range must be valid for reads and writes, and
    /// nothing else may access it while an allocator built over it is alive.
    pub const unsafe fn from_raw_parts(start: *mut u8, len: usize) -> Self {
        Self { start, len }
    }

    /// Uses a buffer that lives for the rest of the program as the arena.
    pub fn from_slice(buf: &'static mut [u8]) -> Self {
        Self { start: buf.as_mut_ptr(), len: buf.len() }
    }

    #[inline]
    pub fn start(&self) -> *mut u8 {
        self.start
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Word aligned sub-range the allocator will actually manage.
    ///
    /// The start is rounded up and the end rounded down so neither bound
    /// leaves the region. Fails if what is left can't hold a free block of
    /// [`MIN_SIZE`] plus the sentinel.
    pub(crate) fn usable(&self) -> Result<(NonNull<u8>, usize), InitError> {
        let required = 2 * HEADER_SIZE + MIN_SIZE;
        let too_small = |capacity| InitError::ArenaTooSmall { capacity, required };

        let addr = self.start.addr();
        let end = addr.checked_add(self.len).ok_or(too_small(0))?;
        let aligned_start = align_up(addr, WORD).ok_or(too_small(0))?;
        let aligned_end = align_down(end, WORD);

        let capacity = aligned_end.saturating_sub(aligned_start);
        if capacity < required {
            return Err(too_small(capacity));
        }

        let start = NonNull::new(self.start.with_addr(aligned_start)).ok_or(too_small(capacity))?;

        Ok((start, capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misaligned_bounds_are_trimmed_inwards() {
        let mut buf = [0usize; 16];
        let base = buf.as_mut_ptr().cast::<u8>();

        let arena = unsafe { Arena::from_raw_parts(base.wrapping_add(1), 16 * WORD - 2) };
        let (start, capacity) = arena.usable().unwrap();

        assert_eq!(start.as_ptr().addr(), base.addr() + WORD);
        assert_eq!(capacity, 14 * WORD);
    }

    #[test]
    fn tiny_arena_is_rejected() {
        let mut buf = [0usize; 2];
        let arena = unsafe { Arena::from_raw_parts(buf.as_mut_ptr().cast(), 2 * WORD) };

        assert_eq!(
            arena.usable(),
            Err(InitError::ArenaTooSmall { capacity: 2 * WORD, required: 2 * HEADER_SIZE + MIN_SIZE })
        );
    }

    #[test]
    fn smallest_valid_arena_is_accepted() {
        let mut buf = [0usize; 4];
        let len = 2 * HEADER_SIZE + MIN_SIZE;
        let arena = unsafe { Arena::from_raw_parts(buf.as_mut_ptr().cast(), len) };

        assert_eq!(arena.usable().map(|(_, capacity)| capacity), Ok(len));
    }
}
