//! Size and address arithmetic shared by the allocator.
//! None of these touch memory, they only compute where things go.

use crate::{MIN_SIZE, WORD};

/// It aligns `to_be_aligned` up to the next multiple of `alignment`, or
/// returns `None` if that multiple doesn't fit in a `usize`.
///
/// `alignment` must be a power of two. Used to round the arena start and
/// every requested size to the machine word.
#[inline]
pub const fn align_up(to_be_aligned: usize, alignment: usize) -> Option<usize> {
    match to_be_aligned.checked_add(alignment - 1) {
        Some(bumped) => Some(bumped & !(alignment - 1)),
        None => None,
    }
}

/// It aligns `to_be_aligned` down to the previous multiple of `alignment`.
///
/// Used for the arena end, we can never round the end outwards since the
/// bytes past it do not belong to us.
#[inline]
pub const fn align_down(to_be_aligned: usize, alignment: usize) -> usize {
    to_be_aligned & !(alignment - 1)
}

/// Payload size the allocator actually carves for a request of `size` bytes.
///
/// Sizes are rounded to [`WORD`] so every header after a payload stays
/// aligned, and never go below [`MIN_SIZE`]. Returns `None` if rounding
/// would overflow.
#[inline]
pub(crate) fn request_size(size: usize) -> Option<usize> {
    Some(align_up(size, WORD)?.max(MIN_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem;

    #[test]
    fn align_pointer_size() {
        let word = mem::size_of::<usize>();

        for i in 0..10 {
            for size in (word * i + 1)..=(word * (i + 1)) {
                assert_eq!(Some(word * (i + 1)), align_up(size, word));
            }
        }
    }

    #[test]
    fn align_up_reports_overflow() {
        assert_eq!(align_up(0, 8), Some(0));
        assert_eq!(align_up(usize::MAX - 7, 8), Some(usize::MAX - 7));
        assert_eq!(align_up(usize::MAX - 6, 8), None);
        assert_eq!(align_up(usize::MAX, 4096), None);
    }

    #[test]
    fn align_down_never_goes_past_the_value() {
        assert_eq!(align_down(4097, 4096), 4096);
        assert_eq!(align_down(4095, 4096), 0);
        assert_eq!(align_down(23, 8), 16);
        assert_eq!(align_down(24, 8), 24);
    }

    #[test]
    fn small_requests_get_the_minimum_payload() {
        assert_eq!(request_size(0), Some(MIN_SIZE));
        assert_eq!(request_size(1), Some(MIN_SIZE));
        assert_eq!(request_size(MIN_SIZE), Some(MIN_SIZE));
        assert_eq!(request_size(MIN_SIZE + 1), align_up(MIN_SIZE + 1, WORD));
    }

    #[test]
    fn huge_requests_do_not_wrap() {
        assert_eq!(request_size(usize::MAX), None);
        assert_eq!(request_size(usize::MAX - WORD + 2), None);
    }
}
