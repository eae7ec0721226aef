use core::{mem, ptr::NonNull};

/// Header size of a block. A header is a single tagged link, so this is
/// exactly one machine word.
pub const HEADER_SIZE: usize = mem::size_of::<Header>();

/// Bit 0 of the link marks the block as free. Headers are always word
/// aligned, so the bit is never part of a real address.
const FREE_BIT: usize = 0b1;

/// This is the structure of a block. The only stored field is the link to
/// the next block in address order, the free flag is packed into its low bit
/// and the size is derived from where the next header starts.
///
/// ```text
/// +---------------------+ <------+
/// |   next | free (1b)  |        | -> Header (one word)
/// +---------------------+ <------+
/// |       Content       |        |
/// |         ...         |        | -> size = next - self - HEADER_SIZE
/// |         ...         |        |
/// +---------------------+ <------+
/// |   next | free (1b)  |          -> Next header
/// +---------------------+
/// ```
///
/// Blocks never carry their own size, so splitting a block is just writing a
/// header in the middle of it and merging is just skipping over one.
#[repr(C)]
pub(crate) struct Header {
    next: *mut Header,
}

/// Handle to a block header living inside an initialized arena.
///
/// All the accessors read or write through the pointer. That is sound as
/// long as the handle was built from a header the allocator wrote itself,
/// which is what the `unsafe` constructors ask callers to promise.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct BlockPtr(NonNull<Header>);

impl BlockPtr {
    /// Writes a fresh header at `at` and returns a handle to it.
    ///
    /// **SAFETY**: `at` must be word aligned and point to at least
    /// [`HEADER_SIZE`] writable bytes inside the arena.
    pub unsafe fn write(at: NonNull<u8>, next: BlockPtr, free: bool) -> Self {
        let header = at.cast::<Header>();

        unsafe {
            header.as_ptr().write(Header {
                next: next.0.as_ptr().map_addr(|addr| addr | free as usize),
            });
        }

        Self(header)
    }

    /// Lays out the headers of an empty arena: one free block spanning
    /// everything and the sentinel closing the ring behind it.
    ///
    /// ```text
    ///     +------------------------------------------+
    ///     v                                          |
    /// +-------+------------------------------+-------+
    /// | first |       free payload           | last  |
    /// +-------+------------------------------+-------+
    ///     |                                      ^
    ///     +--------------------------------------+
    /// ```
    ///
    /// **SAFETY**: both addresses must be word aligned and inside the arena,
    /// with at least [`HEADER_SIZE`] bytes between `first_at` and `last_at`.
    pub unsafe fn ring(first_at: NonNull<u8>, last_at: NonNull<u8>) -> (Self, Self) {
        let first = Self(first_at.cast());

        unsafe {
            let last = Self::write(last_at, first, false);
            Self::write(first_at, last, true);

            (first, last)
        }
    }

    /// Recovers the header of a payload pointer handed out earlier.
    ///
    /// **SAFETY**: `payload` must come from [`BlockPtr::payload`] of a block
    /// that is still linked into the arena.
    pub unsafe fn from_payload(payload: NonNull<u8>) -> Self {
        unsafe { Self(payload.sub(HEADER_SIZE).cast()) }
    }

    #[inline]
    pub fn addr(self) -> usize {
        self.0.as_ptr().addr()
    }

    #[inline]
    fn link(self) -> *mut Header {
        unsafe { (*self.0.as_ptr()).next }
    }

    #[inline]
    fn set_link(self, link: *mut Header) {
        unsafe { (*self.0.as_ptr()).next = link }
    }

    /// Address the link points at, with the free flag masked off. Unlike
    /// [`BlockPtr::next`] this holds for any bit pattern in the header, so
    /// it is what to look at before following a link that may be garbage.
    #[inline]
    pub fn next_addr(self) -> usize {
        self.link().addr() & !FREE_BIT
    }

    /// Next block in the ring, with the free flag masked off.
    #[inline]
    pub fn next(self) -> BlockPtr {
        // A link is never null once written: it always names a header.
        unsafe { Self(NonNull::new_unchecked(self.link().map_addr(|addr| addr & !FREE_BIT))) }
    }

    /// Points this block at `target`, keeping its own free flag.
    #[inline]
    pub fn set_next(self, target: BlockPtr) {
        let flag = self.link().addr() & FREE_BIT;
        self.set_link(target.0.as_ptr().map_addr(|addr| addr | flag));
    }

    #[inline]
    pub fn is_free(self) -> bool {
        self.link().addr() & FREE_BIT != 0
    }

    #[inline]
    pub fn set_free(self, free: bool) {
        let link = self.link().map_addr(|addr| (addr & !FREE_BIT) | free as usize);
        self.set_link(link);
    }

    /// Usable bytes between this header and the next one.
    ///
    /// Not meaningful for the sentinel, whose successor wraps around to the
    /// start of the arena.
    #[inline]
    pub fn size(self) -> usize {
        self.next().addr() - self.addr() - HEADER_SIZE
    }

    /// First byte after the header, the address the user gets.
    #[inline]
    pub fn payload(self) -> NonNull<u8> {
        unsafe { self.0.cast::<u8>().add(HEADER_SIZE) }
    }

    /// Carves `size` bytes off the front of this block and turns the rest
    /// into a new free block, which is returned.
    ///
    /// ```text
    /// +--------+--------------------------------+
    /// | self   |            payload             |
    /// +--------+--------------------------------+
    ///
    /// +--------+---------+--------+-------------+
    /// | self   |  size   |  rest  |  remainder  |
    /// +--------+---------+--------+-------------+
    /// ```
    ///
    /// The caller guarantees `size + HEADER_SIZE` fits in the payload and
    /// that `size` is word aligned.
    pub fn split(self, size: usize) -> BlockPtr {
        unsafe {
            let at = self.payload().add(size);
            let rest = Self::write(at, self.next(), true);
            self.set_next(rest);

            rest
        }
    }

    /// Unlinks the next block and merges its header and payload into this
    /// one. Returns the block that disappeared so callers holding on to it
    /// can fix up their references.
    pub fn absorb_next(self) -> BlockPtr {
        let absorbed = self.next();
        self.set_next(absorbed.next());

        absorbed
    }
}
