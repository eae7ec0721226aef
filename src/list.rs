use core::{marker::PhantomData, ptr::NonNull};

use crate::{ArenaAlloc, HEADER_SIZE, MIN_SIZE, WORD, block::BlockPtr, error::HeapCorruption};

/// What a heap walk reports about one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Address the block's user memory starts at.
    pub payload: NonNull<u8>,
    /// Usable bytes, not counting the header.
    pub size: usize,
    pub free: bool,
}

/// Occupancy summary of an arena. All zero while uninitialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Aligned bytes under management, headers included.
    pub capacity: usize,
    /// Blocks in the ring, not counting the sentinel.
    pub blocks: usize,
    pub free_blocks: usize,
    pub free_bytes: usize,
    pub used_bytes: usize,
    /// Biggest single free block. Adjacent free blocks that have not been
    /// merged yet are counted separately.
    pub largest_free: usize,
}

/// Iterator over the blocks of an arena in address order, sentinel excluded.
pub struct Blocks<'a> {
    current: Option<BlockPtr>,
    last: Option<BlockPtr>,
    marker: PhantomData<&'a ArenaAlloc>,
}

impl<'a> Iterator for Blocks<'a> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.current?;

        if Some(block) == self.last {
            self.current = None;
            return None;
        }

        self.current = Some(block.next());

        Some(BlockInfo { payload: block.payload(), size: block.size(), free: block.is_free() })
    }
}

impl<'a> IntoIterator for &'a ArenaAlloc {
    type Item = BlockInfo;
    type IntoIter = Blocks<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks()
    }
}

impl ArenaAlloc {
    /// Walks the heap from the first block to the one before the sentinel.
    ///
    /// Trusts every link it follows, use [`ArenaAlloc::check`] first if the
    /// heap might be corrupted.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            current: self.ring().map(|ring| ring.first),
            last: self.ring().map(|ring| ring.last),
            marker: PhantomData,
        }
    }

    pub fn stats(&self) -> HeapStats {
        let Some(ring) = self.ring() else {
            return HeapStats::default();
        };

        let mut stats = HeapStats {
            capacity: ring.last.addr() + HEADER_SIZE - ring.first.addr(),
            ..HeapStats::default()
        };

        for block in self {
            stats.blocks += 1;

            if block.free {
                stats.free_blocks += 1;
                stats.free_bytes += block.size;
                stats.largest_free = stats.largest_free.max(block.size);
            } else {
                stats.used_bytes += block.size;
            }
        }

        stats
    }

    /// Verifies the ring without trusting it.
    ///
    /// Every link is bounds checked before it is followed and the walk gives
    /// up after as many steps as the arena has words, so a corrupted header
    /// produces an error instead of a wild read or an endless loop. Since
    /// links must strictly increase up to the sentinel, a successful check
    /// also means the blocks tile the arena with no gaps or overlaps.
    pub fn check(&self) -> Result<(), HeapCorruption> {
        let ring = self.ring().ok_or(HeapCorruption::Uninitialized)?;
        let (first, last) = (ring.first, ring.last);

        let steps = (last.addr() + HEADER_SIZE - first.addr()) / WORD;
        let mut cursor_seen = false;
        let mut block = first;

        for _ in 0..steps {
            cursor_seen |= block == ring.cursor;

            if block == last {
                if last.is_free() || last.next_addr() != first.addr() {
                    return Err(HeapCorruption::OpenRing);
                }
                if !cursor_seen {
                    return Err(HeapCorruption::DetachedCursor { addr: ring.cursor.addr() });
                }

                return Ok(());
            }

            // Only the raw address is looked at until it is known to name a
            // header inside the arena. A null link fails the ordering test.
            let next = block.next_addr();
            if next % WORD != 0 {
                return Err(HeapCorruption::Misaligned { addr: next });
            }
            if next <= block.addr() || next > last.addr() {
                return Err(HeapCorruption::BadLink { addr: block.addr(), next });
            }

            let size = next - block.addr() - HEADER_SIZE;
            if size < MIN_SIZE {
                return Err(HeapCorruption::Undersized { addr: block.addr(), size });
            }

            block = block.next();
        }

        Err(HeapCorruption::OpenRing)
    }
}
