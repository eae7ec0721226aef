//! Error types. The allocation path itself never returns these, it reports
//! failure with a null pointer like any other allocator. They show up where
//! a caller can do something about it: setting the arena up, and checking it.

use thiserror::Error;

/// Why an arena could not be turned into a heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("arena has {capacity} usable bytes, at least {required} are needed")]
    ArenaTooSmall { capacity: usize, required: usize },
}

/// Inconsistencies found while walking the block ring.
///
/// Any of these means memory outside of the allocator's control wrote into a
/// header, typically through a buffer overrun or a bad release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapCorruption {
    #[error("allocator has not been initialized")]
    Uninitialized,
    #[error("header at {addr:#x} is not word aligned")]
    Misaligned { addr: usize },
    #[error("block at {addr:#x} links to {next:#x}, outside the arena or backwards")]
    BadLink { addr: usize, next: usize },
    #[error("sentinel does not close the ring")]
    OpenRing,
    #[error("search cursor at {addr:#x} is not a block of the ring")]
    DetachedCursor { addr: usize },
    #[error("block at {addr:#x} has {size} bytes, less than any block can have")]
    Undersized { addr: usize, size: usize },
}

/// Failure to obtain arena memory from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("cannot map an empty arena")]
    ZeroLength,
    #[error("operating system refused to map {len} bytes")]
    MapFailed { len: usize },
}
