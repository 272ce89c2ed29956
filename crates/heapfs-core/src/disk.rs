//! Block allocator with a bounded free-block cache.
//!
//! The [`Disk`] is the only resource shared by every regular file in an
//! instance. It hands out fixed-size [`Block`]s, enforces the configured
//! maximum store size, and keeps freed blocks around for reuse up to the
//! configured cache size.
//!
//! ## Locking
//!
//! One mutex guards the allocation count and the cache. Callers may hold a
//! file lock while calling into the disk, never the other way around.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// A fixed-size byte buffer, the unit of allocation.
///
/// Blocks taken from the cache are not zeroed.
pub type Block = Box<[u8]>;

/// Allocation counters and the free-block cache.
#[derive(Debug, Default)]
struct Pool {
    /// Blocks currently owned by files.
    allocated: usize,
    /// Freed blocks kept for reuse.
    cache: Vec<Block>,
}

/// Heap-backed block allocator.
#[derive(Debug)]
pub struct Disk {
    block_size: usize,
    max_block_count: usize,
    max_cached_block_count: usize,
    pool: Mutex<Pool>,
}

impl Disk {
    /// Create a disk with explicit block counts.
    pub fn new(
        block_size: usize,
        max_block_count: usize,
        max_cached_block_count: usize,
    ) -> StoreResult<Self> {
        if block_size == 0 {
            return Err(StoreError::invalid_argument("block size must be positive"));
        }
        Ok(Self {
            block_size,
            max_block_count,
            max_cached_block_count,
            pool: Mutex::new(Pool::default()),
        })
    }

    /// Create a disk from byte sizes, rounding each down to a block multiple.
    pub fn with_sizes(block_size: usize, max_size: u64, max_cache_size: u64) -> StoreResult<Self> {
        if block_size == 0 {
            return Err(StoreError::invalid_argument("block size must be positive"));
        }
        let to_blocks = |bytes: u64| usize::try_from(bytes / block_size as u64).unwrap_or(usize::MAX);
        Self::new(block_size, to_blocks(max_size), to_blocks(max_cache_size))
    }

    /// Size of every block in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Maximum number of blocks that may be owned by files at once.
    pub fn max_block_count(&self) -> usize {
        self.max_block_count
    }

    /// Maximum number of free blocks kept for reuse.
    pub fn max_cached_block_count(&self) -> usize {
        self.max_cached_block_count
    }

    /// Blocks currently owned by files.
    pub fn allocated_block_count(&self) -> usize {
        self.pool.lock().allocated
    }

    /// Free blocks currently cached.
    pub fn cached_block_count(&self) -> usize {
        self.pool.lock().cache.len()
    }

    /// Total capacity in bytes.
    pub fn total_space(&self) -> u64 {
        self.max_block_count as u64 * self.block_size as u64
    }

    /// Capacity not owned by any file, in bytes.
    pub fn unallocated_space(&self) -> u64 {
        let allocated = self.pool.lock().allocated;
        (self.max_block_count - allocated) as u64 * self.block_size as u64
    }

    /// Allocate `count` blocks, all or nothing.
    ///
    /// Cached blocks are handed out first; the rest are created fresh.
    pub fn allocate(&self, count: usize) -> StoreResult<Vec<Block>> {
        let mut pool = self.pool.lock();
        let available = self.max_block_count - pool.allocated;
        if count > available {
            tracing::warn!(
                requested = count,
                available,
                block_size = self.block_size,
                "disk allocation refused"
            );
            return Err(StoreError::out_of_space(count, available));
        }

        let from_cache = count.min(pool.cache.len());
        let split_at = pool.cache.len() - from_cache;
        let mut blocks = pool.cache.split_off(split_at);
        blocks.extend((from_cache..count).map(|_| vec![0u8; self.block_size].into_boxed_slice()));
        pool.allocated += count;

        tracing::debug!(
            count,
            from_cache,
            allocated = pool.allocated,
            "allocated blocks"
        );
        Ok(blocks)
    }

    /// Return blocks to the disk.
    ///
    /// Blocks beyond the cache limit are dropped.
    pub fn free(&self, blocks: impl IntoIterator<Item = Block>) {
        let mut pool = self.pool.lock();
        let mut freed = 0usize;
        for block in blocks {
            debug_assert_eq!(block.len(), self.block_size);
            freed += 1;
            if pool.cache.len() < self.max_cached_block_count {
                pool.cache.push(block);
            }
        }
        pool.allocated -= freed;

        tracing::debug!(
            freed,
            cached = pool.cache.len(),
            allocated = pool.allocated,
            "freed blocks"
        );
    }

    /// Snapshot of the disk's counters.
    pub fn stats(&self) -> DiskStats {
        let pool = self.pool.lock();
        DiskStats {
            block_size: self.block_size,
            total_blocks: self.max_block_count,
            allocated_blocks: pool.allocated,
            cached_blocks: pool.cache.len(),
            max_cached_blocks: self.max_cached_block_count,
        }
    }
}

/// Disk usage statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskStats {
    /// Block size in bytes.
    pub block_size: usize,
    /// Maximum blocks owned by files.
    pub total_blocks: usize,
    /// Blocks owned by files.
    pub allocated_blocks: usize,
    /// Free blocks held for reuse.
    pub cached_blocks: usize,
    /// Cache limit in blocks.
    pub max_cached_blocks: usize,
}

impl DiskStats {
    /// Blocks that may still be allocated.
    pub fn free_blocks(&self) -> usize {
        self.total_blocks - self.allocated_blocks
    }

    /// Total capacity in bytes.
    pub fn total_space(&self) -> u64 {
        self.total_blocks as u64 * self.block_size as u64
    }

    /// Unallocated capacity in bytes.
    pub fn unallocated_space(&self) -> u64 {
        self.free_blocks() as u64 * self.block_size as u64
    }
}
