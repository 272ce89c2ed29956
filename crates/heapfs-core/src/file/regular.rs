//! Block-backed random-access file content.
//!
//! A [`RegularFile`] is an ordered list of [`Block`]s plus a logical size.
//! Blocks come from and return to the instance's [`Disk`].
//!
//! ## Invariants
//!
//! - `size <= blocks.len() * block_size`
//! - Bytes at or past `size` are never returned by a read. They may hold
//!   stale data from an earlier shrink or a reused cached block, so any
//!   operation that moves `size` forward zeroes the newly exposed range.
//!
//! ## Locking
//!
//! Lifecycle mutex, then content lock, then the disk's pool lock. Content
//! locks of two different files are never held at the same time.

use std::io::{self, IoSlice, IoSliceMut, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::disk::{Block, Disk};
use crate::error::{StoreError, StoreResult};

/// Largest scratch buffer used by [`RegularFile::transfer_from`].
const TRANSFER_CHUNK: usize = 64 * 1024;

#[derive(Debug, Default)]
struct Content {
    blocks: Vec<Block>,
    size: u64,
}

#[derive(Debug, Default)]
struct Lifecycle {
    open_count: u32,
    deleted: bool,
}

/// Byte content of a regular file.
#[derive(Debug)]
pub struct RegularFile {
    disk: Arc<Disk>,
    content: RwLock<Content>,
    /// Mirror of `content.size`, readable without the lock.
    size: AtomicU64,
    lifecycle: Mutex<Lifecycle>,
}

impl RegularFile {
    /// Create an empty file backed by `disk`.
    pub fn new(disk: Arc<Disk>) -> Self {
        Self {
            disk,
            content: RwLock::new(Content::default()),
            size: AtomicU64::new(0),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    /// An empty file on the same disk.
    pub fn copy_without_content(&self) -> Self {
        Self::new(Arc::clone(&self.disk))
    }

    pub fn disk(&self) -> &Arc<Disk> {
        &self.disk
    }

    /// Logical size in bytes.
    pub fn size(&self) -> u64 {
        self.content.read().size
    }

    /// Logical size without taking the content lock.
    ///
    /// May be momentarily stale relative to a concurrent writer.
    pub fn size_without_locking(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    /// Number of blocks currently held.
    pub fn block_count(&self) -> usize {
        self.content.read().blocks.len()
    }

    fn block_size(&self) -> u64 {
        self.disk.block_size() as u64
    }

    fn blocks_for(&self, bytes: u64) -> usize {
        bytes.div_ceil(self.block_size()) as usize
    }

    fn locate(&self, pos: u64) -> (usize, usize) {
        let bs = self.block_size();
        ((pos / bs) as usize, (pos % bs) as usize)
    }

    fn set_size(&self, content: &mut Content, size: u64) {
        content.size = size;
        self.size.store(size, Ordering::Release);
    }

    /// Grow the block list so that `[0, end)` is backed.
    fn ensure_capacity(&self, content: &mut Content, end: u64) -> StoreResult<()> {
        let needed = self.blocks_for(end);
        if needed > content.blocks.len() {
            let fresh = self.disk.allocate(needed - content.blocks.len())?;
            content.blocks.extend(fresh);
        }
        Ok(())
    }

    /// Copy `dst.len()` bytes starting at `pos` out of the blocks.
    fn copy_out(&self, content: &Content, mut pos: u64, dst: &mut [u8]) {
        let mut done = 0;
        while done < dst.len() {
            let (index, offset) = self.locate(pos);
            let block = &content.blocks[index];
            let n = (block.len() - offset).min(dst.len() - done);
            dst[done..done + n].copy_from_slice(&block[offset..offset + n]);
            done += n;
            pos += n as u64;
        }
    }

    /// Copy `src` into the blocks starting at `pos`. Capacity must exist.
    fn copy_in(&self, content: &mut Content, mut pos: u64, src: &[u8]) {
        let mut done = 0;
        while done < src.len() {
            let (index, offset) = self.locate(pos);
            let block = &mut content.blocks[index];
            let n = (block.len() - offset).min(src.len() - done);
            block[offset..offset + n].copy_from_slice(&src[done..done + n]);
            done += n;
            pos += n as u64;
        }
    }

    /// Zero `[start, end)`. Capacity must exist.
    fn zero_range(&self, content: &mut Content, mut start: u64, end: u64) {
        while start < end {
            let (index, offset) = self.locate(start);
            let block = &mut content.blocks[index];
            let n = ((block.len() - offset) as u64).min(end - start) as usize;
            block[offset..offset + n].fill(0);
            start += n as u64;
        }
    }

    /// Reserve `[pos, pos + len)` for a write and zero any gap before it.
    ///
    /// Allocation happens before anything is modified, so a failure leaves
    /// the file untouched.
    fn prepare_write(&self, content: &mut Content, pos: u64, len: usize) -> StoreResult<u64> {
        let end = pos
            .checked_add(len as u64)
            .ok_or_else(|| StoreError::invalid_argument("write position overflows"))?;
        self.ensure_capacity(content, end)?;
        if pos > content.size {
            let size = content.size;
            self.zero_range(content, size, pos);
        }
        Ok(end)
    }

    fn finish_write(&self, content: &mut Content, end: u64) {
        if end > content.size {
            self.set_size(content, end);
        }
    }

    fn write_locked(&self, content: &mut Content, pos: u64, src: &[u8]) -> StoreResult<usize> {
        let end = self.prepare_write(content, pos, src.len())?;
        self.copy_in(content, pos, src);
        self.finish_write(content, end);
        Ok(src.len())
    }

    /// Read one byte, or `None` at end of file.
    pub fn read_byte(&self, pos: u64) -> Option<u8> {
        let content = self.content.read();
        if pos >= content.size {
            return None;
        }
        let (index, offset) = self.locate(pos);
        Some(content.blocks[index][offset])
    }

    /// Read into `dst` starting at `pos`.
    ///
    /// Returns the number of bytes copied, or `None` if `pos` is at or past
    /// the end of the file. `dst` is not touched in that case.
    pub fn read(&self, pos: u64, dst: &mut [u8]) -> Option<usize> {
        let content = self.content.read();
        if pos >= content.size {
            return None;
        }
        let len = (content.size - pos).min(dst.len() as u64) as usize;
        self.copy_out(&content, pos, &mut dst[..len]);
        Some(len)
    }

    /// Scatter read into `bufs`, filling each in order.
    pub fn read_vectored(&self, pos: u64, bufs: &mut [IoSliceMut<'_>]) -> Option<usize> {
        let content = self.content.read();
        if pos >= content.size {
            return None;
        }
        let mut at = pos;
        for buf in bufs.iter_mut() {
            if at >= content.size {
                break;
            }
            let len = (content.size - at).min(buf.len() as u64) as usize;
            self.copy_out(&content, at, &mut buf[..len]);
            at += len as u64;
        }
        Some((at - pos) as usize)
    }

    /// Write one byte at `pos`, zero-filling any gap.
    pub fn write_byte(&self, pos: u64, byte: u8) -> StoreResult<usize> {
        self.write(pos, &[byte])
    }

    /// Write `src` at `pos`, zero-filling any gap between the current size
    /// and `pos`.
    pub fn write(&self, pos: u64, src: &[u8]) -> StoreResult<usize> {
        let mut content = self.content.write();
        self.write_locked(&mut content, pos, src)
    }

    /// Gather write of `bufs` at `pos`, as one contiguous write.
    pub fn write_vectored(&self, pos: u64, bufs: &[IoSlice<'_>]) -> StoreResult<usize> {
        let total: usize = bufs.iter().map(|b| b.len()).sum();
        let mut content = self.content.write();
        let end = self.prepare_write(&mut content, pos, total)?;
        let mut at = pos;
        for buf in bufs {
            self.copy_in(&mut content, at, buf);
            at += buf.len() as u64;
        }
        self.finish_write(&mut content, end);
        Ok(total)
    }

    /// Read up to `count` bytes from `src` and write them at `pos`.
    ///
    /// Stops early when `src` is exhausted. The gap before `pos` is only
    /// filled if at least one byte arrives.
    pub fn transfer_from<R: Read + ?Sized>(
        &self,
        src: &mut R,
        pos: u64,
        count: u64,
    ) -> StoreResult<u64> {
        if count == 0 {
            return Ok(0);
        }
        let mut content = self.content.write();
        let mut scratch = vec![0u8; count.min(TRANSFER_CHUNK as u64) as usize];
        let mut transferred = 0u64;
        while transferred < count {
            let want = (count - transferred).min(scratch.len() as u64) as usize;
            let n = match src.read(&mut scratch[..want]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.write_locked(&mut content, pos + transferred, &scratch[..n])?;
            transferred += n as u64;
        }
        Ok(transferred)
    }

    /// Write up to `count` bytes starting at `pos` into `dst`.
    ///
    /// Returns 0 if `pos` is at or past the end of the file.
    pub fn transfer_to<W: Write + ?Sized>(
        &self,
        pos: u64,
        count: u64,
        dst: &mut W,
    ) -> StoreResult<u64> {
        let content = self.content.read();
        if pos >= content.size {
            return Ok(0);
        }
        let total = (content.size - pos).min(count);
        let mut at = pos;
        let end = pos + total;
        while at < end {
            let (index, offset) = self.locate(at);
            let block = &content.blocks[index];
            let n = ((block.len() - offset) as u64).min(end - at) as usize;
            dst.write_all(&block[offset..offset + n])?;
            at += n as u64;
        }
        Ok(total)
    }

    /// Shrink the file to `new_size`, returning surplus blocks to the disk.
    ///
    /// A size at or above the current one leaves the file untouched.
    /// Returns whether the size changed.
    pub fn truncate(&self, new_size: u64) -> StoreResult<bool> {
        let mut content = self.content.write();
        if new_size >= content.size {
            return Ok(false);
        }
        let keep = self.blocks_for(new_size);
        if keep < content.blocks.len() {
            let surplus = content.blocks.split_off(keep);
            self.disk.free(surplus);
        }
        self.set_size(&mut content, new_size);
        Ok(true)
    }

    /// Replace `target`'s content with a block-level copy of this file's.
    ///
    /// Fresh blocks are allocated for the copy; no block is shared.
    pub fn copy_content_to(&self, target: &RegularFile) -> StoreResult<()> {
        if std::ptr::eq(self, target) {
            return Ok(());
        }
        if target.disk.block_size() != self.disk.block_size() {
            return Err(StoreError::invalid_argument(
                "cannot copy content between disks with different block sizes",
            ));
        }

        let (copied, size) = {
            let content = self.content.read();
            let used = self.blocks_for(content.size);
            let mut fresh = target.disk.allocate(used)?;
            for (dst, src) in fresh.iter_mut().zip(&content.blocks) {
                dst.copy_from_slice(src);
            }
            (fresh, content.size)
        };

        let mut target_content = target.content.write();
        let previous = std::mem::replace(&mut target_content.blocks, copied);
        target.set_size(&mut target_content, size);
        drop(target_content);
        if !previous.is_empty() {
            target.disk.free(previous);
        }
        Ok(())
    }

    /// Record that a handle to this file was opened.
    pub fn opened(&self) {
        self.lifecycle.lock().open_count += 1;
    }

    /// Record that a handle was closed, releasing content if the file is
    /// deleted and this was the last handle.
    pub fn closed(&self) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.open_count = lifecycle.open_count.saturating_sub(1);
        if lifecycle.open_count == 0 && lifecycle.deleted {
            self.release_content();
        }
    }

    /// Mark the file deleted, releasing content now if nothing holds it open.
    pub fn deleted(&self) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.deleted = true;
        if lifecycle.open_count == 0 {
            self.release_content();
        }
    }

    pub fn open_count(&self) -> u32 {
        self.lifecycle.lock().open_count
    }

    pub fn is_deleted(&self) -> bool {
        self.lifecycle.lock().deleted
    }

    fn release_content(&self) {
        let mut content = self.content.write();
        let blocks = std::mem::take(&mut content.blocks);
        self.set_size(&mut content, 0);
        drop(content);
        if !blocks.is_empty() {
            tracing::debug!(blocks = blocks.len(), "releasing deleted file content");
            self.disk.free(blocks);
        }
    }
}

impl Drop for RegularFile {
    fn drop(&mut self) {
        let blocks = std::mem::take(&mut self.content.get_mut().blocks);
        if !blocks.is_empty() {
            self.disk.free(blocks);
        }
    }
}
