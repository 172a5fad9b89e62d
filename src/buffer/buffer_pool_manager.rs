//! Buffer Pool Manager - the page caching layer under an index file.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between disk and memory
//! - Pin-based reference counting through RAII guards
//! - Dirty page write-back with checksum stamping
//! - Checksum and owner verification on load
//! - LRU eviction

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};

use crate::buffer::replacer::LruReplacer;
use crate::buffer::stats::PoolEvent;
use crate::buffer::{BufferPoolStats, Frame, FrameId, PageReadGuard, PageWriteGuard};
use crate::common::{Error, PageId, Result};
use crate::storage::DiskManager;

/// Manages a pool of buffer frames for caching the pages of one file.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │ page_table   │  │        frames: Vec<Frame>         │   │
/// │  │PageId → Fid  │─▶│  [Frame0] [Frame1] [Frame2] ...   │   │
/// │  └──────────────┘  └───────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
/// │  │  free_list   │  │   replacer   │  │disk_manager  │      │
/// │  │ Vec<FrameId> │  │ LruReplacer  │  │   Mutex      │      │
/// │  └──────────────┘  └──────────────┘  └──────────────┘      │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// The pool is shared behind an `Arc` and keeps its own locks: the page
/// table is an `RwLock`, the free list, replacer and disk manager are
/// `Mutex`es, frames synchronize internally and stats are atomics.
///
/// A thread must not fetch a page it already holds a write guard for;
/// page locks are not reentrant.
pub struct BufferPoolManager {
    frames: Vec<Frame>,
    page_table: RwLock<HashMap<PageId, FrameId>>,
    /// Stack of free frame IDs (LIFO for cache locality).
    free_list: Mutex<Vec<FrameId>>,
    replacer: Mutex<LruReplacer>,
    disk_manager: Mutex<DiskManager>,
    stats: BufferPoolStats,
    pool_size: usize,
}

impl BufferPoolManager {
    /// Create a new buffer pool manager over `disk_manager`.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();

        Self {
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(LruReplacer::new()),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Pin a page for reading (shared access).
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - `Error::ChecksumMismatch` / `Error::PageIdMismatch` if the loaded
    ///   page fails verification
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Pin a page for writing (exclusive access).
    ///
    /// The page is marked dirty when the guard drops.
    ///
    /// # Errors
    /// Same as [`BufferPoolManager::fetch_page_read`].
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// Append a zeroed page to the file and pin it for writing.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - I/O errors from growing the file
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.get_free_frame()?;

        let page_id = match self.disk_manager.lock().allocate_page() {
            Ok(pid) => pid,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };
        self.stats.record(PoolEvent::PageAllocated);

        let frame = &self.frames[frame_id.0];
        frame.page_mut().reset();
        frame.install(page_id, true);
        self.page_table.write().insert(page_id, frame_id);
        self.pin_frame(frame_id);

        let lock = frame.page_mut();
        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    // ========================================================================
    // Public API: Force pages
    // ========================================================================

    /// Write a page to disk if it is resident and dirty, then sync the file.
    ///
    /// # Errors
    /// - I/O errors from disk write
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let frame_id = match self.page_table.read().get(&page_id) {
            Some(&fid) => fid,
            None => return Ok(()),
        };

        self.flush_frame(frame_id, page_id)?;
        self.disk_manager.lock().sync()
    }

    /// Write every dirty resident page to disk, then sync the file.
    ///
    /// # Errors
    /// - I/O errors from disk writes
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut pages: Vec<(PageId, FrameId)> = {
            let pt = self.page_table.read();
            pt.iter().map(|(&pid, &fid)| (pid, fid)).collect()
        };
        pages.sort_unstable_by_key(|&(pid, _)| pid);

        for (page_id, frame_id) in pages {
            self.flush_frame(frame_id, page_id)?;
        }

        self.disk_manager.lock().sync()
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Get the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Get the number of free frames.
    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Get the number of pages resident in the pool.
    pub fn resident_page_count(&self) -> usize {
        self.page_table.read().len()
    }

    /// Number of pages in the underlying file.
    pub fn disk_page_count(&self) -> u32 {
        self.disk_manager.lock().page_count()
    }

    /// Whether `page_id` currently occupies a frame.
    pub fn contains_page(&self, page_id: PageId) -> bool {
        self.page_table.read().contains_key(&page_id)
    }

    /// Pin count of a resident page, `None` if the page is not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let frame_id = *self.page_table.read().get(&page_id)?;
        Some(self.frames[frame_id.0].pin_count())
    }

    // ========================================================================
    // Internal: Called by PageGuard on drop
    // ========================================================================

    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.0];

        if is_dirty {
            frame.mark_dirty();
        }

        if frame.unpin() == 0 {
            self.replacer.lock().set_evictable(frame_id, true);
        }
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    fn fetch_page_internal(&self, page_id: PageId) -> Result<FrameId> {
        if !page_id.is_valid() {
            return Err(Error::PageNotFound(page_id.0));
        }

        {
            let pt = self.page_table.read();
            if let Some(&frame_id) = pt.get(&page_id) {
                self.pin_frame(frame_id);
                self.stats.record(PoolEvent::Hit);
                return Ok(frame_id);
            }
        }

        self.handle_cache_miss(page_id)
    }

    /// Pin a resident frame and take it out of the eviction candidates.
    fn pin_frame(&self, frame_id: FrameId) {
        self.frames[frame_id.0].pin();
        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id);
        replacer.set_evictable(frame_id, false);
    }

    fn handle_cache_miss(&self, page_id: PageId) -> Result<FrameId> {
        self.stats.record(PoolEvent::Miss);

        let frame_id = self.get_free_frame()?;

        let loaded = self
            .disk_manager
            .lock()
            .read_page(page_id)
            .and_then(|page| page.validate(page_id).map(|()| page));
        let page_data = match loaded {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(page = page_id.0, error = %e, "failed to load page");
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };
        self.stats.record(PoolEvent::PageRead);

        let frame = &self.frames[frame_id.0];
        frame
            .page_mut()
            .as_mut_slice()
            .copy_from_slice(page_data.as_slice());
        frame.install(page_id, false);
        self.page_table.write().insert(page_id, frame_id);
        self.pin_frame(frame_id);

        Ok(frame_id)
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    fn get_free_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }

        self.evict_page()
    }

    fn evict_page(&self) -> Result<FrameId> {
        let frame_id = self
            .replacer
            .lock()
            .evict()
            .ok_or(Error::NoFreeFrames)?;

        self.stats.record(PoolEvent::Eviction);

        let frame = &self.frames[frame_id.0];
        if let Some(pid) = frame.page_id() {
            tracing::trace!(page = pid.0, frame = frame_id.0, "evicting page");
            if let Err(e) = self.flush_frame(frame_id, pid) {
                // Keep the page resident; it can be retried later.
                self.replacer.lock().record_access(frame_id);
                self.replacer.lock().set_evictable(frame_id, true);
                return Err(e);
            }
            self.page_table.write().remove(&pid);
        }

        frame.release();
        Ok(frame_id)
    }

    /// Write a frame to disk if dirty, stamping the checksum on the copy
    /// that goes out.
    fn flush_frame(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];

        if frame.is_dirty() {
            let out = frame.page().stamped_copy();
            self.disk_manager.lock().write_page(page_id, &out)?;

            frame.mark_clean();
            self.stats.record(PoolEvent::PageWritten);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::{PageHeader, PageType};
    use tempfile::tempdir;

    fn create_test_bpm(pool_size: usize) -> (BufferPoolManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("test.0")).unwrap();
        (BufferPoolManager::new(pool_size, dm), dir)
    }

    #[test]
    fn test_new_page_ids_are_sequential() {
        let (bpm, _dir) = create_test_bpm(10);

        assert_eq!(bpm.new_page().unwrap().page_id(), PageId::new(0));
        assert_eq!(bpm.new_page().unwrap().page_id(), PageId::new(1));
        assert_eq!(bpm.disk_page_count(), 2);
        assert_eq!(bpm.stats().snapshot().pages_allocated, 2);
    }

    #[test]
    fn test_write_then_read() {
        let (bpm, _dir) = create_test_bpm(10);

        let pid = {
            let mut guard = bpm.new_page().unwrap();
            guard.as_mut_slice()[PageHeader::SIZE] = 0xAB;
            guard.page_id()
        };

        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(guard.as_slice()[PageHeader::SIZE], 0xAB);
        assert!(bpm.stats().snapshot().cache_hits >= 1);
    }

    #[test]
    fn test_pin_count_follows_guards() {
        let (bpm, _dir) = create_test_bpm(10);
        let pid = bpm.new_page().unwrap().page_id();
        assert_eq!(bpm.get_pin_count(pid), Some(0));

        let g1 = bpm.fetch_page_read(pid).unwrap();
        let g2 = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(bpm.get_pin_count(pid), Some(2));

        drop(g1);
        drop(g2);
        assert_eq!(bpm.get_pin_count(pid), Some(0));
        assert_eq!(bpm.get_pin_count(PageId::new(77)), None);
    }

    #[test]
    fn test_typed_page_survives_eviction_with_checksum() {
        let (bpm, _dir) = create_test_bpm(1);

        {
            let mut guard = bpm.new_page().unwrap();
            let pid = guard.page_id();
            guard.format(PageType::BTreeLeaf, pid);
            guard.as_mut_slice()[PageHeader::SIZE + 3] = 0x42;
        }

        // Only one frame: allocating evicts and writes page 0.
        drop(bpm.new_page().unwrap());
        assert!(!bpm.contains_page(PageId::new(0)));

        let guard = bpm.fetch_page_read(PageId::new(0)).unwrap();
        assert_eq!(guard.page_type(), PageType::BTreeLeaf);
        assert_eq!(guard.as_slice()[PageHeader::SIZE + 3], 0x42);
    }

    #[test]
    fn test_no_free_frames_when_all_pinned() {
        let (bpm, _dir) = create_test_bpm(2);

        let _g1 = bpm.new_page().unwrap();
        let _g2 = bpm.new_page().unwrap();

        assert!(matches!(bpm.new_page(), Err(Error::NoFreeFrames)));
    }

    #[test]
    fn test_failed_load_returns_frame() {
        let (bpm, _dir) = create_test_bpm(2);

        assert!(matches!(
            bpm.fetch_page_read(PageId::new(999)),
            Err(Error::PageNotFound(999))
        ));
        assert!(matches!(
            bpm.fetch_page_read(PageId::INVALID),
            Err(Error::PageNotFound(_))
        ));
        assert_eq!(bpm.free_frame_count(), 2);
        assert_eq!(bpm.resident_page_count(), 0);

        let pid = bpm.new_page().unwrap().page_id();
        assert_eq!(bpm.resident_page_count(), 1);
        assert!(bpm.contains_page(pid));
    }

    #[test]
    fn test_flush_all_pages_writes_dirty_pages() {
        let (bpm, _dir) = create_test_bpm(10);

        for i in 0..5u8 {
            let mut guard = bpm.new_page().unwrap();
            guard.as_mut_slice()[PageHeader::SIZE] = i;
        }

        bpm.flush_all_pages().unwrap();
        assert_eq!(bpm.stats().snapshot().pages_written, 5);

        // Nothing dirty left.
        bpm.flush_all_pages().unwrap();
        assert_eq!(bpm.stats().snapshot().pages_written, 5);
    }

    #[test]
    fn test_lru_keeps_hot_page_resident() {
        let (bpm, _dir) = create_test_bpm(3);

        let hot = bpm.new_page().unwrap().page_id();
        for _ in 0..6 {
            drop(bpm.fetch_page_read(hot).unwrap());
            drop(bpm.new_page().unwrap());
        }

        assert!(bpm.contains_page(hot));
        assert!(bpm.stats().snapshot().evictions >= 1);
    }
}
