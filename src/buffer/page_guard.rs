//! Page guards.
//!
//! Holding a guard keeps its page pinned in the pool; dropping it releases
//! the page lock first and then the pin. [`PageWriteGuard`] additionally
//! marks the frame dirty, so any page handed out for writing is written
//! back before its frame is reused.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::page::Page;

use super::buffer_pool_manager::BufferPoolManager;
use super::FrameId;

/// One pin on a frame, returned to the pool on drop.
struct Pin<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    dirty: bool,
}

impl Drop for Pin<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page_internal(self.frame_id, self.dirty);
    }
}

/// Shared access to a pinned page.
///
/// ```ignore
/// let guard = bpm.fetch_page_read(page_id)?;
/// let node = BTreeNode::new(layout, guard.as_slice());
/// ```
pub struct PageReadGuard<'a> {
    // Field order matters: the lock is released before the pin.
    lock: RwLockReadGuard<'a, Page>,
    pin: Pin<'a>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockReadGuard<'a, Page>,
    ) -> Self {
        Self {
            lock,
            pin: Pin {
                bpm,
                frame_id,
                page_id,
                dirty: false,
            },
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

/// Exclusive access to a pinned page. The page counts as modified once the
/// guard is dropped, whether or not it was written through.
pub struct PageWriteGuard<'a> {
    lock: RwLockWriteGuard<'a, Page>,
    pin: Pin<'a>,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockWriteGuard<'a, Page>,
    ) -> Self {
        Self {
            lock,
            pin: Pin {
                bpm,
                frame_id,
                page_id,
                dirty: true,
            },
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        &mut self.lock
    }
}
