//! Frame - one cache slot of the buffer pool.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::page::Page;

/// Position of a frame in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

/// Which page a frame caches, and whether the cached copy is newer than the
/// one on disk. Both change together, so they share a lock.
#[derive(Debug, Clone, Copy, Default)]
struct Residency {
    page_id: Option<PageId>,
    dirty: bool,
}

/// A slot holding one cached page.
///
/// Page bytes sit behind an `RwLock` taken by the page guards. Pinning is a
/// plain atomic so that guards can unpin without touching the page lock.
pub struct Frame {
    page: RwLock<Page>,
    residency: Mutex<Residency>,
    pins: AtomicU32,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            residency: Mutex::new(Residency::default()),
            pins: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// Page cached in this frame, if any.
    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        self.residency.lock().page_id
    }

    /// Bind the frame to `page_id`. A page that only exists in memory so
    /// far must be installed `dirty`.
    pub fn install(&self, page_id: PageId, dirty: bool) {
        *self.residency.lock() = Residency {
            page_id: Some(page_id),
            dirty,
        };
    }

    /// Unbind the frame. Returns the page it held.
    pub fn release(&self) -> Option<PageId> {
        std::mem::take(&mut *self.residency.lock()).page_id
    }

    /// Returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pins.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns the new pin count.
    ///
    /// # Panics
    /// Panics if the frame is not pinned.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let old = self.pins.fetch_sub(1, Ordering::Relaxed);
        assert!(old > 0, "pin count underflow");
        old - 1
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pins.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn mark_dirty(&self) {
        self.residency.lock().dirty = true;
    }

    /// Called once the cached copy has reached disk.
    #[inline]
    pub fn mark_clean(&self) {
        self.residency.lock().dirty = false;
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.residency.lock().dirty
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
