//! Buffer pool counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Something the pool did that is worth counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PoolEvent {
    /// Fetch served from a resident frame.
    Hit,
    /// Fetch that had to load the page.
    Miss,
    /// Frame taken away from another page.
    Eviction,
    PageRead,
    PageWritten,
    /// File grown by one page.
    PageAllocated,
}

/// Running counters of one buffer pool.
///
/// Counters are independent and updated with `Ordering::Relaxed`; read them
/// through [`BufferPoolStats::snapshot`].
#[derive(Debug, Default)]
pub struct BufferPoolStats {
    counters: [AtomicU64; 6],
}

impl BufferPoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, event: PoolEvent) {
        self.counters[event as usize].fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self, event: PoolEvent) -> u64 {
        self.counters[event as usize].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.get(PoolEvent::Hit),
            cache_misses: self.get(PoolEvent::Miss),
            evictions: self.get(PoolEvent::Eviction),
            pages_read: self.get(PoolEvent::PageRead),
            pages_written: self.get(PoolEvent::PageWritten),
            pages_allocated: self.get(PoolEvent::PageAllocated),
        }
    }
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub pages_read: u64,
    pub pages_written: u64,
    pub pages_allocated: u64,
}

impl StatsSnapshot {
    /// Fraction of fetches served without I/O, 0.0 when nothing was fetched.
    pub fn hit_rate(&self) -> f64 {
        match self.cache_hits + self.cache_misses {
            0 => 0.0,
            total => self.cache_hits as f64 / total as f64,
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} evictions={} read={} written={} allocated={} ({:.1}% hit)",
            self.cache_hits,
            self.cache_misses,
            self.evictions,
            self.pages_read,
            self.pages_written,
            self.pages_allocated,
            self.hit_rate() * 100.0
        )
    }
}
