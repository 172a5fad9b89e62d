//! LRU (Least Recently Used) replacement policy.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::buffer::FrameId;

/// Least-recently-used eviction policy.
///
/// Every access stamps the frame with a logical tick. The victim is the
/// evictable frame with the oldest stamp.
pub struct LruReplacer {
    /// Logical clock advanced on every access.
    tick: u64,

    /// Last access tick per tracked frame.
    last_access: HashMap<FrameId, u64>,

    /// Tracked frames ordered by last access (oldest first).
    by_age: BTreeMap<u64, FrameId>,

    /// Frames that are currently evictable (pin_count == 0).
    evictable: HashSet<FrameId>,
}

impl LruReplacer {
    /// Create a new LRU replacer.
    pub fn new() -> Self {
        Self {
            tick: 0,
            last_access: HashMap::new(),
            by_age: BTreeMap::new(),
            evictable: HashSet::new(),
        }
    }

    /// Record that a frame was accessed, making it the most recent.
    pub fn record_access(&mut self, frame_id: FrameId) {
        self.tick += 1;
        if let Some(old) = self.last_access.insert(frame_id, self.tick) {
            self.by_age.remove(&old);
        }
        self.by_age.insert(self.tick, frame_id);
    }

    /// Mark a frame as evictable (pin_count dropped to 0) or pinned.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            self.evictable.insert(frame_id);
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    /// Select a victim frame for eviction.
    ///
    /// Returns the least recently used evictable frame, or None if all
    /// tracked frames are pinned.
    pub fn evict(&mut self) -> Option<FrameId> {
        let (&tick, &frame_id) = self
            .by_age
            .iter()
            .find(|(_, frame_id)| self.evictable.contains(*frame_id))?;

        self.by_age.remove(&tick);
        self.last_access.remove(&frame_id);
        self.evictable.remove(&frame_id);
        Some(frame_id)
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.evictable.len()
    }
}

impl Default for LruReplacer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evictable_replacer(frames: &[usize]) -> LruReplacer {
        let mut replacer = LruReplacer::new();
        for &f in frames {
            replacer.record_access(FrameId::new(f));
            replacer.set_evictable(FrameId::new(f), true);
        }
        replacer
    }

    #[test]
    fn test_lru_evicts_oldest_first() {
        let mut replacer = evictable_replacer(&[0, 1, 2]);
        assert_eq!(replacer.size(), 3);

        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_reaccess_moves_to_back() {
        let mut replacer = evictable_replacer(&[0, 1, 2]);

        // Touching frame 0 makes frame 1 the oldest.
        replacer.record_access(FrameId::new(0));

        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_lru_skips_pinned() {
        let mut replacer = evictable_replacer(&[0, 1, 2]);
        replacer.set_evictable(FrameId::new(0), false);
        replacer.set_evictable(FrameId::new(2), false);

        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), None);

        // Pinned frames stay tracked and become victims once unpinned.
        replacer.set_evictable(FrameId::new(2), true);
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    }
}
