//! Insertion with cascading splits.

use std::cmp::Ordering;

use crate::common::{PageId, Result, Rid};
use crate::storage::page::PageType;

use super::handle::{IndexHandle, InsertOutcome, Path};
use super::node::BTreeNode;

/// Halves of a split node, as the parent has to record them.
struct SplitResult {
    left_max: Vec<u8>,
    right_max: Vec<u8>,
    right_page: PageId,
}

impl IndexHandle {
    /// Add the pair (key, rid) to the index.
    ///
    /// Duplicate keys are allowed; a duplicate of the exact pair is reported
    /// as [`InsertOutcome::AlreadyExists`] and leaves the tree unchanged.
    ///
    /// # Errors
    /// - `Error::KeyLength` if `key` does not match the attribute length
    /// - storage and corruption errors from the pages touched
    pub fn insert_entry(&mut self, key: &[u8], rid: Rid) -> Result<InsertOutcome> {
        self.check_key(key)?;
        if self.locate(key, rid)?.is_some() {
            return Ok(InsertOutcome::AlreadyExists);
        }

        let path = self.descend(key, false)?;

        let new_max = self
            .tree_largest
            .as_deref()
            .map_or(true, |max| self.compare(key, max) == Ordering::Greater);
        if new_max {
            // The path runs down the rightmost spine; every slot on it
            // records the old tree maximum.
            for (&page, &slot) in path.pages.iter().zip(&path.slots) {
                self.write_node(page, |node| node.set_key(slot, key))?;
            }
            self.tree_largest = Some(key.to_vec());
        }

        let inserted = self.write_node(path.leaf(), |node| node.insert(key, rid).is_some())?;
        if !inserted {
            let split = self.split_leaf(path.leaf(), key, rid)?;
            self.promote(&path, path.leaf_level(), split)?;
        }
        Ok(InsertOutcome::Inserted)
    }

    /// Split the full leaf `page` and place (key, rid) in the proper half.
    fn split_leaf(&mut self, page: PageId, key: &[u8], rid: Rid) -> Result<SplitResult> {
        let right_page = self.allocate_page()?;

        let (left_max, right_max, old_right) = {
            let mut lguard = self.bpm.fetch_page_write(page)?;
            let mut rguard = self.bpm.fetch_page_write(right_page)?;
            let mut lhs = BTreeNode::new(self.layout, lguard.as_mut_slice());
            let mut rhs = BTreeNode::new(self.layout, rguard.as_mut_slice());
            rhs.init(PageType::BTreeLeaf, right_page);

            let old_right = lhs.split(&mut rhs, page, right_page);
            let goes_left = lhs
                .largest_key()
                .is_some_and(|max| self.compare(key, max) == Ordering::Less);
            if goes_left {
                lhs.insert(key, rid);
            } else {
                rhs.insert(key, rid);
            }

            (largest(&lhs), largest(&rhs), old_right)
        };
        self.relink_left(old_right, right_page)?;

        tracing::debug!(left = page.0, right = right_page.0, "split leaf");
        Ok(SplitResult {
            left_max,
            right_max,
            right_page,
        })
    }

    /// Record a split of `path.pages[level]` in its parent, splitting
    /// ancestors as long as they overflow.
    fn promote(&mut self, path: &Path, mut level: usize, mut split: SplitResult) -> Result<()> {
        loop {
            if level == 0 {
                return self.grow_root(path.pages[0], split);
            }

            let parent_level = level - 1;
            let parent = path.pages[parent_level];
            let slot = path.slots[parent_level];
            let entry = Rid::child(split.right_page);

            let full = self.write_node(parent, |node| {
                node.set_key(slot, &split.left_max);
                if node.is_full() {
                    return true;
                }
                node.insert_at(slot + 1, &split.right_max, entry);
                false
            })?;
            if !full {
                return Ok(());
            }

            split = self.split_internal(parent, slot + 1, &split.right_max, entry)?;
            level = parent_level;
        }
    }

    /// Split the full internal node `page` and insert the entry at position
    /// `pos` of the combined sequence.
    fn split_internal(
        &mut self,
        page: PageId,
        pos: usize,
        key: &[u8],
        entry: Rid,
    ) -> Result<SplitResult> {
        let right_page = self.allocate_page()?;

        let (left_max, right_max, old_right) = {
            let mut lguard = self.bpm.fetch_page_write(page)?;
            let mut rguard = self.bpm.fetch_page_write(right_page)?;
            let mut lhs = BTreeNode::new(self.layout, lguard.as_mut_slice());
            let mut rhs = BTreeNode::new(self.layout, rguard.as_mut_slice());
            rhs.init(PageType::BTreeInternal, right_page);

            let old_right = lhs.split(&mut rhs, page, right_page);
            let kept = lhs.count();
            if pos < kept {
                lhs.insert_at(pos, key, entry);
            } else {
                rhs.insert_at(pos - kept, key, entry);
            }

            (largest(&lhs), largest(&rhs), old_right)
        };
        self.relink_left(old_right, right_page)?;

        tracing::debug!(left = page.0, right = right_page.0, "split internal node");
        Ok(SplitResult {
            left_max,
            right_max,
            right_page,
        })
    }

    /// Replace the root with a new internal node over the two split halves.
    fn grow_root(&mut self, old_root: PageId, split: SplitResult) -> Result<()> {
        let new_root = self.allocate_page()?;
        {
            let mut guard = self.bpm.fetch_page_write(new_root)?;
            let mut root = BTreeNode::new(self.layout, guard.as_mut_slice());
            root.init(PageType::BTreeInternal, new_root);
            root.insert_at(0, &split.left_max, Rid::child(old_root));
            root.insert_at(1, &split.right_max, Rid::child(split.right_page));
        }

        self.header.root_page = new_root;
        self.header.height += 1;
        self.header_dirty = true;

        tracing::debug!(root = new_root.0, height = self.header.height, "grew root");
        Ok(())
    }

    /// Point the left link of `page` (if any) at `left`.
    fn relink_left(&self, page: Option<PageId>, left: PageId) -> Result<()> {
        match page {
            Some(page) => self.write_node(page, |node| node.set_left(Some(left))),
            None => Ok(()),
        }
    }
}

fn largest<B: AsRef<[u8]>>(node: &BTreeNode<B>) -> Vec<u8> {
    node.largest_key().map(<[u8]>::to_vec).unwrap_or_default()
}
