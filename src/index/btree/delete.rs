//! Deletion with lazy node removal.
//!
//! A node is only removed once it has no entries left; there is no
//! redistribution between siblings. The root collapses into its only child
//! when it is down to one entry.

use std::cmp::Ordering;

use crate::common::{PageId, Result, Rid};

use super::handle::{DeleteOutcome, IndexHandle, Path};

impl IndexHandle {
    /// Remove the pair (key, rid) from the index.
    ///
    /// # Errors
    /// - `Error::KeyLength` if `key` does not match the attribute length
    /// - storage and corruption errors from the pages touched
    pub fn delete_entry(&mut self, key: &[u8], rid: Rid) -> Result<DeleteOutcome> {
        self.check_key(key)?;
        let Some((path, pos)) = self.locate(key, rid)? else {
            return Ok(DeleteOutcome::NotFound);
        };

        self.remove_from_level(&path, path.leaf_level(), pos)?;

        let was_max = self
            .tree_largest
            .as_deref()
            .is_some_and(|max| self.compare(key, max) == Ordering::Equal);
        if was_max {
            self.refresh_tree_largest()?;
        }
        Ok(DeleteOutcome::Deleted)
    }

    /// Remove entry `pos` of `path.pages[level]` and repair the levels above.
    fn remove_from_level(&mut self, path: &Path, mut level: usize, mut pos: usize) -> Result<()> {
        loop {
            let page = path.pages[level];
            let (remaining, new_max) = self.write_node(page, |node| {
                let was_last = pos + 1 == node.count();
                node.remove_at(pos);
                let new_max = if was_last {
                    node.largest_key().map(<[u8]>::to_vec)
                } else {
                    None
                };
                (node.count(), new_max)
            })?;

            if level == 0 {
                if self.height() > 1 && remaining == 1 {
                    self.collapse_root()?;
                }
                return Ok(());
            }

            if remaining == 0 {
                self.unlink(page)?;
                self.dispose_page(page)?;
                tracing::debug!(page = page.0, level, "removed empty node");

                pos = path.slots[level - 1];
                level -= 1;
                continue;
            }

            if let Some(max) = new_max {
                self.rewrite_ancestors(path, level, &max)?;
            }
            return Ok(());
        }
    }

    /// Copy a node's new maximum into its ancestors, stopping at the first
    /// one whose own maximum does not change.
    fn rewrite_ancestors(&self, path: &Path, level: usize, max: &[u8]) -> Result<()> {
        for l in (0..level).rev() {
            let slot = path.slots[l];
            let was_last = self.write_node(path.pages[l], |node| {
                node.set_key(slot, max);
                slot + 1 == node.count()
            })?;
            if !was_last {
                break;
            }
        }
        Ok(())
    }

    /// Replace a single-entry internal root by its child, repeatedly.
    fn collapse_root(&mut self) -> Result<()> {
        while self.height() > 1 {
            let root = self.header.root_page;
            let child = self.read_node(root, |node| (node.count() == 1).then(|| node.child(0)))?;
            let Some(child) = child else {
                break;
            };

            self.dispose_page(root)?;
            self.header.root_page = child;
            self.header.height -= 1;
            self.header_dirty = true;

            tracing::debug!(root = child.0, height = self.header.height, "collapsed root");
        }
        Ok(())
    }

    /// Detach `page` from its sibling chain.
    fn unlink(&self, page: PageId) -> Result<()> {
        let (left, right) = self.read_node(page, |node| (node.left(), node.right()))?;
        if let Some(left) = left {
            self.write_node(left, |node| node.set_right(right))?;
        }
        if let Some(right) = right {
            self.write_node(right, |node| node.set_left(left))?;
        }
        Ok(())
    }
}
