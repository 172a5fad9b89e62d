//! Whole-tree structural check.

use crate::common::{Error, PageId, Result, Rid};
use crate::storage::page::PageType;

use super::handle::IndexHandle;

/// Shape of a tree that passed [`IndexHandle::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    pub height: usize,
    pub leaf_pages: usize,
    pub internal_pages: usize,
    /// Entries at the leaf level.
    pub entries: usize,
}

impl IndexHandle {
    /// Walk every node and check the tree invariants.
    ///
    /// Checked: node types per level, sorted keys, internal keys equal to
    /// their subtree maximum, all leaves at depth `height`, sibling chains
    /// that link each level left to right, no empty node besides a leaf
    /// root, and the cached tree maximum.
    ///
    /// # Errors
    /// `Error::CorruptIndex` describing the first violation found.
    pub fn verify(&self) -> Result<TreeStats> {
        let mut stats = TreeStats {
            height: self.height(),
            ..TreeStats::default()
        };
        let mut levels: Vec<Vec<PageId>> = vec![Vec::new(); self.height()];

        let root_max = self.verify_subtree(self.header.root_page, 0, &mut levels, &mut stats)?;
        if root_max != self.tree_largest {
            return Err(Error::corrupt("cached tree maximum is stale"));
        }

        for (depth, pages) in levels.iter().enumerate() {
            for (i, &page) in pages.iter().enumerate() {
                let expected_left = i.checked_sub(1).map(|j| pages[j]);
                let expected_right = pages.get(i + 1).copied();
                let (left, right) = self.read_node(page, |node| (node.left(), node.right()))?;
                if left != expected_left || right != expected_right {
                    return Err(Error::corrupt(format!(
                        "sibling links of page {} at depth {depth} are {left:?}/{right:?}, \
                         expected {expected_left:?}/{expected_right:?}",
                        page.0
                    )));
                }
            }
        }

        Ok(stats)
    }

    /// Check the subtree under `page` and return its largest key.
    fn verify_subtree(
        &self,
        page: PageId,
        depth: usize,
        levels: &mut [Vec<PageId>],
        stats: &mut TreeStats,
    ) -> Result<Option<Vec<u8>>> {
        levels[depth].push(page);
        let at_leaf_level = depth + 1 == levels.len();

        let (page_type, entries) = self.read_node(page, |node| {
            let entries: Vec<(Vec<u8>, Rid)> = (0..node.count())
                .map(|i| (node.key(i).to_vec(), node.rid(i)))
                .collect();
            (node.page_type(), entries)
        })?;

        let expected_type = if at_leaf_level {
            PageType::BTreeLeaf
        } else {
            PageType::BTreeInternal
        };
        if page_type != expected_type {
            return Err(Error::corrupt(format!(
                "page {} at depth {depth} is {page_type:?}, expected {expected_type:?}",
                page.0
            )));
        }

        if entries.is_empty() && !(depth == 0 && at_leaf_level) {
            return Err(Error::corrupt(format!("empty node on page {}", page.0)));
        }
        if entries
            .windows(2)
            .any(|w| self.compare(&w[0].0, &w[1].0).is_gt())
        {
            return Err(Error::corrupt(format!("keys out of order on page {}", page.0)));
        }

        if at_leaf_level {
            stats.leaf_pages += 1;
            stats.entries += entries.len();
        } else {
            stats.internal_pages += 1;
            for (key, rid) in &entries {
                let child_max = self.verify_subtree(rid.page, depth + 1, levels, stats)?;
                if child_max.as_deref() != Some(key.as_slice()) {
                    return Err(Error::corrupt(format!(
                        "key on page {} does not match the maximum of child {}",
                        page.0, rid.page.0
                    )));
                }
            }
        }

        Ok(entries.last().map(|(key, _)| key.clone()))
    }
}
