//! IndexHandle - one open B+tree index file.

use std::cmp::Ordering;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{Error, PageId, Result, Rid};
use crate::index::header::IndexHeader;
use crate::index::AttrType;
use crate::storage::page::{PageHeader, PageType};

use super::node::{BTreeNode, NodeLayout};

/// Result of [`IndexHandle::insert_entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The exact (key, rid) pair is already indexed; nothing changed.
    AlreadyExists,
}

/// Result of [`IndexHandle::delete_entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// No entry with this (key, rid) pair; nothing changed.
    NotFound,
}

/// Root-to-leaf route taken by one request.
///
/// `pages[0]` is the root and `pages[height - 1]` the leaf. `slots[l]` is
/// the entry of `pages[l]` that leads to `pages[l + 1]`.
#[derive(Debug, Clone)]
pub(super) struct Path {
    pub(super) pages: Vec<PageId>,
    pub(super) slots: Vec<usize>,
}

impl Path {
    pub(super) fn leaf(&self) -> PageId {
        self.pages[self.pages.len() - 1]
    }

    pub(super) fn leaf_level(&self) -> usize {
        self.pages.len() - 1
    }
}

/// An open B+tree index.
///
/// Obtained from [`IndexManager::open_index`](crate::index::IndexManager::open_index)
/// and handed back through
/// [`IndexManager::close_index`](crate::index::IndexManager::close_index).
/// Dropping a handle without closing it still makes a best-effort attempt to
/// write everything back.
pub struct IndexHandle {
    pub(super) bpm: Arc<BufferPoolManager>,
    pub(super) header: IndexHeader,
    pub(super) layout: NodeLayout,
    /// Copy of the largest key in the tree, `None` while the tree is empty.
    pub(super) tree_largest: Option<Vec<u8>>,
    pub(super) header_dirty: bool,
    file: PathBuf,
    closed: bool,
}

impl IndexHandle {
    /// Write the header page and an empty root leaf into a new file.
    pub(crate) fn format(
        bpm: &BufferPoolManager,
        layout: NodeLayout,
        page_size: usize,
    ) -> Result<()> {
        if bpm.new_page()?.page_id() != PageId::HEADER {
            return Err(Error::corrupt("index file is not empty"));
        }
        let root = {
            let mut guard = bpm.new_page()?;
            let root = guard.page_id();
            BTreeNode::new(layout, guard.as_mut_slice()).init(PageType::BTreeLeaf, root);
            root
        };

        let mut header = IndexHeader::new(
            layout.attr_type,
            layout.attr_len,
            page_size,
            layout.order,
            root,
        );
        header.num_pages = bpm.disk_page_count();
        {
            let mut guard = bpm.fetch_page_write(PageId::HEADER)?;
            header.write_to(&mut guard);
        }

        bpm.flush_all_pages()
    }

    /// Load the header of an index file served by `bpm`.
    pub(crate) fn open(bpm: Arc<BufferPoolManager>, file: PathBuf) -> Result<Self> {
        let header = {
            let guard = bpm.fetch_page_read(PageId::HEADER)?;
            IndexHeader::read_from(&guard)?
        };
        let layout = NodeLayout::new(
            header.attr_type,
            header.attr_len as usize,
            header.page_size as usize,
        )?;
        if layout.order != header.order as usize {
            return Err(Error::corrupt(format!(
                "stored order {} does not match computed order {}",
                header.order, layout.order
            )));
        }

        let mut handle = Self {
            bpm,
            header,
            layout,
            tree_largest: None,
            header_dirty: false,
            file,
            closed: false,
        };
        handle.refresh_tree_largest()?;
        Ok(handle)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Maximum number of entries per node.
    pub fn order(&self) -> usize {
        self.layout.order
    }

    pub fn height(&self) -> usize {
        self.header.height as usize
    }

    pub fn root_page(&self) -> PageId {
        self.header.root_page
    }

    /// Pages in the index file, header and free pages included.
    pub fn page_count(&self) -> u32 {
        self.bpm.disk_page_count()
    }

    pub fn attr_type(&self) -> AttrType {
        self.layout.attr_type
    }

    pub fn attr_len(&self) -> usize {
        self.layout.attr_len
    }

    /// Path of the backing file.
    pub fn file(&self) -> &FsPath {
        &self.file
    }

    /// Buffer pool serving this index.
    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Rid of some entry whose key equals `key`.
    pub fn search(&self, key: &[u8]) -> Result<Option<Rid>> {
        self.check_key(key)?;
        let leaf = self.find_leaf(key, false)?;
        self.read_node(leaf, |node| node.find(key).map(|pos| node.rid(pos)))
    }

    /// Leaf that a descent toward `key` ends in.
    ///
    /// With `strict == false` it is the leaf holding the first entry `>= key`;
    /// with `strict == true` the leaf holding the first entry `> key`. When no
    /// such entry exists it is the rightmost leaf.
    pub(crate) fn find_leaf(&self, key: &[u8], strict: bool) -> Result<PageId> {
        Ok(self.descend(key, strict)?.leaf())
    }

    /// Leftmost (`rightmost == false`) or rightmost leaf of the tree.
    pub(crate) fn edge_leaf(&self, rightmost: bool) -> Result<PageId> {
        let mut page = self.header.root_page;
        for _ in 1..self.height() {
            page = self.read_node(page, |node| {
                if node.is_leaf() || node.is_empty() {
                    return Err(Error::corrupt(format!("bad internal node on page {}", page.0)));
                }
                let slot = if rightmost { node.count() - 1 } else { 0 };
                Ok(node.child(slot))
            })??;
        }
        // Load the leaf itself so a damaged edge page surfaces here.
        if !self.read_node(page, |node| node.is_leaf())? {
            return Err(Error::corrupt(format!(
                "page {} at leaf level is not a leaf",
                page.0
            )));
        }
        Ok(page)
    }

    pub(super) fn descend(&self, key: &[u8], strict: bool) -> Result<Path> {
        let height = self.height();
        let mut path = Path {
            pages: Vec::with_capacity(height),
            slots: Vec::with_capacity(height.saturating_sub(1)),
        };

        let mut page = self.header.root_page;
        for _ in 1..height {
            let (slot, child) = self.read_node(page, |node| {
                if node.is_leaf() {
                    return Err(Error::corrupt(format!("leaf {} above leaf level", page.0)));
                }
                node.child_slot(key, strict)
                    .map(|slot| (slot, node.child(slot)))
                    .ok_or_else(|| Error::corrupt(format!("empty internal node {}", page.0)))
            })??;
            path.pages.push(page);
            path.slots.push(slot);
            page = child;
        }

        if !self.read_node(page, |node| node.is_leaf())? {
            return Err(Error::corrupt(format!("internal node {} at leaf level", page.0)));
        }
        path.pages.push(page);

        tracing::trace!(leaf = page.0, height, strict, "descended");
        Ok(path)
    }

    /// Move `path` to the next leaf in key order.
    ///
    /// Returns `false` (path untouched) when the path already ends in the
    /// rightmost leaf.
    pub(super) fn advance_path(&self, path: &mut Path) -> Result<bool> {
        let mut level = path.slots.len();
        loop {
            if level == 0 {
                return Ok(false);
            }
            level -= 1;
            let next = path.slots[level] + 1;
            if next < self.read_node(path.pages[level], |node| node.count())? {
                path.slots[level] = next;
                break;
            }
        }

        for l in level..path.slots.len() {
            let child = self.read_node(path.pages[l], |node| node.child(path.slots[l]))?;
            path.pages[l + 1] = child;
            if l + 1 < path.slots.len() {
                path.slots[l + 1] = 0;
            }
        }
        Ok(true)
    }

    /// Find the leaf position of the exact (key, rid) pair.
    ///
    /// Walks the duplicate run of `key` rightward across leaves, carrying the
    /// path along so it stays usable for structural updates.
    pub(super) fn locate(&self, key: &[u8], rid: Rid) -> Result<Option<(Path, usize)>> {
        let mut path = self.descend(key, false)?;
        loop {
            let (hit, run_continues) = self.read_node(path.leaf(), |node| {
                let hit = node.find_key(key, Some(rid));
                let run_continues = node
                    .largest_key()
                    .is_some_and(|max| node.cmp_key(max, key) == Ordering::Equal);
                (hit, run_continues)
            })?;

            if let Some(pos) = hit {
                return Ok(Some((path, pos)));
            }
            if !run_continues || !self.advance_path(&mut path)? {
                return Ok(None);
            }
        }
    }

    // ========================================================================
    // Node access
    // ========================================================================

    /// Run `f` over the node stored on `page`.
    pub(crate) fn read_node<T>(
        &self,
        page: PageId,
        f: impl FnOnce(&BTreeNode<&[u8]>) -> T,
    ) -> Result<T> {
        let guard = self.bpm.fetch_page_read(page)?;
        let node = BTreeNode::new(self.layout, guard.as_slice());
        check_node(&node, page, self.layout.order)?;
        Ok(f(&node))
    }

    /// Run `f` over the node stored on `page`, with write access.
    pub(super) fn write_node<T>(
        &self,
        page: PageId,
        f: impl FnOnce(&mut BTreeNode<&mut [u8]>) -> T,
    ) -> Result<T> {
        let mut guard = self.bpm.fetch_page_write(page)?;
        let mut node = BTreeNode::new(self.layout, guard.as_mut_slice());
        check_node(&node, page, self.layout.order)?;
        Ok(f(&mut node))
    }

    pub(super) fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.layout.attr_len {
            return Err(Error::KeyLength {
                expected: self.layout.attr_len,
                actual: key.len(),
            });
        }
        Ok(())
    }

    pub(super) fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.layout.attr_type.compare(a, b)
    }

    /// Reload `tree_largest` from the root, whose last key is the tree max.
    pub(super) fn refresh_tree_largest(&mut self) -> Result<()> {
        let root = self.header.root_page;
        self.tree_largest = self.read_node(root, |node| node.largest_key().map(<[u8]>::to_vec))?;
        Ok(())
    }

    // ========================================================================
    // Page allocation
    // ========================================================================

    /// Take a page from the free chain, or grow the file by one.
    ///
    /// The page comes back unformatted; the caller initializes it.
    pub(super) fn allocate_page(&mut self) -> Result<PageId> {
        if let Some(free) = self.header.free_head.valid() {
            let next = {
                let guard = self.bpm.fetch_page_read(free)?;
                if guard.page_type() != PageType::Free {
                    return Err(Error::corrupt(format!(
                        "free chain points at {:?} page {}",
                        guard.page_type(),
                        free.0
                    )));
                }
                PageId::read_le(&guard.as_slice()[PageHeader::SIZE..])
            };
            self.header.free_head = next;
            self.header_dirty = true;
            return Ok(free);
        }

        let page = self.bpm.new_page()?.page_id();
        self.header.num_pages = self.bpm.disk_page_count();
        self.header_dirty = true;
        Ok(page)
    }

    /// Return a node page to the free chain.
    pub(super) fn dispose_page(&mut self, page: PageId) -> Result<()> {
        {
            let mut guard = self.bpm.fetch_page_write(page)?;
            guard.format(PageType::Free, page);
            self.header
                .free_head
                .write_le(&mut guard.as_mut_slice()[PageHeader::SIZE..]);
        }
        self.header.free_head = page;
        self.header_dirty = true;
        Ok(())
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Write the header page if it changed since the last write.
    pub fn persist_header(&mut self) -> Result<()> {
        if !self.header_dirty {
            return Ok(());
        }
        self.header.num_pages = self.bpm.disk_page_count();
        {
            let mut guard = self.bpm.fetch_page_write(PageId::HEADER)?;
            self.header.write_to(&mut guard);
        }
        self.header_dirty = false;
        Ok(())
    }

    /// Write one page (or, with `None`, the header and every dirty page)
    /// back and sync the file.
    pub fn force_pages(&mut self, page: Option<PageId>) -> Result<()> {
        match page {
            Some(page) => self.bpm.flush_page(page),
            None => {
                self.persist_header()?;
                self.bpm.flush_all_pages()
            }
        }
    }

    /// Persist and flush everything, consuming the handle.
    pub(crate) fn close(mut self) -> Result<()> {
        self.force_pages(None)?;
        self.closed = true;
        Ok(())
    }
}

impl Drop for IndexHandle {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.force_pages(None) {
            tracing::warn!(file = %self.file.display(), error = %e, "flush of unclosed index failed");
        }
    }
}

fn check_node<B: AsRef<[u8]>>(node: &BTreeNode<B>, page: PageId, order: usize) -> Result<()> {
    match node.page_type() {
        PageType::BTreeLeaf | PageType::BTreeInternal => {}
        other => {
            return Err(Error::corrupt(format!(
                "page {} is {:?}, expected a tree node",
                page.0, other
            )))
        }
    }
    if node.count() > order {
        return Err(Error::corrupt(format!(
            "node {} holds {} entries, order is {}",
            page.0,
            node.count(),
            order
        )));
    }
    Ok(())
}
