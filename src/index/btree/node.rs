//! BTreeNode - a typed view over the bytes of one pinned node page.
//!
//! A node never owns its page. It borrows the slice of a page guard for the
//! duration of one operation and is rebuilt on the next access.

use std::cmp::Ordering;

use crate::common::config::{MIN_ORDER, PAGE_SIZE, RID_SIZE};
use crate::common::{Error, PageId, Result, Rid};
use crate::index::AttrType;
use crate::storage::page::{PageHeader, PageType};

/// Bytes a node needs besides its entries: page header, count slot and the
/// two sibling links.
pub const NODE_OVERHEAD: usize = PageHeader::SIZE + COUNT_SLOT + 8;

/// u32 count followed by 4 reserved bytes.
const COUNT_SLOT: usize = 8;

/// Shape shared by every node of one index.
///
/// # Node Layout
/// ```text
/// ┌─────────────┬──────────────────────┬──────────────────┬───────┬──────┬───────┐
/// │ PageHeader  │ keys                 │ rids             │ count │ left │ right │
/// │ (9 bytes)   │ (order × attr_len)   │ (order × 8)      │ (8)   │ (4)  │ (4)   │
/// └─────────────┴──────────────────────┴──────────────────┴───────┴──────┴───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLayout {
    pub attr_type: AttrType,
    pub attr_len: usize,
    pub order: usize,
}

impl NodeLayout {
    /// Layout for keys of `attr_type`/`attr_len` in a logical page of
    /// `page_size` bytes.
    ///
    /// # Errors
    /// - `Error::InvalidAttribute` for an illegal type/length pair
    /// - `Error::InvalidPageSize` if the page is larger than a physical page
    /// - `Error::InvalidOrder` if fewer than [`MIN_ORDER`] entries fit
    pub fn new(attr_type: AttrType, attr_len: usize, page_size: usize) -> Result<Self> {
        attr_type.validate(attr_len)?;
        if page_size > PAGE_SIZE {
            return Err(Error::InvalidPageSize(page_size));
        }

        let order = Self::order_for(page_size, attr_len);
        if order < MIN_ORDER {
            return Err(Error::InvalidOrder {
                order,
                page_size,
                attr_len,
            });
        }

        Ok(Self {
            attr_type,
            attr_len,
            order,
        })
    }

    /// Number of entries that fit in a node of `page_size` bytes.
    pub fn order_for(page_size: usize, attr_len: usize) -> usize {
        page_size.saturating_sub(NODE_OVERHEAD) / (attr_len + RID_SIZE)
    }

    /// Smallest logical page size that yields exactly `order` entries.
    pub fn page_size_for(order: usize, attr_len: usize) -> usize {
        NODE_OVERHEAD + order * (attr_len + RID_SIZE)
    }

    #[inline]
    fn key_offset(&self, i: usize) -> usize {
        PageHeader::SIZE + i * self.attr_len
    }

    #[inline]
    fn rid_offset(&self, i: usize) -> usize {
        PageHeader::SIZE + self.order * self.attr_len + i * RID_SIZE
    }

    #[inline]
    fn count_offset(&self) -> usize {
        self.rid_offset(self.order)
    }

    #[inline]
    fn left_offset(&self) -> usize {
        self.count_offset() + COUNT_SLOT
    }

    #[inline]
    fn right_offset(&self) -> usize {
        self.left_offset() + 4
    }
}

/// A B+tree node viewed through a byte buffer.
///
/// `B` is `&[u8]` for read access and `&mut [u8]` for mutation; both come
/// from a page guard (`guard.as_slice()` / `guard.as_mut_slice()`).
pub struct BTreeNode<B> {
    layout: NodeLayout,
    buf: B,
}

impl<B: AsRef<[u8]>> BTreeNode<B> {
    /// Wrap an existing node page.
    pub fn new(layout: NodeLayout, buf: B) -> Self {
        Self { layout, buf }
    }

    #[inline]
    fn data(&self) -> &[u8] {
        self.buf.as_ref()
    }

    pub fn layout(&self) -> NodeLayout {
        self.layout
    }

    /// Page type from the header: leaf or internal.
    pub fn page_type(&self) -> PageType {
        PageType::from_u8(self.data()[PageHeader::OFFSET_PAGE_TYPE])
    }

    pub fn is_leaf(&self) -> bool {
        self.page_type() == PageType::BTreeLeaf
    }

    /// Number of entries in the node.
    #[inline]
    pub fn count(&self) -> usize {
        let off = self.layout.count_offset();
        let d = self.data();
        u32::from_le_bytes([d[off], d[off + 1], d[off + 2], d[off + 3]]) as usize
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count() >= self.layout.order
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Key of entry `i`.
    #[inline]
    pub fn key(&self, i: usize) -> &[u8] {
        let off = self.layout.key_offset(i);
        &self.data()[off..off + self.layout.attr_len]
    }

    /// RID of entry `i`.
    #[inline]
    pub fn rid(&self, i: usize) -> Rid {
        Rid::read_le(&self.data()[self.layout.rid_offset(i)..])
    }

    /// Child page referenced by internal entry `i`.
    #[inline]
    pub fn child(&self, i: usize) -> PageId {
        self.rid(i).page
    }

    /// Left sibling, if any.
    pub fn left(&self) -> Option<PageId> {
        PageId::read_le(&self.data()[self.layout.left_offset()..]).valid()
    }

    /// Right sibling, if any.
    pub fn right(&self) -> Option<PageId> {
        PageId::read_le(&self.data()[self.layout.right_offset()..]).valid()
    }

    /// Last key of the node, `None` when empty.
    pub fn largest_key(&self) -> Option<&[u8]> {
        match self.count() {
            0 => None,
            n => Some(self.key(n - 1)),
        }
    }

    /// Type-directed key comparison.
    #[inline]
    pub fn cmp_key(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.layout.attr_type.compare(a, b)
    }

    /// Number of entries whose key is strictly less than `key`.
    pub fn find_key_position(&self, key: &[u8]) -> usize {
        self.partition(|k| self.cmp_key(k, key) == Ordering::Less)
    }

    /// Number of entries whose key is less than or equal to `key`.
    pub fn upper_bound(&self, key: &[u8]) -> usize {
        self.partition(|k| self.cmp_key(k, key) != Ordering::Greater)
    }

    fn partition(&self, pred: impl Fn(&[u8]) -> bool) -> usize {
        let (mut lo, mut hi) = (0, self.count());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if pred(self.key(mid)) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Slot to follow when descending toward `key`: the first entry whose
    /// key is `>= key` (`> key` when `strict`), else the last entry.
    ///
    /// Returns `None` only for an empty node.
    pub fn child_slot(&self, key: &[u8], strict: bool) -> Option<usize> {
        let n = self.count();
        if n == 0 {
            return None;
        }
        let pos = if strict {
            self.upper_bound(key)
        } else {
            self.find_key_position(key)
        };
        Some(pos.min(n - 1))
    }

    /// Position of the first entry whose key is byte-identical to `key`.
    pub fn find(&self, key: &[u8]) -> Option<usize> {
        self.find_key(key, None)
    }

    /// Position of the entry equal to `key` and, when given, carrying `rid`.
    pub fn find_key(&self, key: &[u8], rid: Option<Rid>) -> Option<usize> {
        let start = self.find_key_position(key);
        (start..self.count())
            .take_while(|&i| self.key(i) == key)
            .find(|&i| rid.map_or(true, |r| self.rid(i) == r))
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> BTreeNode<B> {
    #[inline]
    fn data_mut(&mut self) -> &mut [u8] {
        self.buf.as_mut()
    }

    /// Format the page as an empty node with no siblings.
    pub fn init(&mut self, page_type: PageType, page_id: PageId) {
        let end = self.layout.right_offset() + 4;
        let data = self.data_mut();
        data[..end].fill(0);
        PageHeader::new(page_type, page_id).write_to(data);
        self.set_left(None);
        self.set_right(None);
    }

    pub fn set_count(&mut self, count: usize) {
        let off = self.layout.count_offset();
        self.data_mut()[off..off + 4].copy_from_slice(&(count as u32).to_le_bytes());
    }

    pub fn set_key(&mut self, i: usize, key: &[u8]) {
        let off = self.layout.key_offset(i);
        let len = self.layout.attr_len;
        self.data_mut()[off..off + len].copy_from_slice(key);
    }

    pub fn set_rid(&mut self, i: usize, rid: Rid) {
        let off = self.layout.rid_offset(i);
        rid.write_le(&mut self.data_mut()[off..]);
    }

    pub fn set_left(&mut self, page: Option<PageId>) {
        let off = self.layout.left_offset();
        page.unwrap_or(PageId::INVALID).write_le(&mut self.data_mut()[off..]);
    }

    pub fn set_right(&mut self, page: Option<PageId>) {
        let off = self.layout.right_offset();
        page.unwrap_or(PageId::INVALID).write_le(&mut self.data_mut()[off..]);
    }

    /// Insert keeping sort order; an equal key goes after the existing run.
    ///
    /// Returns the position used, or `None` (node untouched) when full.
    pub fn insert(&mut self, key: &[u8], rid: Rid) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        let pos = self.upper_bound(key);
        self.insert_at(pos, key, rid);
        Some(pos)
    }

    /// Insert at an explicit position, shifting later entries right.
    ///
    /// The caller guarantees the node is not full and that `pos` keeps the
    /// keys ordered.
    pub fn insert_at(&mut self, pos: usize, key: &[u8], rid: Rid) {
        let n = self.count();
        debug_assert!(n < self.layout.order, "insert into full node");
        debug_assert!(pos <= n);

        let (k_from, k_to) = (self.layout.key_offset(pos), self.layout.key_offset(n));
        let (r_from, r_to) = (self.layout.rid_offset(pos), self.layout.rid_offset(n));
        let (klen, data) = (self.layout.attr_len, self.data_mut());
        data.copy_within(k_from..k_to, k_from + klen);
        data.copy_within(r_from..r_to, r_from + RID_SIZE);

        self.set_key(pos, key);
        self.set_rid(pos, rid);
        self.set_count(n + 1);
    }

    /// Remove the entry at `pos`, or the first byte-exact match of `key`.
    ///
    /// Returns `false` if nothing matched.
    pub fn remove(&mut self, key: &[u8], pos: Option<usize>) -> bool {
        let pos = match pos.or_else(|| self.find(key)) {
            Some(p) if p < self.count() => p,
            _ => return false,
        };
        self.remove_at(pos);
        true
    }

    /// Remove the entry at `pos`, shifting later entries left.
    pub fn remove_at(&mut self, pos: usize) {
        let n = self.count();
        debug_assert!(pos < n);

        let (k_from, k_to) = (self.layout.key_offset(pos + 1), self.layout.key_offset(n));
        let (r_from, r_to) = (self.layout.rid_offset(pos + 1), self.layout.rid_offset(n));
        let (klen, data) = (self.layout.attr_len, self.data_mut());
        data.copy_within(k_from..k_to, k_from - klen);
        data.copy_within(r_from..r_to, r_from - RID_SIZE);

        self.set_count(n - 1);
    }

    /// Move the upper `count / 2` entries into the empty node `rhs` and link
    /// `rhs` in as the new right sibling.
    ///
    /// Returns the previous right sibling, whose left link now has to point
    /// at `rhs_page`.
    pub fn split<R>(
        &mut self,
        rhs: &mut BTreeNode<R>,
        self_page: PageId,
        rhs_page: PageId,
    ) -> Option<PageId>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let n = self.count();
        let keep = n - n / 2;

        for (dst, src) in (keep..n).enumerate() {
            rhs.set_key(dst, self.key(src));
            rhs.set_rid(dst, self.rid(src));
        }
        rhs.set_count(n - keep);
        self.set_count(keep);

        let old_right = self.right();
        rhs.set_left(Some(self_page));
        rhs.set_right(old_right);
        self.set_right(Some(rhs_page));
        old_right
    }

    /// Append every entry of the right sibling `rhs` and take over its right
    /// link. `rhs` is left empty.
    ///
    /// Returns the new right sibling, whose left link now has to point at
    /// this node.
    pub fn merge<R>(&mut self, rhs: &mut BTreeNode<R>) -> Result<Option<PageId>>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let (n, m) = (self.count(), rhs.count());
        if n + m > self.layout.order {
            return Err(Error::corrupt(format!(
                "merge of {n} and {m} entries exceeds order {}",
                self.layout.order
            )));
        }

        for src in 0..m {
            self.set_key(n + src, rhs.key(src));
            self.set_rid(n + src, rhs.rid(src));
        }
        self.set_count(n + m);
        rhs.set_count(0);

        let new_right = rhs.right();
        self.set_right(new_right);
        Ok(new_right)
    }
}
