//! IndexScan - predicate-driven cursor over the leaf level.
//!
//! The scan positions itself once, near the first qualifying entry, and may
//! record a boundary leaf past which no entry can qualify. Every visited
//! entry is still checked against the predicate, so positioning only ever
//! saves work.

use crate::common::{Error, PageId, Result, Rid};
use crate::index::CompOp;

use super::handle::IndexHandle;

/// One (key, rid) pair produced by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: Vec<u8>,
    pub rid: Rid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    At(usize),
    /// Last entry of the page, resolved when the page is read.
    Last,
    /// Nothing left on this page in the scan direction.
    Done,
}

#[derive(Debug)]
struct Cursor {
    /// `None` once the scan hit EOF.
    page: Option<PageId>,
    slot: Slot,
    /// Last leaf that can hold a qualifying entry.
    boundary: Option<PageId>,
}

#[derive(Debug)]
enum ScanState {
    Open(Cursor),
    Closed,
}

/// A scan over one index, yielding entries with `key <op> value`.
///
/// # Example
/// ```ignore
/// let mut scan = IndexScan::open(&handle, CompOp::Lt, Some(&10i32.to_le_bytes()), true)?;
/// while let Some(entry) = scan.get_next_entry()? {
///     // entries with key < 10, largest first
/// }
/// scan.close();
/// ```
pub struct IndexScan<'a> {
    handle: &'a IndexHandle,
    op: CompOp,
    value: Option<Vec<u8>>,
    desc: bool,
    state: ScanState,
}

impl<'a> IndexScan<'a> {
    /// Open a scan with predicate `key <op> value`.
    ///
    /// `CompOp::NoOp` or a `None` value scan the whole index. `desc` walks
    /// from the largest key down.
    ///
    /// # Errors
    /// - `Error::KeyLength` if `value` does not match the attribute length
    /// - storage and corruption errors while positioning
    pub fn open(
        handle: &'a IndexHandle,
        op: CompOp,
        value: Option<&[u8]>,
        desc: bool,
    ) -> Result<Self> {
        if let Some(value) = value {
            handle.check_key(value)?;
        }
        let (op, value) = match value {
            Some(v) if op != CompOp::NoOp => (op, Some(v.to_vec())),
            _ => (CompOp::NoOp, None),
        };

        let mut scan = Self {
            handle,
            op,
            value,
            desc,
            state: ScanState::Closed,
        };
        let cursor = scan.position()?;
        tracing::trace!(?op, desc, start = ?cursor.page, boundary = ?cursor.boundary, "scan opened");
        scan.state = ScanState::Open(cursor);
        Ok(scan)
    }

    /// Work out the starting leaf/slot and the boundary leaf.
    fn position(&self) -> Result<Cursor> {
        let h = self.handle;
        let Some(value) = self.value.as_deref() else {
            return self.from_edge(None);
        };

        // Lower: leaf and slot of the first entry >= value.
        // Upper: leaf and slot of the first entry > value.
        let lower = || -> Result<(PageId, usize, bool)> {
            let leaf = h.find_leaf(value, false)?;
            h.read_node(leaf, |node| {
                let pos = node.find_key_position(value);
                let present = pos < node.count()
                    && h.compare(node.key(pos), value).is_eq();
                (leaf, pos, present)
            })
        };
        let upper = || -> Result<(PageId, usize)> {
            let leaf = h.find_leaf(value, true)?;
            h.read_node(leaf, |node| (leaf, node.upper_bound(value)))
        };

        let cursor = match (self.desc, self.op) {
            (_, CompOp::NoOp | CompOp::Ne) => self.from_edge(None)?,

            (false, CompOp::Eq) => {
                let (leaf, pos, present) = lower()?;
                if !present {
                    return Ok(eof());
                }
                Cursor {
                    page: Some(leaf),
                    slot: Slot::At(pos),
                    boundary: Some(upper()?.0),
                }
            }
            (false, CompOp::Ge) => {
                let (leaf, pos, _) = lower()?;
                start_at(leaf, Slot::At(pos), None)
            }
            (false, CompOp::Gt) => {
                let (leaf, pos) = upper()?;
                start_at(leaf, Slot::At(pos), None)
            }
            (false, CompOp::Lt) => self.from_edge(Some(lower()?.0))?,
            (false, CompOp::Le) => self.from_edge(Some(upper()?.0))?,

            (true, CompOp::Eq) => {
                let (lower_leaf, _, present) = lower()?;
                if !present {
                    return Ok(eof());
                }
                let (leaf, pos) = upper()?;
                start_at(leaf, before(pos), Some(lower_leaf))
            }
            (true, CompOp::Lt) => {
                let (leaf, pos, _) = lower()?;
                start_at(leaf, before(pos), None)
            }
            (true, CompOp::Le) => {
                let (leaf, pos) = upper()?;
                start_at(leaf, before(pos), None)
            }
            (true, CompOp::Gt) => self.from_edge(Some(upper()?.0))?,
            (true, CompOp::Ge) => self.from_edge(Some(lower()?.0))?,
        };
        Ok(cursor)
    }

    /// Start at the leftmost (ascending) or rightmost (descending) leaf.
    fn from_edge(&self, boundary: Option<PageId>) -> Result<Cursor> {
        let leaf = self.handle.edge_leaf(self.desc)?;
        let slot = if self.desc { Slot::Last } else { Slot::At(0) };
        Ok(start_at(leaf, slot, boundary))
    }

    /// Next qualifying entry, or `None` at the end of the scan.
    ///
    /// # Errors
    /// - `Error::ScanClosed` after [`IndexScan::close`]
    /// - storage and corruption errors while following leaves
    pub fn get_next_entry(&mut self) -> Result<Option<IndexEntry>> {
        let handle = self.handle;
        let (op, desc) = (self.op, self.desc);
        let value = self.value.as_deref();
        let ScanState::Open(cursor) = &mut self.state else {
            return Err(Error::ScanClosed);
        };

        while let Some(page) = cursor.page {
            let slot = cursor.slot;
            let (found, left, right) = handle.read_node(page, |node| {
                let count = node.count();
                let at = match slot {
                    Slot::At(i) if i < count => Some(i),
                    Slot::Last if count > 0 => Some(count - 1),
                    _ => None,
                };
                let found = at.map(|i| (i, node.key(i).to_vec(), node.rid(i)));
                (found, node.left(), node.right())
            })?;

            let Some((i, key, rid)) = found else {
                // Page exhausted: stop at the boundary, else move on.
                if cursor.boundary == Some(page) {
                    cursor.page = None;
                    break;
                }
                let next = if desc { left } else { right };
                *cursor = Cursor {
                    page: next,
                    slot: if desc { Slot::Last } else { Slot::At(0) },
                    boundary: cursor.boundary,
                };
                continue;
            };

            cursor.slot = match (desc, i) {
                (false, i) => Slot::At(i + 1),
                (true, 0) => Slot::Done,
                (true, i) => Slot::At(i - 1),
            };

            let qualifies = match value {
                Some(value) => op.holds(handle.compare(&key, value)),
                None => true,
            };
            if qualifies {
                return Ok(Some(IndexEntry { key, rid }));
            }
        }

        Ok(None)
    }

    /// Close the scan. Further [`IndexScan::get_next_entry`] calls fail.
    pub fn close(&mut self) {
        self.state = ScanState::Closed;
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, ScanState::Open(_))
    }
}

impl Iterator for IndexScan<'_> {
    type Item = Result<IndexEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.is_open() {
            return None;
        }
        match self.get_next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => {
                self.close();
                Some(Err(e))
            }
        }
    }
}

fn start_at(page: PageId, slot: Slot, boundary: Option<PageId>) -> Cursor {
    Cursor {
        page: Some(page),
        slot,
        boundary,
    }
}

fn eof() -> Cursor {
    Cursor {
        page: None,
        slot: Slot::Done,
        boundary: None,
    }
}

/// Slot just before position `pos` when walking backwards.
fn before(pos: usize) -> Slot {
    match pos.checked_sub(1) {
        Some(i) => Slot::At(i),
        None => Slot::Done,
    }
}
