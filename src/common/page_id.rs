//! Page identifier type.

use std::fmt;

/// Identifies a page within one paged file.
///
/// Sibling links, child pointers and the root reference of an index are all
/// stored as `PageId`s, never as in-memory pointers.
///
/// # Example
/// ```
/// use ixstore::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert_eq!(page_id.0, 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Invalid/sentinel page ID.
    ///
    /// Marks a missing sibling or an empty free chain.
    pub const INVALID: PageId = PageId(u32::MAX);

    /// The page holding an index file's header.
    pub const HEADER: PageId = PageId(0);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Check if this page ID is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// `Some(self)` unless this is the sentinel.
    #[inline]
    pub fn valid(self) -> Option<PageId> {
        self.is_valid().then_some(self)
    }

    /// Read a little-endian page id from the first four bytes of `bytes`.
    #[inline]
    pub fn read_le(bytes: &[u8]) -> Self {
        PageId(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Write this page id little-endian into the first four bytes of `bytes`.
    #[inline]
    pub fn write_le(self, bytes: &mut [u8]) {
        bytes[..4].copy_from_slice(&self.0.to_le_bytes());
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}
