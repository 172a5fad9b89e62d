//! Record identifier type.

use std::fmt;

use crate::common::config::RID_SIZE;
use crate::common::PageId;

/// Record identifier: (page number, slot number).
///
/// In a leaf entry it addresses a heap record owned by the record manager.
/// In an internal entry `page` is the child node and `slot` is [`Rid::NO_SLOT`].
///
/// # Layout (8 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     page (u32, little-endian)
/// 4       4     slot (i32, little-endian)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    pub page: PageId,
    pub slot: i32,
}

impl Rid {
    /// Slot value carried by child pointers.
    pub const NO_SLOT: i32 = -1;

    /// Create a new Rid.
    #[inline]
    pub fn new(page: u32, slot: i32) -> Self {
        Self {
            page: PageId::new(page),
            slot,
        }
    }

    /// Rid stored in an internal node to reference `child`.
    #[inline]
    pub fn child(child: PageId) -> Self {
        Self {
            page: child,
            slot: Self::NO_SLOT,
        }
    }

    /// Decode from the first [`RID_SIZE`] bytes of `bytes`.
    #[inline]
    pub fn read_le(bytes: &[u8]) -> Self {
        let page = PageId::read_le(bytes);
        let slot = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Self { page, slot }
    }

    /// Encode into the first [`RID_SIZE`] bytes of `bytes`.
    #[inline]
    pub fn write_le(self, bytes: &mut [u8]) {
        self.page.write_le(bytes);
        bytes[4..RID_SIZE].copy_from_slice(&self.slot.to_le_bytes());
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid({}, {})", self.page.0, self.slot)
    }
}
