//! Page - the fundamental 4KB unit of storage.
//!
//! A [`Page`] is a raw 4KB byte array moved between disk and the buffer pool.
//! Index nodes and the index header are views over its bytes.

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};

use super::page_header::{PageHeader, PageType};

/// A page of data (4KB, 4KB-aligned).
///
/// `Page` is not `Clone` outside tests; copying 4KB should be explicit.
///
/// # Example
/// ```
/// use ixstore::storage::page::{Page, PageType};
/// use ixstore::PageId;
///
/// let mut page = Page::new();
/// page.format(PageType::BTreeLeaf, PageId::new(3));
/// assert_eq!(page.page_type(), PageType::BTreeLeaf);
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Zero the page and stamp a fresh header for `page_id`.
    pub fn format(&mut self, page_type: PageType, page_id: PageId) {
        self.reset();
        self.set_header(&PageHeader::new(page_type, page_id));
    }

    /// Read the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data)
    }

    /// Write a page header.
    pub fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data);
    }

    /// Type recorded in the header.
    #[inline]
    pub fn page_type(&self) -> PageType {
        PageType::from_u8(self.data[PageHeader::OFFSET_PAGE_TYPE])
    }

    /// Compute and store checksum in the header.
    ///
    /// Call this after all modifications to the page are complete.
    pub fn update_checksum(&mut self) {
        let checksum = PageHeader::compute_checksum(&self.data);
        self.data[PageHeader::OFFSET_CHECKSUM..PageHeader::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&checksum.to_le_bytes());
    }

    /// Copy of this page ready for write-back, with the checksum stamped
    /// when the page is typed.
    pub fn stamped_copy(&self) -> Page {
        let mut copy = Page::new();
        copy.data.copy_from_slice(&self.data);
        if copy.page_type().is_typed() {
            copy.update_checksum();
        }
        copy
    }

    /// Verify the page checksum is valid.
    pub fn verify_checksum(&self) -> bool {
        self.header().verify_checksum(&self.data)
    }

    /// Check a page just read from disk as `page_id`.
    ///
    /// Untyped pages (never formatted by the index layer) pass unchecked.
    pub fn validate(&self, page_id: PageId) -> Result<()> {
        let header = self.header();
        if !header.page_type.is_typed() {
            return Ok(());
        }
        if header.page_id != page_id {
            return Err(Error::PageIdMismatch {
                requested: page_id.0,
                found: header.page_id.0,
            });
        }
        let computed = PageHeader::compute_checksum(&self.data);
        if header.checksum != computed {
            return Err(Error::ChecksumMismatch {
                page_id: page_id.0,
                stored: header.checksum,
                computed,
            });
        }
        Ok(())
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.data.copy_from_slice(&self.data);
        new_page
    }
}

// ============================================================================
// TESTS
// ============================================================================
