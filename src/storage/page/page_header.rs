//! Page header and type definitions.
//!
//! Every typed page starts with a [`PageHeader`] containing:
//! - [`PageType`] discriminator
//! - CRC32 checksum for integrity
//! - the id of the page it belongs to

use crate::common::PageId;

/// Type of page stored in an index file.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Never written by the index layer (zeroed or foreign bytes).
    #[default]
    Invalid = 0,
    /// Page 0 of an index file.
    IndexHeader = 1,
    /// B+tree internal (non-leaf) node.
    BTreeInternal = 2,
    /// B+tree leaf node.
    BTreeLeaf = 3,
    /// Disposed page on the free chain.
    Free = 4,
}

impl PageType {
    /// Convert from u8, returning Invalid for unknown values.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PageType::IndexHeader,
            2 => PageType::BTreeInternal,
            3 => PageType::BTreeLeaf,
            4 => PageType::Free,
            _ => PageType::Invalid,
        }
    }

    /// Whether pages of this type carry a maintained checksum.
    #[inline]
    pub fn is_typed(self) -> bool {
        self != PageType::Invalid
    }
}

/// Metadata stored at the beginning of every typed page.
///
/// # Layout (9 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     page_type (PageType as u8)
/// 1       4     checksum (CRC32, little-endian)
/// 5       4     page_id (owning page, little-endian)
/// ```
///
/// # Checksum
/// The checksum is computed over the entire page with the checksum field
/// itself set to zero. The buffer pool stamps it on write-back and checks it
/// on load; pages whose type is [`PageType::Invalid`] are left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// Type of this page.
    pub page_type: PageType,
    /// CRC32 checksum of the page contents.
    pub checksum: u32,
    /// The page this header was written for.
    pub page_id: PageId,
}

impl Default for PageHeader {
    fn default() -> Self {
        Self::new(PageType::Invalid, PageId::INVALID)
    }
}

impl PageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 9;

    /// Offset of each field within the header.
    pub const OFFSET_PAGE_TYPE: usize = 0;
    pub const OFFSET_CHECKSUM: usize = 1;
    pub const OFFSET_PAGE_ID: usize = 5;

    /// Create a new header with a zero checksum.
    pub fn new(page_type: PageType, page_id: PageId) -> Self {
        Self {
            page_type,
            checksum: 0,
            page_id,
        }
    }

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&data[Self::OFFSET_CHECKSUM..Self::OFFSET_PAGE_ID]);

        Self {
            page_type: PageType::from_u8(data[Self::OFFSET_PAGE_TYPE]),
            checksum: u32::from_le_bytes(checksum),
            page_id: PageId::read_le(&data[Self::OFFSET_PAGE_ID..]),
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        data[Self::OFFSET_PAGE_TYPE] = self.page_type as u8;
        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&self.checksum.to_le_bytes());
        self.page_id.write_le(&mut data[Self::OFFSET_PAGE_ID..]);
    }

    /// CRC32 of a whole page, with the checksum field read as zeros.
    pub fn compute_checksum(page_data: &[u8]) -> u32 {
        let (head, rest) = page_data.split_at(Self::OFFSET_PAGE_ID);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&head[..Self::OFFSET_CHECKSUM]);
        hasher.update(&[0u8; Self::OFFSET_PAGE_ID - Self::OFFSET_CHECKSUM]);
        hasher.update(rest);
        hasher.finalize()
    }

    pub fn verify_checksum(&self, page_data: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(page_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::PAGE_SIZE;

    #[test]
    fn test_page_type_from_u8() {
        assert_eq!(PageType::from_u8(0), PageType::Invalid);
        assert_eq!(PageType::from_u8(1), PageType::IndexHeader);
        assert_eq!(PageType::from_u8(2), PageType::BTreeInternal);
        assert_eq!(PageType::from_u8(3), PageType::BTreeLeaf);
        assert_eq!(PageType::from_u8(4), PageType::Free);
        assert_eq!(PageType::from_u8(255), PageType::Invalid);
        assert!(!PageType::Invalid.is_typed());
        assert!(PageType::Free.is_typed());
    }

    #[test]
    fn test_page_header_default() {
        let header = PageHeader::default();
        assert_eq!(header.page_type, PageType::Invalid);
        assert_eq!(header.checksum, 0);
        assert_eq!(header.page_id, PageId::INVALID);
    }

    #[test]
    fn test_page_header_byte_layout() {
        let header = PageHeader {
            page_type: PageType::BTreeLeaf,
            checksum: 0x04030201,
            page_id: PageId::new(0x08070605),
        };

        let mut buffer = [0u8; PageHeader::SIZE];
        header.write_to(&mut buffer);

        assert_eq!(buffer, [3, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(PageHeader::from_bytes(&buffer), header);
    }

    #[test]
    fn test_checksum_ignores_checksum_field() {
        let mut page_data = [0u8; PAGE_SIZE];
        page_data[100] = 0xAB;

        let checksum1 = PageHeader::compute_checksum(&page_data);
        page_data[1..5].copy_from_slice(&[0xFF; 4]);
        let checksum2 = PageHeader::compute_checksum(&page_data);

        assert_eq!(checksum1, checksum2);
    }

    #[test]
    fn test_checksum_verify() {
        let mut page_data = [0u8; PAGE_SIZE];
        page_data[100] = 0xAB;

        let header = PageHeader {
            page_type: PageType::BTreeInternal,
            checksum: PageHeader::compute_checksum(&page_data),
            page_id: PageId::new(1),
        };
        assert!(header.verify_checksum(&page_data));

        page_data[100] = 0xFF;
        assert!(!header.verify_checksum(&page_data));
    }
}
