//! IndexHeader - the metadata page (page 0) of an index file.

use crate::common::config::{PAGE_SIZE, RID_SIZE};
use crate::common::{Error, PageId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

use super::AttrType;

/// Persistent description of one index file.
///
/// # Layout (after the [`PageHeader`])
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 9       4     magic ("IXB+")
/// 13      4     num_pages
/// 17      4     page_size (logical)
/// 21      4     root_page
/// 25      4     pair_size (attr_len + RID size)
/// 29      4     order
/// 33      4     height
/// 37      1     attr_type
/// 38      4     attr_len
/// 42      4     free_head (first disposed page, or INVALID)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    pub num_pages: u32,
    pub page_size: u32,
    pub root_page: PageId,
    pub pair_size: u32,
    pub order: u32,
    pub height: u32,
    pub attr_type: AttrType,
    pub attr_len: u32,
    pub free_head: PageId,
}

const MAGIC: u32 = u32::from_le_bytes(*b"IXB+");

const OFFSET_MAGIC: usize = PageHeader::SIZE;
const OFFSET_NUM_PAGES: usize = OFFSET_MAGIC + 4;
const OFFSET_PAGE_SIZE: usize = OFFSET_NUM_PAGES + 4;
const OFFSET_ROOT: usize = OFFSET_PAGE_SIZE + 4;
const OFFSET_PAIR_SIZE: usize = OFFSET_ROOT + 4;
const OFFSET_ORDER: usize = OFFSET_PAIR_SIZE + 4;
const OFFSET_HEIGHT: usize = OFFSET_ORDER + 4;
const OFFSET_ATTR_TYPE: usize = OFFSET_HEIGHT + 4;
const OFFSET_ATTR_LEN: usize = OFFSET_ATTR_TYPE + 1;
const OFFSET_FREE_HEAD: usize = OFFSET_ATTR_LEN + 4;

impl IndexHeader {
    /// Header of a freshly created index whose root leaf is `root_page`.
    pub fn new(
        attr_type: AttrType,
        attr_len: usize,
        page_size: usize,
        order: usize,
        root_page: PageId,
    ) -> Self {
        Self {
            num_pages: 0,
            page_size: page_size as u32,
            root_page,
            pair_size: (attr_len + RID_SIZE) as u32,
            order: order as u32,
            height: 1,
            attr_type,
            attr_len: attr_len as u32,
            free_head: PageId::INVALID,
        }
    }

    /// Decode the header stored in `page`.
    pub fn read_from(page: &Page) -> Result<Self> {
        if page.page_type() != PageType::IndexHeader {
            return Err(Error::corrupt(format!(
                "page 0 has type {:?}, expected index header",
                page.page_type()
            )));
        }
        let data = page.as_slice();
        if read_u32(data, OFFSET_MAGIC) != MAGIC {
            return Err(Error::corrupt("bad index header magic"));
        }

        let attr_type = AttrType::from_u8(data[OFFSET_ATTR_TYPE]).ok_or_else(|| {
            Error::corrupt(format!("unknown attribute tag {}", data[OFFSET_ATTR_TYPE]))
        })?;

        let header = Self {
            num_pages: read_u32(data, OFFSET_NUM_PAGES),
            page_size: read_u32(data, OFFSET_PAGE_SIZE),
            root_page: PageId::read_le(&data[OFFSET_ROOT..]),
            pair_size: read_u32(data, OFFSET_PAIR_SIZE),
            order: read_u32(data, OFFSET_ORDER),
            height: read_u32(data, OFFSET_HEIGHT),
            attr_type,
            attr_len: read_u32(data, OFFSET_ATTR_LEN),
            free_head: PageId::read_le(&data[OFFSET_FREE_HEAD..]),
        };
        header.check()?;
        Ok(header)
    }

    /// Format `page` as the header page and encode this header into it.
    pub fn write_to(&self, page: &mut Page) {
        page.format(PageType::IndexHeader, PageId::HEADER);
        let data = page.as_mut_slice();
        write_u32(data, OFFSET_MAGIC, MAGIC);
        write_u32(data, OFFSET_NUM_PAGES, self.num_pages);
        write_u32(data, OFFSET_PAGE_SIZE, self.page_size);
        self.root_page.write_le(&mut data[OFFSET_ROOT..]);
        write_u32(data, OFFSET_PAIR_SIZE, self.pair_size);
        write_u32(data, OFFSET_ORDER, self.order);
        write_u32(data, OFFSET_HEIGHT, self.height);
        data[OFFSET_ATTR_TYPE] = self.attr_type as u8;
        write_u32(data, OFFSET_ATTR_LEN, self.attr_len);
        self.free_head.write_le(&mut data[OFFSET_FREE_HEAD..]);
    }

    fn check(&self) -> Result<()> {
        self.attr_type.validate(self.attr_len as usize)?;
        if self.page_size as usize > PAGE_SIZE || self.height == 0 || !self.root_page.is_valid() {
            return Err(Error::corrupt(format!(
                "implausible header: page_size {}, height {}, root {}",
                self.page_size, self.height, self.root_page
            )));
        }
        if self.pair_size != self.attr_len + RID_SIZE as u32 {
            return Err(Error::corrupt("pair size does not match attribute length"));
        }
        Ok(())
    }
}

#[inline]
fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[inline]
fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
