//! Error types for ixstore.
//!
//! Only failures live here. Outcomes that are expected in normal operation
//! (duplicate insert, missing entry, end of scan) are ordinary return values
//! on the index API and never reach this enum.

use thiserror::Error;

use crate::index::AttrType;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in ixstore.
///
/// Storage errors come up from the disk manager and buffer pool and are
/// propagated unchanged through the index layers.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// Stored CRC32 does not match the page contents.
    #[error("Checksum mismatch on page {page_id}: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        page_id: u32,
        stored: u32,
        computed: u32,
    },

    /// A page read from disk claims to be a different page.
    #[error("Page {requested} carries header for page {found}")]
    PageIdMismatch { requested: u32, found: u32 },

    /// Node capacity computed from the page and key sizes is too small.
    #[error("Invalid order {order} (page size {page_size}, key length {attr_len})")]
    InvalidOrder {
        order: usize,
        page_size: usize,
        attr_len: usize,
    },

    /// Attribute type and length do not form a valid key definition.
    #[error("Invalid attribute: {attr_type:?} with length {attr_len}")]
    InvalidAttribute { attr_type: AttrType, attr_len: usize },

    /// Logical page size is outside what the physical page can hold.
    #[error("Invalid page size {0}")]
    InvalidPageSize(usize),

    /// Key handed to the index has the wrong length for its attribute.
    #[error("Key length {actual} does not match attribute length {expected}")]
    KeyLength { expected: usize, actual: usize },

    /// On-disk or in-memory tree state violates a structural invariant.
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// The index file is already open through this manager.
    #[error("Index {0} is already open")]
    IndexAlreadyOpen(String),

    /// Configuration value the index cannot run with.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation on a scan that has been closed.
    #[error("Scan is not open")]
    ScanClosed,
}

impl Error {
    /// Shorthand for building a [`Error::CorruptIndex`].
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::CorruptIndex(msg.into())
    }
}
