//! ixstore - a page-resident B+tree secondary index.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            ixstore                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Index Layer (index/)                      │   │
//! │  │   IndexManager → IndexHandle → BTreeNode                 │   │
//! │  │                  IndexScan (predicate cursor)            │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Buffer Pool (buffer/)                     │   │
//! │  │   BufferPoolManager + Frame + LruReplacer + Statistics   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Storage Layer (storage/)                  │   │
//! │  │          DiskManager + Page + PageHeader                 │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, Rid, Error, config)
//! - [`buffer`] - Buffer pool management and eviction
//! - [`storage`] - Disk I/O and page formats
//! - [`index`] - The B+tree index, its scans and the index manager
//!
//! # Quick Start
//! ```no_run
//! use ixstore::index::{AttrType, CompOp, IndexManager, IndexScan};
//! use ixstore::{IndexConfig, Rid};
//!
//! let mut manager = IndexManager::new(IndexConfig::new("./data"));
//! manager.create_index("emp", 0, AttrType::Int, 4, 4096).unwrap();
//!
//! let mut handle = manager.open_index("emp", 0).unwrap();
//! handle.insert_entry(&42i32.to_le_bytes(), Rid::new(1, 0)).unwrap();
//!
//! let mut scan = IndexScan::open(&handle, CompOp::Ge, Some(&10i32.to_le_bytes()), false).unwrap();
//! while let Some(entry) = scan.get_next_entry().unwrap() {
//!     println!("{}", entry.rid);
//! }
//! scan.close();
//!
//! manager.close_index(handle).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{IndexConfig, PAGE_SIZE};
pub use common::{Error, PageId, Result, Rid};

pub use buffer::{BufferPoolManager, BufferPoolStats, StatsSnapshot};
pub use index::{AttrType, CompOp, IndexHandle, IndexManager, IndexScan};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::DiskManager;
