//! Secondary indexes.
//!
//! - [`IndexManager`] - create, open, close and destroy index files
//! - [`btree`] - the B+tree itself and its scans
//! - [`AttrType`] / [`CompOp`] - key types and scan operators

pub mod btree;
mod header;
mod manager;
mod types;

pub use btree::{
    DeleteOutcome, IndexEntry, IndexHandle, IndexScan, InsertOutcome, NodeLayout, TreeStats,
};
pub use header::IndexHeader;
pub use manager::IndexManager;
pub use types::{AttrType, CompOp};
