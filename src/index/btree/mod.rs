//! Page-resident B+tree with duplicate keys.
//!
//! Every internal entry stores the largest key of the subtree it points to
//! (not a separator). Nodes on one level are doubly linked through sibling
//! page numbers. Deletion is lazy: a node is removed only once it is empty.
//!
//! # Components
//! - [`BTreeNode`] / [`NodeLayout`] - byte-level view of one node page
//! - [`IndexHandle`] - search, insert, delete and persistence of one index
//! - [`IndexScan`] - predicate cursor over the leaf level

mod delete;
mod handle;
mod insert;
mod node;
mod scan;
mod verify;

pub use handle::{DeleteOutcome, IndexHandle, InsertOutcome};
pub use node::{BTreeNode, NodeLayout, NODE_OVERHEAD};
pub use scan::{IndexEntry, IndexScan};
pub use verify::TreeStats;
