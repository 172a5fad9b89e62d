//! Eviction policy implementations (replacers).
//!
//! - [`LruReplacer`] - evicts the least recently accessed unpinned frame.
//!   B+tree descents touch the root and upper levels on every call, so
//!   recency keeps them resident while cold leaves cycle out.

mod lru;

pub use lru::LruReplacer;
