//! Configuration for ixstore.
//!
//! Compile-time constants describe the physical page and the fixed parts of
//! the node layout. [`IndexConfig`] holds the runtime knobs of an
//! [`IndexManager`](crate::index::IndexManager).
//!
//! # Environment Variables
//!
//! - `IXSTORE_DATA_DIR`: directory holding index files (default: `./data`)
//! - `IXSTORE_POOL_SIZE`: buffer-pool frames per open index (default: 64)
//! - `IXSTORE_PAGE_SIZE`: default logical page size (default: `PAGE_SIZE`)

use std::path::{Path, PathBuf};

use crate::common::{Error, Result};

/// Size of a physical page in bytes (4KB).
///
/// Index files may use a smaller logical page size (see
/// [`IndexConfig::page_size`]); nodes then only occupy the first bytes of
/// each physical page.
pub const PAGE_SIZE: usize = 4096;

/// Serialized size of a [`Rid`](crate::common::Rid): page (u32) + slot (i32).
pub const RID_SIZE: usize = 8;

/// Longest fixed-length string key.
pub const MAX_STRING_LEN: usize = 255;

/// Smallest node capacity the split/merge logic supports.
pub const MIN_ORDER: usize = 2;

/// Fewest frames an index pool can have. A split pins two nodes at once.
pub const MIN_POOL_SIZE: usize = 2;

/// Buffer-pool frames given to each open index by default.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Runtime configuration for an index manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Directory where index files live.
    /// Index `n` of relation `r` is stored at `{data_dir}/{r}.{n}`.
    pub data_dir: PathBuf,
    /// Frames in the buffer pool of each opened index.
    pub pool_size: usize,
    /// Logical page size used when `create_index` is given none.
    pub page_size: usize,
}

impl IndexConfig {
    /// Default data directory.
    pub const DEFAULT_DATA_DIR: &'static str = "./data";

    /// Configuration rooted at `data_dir` with default sizes.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Set the number of buffer-pool frames per index.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Set the default logical page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Unset variables fall back to defaults. A variable that is set but
    /// does not parse is an error.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("IXSTORE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(pool_size) = parse_env_usize("IXSTORE_POOL_SIZE")? {
            config.pool_size = pool_size;
        }
        if let Some(page_size) = parse_env_usize("IXSTORE_PAGE_SIZE")? {
            config.page_size = page_size;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the sizes for values the storage layer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size < MIN_POOL_SIZE {
            return Err(Error::InvalidConfig(format!(
                "pool_size must be at least {MIN_POOL_SIZE}, got {}",
                self.pool_size
            )));
        }
        if self.page_size == 0 || self.page_size > PAGE_SIZE {
            return Err(Error::InvalidPageSize(self.page_size));
        }
        Ok(())
    }

    /// Path of the file holding index `index_no` of `relation`.
    pub fn index_path(&self, relation: &str, index_no: u32) -> PathBuf {
        self.data_dir.join(format!("{relation}.{index_no}"))
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(Self::DEFAULT_DATA_DIR),
            pool_size: DEFAULT_POOL_SIZE,
            page_size: PAGE_SIZE,
        }
    }
}

fn parse_env_usize(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| Error::InvalidConfig(format!("invalid value for {name}: {e}"))),
        Err(_) => Ok(None),
    }
}
