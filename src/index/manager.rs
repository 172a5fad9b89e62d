//! IndexManager - lifecycle of index files.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use crate::buffer::BufferPoolManager;
use crate::common::config::{IndexConfig, PAGE_SIZE, RID_SIZE};
use crate::common::{Error, Result};
use crate::storage::DiskManager;

use super::btree::{IndexHandle, NodeLayout};
use super::AttrType;

/// Creates, opens, closes and destroys the index files under one data
/// directory.
///
/// Index `n` of relation `r` lives in `{data_dir}/{r}.{n}` and gets its own
/// buffer pool of [`IndexConfig::pool_size`] frames while open.
///
/// # Example
/// ```no_run
/// use ixstore::index::{AttrType, IndexManager};
/// use ixstore::IndexConfig;
///
/// let mut manager = IndexManager::new(IndexConfig::from_env().unwrap());
/// manager.create_index("orders", 1, AttrType::String, 16, 4096).unwrap();
/// let handle = manager.open_index("orders", 1).unwrap();
/// manager.close_index(handle).unwrap();
/// manager.destroy_index("orders", 1).unwrap();
/// ```
pub struct IndexManager {
    config: IndexConfig,
    /// Buffer pools of the files opened through this manager. A file is
    /// open while its pool is still alive.
    open: HashMap<PathBuf, Weak<BufferPoolManager>>,
}

impl IndexManager {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            open: HashMap::new(),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Create an empty index over an attribute of `attr_type`/`attr_len`.
    ///
    /// Nodes use the first `page_size` bytes of each page.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` for a pool too small to split nodes
    /// - `Error::InvalidPageSize` if `page_size` exceeds [`PAGE_SIZE`]
    /// - `Error::InvalidAttribute` for an illegal type/length pair, or a key
    ///   that leaves no room for a rid in the page
    /// - `Error::InvalidOrder` if fewer than two entries fit in a node
    /// - I/O errors, including an already existing file
    pub fn create_index(
        &self,
        relation: &str,
        index_no: u32,
        attr_type: AttrType,
        attr_len: usize,
        page_size: usize,
    ) -> Result<()> {
        self.config.validate()?;
        if page_size > PAGE_SIZE {
            return Err(Error::InvalidPageSize(page_size));
        }
        if attr_len + RID_SIZE >= page_size {
            return Err(Error::InvalidAttribute {
                attr_type,
                attr_len,
            });
        }
        let layout = NodeLayout::new(attr_type, attr_len, page_size)?;

        fs::create_dir_all(&self.config.data_dir)?;
        let path = self.config.index_path(relation, index_no);
        let dm = DiskManager::create(&path)?;
        let bpm = BufferPoolManager::new(self.config.pool_size, dm);

        if let Err(e) = IndexHandle::format(&bpm, layout, page_size) {
            drop(bpm);
            let _ = fs::remove_file(&path);
            return Err(e);
        }

        tracing::info!(
            file = %path.display(),
            %attr_type,
            attr_len,
            page_size,
            order = layout.order,
            "created index"
        );
        Ok(())
    }

    /// [`IndexManager::create_index`] with the configured default page size.
    pub fn create_index_default(
        &self,
        relation: &str,
        index_no: u32,
        attr_type: AttrType,
        attr_len: usize,
    ) -> Result<()> {
        self.create_index(relation, index_no, attr_type, attr_len, self.config.page_size)
    }

    /// Open an existing index.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` for a pool too small to split nodes
    /// - `Error::IndexAlreadyOpen` if a handle for this file is still alive
    /// - I/O errors if the file is missing
    /// - `Error::CorruptIndex` / checksum errors for a damaged header
    pub fn open_index(&mut self, relation: &str, index_no: u32) -> Result<IndexHandle> {
        self.config.validate()?;
        let path = self.config.index_path(relation, index_no);
        if self.is_open_path(&path) {
            return Err(Error::IndexAlreadyOpen(path.display().to_string()));
        }

        let dm = DiskManager::open(&path)?;
        let bpm = Arc::new(BufferPoolManager::new(self.config.pool_size, dm));
        let handle = IndexHandle::open(Arc::clone(&bpm), path.clone())?;
        self.open.insert(path, Arc::downgrade(&bpm));

        tracing::info!(
            file = %handle.file().display(),
            height = handle.height(),
            order = handle.order(),
            "opened index"
        );
        Ok(handle)
    }

    /// Persist the header and every dirty page, then release the handle.
    pub fn close_index(&mut self, handle: IndexHandle) -> Result<()> {
        let path = handle.file().to_path_buf();
        let result = handle.close();
        self.open.remove(&path);

        tracing::info!(file = %path.display(), ok = result.is_ok(), "closed index");
        result
    }

    /// Delete the file of a closed index.
    ///
    /// # Errors
    /// - `Error::IndexAlreadyOpen` while a handle for it is alive
    /// - I/O errors if the file does not exist
    pub fn destroy_index(&mut self, relation: &str, index_no: u32) -> Result<()> {
        let path = self.config.index_path(relation, index_no);
        if self.is_open_path(&path) {
            return Err(Error::IndexAlreadyOpen(path.display().to_string()));
        }
        self.open.remove(&path);
        fs::remove_file(&path)?;

        tracing::info!(file = %path.display(), "destroyed index");
        Ok(())
    }

    /// Whether a handle for this index is currently alive.
    pub fn is_open(&self, relation: &str, index_no: u32) -> bool {
        self.is_open_path(&self.config.index_path(relation, index_no))
    }

    fn is_open_path(&self, path: &Path) -> bool {
        self.open
            .get(path)
            .is_some_and(|pool| pool.strong_count() > 0)
    }
}
