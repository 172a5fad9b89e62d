//! Disk Manager - low-level file I/O for index pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages
//! - Growing the file by one page
//! - Forcing written pages to stable storage

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

/// Manages disk I/O for a single index file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ header  │ node    │ node    │         │ node    │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// # Durability
/// `write_page` and `allocate_page` leave data in the OS cache. Nothing is
/// durable until [`DiskManager::sync`] runs; the buffer pool calls it when
/// pages are forced.
#[derive(Debug)]
pub struct DiskManager {
    file: File,
    path: PathBuf,
    /// Number of pages in the file.
    page_count: u32,
}

impl DiskManager {
    /// Create a new index file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;

        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
            page_count: 0,
        })
    }

    /// Open an existing index file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;

        let file_size = file.metadata()?.len();
        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
            page_count,
        })
    }

    /// Read a page from disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page doesn't exist.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        self.check_bounds(page_id)?;

        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;

        Ok(page)
    }

    /// Write a page to disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page hasn't been allocated.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.check_bounds(page_id)?;

        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        self.file.write_all(page.as_slice())?;

        Ok(())
    }

    /// Grow the file by one zeroed page and return its id.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        if u64::from(self.page_count) + 1 >= u64::from(PageId::INVALID.0) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::OutOfMemory,
                "index file reached its page limit",
            )));
        }

        let page_id = PageId::new(self.page_count);
        self.file
            .set_len(Self::offset(page_id) + PAGE_SIZE as u64)?;
        self.page_count += 1;

        Ok(page_id)
    }

    /// Flush file contents and metadata to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Get the number of pages in the file.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Get the total size of the file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }

    /// Path this manager was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    fn offset(page_id: PageId) -> u64 {
        (page_id.0 as u64) * (PAGE_SIZE as u64)
    }

    fn check_bounds(&self, page_id: PageId) -> Result<()> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("emp.0");

        let dm = DiskManager::create(&path).unwrap();
        assert_eq!(dm.page_count(), 0);
        assert_eq!(dm.file_size(), 0);
        assert_eq!(dm.path(), path.as_path());
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("emp.0");

        DiskManager::create(&path).unwrap();
        assert!(DiskManager::create(&path).is_err());
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        assert!(DiskManager::open(dir.path().join("missing.0")).is_err());
    }

    #[test]
    fn test_allocate_grows_file_with_zeroes() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("emp.0")).unwrap();

        assert_eq!(dm.allocate_page().unwrap(), PageId::new(0));
        assert_eq!(dm.allocate_page().unwrap(), PageId::new(1));
        assert_eq!(dm.file_size(), 2 * PAGE_SIZE as u64);

        let page = dm.read_page(PageId::new(1)).unwrap();
        assert!(page.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_sync_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("emp.0");

        {
            let mut dm = DiskManager::create(&path).unwrap();
            for i in 0..4u8 {
                let pid = dm.allocate_page().unwrap();
                let mut page = Page::new();
                page.as_mut_slice()[100] = i;
                dm.write_page(pid, &page).unwrap();
            }
            dm.sync().unwrap();
        }

        let mut dm = DiskManager::open(&path).unwrap();
        assert_eq!(dm.page_count(), 4);
        for i in 0..4u8 {
            let page = dm.read_page(PageId::new(i as u32)).unwrap();
            assert_eq!(page.as_slice()[100], i);
        }
    }

    #[test]
    fn test_out_of_bounds_access() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("emp.0")).unwrap();
        dm.allocate_page().unwrap();

        assert!(matches!(
            dm.read_page(PageId::new(1)),
            Err(Error::PageNotFound(1))
        ));
        assert!(matches!(
            dm.write_page(PageId::new(5), &Page::new()),
            Err(Error::PageNotFound(5))
        ));
    }
}
