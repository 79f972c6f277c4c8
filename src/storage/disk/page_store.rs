use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::storage::disk::header::{FileHeader, FILE_HEADER_SIZE};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{checksum, HeapPage, PageId, Row};

/// A database file made of fixed-size page slots.
///
/// The store owns every page it has loaded or allocated. Callers address
/// pages by their volatile [`PageId`] and append rows through
/// [`PageStore::write_row`]; nothing reaches disk until [`PageStore::write_page`]
/// or [`PageStore::close`].
pub struct PageStore {
    file: File,
    path: PathBuf,
    header: FileHeader,
    pages: Vec<HeapPage>,
    /// Volatile id to slot ordinal. Pages are never handed out mutably, so
    /// `pages[no].id()` always maps back to `no`.
    offsets: HashMap<PageId, u32>,
    end_offset: u64,
    closed: bool,
}

impl PageStore {
    /// Creates (or truncates) a database file holding only the header.
    pub fn create(path: &Path, page_size: u16) -> StorageResult<Self> {
        let header = FileHeader::new(page_size)?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        file.write_all(&header.to_bytes()?)?;
        file.sync_all()?;

        info!("Created {:?} with page size {}", path, page_size);

        Ok(Self {
            file,
            path: path.to_path_buf(),
            header,
            pages: Vec::new(),
            offsets: HashMap::new(),
            end_offset: FILE_HEADER_SIZE as u64,
            closed: false,
        })
    }

    /// Opens an existing database file and loads every page slot.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let file_size = file.metadata()?.len();
        if file_size < FILE_HEADER_SIZE as u64 {
            return Err(StorageError::corrupted(format!(
                "file is {file_size} bytes, shorter than the {FILE_HEADER_SIZE}-byte header"
            )));
        }

        let mut header_buf = [0u8; FILE_HEADER_SIZE];
        file.read_exact(&mut header_buf)?;
        let header = FileHeader::from_bytes(&header_buf)?;

        let page_size = header.page_size as u64;
        let page_area = file_size - FILE_HEADER_SIZE as u64;
        if page_area % page_size != 0 {
            return Err(StorageError::corrupted(format!(
                "page area of {page_area} bytes is not a multiple of the page size {page_size} \
                 ({} trailing bytes)",
                page_area % page_size
            )));
        }

        let mut store = Self {
            file,
            path: path.to_path_buf(),
            header,
            pages: Vec::new(),
            offsets: HashMap::new(),
            end_offset: file_size,
            closed: false,
        };

        let mut buf = vec![0u8; header.page_size as usize];
        let mut offset = FILE_HEADER_SIZE as u64;
        while offset < file_size {
            store.file.seek(SeekFrom::Start(offset))?;
            store.file.read_exact(&mut buf)?;

            let page = HeapPage::from_bytes(&buf)?;
            store.register(page);
            offset += page_size;
        }

        info!(
            "Opened {:?}: page size {}, {} pages",
            path,
            header.page_size,
            store.pages.len()
        );

        Ok(store)
    }

    /// Reserves a zero-filled slot at the end of the file and returns the id
    /// of the new, empty page.
    pub fn allocate_page(&mut self) -> StorageResult<PageId> {
        let offset = self.end_offset;
        let zeros = vec![0u8; self.header.page_size as usize];

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&zeros)?;
        self.end_offset += zeros.len() as u64;

        let id = self.register(HeapPage::new());
        debug!("Allocated page {} at offset {}", id, offset);

        Ok(id)
    }

    /// Appends a row to a loaded page in memory.
    pub fn write_row(&mut self, id: PageId, row: Row) -> StorageResult<()> {
        let page_no = self.lookup(id)?;
        self.pages[page_no as usize].write(row);
        Ok(())
    }

    /// Writes the whole page over its slot and syncs the file.
    pub fn write_page(&mut self, id: PageId) -> StorageResult<()> {
        let page_no = self.lookup(id)?;
        self.flush(page_no)
    }

    /// Flushes every modified page, syncs, and releases the file.
    ///
    /// The first failed flush aborts the rest and is returned. The file
    /// handle is released in either case since the store is consumed.
    pub fn close(mut self) -> StorageResult<()> {
        let dirty: Vec<u32> = (0..self.pages.len() as u32)
            .filter(|&page_no| self.pages[page_no as usize].is_dirty())
            .collect();

        for &page_no in &dirty {
            self.flush(page_no)?;
        }
        self.file.sync_all()?;
        self.closed = true;

        info!("Closed {:?}: flushed {} of {} pages", self.path, dirty.len(), self.pages.len());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> FileHeader {
        self.header
    }

    pub fn page_size(&self) -> u16 {
        self.header.page_size
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Loaded pages in file order.
    pub fn pages(&self) -> &[HeapPage] {
        &self.pages
    }

    pub fn page_ids(&self) -> impl Iterator<Item = PageId> + '_ {
        self.pages.iter().map(HeapPage::id)
    }

    pub fn page(&self, id: PageId) -> Option<&HeapPage> {
        let page_no = self.offsets.get(&id)?;
        self.pages.get(*page_no as usize)
    }

    /// Ordinal of the page's slot in the file. Unlike the [`PageId`] this is
    /// stable across sessions.
    pub fn page_no(&self, id: PageId) -> Option<u32> {
        self.offsets.get(&id).copied()
    }

    pub fn page_by_no(&self, page_no: u32) -> Option<&HeapPage> {
        self.pages.get(page_no as usize)
    }

    /// Byte offset of the page's slot in the file.
    pub fn offset_of(&self, id: PageId) -> Option<u64> {
        self.page_no(id).map(|page_no| self.slot_offset(page_no))
    }

    pub fn file_size(&self) -> StorageResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn register(&mut self, mut page: HeapPage) -> PageId {
        while self.offsets.contains_key(&page.id()) {
            page.reassign_id();
        }

        let id = page.id();
        self.offsets.insert(id, self.pages.len() as u32);
        self.pages.push(page);
        id
    }

    fn lookup(&self, id: PageId) -> StorageResult<u32> {
        self.offsets
            .get(&id)
            .copied()
            .ok_or(StorageError::PageNotFound(id))
    }

    fn slot_offset(&self, page_no: u32) -> u64 {
        FILE_HEADER_SIZE as u64 + page_no as u64 * self.header.page_size as u64
    }

    fn flush(&mut self, page_no: u32) -> StorageResult<()> {
        let offset = self.slot_offset(page_no);
        let page = &self.pages[page_no as usize];

        let required = page.encoded_len();
        let available = self.header.page_size as usize;
        if required > available {
            return Err(StorageError::PageOverflow {
                required,
                available,
            });
        }

        let bytes = page.to_bytes()?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&bytes)?;
        self.file.sync_all()?;

        debug!(
            "Wrote page {} ({} bytes, {} rows) at offset {}",
            page.id(),
            bytes.len(),
            page.row_count(),
            offset
        );

        self.pages[page_no as usize].mark_flushed(checksum::stored(&bytes));
        Ok(())
    }
}

impl Drop for PageStore {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let unflushed = self.pages.iter().filter(|page| page.is_dirty()).count();
        if unflushed > 0 {
            warn!(
                "Dropping {:?} without close: {} modified pages were not written",
                self.path, unflushed
            );
        }
    }
}
