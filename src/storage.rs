//! Storage layer implementation for cheburekdb.
//!
//! A database is a single file: a 6-byte header followed by fixed-size page
//! slots packed back to back. Key components:
//!
//! - **PageStore**: owns the file, allocates slots and writes pages over them
//! - **HeapPage**: slotted page holding a row directory and the rows
//! - **Row**: a row version with its visibility markers and payload
//!
//! Pages are rewritten whole and synced on every write. There is no
//! write-ahead log, so a torn write can leave a slot unreadable; the page
//! checksum detects it on the next open.

pub mod disk;
pub mod error;
pub mod page;

pub use disk::{FileHeader, PageStore, DEFAULT_PAGE_SIZE, FILE_HEADER_SIZE};
pub use error::{StorageError, StorageResult};
pub use page::{HeapPage, PageId, Row, RowPointer, ROW_FIXED_SIZE};
