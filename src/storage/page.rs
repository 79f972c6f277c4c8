pub mod checksum;
pub mod heap_page;
pub mod row;

use std::fmt;

/// Volatile in-memory identity of a loaded page.
///
/// Assigned at random whenever a page is created or loaded and never
/// persisted, so the same slot gets a different id in every session. Use
/// [`crate::storage::PageStore::page_no`] for an address that survives a
/// reopen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId(pub u32);

impl PageId {
    pub fn random() -> Self {
        PageId(rand::random())
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

pub use heap_page::{HeapPage, PageHeader, RowPointer, PAGE_HEADER_SIZE, ROW_POINTER_SIZE};
pub use row::{Row, ROW_FIXED_SIZE};
