pub mod header;
pub mod page_store;

pub use header::{FileHeader, DEFAULT_PAGE_SIZE, FILE_HEADER_SIZE, MIN_PAGE_SIZE};
pub use page_store::PageStore;
