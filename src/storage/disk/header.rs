//! Database file header.

use serde::{Deserialize, Serialize};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PAGE_HEADER_SIZE;

/// Size of the encoded file header: crc u32 + page size u16.
pub const FILE_HEADER_SIZE: usize = 6;

/// Smallest page size that can hold an empty page.
pub const MIN_PAGE_SIZE: usize = PAGE_HEADER_SIZE;

pub const DEFAULT_PAGE_SIZE: u16 = 4096;

/// Header stored at offset 0 of every database file.
///
/// `crc` is reserved and always written as 0. Integrity is checked per page
/// instead, see [`crate::storage::page::checksum`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub crc: u32,
    pub page_size: u16,
}

impl FileHeader {
    pub fn new(page_size: u16) -> StorageResult<Self> {
        if (page_size as usize) < MIN_PAGE_SIZE {
            return Err(StorageError::InvalidPageSize {
                page_size,
                min: MIN_PAGE_SIZE,
            });
        }
        Ok(Self { crc: 0, page_size })
    }

    pub fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        // bincode's default encoding is fixed-width little-endian
        let bytes = bincode::serialize(self)?;
        debug_assert_eq!(bytes.len(), FILE_HEADER_SIZE);
        Ok(bytes)
    }

    pub fn from_bytes(buf: &[u8]) -> StorageResult<Self> {
        if buf.len() < FILE_HEADER_SIZE {
            return Err(StorageError::corrupted(format!(
                "file header needs {FILE_HEADER_SIZE} bytes, found {}",
                buf.len()
            )));
        }

        let header: FileHeader = bincode::deserialize(&buf[..FILE_HEADER_SIZE])?;
        if (header.page_size as usize) < MIN_PAGE_SIZE {
            return Err(StorageError::corrupted(format!(
                "page size {} in file header is below the minimum {MIN_PAGE_SIZE}",
                header.page_size
            )));
        }
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_layout() -> Result<()> {
        let header = FileHeader::new(1024)?;
        let bytes = header.to_bytes()?;

        assert_eq!(bytes, vec![0, 0, 0, 0, 0x00, 0x04]);
        assert_eq!(FileHeader::from_bytes(&bytes)?, header);
        Ok(())
    }

    #[test]
    fn test_reads_little_endian_fields() -> Result<()> {
        let header = FileHeader::from_bytes(&[0x78, 0x56, 0x34, 0x12, 0x00, 0x10])?;
        assert_eq!(header.crc, 0x1234_5678);
        assert_eq!(header.page_size, 4096);
        Ok(())
    }

    #[test]
    fn test_rejects_small_page_size() {
        let result = FileHeader::new(3);
        assert!(matches!(
            result,
            Err(StorageError::InvalidPageSize { page_size: 3, .. })
        ));

        let result = FileHeader::from_bytes(&[0, 0, 0, 0, 0, 0]);
        assert!(matches!(result, Err(StorageError::Corrupted { .. })));
    }

    #[test]
    fn test_short_header() {
        let result = FileHeader::from_bytes(&[0, 0, 0]);
        assert!(matches!(result, Err(StorageError::Corrupted { .. })));
    }
}
