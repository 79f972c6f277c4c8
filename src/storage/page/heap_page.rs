use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::checksum::{self, CHECKSUM_SIZE};
use crate::storage::page::row::{Row, ROW_FIXED_SIZE};
use crate::storage::page::PageId;

// Header structure (6 bytes): crc u32, row count u16
pub const PAGE_HEADER_SIZE: usize = CHECKSUM_SIZE + 2;

// Row pointer size (5 bytes: 2 for offset, 2 for size, 1 for mask)
pub const ROW_POINTER_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageHeader {
    /// CRC32 of the page as last encoded or loaded, 0 if never stamped.
    pub crc: u32,
}

/// Directory entry locating one row inside the page's row stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPointer {
    pub offset: usize,
    pub size: usize,
    pub mask: u8,
}

impl RowPointer {
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// A slotted page: a row directory plus the rows it points at.
///
/// Rows are append-only. The encoded form is
///
/// ```text
/// crc u32 | row_count u16 | row_count * (offset u16, size u16, mask u8) | rows
/// ```
///
/// where pointer offsets are relative to the start of the row stream.
#[derive(Debug, Clone)]
pub struct HeapPage {
    header: PageHeader,
    pointers: Vec<RowPointer>,
    rows: Vec<Row>,
    id: PageId,
    write_cursor: usize,
    dirty: bool,
}

impl HeapPage {
    pub fn new() -> Self {
        Self {
            header: PageHeader::default(),
            pointers: Vec::new(),
            rows: Vec::new(),
            id: PageId::random(),
            write_cursor: 0,
            dirty: false,
        }
    }

    /// Decodes a page from the start of `buf`. Bytes past the encoded page
    /// (the unused tail of a slot) are ignored.
    pub fn from_bytes(buf: &[u8]) -> StorageResult<Self> {
        if buf.len() < PAGE_HEADER_SIZE {
            return Err(StorageError::decode(format!(
                "buffer of {} bytes is shorter than the page header",
                buf.len()
            )));
        }

        let mut cursor = &buf[CHECKSUM_SIZE..];
        let row_count = cursor.get_u16_le() as usize;

        let directory_end = PAGE_HEADER_SIZE + row_count * ROW_POINTER_SIZE;
        if directory_end > buf.len() {
            return Err(StorageError::decode(format!(
                "directory of {row_count} rows runs past the end of the buffer"
            )));
        }

        let mut pointers = Vec::with_capacity(row_count);
        let mut expected_offset = 0usize;
        for i in 0..row_count {
            let pointer = RowPointer {
                offset: cursor.get_u16_le() as usize,
                size: cursor.get_u16_le() as usize,
                mask: cursor.get_u8(),
            };
            if pointer.offset != expected_offset {
                return Err(StorageError::decode(format!(
                    "row pointer {i} starts at {} but previous row ends at {expected_offset}",
                    pointer.offset
                )));
            }
            if pointer.size < ROW_FIXED_SIZE {
                return Err(StorageError::decode(format!(
                    "row pointer {i} has size {} below the fixed row size",
                    pointer.size
                )));
            }
            expected_offset = pointer.end();
            pointers.push(pointer);
        }

        let encoded_len = directory_end + expected_offset;
        if encoded_len > buf.len() {
            return Err(StorageError::decode(format!(
                "row stream ends at byte {encoded_len} past the end of the buffer ({})",
                buf.len()
            )));
        }

        let encoded = &buf[..encoded_len];
        checksum::verify(encoded)?;

        let stream = &encoded[directory_end..];
        let rows = pointers
            .iter()
            .map(|p| Row::decode(&stream[p.offset..p.end()]))
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(Self {
            header: PageHeader {
                crc: checksum::stored(encoded),
            },
            pointers,
            rows,
            id: PageId::random(),
            write_cursor: expected_offset,
            dirty: false,
        })
    }

    /// Appends a row. No size check happens here; a page that no longer
    /// fits its slot is rejected when it is written.
    pub fn write(&mut self, row: Row) {
        let size = row.encoded_len();
        self.pointers.push(RowPointer {
            offset: self.write_cursor,
            size,
            mask: 0,
        });
        self.rows.push(row);
        self.write_cursor += size;
        self.dirty = true;
    }

    /// Encodes the page and stamps its checksum.
    pub fn to_bytes(&self) -> StorageResult<Bytes> {
        let required = self.encoded_len();
        let too_large = || StorageError::PageOverflow {
            required,
            available: u16::MAX as usize,
        };

        let row_count = u16::try_from(self.rows.len()).map_err(|_| too_large())?;

        let mut buf = BytesMut::with_capacity(required);
        buf.put_u32_le(0);
        buf.put_u16_le(row_count);
        for pointer in &self.pointers {
            let offset = u16::try_from(pointer.offset).map_err(|_| too_large())?;
            let size = u16::try_from(pointer.size).map_err(|_| too_large())?;
            buf.put_u16_le(offset);
            buf.put_u16_le(size);
            buf.put_u8(pointer.mask);
        }
        for row in &self.rows {
            row.encode_into(&mut buf);
        }

        checksum::stamp(&mut buf);
        Ok(buf.freeze())
    }

    /// Length of `to_bytes()` without encoding the page.
    pub fn encoded_len(&self) -> usize {
        PAGE_HEADER_SIZE + self.pointers.len() * ROW_POINTER_SIZE + self.write_cursor
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn header(&self) -> PageHeader {
        self.header
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, slot: usize) -> Option<&Row> {
        self.rows.get(slot)
    }

    pub fn row_pointers(&self) -> &[RowPointer] {
        &self.pointers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    /// Whether rows were appended since the page was created, loaded or
    /// last flushed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_flushed(&mut self, crc: u32) {
        self.header.crc = crc;
        self.dirty = false;
    }

    pub(crate) fn reassign_id(&mut self) {
        self.id = PageId::random();
    }
}

impl Default for HeapPage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn row(xmin: u64, data: &str) -> Row {
        Row {
            xmin,
            xmax: xmin + 100,
            mask: 0,
            ctid: xmin * 10,
            data: data.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_heap_page_initialization() {
        let page = HeapPage::new();

        assert_eq!(page.row_count(), 0);
        assert_eq!(page.write_cursor(), 0);
        assert_eq!(page.encoded_len(), PAGE_HEADER_SIZE);
        assert!(!page.is_dirty());
    }

    #[test]
    fn test_write_appends_pointers_in_order() {
        let mut page = HeapPage::new();
        page.write(row(1, "first"));
        page.write(row(2, ""));
        page.write(row(3, "third row"));

        let pointers = page.row_pointers();
        assert_eq!(pointers.len(), 3);
        assert_eq!(page.rows().len(), 3);

        assert_eq!(pointers[0].offset, 0);
        assert_eq!(pointers[0].size, ROW_FIXED_SIZE + 5);
        assert_eq!(pointers[1].offset, pointers[0].end());
        assert_eq!(pointers[1].size, ROW_FIXED_SIZE);
        assert_eq!(pointers[2].offset, pointers[1].end());
        for pair in pointers.windows(2) {
            assert!(pair[0].offset < pair[1].offset);
        }
        assert!(pointers.iter().all(|p| p.mask == 0));

        assert_eq!(page.row(0).map(|r| r.xmin), Some(1));
        assert_eq!(page.row(2).map(|r| r.data.as_slice()), Some(&b"third row"[..]));
        assert_eq!(page.write_cursor(), pointers[2].end());
        assert!(page.is_dirty());
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let mut page = HeapPage::new();
        page.write(row(1, "Hello"));
        page.write(row(2, "World"));
        page.write(Row {
            xmin: u64::MAX,
            xmax: 0,
            mask: 0xAB,
            ctid: 42,
            data: vec![0, 1, 2, 255],
        });

        let bytes = page.to_bytes()?;
        assert_eq!(bytes.len(), page.encoded_len());

        let loaded = HeapPage::from_bytes(&bytes)?;
        assert_eq!(loaded.rows(), page.rows());
        assert_eq!(loaded.row_pointers(), page.row_pointers());
        assert_eq!(loaded.write_cursor(), page.write_cursor());
        assert_eq!(loaded.header().crc, checksum::stored(&bytes));
        assert!(!loaded.is_dirty());

        Ok(())
    }

    #[test]
    fn test_from_bytes_ignores_slot_tail() -> Result<()> {
        let mut page = HeapPage::new();
        page.write(row(5, "in a slot"));

        let mut slot = vec![0u8; 256];
        let bytes = page.to_bytes()?;
        slot[..bytes.len()].copy_from_slice(&bytes);

        let loaded = HeapPage::from_bytes(&slot)?;
        assert_eq!(loaded.rows(), page.rows());
        Ok(())
    }

    #[test]
    fn test_fresh_identity_on_load() -> Result<()> {
        let page = HeapPage::new();
        let bytes = page.to_bytes()?;

        let a = HeapPage::from_bytes(&bytes)?;
        let b = HeapPage::from_bytes(&bytes)?;
        assert_ne!(a.id(), b.id());
        Ok(())
    }

    #[test]
    fn test_zeroed_buffer_is_empty_page() -> Result<()> {
        let page = HeapPage::from_bytes(&[0u8; 64])?;
        assert_eq!(page.row_count(), 0);
        assert_eq!(page.write_cursor(), 0);
        Ok(())
    }

    #[test]
    fn test_truncated_header() {
        let result = HeapPage::from_bytes(&[0u8; PAGE_HEADER_SIZE - 1]);
        assert!(matches!(result, Err(StorageError::Decode { .. })));
    }

    #[test]
    fn test_directory_past_end() {
        let mut buf = vec![0u8; 16];
        buf[4..6].copy_from_slice(&10u16.to_le_bytes());
        let result = HeapPage::from_bytes(&buf);
        assert!(matches!(result, Err(StorageError::Decode { .. })));
    }

    #[test]
    fn test_row_stream_past_end() -> Result<()> {
        let mut page = HeapPage::new();
        page.write(row(1, "some payload"));
        let bytes = page.to_bytes()?;

        let result = HeapPage::from_bytes(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(StorageError::Decode { .. })));
        Ok(())
    }

    #[test]
    fn test_gap_between_rows() -> Result<()> {
        let mut page = HeapPage::new();
        page.write(row(1, "a"));
        page.write(row(2, "b"));
        let mut bytes = page.to_bytes()?.to_vec();

        // Second pointer's offset lives right after the first pointer.
        let second = PAGE_HEADER_SIZE + ROW_POINTER_SIZE;
        bytes[second..second + 2].copy_from_slice(&0u16.to_le_bytes());

        let result = HeapPage::from_bytes(&bytes);
        assert!(matches!(result, Err(StorageError::Decode { .. })));
        Ok(())
    }

    #[test]
    fn test_pointer_below_fixed_size() {
        let mut buf = vec![0u8; 64];
        buf[4..6].copy_from_slice(&1u16.to_le_bytes());
        buf[8..10].copy_from_slice(&10u16.to_le_bytes());

        let result = HeapPage::from_bytes(&buf);
        assert!(matches!(result, Err(StorageError::Decode { .. })));
    }

    #[test]
    fn test_corrupted_row_fails_checksum() -> Result<()> {
        let mut page = HeapPage::new();
        page.write(row(1, "checksummed"));
        let mut bytes = page.to_bytes()?.to_vec();

        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        let result = HeapPage::from_bytes(&bytes);
        assert!(matches!(result, Err(StorageError::ChecksumMismatch { .. })));
        Ok(())
    }

    #[test]
    fn test_row_too_large_to_encode() {
        let mut page = HeapPage::new();
        page.write(Row::new(1, vec![0u8; u16::MAX as usize]));

        let result = page.to_bytes();
        assert!(matches!(result, Err(StorageError::PageOverflow { .. })));
    }

    #[test]
    fn test_large_rows_keep_full_length() {
        let mut page = HeapPage::new();
        let large = 3 * u16::MAX as usize;
        page.write(Row::new(1, vec![0u8; large]));
        page.write(row(2, "after"));

        let pointers = page.row_pointers();
        assert_eq!(pointers[0].size, ROW_FIXED_SIZE + large);
        assert_eq!(pointers[1].offset, ROW_FIXED_SIZE + large);
        assert_eq!(page.write_cursor(), 2 * ROW_FIXED_SIZE + large + 5);
        assert_eq!(
            page.encoded_len(),
            PAGE_HEADER_SIZE + 2 * ROW_POINTER_SIZE + page.write_cursor()
        );

        match page.to_bytes() {
            Err(StorageError::PageOverflow { required, .. }) => {
                assert_eq!(required, page.encoded_len());
            }
            other => panic!("expected PageOverflow, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_mark_flushed() -> Result<()> {
        let mut page = HeapPage::new();
        page.write(row(1, "x"));
        let bytes = page.to_bytes()?;

        page.mark_flushed(checksum::stored(&bytes));
        assert!(!page.is_dirty());
        assert_eq!(page.header().crc, checksum::compute(&bytes));
        Ok(())
    }
}
