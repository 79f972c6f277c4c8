//! Row format stored in a heap page.
//!
//! A row is a fixed 25-byte prefix of visibility markers followed by an
//! opaque payload:
//!
//! ```text
//! xmin u64 | xmax u64 | mask u8 | ctid u64 | data ...
//! ```

use bytes::{Buf, BufMut};

use crate::storage::error::{StorageError, StorageResult};

/// Size of the fixed part of a row: xmin + xmax + mask + ctid.
pub const ROW_FIXED_SIZE: usize = 25;

/// A single row version.
///
/// `xmin`/`xmax` are the creating and deleting transaction ids (0 = unset)
/// and `ctid` is the row's self-reference. None of them are interpreted by
/// the storage layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub xmin: u64,
    pub xmax: u64,
    pub mask: u8,
    pub ctid: u64,
    pub data: Vec<u8>,
}

impl Row {
    pub fn new(xmin: u64, data: impl Into<Vec<u8>>) -> Self {
        Self {
            xmin,
            data: data.into(),
            ..Default::default()
        }
    }

    /// Number of bytes this row occupies in the row stream.
    pub fn encoded_len(&self) -> usize {
        ROW_FIXED_SIZE + self.data.len()
    }

    pub(crate) fn encode_into<B: BufMut>(&self, buf: &mut B) {
        buf.put_u64_le(self.xmin);
        buf.put_u64_le(self.xmax);
        buf.put_u8(self.mask);
        buf.put_u64_le(self.ctid);
        buf.put_slice(&self.data);
    }

    /// Decodes a row whose encoded length is exactly `buf.len()`.
    pub(crate) fn decode(mut buf: &[u8]) -> StorageResult<Self> {
        if buf.len() < ROW_FIXED_SIZE {
            return Err(StorageError::decode(format!(
                "row of {} bytes is shorter than the fixed part ({ROW_FIXED_SIZE})",
                buf.len()
            )));
        }

        let xmin = buf.get_u64_le();
        let xmax = buf.get_u64_le();
        let mask = buf.get_u8();
        let ctid = buf.get_u64_le();

        Ok(Self {
            xmin,
            xmax,
            mask,
            ctid,
            data: buf.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_encoded_layout() -> Result<()> {
        let row = Row {
            xmin: 1,
            xmax: 2,
            mask: 3,
            ctid: 4,
            data: b"abc".to_vec(),
        };

        let mut buf: Vec<u8> = Vec::new();
        row.encode_into(&mut buf);

        assert_eq!(buf.len(), row.encoded_len());
        assert_eq!(buf.len(), ROW_FIXED_SIZE + 3);
        assert_eq!(&buf[0..8], &1u64.to_le_bytes());
        assert_eq!(&buf[8..16], &2u64.to_le_bytes());
        assert_eq!(buf[16], 3);
        assert_eq!(&buf[17..25], &4u64.to_le_bytes());
        assert_eq!(&buf[25..], b"abc");

        assert_eq!(Row::decode(&buf)?, row);
        Ok(())
    }

    #[test]
    fn test_empty_payload() -> Result<()> {
        let row = Row::new(7, Vec::<u8>::new());
        let mut buf: Vec<u8> = Vec::new();
        row.encode_into(&mut buf);

        assert_eq!(buf.len(), ROW_FIXED_SIZE);
        assert_eq!(Row::decode(&buf)?, row);
        Ok(())
    }

    #[test]
    fn test_decode_short_row() {
        let result = Row::decode(&[0u8; ROW_FIXED_SIZE - 1]);
        assert!(matches!(result, Err(StorageError::Decode { .. })));
    }
}
