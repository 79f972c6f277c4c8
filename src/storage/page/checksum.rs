//! Page-level CRC32.
//!
//! The first four bytes of an encoded page hold the CRC32 of every byte that
//! follows it, up to the end of the encoded page (not the slot tail). A
//! stored value of 0 means the page was never stamped, which is the case for
//! a zero-filled slot.

use byteorder::{ByteOrder, LittleEndian};
use crc32fast::Hasher as Crc32;

use crate::storage::error::{StorageError, StorageResult};

/// Width of the checksum field at the start of a page.
pub const CHECKSUM_SIZE: usize = 4;

pub fn compute(encoded: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(&encoded[CHECKSUM_SIZE..]);
    hasher.finalize()
}

/// Writes the checksum of `encoded` into its first four bytes and returns it.
pub fn stamp(encoded: &mut [u8]) -> u32 {
    let crc = compute(encoded);
    LittleEndian::write_u32(&mut encoded[..CHECKSUM_SIZE], crc);
    crc
}

pub fn stored(encoded: &[u8]) -> u32 {
    LittleEndian::read_u32(&encoded[..CHECKSUM_SIZE])
}

pub fn verify(encoded: &[u8]) -> StorageResult<()> {
    let expected = stored(encoded);
    if expected == 0 {
        return Ok(());
    }

    let actual = compute(encoded);
    if actual != expected {
        return Err(StorageError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}
