//! Storage layer error types.

use thiserror::Error;

use crate::storage::page::PageId;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Page not found: {0}")]
    PageNotFound(PageId),

    #[error("Page overflow: encoded page needs {required} bytes but the slot holds {available}")]
    PageOverflow { required: usize, available: usize },

    #[error("Failed to decode page: {reason}")]
    Decode { reason: String },

    #[error("Page checksum mismatch: stored {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Invalid page size: {page_size} (min: {min})")]
    InvalidPageSize { page_size: u16, min: usize },

    #[error("Database file is corrupted: {reason}")]
    Corrupted { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        StorageError::Decode {
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupted(reason: impl Into<String>) -> Self {
        StorageError::Corrupted {
            reason: reason.into(),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
