//! # Error Types
//!
//! Host-level failures of the cell layer. In-VM errors are values, not Rust
//! errors; nothing here ever crosses into CVM error values except
//! `MissingData`, which upper layers translate into a wire request.

use crate::hash::Hash;
use thiserror::Error;

/// Errors raised while decoding or validating cell encodings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// Encoding ended before the declared content.
    #[error("truncated encoding: needed {needed} more byte(s)")]
    Truncated { needed: usize },

    /// Tag byte does not correspond to any cell type.
    #[error("unknown tag: 0x{0:02X}")]
    UnknownTag(u8),

    /// Structurally readable but not the canonical form for its value.
    #[error("non-canonical encoding: {0}")]
    NonCanonical(&'static str),

    /// Valid encoding carrying inconsistent content.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A referenced child cell is not available from the cell source.
    #[error("missing data: {0}")]
    MissingData(Hash),

    /// A count exceeded the 63-bit structural limit.
    #[error("limit exceeded: {0}")]
    Limit(&'static str),
}

impl EncodingError {
    /// Bad-format constructor for free-form decode failures.
    pub fn bad_format(detail: impl Into<String>) -> Self {
        Self::InvalidData(detail.into())
    }
}
