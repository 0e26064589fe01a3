//! # Write-Once Cell Caches
//!
//! Heavy cells (collections, records, chunked blobs) cache their canonical
//! encoding, hash and memory size behind the `Arc` that shares the cell.
//! Caches are write-once: a cell is immutable, so every computation of a
//! cached quantity yields the same result.

use crate::hash::Hash;
use std::sync::{Arc, OnceLock};

/// Cached derived data for one cell.
#[derive(Debug, Default)]
pub(crate) struct CellMeta {
    /// Full canonical encoding.
    pub encoding: OnceLock<Arc<[u8]>>,
    /// SHA3-256 of the encoding.
    pub hash: OnceLock<Hash>,
    /// Memory size: own encoding plus non-embedded descendants.
    pub mem: OnceLock<u64>,
    /// Whether the cell may be inlined into a parent encoding.
    pub embedded: OnceLock<bool>,
}

impl CellMeta {
    pub fn new() -> Self {
        Self::default()
    }
}
