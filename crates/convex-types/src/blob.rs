//! # Blobs
//!
//! Opaque byte cells. A blob of at most 4096 bytes is a flat array; longer
//! blobs are 16-way trees whose leaves are full 4096-byte chunks, packed so
//! that every child except the last is full. The packing is canonical:
//! a given byte string has exactly one tree shape.

use crate::cache::CellMeta;
use crate::tags::{FANOUT, MAX_CHUNK_LENGTH};
use std::fmt;
use std::sync::Arc;

/// Child capacity for a canonical tree over `len` bytes.
pub(crate) fn chunk_capacity(len: u64) -> u64 {
    let mut cap = MAX_CHUNK_LENGTH as u64;
    while cap.saturating_mul(FANOUT as u64) < len {
        cap *= FANOUT as u64;
    }
    cap
}

/// An immutable byte-string cell.
#[derive(Clone, Debug)]
pub struct Blob(pub(crate) Arc<BlobRep>);

#[derive(Debug)]
pub(crate) enum BlobRep {
    Flat {
        bytes: Vec<u8>,
        meta: CellMeta,
    },
    Tree {
        len: u64,
        children: Vec<Blob>,
        meta: CellMeta,
    },
}

impl Blob {
    /// The empty blob.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_bytes(&[])
    }

    /// Builds the canonical blob for a byte string.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.len() <= MAX_CHUNK_LENGTH {
            return Blob(Arc::new(BlobRep::Flat {
                bytes: bytes.to_vec(),
                meta: CellMeta::new(),
            }));
        }
        let len = bytes.len() as u64;
        let cap = chunk_capacity(len) as usize;
        let children: Vec<Blob> = bytes.chunks(cap).map(Blob::from_bytes).collect();
        Blob(Arc::new(BlobRep::Tree {
            len,
            children,
            meta: CellMeta::new(),
        }))
    }

    /// Byte length.
    #[must_use]
    pub fn len(&self) -> u64 {
        match &*self.0 {
            BlobRep::Flat { bytes, .. } => bytes.len() as u64,
            BlobRep::Tree { len, .. } => *len,
        }
    }

    /// Returns true for the empty blob.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte at `index`, if in bounds.
    #[must_use]
    pub fn byte_at(&self, index: u64) -> Option<u8> {
        match &*self.0 {
            BlobRep::Flat { bytes, .. } => bytes.get(index as usize).copied(),
            BlobRep::Tree { len, children, .. } => {
                if index >= *len {
                    return None;
                }
                let cap = chunk_capacity(*len);
                let child = &children[(index / cap) as usize];
                child.byte_at(index % cap)
            }
        }
    }

    /// Collects the full byte string.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len() as usize);
        self.append_to(&mut out);
        out
    }

    fn append_to(&self, out: &mut Vec<u8>) {
        match &*self.0 {
            BlobRep::Flat { bytes, .. } => out.extend_from_slice(bytes),
            BlobRep::Tree { children, .. } => {
                for c in children {
                    c.append_to(out);
                }
            }
        }
    }

    /// Canonical sub-blob covering `start..end`. `None` when out of range.
    #[must_use]
    pub fn slice(&self, start: u64, end: u64) -> Option<Blob> {
        if start > end || end > self.len() {
            return None;
        }
        let all = self.to_vec();
        Some(Blob::from_bytes(&all[start as usize..end as usize]))
    }

    /// Canonical concatenation.
    #[must_use]
    pub fn append(&self, other: &Blob) -> Blob {
        let mut bytes = self.to_vec();
        bytes.extend_from_slice(&other.to_vec());
        Blob::from_bytes(&bytes)
    }

    pub(crate) fn meta(&self) -> &CellMeta {
        match &*self.0 {
            BlobRep::Flat { meta, .. } | BlobRep::Tree { meta, .. } => meta,
        }
    }

    pub(crate) fn tree_children(&self) -> Option<&[Blob]> {
        match &*self.0 {
            BlobRep::Flat { .. } => None,
            BlobRep::Tree { children, .. } => Some(children),
        }
    }

    pub(crate) fn flat_bytes(&self) -> Option<&[u8]> {
        match &*self.0 {
            BlobRep::Flat { bytes, .. } => Some(bytes),
            BlobRep::Tree { .. } => None,
        }
    }
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        self.len() == other.len() && self.to_vec() == other.to_vec()
    }
}

impl Eq for Blob {}

impl fmt::Display for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        // Full bytes for short blobs, a prefix for long ones.
        let bytes = self.to_vec();
        let shown = bytes.len().min(32);
        for byte in &bytes[..shown] {
            write!(f, "{byte:02x}")?;
        }
        if bytes.len() > shown {
            write!(f, "..")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_roundtrip() {
        let b = Blob::from_bytes(&[1, 2, 3]);
        assert_eq!(b.len(), 3);
        assert_eq!(b.byte_at(2), Some(3));
        assert_eq!(b.byte_at(3), None);
        assert_eq!(b.to_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn test_tree_shape() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let b = Blob::from_bytes(&data);
        assert_eq!(b.len(), 10_000);
        let children = b.tree_children().unwrap();
        // 10_000 bytes packs as two full 4096 chunks plus a remainder.
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].len(), 4096);
        assert_eq!(children[1].len(), 4096);
        assert_eq!(children[2].len(), 10_000 - 2 * 4096);
        assert_eq!(b.to_vec(), data);
        assert_eq!(b.byte_at(9_999), Some(data[9_999]));
    }

    #[test]
    fn test_deep_tree() {
        // Over 16 chunks forces a second tree level.
        let data = vec![7u8; 4096 * 20];
        let b = Blob::from_bytes(&data);
        let children = b.tree_children().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].len(), 4096 * 16);
        assert!(children[0].tree_children().is_some());
        assert_eq!(b.to_vec(), data);
    }

    #[test]
    fn test_slice_append() {
        let b = Blob::from_bytes(b"hello world");
        let h = b.slice(0, 5).unwrap();
        assert_eq!(h.to_vec(), b"hello");
        let w = b.slice(6, 11).unwrap();
        let joined = h.append(&Blob::from_bytes(b" ")).append(&w);
        assert_eq!(joined.to_vec(), b"hello world");
        assert!(b.slice(5, 20).is_none());
    }
}
