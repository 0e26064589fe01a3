//! # Blob Maps
//!
//! Persistent radix tries keyed by the raw bytes of blob-like keys.
//! Traversal works on nibbles (half-bytes) with compressed shared
//! prefixes, so iteration yields entries in lexicographic key order.
//! The schedule and every stake/holdings index use this ordering.
//!
//! Keys must be blob-like: `Blob`, `AccountKey`, `Hash`-sized blobs, or
//! `Address` (as its 8-byte big-endian form). Anything else is rejected
//! at the runtime layer with an argument error.

use crate::cache::CellMeta;
use crate::value::Value;
use std::sync::Arc;

/// Nibble path for trie traversal.
///
/// Keys are split into half-bytes (0-15); an 8-byte key becomes 16
/// nibbles. Key lengths are whole bytes, so paths at entries always have
/// even length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nibbles(pub Vec<u8>);

impl Nibbles {
    /// Create nibbles from key bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut nibbles = Vec::with_capacity(bytes.len() * 2);
        for byte in bytes {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0F);
        }
        Nibbles(nibbles)
    }

    /// Pack nibbles back into bytes. Odd lengths pad the final low nibble.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len().div_ceil(2));
        for chunk in self.0.chunks(2) {
            out.push((chunk[0] << 4) | chunk.get(1).copied().unwrap_or(0));
        }
        out
    }

    /// Find common prefix length with another path.
    #[must_use]
    pub fn common_prefix_len(&self, other: &Nibbles) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Nibble at `index`.
    #[must_use]
    pub fn at(&self, index: usize) -> u8 {
        self.0[index]
    }

    /// Path slice from `start` to the end.
    #[must_use]
    pub fn slice_from(&self, start: usize) -> Self {
        Nibbles(self.0[start..].to_vec())
    }

    /// Path slice covering `start..end`.
    #[must_use]
    pub fn slice_range(&self, start: usize, end: usize) -> Self {
        Nibbles(self.0[start..end].to_vec())
    }
}

/// The byte form of a blob-like key value, or `None` when not blob-like.
#[must_use]
pub fn blob_key_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Blob(b) => Some(b.to_vec()),
        Value::AccountKey(k) => Some(k.as_bytes().to_vec()),
        Value::Address(a) => Some(a.to_key_bytes().to_vec()),
        _ => None,
    }
}

/// An immutable radix-trie map over blob keys.
#[derive(Clone, Debug)]
pub struct BlobMap(pub(crate) Arc<BlobMapRep>);

#[derive(Debug)]
pub(crate) struct BlobMapRep {
    /// Total entries at or below this node.
    pub count: u64,
    /// Compressed path below the parent branch nibble.
    pub prefix: Nibbles,
    /// Entry whose key path ends exactly at this node: `(key, value)`.
    pub entry: Option<(Value, Value)>,
    /// Children by branch nibble, ascending.
    pub children: Vec<(u8, BlobMap)>,
    pub meta: CellMeta,
}

impl BlobMap {
    /// The empty blob map.
    #[must_use]
    pub fn empty() -> Self {
        BlobMap(Arc::new(BlobMapRep {
            count: 0,
            prefix: Nibbles(Vec::new()),
            entry: None,
            children: Vec::new(),
            meta: CellMeta::new(),
        }))
    }

    pub(crate) fn node(
        prefix: Nibbles,
        entry: Option<(Value, Value)>,
        children: Vec<(u8, BlobMap)>,
    ) -> Self {
        let count = entry.iter().count() as u64
            + children.iter().map(|(_, c)| c.count()).sum::<u64>();
        BlobMap(Arc::new(BlobMapRep {
            count,
            prefix,
            entry,
            children,
            meta: CellMeta::new(),
        }))
    }

    /// Entry count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.0.count
    }

    /// Returns true for the empty map.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.count == 0
    }

    /// Value for the key with byte form `key_bytes`.
    #[must_use]
    pub fn get_bytes(&self, key_bytes: &[u8]) -> Option<Value> {
        if self.is_empty() {
            return None;
        }
        self.get_path(&Nibbles::from_bytes(key_bytes))
    }

    /// Value for a blob-like key value.
    #[must_use]
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.get_bytes(&blob_key_bytes(key)?)
    }

    fn get_path(&self, path: &Nibbles) -> Option<Value> {
        let rep = &*self.0;
        let common = path.common_prefix_len(&rep.prefix);
        if common < rep.prefix.len() {
            return None;
        }
        if path.len() == rep.prefix.len() {
            return rep.entry.as_ref().map(|(_, v)| v.clone());
        }
        let branch = path.at(common);
        let child = rep
            .children
            .iter()
            .find(|(n, _)| *n == branch)
            .map(|(_, c)| c)?;
        child.get_path(&path.slice_from(common + 1))
    }

    /// Returns true when the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    /// Associates a blob-like key with a value. Returns `None` when the key
    /// is not blob-like.
    #[must_use]
    pub fn assoc(&self, key: Value, value: Value) -> Option<BlobMap> {
        let bytes = blob_key_bytes(&key)?;
        Some(self.assoc_bytes(&bytes, key, value))
    }

    /// Associates by explicit key bytes, carrying the key cell.
    #[must_use]
    pub fn assoc_bytes(&self, key_bytes: &[u8], key: Value, value: Value) -> BlobMap {
        let path = Nibbles::from_bytes(key_bytes);
        if self.is_empty() {
            return Self::node(path, Some((key, value)), Vec::new());
        }
        self.assoc_path(&path, key, value)
    }

    fn assoc_path(&self, path: &Nibbles, key: Value, value: Value) -> BlobMap {
        let rep = &*self.0;
        let common = path.common_prefix_len(&rep.prefix);

        if common < rep.prefix.len() {
            // Split this node at the divergence point.
            let shared = rep.prefix.slice_range(0, common);
            let old_branch = rep.prefix.at(common);
            let pushed_down = Self::node(
                rep.prefix.slice_from(common + 1),
                rep.entry.clone(),
                rep.children.clone(),
            );
            if path.len() == common {
                // New key ends exactly at the split point.
                return Self::node(
                    shared,
                    Some((key, value)),
                    vec![(old_branch, pushed_down)],
                );
            }
            let new_branch = path.at(common);
            let new_leaf = Self::node(
                path.slice_from(common + 1),
                Some((key, value)),
                Vec::new(),
            );
            let mut children = vec![(old_branch, pushed_down), (new_branch, new_leaf)];
            children.sort_by_key(|(n, _)| *n);
            return Self::node(shared, None, children);
        }

        if path.len() == rep.prefix.len() {
            // Key ends at this node: set or replace the entry.
            return Self::node(
                rep.prefix.clone(),
                Some((key, value)),
                rep.children.clone(),
            );
        }

        let branch = path.at(common);
        let rest = path.slice_from(common + 1);
        let mut children = rep.children.clone();
        match children.iter().position(|(n, _)| *n == branch) {
            Some(idx) => {
                children[idx].1 = children[idx].1.assoc_path(&rest, key, value);
            }
            None => {
                children.push((branch, Self::node(rest, Some((key, value)), Vec::new())));
                children.sort_by_key(|(n, _)| *n);
            }
        }
        Self::node(rep.prefix.clone(), rep.entry.clone(), children)
    }

    /// Removes a key, returning the reduced map.
    #[must_use]
    pub fn dissoc(&self, key: &Value) -> BlobMap {
        match blob_key_bytes(key) {
            None => self.clone(),
            Some(bytes) => self.dissoc_bytes(&bytes),
        }
    }

    /// Removes by explicit key bytes.
    #[must_use]
    pub fn dissoc_bytes(&self, key_bytes: &[u8]) -> BlobMap {
        if self.is_empty() {
            return self.clone();
        }
        let path = Nibbles::from_bytes(key_bytes);
        self.dissoc_path(&path).unwrap_or_else(BlobMap::empty)
    }

    /// Removes along a path; `None` means the node became empty.
    fn dissoc_path(&self, path: &Nibbles) -> Option<BlobMap> {
        let rep = &*self.0;
        let common = path.common_prefix_len(&rep.prefix);
        if common < rep.prefix.len() {
            return Some(self.clone());
        }
        if path.len() == rep.prefix.len() {
            if rep.entry.is_none() {
                return Some(self.clone());
            }
            return Self::canonicalize(rep.prefix.clone(), None, rep.children.clone());
        }
        let branch = path.at(common);
        let idx = rep.children.iter().position(|(n, _)| *n == branch)?;
        let rest = path.slice_from(common + 1);
        let mut children = rep.children.clone();
        match children[idx].1.dissoc_path(&rest) {
            Some(next_child) => {
                if next_child.count() == children[idx].1.count() {
                    return Some(self.clone());
                }
                children[idx].1 = next_child;
            }
            None => {
                children.remove(idx);
            }
        }
        Self::canonicalize(rep.prefix.clone(), rep.entry.clone(), children)
    }

    /// Restores canonical form: entry-less single-child nodes merge with
    /// the child; entry-less childless nodes vanish.
    fn canonicalize(
        prefix: Nibbles,
        entry: Option<(Value, Value)>,
        children: Vec<(u8, BlobMap)>,
    ) -> Option<BlobMap> {
        if entry.is_none() && children.is_empty() {
            return None;
        }
        if entry.is_none() && children.len() == 1 {
            let (branch, child) = children.into_iter().next().expect("one child");
            let crep = &*child.0;
            let mut merged = prefix.0;
            merged.push(branch);
            merged.extend_from_slice(&crep.prefix.0);
            return Some(Self::node(
                Nibbles(merged),
                crep.entry.clone(),
                crep.children.clone(),
            ));
        }
        Some(Self::node(prefix, entry, children))
    }

    /// All entries in lexicographic key order.
    #[must_use]
    pub fn entries(&self) -> Vec<(Value, Value)> {
        let mut out = Vec::with_capacity(self.count() as usize);
        self.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut Vec<(Value, Value)>) {
        let rep = &*self.0;
        if let Some(e) = &rep.entry {
            out.push(e.clone());
        }
        for (_, c) in &rep.children {
            c.collect_into(out);
        }
    }

    /// First entry in key order.
    #[must_use]
    pub fn first_entry(&self) -> Option<(Value, Value)> {
        let rep = &*self.0;
        if let Some(e) = &rep.entry {
            return Some(e.clone());
        }
        rep.children.first().and_then(|(_, c)| c.first_entry())
    }

    pub(crate) fn meta(&self) -> &CellMeta {
        &self.0.meta
    }
}

impl PartialEq for BlobMap {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        let (a, b) = (&*self.0, &*other.0);
        a.count == b.count
            && a.prefix == b.prefix
            && a.entry == b.entry
            && a.children == b.children
    }
}

impl Eq for BlobMap {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::Blob;

    fn bkey(bytes: &[u8]) -> Value {
        Value::Blob(Blob::from_bytes(bytes))
    }

    #[test]
    fn test_assoc_get() {
        let m = BlobMap::empty()
            .assoc(bkey(b"abc"), Value::Long(1))
            .unwrap()
            .assoc(bkey(b"abd"), Value::Long(2))
            .unwrap()
            .assoc(bkey(b"x"), Value::Long(3))
            .unwrap();
        assert_eq!(m.count(), 3);
        assert_eq!(m.get(&bkey(b"abc")), Some(Value::Long(1)));
        assert_eq!(m.get(&bkey(b"abd")), Some(Value::Long(2)));
        assert_eq!(m.get(&bkey(b"x")), Some(Value::Long(3)));
        assert_eq!(m.get(&bkey(b"ab")), None);
    }

    #[test]
    fn test_prefix_keys() {
        // A key that is a strict prefix of another must coexist with it.
        let m = BlobMap::empty()
            .assoc(bkey(b"ab"), Value::Long(1))
            .unwrap()
            .assoc(bkey(b"abcd"), Value::Long(2))
            .unwrap();
        assert_eq!(m.get(&bkey(b"ab")), Some(Value::Long(1)));
        assert_eq!(m.get(&bkey(b"abcd")), Some(Value::Long(2)));
    }

    #[test]
    fn test_lexicographic_iteration() {
        let keys: Vec<&[u8]> = vec![b"zz", b"a", b"ab", b"b", b"aa"];
        let mut m = BlobMap::empty();
        for (i, k) in keys.iter().enumerate() {
            m = m.assoc(bkey(k), Value::Long(i as i64)).unwrap();
        }
        let order: Vec<Vec<u8>> = m
            .entries()
            .iter()
            .map(|(k, _)| blob_key_bytes(k).unwrap())
            .collect();
        let mut sorted = keys.iter().map(|k| k.to_vec()).collect::<Vec<_>>();
        sorted.sort();
        assert_eq!(order, sorted);
    }

    #[test]
    fn test_dissoc_restores_shape() {
        let empty = BlobMap::empty();
        let a = empty.assoc(bkey(b"one"), Value::Long(1)).unwrap();
        let ab = a.assoc(bkey(b"two"), Value::Long(2)).unwrap();
        let back = ab.dissoc(&bkey(b"two"));
        assert_eq!(back, a);
        let gone = back.dissoc(&bkey(b"one"));
        assert_eq!(gone, empty);
        assert_eq!(gone.count(), 0);
    }

    #[test]
    fn test_non_blob_key_rejected() {
        assert!(BlobMap::empty()
            .assoc(Value::Long(1), Value::Long(1))
            .is_none());
    }

    #[test]
    fn test_address_keys_sorted_numerically() {
        use crate::address::Address;
        let mut m = BlobMap::empty();
        for i in [300u64, 2, 90, 17] {
            m = m
                .assoc(Value::Address(Address::new(i)), Value::Long(i as i64))
                .unwrap();
        }
        let order: Vec<Value> = m.entries().iter().map(|(_, v)| v.clone()).collect();
        assert_eq!(
            order,
            vec![
                Value::Long(2),
                Value::Long(17),
                Value::Long(90),
                Value::Long(300)
            ]
        );
    }
}
