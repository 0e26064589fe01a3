//! # Hash Maps
//!
//! Persistent hash array mapped tries keyed by the SHA3-256 of each key's
//! canonical encoding, consuming 4 bits of hash per level. Small runs of
//! entries live in sorted leaf nodes; a leaf splits into a 16-way branch
//! when it outgrows its capacity. Iteration follows hash-trie order, so
//! equal maps are structurally identical.

use crate::cache::CellMeta;
use crate::encoding;
use crate::hash::Hash;
use crate::tags::{MAX_HAMT_DEPTH, MAX_LEAF_ENTRIES};
use crate::value::Value;
use std::sync::Arc;

/// Nibble of `hash` at `depth` (0 = high nibble of byte 0).
pub(crate) fn nibble_at(hash: &Hash, depth: u32) -> u8 {
    let byte = hash.0[(depth / 2) as usize];
    if depth % 2 == 0 {
        byte >> 4
    } else {
        byte & 0x0F
    }
}

/// An immutable hash map cell.
#[derive(Clone, Debug)]
pub struct Map(pub(crate) Arc<MapRep>);

#[derive(Debug)]
pub(crate) enum MapRep {
    Leaf {
        /// Entries sorted by key hash.
        entries: Vec<(Value, Value)>,
        meta: CellMeta,
    },
    Tree {
        count: u64,
        /// Bit `n` set when a child exists for nibble `n`.
        mask: u16,
        /// Children in ascending nibble order.
        children: Vec<Map>,
        meta: CellMeta,
    },
}

impl Map {
    /// The empty map.
    #[must_use]
    pub fn empty() -> Self {
        Map(Arc::new(MapRep::Leaf {
            entries: Vec::new(),
            meta: CellMeta::new(),
        }))
    }

    fn leaf(mut entries: Vec<(Value, Value)>) -> Self {
        entries.sort_by_key(|(k, _)| encoding::value_hash(k));
        Map(Arc::new(MapRep::Leaf {
            entries,
            meta: CellMeta::new(),
        }))
    }

    pub(crate) fn leaf_presorted(entries: Vec<(Value, Value)>) -> Self {
        Map(Arc::new(MapRep::Leaf {
            entries,
            meta: CellMeta::new(),
        }))
    }

    pub(crate) fn tree(count: u64, mask: u16, children: Vec<Map>) -> Self {
        Map(Arc::new(MapRep::Tree {
            count,
            mask,
            children,
            meta: CellMeta::new(),
        }))
    }

    /// Builds a map from entries; later duplicates win.
    #[must_use]
    pub fn from_entries(entries: Vec<(Value, Value)>) -> Self {
        let mut m = Self::empty();
        for (k, v) in entries {
            m = m.assoc(k, v);
        }
        m
    }

    /// Entry count.
    #[must_use]
    pub fn count(&self) -> u64 {
        match &*self.0 {
            MapRep::Leaf { entries, .. } => entries.len() as u64,
            MapRep::Tree { count, .. } => *count,
        }
    }

    /// Returns true for the empty map.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &Value) -> Option<Value> {
        let khash = encoding::value_hash(key);
        self.get_with_hash(key, &khash, 0)
    }

    fn get_with_hash(&self, key: &Value, khash: &Hash, depth: u32) -> Option<Value> {
        match &*self.0 {
            MapRep::Leaf { entries, .. } => entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            MapRep::Tree { mask, children, .. } => {
                let nib = nibble_at(khash, depth);
                let bit = 1u16 << nib;
                if mask & bit == 0 {
                    return None;
                }
                let idx = (mask & (bit - 1)).count_ones() as usize;
                children[idx].get_with_hash(key, khash, depth + 1)
            }
        }
    }

    /// Returns true when `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    /// Associates `key` with `value`, returning the extended map.
    #[must_use]
    pub fn assoc(&self, key: Value, value: Value) -> Map {
        let khash = encoding::value_hash(&key);
        self.assoc_with_hash(key, khash, value, 0)
    }

    fn assoc_with_hash(&self, key: Value, khash: Hash, value: Value, depth: u32) -> Map {
        match &*self.0 {
            MapRep::Leaf { entries, .. } => {
                if let Some(pos) = entries.iter().position(|(k, _)| *k == key) {
                    let mut next = entries.clone();
                    next[pos] = (key, value);
                    return Self::leaf_presorted(next);
                }
                if entries.len() < MAX_LEAF_ENTRIES || depth >= MAX_HAMT_DEPTH {
                    let mut next = entries.clone();
                    next.push((key, value));
                    return Self::leaf(next);
                }
                // Leaf overflow: split into a branch at this depth.
                let mut all = entries.clone();
                all.push((key, value));
                Self::build_node(all, depth)
            }
            MapRep::Tree {
                count,
                mask,
                children,
                ..
            } => {
                let nib = nibble_at(&khash, depth);
                let bit = 1u16 << nib;
                let idx = (mask & (bit - 1)).count_ones() as usize;
                if mask & bit != 0 {
                    let child = &children[idx];
                    let grew = child.get_with_hash(&key, &khash, depth + 1).is_none();
                    let next_child = child.assoc_with_hash(key, khash, value, depth + 1);
                    let mut next = children.clone();
                    next[idx] = next_child;
                    let next_count = if grew { count + 1 } else { *count };
                    Self::tree(next_count, *mask, next)
                } else {
                    let mut next = children.clone();
                    next.insert(idx, Self::leaf(vec![(key, value)]));
                    Self::tree(count + 1, mask | bit, next)
                }
            }
        }
    }

    fn build_node(entries: Vec<(Value, Value)>, depth: u32) -> Map {
        if entries.len() <= MAX_LEAF_ENTRIES || depth >= MAX_HAMT_DEPTH {
            return Self::leaf(entries);
        }
        let count = entries.len() as u64;
        let mut groups: Vec<Vec<(Value, Value)>> = vec![Vec::new(); 16];
        for (k, v) in entries {
            let nib = nibble_at(&encoding::value_hash(&k), depth);
            groups[nib as usize].push((k, v));
        }
        let mut mask = 0u16;
        let mut children = Vec::new();
        for (nib, group) in groups.into_iter().enumerate() {
            if !group.is_empty() {
                mask |= 1 << nib;
                children.push(Self::build_node(group, depth + 1));
            }
        }
        Self::tree(count, mask, children)
    }

    /// Removes `key`, returning the reduced map.
    #[must_use]
    pub fn dissoc(&self, key: &Value) -> Map {
        let khash = encoding::value_hash(key);
        self.dissoc_with_hash(key, &khash, 0)
    }

    fn dissoc_with_hash(&self, key: &Value, khash: &Hash, depth: u32) -> Map {
        match &*self.0 {
            MapRep::Leaf { entries, .. } => {
                match entries.iter().position(|(k, _)| k == key) {
                    None => self.clone(),
                    Some(pos) => {
                        let mut next = entries.clone();
                        next.remove(pos);
                        Self::leaf_presorted(next)
                    }
                }
            }
            MapRep::Tree {
                count,
                mask,
                children,
                ..
            } => {
                let nib = nibble_at(khash, depth);
                let bit = 1u16 << nib;
                if mask & bit == 0 {
                    return self.clone();
                }
                let idx = (mask & (bit - 1)).count_ones() as usize;
                let child = &children[idx];
                let next_child = child.dissoc_with_hash(key, khash, depth + 1);
                if next_child.count() == child.count() {
                    return self.clone();
                }
                let next_count = count - 1;
                if next_count as usize <= MAX_LEAF_ENTRIES {
                    // Collapse back to the canonical leaf form.
                    let mut all = Vec::with_capacity(next_count as usize);
                    for (i, c) in children.iter().enumerate() {
                        if i == idx {
                            all.extend(next_child.entries());
                        } else {
                            all.extend(c.entries());
                        }
                    }
                    return Self::leaf(all);
                }
                let mut next = children.clone();
                let mut next_mask = *mask;
                if next_child.is_empty() {
                    next.remove(idx);
                    next_mask &= !bit;
                } else {
                    next[idx] = next_child;
                }
                Self::tree(next_count, next_mask, next)
            }
        }
    }

    /// All entries in trie order.
    #[must_use]
    pub fn entries(&self) -> Vec<(Value, Value)> {
        let mut out = Vec::with_capacity(self.count() as usize);
        self.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut Vec<(Value, Value)>) {
        match &*self.0 {
            MapRep::Leaf { entries, .. } => out.extend(entries.iter().cloned()),
            MapRep::Tree { children, .. } => {
                for c in children {
                    c.collect_into(out);
                }
            }
        }
    }

    /// Keys in trie order.
    #[must_use]
    pub fn keys(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(k, _)| k).collect()
    }

    /// Values in trie order.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }

    /// First entry in trie order.
    #[must_use]
    pub fn first_entry(&self) -> Option<(Value, Value)> {
        match &*self.0 {
            MapRep::Leaf { entries, .. } => entries.first().cloned(),
            MapRep::Tree { children, .. } => children.first().and_then(Map::first_entry),
        }
    }

    /// Merges `other` into this map; entries of `other` win.
    #[must_use]
    pub fn merge(&self, other: &Map) -> Map {
        let mut m = self.clone();
        for (k, v) in other.entries() {
            m = m.assoc(k, v);
        }
        m
    }

    pub(crate) fn meta(&self) -> &CellMeta {
        match &*self.0 {
            MapRep::Leaf { meta, .. } | MapRep::Tree { meta, .. } => meta,
        }
    }

    pub(crate) fn leaf_entries(&self) -> Option<&[(Value, Value)]> {
        match &*self.0 {
            MapRep::Leaf { entries, .. } => Some(entries),
            MapRep::Tree { .. } => None,
        }
    }

    pub(crate) fn tree_parts(&self) -> Option<(u16, &[Map])> {
        match &*self.0 {
            MapRep::Leaf { .. } => None,
            MapRep::Tree { mask, children, .. } => Some((*mask, children)),
        }
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        if self.count() != other.count() {
            return false;
        }
        // Canonical representation: equal content implies equal structure.
        match (&*self.0, &*other.0) {
            (MapRep::Leaf { entries: a, .. }, MapRep::Leaf { entries: b, .. }) => a == b,
            (
                MapRep::Tree {
                    mask: ma,
                    children: ca,
                    ..
                },
                MapRep::Tree {
                    mask: mb,
                    children: cb,
                    ..
                },
            ) => ma == mb && ca == cb,
            _ => false,
        }
    }
}

impl Eq for Map {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::Keyword;

    fn kw(name: &str) -> Value {
        Value::Keyword(Keyword::intern(name))
    }

    #[test]
    fn test_assoc_get_dissoc() {
        let m = Map::empty()
            .assoc(kw("a"), Value::Long(1))
            .assoc(kw("b"), Value::Long(2));
        assert_eq!(m.count(), 2);
        assert_eq!(m.get(&kw("a")), Some(Value::Long(1)));
        assert_eq!(m.get(&kw("c")), None);
        let m2 = m.dissoc(&kw("a"));
        assert_eq!(m2.count(), 1);
        assert_eq!(m2.get(&kw("a")), None);
        // Original untouched.
        assert_eq!(m.get(&kw("a")), Some(Value::Long(1)));
    }

    #[test]
    fn test_replace_keeps_count() {
        let m = Map::empty().assoc(kw("a"), Value::Long(1));
        let m2 = m.assoc(kw("a"), Value::Long(2));
        assert_eq!(m2.count(), 1);
        assert_eq!(m2.get(&kw("a")), Some(Value::Long(2)));
    }

    #[test]
    fn test_large_map_splits_and_collapses() {
        let mut m = Map::empty();
        for i in 0..200i64 {
            m = m.assoc(Value::Long(i), Value::Long(i * 2));
        }
        assert_eq!(m.count(), 200);
        assert!(m.tree_parts().is_some());
        for i in 0..200i64 {
            assert_eq!(m.get(&Value::Long(i)), Some(Value::Long(i * 2)));
        }
        for i in 0..195i64 {
            m = m.dissoc(&Value::Long(i));
        }
        assert_eq!(m.count(), 5);
        // Shrunk below leaf capacity: canonical form is a leaf again.
        assert!(m.leaf_entries().is_some());
    }

    #[test]
    fn test_order_independent_equality() {
        let mut a = Map::empty();
        let mut b = Map::empty();
        for i in 0..50i64 {
            a = a.assoc(Value::Long(i), Value::Long(i));
        }
        for i in (0..50i64).rev() {
            b = b.assoc(Value::Long(i), Value::Long(i));
        }
        assert_eq!(a, b);
    }

    #[test]
    fn test_dissoc_missing_is_identity() {
        let m = Map::empty().assoc(kw("a"), Value::Long(1));
        let m2 = m.dissoc(&kw("zz"));
        assert_eq!(m, m2);
    }
}
