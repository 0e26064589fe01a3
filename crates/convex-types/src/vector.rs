//! # Persistent Vectors
//!
//! Indexed sequences with structural sharing. Small vectors (at most 16
//! elements) are flat arrays; larger vectors are 16-way trees packed so
//! that every child except the last is completely full. The packing makes
//! the tree shape a pure function of the element count, which is what
//! makes vector equality a structural check.

use crate::cache::CellMeta;
use crate::tags::FANOUT;
use crate::value::Value;
use std::sync::Arc;

/// Child capacity for a canonical tree over `count` elements.
pub(crate) fn vector_capacity(count: u64) -> u64 {
    let mut cap = FANOUT as u64;
    while cap.saturating_mul(FANOUT as u64) < count {
        cap *= FANOUT as u64;
    }
    cap
}

/// An immutable indexed sequence cell.
#[derive(Clone, Debug)]
pub struct Vector(pub(crate) Arc<VectorRep>);

#[derive(Debug)]
pub(crate) enum VectorRep {
    Flat {
        items: Vec<Value>,
        meta: CellMeta,
    },
    Tree {
        count: u64,
        children: Vec<Vector>,
        meta: CellMeta,
    },
}

impl Vector {
    /// The empty vector.
    #[must_use]
    pub fn empty() -> Self {
        Self::flat(Vec::new())
    }

    pub(crate) fn flat(items: Vec<Value>) -> Self {
        debug_assert!(items.len() <= FANOUT);
        Vector(Arc::new(VectorRep::Flat {
            items,
            meta: CellMeta::new(),
        }))
    }

    pub(crate) fn tree(count: u64, children: Vec<Vector>) -> Self {
        Vector(Arc::new(VectorRep::Tree {
            count,
            children,
            meta: CellMeta::new(),
        }))
    }

    /// Builds the canonical vector for a sequence of values.
    #[must_use]
    pub fn from_values(values: Vec<Value>) -> Self {
        if values.len() <= FANOUT {
            return Self::flat(values);
        }
        let count = values.len() as u64;
        let cap = vector_capacity(count) as usize;
        let mut children = Vec::with_capacity(values.len().div_ceil(cap));
        let mut rest = values;
        while rest.len() > cap {
            let tail = rest.split_off(cap);
            children.push(Self::from_values(rest));
            rest = tail;
        }
        children.push(Self::from_values(rest));
        Self::tree(count, children)
    }

    /// Element count.
    #[must_use]
    pub fn count(&self) -> u64 {
        match &*self.0 {
            VectorRep::Flat { items, .. } => items.len() as u64,
            VectorRep::Tree { count, .. } => *count,
        }
    }

    /// Returns true for the empty vector.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Element at `index`, if in bounds.
    #[must_use]
    pub fn get(&self, index: u64) -> Option<Value> {
        match &*self.0 {
            VectorRep::Flat { items, .. } => items.get(index as usize).cloned(),
            VectorRep::Tree {
                count, children, ..
            } => {
                if index >= *count {
                    return None;
                }
                let cap = vector_capacity(*count);
                children[(index / cap) as usize].get(index % cap)
            }
        }
    }

    /// First element.
    #[must_use]
    pub fn first(&self) -> Option<Value> {
        self.get(0)
    }

    /// Last element.
    #[must_use]
    pub fn last(&self) -> Option<Value> {
        let n = self.count();
        if n == 0 {
            None
        } else {
            self.get(n - 1)
        }
    }

    /// Appends an element, returning the extended vector.
    #[must_use]
    pub fn conj(&self, value: Value) -> Vector {
        match &*self.0 {
            VectorRep::Flat { items, .. } => {
                if items.len() < FANOUT {
                    let mut next = items.clone();
                    next.push(value);
                    Self::flat(next)
                } else {
                    Self::tree(
                        FANOUT as u64 + 1,
                        vec![self.clone(), Self::flat(vec![value])],
                    )
                }
            }
            VectorRep::Tree {
                count, children, ..
            } => {
                let cap = vector_capacity(*count);
                let last = children.last().expect("tree vector has children");
                if last.count() < cap {
                    let mut next = children.clone();
                    *next.last_mut().expect("children") = last.conj(value);
                    Self::tree(count + 1, next)
                } else if children.len() < FANOUT {
                    let mut next = children.clone();
                    next.push(Self::flat(vec![value]));
                    Self::tree(count + 1, next)
                } else {
                    // Root is completely full; grow a level.
                    Self::tree(count + 1, vec![self.clone(), Self::flat(vec![value])])
                }
            }
        }
    }

    /// Replaces the element at `index`. An index equal to the count is an
    /// append; a larger index returns `None`.
    #[must_use]
    pub fn assoc(&self, index: u64, value: Value) -> Option<Vector> {
        let n = self.count();
        if index == n {
            return Some(self.conj(value));
        }
        if index > n {
            return None;
        }
        Some(self.assoc_in_bounds(index, value))
    }

    fn assoc_in_bounds(&self, index: u64, value: Value) -> Vector {
        match &*self.0 {
            VectorRep::Flat { items, .. } => {
                let mut next = items.clone();
                next[index as usize] = value;
                Self::flat(next)
            }
            VectorRep::Tree {
                count, children, ..
            } => {
                let cap = vector_capacity(*count);
                let slot = (index / cap) as usize;
                let mut next = children.clone();
                next[slot] = children[slot].assoc_in_bounds(index % cap, value);
                Self::tree(*count, next)
            }
        }
    }

    /// Canonical sub-vector covering `start..end`. `None` when out of range.
    #[must_use]
    pub fn slice(&self, start: u64, end: u64) -> Option<Vector> {
        if start > end || end > self.count() {
            return None;
        }
        let mut out = Vec::with_capacity((end - start) as usize);
        for i in start..end {
            out.push(self.get(i).expect("index in bounds"));
        }
        Some(Self::from_values(out))
    }

    /// The vector without its first element; `None` when empty.
    #[must_use]
    pub fn next(&self) -> Option<Vector> {
        let n = self.count();
        if n <= 1 {
            return None;
        }
        self.slice(1, n)
    }

    /// Collects all elements.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        let mut out = Vec::with_capacity(self.count() as usize);
        self.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut Vec<Value>) {
        match &*self.0 {
            VectorRep::Flat { items, .. } => out.extend(items.iter().cloned()),
            VectorRep::Tree { children, .. } => {
                for c in children {
                    c.collect_into(out);
                }
            }
        }
    }

    /// Iterates elements front to back.
    pub fn iter(&self) -> impl Iterator<Item = Value> {
        self.to_vec().into_iter()
    }

    pub(crate) fn meta(&self) -> &CellMeta {
        match &*self.0 {
            VectorRep::Flat { meta, .. } | VectorRep::Tree { meta, .. } => meta,
        }
    }

    pub(crate) fn flat_items(&self) -> Option<&[Value]> {
        match &*self.0 {
            VectorRep::Flat { items, .. } => Some(items),
            VectorRep::Tree { .. } => None,
        }
    }

    pub(crate) fn tree_children(&self) -> Option<&[Vector]> {
        match &*self.0 {
            VectorRep::Flat { .. } => None,
            VectorRep::Tree { children, .. } => Some(children),
        }
    }
}

impl PartialEq for Vector {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        if self.count() != other.count() {
            return false;
        }
        match (&*self.0, &*other.0) {
            (VectorRep::Flat { items: a, .. }, VectorRep::Flat { items: b, .. }) => a == b,
            (VectorRep::Tree { children: a, .. }, VectorRep::Tree { children: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Vector {}

impl FromIterator<Value> for Vector {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Self::from_values(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn longs(n: u64) -> Vector {
        (0..n).map(|i| Value::Long(i as i64)).collect()
    }

    #[test]
    fn test_conj_count() {
        let mut v = Vector::empty();
        for i in 0..1000 {
            v = v.conj(Value::Long(i));
            assert_eq!(v.count(), (i + 1) as u64);
        }
        for i in 0..1000u64 {
            assert_eq!(v.get(i), Some(Value::Long(i as i64)));
        }
    }

    #[test]
    fn test_conj_matches_bulk_build() {
        // Incremental conj and bulk construction must agree on shape.
        let bulk = longs(300);
        let mut inc = Vector::empty();
        for i in 0..300 {
            inc = inc.conj(Value::Long(i));
        }
        assert_eq!(bulk, inc);
    }

    #[test]
    fn test_packing_invariant() {
        let v = longs(257);
        let children = v.tree_children().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].count(), 256);
        assert_eq!(children[1].count(), 1);
    }

    #[test]
    fn test_assoc() {
        let v = longs(20);
        let v2 = v.assoc(5, Value::Long(99)).unwrap();
        assert_eq!(v2.get(5), Some(Value::Long(99)));
        assert_eq!(v.get(5), Some(Value::Long(5)));
        // Assoc at count appends.
        let v3 = v.assoc(20, Value::Long(20)).unwrap();
        assert_eq!(v3.count(), 21);
        // Assoc past count fails.
        assert!(v.assoc(21, Value::Nil).is_none());
    }

    #[test]
    fn test_slice_next() {
        let v = longs(10);
        let s = v.slice(2, 5).unwrap();
        assert_eq!(s.to_vec(), vec![Value::Long(2), Value::Long(3), Value::Long(4)]);
        let n = v.next().unwrap();
        assert_eq!(n.count(), 9);
        assert_eq!(n.first(), Some(Value::Long(1)));
        assert!(Vector::empty().next().is_none());
    }
}
