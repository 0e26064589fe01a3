//! In-memory store adapter, used by tests and single-process peers.

use crate::store::{Store, StoreError};
use convex_types::{
    non_embedded_descendants, value_hash, CellSource, Hash, Ref, RefStatus, Value,
};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::trace;

/// `RwLock<HashMap>`-backed store.
pub struct MemoryStore {
    cells: RwLock<HashMap<Hash, Ref>>,
    root: RwLock<Option<Hash>>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cells: RwLock::new(HashMap::new()),
            root: RwLock::new(None),
        }
    }

    /// Number of stored cells.
    pub fn cell_count(&self) -> Result<usize, StoreError> {
        Ok(self
            .cells
            .read()
            .map_err(|_| StoreError::LockPoisoned)?
            .len())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn get(&self, hash: &Hash) -> Option<Ref> {
        self.cells.read().ok()?.get(hash).cloned()
    }

    fn put(&self, value: &Value, status: RefStatus) -> Result<Vec<Value>, StoreError> {
        let mut cells = self.cells.write().map_err(|_| StoreError::LockPoisoned)?;
        let mut novelty = Vec::new();

        let mut write = |v: &Value, s: RefStatus| {
            let h = value_hash(v);
            match cells.get_mut(&h) {
                Some(existing) => {
                    if existing.status < s {
                        *existing = existing.upgrade(s);
                        novelty.push(v.clone());
                    }
                }
                None => {
                    cells.insert(h, Ref::with_status(v.clone(), s));
                    novelty.push(v.clone());
                }
            }
        };

        write(value, status);
        // Children land at least at Stored; the written status carries
        // through so announcement reaches the whole reachable set.
        let child_status = status.max(RefStatus::Stored);
        for child in non_embedded_descendants(value) {
            write(&child, child_status);
        }
        trace!(
            novel = novelty.len(),
            status = ?status,
            "stored cell tree"
        );
        Ok(novelty)
    }

    fn root_hash(&self) -> Result<Option<Hash>, StoreError> {
        Ok(*self.root.read().map_err(|_| StoreError::LockPoisoned)?)
    }

    fn set_root(&self, value: &Value) -> Result<(), StoreError> {
        self.put(value, RefStatus::Persisted)?;
        let mut root = self.root.write().map_err(|_| StoreError::LockPoisoned)?;
        *root = Some(value_hash(value));
        Ok(())
    }
}

impl CellSource for MemoryStore {
    fn get_cell(&self, hash: &Hash) -> Option<Value> {
        self.get(hash).map(|r| r.value)
    }
}
