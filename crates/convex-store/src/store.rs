//! Storage port: the trait every store backend implements.

use convex_types::{Hash, Ref, RefStatus, Value};
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A lock guarding the backing map was poisoned.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// The store has no root set.
    #[error("no root hash set")]
    MissingRoot,

    /// A referenced cell is not present.
    #[error("missing cell: {0}")]
    MissingCell(Hash),
}

/// A content-addressed `Hash -> Cell` map with per-entry status.
pub trait Store: Send + Sync {
    /// The ref for a hash, if stored.
    fn get(&self, hash: &Hash) -> Option<Ref>;

    /// Stores a cell and its non-embedded descendants at `status`
    /// (children at least `Stored`). Returns the cells that first reached
    /// `status` in this write, parents before children.
    fn put(&self, value: &Value, status: RefStatus) -> Result<Vec<Value>, StoreError>;

    /// The current root hash, if any.
    fn root_hash(&self) -> Result<Option<Hash>, StoreError>;

    /// Persists a cell and makes it the root. Recovery reads the root
    /// back and deserializes from there.
    fn set_root(&self, value: &Value) -> Result<(), StoreError>;
}
