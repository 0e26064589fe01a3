//! # Memory Size
//!
//! The memory size of a cell is its own encoding length plus the memory
//! size of every non-embedded child; embedded children cost nothing on
//! their own because their bytes are absorbed into the parent encoding.
//! Memory deltas between states drive the allowance and pool accounting
//! at transaction settlement.

use crate::encoding::{cell_meta, children, is_embedded, value_encoding};
use crate::value::Value;

/// Memory size of a cell tree in bytes.
#[must_use]
pub fn memory_size(v: &Value) -> u64 {
    if let Some(meta) = cell_meta(v) {
        *meta.mem.get_or_init(|| compute_memory_size(v))
    } else {
        compute_memory_size(v)
    }
}

fn compute_memory_size(v: &Value) -> u64 {
    let mut total = value_encoding(v).len() as u64;
    for child in children(v) {
        if !is_embedded(&child) {
            total += memory_size(&child);
        }
    }
    total
}
