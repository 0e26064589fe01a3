//! # Convex Transition - The State-Transition Function
//!
//! Given the previous state and a signed block, produce the next state
//! plus per-transaction results. Application is a pure function:
//! replaying the same `(state, block)` pair yields a bit-identical
//! state.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod block;
mod transaction;

pub use block::{apply_block, BlockResult};
pub use transaction::apply_transaction;
