//! # Convex Consensus - Convergent Ordering
//!
//! Peers gossip beliefs: maps from peer key to the latest signed order
//! seen from that peer. Merging is deterministic and stake-weighted, so
//! repeated exchange without equivocation converges every honest peer
//! onto one monotonic committed sequence of blocks.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod merge;
mod stake;

pub use merge::{merge_beliefs, propose_block};
pub use stake::peer_stakes;
