//! # Convex Test Suite
//!
//! Unified cross-subsystem tests:
//!
//! ```text
//! tests/src/
//! ├── helpers.rs        # Form builders and network fixtures
//! └── integration/      # End-to-end scenarios and invariants
//!     ├── numeric_tower.rs
//!     ├── transfer.rs
//!     ├── actor_rollback.rs
//!     ├── scheduled.rs
//!     ├── convergence.rs
//!     ├── memory_accounting.rs
//!     ├── encoding_roundtrip.rs
//!     └── determinism.rs
//! ```
//!
//! Run with `cargo test -p convex-tests`.

#![allow(dead_code)]

pub mod helpers;

#[cfg(test)]
mod integration;
