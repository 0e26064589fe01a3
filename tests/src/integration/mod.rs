//! End-to-end scenarios and cross-subsystem invariants.

mod actor_rollback;
mod convergence;
mod determinism;
mod encoding_roundtrip;
mod memory_accounting;
mod numeric_tower;
mod peer_pipeline;
mod scheduled;
mod transfer;
