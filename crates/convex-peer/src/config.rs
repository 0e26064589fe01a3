//! Peer configuration.

use serde::{Deserialize, Serialize};

/// Tunable parameters for the peer loops.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Minimum interval between belief broadcasts, in milliseconds.
    pub belief_broadcast_min_ms: u64,
    /// Interval between full-belief broadcasts, in milliseconds.
    pub full_broadcast_ms: u64,
    /// Rebroadcast the current belief after this idle time, in
    /// milliseconds.
    pub rebroadcast_idle_ms: u64,
    /// Interval between block production attempts, in milliseconds.
    pub block_interval_ms: u64,
    /// Target outbound connection count.
    pub target_connections: usize,
    /// Interval between connection maintenance passes, in milliseconds.
    pub connection_interval_ms: u64,
    /// Bounded channel capacity for peer queues.
    pub channel_capacity: usize,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            belief_broadcast_min_ms: 10,
            full_broadcast_ms: 500,
            rebroadcast_idle_ms: 300,
            block_interval_ms: 100,
            target_connections: 8,
            connection_interval_ms: 1_000,
            channel_capacity: 1_024,
        }
    }
}
