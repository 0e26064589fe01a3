//! Protocol constants used by state construction and block transition.

pub use convex_types::MAX_SUPPLY;

/// Coin price per unit of juice at genesis.
pub const INITIAL_JUICE_PRICE: i64 = 2;

/// Minimum total stake for a peer's blocks to be accepted.
pub const MINIMUM_EFFECTIVE_STAKE: i64 = 1_000_000;

/// Maximum transactions accepted in one block.
pub const MAX_TRANSACTIONS_PER_BLOCK: usize = 1_024;

/// Maximum scheduled ops drained per block.
pub const MAX_SCHEDULED_TRANSACTIONS_PER_BLOCK: usize = 100;

/// Interval in milliseconds between memory pool growth steps.
pub const MEMORY_POOL_GROWTH_INTERVAL: i64 = 300_000;

/// Bytes added to the pool allocation per growth step.
pub const MEMORY_POOL_GROWTH: i64 = 1_000_000;

/// Memory pool allocation at genesis, in bytes.
pub const INITIAL_POOL_MEMORY: i64 = 1_000_000_000;

/// Coin value held by the memory pool at genesis.
pub const INITIAL_POOL_VALUE: i64 = 1_000_000_000_000;

/// Fresh juice limit for each scheduled op execution.
pub const SCHEDULED_OP_JUICE: u64 = 1_000_000;
