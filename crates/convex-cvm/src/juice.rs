//! # Juice
//!
//! Cost constants for metered execution. Every op charges a base cost;
//! data constructors scale with element count and big-integer arithmetic
//! scales with operand byte length. The constants are implementation
//! parameters: they bound work, they do not change semantics.

/// Hard ceiling on juice for a single transaction.
pub const MAX_TRANSACTION_JUICE: u64 = 10_000_000;

/// Flat juice charged to every transaction on top of execution.
pub const BASE_TRANSACTION_JUICE: u64 = 500;

/// Maximum call depth within one transaction.
pub const MAX_DEPTH: u32 = 256;

/// Per-operation base costs.
pub mod costs {
    /// `Constant` and `Special` ops.
    pub const CONSTANT: u64 = 5;
    /// Local frame reads.
    pub const LOOKUP: u64 = 5;
    /// Dynamic environment lookups.
    pub const LOOKUP_DYNAMIC: u64 = 40;
    /// `Do` sequencing.
    pub const DO: u64 = 5;
    /// `Cond` per test.
    pub const COND: u64 = 10;
    /// `Let` binding forms.
    pub const LET: u64 = 15;
    /// Closure construction.
    pub const LAMBDA: u64 = 20;
    /// Function invocation overhead.
    pub const INVOKE: u64 = 20;
    /// Environment definition.
    pub const DEF: u64 = 100;
    /// Local mutation.
    pub const SET: u64 = 10;
    /// State-restoring query wrapper.
    pub const QUERY: u64 = 20;
    /// Per-form compilation cost.
    pub const COMPILE: u64 = 50;

    /// Data constructor base.
    pub const BUILD_DATA: u64 = 50;
    /// Data constructor per element.
    pub const BUILD_PER_ELEMENT: u64 = 5;

    /// Cheap core functions (predicates, accessors).
    pub const SIMPLE_FN: u64 = 10;
    /// Arithmetic base.
    pub const ARITHMETIC: u64 = 20;
    /// Arithmetic surcharge per big-integer byte.
    pub const NUMERIC_PER_BYTE: u64 = 2;
    /// Structural equality.
    pub const EQUALS: u64 = 10;

    /// Coin transfer.
    pub const TRANSFER: u64 = 200;
    /// Offer acceptance.
    pub const ACCEPT: u64 = 100;
    /// Cross-account call overhead.
    pub const CALL: u64 = 500;
    /// Account creation.
    pub const CREATE_ACCOUNT: u64 = 2_000;
    /// Actor deployment.
    pub const DEPLOY: u64 = 5_000;
    /// Schedule insertion.
    pub const SCHEDULE: u64 = 1_000;
    /// Dynamic evaluation.
    pub const EVAL: u64 = 1_000;
    /// Log emission base.
    pub const LOG: u64 = 100;
    /// Peer management operations.
    pub const PEER_OP: u64 = 1_000;
    /// Memory allowance operations.
    pub const MEMORY_OP: u64 = 100;
}
