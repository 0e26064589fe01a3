//! # Convex State - World-State Construction and Economics
//!
//! Genesis assembly, the constant-product memory pool, schedule
//! draining and the total-funds audit. The state itself is a record
//! cell defined in `convex-types`; this crate owns the economics that
//! create and evolve it outside transaction execution.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod genesis;
pub mod pool;
pub mod schedule;

pub use constants::*;
pub use genesis::{genesis, GenesisConfig};
pub use pool::{pool_buy, pool_sell, swap_price, PoolError};
pub use schedule::{drain_schedule, ScheduledOp};

use convex_types::{Record, State, Value};

/// Total funds visible in a state: account balances, peer stakes and
/// delegations, accumulated fees and the coin side of the memory pool.
/// Every reachable state must conserve `MAX_SUPPLY` exactly.
#[must_use]
pub fn compute_total_funds(state: &State) -> i64 {
    let mut total: i64 = 0;
    for v in state.accounts().iter() {
        if let Value::Record(Record::Account(a)) = v {
            total += a.balance();
        }
    }
    for (_, v) in state.peers().entries() {
        if let Value::Record(Record::Peer(p)) = v {
            total += p.total_stake();
        }
    }
    total += state.globals().fees;
    total += state.globals().pool_value;
    total
}
