//! Stake extraction: effective stake per peer from the consensus state.

use convex_types::{AccountKey, Record, State, Value};
use std::collections::HashMap;

/// Effective stake per peer key, and the total.
#[must_use]
pub fn peer_stakes(state: &State) -> (HashMap<AccountKey, i64>, i64) {
    let mut stakes = HashMap::new();
    let mut total = 0i64;
    for (key, value) in state.peers().entries() {
        let (Value::AccountKey(k), Value::Record(Record::Peer(p))) = (&key, &value) else {
            continue;
        };
        let stake = p.total_stake();
        if stake > 0 {
            stakes.insert(*k, stake);
            total += stake;
        }
    }
    (stakes, total)
}
