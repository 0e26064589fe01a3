//! # Belief Merge
//!
//! The deterministic, stake-weighted, convergent merge. Incoming orders
//! are adopted when newer and non-regressing; the own ordering beyond
//! the committed prefix is then recomputed by stake-weighted voting at
//! each position, with ties broken by block hash. The proposal point
//! advances where a two-thirds stake does not conflict with the chosen
//! prefix; the consensus point advances where a two-thirds stake
//! explicitly carries the prefix at or past its own proposal point.
//! Consensus never retreats.

use crate::stake::peer_stakes;
use convex_crypto::{verify_signed, KeyPair};
use convex_types::{
    value_hash, AccountKey, Belief, Hash, Order, Record, SignedData, State, Value, Vector,
};
use std::collections::HashMap;
use tracing::trace;

/// Supermajority check: `part` of `total` reaches two thirds.
fn supermajority(part: i64, total: i64) -> bool {
    total > 0 && part * 3 >= total * 2
}

/// Timestamp of a signed block cell, for deterministic straggler order.
fn block_timestamp(v: &Value) -> i64 {
    if let Value::Record(Record::Signed(s)) = v {
        if let Value::Record(Record::Block(b)) = s.value() {
            return b.timestamp();
        }
    }
    i64::MAX
}

/// The order inside a verified signed-order cell.
fn signed_order(signed: &SignedData) -> Option<Order> {
    match signed.value() {
        Value::Record(Record::Order(o)) => Some(o.clone()),
        _ => None,
    }
}

/// Appends a signed block to the own order in a belief, signing the
/// updated order. New blocks sit past the proposal point until merges
/// advance it.
#[must_use]
pub fn propose_block(
    keypair: &KeyPair,
    belief: &Belief,
    signed_block: Value,
    timestamp: i64,
) -> Belief {
    let key = keypair.account_key();
    let current = belief
        .get_order(&key)
        .and_then(|s| signed_order(&s))
        .unwrap_or_else(|| Order::empty(timestamp));
    let next = Order::new(
        current.blocks().conj(signed_block),
        current.proposal_point(),
        current.consensus_point(),
        timestamp,
    );
    let signed = keypair.sign_cell(Value::Record(Record::Order(next)));
    belief.put_order(key, signed)
}

/// Merges incoming beliefs into the own belief and recomputes the own
/// order. Deterministic: the same inputs produce the same belief on
/// every peer.
#[must_use]
pub fn merge_beliefs(
    keypair: &KeyPair,
    state: &State,
    own_belief: &Belief,
    incoming: &[Belief],
    timestamp: i64,
) -> Belief {
    let own_key = keypair.account_key();
    let (stakes, total_stake) = peer_stakes(state);

    // Adopt orders: newer timestamp, valid signature, non-regressing
    // consensus point.
    let mut orders: HashMap<AccountKey, (SignedData, Order)> = HashMap::new();
    for (k, v) in own_belief.orders().entries() {
        if let (Value::AccountKey(key), Value::Record(Record::Signed(s))) = (&k, &v) {
            if let Some(o) = signed_order(s) {
                orders.insert(*key, (s.clone(), o));
            }
        }
    }
    for belief in incoming {
        for (k, v) in belief.orders().entries() {
            let (Value::AccountKey(key), Value::Record(Record::Signed(s))) = (&k, &v) else {
                continue;
            };
            if *s.key() != *key || verify_signed(s).is_err() {
                continue;
            }
            let Some(o) = signed_order(s) else {
                continue;
            };
            let adopt = match orders.get(key) {
                None => true,
                Some((_, current)) => {
                    o.timestamp() > current.timestamp()
                        && o.consensus_point() >= current.consensus_point()
                }
            };
            if adopt {
                orders.insert(*key, (s.clone(), o));
            }
        }
    }

    // The committed prefix is never recomputed.
    let own_current = orders
        .get(&own_key)
        .map(|(_, o)| o.clone())
        .unwrap_or_else(|| Order::empty(timestamp));
    let old_cp = own_current.consensus_point();
    let mut chosen: Vec<Value> = (0..old_cp)
        .map(|i| own_current.blocks().get(i).expect("committed block"))
        .collect();
    let mut chosen_hashes: Vec<Hash> = chosen.iter().map(value_hash).collect();

    // Stake-weighted voting per position beyond the committed prefix.
    let voters: Vec<(&AccountKey, &Order, i64)> = {
        let mut v: Vec<_> = orders
            .iter()
            .map(|(k, (_, o))| (k, o, stakes.get(k).copied().unwrap_or(0)))
            .collect();
        // Deterministic iteration independent of map order.
        v.sort_by_key(|(k, _, _)| **k);
        v
    };

    loop {
        let p = chosen.len() as u64;
        // Weight per candidate block at position p among orders whose
        // prefix matches the chosen one.
        let mut weights: HashMap<Hash, (i64, Value)> = HashMap::new();
        for (_, order, stake) in &voters {
            if order.block_count() <= p {
                continue;
            }
            if !prefix_matches(order, &chosen_hashes, p) {
                continue;
            }
            let block = order.blocks().get(p).expect("bounds checked");
            let h = value_hash(&block);
            let entry = weights.entry(h).or_insert((0, block));
            entry.0 += stake;
        }
        let Some((h, (_, block))) = weights
            .iter()
            .max_by(|(ha, (wa, _)), (hb, (wb, _))| wa.cmp(wb).then(hb.cmp(ha)))
            .map(|(h, e)| (*h, e.clone()))
        else {
            break;
        };
        chosen.push(block);
        chosen_hashes.push(h);
    }

    // Blocks that lost a vote re-queue deterministically after the
    // winners, so no proposal is silently dropped.
    let mut stragglers: Vec<Value> = Vec::new();
    let mut seen: std::collections::HashSet<Hash> = chosen_hashes.iter().copied().collect();
    for (_, order, _) in &voters {
        for b in order.blocks().iter() {
            let h = value_hash(&b);
            if seen.insert(h) {
                stragglers.push(b);
            }
        }
    }
    stragglers.sort_by_key(|b| (block_timestamp(b), value_hash(b)));
    for b in stragglers {
        chosen_hashes.push(value_hash(&b));
        chosen.push(b);
    }

    // Proposal point: furthest prefix no supermajority conflicts with.
    let mut proposal_point = 0u64;
    for p in (old_cp..=chosen.len() as u64).rev() {
        let agree: i64 = stakes
            .iter()
            .map(|(k, stake)| {
                match orders.get(k) {
                    // Unknown orders cannot conflict.
                    None => *stake,
                    Some((_, o)) => {
                        let depth = p.min(o.block_count());
                        if prefix_matches(o, &chosen_hashes, depth) {
                            *stake
                        } else {
                            0
                        }
                    }
                }
            })
            .sum();
        if supermajority(agree, total_stake) {
            proposal_point = p;
            break;
        }
    }
    let proposal_point = proposal_point.max(old_cp);

    // Consensus point: furthest prefix a supermajority explicitly
    // carries at or past its own proposal point. The own vote uses the
    // proposal point just computed. Monotonic.
    let mut consensus_point = old_cp;
    for p in (old_cp..=proposal_point).rev() {
        let carry: i64 = stakes
            .iter()
            .map(|(k, stake)| {
                if *k == own_key {
                    // The chosen ordering is the own order by
                    // construction; the own vote uses the fresh
                    // proposal point.
                    return if proposal_point >= p { *stake } else { 0 };
                }
                match orders.get(k) {
                    Some((_, o))
                        if o.proposal_point() >= p
                            && o.block_count() >= p
                            && prefix_matches(o, &chosen_hashes, p) =>
                    {
                        *stake
                    }
                    _ => 0,
                }
            })
            .sum();
        if supermajority(carry, total_stake) {
            consensus_point = p.max(old_cp);
            break;
        }
    }

    // Re-sign only when the order substantively changed; otherwise the
    // existing signed order stands and quiet networks stay quiet.
    let unchanged = orders.get(&own_key).is_some_and(|(_, o)| {
        o.proposal_point() == proposal_point
            && o.consensus_point() == consensus_point
            && o.block_count() == chosen.len() as u64
            && prefix_matches(o, &chosen_hashes, chosen.len() as u64)
    });
    let signed = if unchanged {
        orders.get(&own_key).expect("own order present").0.clone()
    } else {
        let next_order = Order::new(
            Vector::from_values(chosen),
            proposal_point,
            consensus_point,
            timestamp,
        );
        trace!(
            blocks = next_order.block_count(),
            pp = proposal_point,
            cp = consensus_point,
            "merged belief"
        );
        keypair.sign_cell(Value::Record(Record::Order(next_order)))
    };

    let mut belief = Belief::empty();
    for (key, (s, _)) in orders {
        if key != own_key {
            belief = belief.put_order(key, s);
        }
    }
    belief.put_order(own_key, signed)
}

/// Whether an order's first `depth` blocks equal the chosen prefix.
fn prefix_matches(order: &Order, chosen_hashes: &[Hash], depth: u64) -> bool {
    if order.block_count() < depth || chosen_hashes.len() < depth as usize {
        return false;
    }
    for i in 0..depth {
        let b = order.blocks().get(i).expect("bounds checked");
        if value_hash(&b) != chosen_hashes[i as usize] {
            return false;
        }
    }
    true
}
