//! Scenario: consensus convergence. Five equal-stake peers exchange
//! beliefs; after one round every order carries the proposed block at
//! the proposal point, after two rounds it is committed everywhere, and
//! every peer's application of it yields an identical state hash.

use crate::helpers::{state_value, Net};
use convex_consensus::{merge_beliefs, propose_block};
use convex_crypto::KeyPair;
use convex_transition::apply_block;
use convex_types::{Belief, Order, Record, Value};

fn own_order(belief: &Belief, kp: &KeyPair) -> Order {
    let signed = belief.get_order(&kp.account_key()).expect("own order");
    match signed.value() {
        Value::Record(Record::Order(o)) => o.clone(),
        _ => panic!("not an order"),
    }
}

fn round(net: &Net, beliefs: &[Belief], timestamp: i64) -> Vec<Belief> {
    net.keypairs
        .iter()
        .enumerate()
        .map(|(i, kp)| {
            let incoming: Vec<Belief> = beliefs
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, b)| b.clone())
                .collect();
            merge_beliefs(kp, &net.state, &beliefs[i], &incoming, timestamp)
        })
        .collect()
}

#[test]
fn test_five_peers_converge_to_identical_state() {
    let net = Net::new(5);
    let mut beliefs: Vec<Belief> = (0..5).map(|_| Belief::empty()).collect();

    // Peer 0 proposes a block with a real transaction.
    let block = net.block(0, 1_000, vec![net.transfer(0, 1, net.user(1), 777)]);
    beliefs[0] = propose_block(
        &net.keypairs[0],
        &beliefs[0],
        Value::Record(Record::Signed(block)),
        1,
    );

    // Round 1: proposal visible everywhere.
    beliefs = round(&net, &beliefs, 2);
    for (i, kp) in net.keypairs.iter().enumerate() {
        let order = own_order(&beliefs[i], kp);
        assert_eq!(order.block_count(), 1, "peer {i}");
        assert!(order.proposal_point() >= 1, "peer {i}");
    }

    // Round 2: committed everywhere.
    beliefs = round(&net, &beliefs, 3);
    for (i, kp) in net.keypairs.iter().enumerate() {
        assert!(own_order(&beliefs[i], kp).consensus_point() >= 1, "peer {i}");
    }

    // Every peer applies its committed block; state hashes agree.
    let mut hashes = Vec::new();
    for (i, kp) in net.keypairs.iter().enumerate() {
        let order = own_order(&beliefs[i], kp);
        let Some(Value::Record(Record::Signed(signed_block))) = order.blocks().get(0) else {
            panic!("committed block present");
        };
        let result = apply_block(&net.state, &signed_block);
        assert!(result.invalid_reason.is_none(), "peer {i}");
        hashes.push(state_value(&result.state).cell_hash());
    }
    assert!(
        hashes.windows(2).all(|w| w[0] == w[1]),
        "replicas diverged: {hashes:?}"
    );
}
