//! Scenario: a coin transfer through the full block pipeline, with
//! supply conservation.

use crate::helpers::Net;
use convex_state::{compute_total_funds, MAX_SUPPLY};
use convex_transition::apply_block;

#[test]
fn test_transfer_settles_and_conserves_supply() {
    let net = Net::new(2);
    let hero = net.user(0);
    let villain = net.user(1);
    let hero_before = net.state.get_account(hero).unwrap().balance();
    let villain_before = net.state.get_account(villain).unwrap().balance();

    let block = net.block(0, 1_000, vec![net.transfer(0, 1, villain, 1000)]);
    let result = apply_block(&net.state, &block);
    assert!(result.invalid_reason.is_none());
    assert!(!result.results[0].is_error(), "{:?}", result.results[0]);

    let hero_after = result.state.get_account(hero).unwrap().balance();
    let villain_after = result.state.get_account(villain).unwrap().balance();

    // Villain gains exactly the transfer; hero loses it plus juice and
    // any marginal memory purchase.
    assert_eq!(villain_after, villain_before + 1000);
    let cost = hero_before - 1000 - hero_after;
    assert!(cost > 0, "juice must be charged");
    let pool_gain = result.state.globals().pool_value - net.state.globals().pool_value;
    assert_eq!(cost, result.state.globals().fees + pool_gain);
    assert!(result.state.globals().fees > 0);

    // Balances + fees + stakes + pool value = the full supply.
    assert_eq!(compute_total_funds(&result.state), MAX_SUPPLY);
}

#[test]
fn test_supply_conserved_across_many_blocks() {
    let net = Net::new(2);
    let mut state = net.state.clone();
    for n in 0..5 {
        let block = net.block(
            0,
            1_000 * (n + 1),
            vec![net.transfer(0, n + 1, net.user(1), 100 * (n + 1))],
        );
        let result = apply_block(&state, &block);
        assert!(result.invalid_reason.is_none());
        state = result.state;
        assert_eq!(compute_total_funds(&state), MAX_SUPPLY);
    }
}
