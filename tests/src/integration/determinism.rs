//! Determinism and sequence invariants: block application is a pure
//! function, and sequences advance exactly with executed transactions.

use crate::helpers::{lst, state_value, sym, Net};
use convex_state::{compute_total_funds, MAX_SUPPLY};
use convex_transition::apply_block;
use convex_types::Value;

#[test]
fn test_apply_block_is_pure() {
    let net = Net::new(3);
    let block = net.block(
        0,
        5_000,
        vec![
            net.transfer(0, 1, net.user(1), 1234),
            net.invoke(1, 1, lst(vec![sym("def"), sym("x"), Value::Long(1)])),
            net.transfer(2, 1, net.user(0), 99),
        ],
    );
    let a = apply_block(&net.state, &block);
    let b = apply_block(&net.state, &block);
    assert_eq!(
        state_value(&a.state).cell_hash(),
        state_value(&b.state).cell_hash()
    );
    assert_eq!(a.results.len(), b.results.len());
    for (ra, rb) in a.results.iter().zip(&b.results) {
        assert_eq!(ra.value(), rb.value());
        assert_eq!(ra.error_code(), rb.error_code());
    }
}

#[test]
fn test_sequences_advance_exactly() {
    let net = Net::new(2);
    let block = net.block(
        0,
        1_000,
        vec![
            net.transfer(0, 1, net.user(1), 10),
            net.transfer(0, 2, net.user(1), 10),
            // Stale sequence: rejected without touching the account.
            net.transfer(0, 2, net.user(1), 10),
            net.transfer(1, 1, net.user(0), 10),
        ],
    );
    let result = apply_block(&net.state, &block);
    assert!(!result.results[0].is_error());
    assert!(!result.results[1].is_error());
    assert!(result.results[2].is_error());
    assert!(!result.results[3].is_error());
    assert_eq!(result.state.get_account(net.user(0)).unwrap().sequence(), 2);
    assert_eq!(result.state.get_account(net.user(1)).unwrap().sequence(), 1);
}

#[test]
fn test_juice_bounded_and_supply_conserved() {
    let net = Net::new(1);
    // A deliberately heavy computation that runs into the juice limit.
    let heavy = lst(vec![
        sym("loop"),
        crate::helpers::vec_form(vec![sym("i"), Value::Long(0)]),
        lst(vec![sym("recur"), lst(vec![sym("inc"), sym("i")])]),
    ]);
    let result = apply_block(&net.state, &net.block(0, 1_000, vec![net.invoke(0, 1, heavy)]));
    let tx = &result.results[0];
    assert!(tx.is_error());
    assert_eq!(tx.error_code(), Some(&Value::keyword("JUICE")));
    // Even a juice abort conserves the total supply.
    assert_eq!(compute_total_funds(&result.state), MAX_SUPPLY);
}
