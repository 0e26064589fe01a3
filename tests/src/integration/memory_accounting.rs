//! Scenario: memory accounting. State growth consumes allowance first,
//! then buys from the pool; an unaffordable purchase rolls the whole
//! transaction back while juice fees stand.

use crate::helpers::{lst, sym, Net};
use convex_transition::apply_block;
use convex_types::Value;

/// A definition that grows the account environment by roughly a
/// megabyte.
fn grow_form() -> Value {
    lst(vec![
        sym("def"),
        sym("payload"),
        Value::string(&"m".repeat(1_000_000)),
    ])
}

#[test]
fn test_allowance_consumed_first() {
    let net = Net::new(1);
    let origin = net.user(0);
    // Grant a 2 MB allowance up front.
    let acct = net.state.get_account(origin).unwrap().with_memory(2_000_000);
    let state = net.state.put_account(origin, acct).unwrap();
    let pool_before = state.globals().pool_memory;

    let result = apply_block(&state, &net.block(0, 1_000, vec![net.invoke(0, 1, grow_form())]));
    assert!(!result.results[0].is_error(), "{:?}", result.results[0]);

    let after = result.state.get_account(origin).unwrap();
    // Allowance decremented by at least the payload size.
    assert!(after.memory() <= 2_000_000 - 1_000_000);
    // Pool untouched.
    assert_eq!(result.state.globals().pool_memory, pool_before);
}

#[test]
fn test_pool_purchase_with_zero_allowance() {
    let net = Net::new(1);
    let origin = net.user(0);
    let balance_before = net.state.get_account(origin).unwrap().balance();
    let pool_before = net.state.globals().pool_memory;

    let result =
        apply_block(&net.state, &net.block(0, 1_000, vec![net.invoke(0, 1, grow_form())]));
    assert!(!result.results[0].is_error(), "{:?}", result.results[0]);

    // The pool shrank and was paid for.
    assert!(result.state.globals().pool_memory < pool_before);
    assert!(result.state.globals().pool_value > net.state.globals().pool_value);
    let after = result.state.get_account(origin).unwrap();
    assert!(after.balance() < balance_before);
}

#[test]
fn test_unaffordable_memory_rolls_back_but_charges_juice() {
    let net = Net::new(1);
    let origin = net.user(0);
    // Drain the account down to a tiny balance that can pay for juice
    // but not for a megabyte of pool memory.
    let acct = net.state.get_account(origin).unwrap().with_balance(5_000_000);
    let state = net.state.put_account(origin, acct).unwrap();
    let balance_before = 5_000_000;

    let result = apply_block(&state, &net.block(0, 1_000, vec![net.invoke(0, 1, grow_form())]));
    let tx_result = &result.results[0];
    assert!(tx_result.is_error());
    assert_eq!(tx_result.error_code(), Some(&Value::keyword("MEMORY")));

    let after = result.state.get_account(origin).unwrap();
    // The definition was rolled back.
    assert_eq!(after.environment().get(&sym("payload")), None);
    // Juice fees were still paid.
    assert!(after.balance() < balance_before);
    assert!(result.state.globals().fees > 0);
    // Pool untouched by the failed purchase.
    assert_eq!(result.state.globals().pool_memory, state.globals().pool_memory);
}
