//! Scenario: scheduled execution. A transaction schedules a definition
//! for a future timestamp; a later block drains and runs it.

use crate::helpers::{lst, sym, Net};
use convex_transition::apply_block;
use convex_types::Value;

#[test]
fn test_schedule_runs_in_later_block() {
    let net = Net::new(1);
    let origin = net.user(0);

    // Block at T: (schedule (+ *timestamp* 1000) (def a 42))
    let schedule_form = lst(vec![
        sym("schedule"),
        lst(vec![sym("+"), sym("*timestamp*"), Value::Long(1000)]),
        lst(vec![sym("def"), sym("a"), Value::Long(42)]),
    ]);
    let t = 10_000;
    let first = apply_block(
        &net.state,
        &net.block(0, t, vec![net.invoke(0, 1, schedule_form)]),
    );
    assert!(!first.results[0].is_error(), "{:?}", first.results[0]);
    assert_eq!(first.state.schedule().count(), 1);
    // Not yet defined.
    assert_eq!(
        first
            .state
            .get_account(origin)
            .unwrap()
            .environment()
            .get(&sym("a")),
        None
    );

    // A block at T+2000 drains and executes the entry.
    let second = apply_block(&first.state, &net.block(0, t + 2000, vec![]));
    assert!(second.invalid_reason.is_none());
    assert_eq!(second.state.schedule().count(), 0);
    assert_eq!(
        second
            .state
            .get_account(origin)
            .unwrap()
            .environment()
            .get(&sym("a")),
        Some(Value::Long(42))
    );
}

#[test]
fn test_schedule_not_due_stays() {
    let net = Net::new(1);
    let schedule_form = lst(vec![
        sym("schedule"),
        lst(vec![sym("+"), sym("*timestamp*"), Value::Long(1_000_000)]),
        lst(vec![sym("def"), sym("a"), Value::Long(1)]),
    ]);
    let first = apply_block(
        &net.state,
        &net.block(0, 1_000, vec![net.invoke(0, 1, schedule_form)]),
    );
    let second = apply_block(&first.state, &net.block(0, 2_000, vec![]));
    assert_eq!(second.state.schedule().count(), 1);
}
