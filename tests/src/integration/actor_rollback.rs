//! Scenario: an actor accepts an offer and then fails. The entire
//! forked state, including the offer debit, is discarded; juice fees
//! still apply.

use crate::helpers::{kw, lst, sym, vec_form, Net};
use convex_transition::apply_block;
use convex_types::{Map, Value};

/// Deployment form for an actor exporting `receive-coin` that accepts
/// the full amount and then fails with `:NOPE`.
fn failing_actor_form() -> Value {
    let callable = Value::Map(Map::empty().assoc(kw("callable?"), Value::Bool(true)));
    let receive = lst(vec![
        sym("def"),
        sym("receive-coin"),
        lst(vec![
            sym("syntax"),
            lst(vec![
                sym("fn"),
                vec_form(vec![sym("amount")]),
                lst(vec![
                    sym("do"),
                    lst(vec![sym("accept"), sym("amount")]),
                    lst(vec![sym("fail"), kw("NOPE")]),
                ]),
            ]),
            callable,
        ]),
    ]);
    lst(vec![sym("deploy"), lst(vec![sym("quote"), receive])])
}

#[test]
fn test_offer_rolled_back_on_actor_failure() {
    let net = Net::new(1);
    let hero = net.user(0);

    // Block 1: deploy the actor.
    let deploy_block = net.block(0, 1_000, vec![net.invoke(0, 1, failing_actor_form())]);
    let deployed = apply_block(&net.state, &deploy_block);
    assert!(!deployed.results[0].is_error(), "{:?}", deployed.results[0]);
    let Value::Address(actor) = deployed.results[0].value().clone() else {
        panic!("deploy yields the actor address");
    };
    let actor_balance_before = deployed.state.get_account(actor).unwrap().balance();
    let hero_balance_before = deployed.state.get_account(hero).unwrap().balance();

    // Block 2: call with an offer of 500.
    let call_form = lst(vec![
        sym("call"),
        Value::Address(actor),
        Value::Long(500),
        sym("receive-coin"),
        Value::Long(500),
    ]);
    let call_block = net.block(0, 2_000, vec![net.invoke(0, 2, call_form)]);
    let called = apply_block(&deployed.state, &call_block);

    // The result is the :NOPE error.
    let result = &called.results[0];
    assert!(result.is_error());
    assert_eq!(result.error_code(), Some(&kw("NOPE")));

    // Actor balance unchanged; hero lost exactly the juice fee — the
    // offer itself came back with the rollback.
    assert_eq!(
        called.state.get_account(actor).unwrap().balance(),
        actor_balance_before
    );
    let hero_after = called.state.get_account(hero).unwrap().balance();
    let lost = hero_balance_before - hero_after;
    let fee = called.state.globals().fees - deployed.state.globals().fees;
    assert!(lost > 0, "juice fees apply");
    assert_eq!(lost, fee, "only juice was lost");
}
