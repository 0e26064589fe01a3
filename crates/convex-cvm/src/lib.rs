//! # Convex CVM - Deterministic Metered Execution
//!
//! The virtual machine: a tree-walking op evaluator over an explicit
//! execution context. Every operation charges juice, call depth is
//! bounded, and all non-local control — errors, recur, tailcall,
//! return, halt, rollback, reduced — travels as values in the context,
//! never as host-language unwinds.
//!
//! ## Components
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `context` | Per-transaction execution context |
//! | `exec` | Op evaluator, trampoline, cross-account calls |
//! | `compile` | Form expansion and compilation to ops |
//! | `runtime` | The native core function library |
//! | `env` | Account environments and the core library account |
//! | `juice` | Cost table and execution bounds |
//! | `errors` | Error values and exceptional results |

#![warn(clippy::all)]

pub mod compile;
pub mod context;
pub mod env;
pub mod errors;
pub mod exec;
pub mod juice;
pub mod runtime;

pub use compile::{compile, compile_with, eval_form, ExpanderStack};
pub use context::Context;
pub use env::{core_environment, lookup_value, CORE_ADDRESS};
pub use errors::{codes, ErrorValue, Exceptional};
pub use exec::{actor_call, apply, execute};

#[cfg(test)]
mod tests {
    use super::*;
    use convex_types::{
        AccountKey, AccountStatus, Address, BlobMap, Globals, List, Record, State, Value, Vector,
    };

    /// A minimal state: core account at #0, two user accounts.
    fn test_state() -> State {
        let core = AccountStatus::new_actor().with_environment(core_environment());
        let alice = AccountStatus::new_user(AccountKey::new([1u8; 32]), 1_000_000);
        let bob = AccountStatus::new_user(AccountKey::new([2u8; 32]), 500_000);
        let accounts = Vector::from_values(vec![
            Value::Record(Record::Account(core)),
            Value::Record(Record::Account(alice)),
            Value::Record(Record::Account(bob)),
        ]);
        let globals = Globals {
            timestamp: 100,
            fees: 0,
            juice_price: 2,
            pool_memory: 1_000_000,
            pool_value: 1_000_000,
            protocol: Value::Nil,
        };
        State::new(accounts, BlobMap::empty(), globals, BlobMap::empty())
    }

    const ALICE: Address = Address::new(1);
    const BOB: Address = Address::new(2);

    fn eval(ctx: &mut Context, form: Value) -> Value {
        eval_form(ctx, &form);
        assert!(
            ctx.is_live(),
            "unexpected exception: {:?}",
            ctx.exception()
        );
        ctx.result().clone()
    }

    fn list(items: Vec<Value>) -> Value {
        Value::List(List::from_values(items))
    }

    fn sym(s: &str) -> Value {
        Value::symbol(s)
    }

    #[test]
    fn test_addition_via_eval() {
        let mut ctx = Context::new(test_state(), ALICE, 1_000_000);
        let v = eval(&mut ctx, list(vec![sym("+"), Value::Long(1), Value::Long(2)]));
        assert_eq!(v, Value::Long(3));
        assert!(ctx.juice_used() > 0);
    }

    #[test]
    fn test_overflow_promotes_to_bigint() {
        let mut ctx = Context::new(test_state(), ALICE, 1_000_000);
        let v = eval(
            &mut ctx,
            list(vec![sym("+"), Value::Long(i64::MAX), Value::Long(1)]),
        );
        assert!(matches!(v, Value::BigInt(_)));
    }

    #[test]
    fn test_transfer_moves_balance() {
        let mut ctx = Context::new(test_state(), ALICE, 1_000_000);
        let v = eval(
            &mut ctx,
            list(vec![sym("transfer"), Value::Address(BOB), Value::Long(1000)]),
        );
        assert_eq!(v, Value::Long(1000));
        assert_eq!(ctx.balance_of(ALICE), Some(999_000));
        assert_eq!(ctx.balance_of(BOB), Some(501_000));
    }

    #[test]
    fn test_transfer_insufficient_funds() {
        let mut ctx = Context::new(test_state(), ALICE, 1_000_000);
        eval_form(
            &mut ctx,
            &list(vec![
                sym("transfer"),
                Value::Address(BOB),
                Value::Long(10_000_000),
            ]),
        );
        let err = ctx.exception().unwrap().as_error().unwrap();
        assert!(err.is_code(codes::FUNDS));
        // No partial state change.
        assert_eq!(ctx.balance_of(ALICE), Some(1_000_000));
    }

    #[test]
    fn test_def_and_lookup() {
        let mut ctx = Context::new(test_state(), ALICE, 1_000_000);
        eval(&mut ctx, list(vec![sym("def"), sym("x"), Value::Long(7)]));
        let v = eval(&mut ctx, sym("x"));
        assert_eq!(v, Value::Long(7));
    }

    #[test]
    fn test_undeclared_symbol() {
        let mut ctx = Context::new(test_state(), ALICE, 1_000_000);
        eval_form(&mut ctx, &sym("no-such-symbol"));
        let err = ctx.exception().unwrap().as_error().unwrap();
        assert!(err.is_code(codes::UNDECLARED));
    }

    #[test]
    fn test_closure_and_recur() {
        let mut ctx = Context::new(test_state(), ALICE, 1_000_000);
        // (def sum (fn [n acc] (if (== n 0) acc (recur (dec n) (+ acc n)))))
        eval(
            &mut ctx,
            list(vec![
                sym("def"),
                sym("sum"),
                list(vec![
                    sym("fn"),
                    Value::Vector(Vector::from_values(vec![sym("n"), sym("acc")])),
                    list(vec![
                        sym("if"),
                        list(vec![sym("=="), sym("n"), Value::Long(0)]),
                        sym("acc"),
                        list(vec![
                            sym("recur"),
                            list(vec![sym("dec"), sym("n")]),
                            list(vec![sym("+"), sym("acc"), sym("n")]),
                        ]),
                    ]),
                ]),
            ]),
        );
        let v = eval(
            &mut ctx,
            list(vec![sym("sum"), Value::Long(100), Value::Long(0)]),
        );
        assert_eq!(v, Value::Long(5050));
    }

    #[test]
    fn test_loop_recur() {
        let mut ctx = Context::new(test_state(), ALICE, 1_000_000);
        // (loop [i 0] (if (< i 5) (recur (inc i)) i))
        let v = eval(
            &mut ctx,
            list(vec![
                sym("loop"),
                Value::Vector(Vector::from_values(vec![sym("i"), Value::Long(0)])),
                list(vec![
                    sym("if"),
                    list(vec![sym("<"), sym("i"), Value::Long(5)]),
                    list(vec![sym("recur"), list(vec![sym("inc"), sym("i")])]),
                    sym("i"),
                ]),
            ]),
        );
        assert_eq!(v, Value::Long(5));
    }

    #[test]
    fn test_juice_exhaustion_is_uncatchable() {
        let mut ctx = Context::new(test_state(), ALICE, 200);
        // An infinite loop must die on juice, not hang.
        eval_form(
            &mut ctx,
            &list(vec![
                sym("loop"),
                Value::Vector(Vector::empty()),
                list(vec![sym("recur")]),
            ]),
        );
        let err = ctx.exception().unwrap().as_error().unwrap();
        assert!(err.is_code(codes::JUICE));
        assert_eq!(ctx.juice_used(), 200);
    }

    #[test]
    fn test_halt_keeps_result() {
        let mut ctx = Context::new(test_state(), ALICE, 1_000_000);
        eval_form(
            &mut ctx,
            &list(vec![
                sym("do"),
                list(vec![sym("halt"), Value::Long(9)]),
                Value::Long(1),
            ]),
        );
        // Halt is caught at the transaction boundary; here it remains as
        // the pending exceptional.
        assert!(matches!(
            ctx.exception(),
            Some(Exceptional::Halt(Value::Long(9)))
        ));
    }

    #[test]
    fn test_specials() {
        let mut ctx = Context::new(test_state(), ALICE, 1_000_000);
        assert_eq!(eval(&mut ctx, sym("*address*")), Value::Address(ALICE));
        assert_eq!(eval(&mut ctx, sym("*origin*")), Value::Address(ALICE));
        assert_eq!(eval(&mut ctx, sym("*caller*")), Value::Nil);
        assert_eq!(eval(&mut ctx, sym("*timestamp*")), Value::Long(100));
        assert_eq!(eval(&mut ctx, sym("*balance*")), Value::Long(1_000_000));
    }

    #[test]
    fn test_deploy_and_call_with_offer_rollback() {
        let mut ctx = Context::new(test_state(), ALICE, 2_000_000);
        // Deploy an actor exporting receive-coin, which accepts the
        // offer and then fails.
        let receive = list(vec![
            sym("def"),
            sym("receive-coin"),
            list(vec![
                sym("syntax"),
                list(vec![
                    sym("fn"),
                    Value::Vector(Vector::from_values(vec![sym("amount")])),
                    list(vec![
                        sym("do"),
                        list(vec![sym("accept"), sym("amount")]),
                        list(vec![sym("fail"), Value::keyword("NOPE")]),
                    ]),
                ]),
                Value::Map(convex_types::Map::empty().assoc(
                    Value::keyword("callable?"),
                    Value::Bool(true),
                )),
            ]),
        ]);
        let actor = eval(&mut ctx, list(vec![sym("deploy"), list(vec![sym("quote"), receive])]));
        let Value::Address(actor_addr) = actor else {
            panic!("deploy returns an address");
        };

        let balance_before = ctx.balance_of(ALICE).unwrap();
        eval_form(
            &mut ctx,
            &list(vec![
                sym("call"),
                Value::Address(actor_addr),
                Value::Long(500),
                sym("receive-coin"),
                Value::Long(500),
            ]),
        );
        // The error surfaces, and the caller is made whole.
        let err = ctx.exception().unwrap().as_error().unwrap().clone();
        assert_eq!(err.code, Value::keyword("NOPE"));
        assert_eq!(ctx.balance_of(ALICE), Some(balance_before));
        assert_eq!(ctx.balance_of(actor_addr), Some(0));
    }

    #[test]
    fn test_call_with_offer_accept_keeps_funds() {
        let mut ctx = Context::new(test_state(), ALICE, 2_000_000);
        let take = list(vec![
            sym("def"),
            sym("take"),
            list(vec![
                sym("syntax"),
                list(vec![
                    sym("fn"),
                    Value::Vector(Vector::from_values(vec![sym("amount")])),
                    list(vec![sym("accept"), sym("amount")]),
                ]),
                Value::Map(convex_types::Map::empty().assoc(
                    Value::keyword("callable?"),
                    Value::Bool(true),
                )),
            ]),
        ]);
        let actor = eval(&mut ctx, list(vec![sym("deploy"), list(vec![sym("quote"), take])]));
        let Value::Address(actor_addr) = actor else {
            panic!("deploy returns an address");
        };
        let before = ctx.balance_of(ALICE).unwrap();
        // Offer 500, accept 300: the unused 200 comes back.
        let v = eval(
            &mut ctx,
            list(vec![
                sym("call"),
                Value::Address(actor_addr),
                Value::Long(500),
                sym("take"),
                Value::Long(300),
            ]),
        );
        assert_eq!(v, Value::Long(300));
        assert_eq!(ctx.balance_of(ALICE), Some(before - 300));
        assert_eq!(ctx.balance_of(actor_addr), Some(300));
    }

    #[test]
    fn test_query_restores_state() {
        let mut ctx = Context::new(test_state(), ALICE, 1_000_000);
        let before = ctx.balance_of(ALICE).unwrap();
        let v = eval(
            &mut ctx,
            list(vec![
                sym("query"),
                list(vec![
                    sym("do"),
                    list(vec![sym("transfer"), Value::Address(BOB), Value::Long(100)]),
                    sym("*balance*"),
                ]),
            ]),
        );
        // The query saw the transfer internally but the state reverted.
        assert_eq!(v, Value::Long(before - 100));
        assert_eq!(ctx.balance_of(ALICE), Some(before));
    }

    #[test]
    fn test_schedule_inserts_entry() {
        let mut ctx = Context::new(test_state(), ALICE, 1_000_000);
        let v = eval(
            &mut ctx,
            list(vec![
                sym("schedule"),
                list(vec![sym("+"), sym("*timestamp*"), Value::Long(1000)]),
                list(vec![sym("def"), sym("a"), Value::Long(42)]),
            ]),
        );
        assert_eq!(v, Value::Long(1100));
        assert_eq!(ctx.state().schedule().count(), 1);
    }

    #[test]
    fn test_multi_arity_and_rest_params() {
        let mut ctx = Context::new(test_state(), ALICE, 1_000_000);
        // (def f (fn ([a] a) ([a & more] (count more))))
        eval(
            &mut ctx,
            list(vec![
                sym("def"),
                sym("f"),
                list(vec![
                    sym("fn"),
                    list(vec![
                        Value::Vector(Vector::from_values(vec![sym("a")])),
                        sym("a"),
                    ]),
                    list(vec![
                        Value::Vector(Vector::from_values(vec![
                            sym("a"),
                            sym("&"),
                            sym("more"),
                        ])),
                        list(vec![sym("count"), sym("more")]),
                    ]),
                ]),
            ]),
        );
        assert_eq!(
            eval(&mut ctx, list(vec![sym("f"), Value::Long(9)])),
            Value::Long(9)
        );
        assert_eq!(
            eval(
                &mut ctx,
                list(vec![sym("f"), Value::Long(9), Value::Long(1), Value::Long(2)])
            ),
            Value::Long(2)
        );
        // No clause for zero arguments.
        eval_form(&mut ctx, &list(vec![sym("f")]));
        assert!(ctx
            .exception()
            .unwrap()
            .as_error()
            .unwrap()
            .is_code(codes::ARITY));
    }
}
