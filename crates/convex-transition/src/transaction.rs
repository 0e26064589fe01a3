//! # Transaction Application
//!
//! Runs one signed transaction against a state: signature, sequence and
//! juice-limit checks, body execution through the CVM, then the
//! completion step — juice fees, memory settlement against allowance
//! and pool, sequence increment, fee accounting.

use convex_cvm::{codes, exec, eval_form, Context, Exceptional};
use convex_cvm::juice::{BASE_TRANSACTION_JUICE, MAX_TRANSACTION_JUICE};
use convex_cvm::runtime;
use convex_state::pool;
use convex_types::{
    memory_size, CoreFn, Map, Record, SignedData, State, TxBody, TxResult, Value, Vector,
};
use tracing::debug;

fn reject(id: Option<i64>, code: &str, message: Value) -> TxResult {
    TxResult::error(id, Value::keyword(code), message, Vector::empty())
}

fn state_value(state: &State) -> Value {
    Value::Record(Record::State(state.clone()))
}

/// Applies one signed transaction. Returns the next state and the
/// transaction result. Pre-check rejections leave the state untouched;
/// executed transactions always pay juice fees and advance the origin
/// sequence.
pub fn apply_transaction(
    state: &State,
    signed: &SignedData,
    id: Option<i64>,
) -> (State, TxResult) {
    let Value::Record(Record::Transaction(tx)) = signed.value() else {
        return (
            state.clone(),
            reject(id, codes::ARGUMENT, Value::string("payload is not a transaction")),
        );
    };

    // Signer checks: account exists, claims the signing key, signature
    // verifies.
    let origin = tx.origin();
    let Some(account) = state.get_account(origin) else {
        return (state.clone(), reject(id, codes::NOBODY, Value::Address(origin)));
    };
    if account.key() != Some(*signed.key()) {
        return (
            state.clone(),
            reject(id, codes::SIGNATURE, Value::string("key does not match account")),
        );
    }
    if convex_crypto::verify_signed(signed).is_err() {
        return (
            state.clone(),
            reject(id, codes::SIGNATURE, Value::string("bad signature")),
        );
    }

    // Sequence must advance by exactly one.
    if tx.sequence() != account.sequence() + 1 {
        return (
            state.clone(),
            reject(id, codes::SEQUENCE, Value::Long(tx.sequence())),
        );
    }

    // Juice limit from the affordable budget.
    let juice_price = state.globals().juice_price.max(1);
    let affordable = (account.balance() / juice_price).max(0) as u64;
    let juice_limit = MAX_TRANSACTION_JUICE.min(affordable);
    if juice_limit == 0 {
        return (state.clone(), reject(id, codes::FUNDS, Value::Long(0)));
    }

    let mem_before = memory_size(&state_value(state));
    let mut ctx = Context::new(state.clone(), origin, juice_limit);
    run_body(&mut ctx, tx.body());
    complete(state, ctx, id, origin, mem_before, juice_price)
}

fn run_body(ctx: &mut Context, body: &TxBody) {
    match body {
        TxBody::Invoke(form) => eval_form(ctx, form),
        TxBody::Transfer { target, amount } => runtime::apply_core(
            ctx,
            CoreFn::Transfer,
            &[Value::Address(*target), Value::Long(*amount)],
        ),
        TxBody::Call {
            target,
            offer,
            func,
            args,
        } => {
            exec::actor_call(ctx, &Value::Address(*target), *offer, func, args.to_vec());
        }
    }
}

/// The completion step. Keeps or discards the body's state changes per
/// the outcome, then always: charges juice fees, settles the memory
/// delta, advances the sequence, credits fees to the globals.
fn complete(
    initial: &State,
    mut ctx: Context,
    id: Option<i64>,
    origin: convex_types::Address,
    mem_before: u64,
    juice_price: i64,
) -> (State, TxResult) {
    let juice_used = ctx.juice_used();
    let log: Vec<Value> = ctx.log_entries().to_vec();

    let (mut state, mut outcome) = match ctx.take_exception() {
        None => (ctx.state().clone(), Ok(ctx.result().clone())),
        Some(Exceptional::Halt(v)) => (ctx.state().clone(), Ok(v)),
        // Rollback discards the body's changes but is a normal result.
        Some(Exceptional::Rollback(v)) => (initial.clone(), Ok(v)),
        Some(other) => {
            let err = other.escaped();
            (initial.clone(), Err(err))
        }
    };

    // Juice fee: consumed in all executed outcomes. The charge clamps to
    // the available balance; only what was actually debited accrues to
    // the fee pot, so supply stays conserved.
    let fee_juice = juice_used.saturating_add(BASE_TRANSACTION_JUICE);
    let fee = (fee_juice as i64).saturating_mul(juice_price);
    let (charged_state, mut charged) = charge_fee(&state, origin, fee);
    state = charged_state;

    // Memory settlement on kept state changes.
    if outcome.is_ok() {
        match settle_memory(&state, origin, mem_before) {
            Ok(next) => state = next,
            Err(message) => {
                // Roll back to the initial state; juice fees still stand.
                let (rolled, recharged) = charge_fee(initial, origin, fee);
                state = rolled;
                charged = recharged;
                outcome = Err(convex_cvm::ErrorValue::new(codes::MEMORY, message));
            }
        }
    }

    // Sequence advances for every executed transaction.
    if let Some(acct) = state.get_account(origin) {
        let next = acct.with_sequence(acct.sequence() + 1);
        state = state.put_account(origin, next).expect("origin exists");
    }

    // Fees accumulate in the globals.
    let mut globals = state.globals().clone();
    globals.fees += charged;
    state = state.with_globals(globals);

    let info = Map::empty()
        .assoc(Value::keyword("juice"), Value::Long(juice_used as i64))
        .assoc(
            Value::keyword("log"),
            Value::Vector(Vector::from_values(log)),
        );
    let result = match outcome {
        Ok(v) => TxResult::ok(id, v),
        Err(e) => {
            debug!(code = %e.code, "transaction failed");
            TxResult::error(
                id,
                e.code,
                e.message,
                Vector::from_values(e.trace),
            )
        }
    };
    (state, result.with_info(info))
}

/// Debits the juice fee, clamped to the available balance. Returns the
/// updated state and the amount actually taken.
fn charge_fee(state: &State, origin: convex_types::Address, fee: i64) -> (State, i64) {
    let Some(acct) = state.get_account(origin) else {
        return (state.clone(), 0);
    };
    let charged = fee.min(acct.balance());
    let next = acct.with_balance(acct.balance() - charged);
    (
        state.put_account(origin, next).expect("origin exists"),
        charged,
    )
}

/// Settles the memory delta: allowance first, then a pool purchase at
/// the swap price. A negative delta refunds allowance.
fn settle_memory(
    state: &State,
    origin: convex_types::Address,
    mem_before: u64,
) -> Result<State, Value> {
    let mem_after = memory_size(&state_value(state));
    let Some(acct) = state.get_account(origin) else {
        return Ok(state.clone());
    };

    if mem_after <= mem_before {
        let refund = (mem_before - mem_after) as i64;
        if refund == 0 {
            return Ok(state.clone());
        }
        let next = acct.with_memory(acct.memory() + refund);
        return Ok(state.put_account(origin, next).expect("origin exists"));
    }

    let delta = (mem_after - mem_before) as i64;
    let from_allowance = delta.min(acct.memory());
    let to_buy = delta - from_allowance;
    let mut next_acct = acct.with_memory(acct.memory() - from_allowance);
    let mut globals = state.globals().clone();

    if to_buy > 0 {
        let price = pool::swap_price(to_buy, globals.pool_memory, globals.pool_value)
            .map_err(|e| Value::string(&e.to_string()))?;
        if next_acct.balance() < price {
            return Err(Value::string("cannot afford memory purchase"));
        }
        next_acct = next_acct.with_balance(next_acct.balance() - price);
        globals.pool_memory -= to_buy;
        globals.pool_value += price;
    }

    let state = state
        .put_account(origin, next_acct)
        .expect("origin exists")
        .with_globals(globals);
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use convex_crypto::KeyPair;
    use convex_state::{genesis, GenesisConfig};
    use convex_types::{Address, List, Transaction};

    fn setup() -> (State, KeyPair, Address) {
        let kp = KeyPair::from_seed([7u8; 32]);
        let state = genesis(&GenesisConfig::new(vec![kp.account_key()]));
        // Genesis layout: core #0, reserve #1, first user #2.
        (state, kp, Address::new(2))
    }

    fn invoke_tx(kp: &KeyPair, origin: Address, sequence: i64, form: Value) -> SignedData {
        let tx = Transaction::new(origin, sequence, TxBody::Invoke(form));
        kp.sign_cell(Value::Record(Record::Transaction(tx)))
    }

    fn add_form() -> Value {
        Value::List(List::from_values(vec![
            Value::symbol("+"),
            Value::Long(1),
            Value::Long(2),
        ]))
    }

    #[test]
    fn test_simple_invoke() {
        let (state, kp, origin) = setup();
        let signed = invoke_tx(&kp, origin, 1, add_form());
        let (next, result) = apply_transaction(&state, &signed, Some(0));
        assert!(!result.is_error(), "{result:?}");
        assert_eq!(result.value(), &Value::Long(3));
        let acct = next.get_account(origin).unwrap();
        assert_eq!(acct.sequence(), 1);
        // Fees were paid.
        assert!(acct.balance() < state.get_account(origin).unwrap().balance());
        assert!(next.globals().fees > 0);
    }

    #[test]
    fn test_bad_sequence_rejected() {
        let (state, kp, origin) = setup();
        let signed = invoke_tx(&kp, origin, 5, add_form());
        let (next, result) = apply_transaction(&state, &signed, None);
        assert!(result.is_error());
        assert_eq!(result.error_code(), Some(&Value::keyword(codes::SEQUENCE)));
        // No state change at all.
        assert_eq!(
            state_value(&next).cell_hash(),
            state_value(&state).cell_hash()
        );
    }

    #[test]
    fn test_wrong_signer_rejected() {
        let (state, _kp, origin) = setup();
        let other = KeyPair::from_seed([9u8; 32]);
        let signed = invoke_tx(&other, origin, 1, add_form());
        let (_, result) = apply_transaction(&state, &signed, None);
        assert_eq!(result.error_code(), Some(&Value::keyword(codes::SIGNATURE)));
    }

    #[test]
    fn test_vm_error_still_pays_juice_and_sequence() {
        let (state, kp, origin) = setup();
        let bad = Value::List(List::from_values(vec![
            Value::symbol("fail"),
            Value::keyword("BOOM"),
        ]));
        let signed = invoke_tx(&kp, origin, 1, bad);
        let before = state.get_account(origin).unwrap().balance();
        let (next, result) = apply_transaction(&state, &signed, None);
        assert!(result.is_error());
        assert_eq!(result.error_code(), Some(&Value::keyword("BOOM")));
        let acct = next.get_account(origin).unwrap();
        assert!(acct.balance() < before);
        assert_eq!(acct.sequence(), 1);
    }

    #[test]
    fn test_memory_growth_consumes_allowance_or_pool() {
        let (state, kp, origin) = setup();
        // Give the account an allowance first.
        let acct = state.get_account(origin).unwrap().with_memory(1_000_000);
        let state = state.put_account(origin, acct).unwrap();
        let grow = Value::List(List::from_values(vec![
            Value::symbol("def"),
            Value::symbol("data"),
            Value::string(&"x".repeat(5000)),
        ]));
        let signed = invoke_tx(&kp, origin, 1, grow);
        let (next, result) = apply_transaction(&state, &signed, None);
        assert!(!result.is_error(), "{result:?}");
        let after = next.get_account(origin).unwrap();
        // Allowance absorbed the growth; the pool is untouched.
        assert!(after.memory() < 1_000_000);
        assert_eq!(next.globals().pool_memory, state.globals().pool_memory);
    }

    #[test]
    fn test_memory_purchase_from_pool() {
        let (state, kp, origin) = setup();
        // Zero allowance: growth must be bought from the pool.
        let grow = Value::List(List::from_values(vec![
            Value::symbol("def"),
            Value::symbol("data"),
            Value::string(&"x".repeat(5000)),
        ]));
        let signed = invoke_tx(&kp, origin, 1, grow);
        let (next, result) = apply_transaction(&state, &signed, None);
        assert!(!result.is_error(), "{result:?}");
        assert!(next.globals().pool_memory < state.globals().pool_memory);
        assert!(next.globals().pool_value > state.globals().pool_value);
    }
}
