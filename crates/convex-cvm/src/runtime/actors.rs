//! Account and economics core functions: transfers, offers, actor
//! deployment, controller-based evaluation, holdings, scheduling and
//! peer management.

use crate::compile;
use crate::context::Context;
use crate::env;
use crate::errors::codes;
use crate::exec;
use crate::juice::costs;
use crate::runtime::predicates::symbol_arg;
use convex_types::{
    AccountKey, AccountStatus, Address, PeerStatus, Record, Value, Vector,
};

fn address_arg(ctx: &mut Context, v: &Value) -> Option<Address> {
    match v {
        Value::Address(a) => Some(*a),
        other => {
            ctx.fail(codes::CAST, other.clone());
            None
        }
    }
}

fn long_arg(ctx: &mut Context, v: &Value) -> Option<i64> {
    match v {
        Value::Long(n) => Some(*n),
        Value::Byte(b) => Some(i64::from(*b)),
        other => {
            ctx.fail(codes::CAST, other.clone());
            None
        }
    }
}

fn key_arg(ctx: &mut Context, v: &Value) -> Option<AccountKey> {
    let key = match v {
        Value::AccountKey(k) => Some(*k),
        Value::Blob(b) if b.len() == 32 => AccountKey::from_slice(&b.to_vec()),
        _ => None,
    };
    if key.is_none() {
        ctx.fail(codes::CAST, v.clone());
    }
    key
}

/// `transfer`: move coins from the executing account.
pub fn transfer(ctx: &mut Context, args: &[Value]) {
    if args.len() != 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::TRANSFER) {
        return;
    }
    let Some(target) = address_arg(ctx, &args[0]) else {
        return;
    };
    let Some(amount) = long_arg(ctx, &args[1]) else {
        return;
    };
    if amount < 0 {
        ctx.fail(codes::ARGUMENT, args[1].clone());
        return;
    }
    if ctx.account(target).is_none() {
        ctx.fail(codes::NOBODY, args[0].clone());
        return;
    }
    let from = ctx.address();
    if !ctx.debit(from, amount) {
        return;
    }
    if ctx.credit(target, amount) {
        ctx.set_result(Value::Long(amount));
    }
}

/// `accept`: take coins from the current offer into the executing
/// account's balance.
pub fn accept(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::ACCEPT) {
        return;
    }
    let Some(amount) = long_arg(ctx, &args[0]) else {
        return;
    };
    if amount < 0 {
        ctx.fail(codes::ARGUMENT, args[0].clone());
        return;
    }
    if amount > ctx.offer() {
        ctx.fail(codes::FUNDS, args[0].clone());
        return;
    }
    let addr = ctx.address();
    ctx.offer -= amount;
    if ctx.credit(addr, amount) {
        ctx.set_result(Value::Long(amount));
    }
}

/// `call`: invoke an exported function on another account, with an
/// optional offer: `(call target fn-name args...)` or
/// `(call target offer fn-name args...)`.
pub fn call_fn(ctx: &mut Context, args: &[Value]) {
    if args.len() < 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    let target = args[0].clone();
    let (offer, sym_idx) = match (&args[1], args.get(2)) {
        (Value::Long(offer), Some(Value::Symbol(_))) => (*offer, 2),
        _ => (0, 1),
    };
    let Some(sym) = symbol_arg(ctx, &args[sym_idx]) else {
        return;
    };
    let sym = sym.clone();
    let call_args = args[sym_idx + 1..].to_vec();
    exec::actor_call(ctx, &target, offer, &sym, call_args);
}

/// `create-account`: append a user account with a signing key.
pub fn create_account(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::CREATE_ACCOUNT) {
        return;
    }
    let Some(key) = key_arg(ctx, &args[0]) else {
        return;
    };
    let (state, addr) = ctx
        .state()
        .add_account(AccountStatus::new_user(key, 0));
    ctx.set_state(state);
    ctx.set_result(Value::Address(addr));
}

/// `deploy`: create an actor account and run its initialization code
/// inside it. The actor address is the result; failures roll the whole
/// deployment back.
pub fn deploy(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::DEPLOY) {
        return;
    }
    let snapshot = ctx.state().clone();
    let (state, addr) = ctx.state().add_account(AccountStatus::new_actor());
    ctx.set_state(state);
    let code = args[0].clone();
    exec::run_in_account(ctx, addr, 0, Value::Nil, snapshot, |ctx| {
        compile::eval_form(ctx, &code);
    });
    if ctx.is_live() {
        ctx.set_result(Value::Address(addr));
    }
}

/// `set-key`: set or clear the executing account's signing key.
pub fn set_key(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let key = match &args[0] {
        Value::Nil => None,
        v => match key_arg(ctx, v) {
            Some(k) => Some(k),
            None => return,
        },
    };
    let acct = ctx.current_account().with_key(key);
    let addr = ctx.address();
    if ctx.put_account(addr, acct) {
        ctx.set_result(args[0].clone());
    }
}

/// `set-controller`: set the executing account's controller.
pub fn set_controller(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let controller = match &args[0] {
        Value::Nil | Value::Address(_) => args[0].clone(),
        Value::Vector(v)
            if v.count() == 2 && matches!(v.get(0), Some(Value::Address(_))) =>
        {
            args[0].clone()
        }
        other => {
            ctx.fail(codes::CAST, other.clone());
            return;
        }
    };
    let acct = ctx.current_account().with_controller(controller.clone());
    let addr = ctx.address();
    if ctx.put_account(addr, acct) {
        ctx.set_result(controller);
    }
}

/// `transfer-memory`: move allowance bytes to another account.
pub fn transfer_memory(ctx: &mut Context, args: &[Value]) {
    if args.len() != 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::MEMORY_OP) {
        return;
    }
    let Some(target) = address_arg(ctx, &args[0]) else {
        return;
    };
    let Some(amount) = long_arg(ctx, &args[1]) else {
        return;
    };
    if amount < 0 {
        ctx.fail(codes::ARGUMENT, args[1].clone());
        return;
    }
    let from = ctx.current_account();
    if from.memory() < amount {
        ctx.fail(codes::MEMORY, args[1].clone());
        return;
    }
    let Some(to) = ctx.account(target) else {
        ctx.fail(codes::NOBODY, args[0].clone());
        return;
    };
    let from_addr = ctx.address();
    if ctx.put_account(from_addr, from.with_memory(from.memory() - amount))
        && ctx.put_account(target, to.with_memory(to.memory() + amount))
    {
        ctx.set_result(Value::Long(amount));
    }
}

/// `set-memory`: set the executing account's allowance, buying the
/// difference from the memory pool or selling surplus back at the swap
/// price.
pub fn set_memory(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::MEMORY_OP) {
        return;
    }
    let Some(target) = long_arg(ctx, &args[0]) else {
        return;
    };
    if target < 0 {
        ctx.fail(codes::ARGUMENT, args[0].clone());
        return;
    }
    let acct = ctx.current_account();
    let delta = target - acct.memory();
    let mut globals = ctx.state().globals().clone();
    let mut next = acct;
    if delta > 0 {
        let Some(price) =
            convex_types::memory_buy_price(delta, globals.pool_memory, globals.pool_value)
        else {
            ctx.fail(codes::MEMORY, args[0].clone());
            return;
        };
        if next.balance() < price {
            ctx.fail(codes::FUNDS, Value::Long(price));
            return;
        }
        next = next.with_balance(next.balance() - price).with_memory(target);
        globals.pool_memory -= delta;
        globals.pool_value += price;
    } else if delta < 0 {
        let sell = -delta;
        let refund =
            convex_types::memory_sell_refund(sell, globals.pool_memory, globals.pool_value);
        next = next.with_balance(next.balance() + refund).with_memory(target);
        globals.pool_memory += sell;
        globals.pool_value -= refund;
    }
    let state = ctx.state().clone().with_globals(globals);
    ctx.set_state(state);
    let addr = ctx.address();
    if ctx.put_account(addr, next) {
        ctx.set_result(Value::Long(target));
    }
}

/// `schedule*`: insert a compiled op into the schedule under a
/// timestamp; executes as the scheduling account.
pub fn schedule_star(ctx: &mut Context, args: &[Value]) {
    if args.len() != 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SCHEDULE) {
        return;
    }
    let Some(time) = long_arg(ctx, &args[0]) else {
        return;
    };
    let Value::Op(_) = &args[1] else {
        ctx.fail(codes::CAST, args[1].clone());
        return;
    };
    let addr = ctx.address();
    let next = ctx.state().schedule_op(time, addr, args[1].clone());
    ctx.set_state(next);
    ctx.set_result(Value::Long(time));
}

/// `eval`: expand, compile and execute a form.
pub fn eval(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::EVAL) {
        return;
    }
    compile::eval_form(ctx, &args[0]);
}

/// `eval-as`: evaluate a form inside another account. The executing
/// account must be that account's controller.
pub fn eval_as(ctx: &mut Context, args: &[Value]) {
    if args.len() != 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::EVAL) {
        return;
    }
    let Some(target) = address_arg(ctx, &args[0]) else {
        return;
    };
    let Some(acct) = ctx.account(target) else {
        ctx.fail(codes::NOBODY, args[0].clone());
        return;
    };
    let me = ctx.address();
    let authorized = match acct.controller() {
        Value::Address(a) => *a == me,
        Value::Vector(v) => matches!(v.get(0), Some(Value::Address(a)) if a == me),
        _ => false,
    };
    if !authorized {
        ctx.fail(codes::TRUST, args[0].clone());
        return;
    }
    let snapshot = ctx.state().clone();
    let form = args[1].clone();
    exec::run_in_account(ctx, target, 0, Value::Nil, snapshot, |ctx| {
        compile::eval_form(ctx, &form);
    });
}

/// `log`: append values to the transaction log.
pub fn log(ctx: &mut Context, args: &[Value]) {
    if !ctx.charge(costs::LOG + args.len() as u64 * costs::BUILD_PER_ELEMENT) {
        return;
    }
    let values = Vector::from_values(args.to_vec());
    ctx.append_log(values.clone());
    ctx.set_result(Value::Vector(values));
}

/// `balance`: the balance of an account.
pub fn balance_fn(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let Some(addr) = address_arg(ctx, &args[0]) else {
        return;
    };
    match ctx.balance_of(addr) {
        Some(b) => ctx.set_result(Value::Long(b)),
        None => ctx.fail(codes::NOBODY, args[0].clone()),
    }
}

/// `account`: the full account record, or nil.
pub fn account_fn(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let Some(addr) = address_arg(ctx, &args[0]) else {
        return;
    };
    match ctx.account(addr) {
        Some(a) => ctx.set_result(Value::Record(Record::Account(a))),
        None => ctx.set_result(Value::Nil),
    }
}

/// `get-holding`: the value this account attached to the target.
pub fn get_holding(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let Some(owner) = address_arg(ctx, &args[0]) else {
        return;
    };
    let Some(acct) = ctx.account(owner) else {
        ctx.fail(codes::NOBODY, args[0].clone());
        return;
    };
    let me = Value::Address(ctx.address());
    ctx.set_result(acct.holdings().get(&me).unwrap_or(Value::Nil));
}

/// `set-holding`: attach a value to the target account under this
/// account's address.
pub fn set_holding(ctx: &mut Context, args: &[Value]) {
    if args.len() != 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::MEMORY_OP) {
        return;
    }
    let Some(owner) = address_arg(ctx, &args[0]) else {
        return;
    };
    let Some(acct) = ctx.account(owner) else {
        ctx.fail(codes::NOBODY, args[0].clone());
        return;
    };
    let me = Value::Address(ctx.address());
    let holdings = if matches!(args[1], Value::Nil) {
        acct.holdings().dissoc(&me)
    } else {
        acct.holdings()
            .assoc(me, args[1].clone())
            .expect("address is blob-like")
    };
    if ctx.put_account(owner, acct.with_holdings(holdings)) {
        ctx.set_result(args[1].clone());
    }
}

/// `lookup`: resolve a symbol without failing: `(lookup sym)` or
/// `(lookup addr sym)`.
pub fn lookup_fn(ctx: &mut Context, args: &[Value]) {
    if !ctx.charge(costs::LOOKUP_DYNAMIC) {
        return;
    }
    let (addr, sym_val) = match args {
        [s] => (ctx.address(), s),
        [a, s] => {
            let Some(addr) = address_arg(ctx, a) else {
                return;
            };
            (addr, s)
        }
        _ => {
            ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
            return;
        }
    };
    let Some(sym) = symbol_arg(ctx, sym_val) else {
        return;
    };
    let sym = sym.clone();
    match env::lookup_value(ctx, addr, &sym) {
        Some(v) => ctx.set_result(v),
        None => ctx.set_result(Value::Nil),
    }
}

/// `lookup-meta`: the metadata map recorded for a symbol.
pub fn lookup_meta(ctx: &mut Context, args: &[Value]) {
    if !ctx.charge(costs::LOOKUP_DYNAMIC) {
        return;
    }
    let (addr, sym_val) = match args {
        [s] => (ctx.address(), s),
        [a, s] => {
            let Some(addr) = address_arg(ctx, a) else {
                return;
            };
            (addr, s)
        }
        _ => {
            ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
            return;
        }
    };
    let Some(sym) = symbol_arg(ctx, sym_val) else {
        return;
    };
    let sym_val = Value::Symbol(sym.clone());
    let meta = ctx
        .account(addr)
        .and_then(|a| a.metadata().get(&sym_val))
        .unwrap_or(Value::Nil);
    ctx.set_result(meta);
}

// =============================================================================
// PEERS AND STAKING
// =============================================================================

/// `create-peer`: register a peer for a key, funded by the executing
/// account.
pub fn create_peer(ctx: &mut Context, args: &[Value]) {
    if args.len() != 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::PEER_OP) {
        return;
    }
    let Some(key) = key_arg(ctx, &args[0]) else {
        return;
    };
    let Some(stake) = long_arg(ctx, &args[1]) else {
        return;
    };
    if stake <= 0 {
        ctx.fail(codes::ARGUMENT, args[1].clone());
        return;
    }
    if ctx.state().get_peer(&key).is_some() {
        ctx.fail(codes::STATE, args[0].clone());
        return;
    }
    let me = ctx.address();
    if !ctx.debit(me, stake) {
        return;
    }
    let peer = PeerStatus::new(Value::Address(me), stake);
    let next = ctx.state().put_peer(key, peer);
    ctx.set_state(next);
    ctx.set_result(args[0].clone());
}

/// `set-stake`: set this account's delegated stake on a peer. Coins move
/// between the account balance and the delegation.
pub fn set_stake(ctx: &mut Context, args: &[Value]) {
    if args.len() != 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::PEER_OP) {
        return;
    }
    let Some(key) = key_arg(ctx, &args[0]) else {
        return;
    };
    let Some(amount) = long_arg(ctx, &args[1]) else {
        return;
    };
    if amount < 0 {
        ctx.fail(codes::ARGUMENT, args[1].clone());
        return;
    }
    let Some(peer) = ctx.state().get_peer(&key) else {
        ctx.fail(codes::STATE, args[0].clone());
        return;
    };
    let me = ctx.address();
    let current = peer.delegated_stake(me);
    let delta = amount - current;
    if delta > 0 {
        if !ctx.debit(me, delta) {
            return;
        }
    } else if delta < 0 && !ctx.credit(me, -delta) {
        return;
    }
    let next_peer = peer.with_delegated_stake(me, amount);
    let next = ctx.state().put_peer(key, next_peer);
    ctx.set_state(next);
    ctx.set_result(Value::Long(amount));
}

/// `stake`: the executing account's delegated stake on a peer.
pub fn stake_fn(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let Some(key) = key_arg(ctx, &args[0]) else {
        return;
    };
    let Some(peer) = ctx.state().get_peer(&key) else {
        ctx.fail(codes::STATE, args[0].clone());
        return;
    };
    let me = ctx.address();
    ctx.set_result(Value::Long(peer.delegated_stake(me)));
}

/// `set-peer-data`: replace a peer's metadata; controller only.
pub fn set_peer_data(ctx: &mut Context, args: &[Value]) {
    if args.len() != 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::PEER_OP) {
        return;
    }
    let Some(key) = key_arg(ctx, &args[0]) else {
        return;
    };
    let Value::Map(meta) = &args[1] else {
        ctx.fail(codes::CAST, args[1].clone());
        return;
    };
    let Some(peer) = ctx.state().get_peer(&key) else {
        ctx.fail(codes::STATE, args[0].clone());
        return;
    };
    let me = ctx.address();
    if *peer.controller() != Value::Address(me) {
        ctx.fail(codes::TRUST, args[0].clone());
        return;
    }
    let next = ctx.state().put_peer(key, peer.with_metadata(meta.clone()));
    ctx.set_state(next);
    ctx.set_result(args[1].clone());
}
