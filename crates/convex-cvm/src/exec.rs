//! # Op Evaluator
//!
//! The tree-walking evaluator. Every op evaluation charges juice, then
//! either writes a result into the context or raises an exceptional
//! value. Non-local control (`recur`, `tailcall`, `return`) is handled
//! by the trampoline in [`apply`]; cross-account calls fork the context
//! and unwind according to the boundary rules.

use crate::context::Context;
use crate::env;
use crate::errors::{codes, Exceptional};
use crate::juice::costs;
use crate::runtime;
use convex_types::{
    Address, FnClause, Map, Op, Record, Special, Symbol, Value, Vector,
};
use tracing::trace;

/// Evaluates one op against the context.
pub fn execute(ctx: &mut Context, op: &Op) {
    if !ctx.is_live() {
        return;
    }
    match op {
        Op::Constant(v) => {
            if ctx.charge(costs::CONSTANT) {
                ctx.set_result(v.clone());
            }
        }
        Op::Local(i) => {
            if !ctx.charge(costs::LOOKUP) {
                return;
            }
            match ctx.locals.get(*i as usize) {
                Some(v) => {
                    let v = v.clone();
                    ctx.set_result(v);
                }
                None => ctx.fail(codes::BOUNDS, Value::Long(i64::from(*i))),
            }
        }
        Op::SetLocal { index, op } => {
            if !ctx.charge(costs::SET) {
                return;
            }
            execute(ctx, op);
            if !ctx.is_live() {
                return;
            }
            let i = *index as usize;
            if i < ctx.locals.len() {
                let v = ctx.result().clone();
                ctx.locals[i] = v;
            } else {
                ctx.fail(codes::BOUNDS, Value::Long(i64::from(*index)));
            }
        }
        Op::Lookup { address, symbol } => {
            if !ctx.charge(costs::LOOKUP_DYNAMIC) {
                return;
            }
            let addr = match address {
                None => ctx.address(),
                Some(a) => {
                    execute(ctx, a);
                    if !ctx.is_live() {
                        return;
                    }
                    match ctx.result() {
                        Value::Address(addr) => *addr,
                        other => {
                            let other = other.clone();
                            ctx.fail(codes::CAST, other);
                            return;
                        }
                    }
                }
            };
            match env::lookup_value(ctx, addr, symbol) {
                Some(v) => ctx.set_result(v),
                None => ctx.fail(codes::UNDECLARED, Value::Symbol(symbol.clone())),
            }
        }
        Op::Do(ops) => {
            if !ctx.charge(costs::DO) {
                return;
            }
            ctx.set_result(Value::Nil);
            for o in ops {
                execute(ctx, o);
                if !ctx.is_live() {
                    return;
                }
            }
        }
        Op::Cond { clauses, fallback } => {
            if !ctx.charge(costs::COND) {
                return;
            }
            for (test, result) in clauses {
                execute(ctx, test);
                if !ctx.is_live() {
                    return;
                }
                if ctx.result().is_truthy() {
                    execute(ctx, result);
                    return;
                }
            }
            match fallback {
                Some(e) => execute(ctx, e),
                None => ctx.set_result(Value::Nil),
            }
        }
        Op::Let {
            bindings,
            body,
            loop_form,
        } => execute_let(ctx, bindings, body, *loop_form),
        Op::Lambda(template) => {
            if !ctx.charge(costs::LAMBDA) {
                return;
            }
            let closure =
                convex_types::Closure::new(template.clone(), ctx.locals.clone());
            ctx.set_result(Value::Fn(closure));
        }
        Op::Invoke { func, args } => {
            if !ctx.charge(costs::INVOKE) {
                return;
            }
            execute(ctx, func);
            if !ctx.is_live() {
                return;
            }
            let f = ctx.result().clone();
            let mut vals = Vec::with_capacity(args.len());
            for a in args {
                execute(ctx, a);
                if !ctx.is_live() {
                    return;
                }
                vals.push(ctx.result().clone());
            }
            apply(ctx, f, vals);
        }
        Op::Def { symbol, op } => {
            if !ctx.charge(costs::DEF) {
                return;
            }
            execute(ctx, op);
            if !ctx.is_live() {
                return;
            }
            let defined = ctx.result().clone();
            define_symbol(ctx, symbol, defined);
        }
        Op::Special(s) => {
            if ctx.charge(costs::CONSTANT) {
                let v = read_special(ctx, *s);
                ctx.set_result(v);
            }
        }
        Op::Query(inner) => {
            if !ctx.charge(costs::QUERY) {
                return;
            }
            let snapshot = ctx.state().clone();
            execute(ctx, inner);
            // Queries never change state, whatever happened inside.
            ctx.set_state(snapshot);
        }
    }
}

fn execute_let(ctx: &mut Context, bindings: &[(Symbol, Op)], body: &[Op], loop_form: bool) {
    if !ctx.charge(costs::LET) {
        return;
    }
    let base = ctx.locals.len();
    for (_, op) in bindings {
        execute(ctx, op);
        if !ctx.is_live() {
            ctx.locals.truncate(base);
            return;
        }
        let v = ctx.result().clone();
        ctx.locals.push(v);
    }
    loop {
        ctx.set_result(Value::Nil);
        for o in body {
            execute(ctx, o);
            if !ctx.is_live() {
                break;
            }
        }
        if loop_form {
            if matches!(ctx.exception(), Some(Exceptional::Recur(_))) {
                if let Some(Exceptional::Recur(vals)) = ctx.take_exception() {
                    if vals.len() != bindings.len() {
                        ctx.fail(codes::ARITY, Value::Long(vals.len() as i64));
                        break;
                    }
                    ctx.locals.truncate(base);
                    ctx.locals.extend(vals);
                    continue;
                }
            }
        }
        break;
    }
    ctx.locals.truncate(base);
}

/// Writes a function's arguments into the local frame per its clause.
fn bind_params(ctx: &mut Context, clause: &FnClause, args: Vec<Value>) {
    if clause.variadic {
        let fixed = clause.params.len() - 1;
        let mut iter = args.into_iter();
        for _ in 0..fixed {
            let v = iter.next().expect("arity checked");
            ctx.locals.push(v);
        }
        let rest: Vector = iter.collect();
        ctx.locals.push(Value::Vector(rest));
    } else {
        ctx.locals.extend(args);
    }
}

/// Invokes a function value. Handles the recur/tailcall/return trampoline
/// at the function-body boundary.
pub fn apply(ctx: &mut Context, func: Value, args: Vec<Value>) {
    if !ctx.is_live() {
        return;
    }
    let mut func = func;
    let mut args = args;
    loop {
        match &func {
            Value::CoreFn(cf) => runtime::apply_core(ctx, *cf, &args),
            Value::Fn(closure) => {
                let closure = closure.clone();
                if !ctx.push_depth() {
                    return;
                }
                let saved = std::mem::take(&mut ctx.locals);
                let captured_len = closure.captured().len();
                ctx.locals = closure.captured().to_vec();
                let template = closure.template().clone();
                let mut current = std::mem::take(&mut args);
                loop {
                    let Some(clause) = template.clause_for(current.len()).cloned() else {
                        ctx.fail(codes::ARITY, Value::Long(current.len() as i64));
                        break;
                    };
                    ctx.locals.truncate(captured_len);
                    bind_params(ctx, &clause, current);
                    execute(ctx, &clause.body);
                    match ctx.exception() {
                        Some(Exceptional::Recur(_)) => {
                            if let Some(Exceptional::Recur(vals)) = ctx.take_exception() {
                                current = vals;
                                continue;
                            }
                            unreachable!("checked recur");
                        }
                        Some(Exceptional::Return(_)) => {
                            if let Some(Exceptional::Return(v)) = ctx.take_exception() {
                                ctx.set_result(v);
                            }
                        }
                        _ => {}
                    }
                    break;
                }
                ctx.locals = saved;
                ctx.pop_depth();
            }
            Value::Map(m) => {
                let m = m.clone();
                collection_get(ctx, &args, |k, default| match m.get(k) {
                    Some(v) => v,
                    None => default,
                });
            }
            Value::Keyword(_) => {
                let key = func.clone();
                match args.len() {
                    1 | 2 => {
                        let default = args.get(1).cloned().unwrap_or(Value::Nil);
                        let v = match &args[0] {
                            Value::Map(m) => m.get(&key).unwrap_or(default),
                            Value::Nil => default,
                            _ => default,
                        };
                        ctx.set_result(v);
                    }
                    n => ctx.fail(codes::ARITY, Value::Long(n as i64)),
                }
            }
            Value::Vector(v) => {
                let v = v.clone();
                match args.len() {
                    1 => match &args[0] {
                        Value::Long(i) if *i >= 0 => match v.get(*i as u64) {
                            Some(e) => ctx.set_result(e),
                            None => ctx.fail(codes::BOUNDS, args[0].clone()),
                        },
                        other => ctx.fail(codes::CAST, other.clone()),
                    },
                    n => ctx.fail(codes::ARITY, Value::Long(n as i64)),
                }
            }
            Value::Set(s) => {
                let s = s.clone();
                match args.len() {
                    1 => ctx.set_result(Value::Bool(s.contains(&args[0]))),
                    n => ctx.fail(codes::ARITY, Value::Long(n as i64)),
                }
            }
            other => {
                ctx.fail(codes::CAST, other.clone());
            }
        }
        // Tailcall escapes the invoked function and re-enters here with a
        // possibly different function.
        if matches!(ctx.exception(), Some(Exceptional::TailCall { .. })) {
            if let Some(Exceptional::TailCall { func: f2, args: a2 }) = ctx.take_exception() {
                func = f2;
                args = a2;
                continue;
            }
        }
        return;
    }
}

fn collection_get(
    ctx: &mut Context,
    args: &[Value],
    get: impl FnOnce(&Value, Value) -> Value,
) {
    match args.len() {
        1 | 2 => {
            let default = args.get(1).cloned().unwrap_or(Value::Nil);
            let v = get(&args[0], default);
            ctx.set_result(v);
        }
        n => ctx.fail(codes::ARITY, Value::Long(n as i64)),
    }
}

/// Binds a symbol in the executing account's environment. A syntax
/// result defines its inner value and merges metadata.
pub fn define_symbol(ctx: &mut Context, symbol: &Symbol, value: Value) {
    let (value, new_meta) = match value {
        Value::Syntax(s) => (s.value().clone(), Some(s.meta().clone())),
        v => (v, None),
    };
    let acct = ctx.current_account();
    let sym_val = Value::Symbol(symbol.clone());
    let env = acct.environment().assoc(sym_val.clone(), value.clone());
    let mut next = acct.with_environment(env);
    if let Some(meta) = new_meta {
        let merged = match acct.metadata().get(&sym_val) {
            Some(Value::Map(old)) => old.merge(&meta),
            _ => meta,
        };
        next = next.with_metadata(acct.metadata().assoc(sym_val, Value::Map(merged)));
    }
    let addr = ctx.address();
    if ctx.put_account(addr, next) {
        ctx.set_result(value);
    }
}

fn read_special(ctx: &Context, s: Special) -> Value {
    match s {
        Special::Address => Value::Address(ctx.address()),
        Special::Origin => Value::Address(ctx.origin()),
        Special::Caller => match ctx.caller() {
            Some(a) => Value::Address(a),
            None => Value::Nil,
        },
        Special::Juice => Value::Long(ctx.juice_used() as i64),
        Special::JuiceLimit => Value::Long(ctx.juice_limit() as i64),
        Special::JuicePrice => Value::Long(ctx.state().globals().juice_price),
        Special::Balance => Value::Long(ctx.current_account().balance()),
        Special::Memory => Value::Long(ctx.current_account().memory()),
        Special::Offer => Value::Long(ctx.offer()),
        Special::Scope => ctx.scope().clone(),
        Special::State => Value::Record(Record::State(ctx.state().clone())),
        Special::Holdings => Value::BlobMap(ctx.current_account().holdings().clone()),
        Special::Timestamp => Value::Long(ctx.state().timestamp()),
        Special::Depth => Value::Long(i64::from(ctx.depth())),
        Special::Key => match ctx.current_account().key() {
            Some(k) => Value::AccountKey(k),
            None => Value::Nil,
        },
        Special::Result => ctx.result().clone(),
    }
}

// =============================================================================
// CROSS-ACCOUNT CALLS
// =============================================================================

struct Frame {
    address: Address,
    caller: Option<Address>,
    offer: i64,
    scope: Value,
    locals: Vec<Value>,
}

fn enter_frame(ctx: &mut Context, target: Address, offer: i64, scope: Value) -> Frame {
    let frame = Frame {
        address: ctx.address,
        caller: ctx.caller,
        offer: ctx.offer,
        scope: std::mem::replace(&mut ctx.scope, scope),
        locals: std::mem::take(&mut ctx.locals),
    };
    ctx.caller = Some(ctx.address);
    ctx.address = target;
    ctx.offer = offer;
    frame
}

fn exit_frame(ctx: &mut Context, frame: Frame) {
    ctx.address = frame.address;
    ctx.caller = frame.caller;
    ctx.offer = frame.offer;
    ctx.scope = frame.scope;
    ctx.locals = frame.locals;
}

/// Resolves a call target to `(address, scope)`.
fn resolve_target(target: &Value) -> Option<(Address, Value)> {
    match target {
        Value::Address(a) => Some((*a, Value::Nil)),
        Value::Vector(v) if v.count() == 2 => match v.get(0) {
            Some(Value::Address(a)) => Some((a, v.get(1).expect("two elements"))),
            _ => None,
        },
        _ => None,
    }
}

/// Calls an exported function on another account.
///
/// The offer is debited from the caller before the fork, so an
/// insufficient balance fails fast. On error or rollback the entire
/// forked state — including the debit — is discarded, while juice
/// consumption is preserved.
pub fn actor_call(
    ctx: &mut Context,
    target: &Value,
    offer: i64,
    sym: &Symbol,
    args: Vec<Value>,
) {
    if !ctx.charge(costs::CALL) {
        return;
    }
    let Some((addr, scope)) = resolve_target(target) else {
        ctx.fail(codes::CAST, target.clone());
        return;
    };
    if offer < 0 {
        ctx.fail(codes::ARGUMENT, Value::Long(offer));
        return;
    }
    let Some(acct) = ctx.account(addr) else {
        ctx.fail(codes::NOBODY, Value::Address(addr));
        return;
    };
    if !acct.is_callable(sym) {
        ctx.fail(codes::STATE, Value::Symbol(sym.clone()));
        return;
    }
    let Some(fn_val) = acct.environment().get(&Value::Symbol(sym.clone())) else {
        ctx.fail(codes::STATE, Value::Symbol(sym.clone()));
        return;
    };

    trace!(target = %addr, offer, function = %sym, "actor call");
    let snapshot = ctx.state().clone();
    if offer > 0 {
        let from = ctx.address();
        if !ctx.debit(from, offer) {
            return;
        }
    }
    run_in_account(ctx, addr, offer, scope, snapshot, |ctx| {
        apply(ctx, fn_val, args);
    });
}

/// Runs a closure in another account's frame with the standard boundary
/// behavior: unused offer refunded on normal return or halt, full state
/// rollback on error or explicit rollback, juice always preserved.
pub(crate) fn run_in_account(
    ctx: &mut Context,
    target: Address,
    offer: i64,
    scope: Value,
    snapshot: convex_types::State,
    run: impl FnOnce(&mut Context),
) {
    if !ctx.push_depth() {
        ctx.set_state(snapshot);
        return;
    }
    let frame = enter_frame(ctx, target, offer, scope);
    run(ctx);
    let remaining = ctx.offer;
    let caller_addr = frame.address;
    exit_frame(ctx, frame);
    ctx.pop_depth();

    match ctx.exception() {
        None => {
            if remaining > 0 {
                ctx.credit(caller_addr, remaining);
            }
        }
        Some(Exceptional::Halt(_)) => {
            if let Some(Exceptional::Halt(v)) = ctx.take_exception() {
                ctx.set_result(v);
            }
            if remaining > 0 {
                ctx.credit(caller_addr, remaining);
            }
        }
        Some(Exceptional::Return(_)) => {
            if let Some(Exceptional::Return(v)) = ctx.take_exception() {
                ctx.set_result(v);
            }
            if remaining > 0 {
                ctx.credit(caller_addr, remaining);
            }
        }
        Some(Exceptional::Rollback(_)) => {
            if let Some(Exceptional::Rollback(v)) = ctx.take_exception() {
                ctx.set_state(snapshot);
                ctx.set_result(v);
            }
        }
        Some(Exceptional::Error(_)) => {
            // The caller is made whole; the error propagates with juice
            // consumption intact.
            ctx.set_state(snapshot);
        }
        Some(_) => {
            // recur/tailcall/reduced escaping a call boundary.
            ctx.take_exception();
            ctx.set_state(snapshot);
            ctx.fail(codes::EXCEPTION, Value::string("control value escaped call"));
        }
    }
}

/// Builds the metadata map marking a symbol callable.
#[must_use]
pub fn callable_meta() -> Map {
    Map::empty().assoc(Value::keyword("callable?"), Value::Bool(true))
}
