//! Type and state predicates.

use crate::context::Context;
use crate::errors::codes;
use crate::juice::costs;
use convex_types::{Address, Symbol, Value};

fn pred(ctx: &mut Context, args: &[Value], f: impl FnOnce(&Value) -> bool) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if ctx.charge(costs::SIMPLE_FN) {
        ctx.set_result(Value::Bool(f(&args[0])));
    }
}

pub fn nil_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, |v| matches!(v, Value::Nil));
}

pub fn boolean_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, |v| matches!(v, Value::Bool(_)));
}

pub fn number_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, Value::is_number);
}

pub fn long_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, |v| matches!(v, Value::Long(_)));
}

pub fn double_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, |v| matches!(v, Value::Double(_)));
}

pub fn blob_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, |v| {
        matches!(v, Value::Blob(_) | Value::AccountKey(_))
    });
}

pub fn string_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, |v| matches!(v, Value::String(_)));
}

pub fn symbol_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, |v| matches!(v, Value::Symbol(_)));
}

pub fn keyword_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, |v| matches!(v, Value::Keyword(_)));
}

pub fn address_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, |v| matches!(v, Value::Address(_)));
}

pub fn vector_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, |v| matches!(v, Value::Vector(_)));
}

pub fn list_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, |v| matches!(v, Value::List(_)));
}

pub fn map_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, |v| {
        matches!(v, Value::Map(_) | Value::BlobMap(_))
    });
}

pub fn set_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, |v| matches!(v, Value::Set(_)));
}

pub fn fn_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, |v| {
        matches!(v, Value::Fn(_) | Value::CoreFn(_))
    });
}

pub fn coll_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, |v| {
        matches!(
            v,
            Value::Vector(_) | Value::List(_) | Value::Map(_) | Value::Set(_) | Value::BlobMap(_)
        )
    });
}

pub fn empty_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, |v| v.count() == Some(0));
}

pub fn zero_q(ctx: &mut Context, args: &[Value]) {
    pred(ctx, args, |v| match v {
        Value::Long(n) => *n == 0,
        Value::Byte(b) => *b == 0,
        Value::Double(d) => *d == 0.0,
        _ => false,
    });
}

fn account_arg(ctx: &mut Context, args: &[Value]) -> Option<Address> {
    if args.is_empty() {
        ctx.fail(codes::ARITY, Value::Long(0));
        return None;
    }
    match &args[0] {
        Value::Address(a) => Some(*a),
        other => {
            ctx.fail(codes::CAST, other.clone());
            None
        }
    }
}

/// `account?`: the address names an existing account.
pub fn account_q(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let Some(addr) = account_arg(ctx, args) else {
        return;
    };
    let exists = ctx.account(addr).is_some();
    ctx.set_result(Value::Bool(exists));
}

/// `actor?`: the address names an account without a signing key.
pub fn actor_q(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let Some(addr) = account_arg(ctx, args) else {
        return;
    };
    let is_actor = ctx.account(addr).is_some_and(|a| a.is_actor());
    ctx.set_result(Value::Bool(is_actor));
}

/// `callable?`: the symbol is exported for cross-account calls on the
/// target account.
pub fn callable_q(ctx: &mut Context, args: &[Value]) {
    if args.len() != 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let Some(addr) = account_arg(ctx, args) else {
        return;
    };
    let Value::Symbol(sym) = &args[1] else {
        ctx.fail(codes::CAST, args[1].clone());
        return;
    };
    let callable = ctx
        .account(addr)
        .is_some_and(|a| a.is_callable(sym));
    ctx.set_result(Value::Bool(callable));
}

// Re-exported for use by other runtime modules.
pub(crate) fn symbol_arg<'a>(ctx: &mut Context, v: &'a Value) -> Option<&'a Symbol> {
    match v {
        Value::Symbol(s) => Some(s),
        other => {
            ctx.fail(codes::CAST, other.clone());
            None
        }
    }
}
