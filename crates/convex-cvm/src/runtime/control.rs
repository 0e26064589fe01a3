//! Control core functions: errors and the non-local exit family. These
//! only construct exceptional values; the structural boundaries in the
//! evaluator decide where each one stops.

use crate::context::Context;
use crate::errors::{codes, ErrorValue, Exceptional};
use crate::juice::costs;
use convex_types::Value;

/// `fail`: raise an error. One keyword argument is a bare code; one
/// other value is an `:ASSERT` with that message; two arguments are
/// code and message.
pub fn fail(ctx: &mut Context, args: &[Value]) {
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let (code, message) = match args {
        [] => (Value::keyword(codes::ASSERT), Value::Nil),
        [Value::Keyword(k)] => (Value::Keyword(k.clone()), Value::Nil),
        [v] => (Value::keyword(codes::ASSERT), v.clone()),
        [code, message] => (code.clone(), message.clone()),
        _ => {
            ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
            return;
        }
    };
    let mut err = ErrorValue::with_code_value(code, message);
    err.address = Some(ctx.address());
    ctx.raise(Exceptional::Error(err));
}

/// `assert`: every argument must be truthy.
pub fn assert_fn(ctx: &mut Context, args: &[Value]) {
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    for a in args {
        if !a.is_truthy() {
            ctx.fail(codes::ASSERT, a.clone());
            return;
        }
    }
    ctx.set_result(Value::Bool(true));
}

fn optional_payload(ctx: &mut Context, args: &[Value]) -> Option<Value> {
    match args.len() {
        0 => Some(Value::Nil),
        1 => Some(args[0].clone()),
        n => {
            ctx.fail(codes::ARITY, Value::Long(n as i64));
            None
        }
    }
}

/// `halt`: end execution in the current call keeping state changes.
pub fn halt(ctx: &mut Context, args: &[Value]) {
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    if let Some(v) = optional_payload(ctx, args) {
        ctx.raise(Exceptional::Halt(v));
    }
}

/// `rollback`: end execution in the current call discarding state
/// changes.
pub fn rollback(ctx: &mut Context, args: &[Value]) {
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    if let Some(v) = optional_payload(ctx, args) {
        ctx.raise(Exceptional::Rollback(v));
    }
}

/// `return`: unwind to the enclosing function boundary.
pub fn return_fn(ctx: &mut Context, args: &[Value]) {
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    if let Some(v) = optional_payload(ctx, args) {
        ctx.raise(Exceptional::Return(v));
    }
}

/// `recur`: re-enter the nearest function body or loop.
pub fn recur(ctx: &mut Context, args: &[Value]) {
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    ctx.raise(Exceptional::Recur(args.to_vec()));
}

/// `tailcall`: replace the current function invocation.
pub fn tailcall(ctx: &mut Context, args: &[Value]) {
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    if args.is_empty() {
        ctx.fail(codes::ARITY, Value::Long(0));
        return;
    }
    ctx.raise(Exceptional::TailCall {
        func: args[0].clone(),
        args: args[1..].to_vec(),
    });
}

/// `reduced`: short-circuit the enclosing reduce.
pub fn reduced(ctx: &mut Context, args: &[Value]) {
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    ctx.raise(Exceptional::Reduced(args[0].clone()));
}
