//! Numeric tower: longs promote to big integers on overflow, doubles are
//! contagious, and big-integer arithmetic charges juice by operand size.

use crate::context::Context;
use crate::errors::codes;
use crate::juice::costs;
use convex_types::Value;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

/// A number lifted out of a value.
enum Num {
    Long(i64),
    Big(BigInt),
    Double(f64),
}

fn to_num(v: &Value) -> Option<Num> {
    match v {
        Value::Long(n) => Some(Num::Long(*n)),
        Value::Byte(b) => Some(Num::Long(i64::from(*b))),
        Value::BigInt(b) => Some(Num::Big((*b.0).clone())),
        Value::Double(d) => Some(Num::Double(*d)),
        _ => None,
    }
}

fn num_value(n: Num) -> Value {
    match n {
        Num::Long(v) => Value::Long(v),
        Num::Big(b) => Value::integer(b),
        Num::Double(d) => Value::Double(d),
    }
}

fn to_f64(n: &Num) -> f64 {
    match n {
        Num::Long(v) => *v as f64,
        Num::Big(b) => b.to_f64().unwrap_or(f64::INFINITY),
        Num::Double(d) => *d,
    }
}

fn to_big(n: &Num) -> BigInt {
    match n {
        Num::Long(v) => BigInt::from(*v),
        Num::Big(b) => b.clone(),
        Num::Double(_) => unreachable!("double handled before integer path"),
    }
}

/// Charges arithmetic juice: base plus a per-byte surcharge for big
/// operands.
fn charge_numeric(ctx: &mut Context, args: &[Value]) -> bool {
    let mut cost = costs::ARITHMETIC;
    for a in args {
        if let Value::BigInt(b) = a {
            cost += b.byte_length() * costs::NUMERIC_PER_BYTE;
        }
    }
    ctx.charge(cost)
}

/// Pulls numbers out of args, raising `:CAST` on the first non-number.
fn numeric_args(ctx: &mut Context, args: &[Value]) -> Option<Vec<Num>> {
    let mut out = Vec::with_capacity(args.len());
    for a in args {
        match to_num(a) {
            Some(n) => out.push(n),
            None => {
                ctx.fail(codes::CAST, a.clone());
                return None;
            }
        }
    }
    Some(out)
}

fn fold_add(a: Num, b: Num) -> Num {
    match (&a, &b) {
        (Num::Double(_), _) | (_, Num::Double(_)) => Num::Double(to_f64(&a) + to_f64(&b)),
        (Num::Long(x), Num::Long(y)) => match x.checked_add(*y) {
            Some(v) => Num::Long(v),
            None => Num::Big(BigInt::from(*x) + BigInt::from(*y)),
        },
        _ => Num::Big(to_big(&a) + to_big(&b)),
    }
}

fn fold_mul(a: Num, b: Num) -> Num {
    match (&a, &b) {
        (Num::Double(_), _) | (_, Num::Double(_)) => Num::Double(to_f64(&a) * to_f64(&b)),
        (Num::Long(x), Num::Long(y)) => match x.checked_mul(*y) {
            Some(v) => Num::Long(v),
            None => Num::Big(BigInt::from(*x) * BigInt::from(*y)),
        },
        _ => Num::Big(to_big(&a) * to_big(&b)),
    }
}

fn negate(n: Num) -> Num {
    match n {
        Num::Long(v) => match v.checked_neg() {
            Some(x) => Num::Long(x),
            None => Num::Big(-BigInt::from(v)),
        },
        Num::Big(b) => Num::Big(-b),
        Num::Double(d) => Num::Double(-d),
    }
}

pub fn add(ctx: &mut Context, args: &[Value]) {
    if !charge_numeric(ctx, args) {
        return;
    }
    let Some(nums) = numeric_args(ctx, args) else {
        return;
    };
    let mut acc = Num::Long(0);
    for n in nums {
        acc = fold_add(acc, n);
    }
    ctx.set_result(num_value(acc));
}

pub fn sub(ctx: &mut Context, args: &[Value]) {
    if !charge_numeric(ctx, args) {
        return;
    }
    if args.is_empty() {
        ctx.fail(codes::ARITY, Value::Long(0));
        return;
    }
    let Some(mut nums) = numeric_args(ctx, args) else {
        return;
    };
    if nums.len() == 1 {
        let n = nums.remove(0);
        ctx.set_result(num_value(negate(n)));
        return;
    }
    let mut iter = nums.into_iter();
    let mut acc = iter.next().expect("non-empty");
    for n in iter {
        acc = fold_add(acc, negate(n));
    }
    ctx.set_result(num_value(acc));
}

pub fn mul(ctx: &mut Context, args: &[Value]) {
    if !charge_numeric(ctx, args) {
        return;
    }
    let Some(nums) = numeric_args(ctx, args) else {
        return;
    };
    let mut acc = Num::Long(1);
    for n in nums {
        acc = fold_mul(acc, n);
    }
    ctx.set_result(num_value(acc));
}

/// `/` is double division.
pub fn div(ctx: &mut Context, args: &[Value]) {
    if !charge_numeric(ctx, args) {
        return;
    }
    if args.is_empty() {
        ctx.fail(codes::ARITY, Value::Long(0));
        return;
    }
    let Some(nums) = numeric_args(ctx, args) else {
        return;
    };
    let mut iter = nums.iter();
    let first = to_f64(iter.next().expect("non-empty"));
    let mut acc = if nums.len() == 1 { 1.0 / first } else { first };
    for n in iter {
        acc /= to_f64(n);
    }
    ctx.set_result(Value::Double(acc));
}

/// Numeric comparison of two numbers; `None` for an unordered (NaN)
/// comparison.
fn cmp(a: &Num, b: &Num) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Num::Double(_), _) | (_, Num::Double(_)) => to_f64(a).partial_cmp(&to_f64(b)),
        (Num::Long(x), Num::Long(y)) => Some(x.cmp(y)),
        _ => Some(to_big(a).cmp(&to_big(b))),
    }
}

/// `==` numeric equality: 0.0 == -0.0, NaN != NaN, longs compare with
/// doubles by value.
pub fn num_equals(ctx: &mut Context, args: &[Value]) {
    if !charge_numeric(ctx, args) {
        return;
    }
    let Some(nums) = numeric_args(ctx, args) else {
        return;
    };
    let ok = nums
        .windows(2)
        .all(|w| cmp(&w[0], &w[1]) == Some(std::cmp::Ordering::Equal));
    ctx.set_result(Value::Bool(ok));
}

fn chain(ctx: &mut Context, args: &[Value], ok: impl Fn(std::cmp::Ordering) -> bool) {
    if !charge_numeric(ctx, args) {
        return;
    }
    let Some(nums) = numeric_args(ctx, args) else {
        return;
    };
    let holds = nums
        .windows(2)
        .all(|w| cmp(&w[0], &w[1]).map(&ok).unwrap_or(false));
    ctx.set_result(Value::Bool(holds));
}

pub fn lt(ctx: &mut Context, args: &[Value]) {
    chain(ctx, args, std::cmp::Ordering::is_lt);
}

pub fn gt(ctx: &mut Context, args: &[Value]) {
    chain(ctx, args, std::cmp::Ordering::is_gt);
}

pub fn le(ctx: &mut Context, args: &[Value]) {
    chain(ctx, args, std::cmp::Ordering::is_le);
}

pub fn ge(ctx: &mut Context, args: &[Value]) {
    chain(ctx, args, std::cmp::Ordering::is_ge);
}

/// `min`/`max` propagate NaN, matching IEEE totality expectations for
/// the tower.
fn extremum(ctx: &mut Context, args: &[Value], want: std::cmp::Ordering) {
    if !charge_numeric(ctx, args) {
        return;
    }
    if args.is_empty() {
        ctx.fail(codes::ARITY, Value::Long(0));
        return;
    }
    let Some(nums) = numeric_args(ctx, args) else {
        return;
    };
    if nums.iter().any(|n| matches!(n, Num::Double(d) if d.is_nan())) {
        ctx.set_result(Value::Double(f64::NAN));
        return;
    }
    let mut iter = nums.into_iter();
    let mut best = iter.next().expect("non-empty");
    for n in iter {
        if cmp(&n, &best) == Some(want) {
            best = n;
        }
    }
    ctx.set_result(num_value(best));
}

pub fn min(ctx: &mut Context, args: &[Value]) {
    extremum(ctx, args, std::cmp::Ordering::Less);
}

pub fn max(ctx: &mut Context, args: &[Value]) {
    extremum(ctx, args, std::cmp::Ordering::Greater);
}

pub fn inc(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    add(ctx, &[args[0].clone(), Value::Long(1)]);
}

pub fn dec(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    add(ctx, &[args[0].clone(), Value::Long(-1)]);
}

pub fn abs(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !charge_numeric(ctx, args) {
        return;
    }
    let Some(mut nums) = numeric_args(ctx, args) else {
        return;
    };
    let v = match nums.remove(0) {
        Num::Long(v) => match v.checked_abs() {
            Some(a) => Value::Long(a),
            None => Value::integer(-BigInt::from(v)),
        },
        Num::Big(b) => Value::integer(b.abs()),
        Num::Double(d) => Value::Double(d.abs()),
    };
    ctx.set_result(v);
}

pub fn signum(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !charge_numeric(ctx, args) {
        return;
    }
    let Some(mut nums) = numeric_args(ctx, args) else {
        return;
    };
    let v = match nums.remove(0) {
        Num::Long(v) => Value::Long(v.signum()),
        Num::Big(b) => Value::Long(if b.is_zero() {
            0
        } else if b.is_negative() {
            -1
        } else {
            1
        }),
        Num::Double(d) => {
            if d.is_nan() {
                Value::Double(f64::NAN)
            } else {
                Value::Double(d.signum())
            }
        }
    };
    ctx.set_result(v);
}

/// Integer division helpers: `quot` truncates, `rem` is the truncated
/// remainder, `mod` is the floored remainder.
fn int_pair(ctx: &mut Context, args: &[Value]) -> Option<(BigInt, BigInt)> {
    if args.len() != 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return None;
    }
    if !charge_numeric(ctx, args) {
        return None;
    }
    let mut out = Vec::with_capacity(2);
    for a in args {
        match a {
            Value::Long(v) => out.push(BigInt::from(*v)),
            Value::Byte(b) => out.push(BigInt::from(*b)),
            Value::BigInt(b) => out.push((*b.0).clone()),
            other => {
                ctx.fail(codes::CAST, other.clone());
                return None;
            }
        }
    }
    let b = out.pop().expect("two");
    let a = out.pop().expect("two");
    if b.is_zero() {
        ctx.fail(codes::ARGUMENT, Value::string("division by zero"));
        return None;
    }
    Some((a, b))
}

pub fn quot(ctx: &mut Context, args: &[Value]) {
    let Some((a, b)) = int_pair(ctx, args) else {
        return;
    };
    ctx.set_result(Value::integer(&a / &b));
}

pub fn rem(ctx: &mut Context, args: &[Value]) {
    let Some((a, b)) = int_pair(ctx, args) else {
        return;
    };
    ctx.set_result(Value::integer(&a % &b));
}

pub fn modulo(ctx: &mut Context, args: &[Value]) {
    let Some((a, b)) = int_pair(ctx, args) else {
        return;
    };
    let mut m = &a % &b;
    if !m.is_zero() && (m.is_negative() != b.is_negative()) {
        m += &b;
    }
    ctx.set_result(Value::integer(m));
}

/// `=` structural cell equality.
pub fn equals(ctx: &mut Context, args: &[Value]) {
    if !ctx.charge(costs::EQUALS) {
        return;
    }
    let ok = args.windows(2).all(|w| w[0] == w[1]);
    ctx.set_result(Value::Bool(ok));
}

// =============================================================================
// CASTS
// =============================================================================

fn arity1<'a>(ctx: &mut Context, args: &'a [Value]) -> Option<&'a Value> {
    if args.len() == 1 {
        Some(&args[0])
    } else {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        None
    }
}

/// Cast to a signed 64-bit long. Blobs reinterpret their trailing 8
/// bytes as a big-endian two's-complement value.
pub fn cast_long(ctx: &mut Context, args: &[Value]) {
    let Some(v) = arity1(ctx, args) else { return };
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let out = match v {
        Value::Long(n) => Some(*n),
        Value::Byte(b) => Some(i64::from(*b)),
        Value::Char(c) => Some(i64::from(u32::from(*c))),
        Value::Double(d) => {
            if d.is_finite() && *d >= i64::MIN as f64 && *d <= i64::MAX as f64 {
                Some(d.trunc() as i64)
            } else {
                None
            }
        }
        Value::BigInt(b) => b.0.to_i64(),
        Value::Address(a) => Some(a.index() as i64),
        Value::Blob(b) => {
            let bytes = b.to_vec();
            if bytes.len() > 8 {
                None
            } else {
                let mut buf = [0u8; 8];
                buf[8 - bytes.len()..].copy_from_slice(&bytes);
                Some(i64::from_be_bytes(buf))
            }
        }
        _ => None,
    };
    match out {
        Some(n) => ctx.set_result(Value::Long(n)),
        None => ctx.fail(codes::CAST, v.clone()),
    }
}

pub fn cast_double(ctx: &mut Context, args: &[Value]) {
    let Some(v) = arity1(ctx, args) else { return };
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    match to_num(v) {
        Some(n) => ctx.set_result(Value::Double(to_f64(&n))),
        None => ctx.fail(codes::CAST, v.clone()),
    }
}

pub fn cast_byte(ctx: &mut Context, args: &[Value]) {
    let Some(v) = arity1(ctx, args) else { return };
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    match v {
        Value::Byte(b) => ctx.set_result(Value::Byte(*b)),
        Value::Long(n) => ctx.set_result(Value::Byte(*n as u8)),
        other => ctx.fail(codes::CAST, other.clone()),
    }
}

pub fn cast_char(ctx: &mut Context, args: &[Value]) {
    let Some(v) = arity1(ctx, args) else { return };
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    match v {
        Value::Char(c) => ctx.set_result(Value::Char(*c)),
        Value::Long(n) => match u32::try_from(*n).ok().and_then(char::from_u32) {
            Some(c) => ctx.set_result(Value::Char(c)),
            None => ctx.fail(codes::CAST, v.clone()),
        },
        other => ctx.fail(codes::CAST, other.clone()),
    }
}

pub fn cast_boolean(ctx: &mut Context, args: &[Value]) {
    let Some(v) = arity1(ctx, args) else { return };
    if ctx.charge(costs::SIMPLE_FN) {
        ctx.set_result(Value::Bool(v.is_truthy()));
    }
}

pub fn not(ctx: &mut Context, args: &[Value]) {
    let Some(v) = arity1(ctx, args) else { return };
    if ctx.charge(costs::SIMPLE_FN) {
        ctx.set_result(Value::Bool(!v.is_truthy()));
    }
}
