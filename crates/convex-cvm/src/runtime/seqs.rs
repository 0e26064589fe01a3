//! Collection core functions: constructors, access, update, sequence
//! traversal, reduce and friends.

use crate::context::Context;
use crate::errors::{codes, Exceptional};
use crate::exec;
use crate::juice::costs;
use convex_types::{blob_key_bytes, BlobMap, List, Map, Set, Value, Vector};

fn charge_build(ctx: &mut Context, n: usize) -> bool {
    ctx.charge(costs::BUILD_DATA + n as u64 * costs::BUILD_PER_ELEMENT)
}

/// Sequence elements of a value, when it is sequential.
fn elements(v: &Value) -> Option<Vec<Value>> {
    match v {
        Value::Nil => Some(Vec::new()),
        Value::Vector(x) => Some(x.to_vec()),
        Value::List(l) => Some(l.to_vec()),
        Value::Set(s) => Some(s.members()),
        Value::Map(m) => Some(
            m.entries()
                .into_iter()
                .map(|(k, val)| {
                    Value::Vector(Vector::from_values(vec![k, val]))
                })
                .collect(),
        ),
        Value::BlobMap(m) => Some(
            m.entries()
                .into_iter()
                .map(|(k, val)| {
                    Value::Vector(Vector::from_values(vec![k, val]))
                })
                .collect(),
        ),
        _ => None,
    }
}

pub fn vector(ctx: &mut Context, args: &[Value]) {
    if charge_build(ctx, args.len()) {
        ctx.set_result(Value::Vector(Vector::from_values(args.to_vec())));
    }
}

pub fn list(ctx: &mut Context, args: &[Value]) {
    if charge_build(ctx, args.len()) {
        ctx.set_result(Value::List(List::from_values(args.to_vec())));
    }
}

pub fn hash_map(ctx: &mut Context, args: &[Value]) {
    if !charge_build(ctx, args.len()) {
        return;
    }
    if args.len() % 2 != 0 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    let mut m = Map::empty();
    for pair in args.chunks(2) {
        m = m.assoc(pair[0].clone(), pair[1].clone());
    }
    ctx.set_result(Value::Map(m));
}

pub fn hash_set(ctx: &mut Context, args: &[Value]) {
    if charge_build(ctx, args.len()) {
        ctx.set_result(Value::Set(Set::from_values(args.to_vec())));
    }
}

pub fn blob_map(ctx: &mut Context, args: &[Value]) {
    if !charge_build(ctx, args.len()) {
        return;
    }
    if args.len() % 2 != 0 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    let mut m = BlobMap::empty();
    for pair in args.chunks(2) {
        match m.assoc(pair[0].clone(), pair[1].clone()) {
            Some(next) => m = next,
            None => {
                ctx.fail(codes::ARGUMENT, pair[0].clone());
                return;
            }
        }
    }
    ctx.set_result(Value::BlobMap(m));
}

/// `conj`: append to a vector, prepend to a list, include in a set,
/// insert a `[k v]` entry into a map.
pub fn conj(ctx: &mut Context, args: &[Value]) {
    if args.len() != 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !charge_build(ctx, 1) {
        return;
    }
    let item = args[1].clone();
    match &args[0] {
        Value::Nil => ctx.set_result(Value::Vector(Vector::from_values(vec![item]))),
        Value::Vector(v) => ctx.set_result(Value::Vector(v.conj(item))),
        Value::List(l) => ctx.set_result(Value::List(l.cons(item))),
        Value::Set(s) => ctx.set_result(Value::Set(s.include(item))),
        Value::Map(m) => match &item {
            Value::Vector(pair) if pair.count() == 2 => {
                let k = pair.get(0).expect("two elements");
                let v = pair.get(1).expect("two elements");
                ctx.set_result(Value::Map(m.assoc(k, v)));
            }
            other => ctx.fail(codes::CAST, other.clone()),
        },
        other => ctx.fail(codes::CAST, other.clone()),
    }
}

pub fn cons(ctx: &mut Context, args: &[Value]) {
    if args.len() != 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !charge_build(ctx, 1) {
        return;
    }
    let head = args[0].clone();
    match elements(&args[1]) {
        Some(mut items) => {
            items.insert(0, head);
            ctx.set_result(Value::List(List::from_values(items)));
        }
        None => ctx.fail(codes::CAST, args[1].clone()),
    }
}

/// `get` with optional default. Works on maps, blob maps, vectors (by
/// index), sets (membership) and nil.
pub fn get(ctx: &mut Context, args: &[Value]) {
    if args.len() < 2 || args.len() > 3 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let default = args.get(2).cloned().unwrap_or(Value::Nil);
    let key = &args[1];
    let found = match &args[0] {
        Value::Nil => None,
        Value::Map(m) => m.get(key),
        Value::BlobMap(m) => m.get(key),
        Value::Vector(v) => match key {
            Value::Long(i) if *i >= 0 => v.get(*i as u64),
            _ => None,
        },
        Value::Set(s) => {
            if s.contains(key) {
                Some(key.clone())
            } else {
                None
            }
        }
        other => {
            ctx.fail(codes::CAST, other.clone());
            return;
        }
    };
    ctx.set_result(found.unwrap_or(default));
}

pub fn assoc(ctx: &mut Context, args: &[Value]) {
    if args.len() != 3 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !charge_build(ctx, 1) {
        return;
    }
    let (k, v) = (args[1].clone(), args[2].clone());
    match &args[0] {
        Value::Nil => ctx.set_result(Value::Map(Map::empty().assoc(k, v))),
        Value::Map(m) => ctx.set_result(Value::Map(m.assoc(k, v))),
        Value::BlobMap(m) => match m.assoc(k, v) {
            Some(next) => ctx.set_result(Value::BlobMap(next)),
            None => ctx.fail(codes::ARGUMENT, args[1].clone()),
        },
        Value::Vector(vec) => match &k {
            Value::Long(i) if *i >= 0 => match vec.assoc(*i as u64, v) {
                Some(next) => ctx.set_result(Value::Vector(next)),
                None => ctx.fail(codes::ARGUMENT, k.clone()),
            },
            other => ctx.fail(codes::CAST, other.clone()),
        },
        other => ctx.fail(codes::CAST, other.clone()),
    }
}

pub fn dissoc(ctx: &mut Context, args: &[Value]) {
    if args.len() != 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !charge_build(ctx, 1) {
        return;
    }
    match &args[0] {
        Value::Nil => ctx.set_result(Value::Nil),
        Value::Map(m) => ctx.set_result(Value::Map(m.dissoc(&args[1]))),
        Value::BlobMap(m) => ctx.set_result(Value::BlobMap(m.dissoc(&args[1]))),
        other => ctx.fail(codes::CAST, other.clone()),
    }
}

pub fn count(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    match args[0].count() {
        Some(n) => ctx.set_result(Value::Long(n as i64)),
        None => ctx.fail(codes::CAST, args[0].clone()),
    }
}

pub fn empty(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let out = match &args[0] {
        Value::Nil => Value::Nil,
        Value::Vector(_) => Value::Vector(Vector::empty()),
        Value::List(_) => Value::List(List::empty()),
        Value::Map(_) => Value::Map(Map::empty()),
        Value::Set(_) => Value::Set(Set::empty()),
        Value::BlobMap(_) => Value::BlobMap(BlobMap::empty()),
        other => {
            ctx.fail(codes::CAST, other.clone());
            return;
        }
    };
    ctx.set_result(out);
}

pub fn first(ctx: &mut Context, args: &[Value]) {
    nth_impl(ctx, args, 0, "first");
}

pub fn second(ctx: &mut Context, args: &[Value]) {
    nth_impl(ctx, args, 1, "second");
}

fn nth_impl(ctx: &mut Context, args: &[Value], index: u64, what: &str) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::string(what));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    match elements(&args[0]) {
        Some(items) => match items.get(index as usize) {
            Some(v) => ctx.set_result(v.clone()),
            None => ctx.fail(codes::BOUNDS, Value::Long(index as i64)),
        },
        None => ctx.fail(codes::CAST, args[0].clone()),
    }
}

pub fn last(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    match elements(&args[0]) {
        Some(items) => match items.last() {
            Some(v) => ctx.set_result(v.clone()),
            None => ctx.fail(codes::BOUNDS, Value::Long(-1)),
        },
        None => ctx.fail(codes::CAST, args[0].clone()),
    }
}

/// `next`: the sequence without its first element, nil when that is
/// empty.
pub fn next(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    match &args[0] {
        Value::Vector(v) => match v.next() {
            Some(n) => ctx.set_result(Value::Vector(n)),
            None => ctx.set_result(Value::Nil),
        },
        Value::List(l) => match l.next() {
            Some(n) => ctx.set_result(Value::List(n)),
            None => ctx.set_result(Value::Nil),
        },
        Value::Nil => ctx.set_result(Value::Nil),
        other => match elements(other) {
            Some(items) if items.len() > 1 => {
                ctx.set_result(Value::Vector(Vector::from_values(items[1..].to_vec())));
            }
            Some(_) => ctx.set_result(Value::Nil),
            None => ctx.fail(codes::CAST, other.clone()),
        },
    }
}

pub fn nth(ctx: &mut Context, args: &[Value]) {
    if args.len() != 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let Value::Long(i) = &args[1] else {
        ctx.fail(codes::CAST, args[1].clone());
        return;
    };
    if *i < 0 {
        ctx.fail(codes::BOUNDS, args[1].clone());
        return;
    }
    match elements(&args[0]) {
        Some(items) => match items.get(*i as usize) {
            Some(v) => ctx.set_result(v.clone()),
            None => ctx.fail(codes::BOUNDS, args[1].clone()),
        },
        None => ctx.fail(codes::CAST, args[0].clone()),
    }
}

pub fn concat(ctx: &mut Context, args: &[Value]) {
    let mut all = Vec::new();
    let mut as_list = false;
    for (i, a) in args.iter().enumerate() {
        match elements(a) {
            Some(items) => {
                if i == 0 {
                    as_list = matches!(a, Value::List(_));
                }
                all.extend(items);
            }
            None => {
                ctx.fail(codes::CAST, a.clone());
                return;
            }
        }
    }
    if !charge_build(ctx, all.len()) {
        return;
    }
    if as_list {
        ctx.set_result(Value::List(List::from_values(all)));
    } else {
        ctx.set_result(Value::Vector(Vector::from_values(all)));
    }
}

/// `into`: pour a sequence into a collection with repeated conj.
pub fn into(ctx: &mut Context, args: &[Value]) {
    if args.len() != 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    let Some(items) = elements(&args[1]) else {
        ctx.fail(codes::CAST, args[1].clone());
        return;
    };
    if !charge_build(ctx, items.len()) {
        return;
    }
    let mut acc = args[0].clone();
    for item in items {
        conj(ctx, &[acc, item]);
        if !ctx.is_live() {
            return;
        }
        acc = ctx.result().clone();
    }
    ctx.set_result(acc);
}

pub fn keys(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    match &args[0] {
        Value::Map(m) => ctx.set_result(Value::Vector(Vector::from_values(m.keys()))),
        Value::BlobMap(m) => {
            let ks = m.entries().into_iter().map(|(k, _)| k).collect();
            ctx.set_result(Value::Vector(Vector::from_values(ks)));
        }
        other => ctx.fail(codes::CAST, other.clone()),
    }
}

pub fn vals(ctx: &mut Context, args: &[Value]) {
    if args.len() != 1 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    match &args[0] {
        Value::Map(m) => ctx.set_result(Value::Vector(Vector::from_values(m.values()))),
        Value::BlobMap(m) => {
            let vs = m.entries().into_iter().map(|(_, v)| v).collect();
            ctx.set_result(Value::Vector(Vector::from_values(vs)));
        }
        other => ctx.fail(codes::CAST, other.clone()),
    }
}

/// `reduce` with `reduced` short-circuit.
pub fn reduce(ctx: &mut Context, args: &[Value]) {
    if args.len() != 3 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let f = args[0].clone();
    let Some(items) = elements(&args[2]) else {
        ctx.fail(codes::CAST, args[2].clone());
        return;
    };
    let mut acc = args[1].clone();
    for item in items {
        exec::apply(ctx, f.clone(), vec![acc, item]);
        if matches!(ctx.exception(), Some(Exceptional::Reduced(_))) {
            if let Some(Exceptional::Reduced(v)) = ctx.take_exception() {
                ctx.set_result(v);
                return;
            }
        }
        if !ctx.is_live() {
            return;
        }
        acc = ctx.result().clone();
    }
    ctx.set_result(acc);
}

/// `map` over one or more sequences, zipping to the shortest.
pub fn map_fn(ctx: &mut Context, args: &[Value]) {
    if args.len() < 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    let f = args[0].clone();
    let mut seqs = Vec::with_capacity(args.len() - 1);
    for a in &args[1..] {
        match elements(a) {
            Some(items) => seqs.push(items),
            None => {
                ctx.fail(codes::CAST, a.clone());
                return;
            }
        }
    }
    let n = seqs.iter().map(Vec::len).min().unwrap_or(0);
    if !charge_build(ctx, n) {
        return;
    }
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let call_args: Vec<Value> = seqs.iter().map(|s| s[i].clone()).collect();
        exec::apply(ctx, f.clone(), call_args);
        if !ctx.is_live() {
            return;
        }
        out.push(ctx.result().clone());
    }
    ctx.set_result(Value::Vector(Vector::from_values(out)));
}

/// `apply`: call a function with leading arguments plus a trailing
/// sequence of the rest.
pub fn apply_fn(ctx: &mut Context, args: &[Value]) {
    if args.is_empty() {
        ctx.fail(codes::ARITY, Value::Long(0));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let f = args[0].clone();
    let mut call_args = Vec::new();
    if args.len() > 1 {
        call_args.extend(args[1..args.len() - 1].iter().cloned());
        match elements(&args[args.len() - 1]) {
            Some(items) => call_args.extend(items),
            None => {
                ctx.fail(codes::CAST, args[args.len() - 1].clone());
                return;
            }
        }
    }
    exec::apply(ctx, f, call_args);
}

pub fn contains_key(ctx: &mut Context, args: &[Value]) {
    if args.len() != 2 {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        return;
    }
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let has = match &args[0] {
        Value::Nil => false,
        Value::Map(m) => m.contains_key(&args[1]),
        Value::BlobMap(m) => blob_key_bytes(&args[1])
            .map(|b| m.get_bytes(&b).is_some())
            .unwrap_or(false),
        Value::Set(s) => s.contains(&args[1]),
        Value::Vector(v) => match &args[1] {
            Value::Long(i) => *i >= 0 && (*i as u64) < v.count(),
            _ => false,
        },
        other => {
            ctx.fail(codes::CAST, other.clone());
            return;
        }
    };
    ctx.set_result(Value::Bool(has));
}
