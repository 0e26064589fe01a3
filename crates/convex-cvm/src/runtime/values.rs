//! Value casts and conversions that are not part of the numeric tower:
//! blobs, addresses, names, string building and hashing.

use crate::context::Context;
use crate::errors::codes;
use crate::juice::costs;
use convex_types::{value_hash, Address, Blob, Keyword, Str, Symbol, Syntax, Value};

fn arity1<'a>(ctx: &mut Context, args: &'a [Value]) -> Option<&'a Value> {
    if args.len() == 1 {
        Some(&args[0])
    } else {
        ctx.fail(codes::ARITY, Value::Long(args.len() as i64));
        None
    }
}

/// `blob`: cast to an opaque byte cell.
pub fn cast_blob(ctx: &mut Context, args: &[Value]) {
    let Some(v) = arity1(ctx, args) else { return };
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let out = match v {
        Value::Blob(b) => Some(b.clone()),
        Value::AccountKey(k) => Some(Blob::from_bytes(k.as_bytes())),
        Value::Address(a) => Some(Blob::from_bytes(&a.to_key_bytes())),
        Value::Long(n) => Some(Blob::from_bytes(&n.to_be_bytes())),
        Value::String(s) => Some(Blob::from_bytes(s.to_string_value().as_bytes())),
        _ => None,
    };
    match out {
        Some(b) => ctx.set_result(Value::Blob(b)),
        None => ctx.fail(codes::CAST, v.clone()),
    }
}

/// `address`: cast to an account address.
pub fn cast_address(ctx: &mut Context, args: &[Value]) {
    let Some(v) = arity1(ctx, args) else { return };
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let out = match v {
        Value::Address(a) => Some(*a),
        Value::Long(n) if *n >= 0 => Some(Address::new(*n as u64)),
        Value::Blob(b) if b.len() == 8 => {
            let bytes: [u8; 8] = b.to_vec().try_into().expect("8 bytes");
            Some(Address::new(u64::from_be_bytes(bytes)))
        }
        _ => None,
    };
    match out {
        Some(a) => ctx.set_result(Value::Address(a)),
        None => ctx.fail(codes::CAST, v.clone()),
    }
}

/// `keyword`: cast from symbols, strings and keywords.
pub fn cast_keyword(ctx: &mut Context, args: &[Value]) {
    let Some(v) = arity1(ctx, args) else { return };
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let name = match v {
        Value::Keyword(k) => Some(k.name().to_owned()),
        Value::Symbol(s) => Some(s.name().to_owned()),
        Value::String(s) => Some(s.to_string_value()),
        _ => None,
    };
    match name.and_then(|n| Keyword::new(&n).ok()) {
        Some(k) => ctx.set_result(Value::Keyword(k)),
        None => ctx.fail(codes::CAST, v.clone()),
    }
}

/// `symbol`: cast from keywords, strings and symbols.
pub fn cast_symbol(ctx: &mut Context, args: &[Value]) {
    let Some(v) = arity1(ctx, args) else { return };
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let name = match v {
        Value::Keyword(k) => Some(k.name().to_owned()),
        Value::Symbol(s) => Some(s.name().to_owned()),
        Value::String(s) => Some(s.to_string_value()),
        _ => None,
    };
    match name.and_then(|n| Symbol::new(&n).ok()) {
        Some(s) => ctx.set_result(Value::Symbol(s)),
        None => ctx.fail(codes::CAST, v.clone()),
    }
}

/// Raw text of a value for string building: strings contribute their
/// text, everything else its printed form.
fn raw_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.to_string_value(),
        Value::Nil => String::new(),
        Value::Char(c) => c.to_string(),
        other => other.to_string(),
    }
}

/// `str`: concatenate printed forms.
pub fn str_fn(ctx: &mut Context, args: &[Value]) {
    if !ctx.charge(costs::BUILD_DATA + args.len() as u64 * costs::BUILD_PER_ELEMENT) {
        return;
    }
    let mut out = String::new();
    for a in args {
        out.push_str(&raw_text(a));
    }
    ctx.set_result(Value::String(Str::from_str(&out)));
}

/// `name`: the name of a symbol, keyword or string.
pub fn name(ctx: &mut Context, args: &[Value]) {
    let Some(v) = arity1(ctx, args) else { return };
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let out = match v {
        Value::Symbol(s) => Some(s.name().to_owned()),
        Value::Keyword(k) => Some(k.name().to_owned()),
        Value::String(s) => Some(s.to_string_value()),
        _ => None,
    };
    match out {
        Some(n) => ctx.set_result(Value::string(&n)),
        None => ctx.fail(codes::CAST, v.clone()),
    }
}

/// `hash`: the SHA3-256 cell identity as a 32-byte blob.
pub fn hash_fn(ctx: &mut Context, args: &[Value]) {
    let Some(v) = arity1(ctx, args) else { return };
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    let h = value_hash(v);
    ctx.set_result(Value::Blob(Blob::from_bytes(h.as_bytes())));
}

/// `syntax`: wrap a value with metadata.
pub fn syntax_fn(ctx: &mut Context, args: &[Value]) {
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    match args {
        [v] => ctx.set_result(Value::Syntax(Syntax::new(
            v.clone(),
            convex_types::Map::empty(),
        ))),
        [v, Value::Map(m)] => {
            ctx.set_result(Value::Syntax(Syntax::new(v.clone(), m.clone())));
        }
        [_, other] => ctx.fail(codes::CAST, other.clone()),
        _ => ctx.fail(codes::ARITY, Value::Long(args.len() as i64)),
    }
}

/// `meta`: the metadata of a syntax value.
pub fn meta_fn(ctx: &mut Context, args: &[Value]) {
    let Some(v) = arity1(ctx, args) else { return };
    if !ctx.charge(costs::SIMPLE_FN) {
        return;
    }
    match v {
        Value::Syntax(s) => ctx.set_result(Value::Map(s.meta().clone())),
        _ => ctx.set_result(Value::Nil),
    }
}
