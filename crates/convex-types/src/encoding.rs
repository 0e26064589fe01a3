//! # Canonical Encoding
//!
//! `encode` maps every cell to its unique byte form: a tag byte followed
//! by type-specific payload. Child cells appear either inline (when
//! embedded) or as `[REF, tag, hash]` markers. A cell's hash is the
//! SHA3-256 of its full encoding; heavy cells cache encoding, hash,
//! embedded flag and memory size behind their sharing `Arc`.

use crate::cache::CellMeta;
use crate::hash::Hash;
use crate::ops::{FnClause, FnTemplate, Op};
use crate::records::{Record, TxBody};
use crate::tags;
use crate::value::{canonical_double_bits, Value};
use crate::vector::vector_capacity;
use crate::vlc;
use std::sync::Arc;

/// The cache slot for a value, when its representation carries one.
pub(crate) fn cell_meta(v: &Value) -> Option<&CellMeta> {
    match v {
        Value::String(s) => Some(s.meta()),
        Value::Blob(b) => Some(b.meta()),
        Value::Vector(x) => Some(x.meta()),
        Value::Map(m) => Some(m.meta()),
        Value::Set(s) => Some(s.meta()),
        Value::BlobMap(m) => Some(m.meta()),
        Value::Record(r) => Some(record_meta(r)),
        _ => None,
    }
}

fn record_meta(r: &Record) -> &CellMeta {
    match r {
        Record::State(x) => x.meta(),
        Record::Account(x) => x.meta(),
        Record::Peer(x) => x.meta(),
        Record::Block(x) => x.meta(),
        Record::Transaction(x) => x.meta(),
        Record::Result(x) => x.meta(),
        Record::Signed(x) => x.meta(),
        Record::Order(x) => x.meta(),
        Record::Belief(x) => x.meta(),
    }
}

/// Full canonical encoding of a value.
#[must_use]
pub fn value_encoding(v: &Value) -> Arc<[u8]> {
    if let Some(meta) = cell_meta(v) {
        meta.encoding
            .get_or_init(|| compute_encoding(v).into())
            .clone()
    } else {
        compute_encoding(v).into()
    }
}

/// SHA3-256 of the canonical encoding: the cell's identity.
#[must_use]
pub fn value_hash(v: &Value) -> Hash {
    if let Some(meta) = cell_meta(v) {
        *meta
            .hash
            .get_or_init(|| Hash::digest(&value_encoding(v)))
    } else {
        Hash::digest(&value_encoding(v))
    }
}

/// Whether a cell may be inlined into parent encodings: its encoding is at
/// most 140 bytes and every child is itself embedded.
#[must_use]
pub fn is_embedded(v: &Value) -> bool {
    if let Some(meta) = cell_meta(v) {
        *meta.embedded.get_or_init(|| compute_embedded(v))
    } else {
        compute_embedded(v)
    }
}

fn compute_embedded(v: &Value) -> bool {
    value_encoding(v).len() <= tags::MAX_EMBEDDED_LENGTH
        && children(v).iter().all(is_embedded)
}

/// Direct child cells in encoding order.
#[must_use]
pub fn children(v: &Value) -> Vec<Value> {
    let mut out = Vec::new();
    match v {
        Value::Blob(b) => {
            if let Some(cs) = b.tree_children() {
                out.extend(cs.iter().cloned().map(Value::Blob));
            }
        }
        Value::String(s) => {
            if let Some(cs) = s.tree_children() {
                out.extend(cs.iter().cloned().map(Value::String));
            }
        }
        Value::Vector(vec) => {
            if let Some(items) = vec.flat_items() {
                out.extend(items.iter().cloned());
            } else if let Some(cs) = vec.tree_children() {
                out.extend(cs.iter().cloned().map(Value::Vector));
            }
        }
        Value::List(l) => out.extend(l.iter()),
        Value::Map(m) => {
            if let Some(entries) = m.leaf_entries() {
                for (k, val) in entries {
                    out.push(k.clone());
                    out.push(val.clone());
                }
            } else if let Some((_, cs)) = m.tree_parts() {
                out.extend(cs.iter().cloned().map(Value::Map));
            }
        }
        Value::Set(s) => {
            if let Some(members) = s.leaf_members() {
                out.extend(members.iter().cloned());
            } else if let Some((_, cs)) = s.tree_parts() {
                out.extend(cs.iter().cloned().map(Value::Set));
            }
        }
        Value::BlobMap(m) => {
            let rep = &*m.0;
            if let Some((k, val)) = &rep.entry {
                out.push(k.clone());
                out.push(val.clone());
            }
            for (_, c) in &rep.children {
                out.push(Value::BlobMap(c.clone()));
            }
        }
        Value::Syntax(s) => {
            out.push(s.value().clone());
            out.push(Value::Map(s.meta().clone()));
        }
        Value::Op(op) => op_children(op, &mut out),
        Value::Fn(c) => {
            for clause in &c.template().clauses {
                op_children(&clause.body, &mut out);
            }
            out.extend(c.captured().iter().cloned());
        }
        Value::Record(r) => record_children(r, &mut out),
        _ => {}
    }
    out
}

fn op_children(op: &Op, out: &mut Vec<Value>) {
    match op {
        Op::Constant(v) => out.push(v.clone()),
        Op::Lookup { address, .. } => {
            if let Some(a) = address {
                op_children(a, out);
            }
        }
        Op::Local(_) | Op::Special(_) => {}
        Op::SetLocal { op, .. } | Op::Query(op) => op_children(op, out),
        Op::Do(ops) => {
            for o in ops {
                op_children(o, out);
            }
        }
        Op::Cond { clauses, fallback } => {
            for (t, r) in clauses {
                op_children(t, out);
                op_children(r, out);
            }
            if let Some(e) = fallback {
                op_children(e, out);
            }
        }
        Op::Let { bindings, body, .. } => {
            for (_, o) in bindings {
                op_children(o, out);
            }
            for o in body {
                op_children(o, out);
            }
        }
        Op::Lambda(template) => {
            for clause in &template.clauses {
                op_children(&clause.body, out);
            }
        }
        Op::Invoke { func, args } => {
            op_children(func, out);
            for a in args {
                op_children(a, out);
            }
        }
        Op::Def { op, .. } => op_children(op, out),
    }
}

fn record_children(r: &Record, out: &mut Vec<Value>) {
    match r {
        Record::State(s) => {
            out.push(Value::Vector(s.accounts().clone()));
            out.push(Value::BlobMap(s.peers().clone()));
            out.push(Value::Vector(s.globals().to_vector()));
            out.push(Value::BlobMap(s.schedule().clone()));
        }
        Record::Account(a) => {
            out.push(a.controller().clone());
            out.push(Value::Map(a.environment().clone()));
            out.push(Value::Map(a.metadata().clone()));
            out.push(Value::BlobMap(a.holdings().clone()));
        }
        Record::Peer(p) => {
            out.push(p.controller().clone());
            out.push(Value::BlobMap(p.delegated().clone()));
            out.push(Value::Map(p.metadata().clone()));
        }
        Record::Block(b) => out.push(Value::Vector(b.transactions().clone())),
        Record::Transaction(t) => match t.body() {
            TxBody::Invoke(form) => out.push(form.clone()),
            TxBody::Transfer { .. } => {}
            TxBody::Call { args, .. } => out.push(Value::Vector(args.clone())),
        },
        Record::Result(res) => {
            out.push(res.value().clone());
            if let Some(c) = res.error_code() {
                out.push(c.clone());
            }
            out.push(Value::Vector(res.trace().clone()));
            out.push(Value::Map(res.info().clone()));
        }
        Record::Signed(s) => out.push(s.value().clone()),
        Record::Order(o) => out.push(Value::Vector(o.blocks().clone())),
        Record::Belief(b) => out.push(Value::BlobMap(b.orders().clone())),
    }
}

/// First byte of a value's encoding.
#[must_use]
pub fn tag_of(v: &Value) -> u8 {
    match v {
        Value::Nil => tags::NULL,
        Value::Bool(false) => tags::FALSE,
        Value::Bool(true) => tags::TRUE,
        Value::Byte(_) => tags::BYTE,
        Value::Char(_) => tags::CHAR,
        Value::Long(_) => tags::LONG,
        Value::BigInt(_) => tags::BIG_INT,
        Value::Double(_) => tags::DOUBLE,
        Value::Address(_) => tags::ADDRESS,
        Value::Symbol(_) => tags::SYMBOL,
        Value::Keyword(_) => tags::KEYWORD,
        Value::Blob(b) => {
            if b.flat_bytes().is_some() {
                tags::BLOB_FLAT
            } else {
                tags::BLOB_TREE
            }
        }
        Value::String(s) => {
            if s.flat_text().is_some() {
                tags::STRING_FLAT
            } else {
                tags::STRING_TREE
            }
        }
        Value::AccountKey(_) => tags::ACCOUNT_KEY,
        Value::Vector(vec) => {
            if vec.flat_items().is_some() {
                tags::VECTOR_FLAT
            } else {
                tags::VECTOR_TREE
            }
        }
        Value::List(_) => tags::LIST,
        Value::Map(m) => {
            if m.leaf_entries().is_some() {
                tags::MAP_LEAF
            } else {
                tags::MAP_TREE
            }
        }
        Value::Set(s) => {
            if s.leaf_members().is_some() {
                tags::SET_LEAF
            } else {
                tags::SET_TREE
            }
        }
        Value::BlobMap(_) => tags::BLOB_MAP,
        Value::Syntax(_) => tags::SYNTAX,
        Value::Op(_) => tags::OP,
        Value::Fn(_) => tags::CLOSURE,
        Value::CoreFn(_) => tags::CORE_FN,
        Value::Record(r) => match r {
            Record::State(_) => tags::STATE,
            Record::Account(_) => tags::ACCOUNT_STATUS,
            Record::Peer(_) => tags::PEER_STATUS,
            Record::Block(_) => tags::BLOCK,
            Record::Transaction(_) => tags::TRANSACTION,
            Record::Result(_) => tags::RESULT,
            Record::Signed(_) => tags::SIGNED_DATA,
            Record::Order(_) => tags::ORDER,
            Record::Belief(_) => tags::BELIEF,
        },
    }
}

fn compute_encoding(v: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    write_value(&mut buf, v);
    buf
}

/// A child position: the child's full encoding when embedded, otherwise a
/// 34-byte reference marker.
pub(crate) fn write_child(buf: &mut Vec<u8>, child: &Value) {
    if is_embedded(child) {
        buf.extend_from_slice(&value_encoding(child));
    } else {
        buf.push(tags::REF);
        buf.push(tag_of(child));
        buf.extend_from_slice(value_hash(child).as_bytes());
    }
}

fn write_name(buf: &mut Vec<u8>, name: &str) {
    vlc::write_count(buf, name.len() as u64);
    buf.extend_from_slice(name.as_bytes());
}

fn write_value(buf: &mut Vec<u8>, v: &Value) {
    match v {
        Value::Nil => buf.push(tags::NULL),
        Value::Bool(false) => buf.push(tags::FALSE),
        Value::Bool(true) => buf.push(tags::TRUE),
        Value::Byte(b) => {
            buf.push(tags::BYTE);
            buf.push(*b);
        }
        Value::Char(c) => {
            buf.push(tags::CHAR);
            vlc::write_count(buf, u64::from(u32::from(*c)));
        }
        Value::Long(i) => {
            buf.push(tags::LONG);
            vlc::write_long(buf, *i);
        }
        Value::BigInt(b) => {
            let bytes = b.to_canonical_bytes();
            debug_assert!(bytes.len() >= 9, "big integer in long range");
            buf.push(tags::BIG_INT);
            vlc::write_count(buf, bytes.len() as u64);
            buf.extend_from_slice(&bytes);
        }
        Value::Double(d) => {
            buf.push(tags::DOUBLE);
            buf.extend_from_slice(&canonical_double_bits(*d).to_be_bytes());
        }
        Value::Address(a) => {
            buf.push(tags::ADDRESS);
            vlc::write_count(buf, a.index());
        }
        Value::Symbol(s) => {
            buf.push(tags::SYMBOL);
            write_name(buf, s.name());
        }
        Value::Keyword(k) => {
            buf.push(tags::KEYWORD);
            write_name(buf, k.name());
        }
        Value::AccountKey(k) => {
            buf.push(tags::ACCOUNT_KEY);
            buf.extend_from_slice(k.as_bytes());
        }
        Value::Blob(b) => {
            if let Some(bytes) = b.flat_bytes() {
                buf.push(tags::BLOB_FLAT);
                vlc::write_count(buf, bytes.len() as u64);
                buf.extend_from_slice(bytes);
            } else {
                buf.push(tags::BLOB_TREE);
                vlc::write_count(buf, b.len());
                for c in b.tree_children().expect("tree blob") {
                    write_child(buf, &Value::Blob(c.clone()));
                }
            }
        }
        Value::String(s) => {
            if let Some(text) = s.flat_text() {
                buf.push(tags::STRING_FLAT);
                vlc::write_count(buf, text.len() as u64);
                buf.extend_from_slice(text.as_bytes());
            } else {
                let children = s.tree_children().expect("tree string");
                buf.push(tags::STRING_TREE);
                vlc::write_count(buf, s.len());
                vlc::write_count(buf, children.len() as u64);
                for c in children {
                    write_child(buf, &Value::String(c.clone()));
                }
            }
        }
        Value::Vector(vec) => {
            if let Some(items) = vec.flat_items() {
                buf.push(tags::VECTOR_FLAT);
                vlc::write_count(buf, items.len() as u64);
                for item in items {
                    write_child(buf, item);
                }
            } else {
                let count = vec.count();
                let cap = vector_capacity(count);
                buf.push(tags::VECTOR_TREE);
                vlc::write_count(buf, count);
                vlc::write_count(buf, cap.ilog2() as u64 / 4);
                for c in vec.tree_children().expect("tree vector") {
                    write_child(buf, &Value::Vector(c.clone()));
                }
            }
        }
        Value::List(l) => {
            buf.push(tags::LIST);
            vlc::write_count(buf, l.count());
            for item in l.iter() {
                write_child(buf, &item);
            }
        }
        Value::Map(m) => {
            if let Some(entries) = m.leaf_entries() {
                buf.push(tags::MAP_LEAF);
                vlc::write_count(buf, entries.len() as u64);
                for (k, val) in entries {
                    write_child(buf, k);
                    write_child(buf, val);
                }
            } else {
                let (mask, cs) = m.tree_parts().expect("tree map");
                buf.push(tags::MAP_TREE);
                vlc::write_count(buf, m.count());
                buf.extend_from_slice(&mask.to_be_bytes());
                for c in cs {
                    write_child(buf, &Value::Map(c.clone()));
                }
            }
        }
        Value::Set(s) => {
            if let Some(members) = s.leaf_members() {
                buf.push(tags::SET_LEAF);
                vlc::write_count(buf, members.len() as u64);
                for m in members {
                    write_child(buf, m);
                }
            } else {
                let (mask, cs) = s.tree_parts().expect("tree set");
                buf.push(tags::SET_TREE);
                vlc::write_count(buf, s.count());
                buf.extend_from_slice(&mask.to_be_bytes());
                for c in cs {
                    write_child(buf, &Value::Set(c.clone()));
                }
            }
        }
        Value::BlobMap(m) => {
            let rep = &*m.0;
            buf.push(tags::BLOB_MAP);
            vlc::write_count(buf, rep.count);
            if rep.count == 0 {
                return;
            }
            vlc::write_count(buf, rep.prefix.len() as u64);
            buf.extend_from_slice(&rep.prefix.to_bytes());
            buf.push(u8::from(rep.entry.is_some()));
            if let Some((k, val)) = &rep.entry {
                write_child(buf, k);
                write_child(buf, val);
            }
            let mut mask: u16 = 0;
            for (nib, _) in &rep.children {
                mask |= 1 << nib;
            }
            buf.extend_from_slice(&mask.to_be_bytes());
            for (_, c) in &rep.children {
                write_child(buf, &Value::BlobMap(c.clone()));
            }
        }
        Value::Syntax(s) => {
            buf.push(tags::SYNTAX);
            write_child(buf, s.value());
            write_child(buf, &Value::Map(s.meta().clone()));
        }
        Value::Op(op) => {
            buf.push(tags::OP);
            write_op(buf, op);
        }
        Value::Fn(c) => {
            buf.push(tags::CLOSURE);
            write_template(buf, c.template());
            vlc::write_count(buf, c.captured().len() as u64);
            for v in c.captured() {
                write_child(buf, v);
            }
        }
        Value::CoreFn(f) => {
            buf.push(tags::CORE_FN);
            vlc::write_count(buf, u64::from(f.id()));
        }
        Value::Record(r) => write_record(buf, r),
    }
}

/// Ops encode inline: the op tree is one cell, with only constant values
/// as child references.
fn write_op(buf: &mut Vec<u8>, op: &Op) {
    buf.push(op.code());
    match op {
        Op::Constant(v) => write_child(buf, v),
        Op::Lookup { address, symbol } => {
            buf.push(u8::from(address.is_some()));
            if let Some(a) = address {
                write_op(buf, a);
            }
            write_name(buf, symbol.name());
        }
        Op::Local(i) => vlc::write_count(buf, u64::from(*i)),
        Op::SetLocal { index, op } => {
            vlc::write_count(buf, u64::from(*index));
            write_op(buf, op);
        }
        Op::Do(ops) => {
            vlc::write_count(buf, ops.len() as u64);
            for o in ops {
                write_op(buf, o);
            }
        }
        Op::Cond { clauses, fallback } => {
            vlc::write_count(buf, clauses.len() as u64);
            for (t, r) in clauses {
                write_op(buf, t);
                write_op(buf, r);
            }
            buf.push(u8::from(fallback.is_some()));
            if let Some(e) = fallback {
                write_op(buf, e);
            }
        }
        Op::Let {
            bindings,
            body,
            loop_form,
        } => {
            buf.push(u8::from(*loop_form));
            vlc::write_count(buf, bindings.len() as u64);
            for (sym, o) in bindings {
                write_name(buf, sym.name());
                write_op(buf, o);
            }
            vlc::write_count(buf, body.len() as u64);
            for o in body {
                write_op(buf, o);
            }
        }
        Op::Lambda(template) => write_template(buf, template),
        Op::Invoke { func, args } => {
            vlc::write_count(buf, args.len() as u64);
            write_op(buf, func);
            for a in args {
                write_op(buf, a);
            }
        }
        Op::Def { symbol, op } => {
            write_name(buf, symbol.name());
            write_op(buf, op);
        }
        Op::Special(s) => buf.push(s.id()),
        Op::Query(op) => write_op(buf, op),
    }
}

fn write_template(buf: &mut Vec<u8>, template: &FnTemplate) {
    vlc::write_count(buf, template.clauses.len() as u64);
    for FnClause {
        params,
        variadic,
        body,
    } in &template.clauses
    {
        vlc::write_count(buf, params.len() as u64);
        for p in params {
            write_name(buf, p.name());
        }
        buf.push(u8::from(*variadic));
        write_op(buf, body);
    }
}

fn write_record(buf: &mut Vec<u8>, r: &Record) {
    match r {
        Record::State(s) => {
            buf.push(tags::STATE);
            write_child(buf, &Value::Vector(s.accounts().clone()));
            write_child(buf, &Value::BlobMap(s.peers().clone()));
            write_child(buf, &Value::Vector(s.globals().to_vector()));
            write_child(buf, &Value::BlobMap(s.schedule().clone()));
        }
        Record::Account(a) => {
            buf.push(tags::ACCOUNT_STATUS);
            vlc::write_long(buf, a.sequence());
            vlc::write_long(buf, a.balance());
            vlc::write_long(buf, a.memory());
            match a.key() {
                None => buf.push(0),
                Some(k) => {
                    buf.push(1);
                    buf.extend_from_slice(k.as_bytes());
                }
            }
            write_child(buf, a.controller());
            write_child(buf, &Value::Map(a.environment().clone()));
            write_child(buf, &Value::Map(a.metadata().clone()));
            write_child(buf, &Value::BlobMap(a.holdings().clone()));
        }
        Record::Peer(p) => {
            buf.push(tags::PEER_STATUS);
            write_child(buf, p.controller());
            vlc::write_long(buf, p.stake());
            write_child(buf, &Value::BlobMap(p.delegated().clone()));
            write_child(buf, &Value::Map(p.metadata().clone()));
        }
        Record::Block(b) => {
            buf.push(tags::BLOCK);
            vlc::write_long(buf, b.timestamp());
            write_child(buf, &Value::Vector(b.transactions().clone()));
        }
        Record::Transaction(t) => {
            buf.push(tags::TRANSACTION);
            buf.push(t.body().code());
            vlc::write_count(buf, t.origin().index());
            vlc::write_long(buf, t.sequence());
            match t.body() {
                TxBody::Invoke(form) => write_child(buf, form),
                TxBody::Transfer { target, amount } => {
                    vlc::write_count(buf, target.index());
                    vlc::write_long(buf, *amount);
                }
                TxBody::Call {
                    target,
                    offer,
                    func,
                    args,
                } => {
                    vlc::write_count(buf, target.index());
                    vlc::write_long(buf, *offer);
                    write_name(buf, func.name());
                    write_child(buf, &Value::Vector(args.clone()));
                }
            }
        }
        Record::Result(res) => {
            buf.push(tags::RESULT);
            match res.id() {
                None => buf.push(0),
                Some(id) => {
                    buf.push(1);
                    vlc::write_long(buf, id);
                }
            }
            write_child(buf, res.value());
            match res.error_code() {
                None => buf.push(0),
                Some(code) => {
                    buf.push(1);
                    write_child(buf, code);
                }
            }
            write_child(buf, &Value::Vector(res.trace().clone()));
            write_child(buf, &Value::Map(res.info().clone()));
        }
        Record::Signed(s) => {
            buf.push(tags::SIGNED_DATA);
            buf.extend_from_slice(s.key().as_bytes());
            buf.extend_from_slice(s.signature().as_bytes());
            write_child(buf, s.value());
        }
        Record::Order(o) => {
            buf.push(tags::ORDER);
            vlc::write_count(buf, o.proposal_point());
            vlc::write_count(buf, o.consensus_point());
            vlc::write_long(buf, o.timestamp());
            write_child(buf, &Value::Vector(o.blocks().clone()));
        }
        Record::Belief(b) => {
            buf.push(tags::BELIEF);
            write_child(buf, &Value::BlobMap(b.orders().clone()));
        }
    }
}

/// Non-embedded descendants of a value, deduplicated, parents before
/// children. This is the transfer bag for multi-cell serialization.
#[must_use]
pub fn non_embedded_descendants(v: &Value) -> Vec<Value> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    collect_non_embedded(v, &mut seen, &mut out);
    out
}

fn collect_non_embedded(
    v: &Value,
    seen: &mut std::collections::HashSet<Hash>,
    out: &mut Vec<Value>,
) {
    for child in children(v) {
        if is_embedded(&child) {
            continue;
        }
        let h = value_hash(&child);
        if seen.insert(h) {
            out.push(child.clone());
            collect_non_embedded(&child, seen, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vector;

    #[test]
    fn test_primitive_encodings() {
        assert_eq!(&*value_encoding(&Value::Nil), &[tags::NULL]);
        assert_eq!(&*value_encoding(&Value::Bool(true)), &[tags::TRUE]);
        assert_eq!(
            &*value_encoding(&Value::Long(1)),
            &[tags::LONG, 0x01]
        );
        assert_eq!(
            &*value_encoding(&Value::Long(-1)),
            &[tags::LONG, 0x7F]
        );
    }

    #[test]
    fn test_double_canonical_nan() {
        let a = value_encoding(&Value::Double(f64::NAN));
        let b = value_encoding(&Value::Double(f64::from_bits(0x7FF8_DEAD_BEEF_0000)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_equality_follows_value_equality() {
        let a = Value::Vector(Vector::from_values(vec![Value::Long(1), Value::Long(2)]));
        let mut b = Vector::empty();
        b = b.conj(Value::Long(1));
        b = b.conj(Value::Long(2));
        assert_eq!(value_hash(&a), value_hash(&Value::Vector(b)));
    }

    #[test]
    fn test_embedded_rules() {
        // Primitives are always embedded.
        assert!(is_embedded(&Value::Long(i64::MAX)));
        // A 32-byte blob (hash-sized) is embedded.
        assert!(is_embedded(&Value::Blob(crate::blob::Blob::from_bytes(
            &[0u8; 32]
        ))));
        // A large blob is not.
        assert!(!is_embedded(&Value::Blob(crate::blob::Blob::from_bytes(
            &[0u8; 200]
        ))));
        // A vector of 16 longs exceeds the embedded limit.
        let v = Value::Vector(Vector::from_values(
            (0..16i64).map(|i| Value::Long(i64::MIN + i)).collect(),
        ));
        assert!(!is_embedded(&v));
    }

    #[test]
    fn test_non_embedded_child_is_a_ref() {
        let big = Value::Blob(crate::blob::Blob::from_bytes(&[7u8; 500]));
        let v = Value::Vector(Vector::from_values(vec![big.clone()]));
        let enc = value_encoding(&v);
        // tag, count, then a 34-byte ref marker.
        assert_eq!(enc[0], tags::VECTOR_FLAT);
        assert_eq!(enc[2], tags::REF);
        assert_eq!(enc[3], tags::BLOB_FLAT);
        assert_eq!(enc.len(), 3 + 34);
        let h = Hash::from_slice(&enc[4..36]).unwrap();
        assert_eq!(h, value_hash(&big));
    }
}
