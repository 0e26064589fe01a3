//! # Decoding
//!
//! The inverse of the canonical encoding. Decoding validates as it reads:
//! unknown tags, truncation and non-canonical forms are rejected, and a
//! reference to a cell the source cannot supply surfaces as
//! `MissingData` so upper layers can issue a wire request.
//!
//! Values handed out by `decode` are always fully resolved: child refs
//! are looked up through a [`CellSource`] during the read.

use crate::address::Address;
use crate::blob::Blob;
use crate::blobmap::{BlobMap, Nibbles};
use crate::corefn::CoreFn;
use crate::errors::EncodingError;
use crate::hash::{AccountKey, Hash, Signature};
use crate::list::List;
use crate::map::Map;
use crate::ops::{Closure, FnClause, FnTemplate, Op, Special};
use crate::records::{
    AccountStatus, Belief, Block, Globals, Order, Record, SignedData, State, Transaction, TxBody,
    TxResult,
};
use crate::set::Set;
use crate::strings::Str;
use crate::symbolic::{Keyword, Symbol};
use crate::syntax::Syntax;
use crate::tags;
use crate::value::{BigIntCell, Value, CANONICAL_NAN_BITS};
use crate::vector::{vector_capacity, Vector};
use crate::vlc;
use crate::encoding::{is_embedded, tag_of, value_encoding, value_hash, non_embedded_descendants};
use num_bigint::BigInt;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves non-embedded child cells by hash during decoding.
pub trait CellSource {
    /// The cell for `hash`, if this source can supply it.
    fn get_cell(&self, hash: &Hash) -> Option<Value>;
}

/// A source that resolves nothing; embedded-only decoding.
pub struct NoSource;

impl CellSource for NoSource {
    fn get_cell(&self, _hash: &Hash) -> Option<Value> {
        None
    }
}

/// Decodes one cell from its full canonical encoding.
pub fn decode(bytes: &[u8], source: &dyn CellSource) -> Result<Value, EncodingError> {
    let mut pos = 0;
    let v = read_value(bytes, &mut pos, source)?;
    if pos != bytes.len() {
        return Err(EncodingError::bad_format("trailing bytes after encoding"));
    }
    Ok(v)
}

fn take<'a>(bytes: &'a [u8], pos: &mut usize, n: usize) -> Result<&'a [u8], EncodingError> {
    if *pos + n > bytes.len() {
        return Err(EncodingError::Truncated {
            needed: *pos + n - bytes.len(),
        });
    }
    let s = &bytes[*pos..*pos + n];
    *pos += n;
    Ok(s)
}

fn take_byte(bytes: &[u8], pos: &mut usize) -> Result<u8, EncodingError> {
    Ok(take(bytes, pos, 1)?[0])
}

fn read_flag(bytes: &[u8], pos: &mut usize) -> Result<bool, EncodingError> {
    match take_byte(bytes, pos)? {
        0 => Ok(false),
        1 => Ok(true),
        b => Err(EncodingError::bad_format(format!("bad flag byte {b}"))),
    }
}

fn read_name(bytes: &[u8], pos: &mut usize) -> Result<String, EncodingError> {
    let len = vlc::read_count(bytes, pos)? as usize;
    if len > tags::MAX_NAME_LENGTH * 4 {
        return Err(EncodingError::bad_format("name too long"));
    }
    let raw = take(bytes, pos, len)?;
    String::from_utf8(raw.to_vec())
        .map_err(|_| EncodingError::bad_format("name is not UTF-8"))
}

/// Reads a child position: an inline embedded cell or a ref marker.
fn read_child(
    bytes: &[u8],
    pos: &mut usize,
    source: &dyn CellSource,
) -> Result<Value, EncodingError> {
    let tag = *bytes
        .get(*pos)
        .ok_or(EncodingError::Truncated { needed: 1 })?;
    if tag == tags::REF {
        *pos += 1;
        let child_tag = take_byte(bytes, pos)?;
        let hash = Hash::from_slice(take(bytes, pos, 32)?).expect("32 bytes");
        let value = source
            .get_cell(&hash)
            .ok_or(EncodingError::MissingData(hash))?;
        if tag_of(&value) != child_tag {
            return Err(EncodingError::bad_format("ref tag mismatch"));
        }
        if is_embedded(&value) {
            return Err(EncodingError::NonCanonical("ref to embedded cell"));
        }
        return Ok(value);
    }
    let value = read_value(bytes, pos, source)?;
    if !is_embedded(&value) {
        return Err(EncodingError::NonCanonical("inline non-embedded cell"));
    }
    Ok(value)
}

fn read_value(
    bytes: &[u8],
    pos: &mut usize,
    source: &dyn CellSource,
) -> Result<Value, EncodingError> {
    let tag = take_byte(bytes, pos)?;
    match tag {
        tags::NULL => Ok(Value::Nil),
        tags::FALSE => Ok(Value::Bool(false)),
        tags::TRUE => Ok(Value::Bool(true)),
        tags::BYTE => Ok(Value::Byte(take_byte(bytes, pos)?)),
        tags::CHAR => {
            let code = vlc::read_count(bytes, pos)?;
            let code = u32::try_from(code)
                .map_err(|_| EncodingError::bad_format("char code out of range"))?;
            char::from_u32(code)
                .map(Value::Char)
                .ok_or_else(|| EncodingError::bad_format("invalid char code"))
        }
        tags::LONG => Ok(Value::Long(vlc::read_long(bytes, pos)?)),
        tags::BIG_INT => {
            let len = vlc::read_count(bytes, pos)? as usize;
            if len < 9 {
                return Err(EncodingError::NonCanonical("big integer in long range"));
            }
            let raw = take(bytes, pos, len)?;
            let redundant = (raw[0] == 0x00 && raw[1] < 0x80)
                || (raw[0] == 0xFF && raw[1] >= 0x80);
            if redundant {
                return Err(EncodingError::NonCanonical("non-minimal big integer"));
            }
            Ok(Value::BigInt(BigIntCell(Arc::new(
                BigInt::from_signed_bytes_be(raw),
            ))))
        }
        tags::DOUBLE => {
            let raw = take(bytes, pos, 8)?;
            let bits = u64::from_be_bytes(raw.try_into().expect("8 bytes"));
            let d = f64::from_bits(bits);
            if d.is_nan() && bits != CANONICAL_NAN_BITS {
                return Err(EncodingError::NonCanonical("non-canonical NaN"));
            }
            Ok(Value::Double(d))
        }
        tags::ADDRESS => Ok(Value::Address(Address::new(vlc::read_count(bytes, pos)?))),
        tags::SYMBOL => {
            let name = read_name(bytes, pos)?;
            Symbol::new(&name).map(Value::Symbol)
        }
        tags::KEYWORD => {
            let name = read_name(bytes, pos)?;
            Keyword::new(&name).map(Value::Keyword)
        }
        tags::ACCOUNT_KEY => Ok(Value::AccountKey(
            AccountKey::from_slice(take(bytes, pos, 32)?).expect("32 bytes"),
        )),
        tags::BLOB_FLAT => {
            let len = vlc::read_count(bytes, pos)? as usize;
            if len > tags::MAX_CHUNK_LENGTH {
                return Err(EncodingError::NonCanonical("oversized flat blob"));
            }
            Ok(Value::Blob(Blob::from_bytes(take(bytes, pos, len)?)))
        }
        tags::BLOB_TREE => {
            let len = vlc::read_count(bytes, pos)?;
            if len <= tags::MAX_CHUNK_LENGTH as u64 {
                return Err(EncodingError::NonCanonical("undersized blob tree"));
            }
            let data = read_chunked(bytes, pos, source, len, |v| match v {
                Value::Blob(b) => Some(b.to_vec()),
                _ => None,
            })?;
            Ok(Value::Blob(Blob::from_bytes(&data)))
        }
        tags::STRING_FLAT => {
            let len = vlc::read_count(bytes, pos)? as usize;
            if len > tags::MAX_CHUNK_LENGTH {
                return Err(EncodingError::NonCanonical("oversized flat string"));
            }
            let raw = take(bytes, pos, len)?;
            let text = std::str::from_utf8(raw)
                .map_err(|_| EncodingError::bad_format("string is not UTF-8"))?;
            Ok(Value::String(Str::from_str(text)))
        }
        tags::STRING_TREE => {
            let len = vlc::read_count(bytes, pos)?;
            if len <= tags::MAX_CHUNK_LENGTH as u64 {
                return Err(EncodingError::NonCanonical("undersized string tree"));
            }
            let m = vlc::read_count(bytes, pos)? as usize;
            let mut text = String::with_capacity(len as usize);
            let mut chunk_lens = Vec::with_capacity(m);
            for _ in 0..m {
                let chunk = match read_child(bytes, pos, source)? {
                    Value::String(s) => s,
                    _ => return Err(EncodingError::bad_format("string chunk expected")),
                };
                if chunk.tree_children().is_some() {
                    return Err(EncodingError::bad_format("nested string tree"));
                }
                chunk_lens.push(chunk.len());
                text.push_str(&chunk.to_string_value());
            }
            if text.len() as u64 != len {
                return Err(EncodingError::bad_format("string length mismatch"));
            }
            let rebuilt = Str::from_str(&text);
            // The greedy split is canonical; accepted chunking must match it.
            let canonical: Vec<u64> = rebuilt
                .tree_children()
                .map(|cs| cs.iter().map(Str::len).collect())
                .unwrap_or_default();
            if canonical != chunk_lens {
                return Err(EncodingError::NonCanonical("non-greedy string chunking"));
            }
            Ok(Value::String(rebuilt))
        }
        tags::VECTOR_FLAT => {
            let n = vlc::read_count(bytes, pos)? as usize;
            if n > tags::FANOUT {
                return Err(EncodingError::NonCanonical("oversized flat vector"));
            }
            let mut items = Vec::with_capacity(n);
            for _ in 0..n {
                items.push(read_child(bytes, pos, source)?);
            }
            Ok(Value::Vector(Vector::flat(items)))
        }
        tags::VECTOR_TREE => {
            let count = vlc::read_count(bytes, pos)?;
            if count <= tags::FANOUT as u64 {
                return Err(EncodingError::NonCanonical("undersized vector tree"));
            }
            let shift = vlc::read_count(bytes, pos)?;
            let cap = vector_capacity(count);
            if shift != u64::from(cap.ilog2()) / 4 {
                return Err(EncodingError::NonCanonical("vector shift mismatch"));
            }
            let m = count.div_ceil(cap) as usize;
            let mut children = Vec::with_capacity(m);
            for i in 0..m {
                let child = match read_child(bytes, pos, source)? {
                    Value::Vector(v) => v,
                    _ => return Err(EncodingError::bad_format("vector child expected")),
                };
                let expected = if i < m - 1 {
                    cap
                } else {
                    count - cap * (m as u64 - 1)
                };
                if child.count() != expected {
                    return Err(EncodingError::NonCanonical("unpacked vector child"));
                }
                children.push(child);
            }
            Ok(Value::Vector(Vector::tree(count, children)))
        }
        tags::LIST => {
            let n = vlc::read_count(bytes, pos)?;
            let mut items = Vec::with_capacity(n as usize);
            for _ in 0..n {
                items.push(read_child(bytes, pos, source)?);
            }
            Ok(Value::List(List::from_values(items)))
        }
        tags::MAP_LEAF => {
            let n = vlc::read_count(bytes, pos)? as usize;
            let mut entries = Vec::with_capacity(n);
            for _ in 0..n {
                let k = read_child(bytes, pos, source)?;
                let v = read_child(bytes, pos, source)?;
                entries.push((k, v));
            }
            let sorted = entries
                .windows(2)
                .all(|w| value_hash(&w[0].0) < value_hash(&w[1].0));
            if !sorted {
                return Err(EncodingError::NonCanonical("unsorted map leaf"));
            }
            Ok(Value::Map(Map::leaf_presorted(entries)))
        }
        tags::MAP_TREE => {
            let count = vlc::read_count(bytes, pos)?;
            if count as usize <= tags::MAX_LEAF_ENTRIES {
                return Err(EncodingError::NonCanonical("undersized map tree"));
            }
            let mask = u16::from_be_bytes(take(bytes, pos, 2)?.try_into().expect("2 bytes"));
            let m = mask.count_ones() as usize;
            let mut children = Vec::with_capacity(m);
            let mut total = 0u64;
            for _ in 0..m {
                let child = match read_child(bytes, pos, source)? {
                    Value::Map(c) => c,
                    _ => return Err(EncodingError::bad_format("map child expected")),
                };
                if child.is_empty() {
                    return Err(EncodingError::NonCanonical("empty map child"));
                }
                total += child.count();
                children.push(child);
            }
            if total != count {
                return Err(EncodingError::bad_format("map count mismatch"));
            }
            Ok(Value::Map(Map::tree(count, mask, children)))
        }
        tags::SET_LEAF => {
            let n = vlc::read_count(bytes, pos)? as usize;
            let mut members = Vec::with_capacity(n);
            for _ in 0..n {
                members.push(read_child(bytes, pos, source)?);
            }
            let sorted = members
                .windows(2)
                .all(|w| value_hash(&w[0]) < value_hash(&w[1]));
            if !sorted {
                return Err(EncodingError::NonCanonical("unsorted set leaf"));
            }
            Ok(Value::Set(Set::leaf_presorted(members)))
        }
        tags::SET_TREE => {
            let count = vlc::read_count(bytes, pos)?;
            if count as usize <= tags::MAX_LEAF_ENTRIES {
                return Err(EncodingError::NonCanonical("undersized set tree"));
            }
            let mask = u16::from_be_bytes(take(bytes, pos, 2)?.try_into().expect("2 bytes"));
            let m = mask.count_ones() as usize;
            let mut children = Vec::with_capacity(m);
            let mut total = 0u64;
            for _ in 0..m {
                let child = match read_child(bytes, pos, source)? {
                    Value::Set(c) => c,
                    _ => return Err(EncodingError::bad_format("set child expected")),
                };
                if child.is_empty() {
                    return Err(EncodingError::NonCanonical("empty set child"));
                }
                total += child.count();
                children.push(child);
            }
            if total != count {
                return Err(EncodingError::bad_format("set count mismatch"));
            }
            Ok(Value::Set(Set::tree(count, mask, children)))
        }
        tags::BLOB_MAP => {
            let count = vlc::read_count(bytes, pos)?;
            if count == 0 {
                return Ok(Value::BlobMap(BlobMap::empty()));
            }
            let prefix_len = vlc::read_count(bytes, pos)? as usize;
            let packed = take(bytes, pos, prefix_len.div_ceil(2))?;
            let mut nibbles = Nibbles::from_bytes(packed).0;
            if prefix_len % 2 == 1 {
                let pad = nibbles.pop().expect("padded nibble");
                if pad != 0 {
                    return Err(EncodingError::NonCanonical("bad prefix padding"));
                }
            }
            let prefix = Nibbles(nibbles);
            let entry = if read_flag(bytes, pos)? {
                let k = read_child(bytes, pos, source)?;
                let v = read_child(bytes, pos, source)?;
                Some((k, v))
            } else {
                None
            };
            let mask = u16::from_be_bytes(take(bytes, pos, 2)?.try_into().expect("2 bytes"));
            let mut kids = Vec::new();
            for nib in 0..16u8 {
                if mask & (1 << nib) != 0 {
                    let child = match read_child(bytes, pos, source)? {
                        Value::BlobMap(c) => c,
                        _ => return Err(EncodingError::bad_format("blob-map child expected")),
                    };
                    kids.push((nib, child));
                }
            }
            if entry.is_none() && kids.len() == 1 {
                return Err(EncodingError::NonCanonical("mergeable blob-map node"));
            }
            let node = BlobMap::node(prefix, entry, kids);
            if node.count() != count {
                return Err(EncodingError::bad_format("blob-map count mismatch"));
            }
            Ok(Value::BlobMap(node))
        }
        tags::SYNTAX => {
            let value = read_child(bytes, pos, source)?;
            let meta = match read_child(bytes, pos, source)? {
                Value::Map(m) => m,
                _ => return Err(EncodingError::bad_format("syntax meta must be a map")),
            };
            Ok(Value::Syntax(Syntax::new(value, meta)))
        }
        tags::OP => Ok(Value::Op(Arc::new(read_op(bytes, pos, source)?))),
        tags::CLOSURE => {
            let template = read_template(bytes, pos, source)?;
            let n = vlc::read_count(bytes, pos)? as usize;
            let mut captured = Vec::with_capacity(n);
            for _ in 0..n {
                captured.push(read_child(bytes, pos, source)?);
            }
            Ok(Value::Fn(Closure::new(Arc::new(template), captured)))
        }
        tags::CORE_FN => {
            let id = vlc::read_count(bytes, pos)?;
            let id = u16::try_from(id)
                .map_err(|_| EncodingError::bad_format("core function id out of range"))?;
            CoreFn::from_id(id)
                .map(Value::CoreFn)
                .ok_or_else(|| EncodingError::bad_format(format!("unknown core function {id}")))
        }
        tags::STATE
        | tags::ACCOUNT_STATUS
        | tags::PEER_STATUS
        | tags::BLOCK
        | tags::TRANSACTION
        | tags::RESULT
        | tags::SIGNED_DATA
        | tags::ORDER
        | tags::BELIEF => read_record(tag, bytes, pos, source),
        other => Err(EncodingError::UnknownTag(other)),
    }
}

/// Shared reader for chunked blob and string trees.
fn read_chunked(
    bytes: &[u8],
    pos: &mut usize,
    source: &dyn CellSource,
    len: u64,
    extract: impl Fn(Value) -> Option<Vec<u8>>,
) -> Result<Vec<u8>, EncodingError> {
    let cap = chunk_capacity_of(len);
    let m = len.div_ceil(cap) as usize;
    let mut data = Vec::with_capacity(len as usize);
    for i in 0..m {
        let child = read_child(bytes, pos, source)?;
        let chunk =
            extract(child).ok_or_else(|| EncodingError::bad_format("chunk type mismatch"))?;
        let expected = if i < m - 1 {
            cap
        } else {
            len - cap * (m as u64 - 1)
        };
        if chunk.len() as u64 != expected {
            return Err(EncodingError::NonCanonical("unpacked chunk"));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

fn chunk_capacity_of(len: u64) -> u64 {
    crate::blob::chunk_capacity(len)
}

fn read_op(
    bytes: &[u8],
    pos: &mut usize,
    source: &dyn CellSource,
) -> Result<Op, EncodingError> {
    let code = take_byte(bytes, pos)?;
    match code {
        0 => Ok(Op::Constant(read_child(bytes, pos, source)?)),
        1 => {
            let address = if read_flag(bytes, pos)? {
                Some(Box::new(read_op(bytes, pos, source)?))
            } else {
                None
            };
            let name = read_name(bytes, pos)?;
            Ok(Op::Lookup {
                address,
                symbol: Symbol::new(&name)?,
            })
        }
        2 => {
            let i = vlc::read_count(bytes, pos)?;
            let i = u32::try_from(i)
                .map_err(|_| EncodingError::bad_format("local index out of range"))?;
            Ok(Op::Local(i))
        }
        3 => {
            let index = vlc::read_count(bytes, pos)?;
            let index = u32::try_from(index)
                .map_err(|_| EncodingError::bad_format("local index out of range"))?;
            let op = read_op(bytes, pos, source)?;
            Ok(Op::SetLocal {
                index,
                op: Box::new(op),
            })
        }
        4 => {
            let n = vlc::read_count(bytes, pos)? as usize;
            let mut ops = Vec::with_capacity(n);
            for _ in 0..n {
                ops.push(read_op(bytes, pos, source)?);
            }
            Ok(Op::Do(ops))
        }
        5 => {
            let n = vlc::read_count(bytes, pos)? as usize;
            let mut clauses = Vec::with_capacity(n);
            for _ in 0..n {
                let t = read_op(bytes, pos, source)?;
                let r = read_op(bytes, pos, source)?;
                clauses.push((t, r));
            }
            let fallback = if read_flag(bytes, pos)? {
                Some(Box::new(read_op(bytes, pos, source)?))
            } else {
                None
            };
            Ok(Op::Cond { clauses, fallback })
        }
        6 => {
            let loop_form = read_flag(bytes, pos)?;
            let n = vlc::read_count(bytes, pos)? as usize;
            let mut bindings = Vec::with_capacity(n);
            for _ in 0..n {
                let name = read_name(bytes, pos)?;
                let op = read_op(bytes, pos, source)?;
                bindings.push((Symbol::new(&name)?, op));
            }
            let nb = vlc::read_count(bytes, pos)? as usize;
            let mut body = Vec::with_capacity(nb);
            for _ in 0..nb {
                body.push(read_op(bytes, pos, source)?);
            }
            Ok(Op::Let {
                bindings,
                body,
                loop_form,
            })
        }
        7 => Ok(Op::Lambda(Arc::new(read_template(bytes, pos, source)?))),
        8 => {
            let n = vlc::read_count(bytes, pos)? as usize;
            let func = read_op(bytes, pos, source)?;
            let mut args = Vec::with_capacity(n);
            for _ in 0..n {
                args.push(read_op(bytes, pos, source)?);
            }
            Ok(Op::Invoke {
                func: Box::new(func),
                args,
            })
        }
        9 => {
            let name = read_name(bytes, pos)?;
            let op = read_op(bytes, pos, source)?;
            Ok(Op::Def {
                symbol: Symbol::new(&name)?,
                op: Box::new(op),
            })
        }
        10 => {
            let id = take_byte(bytes, pos)?;
            Special::from_id(id)
                .map(Op::Special)
                .ok_or_else(|| EncodingError::bad_format(format!("unknown special {id}")))
        }
        11 => Ok(Op::Query(Box::new(read_op(bytes, pos, source)?))),
        other => Err(EncodingError::bad_format(format!("unknown op code {other}"))),
    }
}

fn read_template(
    bytes: &[u8],
    pos: &mut usize,
    source: &dyn CellSource,
) -> Result<FnTemplate, EncodingError> {
    let n = vlc::read_count(bytes, pos)? as usize;
    if n == 0 {
        return Err(EncodingError::bad_format("function without clauses"));
    }
    let mut clauses = Vec::with_capacity(n);
    for _ in 0..n {
        let np = vlc::read_count(bytes, pos)? as usize;
        let mut params = Vec::with_capacity(np);
        for _ in 0..np {
            let name = read_name(bytes, pos)?;
            params.push(Symbol::new(&name)?);
        }
        let variadic = read_flag(bytes, pos)?;
        if variadic && params.is_empty() {
            return Err(EncodingError::bad_format("variadic clause without params"));
        }
        let body = read_op(bytes, pos, source)?;
        clauses.push(FnClause {
            params,
            variadic,
            body,
        });
    }
    Ok(FnTemplate { clauses })
}

fn read_record(
    tag: u8,
    bytes: &[u8],
    pos: &mut usize,
    source: &dyn CellSource,
) -> Result<Value, EncodingError> {
    let record = match tag {
        tags::STATE => {
            let accounts = expect_vector(read_child(bytes, pos, source)?)?;
            let peers = expect_blobmap(read_child(bytes, pos, source)?)?;
            let gvec = expect_vector(read_child(bytes, pos, source)?)?;
            let schedule = expect_blobmap(read_child(bytes, pos, source)?)?;
            let globals = globals_from_vector(&gvec)?;
            Record::State(State::new(accounts, peers, globals, schedule))
        }
        tags::ACCOUNT_STATUS => {
            let sequence = vlc::read_long(bytes, pos)?;
            let balance = vlc::read_long(bytes, pos)?;
            let memory = vlc::read_long(bytes, pos)?;
            let key = if read_flag(bytes, pos)? {
                Some(AccountKey::from_slice(take(bytes, pos, 32)?).expect("32 bytes"))
            } else {
                None
            };
            let controller = read_child(bytes, pos, source)?;
            let environment = expect_map(read_child(bytes, pos, source)?)?;
            let metadata = expect_map(read_child(bytes, pos, source)?)?;
            let holdings = expect_blobmap(read_child(bytes, pos, source)?)?;
            let base = match key {
                Some(k) => AccountStatus::new_user(k, balance),
                None => AccountStatus::new_actor().with_balance(balance),
            };
            Record::Account(
                base.with_sequence(sequence)
                    .with_memory(memory)
                    .with_controller(controller)
                    .with_environment(environment)
                    .with_metadata(metadata)
                    .with_holdings(holdings),
            )
        }
        tags::PEER_STATUS => {
            let controller = read_child(bytes, pos, source)?;
            let stake = vlc::read_long(bytes, pos)?;
            let delegated = expect_blobmap(read_child(bytes, pos, source)?)?;
            let metadata = expect_map(read_child(bytes, pos, source)?)?;
            let mut peer = crate::records::PeerStatus::new(controller, stake)
                .with_metadata(metadata);
            for (k, v) in delegated.entries() {
                if let (Value::Address(addr), Value::Long(amount)) = (&k, &v) {
                    peer = peer.with_delegated_stake(*addr, *amount);
                } else {
                    return Err(EncodingError::bad_format("bad delegated stake entry"));
                }
            }
            Record::Peer(peer)
        }
        tags::BLOCK => {
            let timestamp = vlc::read_long(bytes, pos)?;
            let transactions = expect_vector(read_child(bytes, pos, source)?)?;
            Record::Block(Block::new(timestamp, transactions))
        }
        tags::TRANSACTION => {
            let sub = take_byte(bytes, pos)?;
            let origin = Address::new(vlc::read_count(bytes, pos)?);
            let sequence = vlc::read_long(bytes, pos)?;
            let body = match sub {
                0 => TxBody::Invoke(read_child(bytes, pos, source)?),
                1 => {
                    let target = Address::new(vlc::read_count(bytes, pos)?);
                    let amount = vlc::read_long(bytes, pos)?;
                    TxBody::Transfer { target, amount }
                }
                2 => {
                    let target = Address::new(vlc::read_count(bytes, pos)?);
                    let offer = vlc::read_long(bytes, pos)?;
                    let name = read_name(bytes, pos)?;
                    let args = expect_vector(read_child(bytes, pos, source)?)?;
                    TxBody::Call {
                        target,
                        offer,
                        func: Symbol::new(&name)?,
                        args,
                    }
                }
                other => {
                    return Err(EncodingError::bad_format(format!(
                        "unknown transaction body {other}"
                    )))
                }
            };
            Record::Transaction(Transaction::new(origin, sequence, body))
        }
        tags::RESULT => {
            let id = if read_flag(bytes, pos)? {
                Some(vlc::read_long(bytes, pos)?)
            } else {
                None
            };
            let value = read_child(bytes, pos, source)?;
            let error_code = if read_flag(bytes, pos)? {
                Some(read_child(bytes, pos, source)?)
            } else {
                None
            };
            let trace = expect_vector(read_child(bytes, pos, source)?)?;
            let info = expect_map(read_child(bytes, pos, source)?)?;
            let res = match error_code {
                None => TxResult::ok(id, value),
                Some(code) => TxResult::error(id, code, value, trace),
            };
            Record::Result(res.with_info(info))
        }
        tags::SIGNED_DATA => {
            let key = AccountKey::from_slice(take(bytes, pos, 32)?).expect("32 bytes");
            let signature = Signature::from_slice(take(bytes, pos, 64)?).expect("64 bytes");
            let value = read_child(bytes, pos, source)?;
            Record::Signed(SignedData::new(key, signature, value))
        }
        tags::ORDER => {
            let proposal_point = vlc::read_count(bytes, pos)?;
            let consensus_point = vlc::read_count(bytes, pos)?;
            let timestamp = vlc::read_long(bytes, pos)?;
            let blocks = expect_vector(read_child(bytes, pos, source)?)?;
            if consensus_point > proposal_point || proposal_point > blocks.count() {
                return Err(EncodingError::bad_format("order points out of range"));
            }
            Record::Order(Order::new(
                blocks,
                proposal_point,
                consensus_point,
                timestamp,
            ))
        }
        tags::BELIEF => {
            let orders = expect_blobmap(read_child(bytes, pos, source)?)?;
            Record::Belief(Belief::new(orders))
        }
        _ => unreachable!("caller checked the record tag"),
    };
    Ok(Value::Record(record))
}

fn expect_vector(v: Value) -> Result<Vector, EncodingError> {
    match v {
        Value::Vector(x) => Ok(x),
        other => Err(EncodingError::bad_format(format!(
            "expected vector, found {}",
            other.type_name()
        ))),
    }
}

fn expect_map(v: Value) -> Result<Map, EncodingError> {
    match v {
        Value::Map(x) => Ok(x),
        other => Err(EncodingError::bad_format(format!(
            "expected map, found {}",
            other.type_name()
        ))),
    }
}

fn expect_blobmap(v: Value) -> Result<BlobMap, EncodingError> {
    match v {
        Value::BlobMap(x) => Ok(x),
        other => Err(EncodingError::bad_format(format!(
            "expected blob-map, found {}",
            other.type_name()
        ))),
    }
}

fn globals_from_vector(v: &Vector) -> Result<Globals, EncodingError> {
    if v.count() != 6 {
        return Err(EncodingError::bad_format("globals must have 6 fields"));
    }
    let long_at = |i: u64| -> Result<i64, EncodingError> {
        match v.get(i) {
            Some(Value::Long(n)) => Ok(n),
            _ => Err(EncodingError::bad_format("globals field must be a long")),
        }
    };
    Ok(Globals {
        timestamp: long_at(0)?,
        fees: long_at(1)?,
        juice_price: long_at(2)?,
        pool_memory: long_at(3)?,
        pool_value: long_at(4)?,
        protocol: v.get(5).expect("six fields"),
    })
}

// =============================================================================
// MULTI-CELL TRANSFER
// =============================================================================

/// Serializes a value with the bag of all transitively referenced
/// non-embedded cells: `[root-len][root][n][len cell]*`.
#[must_use]
pub fn encode_multi(root: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    let root_enc = value_encoding(root);
    vlc::write_count(&mut out, root_enc.len() as u64);
    out.extend_from_slice(&root_enc);
    let bag = non_embedded_descendants(root);
    vlc::write_count(&mut out, bag.len() as u64);
    for cell in &bag {
        let enc = value_encoding(cell);
        vlc::write_count(&mut out, enc.len() as u64);
        out.extend_from_slice(&enc);
    }
    out
}

/// A transfer bag acting as its own cell source: entries are decoded on
/// demand and verified against their hash.
struct CellBag {
    encodings: HashMap<Hash, Vec<u8>>,
    cache: RefCell<HashMap<Hash, Value>>,
}

impl CellSource for CellBag {
    fn get_cell(&self, hash: &Hash) -> Option<Value> {
        if let Some(v) = self.cache.borrow().get(hash) {
            return Some(v.clone());
        }
        let bytes = self.encodings.get(hash)?;
        let value = decode(bytes, self).ok()?;
        self.cache.borrow_mut().insert(*hash, value.clone());
        Some(value)
    }
}

/// Decodes a multi-cell transfer produced by [`encode_multi`].
pub fn decode_multi(bytes: &[u8]) -> Result<Value, EncodingError> {
    let mut pos = 0;
    let root_len = vlc::read_count(bytes, &mut pos)? as usize;
    let root_enc = take(bytes, &mut pos, root_len)?.to_vec();
    let n = vlc::read_count(bytes, &mut pos)?;
    let mut encodings = HashMap::new();
    for _ in 0..n {
        let len = vlc::read_count(bytes, &mut pos)? as usize;
        let enc = take(bytes, &mut pos, len)?.to_vec();
        encodings.insert(Hash::digest(&enc), enc);
    }
    if pos != bytes.len() {
        return Err(EncodingError::bad_format("trailing bytes after transfer"));
    }
    let bag = CellBag {
        encodings,
        cache: RefCell::new(HashMap::new()),
    };
    decode(&root_enc, &bag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: &Value) {
        let enc = value_encoding(v);
        let back = decode(&enc, &NoSource).unwrap();
        assert_eq!(&back, v);
        assert_eq!(value_encoding(&back), enc);
    }

    #[test]
    fn test_primitive_roundtrips() {
        roundtrip(&Value::Nil);
        roundtrip(&Value::Bool(true));
        roundtrip(&Value::Bool(false));
        roundtrip(&Value::Byte(200));
        roundtrip(&Value::Char('λ'));
        roundtrip(&Value::Long(0));
        roundtrip(&Value::Long(i64::MIN));
        roundtrip(&Value::Double(2.5));
        roundtrip(&Value::Double(f64::NAN));
        roundtrip(&Value::Address(Address::new(1234)));
        roundtrip(&Value::symbol("foo"));
        roundtrip(&Value::keyword("bar"));
        roundtrip(&Value::string("hello"));
        roundtrip(&Value::Blob(Blob::from_bytes(&[1, 2, 3])));
        roundtrip(&Value::AccountKey(AccountKey::new([9u8; 32])));
    }

    #[test]
    fn test_bigint_roundtrip() {
        let v = Value::integer(BigInt::from(i64::MAX) + 1);
        roundtrip(&v);
        let v = Value::integer(BigInt::from(i64::MIN) - 1);
        roundtrip(&v);
    }

    #[test]
    fn test_bigint_in_long_range_rejected() {
        // Hand-built: BIG_INT tag with an 8-byte payload.
        let mut enc = vec![tags::BIG_INT];
        vlc::write_count(&mut enc, 8);
        enc.extend_from_slice(&[0x7F; 8]);
        assert!(matches!(
            decode(&enc, &NoSource),
            Err(EncodingError::NonCanonical(_))
        ));
    }

    #[test]
    fn test_collection_roundtrips() {
        let vec: Value = Value::Vector((0..100).map(Value::Long).collect());
        roundtrip(&vec);
        let list = Value::List(List::from_values(vec![Value::Long(1), Value::keyword("k")]));
        roundtrip(&list);
        let map = Value::Map(Map::from_entries(
            (0..30).map(|i| (Value::Long(i), Value::Long(i * i))).collect(),
        ));
        roundtrip(&map);
        let set = Value::Set(Set::from_values((0..30).map(Value::Long).collect()));
        roundtrip(&set);
        let mut bm = BlobMap::empty();
        for i in 0..20u8 {
            bm = bm
                .assoc(Value::Blob(Blob::from_bytes(&[i, i + 1])), Value::Long(i as i64))
                .unwrap();
        }
        roundtrip(&Value::BlobMap(bm));
    }

    #[test]
    fn test_unknown_tag() {
        assert!(matches!(
            decode(&[0xEE], &NoSource),
            Err(EncodingError::UnknownTag(0xEE))
        ));
    }

    #[test]
    fn test_truncated() {
        let enc = value_encoding(&Value::Long(1000));
        assert!(matches!(
            decode(&enc[..enc.len() - 1], &NoSource),
            Err(EncodingError::Truncated { .. })
        ));
    }

    #[test]
    fn test_missing_data_surfaces_hash() {
        let big = Value::Blob(Blob::from_bytes(&[7u8; 500]));
        let v = Value::Vector(Vector::from_values(vec![big.clone()]));
        let enc = value_encoding(&v);
        match decode(&enc, &NoSource) {
            Err(EncodingError::MissingData(h)) => assert_eq!(h, value_hash(&big)),
            other => panic!("expected missing data, got {other:?}"),
        }
    }

    #[test]
    fn test_multi_cell_transfer() {
        // A structure with several non-embedded descendants.
        let blob = Value::Blob(Blob::from_bytes(&vec![3u8; 10_000]));
        let inner = Value::Vector((0..40).map(Value::Long).collect());
        let v = Value::Vector(Vector::from_values(vec![
            blob,
            inner,
            Value::string("small"),
        ]));
        let bytes = encode_multi(&v);
        let back = decode_multi(&bytes).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_op_roundtrip() {
        let op = Op::Let {
            bindings: vec![(Symbol::intern("x"), Op::Constant(Value::Long(1)))],
            body: vec![Op::Invoke {
                func: Box::new(Op::Constant(Value::CoreFn(CoreFn::Add))),
                args: vec![Op::Local(0), Op::Constant(Value::Long(2))],
            }],
            loop_form: false,
        };
        roundtrip(&Value::Op(Arc::new(op)));
    }

    #[test]
    fn test_signed_data_roundtrip() {
        let signed = SignedData::new(
            AccountKey::new([1u8; 32]),
            Signature::new([2u8; 64]),
            Value::Long(42),
        );
        roundtrip(&Value::Record(Record::Signed(signed)));
    }
}
