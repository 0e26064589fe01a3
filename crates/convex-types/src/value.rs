//! # Values
//!
//! The closed cell taxonomy. Every value the system touches — numbers,
//! collections, compiled ops, whole world states — is a `Value` with a
//! canonical encoding and a SHA3-256 identity. Equality of values is
//! equality of encodings.

use crate::address::Address;
use crate::blob::Blob;
use crate::blobmap::BlobMap;
use crate::corefn::CoreFn;
use crate::hash::{AccountKey, Hash};
use crate::list::List;
use crate::map::Map;
use crate::ops::{Closure, Op};
use crate::records::Record;
use crate::set::Set;
use crate::strings::Str;
use crate::symbolic::{Keyword, Symbol};
use crate::syntax::Syntax;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::fmt;
use std::sync::Arc;

/// Canonical bit pattern for NaN doubles.
pub const CANONICAL_NAN_BITS: u64 = 0x7FF8_0000_0000_0000;

/// Canonical raw bits of a double: every NaN collapses to one pattern.
#[must_use]
pub fn canonical_double_bits(d: f64) -> u64 {
    if d.is_nan() {
        CANONICAL_NAN_BITS
    } else {
        d.to_bits()
    }
}

/// An arbitrary-precision integer cell. Canonical only outside the signed
/// 64-bit range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BigIntCell(pub Arc<BigInt>);

impl BigIntCell {
    /// Minimal two's-complement big-endian bytes (at least 9 for a
    /// canonical big integer).
    #[must_use]
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        self.0.to_signed_bytes_be()
    }

    /// Byte length of the canonical form; drives arithmetic juice costs.
    #[must_use]
    pub fn byte_length(&self) -> u64 {
        self.to_canonical_bytes().len() as u64
    }
}

/// An immutable cell value.
#[derive(Clone, Debug)]
pub enum Value {
    Nil,
    Bool(bool),
    Byte(u8),
    Char(char),
    Long(i64),
    BigInt(BigIntCell),
    Double(f64),
    String(Str),
    Blob(Blob),
    Address(Address),
    AccountKey(AccountKey),
    Keyword(Keyword),
    Symbol(Symbol),
    Vector(Vector),
    List(List),
    Map(Map),
    Set(Set),
    BlobMap(BlobMap),
    Syntax(Syntax),
    Op(Arc<Op>),
    Fn(Closure),
    CoreFn(CoreFn),
    Record(Record),
}

use crate::vector::Vector;

impl Value {
    /// Canonical integer from an arbitrary-precision value: a `Long` when
    /// it fits, a `BigInt` otherwise.
    #[must_use]
    pub fn integer(n: BigInt) -> Value {
        match n.to_i64() {
            Some(v) => Value::Long(v),
            None => Value::BigInt(BigIntCell(Arc::new(n))),
        }
    }

    /// Convenience 128-bit integer constructor.
    #[must_use]
    pub fn integer_i128(n: i128) -> Value {
        match i64::try_from(n) {
            Ok(v) => Value::Long(v),
            Err(_) => Value::BigInt(BigIntCell(Arc::new(BigInt::from(n)))),
        }
    }

    /// String cell from text.
    #[must_use]
    pub fn string(text: &str) -> Value {
        Value::String(Str::from_str(text))
    }

    /// Symbol value.
    #[must_use]
    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Symbol::intern(name))
    }

    /// Keyword value.
    #[must_use]
    pub fn keyword(name: &str) -> Value {
        Value::Keyword(Keyword::intern(name))
    }

    /// A 32-byte blob carrying a hash. Hashes canonicalize to blobs.
    #[must_use]
    pub fn hash_blob(hash: &Hash) -> Value {
        Value::Blob(Blob::from_bytes(hash.as_bytes()))
    }

    /// Truthiness: only `false` and `nil` are falsey.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Human-readable type name, used in cast errors.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Byte(_) => "byte",
            Value::Char(_) => "char",
            Value::Long(_) => "long",
            Value::BigInt(_) => "bigint",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Blob(_) => "blob",
            Value::Address(_) => "address",
            Value::AccountKey(_) => "account-key",
            Value::Keyword(_) => "keyword",
            Value::Symbol(_) => "symbol",
            Value::Vector(_) => "vector",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::BlobMap(_) => "blob-map",
            Value::Syntax(_) => "syntax",
            Value::Op(_) => "op",
            Value::Fn(_) => "function",
            Value::CoreFn(_) => "function",
            Value::Record(_) => "record",
        }
    }

    /// Whether this is one of the numeric tower types.
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::Long(_) | Value::BigInt(_) | Value::Double(_) | Value::Byte(_)
        )
    }

    /// Element count for countable values.
    #[must_use]
    pub fn count(&self) -> Option<u64> {
        match self {
            Value::Vector(v) => Some(v.count()),
            Value::List(l) => Some(l.count()),
            Value::Map(m) => Some(m.count()),
            Value::Set(s) => Some(s.count()),
            Value::BlobMap(m) => Some(m.count()),
            Value::Blob(b) => Some(b.len()),
            Value::String(s) => Some(s.len()),
            Value::Nil => Some(0),
            _ => None,
        }
    }

    /// The cell's SHA3-256 identity.
    #[must_use]
    pub fn cell_hash(&self) -> Hash {
        crate::encoding::value_hash(self)
    }

    /// The cell's canonical encoding.
    #[must_use]
    pub fn encoding(&self) -> Arc<[u8]> {
        crate::encoding::value_encoding(self)
    }

    /// Whether the cell may be inlined into parent encodings.
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        crate::encoding::is_embedded(self)
    }

    /// Memory size: own encoding plus non-embedded descendants.
    #[must_use]
    pub fn mem_size(&self) -> u64 {
        crate::memory::memory_size(self)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Nil
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Nil, Nil) => true,
            (Bool(a), Bool(b)) => a == b,
            (Byte(a), Byte(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (BigInt(a), BigInt(b)) => a == b,
            // Cell equality is encoding equality: doubles compare by
            // canonical bits, so 0.0 != -0.0 and NaN == NaN.
            (Double(a), Double(b)) => canonical_double_bits(*a) == canonical_double_bits(*b),
            (String(a), String(b)) => a == b,
            (Blob(a), Blob(b)) => a == b,
            (Address(a), Address(b)) => a == b,
            (AccountKey(a), AccountKey(b)) => a == b,
            (Keyword(a), Keyword(b)) => a == b,
            (Symbol(a), Symbol(b)) => a == b,
            (Vector(a), Vector(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (Set(a), Set(b)) => a == b,
            (BlobMap(a), BlobMap(b)) => a == b,
            (Syntax(a), Syntax(b)) => a == b,
            (Op(a), Op(b)) => a == b,
            (Fn(a), Fn(b)) => a == b,
            (CoreFn(a), CoreFn(b)) => a == b,
            (Record(a), Record(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

fn fmt_double(f: &mut fmt::Formatter<'_>, d: f64) -> fmt::Result {
    if d.is_nan() {
        write!(f, "##NaN")
    } else if d.is_infinite() {
        if d > 0.0 {
            write!(f, "##Inf")
        } else {
            write!(f, "##-Inf")
        }
    } else {
        write!(f, "{d:?}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Byte(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "\\{c}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{}", v.0),
            Value::Double(d) => fmt_double(f, *d),
            Value::String(s) => write!(f, "\"{}\"", s.to_string_value()),
            Value::Blob(b) => write!(f, "{b}"),
            Value::Address(a) => write!(f, "{a}"),
            Value::AccountKey(k) => write!(f, "{k}"),
            Value::Keyword(k) => write!(f, "{k}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Vector(v) => {
                write!(f, "[")?;
                for (i, e) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "]")
            }
            Value::List(l) => {
                write!(f, "(")?;
                for (i, e) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.entries().iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{k} {v}")?;
                }
                write!(f, "}}")
            }
            Value::Set(s) => {
                write!(f, "#{{")?;
                for (i, e) in s.members().iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "}}")
            }
            Value::BlobMap(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.entries().iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{k} {v}")?;
                }
                write!(f, "}}")
            }
            Value::Syntax(s) => write!(f, "{}", s.value()),
            Value::Op(_) => write!(f, "<op>"),
            Value::Fn(_) => write!(f, "<fn>"),
            Value::CoreFn(c) => write!(f, "{}", c.name()),
            Value::Record(r) => write!(f, "{r}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Long(0).is_truthy());
        assert!(Value::string("").is_truthy());
        assert!(Value::Vector(Vector::empty()).is_truthy());
    }

    #[test]
    fn test_integer_canonicalization() {
        assert_eq!(Value::integer(BigInt::from(42)), Value::Long(42));
        let big = Value::integer(BigInt::from(i64::MAX) + 1);
        assert!(matches!(big, Value::BigInt(_)));
    }

    #[test]
    fn test_double_cell_equality() {
        // Cell equality distinguishes signed zeros but unifies NaNs.
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));
        assert_eq!(Value::Double(f64::NAN), Value::Double(-f64::NAN));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(Value::keyword("k").to_string(), ":k");
        assert_eq!(
            Value::Vector(Vector::from_values(vec![Value::Long(1), Value::Long(2)])).to_string(),
            "[1 2]"
        );
        assert_eq!(Value::Double(f64::NAN).to_string(), "##NaN");
    }
}
