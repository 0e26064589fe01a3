//! # Cell Tags
//!
//! Every cell encoding starts with a tag byte identifying its type.
//! Tags are stable wire constants: changing one changes every hash.

/// The null value.
pub const NULL: u8 = 0x00;
/// Boolean false.
pub const FALSE: u8 = 0x01;
/// Boolean true.
pub const TRUE: u8 = 0x02;
/// Unsigned byte (0-255).
pub const BYTE: u8 = 0x03;
/// Unicode code point, VLC encoded.
pub const CHAR: u8 = 0x04;
/// Signed 64-bit integer, VLC encoded.
pub const LONG: u8 = 0x05;
/// Arbitrary-precision integer outside the 64-bit range.
pub const BIG_INT: u8 = 0x06;
/// IEEE 754 double, 8 raw big-endian bytes, canonical NaN.
pub const DOUBLE: u8 = 0x07;
/// Account address (non-negative index).
pub const ADDRESS: u8 = 0x08;
/// Symbol (1-128 characters).
pub const SYMBOL: u8 = 0x09;
/// Keyword (1-128 characters).
pub const KEYWORD: u8 = 0x0A;

/// Flat blob, at most 4096 bytes.
pub const BLOB_FLAT: u8 = 0x10;
/// Chunked blob tree for blobs longer than 4096 bytes.
pub const BLOB_TREE: u8 = 0x11;
/// Flat UTF-8 string chunk, at most 4096 bytes.
pub const STRING_FLAT: u8 = 0x12;
/// Chunked string tree.
pub const STRING_TREE: u8 = 0x13;
/// 32-byte Ed25519 public key.
pub const ACCOUNT_KEY: u8 = 0x14;

/// Flat vector, at most 16 elements.
pub const VECTOR_FLAT: u8 = 0x20;
/// Packed 16-way vector tree.
pub const VECTOR_TREE: u8 = 0x21;
/// Persistent list (front-cons sequence).
pub const LIST: u8 = 0x22;
/// Hash map leaf node (small sorted entry run).
pub const MAP_LEAF: u8 = 0x23;
/// Hash map tree node (16-way HAMT branch).
pub const MAP_TREE: u8 = 0x24;
/// Hash set leaf node.
pub const SET_LEAF: u8 = 0x25;
/// Hash set tree node.
pub const SET_TREE: u8 = 0x26;
/// Blob map radix-trie node.
pub const BLOB_MAP: u8 = 0x27;
/// Syntax cell (value plus metadata).
pub const SYNTAX: u8 = 0x28;

/// World state record.
pub const STATE: u8 = 0x30;
/// Account status record.
pub const ACCOUNT_STATUS: u8 = 0x31;
/// Peer status record.
pub const PEER_STATUS: u8 = 0x32;
/// Consensus order record.
pub const ORDER: u8 = 0x33;
/// Belief record.
pub const BELIEF: u8 = 0x34;
/// Block record.
pub const BLOCK: u8 = 0x35;
/// Transaction result record.
pub const RESULT: u8 = 0x36;
/// Signed data wrapper.
pub const SIGNED_DATA: u8 = 0x37;
/// Transaction record.
pub const TRANSACTION: u8 = 0x38;

/// Compiled VM operation.
pub const OP: u8 = 0x40;
/// Closure (function value with captured bindings).
pub const CLOSURE: u8 = 0x41;
/// Native core runtime function.
pub const CORE_FN: u8 = 0x42;

/// Marker for a non-embedded child reference: `[REF, child_tag, 32-byte hash]`.
pub const REF: u8 = 0xF0;

/// Maximum encoding length for an embedded cell.
pub const MAX_EMBEDDED_LENGTH: usize = 140;
/// Maximum byte length of a flat blob or string chunk.
pub const MAX_CHUNK_LENGTH: usize = 4096;
/// Maximum element count of a flat vector and fan-out of tree nodes.
pub const FANOUT: usize = 16;
/// Maximum entries in a hash map / set leaf before it splits.
pub const MAX_LEAF_ENTRIES: usize = 8;
/// Nibble depth at which HAMT nodes stop splitting (hash exhausted).
pub const MAX_HAMT_DEPTH: u32 = 64;
/// Maximum name length for symbols and keywords.
pub const MAX_NAME_LENGTH: usize = 128;
