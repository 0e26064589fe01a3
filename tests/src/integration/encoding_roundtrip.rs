//! Randomized encoding invariants: decode(encode(x)) = x, hash
//! functionality, canonicality of the numeric edge cases.

use convex_store::{MemoryStore, Store};
use convex_types::{
    decode, decode_multi, encode_multi, value_encoding, value_hash, Blob, List, Map, NoSource,
    RefStatus, Set, Value, Vector,
};
use num_bigint::BigInt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A random value generator over the full cell taxonomy, bounded in
/// depth so trees stay reasonable.
fn random_value(rng: &mut StdRng, depth: u32) -> Value {
    let pick = if depth == 0 {
        rng.gen_range(0..8)
    } else {
        rng.gen_range(0..12)
    };
    match pick {
        0 => Value::Nil,
        1 => Value::Bool(rng.gen()),
        2 => Value::Long(rng.gen()),
        3 => Value::Double(f64::from_bits(rng.gen::<u64>() | 0x3FF0_0000_0000_0000)),
        4 => Value::keyword(&format!("k{}", rng.gen_range(0..1000))),
        5 => Value::symbol(&format!("s{}", rng.gen_range(0..1000))),
        6 => {
            let len = rng.gen_range(0..200);
            let bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            Value::Blob(Blob::from_bytes(&bytes))
        }
        7 => Value::string(&format!("text-{}", rng.gen_range(0..1000))),
        8 => {
            let n = rng.gen_range(0..20);
            Value::Vector(Vector::from_values(
                (0..n).map(|_| random_value(rng, depth - 1)).collect(),
            ))
        }
        9 => {
            let n = rng.gen_range(0..10);
            Value::List(List::from_values(
                (0..n).map(|_| random_value(rng, depth - 1)).collect(),
            ))
        }
        10 => {
            let n = rng.gen_range(0..15);
            Value::Map(Map::from_entries(
                (0..n)
                    .map(|_| (random_value(rng, 0), random_value(rng, depth - 1)))
                    .collect(),
            ))
        }
        _ => {
            let n = rng.gen_range(0..15);
            Value::Set(Set::from_values(
                (0..n).map(|_| random_value(rng, 0)).collect(),
            ))
        }
    }
}

#[test]
fn test_random_roundtrips_through_store() {
    let mut rng = StdRng::seed_from_u64(0xC0DE);
    let store = MemoryStore::new();
    for _ in 0..300 {
        let v = random_value(&mut rng, 3);
        store.put(&v, RefStatus::Stored).unwrap();
        let enc = value_encoding(&v);
        let back = decode(&enc, &store).unwrap();
        assert_eq!(back, v);
        // encode(decode(b)) = b for accepted encodings.
        assert_eq!(value_encoding(&back), enc);
        // Hash is a function of the value.
        assert_eq!(value_hash(&back), value_hash(&v));
    }
}

#[test]
fn test_random_multi_cell_roundtrips() {
    let mut rng = StdRng::seed_from_u64(0xBEEF);
    for _ in 0..100 {
        let v = random_value(&mut rng, 3);
        let bytes = encode_multi(&v);
        assert_eq!(decode_multi(&bytes).unwrap(), v);
    }
}

#[test]
fn test_distinct_values_distinct_hashes() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut seen = std::collections::HashMap::new();
    for _ in 0..500 {
        let v = random_value(&mut rng, 2);
        let h = value_hash(&v);
        if let Some(prev) = seen.insert(h, v.clone()) {
            assert_eq!(prev, v, "hash collision between distinct values");
        }
    }
}

#[test]
fn test_integer_canonicality() {
    // A value inside the long range is always a Long cell.
    for n in [0i64, 1, -1, i64::MAX, i64::MIN] {
        assert!(matches!(Value::integer(BigInt::from(n)), Value::Long(_)));
    }
    // One past the range is a big integer with a 9-byte payload.
    let v = Value::integer(BigInt::from(i64::MAX) + 1);
    assert!(matches!(v, Value::BigInt(_)));
    let back = decode(&value_encoding(&v), &NoSource).unwrap();
    assert_eq!(back, v);
}

#[test]
fn test_nan_canonical_bits() {
    let weird_nan = Value::Double(f64::from_bits(0x7FF0_0000_0000_0001));
    let enc = value_encoding(&weird_nan);
    // The payload is the canonical quiet NaN pattern.
    assert_eq!(&enc[1..], &0x7FF8_0000_0000_0000u64.to_be_bytes());
}

#[test]
fn test_idempotent_canonicalization() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..100 {
        let v = random_value(&mut rng, 2);
        let once = decode(&value_encoding(&v), &NoSource);
        if let Ok(once) = once {
            let twice = decode(&value_encoding(&once), &NoSource).unwrap();
            assert_eq!(once, twice);
        }
    }
}
