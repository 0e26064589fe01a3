//! The numeric tower end to end: promotion, double semantics, blob
//! reinterpretation, NaN propagation.

use crate::helpers::{lst, sym, Net};
use convex_cvm::{eval_form, Context};
use convex_types::{Blob, Value};
use num_bigint::BigInt;

fn eval(net: &Net, form: Value) -> Value {
    let mut ctx = Context::new(net.state.clone(), net.user(0), 10_000_000);
    eval_form(&mut ctx, &form);
    assert!(ctx.is_live(), "exception: {:?}", ctx.exception());
    ctx.result().clone()
}

#[test]
fn test_simple_addition() {
    let net = Net::new(1);
    assert_eq!(
        eval(&net, lst(vec![sym("+"), Value::Long(1), Value::Long(2)])),
        Value::Long(3)
    );
}

#[test]
fn test_long_overflow_promotes() {
    let net = Net::new(1);
    let v = eval(
        &net,
        lst(vec![sym("+"), Value::Long(9223372036854775807), Value::Long(1)]),
    );
    assert_eq!(v, Value::integer(BigInt::from(i64::MAX) + 1));
    assert!(matches!(v, Value::BigInt(_)));
}

#[test]
fn test_blob_to_long_is_twos_complement() {
    let net = Net::new(1);
    // (long 0xffffffffffffffff) reads the blob as a signed 64-bit value.
    let blob = Value::Blob(Blob::from_bytes(&[0xFF; 8]));
    assert_eq!(eval(&net, lst(vec![sym("long"), blob])), Value::Long(-1));
}

#[test]
fn test_zero_equality_split() {
    let net = Net::new(1);
    // Numeric == unifies the zeros; structural = distinguishes them.
    assert_eq!(
        eval(
            &net,
            lst(vec![sym("=="), Value::Double(0.0), Value::Double(-0.0)])
        ),
        Value::Bool(true)
    );
    assert_eq!(
        eval(
            &net,
            lst(vec![sym("="), Value::Double(0.0), Value::Double(-0.0)])
        ),
        Value::Bool(false)
    );
}

#[test]
fn test_min_nan_propagates() {
    let net = Net::new(1);
    let v = eval(
        &net,
        lst(vec![sym("min"), Value::Double(f64::NAN), Value::Long(1)]),
    );
    assert!(matches!(v, Value::Double(d) if d.is_nan()));
}

#[test]
fn test_division_is_double() {
    let net = Net::new(1);
    assert_eq!(
        eval(&net, lst(vec![sym("/"), Value::Long(1), Value::Long(2)])),
        Value::Double(0.5)
    );
}
