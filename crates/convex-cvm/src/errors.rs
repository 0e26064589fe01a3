//! # Error Values and Exceptional Results
//!
//! In-VM errors are reified values, not Rust errors: a kind keyword, a
//! message, a trace and the failing address. They propagate up the op
//! tree in the context's exception slot, alongside the non-error control
//! values (`recur`, `tailcall`, `return`, `halt`, `rollback`, `reduced`)
//! handled by their structural boundaries.

use convex_types::{Address, Value};

/// Error kind names. Reified as keywords in error values.
pub mod codes {
    /// Wrong argument count.
    pub const ARITY: &str = "ARITY";
    /// Wrong argument type.
    pub const CAST: &str = "CAST";
    /// Index out of bounds.
    pub const BOUNDS: &str = "BOUNDS";
    /// Compilation failure.
    pub const COMPILE: &str = "COMPILE";
    /// Unresolved symbol.
    pub const UNDECLARED: &str = "UNDECLARED";
    /// Juice exhausted. Uncatchable.
    pub const JUICE: &str = "JUICE";
    /// Call depth exceeded. Uncatchable.
    pub const DEPTH: &str = "DEPTH";
    /// Bad sequence number.
    pub const SEQUENCE: &str = "SEQUENCE";
    /// Bad signature.
    pub const SIGNATURE: &str = "SIGNATURE";
    /// Insufficient balance or offer.
    pub const FUNDS: &str = "FUNDS";
    /// Memory settlement failure.
    pub const MEMORY: &str = "MEMORY";
    /// Target account does not exist.
    pub const NOBODY: &str = "NOBODY";
    /// Operation not permitted by target state.
    pub const STATE: &str = "STATE";
    /// Controller authorization failure.
    pub const TRUST: &str = "TRUST";
    /// Invalid argument value.
    pub const ARGUMENT: &str = "ARGUMENT";
    /// Assertion failure.
    pub const ASSERT: &str = "ASSERT";
    /// General error.
    pub const ERROR: &str = "ERROR";
    /// Escaped control value.
    pub const EXCEPTION: &str = "EXCEPTION";
}

/// A reified in-VM error.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorValue {
    /// Error kind, normally a keyword.
    pub code: Value,
    /// Message payload; often a string, any value allowed.
    pub message: Value,
    /// Address/function context at the failure point, innermost first.
    pub trace: Vec<Value>,
    /// Account executing when the error was raised.
    pub address: Option<Address>,
}

impl ErrorValue {
    /// Error with a keyword kind and message value.
    #[must_use]
    pub fn new(code: &str, message: Value) -> Self {
        Self {
            code: Value::keyword(code),
            message,
            trace: Vec::new(),
            address: None,
        }
    }

    /// Error with an arbitrary value as kind.
    #[must_use]
    pub fn with_code_value(code: Value, message: Value) -> Self {
        Self {
            code,
            message,
            trace: Vec::new(),
            address: None,
        }
    }

    /// Whether this error's kind equals a named keyword.
    #[must_use]
    pub fn is_code(&self, code: &str) -> bool {
        self.code == Value::keyword(code)
    }

    /// Juice and depth failures abort to the completion step; no
    /// structural boundary may swallow them.
    #[must_use]
    pub fn is_uncatchable(&self) -> bool {
        self.is_code(codes::JUICE) || self.is_code(codes::DEPTH)
    }
}

/// An exceptional result: an error or a non-local control value.
#[derive(Clone, Debug, PartialEq)]
pub enum Exceptional {
    /// A reified error.
    Error(ErrorValue),
    /// Re-enter the nearest function body or loop with new bindings.
    Recur(Vec<Value>),
    /// Like recur, but may switch function.
    TailCall { func: Value, args: Vec<Value> },
    /// Unwind to the function boundary with a result.
    Return(Value),
    /// Unwind to the call/transaction boundary keeping state changes.
    Halt(Value),
    /// Unwind to the call/transaction boundary discarding state changes.
    Rollback(Value),
    /// Shortcut one `reduce`.
    Reduced(Value),
}

impl Exceptional {
    /// Convenience error constructor.
    #[must_use]
    pub fn error(code: &str, message: Value) -> Self {
        Exceptional::Error(ErrorValue::new(code, message))
    }

    /// The error inside, if this is one.
    #[must_use]
    pub fn as_error(&self) -> Option<&ErrorValue> {
        match self {
            Exceptional::Error(e) => Some(e),
            _ => None,
        }
    }

    /// A control value escaping the transaction boundary is reported as
    /// an `:EXCEPTION` error.
    #[must_use]
    pub fn escaped(self) -> ErrorValue {
        match self {
            Exceptional::Error(e) => e,
            other => ErrorValue::new(
                codes::EXCEPTION,
                Value::string(&format!("control value escaped: {other:?}")),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncatchable() {
        assert!(ErrorValue::new(codes::JUICE, Value::Nil).is_uncatchable());
        assert!(ErrorValue::new(codes::DEPTH, Value::Nil).is_uncatchable());
        assert!(!ErrorValue::new(codes::CAST, Value::Nil).is_uncatchable());
    }

    #[test]
    fn test_escaped_control_is_exception() {
        let e = Exceptional::Recur(vec![]).escaped();
        assert!(e.is_code(codes::EXCEPTION));
        let e = Exceptional::error(codes::FUNDS, Value::Nil).escaped();
        assert!(e.is_code(codes::FUNDS));
    }
}
