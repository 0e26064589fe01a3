//! # Compiled Operations
//!
//! The op tree a program compiles to. Ops are plain data cells; execution
//! lives in the CVM crate. Closures pair an op-level function template
//! with the local bindings captured at construction.

use crate::symbolic::Symbol;
use crate::value::Value;
use std::sync::Arc;

/// A compiled VM operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// Push a constant value.
    Constant(Value),
    /// Resolve a symbol in an account environment. The optional address op
    /// selects the environment; default is the executing account.
    Lookup {
        address: Option<Box<Op>>,
        symbol: Symbol,
    },
    /// Read the local binding at a frame position.
    Local(u32),
    /// Mutate the local binding at a frame position, scoped to the
    /// enclosing binding form.
    SetLocal { index: u32, op: Box<Op> },
    /// Run ops in order; the last result wins.
    Do(Vec<Op>),
    /// Test/result pairs with an optional fallback.
    Cond {
        clauses: Vec<(Op, Op)>,
        fallback: Option<Box<Op>>,
    },
    /// Bind successive results to fresh locals, then run the body.
    /// `loop_form` marks a recur target.
    Let {
        bindings: Vec<(Symbol, Op)>,
        body: Vec<Op>,
        loop_form: bool,
    },
    /// Construct a closure capturing the current locals.
    Lambda(Arc<FnTemplate>),
    /// Evaluate a function and arguments, then invoke through the
    /// trampoline.
    Invoke { func: Box<Op>, args: Vec<Op> },
    /// Evaluate and bind a symbol in the executing account's environment.
    Def { symbol: Symbol, op: Box<Op> },
    /// Read a context field.
    Special(Special),
    /// Run an op and roll the state back afterwards, keeping the result.
    Query(Box<Op>),
}

impl Op {
    /// Op code byte used in the canonical encoding.
    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            Op::Constant(_) => 0,
            Op::Lookup { .. } => 1,
            Op::Local(_) => 2,
            Op::SetLocal { .. } => 3,
            Op::Do(_) => 4,
            Op::Cond { .. } => 5,
            Op::Let { .. } => 6,
            Op::Lambda(_) => 7,
            Op::Invoke { .. } => 8,
            Op::Def { .. } => 9,
            Op::Special(_) => 10,
            Op::Query(_) => 11,
        }
    }
}

/// One arity clause of a function.
#[derive(Clone, Debug, PartialEq)]
pub struct FnClause {
    /// Parameter names. With `variadic`, the last collects the rest as a
    /// vector.
    pub params: Vec<Symbol>,
    pub variadic: bool,
    pub body: Op,
}

impl FnClause {
    /// Whether this clause accepts `n` arguments.
    #[must_use]
    pub fn matches_arity(&self, n: usize) -> bool {
        if self.variadic {
            n + 1 >= self.params.len()
        } else {
            n == self.params.len()
        }
    }
}

/// A multi-arity function template.
#[derive(Clone, Debug, PartialEq)]
pub struct FnTemplate {
    pub clauses: Vec<FnClause>,
}

impl FnTemplate {
    /// First clause accepting `n` arguments.
    #[must_use]
    pub fn clause_for(&self, n: usize) -> Option<&FnClause> {
        self.clauses.iter().find(|c| c.matches_arity(n))
    }
}

/// A closure: template plus captured locals.
#[derive(Clone, Debug, PartialEq)]
pub struct Closure(pub(crate) Arc<ClosureRep>);

#[derive(Debug, PartialEq)]
pub(crate) struct ClosureRep {
    pub template: Arc<FnTemplate>,
    pub captured: Vec<Value>,
}

impl Closure {
    /// Builds a closure over captured locals.
    #[must_use]
    pub fn new(template: Arc<FnTemplate>, captured: Vec<Value>) -> Self {
        Closure(Arc::new(ClosureRep { template, captured }))
    }

    /// The function template.
    #[must_use]
    pub fn template(&self) -> &Arc<FnTemplate> {
        &self.0.template
    }

    /// The captured locals frame.
    #[must_use]
    pub fn captured(&self) -> &[Value] {
        &self.0.captured
    }
}

/// Context fields readable through `Special` ops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Special {
    Address,
    Origin,
    Caller,
    Juice,
    JuiceLimit,
    JuicePrice,
    Balance,
    Memory,
    Offer,
    Scope,
    State,
    Holdings,
    Timestamp,
    Depth,
    Key,
    Result,
}

impl Special {
    /// All specials with their surface names.
    pub const ALL: [(Special, &'static str); 16] = [
        (Special::Address, "*address*"),
        (Special::Origin, "*origin*"),
        (Special::Caller, "*caller*"),
        (Special::Juice, "*juice*"),
        (Special::JuiceLimit, "*juice-limit*"),
        (Special::JuicePrice, "*juice-price*"),
        (Special::Balance, "*balance*"),
        (Special::Memory, "*memory*"),
        (Special::Offer, "*offer*"),
        (Special::Scope, "*scope*"),
        (Special::State, "*state*"),
        (Special::Holdings, "*holdings*"),
        (Special::Timestamp, "*timestamp*"),
        (Special::Depth, "*depth*"),
        (Special::Key, "*key*"),
        (Special::Result, "*result*"),
    ];

    /// Looks a special up by surface name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Special> {
        Self::ALL
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(s, _)| *s)
    }

    /// The surface name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(s, _)| s == self)
            .map(|(_, n)| *n)
            .expect("special listed")
    }

    /// Stable wire id.
    #[must_use]
    pub fn id(&self) -> u8 {
        Self::ALL
            .iter()
            .position(|(s, _)| s == self)
            .expect("special listed") as u8
    }

    /// Special for a wire id.
    #[must_use]
    pub fn from_id(id: u8) -> Option<Special> {
        Self::ALL.get(id as usize).map(|(s, _)| *s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_special_roundtrip() {
        for (s, name) in Special::ALL {
            assert_eq!(Special::from_name(name), Some(s));
            assert_eq!(Special::from_id(s.id()), Some(s));
            assert_eq!(s.name(), name);
        }
        assert_eq!(Special::from_name("*nope*"), None);
    }

    #[test]
    fn test_clause_arity() {
        let c = FnClause {
            params: vec![Symbol::intern("a"), Symbol::intern("rest")],
            variadic: true,
            body: Op::Constant(Value::Nil),
        };
        assert!(c.matches_arity(1));
        assert!(c.matches_arity(5));
        assert!(!c.matches_arity(0));
        let f = FnClause {
            params: vec![Symbol::intern("a")],
            variadic: false,
            body: Op::Constant(Value::Nil),
        };
        assert!(f.matches_arity(1));
        assert!(!f.matches_arity(2));
    }
}
