//! # Syntax Cells
//!
//! A syntax cell wraps a value with a metadata map. `def` merges the
//! metadata of a syntax result into the defined symbol's metadata.

use crate::map::Map;
use crate::value::Value;
use std::sync::Arc;

/// A value annotated with metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Syntax(pub(crate) Arc<SyntaxRep>);

#[derive(Debug, PartialEq)]
pub(crate) struct SyntaxRep {
    pub value: Value,
    pub meta: Map,
}

impl Syntax {
    /// Wraps a value with metadata.
    #[must_use]
    pub fn new(value: Value, meta: Map) -> Self {
        Syntax(Arc::new(SyntaxRep { value, meta }))
    }

    /// The wrapped value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.0.value
    }

    /// The metadata map.
    #[must_use]
    pub fn meta(&self) -> &Map {
        &self.0.meta
    }

    /// Unwraps nested syntax down to the plain value.
    #[must_use]
    pub fn unwrap_all(&self) -> Value {
        match self.value() {
            Value::Syntax(inner) => inner.unwrap_all(),
            v => v.clone(),
        }
    }
}

impl Eq for Syntax {}
