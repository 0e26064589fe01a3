//! # Symbols and Keywords
//!
//! Named identifiers of 1 to 128 characters. Symbols name bindings in
//! account environments; keywords are self-evaluating interned names used
//! for error codes and metadata keys.

use crate::errors::EncodingError;
use crate::tags::MAX_NAME_LENGTH;
use std::fmt;
use std::sync::Arc;

fn check_name(name: &str) -> Result<(), EncodingError> {
    let n = name.chars().count();
    if n == 0 || n > MAX_NAME_LENGTH {
        return Err(EncodingError::InvalidData(format!(
            "name length {n} outside 1..={MAX_NAME_LENGTH}"
        )));
    }
    Ok(())
}

/// A symbol.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Creates a symbol, validating the name length.
    pub fn new(name: &str) -> Result<Self, EncodingError> {
        check_name(name)?;
        Ok(Self(Arc::from(name)))
    }

    /// Creates a symbol from a name known to be valid.
    ///
    /// # Panics
    ///
    /// Panics if the name is empty or longer than 128 characters.
    #[must_use]
    pub fn intern(name: &str) -> Self {
        Self::new(name).expect("valid symbol name")
    }

    /// The symbol's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A keyword.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Keyword(Arc<str>);

impl Keyword {
    /// Creates a keyword, validating the name length.
    pub fn new(name: &str) -> Result<Self, EncodingError> {
        check_name(name)?;
        Ok(Self(Arc::from(name)))
    }

    /// Creates a keyword from a name known to be valid.
    ///
    /// # Panics
    ///
    /// Panics if the name is empty or longer than 128 characters.
    #[must_use]
    pub fn intern(name: &str) -> Self {
        Self::new(name).expect("valid keyword name")
    }

    /// The keyword's name, without the leading colon.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_limits() {
        assert!(Symbol::new("").is_err());
        assert!(Symbol::new("x").is_ok());
        let long: String = "a".repeat(128);
        assert!(Keyword::new(&long).is_ok());
        let too_long: String = "a".repeat(129);
        assert!(Keyword::new(&too_long).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Symbol::intern("foo").to_string(), "foo");
        assert_eq!(Keyword::intern("bar").to_string(), ":bar");
    }
}
