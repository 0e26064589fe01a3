//! # Addresses
//!
//! An address is a non-negative index into the state's account vector.
//! Addresses are assigned sequentially; the next free address is always
//! the current account count.

use std::fmt;

/// An account address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub u64);

impl Address {
    /// Creates an address from its numeric index.
    #[must_use]
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the numeric index.
    #[must_use]
    pub const fn index(&self) -> u64 {
        self.0
    }

    /// 8-byte big-endian form, used as a blob-map key.
    #[must_use]
    pub const fn to_key_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for Address {
    fn from(index: u64) -> Self {
        Self(index)
    }
}
