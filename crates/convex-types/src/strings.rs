//! # String Cells
//!
//! UTF-8 text cells. Short strings (at most 4096 bytes) are flat; longer
//! text splits into a list of flat chunks, each the longest prefix that
//! fits 4096 bytes without splitting a character. The greedy split is a
//! pure function of the text, so the chunk layout is canonical and every
//! chunk is independently valid UTF-8.

use crate::cache::CellMeta;
use crate::tags::MAX_CHUNK_LENGTH;
use std::fmt;
use std::sync::Arc;

/// An immutable UTF-8 string cell.
#[derive(Clone, Debug)]
pub struct Str(pub(crate) Arc<StrRep>);

#[derive(Debug)]
pub(crate) enum StrRep {
    Flat {
        text: String,
        meta: CellMeta,
    },
    Tree {
        len: u64,
        /// Flat chunks in order.
        children: Vec<Str>,
        meta: CellMeta,
    },
}

/// Greedy char-boundary split into chunks of at most 4096 bytes.
fn split_chunks(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = text;
    while rest.len() > MAX_CHUNK_LENGTH {
        let mut cut = MAX_CHUNK_LENGTH;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        out.push(&rest[..cut]);
        rest = &rest[cut..];
    }
    out.push(rest);
    out
}

impl Str {
    /// The empty string.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_str("")
    }

    /// Builds the canonical string cell for text.
    #[must_use]
    pub fn from_str(text: &str) -> Self {
        if text.len() <= MAX_CHUNK_LENGTH {
            return Str(Arc::new(StrRep::Flat {
                text: text.to_owned(),
                meta: CellMeta::new(),
            }));
        }
        let children: Vec<Str> = split_chunks(text)
            .into_iter()
            .map(Str::from_str)
            .collect();
        Str(Arc::new(StrRep::Tree {
            len: text.len() as u64,
            children,
            meta: CellMeta::new(),
        }))
    }

    /// Byte length.
    #[must_use]
    pub fn len(&self) -> u64 {
        match &*self.0 {
            StrRep::Flat { text, .. } => text.len() as u64,
            StrRep::Tree { len, .. } => *len,
        }
    }

    /// Returns true for the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collects the full text.
    #[must_use]
    pub fn to_string_value(&self) -> String {
        match &*self.0 {
            StrRep::Flat { text, .. } => text.clone(),
            StrRep::Tree { len, children, .. } => {
                let mut out = String::with_capacity(*len as usize);
                for c in children {
                    out.push_str(&c.to_string_value());
                }
                out
            }
        }
    }

    /// Canonical concatenation.
    #[must_use]
    pub fn append(&self, other: &Str) -> Str {
        let mut text = self.to_string_value();
        text.push_str(&other.to_string_value());
        Str::from_str(&text)
    }

    pub(crate) fn meta(&self) -> &CellMeta {
        match &*self.0 {
            StrRep::Flat { meta, .. } | StrRep::Tree { meta, .. } => meta,
        }
    }

    pub(crate) fn tree_children(&self) -> Option<&[Str]> {
        match &*self.0 {
            StrRep::Flat { .. } => None,
            StrRep::Tree { children, .. } => Some(children),
        }
    }

    pub(crate) fn flat_text(&self) -> Option<&str> {
        match &*self.0 {
            StrRep::Flat { text, .. } => Some(text),
            StrRep::Tree { .. } => None,
        }
    }
}

impl PartialEq for Str {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        self.len() == other.len() && self.to_string_value() == other.to_string_value()
    }
}

impl Eq for Str {}

impl fmt::Display for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_value())
    }
}
