//! Interned instrument symbols.
//!
//! Symbols are short ASCII strings (underlyings up to 8 bytes, option
//! tickers up to 32) stored inline so that hot-path maps and value objects
//! never allocate.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Maximum symbol length in bytes.
pub const MAX_SYMBOL_LEN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("symbol is empty")]
    Empty,

    #[error("symbol '{0}' exceeds {MAX_SYMBOL_LEN} bytes")]
    TooLong(String),

    #[error("symbol '{0}' contains non-ASCII bytes")]
    NotAscii(String),
}

/// An inline, copyable instrument symbol.
///
/// Unused trailing bytes are always zero, so equality, hashing, and
/// ordering derive directly from the byte array.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol {
    bytes: [u8; MAX_SYMBOL_LEN],
    len: u8,
}

impl Symbol {
    /// Intern a symbol, validating length and character set.
    pub fn new(s: &str) -> Result<Self, SymbolError> {
        if s.is_empty() {
            return Err(SymbolError::Empty);
        }
        if s.len() > MAX_SYMBOL_LEN {
            return Err(SymbolError::TooLong(s.to_string()));
        }
        if !s.is_ascii() {
            return Err(SymbolError::NotAscii(s.to_string()));
        }
        let mut bytes = [0u8; MAX_SYMBOL_LEN];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self {
            bytes,
            len: s.len() as u8,
        })
    }

    pub fn as_str(&self) -> &str {
        // Construction guarantees ASCII.
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.as_str())
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

struct SymbolVisitor;

impl Visitor<'_> for SymbolVisitor {
    type Value = Symbol;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "an ASCII symbol of at most {MAX_SYMBOL_LEN} bytes")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Symbol, E> {
        Symbol::new(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(SymbolVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let sym = Symbol::new("SPY").unwrap();
        assert_eq!(sym.as_str(), "SPY");
        assert_eq!(sym.len(), 3);
        assert_eq!(sym.to_string(), "SPY");
    }

    #[test]
    fn test_equality_and_ordering() {
        let a = Symbol::new("AAPL").unwrap();
        let b = Symbol::new("AAPL").unwrap();
        let c = Symbol::new("SPY").unwrap();
        assert_eq!(a, b);
        assert!(a < c);
    }

    #[test]
    fn test_rejects_invalid() {
        assert_eq!(Symbol::new(""), Err(SymbolError::Empty));
        let long = "X".repeat(MAX_SYMBOL_LEN + 1);
        assert!(matches!(Symbol::new(&long), Err(SymbolError::TooLong(_))));
        assert!(matches!(Symbol::new("é"), Err(SymbolError::NotAscii(_))));
    }

    #[test]
    fn test_max_len_accepted() {
        let max = "A".repeat(MAX_SYMBOL_LEN);
        let sym = Symbol::new(&max).unwrap();
        assert_eq!(sym.len(), MAX_SYMBOL_LEN);
    }

    #[test]
    fn test_serde_as_string() {
        let sym = Symbol::new("QQQ").unwrap();
        let json = serde_json::to_string(&sym).unwrap();
        assert_eq!(json, "\"QQQ\"");
        let back: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sym);
    }
}
