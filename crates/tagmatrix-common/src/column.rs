//! Spreadsheet column identifiers.
//!
//! Columns are numbered with *bijective* base-26: there is no zero digit, so
//! `A`..`Z` are 1..26, `AA` is 27, `AZ` is 52, `BA` is 53 and so on. Unlike a
//! plain base-26 encoding there is exactly one spelling per index and `Z`
//! rolls over to `AA`, never to `BA` or `A0`.

use core::cmp::Ordering;
use core::fmt;
use core::num::NonZeroU32;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Largest index we will encode. `u32::MAX` spells `MWLQKWU`, seven letters.
pub const MAX_COLUMN_INDEX: u32 = u32::MAX;

/// Errors returned when parsing a column identifier from unchecked input.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ColumnError {
    Empty,
    /// Any byte outside `A-Z`. Lowercase letters are rejected too.
    InvalidChar(char),
    Overflow(String),
    /// Index 0 has no bijective base-26 spelling.
    ZeroIndex,
}

impl fmt::Display for ColumnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnError::Empty => write!(f, "column identifier is empty"),
            ColumnError::InvalidChar(ch) => {
                write!(f, "column identifier contains {ch:?}; only A-Z are allowed")
            }
            ColumnError::Overflow(s) => {
                write!(f, "column identifier {s} exceeds {MAX_COLUMN_INDEX}")
            }
            ColumnError::ZeroIndex => write!(f, "column indices are 1-based"),
        }
    }
}

impl std::error::Error for ColumnError {}

/// Convert a 1-based column index into its letter spelling.
///
/// Returns `None` for `0`, which has no spelling.
pub fn column_to_letters(index: u32) -> Option<String> {
    NonZeroU32::new(index).map(encode)
}

fn encode(index: NonZeroU32) -> String {
    let mut n = index.get();
    let mut buf = String::with_capacity(7);
    while n > 0 {
        n -= 1;
        buf.insert(0, char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }
    buf
}

/// Convert a letter spelling back into its 1-based column index.
///
/// Returns `None` for empty input, anything other than `A-Z`, or a value
/// that does not fit in `u32`.
pub fn letters_to_column(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for ch in s.bytes() {
        if !ch.is_ascii_uppercase() {
            return None;
        }
        col = col.checked_mul(26)?;
        col = col.checked_add((ch - b'A') as u32 + 1)?;
    }
    Some(col)
}

/// The identifier immediately after `s`: `A -> B`, `Z -> AA`, `AZ -> BA`.
pub fn next_column(s: &str) -> Option<String> {
    let idx = letters_to_column(s)?;
    column_to_letters(idx.checked_add(1)?)
}

/// A validated column identifier.
///
/// Holds both the spelling (so sinks can address cells without re-encoding)
/// and the index (so identifiers order numerically: `Z < AA`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnId {
    index: u32,
    letters: String,
}

impl ColumnId {
    /// Column `A`.
    pub fn first() -> Self {
        Self {
            index: 1,
            letters: "A".to_string(),
        }
    }

    pub fn from_index(index: u32) -> Result<Self, ColumnError> {
        NonZeroU32::new(index)
            .map(Self::nth)
            .ok_or(ColumnError::ZeroIndex)
    }

    /// Infallible constructor; every non-zero index has a spelling.
    pub fn nth(index: NonZeroU32) -> Self {
        Self {
            index: index.get(),
            letters: encode(index),
        }
    }

    pub fn parse(s: &str) -> Result<Self, ColumnError> {
        if s.is_empty() {
            return Err(ColumnError::Empty);
        }
        if let Some(bad) = s.chars().find(|c| !c.is_ascii_uppercase()) {
            return Err(ColumnError::InvalidChar(bad));
        }
        let index = letters_to_column(s).ok_or_else(|| ColumnError::Overflow(s.to_string()))?;
        Ok(Self {
            index,
            letters: s.to_string(),
        })
    }

    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.letters
    }

    /// The following column, or an overflow error past `MWLQKWU`.
    pub fn next(&self) -> Result<Self, ColumnError> {
        let index = self
            .index
            .checked_add(1)
            .ok_or_else(|| ColumnError::Overflow(self.letters.clone()))?;
        Self::from_index(index)
    }

    /// A1-style reference for `row` in this column, e.g. `G12`.
    pub fn cell(&self, row: u32) -> String {
        format!("{}{}", self.letters, row)
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.letters)
    }
}

impl FromStr for ColumnId {
    type Err = ColumnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<u32> for ColumnId {
    type Error = ColumnError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_index(value)
    }
}

impl AsRef<str> for ColumnId {
    fn as_ref(&self) -> &str {
        &self.letters
    }
}

impl PartialOrd for ColumnId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ColumnId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}

#[cfg(feature = "serde")]
impl Serialize for ColumnId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.letters)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for ColumnId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ColumnId::parse(&s).map_err(serde::de::Error::custom)
    }
}
