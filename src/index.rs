//! Index normalization for single indices, ranges and `(first, length)` pairs

use std::ops::Range;

use crate::error::{ProxyError, Result};
use crate::Value;

/// Wraps a negative index once and checks it against `len`.
#[must_use]
pub fn normalize(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

/// Extracts an index from a dynamic value. Only integers are accepted.
pub fn index_from_value(value: &Value) -> Result<i64> {
    match value {
        Value::Integer(i) => Ok(*i),
        other => Err(ProxyError::type_mismatch(other, "Integer")),
    }
}

/// A parsed subscript.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// A single element
    Index(i64),
    /// A range of elements, `first..last` or `first..=last`
    Range {
        /// First endpoint, possibly negative
        first: i64,
        /// Last endpoint, possibly negative
        last: i64,
        /// Whether `last` is excluded
        exclude_end: bool,
    },
    /// `length` elements starting at `first`
    Pair {
        /// Start, possibly negative
        first: i64,
        /// Requested number of elements
        length: i64,
    },
}

impl Selector {
    /// Parses a single subscript argument: an integer or an integer range.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Range(range) => match (&range.first, &range.last) {
                (Value::Integer(first), Value::Integer(last)) => Ok(Selector::Range {
                    first: *first,
                    last: *last,
                    exclude_end: range.exclude_end,
                }),
                _ => Err(ProxyError::TypeMismatch(
                    "only Integer ranges supported".into(),
                )),
            },
            other => index_from_value(other).map(Selector::Index),
        }
    }

    /// Parses positional subscript arguments: one index or range, or a
    /// `(first, length)` pair.
    pub fn from_args(args: &[Value]) -> Result<Self> {
        match args {
            [single] => Self::from_value(single),
            [first, length] => Ok(Selector::Pair {
                first: index_from_value(first)?,
                length: index_from_value(length)?,
            }),
            _ => Err(ProxyError::TypeMismatch(format!(
                "wrong number of arguments (given {}, expected 1..2)",
                args.len()
            ))),
        }
    }
}

/// Resolves a range against an array of `len` elements. Never fails: an
/// empty or out-of-bounds range yields an empty window, and a window that
/// runs past the end is clipped.
#[must_use]
pub fn range_window(first: i64, last: i64, exclude_end: bool, len: usize) -> Range<usize> {
    let signed_len = i64::try_from(len).unwrap_or(i64::MAX);
    let wrap = |i: i64| if i < 0 { i.saturating_add(signed_len) } else { i };
    let start = wrap(first);
    let end = wrap(last);
    let mut count = end.saturating_sub(start);
    if !exclude_end {
        count = count.saturating_add(1);
    }
    if count <= 0 || start < 0 || start >= signed_len {
        return 0..0;
    }
    let stop = start.saturating_add(count).min(signed_len);
    // both bounds lie in 0..=len here
    start as usize..stop as usize
}

/// Resolves a `(first, length)` pair against an array of `len` elements.
///
/// Unlike ranges, pairs are strict: a length greater than the array, or a
/// window that does not fit once `first` is wrapped, is a bounds error.
pub fn pair_window(first: i64, length: i64, len: usize) -> Result<Range<usize>> {
    let signed_len = i64::try_from(len).unwrap_or(i64::MAX);
    if length > signed_len {
        return Err(ProxyError::Bounds(format!(
            "length {} exceeds array length {}",
            length, len
        )));
    }
    if length <= 0 {
        return Ok(0..0);
    }
    let start = if first < 0 { first + signed_len } else { first };
    match start.checked_add(length) {
        Some(stop) if start >= 0 && stop <= signed_len => Ok(start as usize..stop as usize),
        _ => Err(ProxyError::Bounds(format!(
            "window [{}, {}) does not fit in array of length {}",
            first,
            first.saturating_add(length),
            len
        ))),
    }
}
