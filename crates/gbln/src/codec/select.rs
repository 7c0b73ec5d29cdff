//! Optimal engine type selection.
//!
//! The model stores every integer in `i64` and every string without a
//! capacity, so the engine type is chosen again on the way out: the
//! narrowest integer type that holds the value, and the smallest string
//! bucket that holds its character count.

use crate::error::{Error, Result};
use crate::ffi::ValueType;
use crate::limits::{MAX_STRING_CHARS, STRING_CAPACITY_BUCKETS};

/// Returns the narrowest engine integer type that holds `n`.
///
/// Non-negative values always get an unsigned type; negative values get a
/// signed one.
pub fn optimal_int_type(n: i64) -> ValueType {
    if n >= 0 {
        if n <= u8::MAX as i64 {
            ValueType::U8
        } else if n <= u16::MAX as i64 {
            ValueType::U16
        } else if n <= u32::MAX as i64 {
            ValueType::U32
        } else {
            ValueType::U64
        }
    } else if n >= i8::MIN as i64 {
        ValueType::I8
    } else if n >= i16::MIN as i64 {
        ValueType::I16
    } else if n >= i32::MIN as i64 {
        ValueType::I32
    } else {
        ValueType::I64
    }
}

/// Counts UTF-8 characters by their lead bytes.
///
/// Continuation bytes are skipped without inspection. A sequence cut off
/// by the end of input still counts as one character.
pub fn char_count(bytes: &[u8]) -> Result<usize> {
    let mut offset = 0;
    let mut chars = 0;
    while offset < bytes.len() {
        let byte = bytes[offset];
        let width = match byte {
            0x00..=0x7F => 1,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return Err(Error::InvalidEncoding { offset, byte }),
        };
        chars += 1;
        offset += width;
    }
    Ok(chars)
}

/// Returns the smallest capacity bucket holding `chars` characters.
pub fn string_capacity(chars: usize) -> Result<usize> {
    STRING_CAPACITY_BUCKETS
        .iter()
        .copied()
        .find(|&bucket| bucket >= chars)
        .ok_or(Error::StringTooLong {
            chars,
            max: MAX_STRING_CHARS,
        })
}

/// Returns the capacity bucket for `s`.
pub fn optimal_string_capacity(s: &str) -> Result<usize> {
    string_capacity(char_count(s.as_bytes())?)
}
