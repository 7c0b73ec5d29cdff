//! The engine boundary.
//!
//! The GBLN engine (grammar, serialiser, compression, file format) lives
//! outside this crate and is reached only through opaque pointers and a
//! narrow C-style function surface, modelled here as the [`Engine`] trait.
//!
//! Ownership rules of the surface:
//! - `new_*`, `parse`, `read_io`, `to_string*`, `object_keys`,
//!   `config_new` and `last_error_*` hand an owned resource to the caller.
//! - `object_get`, `array_get` and `as_string` return borrowed pointers
//!   that stay valid only while their parent value is alive.
//! - `object_insert` and `array_push` take ownership of the child **only
//!   when they return success**. On failure the caller still owns it.
//!
//! Use [`handle`] wrappers rather than raw pointers wherever a resource is
//! owned.

pub mod handle;
#[cfg(feature = "libgbln")]
pub mod libgbln;
#[cfg(test)]
pub(crate) mod mock;

use std::ffi::c_char;

pub use handle::{
    HandleKind, KeyList, OwnedConfig, OwnedKeys, OwnedString, OwnedValue, Rejected, Resource,
    Scoped,
};
#[cfg(feature = "libgbln")]
pub use libgbln::LibGbln;

/// Opaque engine value.
#[repr(C)]
pub struct RawValue {
    _private: [u8; 0],
}

/// Opaque engine configuration.
#[repr(C)]
pub struct RawConfig {
    _private: [u8; 0],
}

/// Raw result code as returned by the engine. See [`ErrorCode`](crate::ErrorCode).
pub type RawCode = i32;

/// Raw type tag as returned by the engine. See [`ValueType`].
pub type RawTag = i32;

/// Foreign value type tags (fifteen engine types).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ValueType {
    I8 = 0,
    I16 = 1,
    I32 = 2,
    I64 = 3,
    U8 = 4,
    U16 = 5,
    U32 = 6,
    U64 = 7,
    F32 = 8,
    F64 = 9,
    Str = 10,
    Bool = 11,
    Null = 12,
    Object = 13,
    Array = 14,
}

impl ValueType {
    /// Creates a ValueType from its raw engine tag.
    pub fn from_raw(v: RawTag) -> Option<ValueType> {
        match v {
            0 => Some(ValueType::I8),
            1 => Some(ValueType::I16),
            2 => Some(ValueType::I32),
            3 => Some(ValueType::I64),
            4 => Some(ValueType::U8),
            5 => Some(ValueType::U16),
            6 => Some(ValueType::U32),
            7 => Some(ValueType::U64),
            8 => Some(ValueType::F32),
            9 => Some(ValueType::F64),
            10 => Some(ValueType::Str),
            11 => Some(ValueType::Bool),
            12 => Some(ValueType::Null),
            13 => Some(ValueType::Object),
            14 => Some(ValueType::Array),
            _ => None,
        }
    }

    /// Returns the raw engine tag.
    pub fn as_raw(self) -> RawTag {
        self as RawTag
    }

    /// Returns true for the eight integer tags.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ValueType::I8
                | ValueType::I16
                | ValueType::I32
                | ValueType::I64
                | ValueType::U8
                | ValueType::U16
                | ValueType::U32
                | ValueType::U64
        )
    }

    /// Returns true for unsigned integer tags.
    pub fn is_unsigned(self) -> bool {
        matches!(self, ValueType::U8 | ValueType::U16 | ValueType::U32 | ValueType::U64)
    }

    /// Returns the bit width of integer and float tags.
    pub fn bit_width(self) -> Option<u32> {
        match self {
            ValueType::I8 | ValueType::U8 => Some(8),
            ValueType::I16 | ValueType::U16 => Some(16),
            ValueType::I32 | ValueType::U32 | ValueType::F32 => Some(32),
            ValueType::I64 | ValueType::U64 | ValueType::F64 => Some(64),
            _ => None,
        }
    }

    /// Returns the type hint used in GBLN text (e.g., "u32", "b").
    ///
    /// Strings have no fixed hint; their hint carries the capacity (`s64`).
    pub fn hint(self) -> &'static str {
        match self {
            ValueType::I8 => "i8",
            ValueType::I16 => "i16",
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::U8 => "u8",
            ValueType::U16 => "u16",
            ValueType::U32 => "u32",
            ValueType::U64 => "u64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::Str => "s",
            ValueType::Bool => "b",
            ValueType::Null => "n",
            ValueType::Object => "{}",
            ValueType::Array => "[]",
        }
    }
}

/// The C-style function surface of a GBLN engine.
///
/// # Safety
///
/// Implementors must follow the ownership rules described in the
/// [module docs](self): every pointer returned as owned must be released
/// exactly once through the matching `*_free` function, borrowed pointers
/// must remain valid while their parent lives, and `object_insert` /
/// `array_push` must leave the child untouched when they report failure.
///
/// Every `unsafe fn` requires its pointer arguments to be either null or
/// live pointers previously obtained from the same engine, and string
/// arguments to be NUL-terminated.
pub unsafe trait Engine {
    /// Guard held for the duration of one public operation.
    type Guard<'a>
    where
        Self: 'a;

    /// Enters the engine. The returned guard serialises access to
    /// process-wide engine state (notably the last error) while held.
    fn enter(&self) -> Self::Guard<'_>;

    // --- Lifecycle ---

    unsafe fn value_free(&self, value: *mut RawValue);
    unsafe fn string_free(&self, s: *mut c_char);
    unsafe fn keys_free(&self, keys: *mut *mut c_char, count: usize);
    unsafe fn config_free(&self, config: *mut RawConfig);

    // --- Parsing / serialising ---

    unsafe fn parse(&self, input: *const c_char, out_value: *mut *mut RawValue) -> RawCode;
    unsafe fn to_string(&self, value: *const RawValue) -> *mut c_char;
    unsafe fn to_string_pretty(&self, value: *const RawValue) -> *mut c_char;

    // --- Error information ---

    /// Returns a freshly allocated copy of the last error message, or null.
    fn last_error_message(&self) -> *mut c_char;
    /// Returns a freshly allocated copy of the last error suggestion, or null.
    fn last_error_suggestion(&self) -> *mut c_char;

    // --- Introspection ---

    unsafe fn value_type(&self, value: *const RawValue) -> RawTag;

    unsafe fn as_i8(&self, value: *const RawValue, ok: *mut bool) -> i8;
    unsafe fn as_i16(&self, value: *const RawValue, ok: *mut bool) -> i16;
    unsafe fn as_i32(&self, value: *const RawValue, ok: *mut bool) -> i32;
    unsafe fn as_i64(&self, value: *const RawValue, ok: *mut bool) -> i64;
    unsafe fn as_u8(&self, value: *const RawValue, ok: *mut bool) -> u8;
    unsafe fn as_u16(&self, value: *const RawValue, ok: *mut bool) -> u16;
    unsafe fn as_u32(&self, value: *const RawValue, ok: *mut bool) -> u32;
    unsafe fn as_u64(&self, value: *const RawValue, ok: *mut bool) -> u64;
    unsafe fn as_f32(&self, value: *const RawValue, ok: *mut bool) -> f32;
    unsafe fn as_f64(&self, value: *const RawValue, ok: *mut bool) -> f64;
    /// Borrowed from `value`; must not be freed.
    unsafe fn as_string(&self, value: *const RawValue, ok: *mut bool) -> *const c_char;
    unsafe fn as_bool(&self, value: *const RawValue, ok: *mut bool) -> bool;

    unsafe fn object_len(&self, value: *const RawValue) -> usize;
    /// Borrowed from `value`.
    unsafe fn object_get(&self, value: *const RawValue, key: *const c_char) -> *const RawValue;
    /// Owned; release with [`Engine::keys_free`].
    unsafe fn object_keys(&self, value: *const RawValue, out_count: *mut usize) -> *mut *mut c_char;

    unsafe fn array_len(&self, value: *const RawValue) -> usize;
    /// Borrowed from `value`.
    unsafe fn array_get(&self, value: *const RawValue, index: usize) -> *const RawValue;

    // --- Construction ---

    fn new_i8(&self, v: i8) -> *mut RawValue;
    fn new_i16(&self, v: i16) -> *mut RawValue;
    fn new_i32(&self, v: i32) -> *mut RawValue;
    fn new_i64(&self, v: i64) -> *mut RawValue;
    fn new_u8(&self, v: u8) -> *mut RawValue;
    fn new_u16(&self, v: u16) -> *mut RawValue;
    fn new_u32(&self, v: u32) -> *mut RawValue;
    fn new_u64(&self, v: u64) -> *mut RawValue;
    fn new_f32(&self, v: f32) -> *mut RawValue;
    fn new_f64(&self, v: f64) -> *mut RawValue;
    unsafe fn new_str(&self, v: *const c_char, max_len: usize) -> *mut RawValue;
    fn new_bool(&self, v: bool) -> *mut RawValue;
    fn new_null(&self) -> *mut RawValue;
    fn new_object(&self) -> *mut RawValue;
    fn new_array(&self) -> *mut RawValue;

    /// Takes ownership of `value` only on success.
    unsafe fn object_insert(
        &self,
        object: *mut RawValue,
        key: *const c_char,
        value: *mut RawValue,
    ) -> RawCode;
    /// Takes ownership of `value` only on success.
    unsafe fn array_push(&self, array: *mut RawValue, value: *mut RawValue) -> RawCode;

    // --- I/O ---

    unsafe fn write_io(
        &self,
        value: *const RawValue,
        path: *const c_char,
        config: *const RawConfig,
    ) -> RawCode;
    unsafe fn read_io(&self, path: *const c_char, out_value: *mut *mut RawValue) -> RawCode;

    // --- Configuration ---

    fn config_new(
        &self,
        mini_mode: bool,
        compress: bool,
        compression_level: u8,
        indent: usize,
        strip_comments: bool,
    ) -> *mut RawConfig;
}
