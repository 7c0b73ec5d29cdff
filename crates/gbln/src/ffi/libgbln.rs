//! Bindings to the native `libgbln` engine.
//!
//! The library keeps its last-error state in process-wide storage, so every
//! operation runs under one global lock (see [`Engine::enter`]).

use std::ffi::c_char;
use std::sync::{Mutex, MutexGuard};

use lazy_static::lazy_static;

use crate::ffi::{Engine, RawCode, RawConfig, RawTag, RawValue};

// C enums `GblnErrorCode` and `GblnValueType` are int-sized.
#[link(name = "gbln")]
unsafe extern "C" {
    fn gbln_value_free(value: *mut RawValue);
    fn gbln_string_free(s: *mut c_char);
    fn gbln_keys_free(keys: *mut *mut c_char, count: usize);

    fn gbln_parse(input: *const c_char, out_value: *mut *mut RawValue) -> RawCode;
    fn gbln_to_string(value: *const RawValue) -> *mut c_char;
    fn gbln_to_string_pretty(value: *const RawValue) -> *mut c_char;

    fn gbln_last_error_message() -> *mut c_char;
    fn gbln_last_error_suggestion() -> *mut c_char;

    fn gbln_value_type(value: *const RawValue) -> RawTag;

    fn gbln_value_as_i8(value: *const RawValue, ok: *mut bool) -> i8;
    fn gbln_value_as_i16(value: *const RawValue, ok: *mut bool) -> i16;
    fn gbln_value_as_i32(value: *const RawValue, ok: *mut bool) -> i32;
    fn gbln_value_as_i64(value: *const RawValue, ok: *mut bool) -> i64;
    fn gbln_value_as_u8(value: *const RawValue, ok: *mut bool) -> u8;
    fn gbln_value_as_u16(value: *const RawValue, ok: *mut bool) -> u16;
    fn gbln_value_as_u32(value: *const RawValue, ok: *mut bool) -> u32;
    fn gbln_value_as_u64(value: *const RawValue, ok: *mut bool) -> u64;
    fn gbln_value_as_f32(value: *const RawValue, ok: *mut bool) -> f32;
    fn gbln_value_as_f64(value: *const RawValue, ok: *mut bool) -> f64;
    fn gbln_value_as_string(value: *const RawValue, ok: *mut bool) -> *mut c_char;
    fn gbln_value_as_bool(value: *const RawValue, ok: *mut bool) -> bool;

    fn gbln_object_len(value: *const RawValue) -> usize;
    fn gbln_object_get(value: *const RawValue, key: *const c_char) -> *const RawValue;
    fn gbln_object_keys(value: *const RawValue, out_count: *mut usize) -> *mut *mut c_char;
    fn gbln_array_len(value: *const RawValue) -> usize;
    fn gbln_array_get(value: *const RawValue, index: usize) -> *const RawValue;

    fn gbln_value_new_i8(value: i8) -> *mut RawValue;
    fn gbln_value_new_i16(value: i16) -> *mut RawValue;
    fn gbln_value_new_i32(value: i32) -> *mut RawValue;
    fn gbln_value_new_i64(value: i64) -> *mut RawValue;
    fn gbln_value_new_u8(value: u8) -> *mut RawValue;
    fn gbln_value_new_u16(value: u16) -> *mut RawValue;
    fn gbln_value_new_u32(value: u32) -> *mut RawValue;
    fn gbln_value_new_u64(value: u64) -> *mut RawValue;
    fn gbln_value_new_f32(value: f32) -> *mut RawValue;
    fn gbln_value_new_f64(value: f64) -> *mut RawValue;
    fn gbln_value_new_str(value: *const c_char, max_len: usize) -> *mut RawValue;
    fn gbln_value_new_bool(value: bool) -> *mut RawValue;
    fn gbln_value_new_null() -> *mut RawValue;
    fn gbln_value_new_object() -> *mut RawValue;
    fn gbln_value_new_array() -> *mut RawValue;

    fn gbln_object_insert(
        object: *mut RawValue,
        key: *const c_char,
        value: *mut RawValue,
    ) -> RawCode;
    fn gbln_array_push(array: *mut RawValue, value: *mut RawValue) -> RawCode;

    fn gbln_write_io(
        value: *const RawValue,
        path: *const c_char,
        config: *const RawConfig,
    ) -> RawCode;
    fn gbln_read_io(path: *const c_char, out_value: *mut *mut RawValue) -> RawCode;

    fn gbln_config_new(
        mini_mode: bool,
        compress: bool,
        compression_level: u8,
        indent: usize,
        strip_comments: bool,
    ) -> *mut RawConfig;
    fn gbln_config_free(config: *mut RawConfig);
}

lazy_static! {
    static ref ENGINE_LOCK: Mutex<()> = Mutex::new(());
}

/// The linked native engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibGbln;

// SAFETY: the bindings forward to libgbln, whose ownership contract is the
// one the trait describes.
unsafe impl Engine for LibGbln {
    type Guard<'a> = MutexGuard<'static, ()>;

    fn enter(&self) -> Self::Guard<'_> {
        // The lock guards no data, so poisoning is ignored.
        ENGINE_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    unsafe fn value_free(&self, value: *mut RawValue) {
        unsafe { gbln_value_free(value) }
    }

    unsafe fn string_free(&self, s: *mut c_char) {
        unsafe { gbln_string_free(s) }
    }

    unsafe fn keys_free(&self, keys: *mut *mut c_char, count: usize) {
        unsafe { gbln_keys_free(keys, count) }
    }

    unsafe fn config_free(&self, config: *mut RawConfig) {
        unsafe { gbln_config_free(config) }
    }

    unsafe fn parse(&self, input: *const c_char, out_value: *mut *mut RawValue) -> RawCode {
        unsafe { gbln_parse(input, out_value) }
    }

    unsafe fn to_string(&self, value: *const RawValue) -> *mut c_char {
        unsafe { gbln_to_string(value) }
    }

    unsafe fn to_string_pretty(&self, value: *const RawValue) -> *mut c_char {
        unsafe { gbln_to_string_pretty(value) }
    }

    fn last_error_message(&self) -> *mut c_char {
        // SAFETY: no arguments; returns an owned string or null.
        unsafe { gbln_last_error_message() }
    }

    fn last_error_suggestion(&self) -> *mut c_char {
        // SAFETY: no arguments; returns an owned string or null.
        unsafe { gbln_last_error_suggestion() }
    }

    unsafe fn value_type(&self, value: *const RawValue) -> RawTag {
        unsafe { gbln_value_type(value) }
    }

    unsafe fn as_i8(&self, value: *const RawValue, ok: *mut bool) -> i8 {
        unsafe { gbln_value_as_i8(value, ok) }
    }

    unsafe fn as_i16(&self, value: *const RawValue, ok: *mut bool) -> i16 {
        unsafe { gbln_value_as_i16(value, ok) }
    }

    unsafe fn as_i32(&self, value: *const RawValue, ok: *mut bool) -> i32 {
        unsafe { gbln_value_as_i32(value, ok) }
    }

    unsafe fn as_i64(&self, value: *const RawValue, ok: *mut bool) -> i64 {
        unsafe { gbln_value_as_i64(value, ok) }
    }

    unsafe fn as_u8(&self, value: *const RawValue, ok: *mut bool) -> u8 {
        unsafe { gbln_value_as_u8(value, ok) }
    }

    unsafe fn as_u16(&self, value: *const RawValue, ok: *mut bool) -> u16 {
        unsafe { gbln_value_as_u16(value, ok) }
    }

    unsafe fn as_u32(&self, value: *const RawValue, ok: *mut bool) -> u32 {
        unsafe { gbln_value_as_u32(value, ok) }
    }

    unsafe fn as_u64(&self, value: *const RawValue, ok: *mut bool) -> u64 {
        unsafe { gbln_value_as_u64(value, ok) }
    }

    unsafe fn as_f32(&self, value: *const RawValue, ok: *mut bool) -> f32 {
        unsafe { gbln_value_as_f32(value, ok) }
    }

    unsafe fn as_f64(&self, value: *const RawValue, ok: *mut bool) -> f64 {
        unsafe { gbln_value_as_f64(value, ok) }
    }

    unsafe fn as_string(&self, value: *const RawValue, ok: *mut bool) -> *const c_char {
        // Borrowed from `value` despite the mutable pointer type.
        unsafe { gbln_value_as_string(value, ok) }.cast_const()
    }

    unsafe fn as_bool(&self, value: *const RawValue, ok: *mut bool) -> bool {
        unsafe { gbln_value_as_bool(value, ok) }
    }

    unsafe fn object_len(&self, value: *const RawValue) -> usize {
        unsafe { gbln_object_len(value) }
    }

    unsafe fn object_get(&self, value: *const RawValue, key: *const c_char) -> *const RawValue {
        unsafe { gbln_object_get(value, key) }
    }

    unsafe fn object_keys(&self, value: *const RawValue, out_count: *mut usize) -> *mut *mut c_char {
        unsafe { gbln_object_keys(value, out_count) }
    }

    unsafe fn array_len(&self, value: *const RawValue) -> usize {
        unsafe { gbln_array_len(value) }
    }

    unsafe fn array_get(&self, value: *const RawValue, index: usize) -> *const RawValue {
        unsafe { gbln_array_get(value, index) }
    }

    // SAFETY (constructors): scalar arguments only; each returns an owned
    // value or null.

    fn new_i8(&self, v: i8) -> *mut RawValue {
        unsafe { gbln_value_new_i8(v) }
    }

    fn new_i16(&self, v: i16) -> *mut RawValue {
        unsafe { gbln_value_new_i16(v) }
    }

    fn new_i32(&self, v: i32) -> *mut RawValue {
        unsafe { gbln_value_new_i32(v) }
    }

    fn new_i64(&self, v: i64) -> *mut RawValue {
        unsafe { gbln_value_new_i64(v) }
    }

    fn new_u8(&self, v: u8) -> *mut RawValue {
        unsafe { gbln_value_new_u8(v) }
    }

    fn new_u16(&self, v: u16) -> *mut RawValue {
        unsafe { gbln_value_new_u16(v) }
    }

    fn new_u32(&self, v: u32) -> *mut RawValue {
        unsafe { gbln_value_new_u32(v) }
    }

    fn new_u64(&self, v: u64) -> *mut RawValue {
        unsafe { gbln_value_new_u64(v) }
    }

    fn new_f32(&self, v: f32) -> *mut RawValue {
        unsafe { gbln_value_new_f32(v) }
    }

    fn new_f64(&self, v: f64) -> *mut RawValue {
        unsafe { gbln_value_new_f64(v) }
    }

    unsafe fn new_str(&self, v: *const c_char, max_len: usize) -> *mut RawValue {
        unsafe { gbln_value_new_str(v, max_len) }
    }

    fn new_bool(&self, v: bool) -> *mut RawValue {
        unsafe { gbln_value_new_bool(v) }
    }

    fn new_null(&self) -> *mut RawValue {
        unsafe { gbln_value_new_null() }
    }

    fn new_object(&self) -> *mut RawValue {
        unsafe { gbln_value_new_object() }
    }

    fn new_array(&self) -> *mut RawValue {
        unsafe { gbln_value_new_array() }
    }

    unsafe fn object_insert(
        &self,
        object: *mut RawValue,
        key: *const c_char,
        value: *mut RawValue,
    ) -> RawCode {
        unsafe { gbln_object_insert(object, key, value) }
    }

    unsafe fn array_push(&self, array: *mut RawValue, value: *mut RawValue) -> RawCode {
        unsafe { gbln_array_push(array, value) }
    }

    unsafe fn write_io(
        &self,
        value: *const RawValue,
        path: *const c_char,
        config: *const RawConfig,
    ) -> RawCode {
        unsafe { gbln_write_io(value, path, config) }
    }

    unsafe fn read_io(&self, path: *const c_char, out_value: *mut *mut RawValue) -> RawCode {
        unsafe { gbln_read_io(path, out_value) }
    }

    fn config_new(
        &self,
        mini_mode: bool,
        compress: bool,
        compression_level: u8,
        indent: usize,
        strip_comments: bool,
    ) -> *mut RawConfig {
        // SAFETY: scalar arguments only; returns an owned config or null.
        unsafe { gbln_config_new(mini_mode, compress, compression_level, indent, strip_comments) }
    }
}
