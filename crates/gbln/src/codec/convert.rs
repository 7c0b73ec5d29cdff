//! Conversion between engine values and the [`Value`] model.
//!
//! Engine to model walks a borrowed engine tree and copies everything out.
//! Model to engine builds a fresh owned tree, choosing the narrowest type
//! for each integer and string. Every intermediate handle is scoped, so a
//! failure at any depth releases what was already acquired.

use std::ffi::{CStr, CString};

use crate::codec::select::{optimal_int_type, optimal_string_capacity};
use crate::error::{Error, ErrorCode, Result};
use crate::ffi::{
    Engine, HandleKind, KeyList, OwnedKeys, OwnedValue, RawCode, RawValue, ValueType,
};
use crate::model::{Array, Object, Value};

// =============================================================================
// ENGINE -> MODEL
// =============================================================================

/// Converts a borrowed engine value into a model value.
///
/// The engine value is not consumed. A null pointer, an unknown type tag,
/// a failed extraction or a missing child fails the whole conversion.
///
/// # Safety
///
/// `value` must be null or a live value owned by (or borrowed from)
/// `engine`, and must stay alive for the duration of the call.
pub unsafe fn from_foreign<E: Engine>(engine: &E, value: *const RawValue) -> Result<Value> {
    if value.is_null() {
        return Err(Error::conversion("null engine value"));
    }

    // SAFETY: caller guarantees `value` is live.
    let raw_tag = unsafe { engine.value_type(value) };
    let tag = ValueType::from_raw(raw_tag)
        .ok_or_else(|| Error::conversion(format!("unknown engine type tag {raw_tag}")))?;
    tracing::trace!(tag = tag.hint(), "engine value to model");

    // SAFETY (all accessor calls): `value` is live and of type `tag`.
    let converted = match tag {
        ValueType::I8 => Value::Integer(i64::from(extract(tag, |ok| unsafe {
            engine.as_i8(value, ok)
        })?)),
        ValueType::I16 => Value::Integer(i64::from(extract(tag, |ok| unsafe {
            engine.as_i16(value, ok)
        })?)),
        ValueType::I32 => Value::Integer(i64::from(extract(tag, |ok| unsafe {
            engine.as_i32(value, ok)
        })?)),
        ValueType::I64 => Value::Integer(extract(tag, |ok| unsafe { engine.as_i64(value, ok) })?),
        ValueType::U8 => Value::Integer(i64::from(extract(tag, |ok| unsafe {
            engine.as_u8(value, ok)
        })?)),
        ValueType::U16 => Value::Integer(i64::from(extract(tag, |ok| unsafe {
            engine.as_u16(value, ok)
        })?)),
        ValueType::U32 => Value::Integer(i64::from(extract(tag, |ok| unsafe {
            engine.as_u32(value, ok)
        })?)),
        ValueType::U64 => {
            let n = extract(tag, |ok| unsafe { engine.as_u64(value, ok) })?;
            let n = i64::try_from(n).map_err(|_| {
                Error::conversion(format!("u64 value {n} does not fit in the integer range"))
            })?;
            Value::Integer(n)
        }
        ValueType::F32 => Value::Float(f64::from(extract(tag, |ok| unsafe {
            engine.as_f32(value, ok)
        })?)),
        ValueType::F64 => Value::Float(extract(tag, |ok| unsafe { engine.as_f64(value, ok) })?),
        ValueType::Bool => Value::Bool(extract(tag, |ok| unsafe { engine.as_bool(value, ok) })?),
        ValueType::Null => Value::Null,
        ValueType::Str => {
            let ptr = extract(tag, |ok| unsafe { engine.as_string(value, ok) })?;
            if ptr.is_null() {
                return Err(Error::conversion("engine returned a null string"));
            }
            // SAFETY: borrowed from `value`, copied before anything else runs.
            let s = unsafe { CStr::from_ptr(ptr) };
            let s = s
                .to_str()
                .map_err(|_| Error::conversion("engine string is not valid UTF-8"))?;
            Value::String(s.to_owned())
        }
        ValueType::Object => Value::Object(unsafe { object_from_foreign(engine, value) }?),
        ValueType::Array => Value::Array(unsafe { array_from_foreign(engine, value) }?),
    };
    Ok(converted)
}

/// Runs one typed accessor and checks its `ok` flag.
fn extract<T>(tag: ValueType, read: impl FnOnce(&mut bool) -> T) -> Result<T> {
    let mut ok = false;
    let v = read(&mut ok);
    if ok {
        Ok(v)
    } else {
        Err(Error::conversion(format!(
            "failed to extract {} value",
            tag.hint()
        )))
    }
}

unsafe fn object_from_foreign<E: Engine>(engine: &E, value: *const RawValue) -> Result<Object> {
    let mut count = 0usize;
    // SAFETY: `value` is a live object.
    let keys = unsafe { engine.object_keys(value, &mut count) };
    if keys.is_null() {
        if count != 0 {
            return Err(Error::conversion(format!(
                "engine returned no key list for {count} keys"
            )));
        }
        return Ok(Object::new());
    }
    // SAFETY: the key list is owned by us and released with its count.
    let keys = unsafe { OwnedKeys::from_raw(engine, KeyList { keys, count }) }?;

    let mut object = Object::new();
    for index in 0..keys.len() {
        let key = keys
            .get(index)
            .ok_or_else(|| Error::conversion(format!("null key at index {index}")))?;
        // SAFETY: `key` is NUL-terminated and `value` is live.
        let child = unsafe { engine.object_get(value, key.as_ptr()) };
        if child.is_null() {
            return Err(Error::conversion(format!("missing value for key {key:?}")));
        }
        let name = key
            .to_str()
            .map_err(|_| Error::conversion(format!("key {key:?} is not valid UTF-8")))?;
        // SAFETY: `child` is borrowed from the live `value`.
        let converted = unsafe { from_foreign(engine, child) }?;
        object.insert(name.to_owned(), converted);
    }
    Ok(object)
}

unsafe fn array_from_foreign<E: Engine>(engine: &E, value: *const RawValue) -> Result<Array> {
    // SAFETY: `value` is a live array.
    let len = unsafe { engine.array_len(value) };
    let mut items = Array::with_capacity(len);
    for index in 0..len {
        // SAFETY: index < len and `value` is live.
        let child = unsafe { engine.array_get(value, index) };
        if child.is_null() {
            return Err(Error::conversion(format!("missing array element {index}")));
        }
        items.push(unsafe { from_foreign(engine, child) }?);
    }
    Ok(items)
}

impl<E: Engine> OwnedValue<'_, E> {
    /// Converts the owned engine value into a model value.
    pub fn to_value(&self) -> Result<Value> {
        if !self.is_owned() {
            return Err(Error::InvalidHandle {
                kind: HandleKind::Value,
            });
        }
        // SAFETY: the handle owns a live value from its engine.
        unsafe { from_foreign(self.engine(), self.as_raw()) }
    }
}

// =============================================================================
// MODEL -> ENGINE
// =============================================================================

/// Builds an owned engine value from a model value.
///
/// On error, every engine value created so far has been released.
pub fn to_foreign<'e, E: Engine>(engine: &'e E, value: &Value) -> Result<OwnedValue<'e, E>> {
    tracing::trace!(kind = value.type_name(), "model value to engine");
    match value {
        Value::Null => adopt(engine, engine.new_null(), "null"),
        Value::Bool(b) => adopt(engine, engine.new_bool(*b), "bool"),
        Value::Integer(n) => create_optimal_int(engine, *n),
        Value::Float(f) => adopt(engine, engine.new_f64(*f), "f64"),
        Value::String(s) => create_optimal_string(engine, s),
        Value::Object(entries) => object_to_foreign(engine, entries),
        Value::Array(items) => array_to_foreign(engine, items),
    }
}

/// Creates an engine integer of the narrowest type that holds `n`.
pub fn create_optimal_int<'e, E: Engine>(engine: &'e E, n: i64) -> Result<OwnedValue<'e, E>> {
    let ty = optimal_int_type(n);
    // `ty` holds `n`, so none of these casts truncate.
    let raw = match ty {
        ValueType::U8 => engine.new_u8(n as u8),
        ValueType::U16 => engine.new_u16(n as u16),
        ValueType::U32 => engine.new_u32(n as u32),
        ValueType::U64 => engine.new_u64(n as u64),
        ValueType::I8 => engine.new_i8(n as i8),
        ValueType::I16 => engine.new_i16(n as i16),
        ValueType::I32 => engine.new_i32(n as i32),
        _ => engine.new_i64(n),
    };
    adopt(engine, raw, ty.hint())
}

/// Creates an engine string in the smallest capacity bucket that holds `s`.
pub fn create_optimal_string<'e, E: Engine>(
    engine: &'e E,
    s: &str,
) -> Result<OwnedValue<'e, E>> {
    let capacity = optimal_string_capacity(s)?;
    let c_string = CString::new(s)
        .map_err(|e| Error::conversion(format!("string has a NUL byte at {}", e.nul_position())))?;
    // SAFETY: `c_string` is NUL-terminated and outlives the call.
    let raw = unsafe { engine.new_str(c_string.as_ptr(), capacity) };
    adopt(engine, raw, "string")
}

fn object_to_foreign<'e, E: Engine>(engine: &'e E, entries: &Object) -> Result<OwnedValue<'e, E>> {
    let mut object = adopt(engine, engine.new_object(), "object")?;
    for (key, child) in entries {
        let c_key = CString::new(key.as_str())
            .map_err(|_| Error::conversion(format!("key {key:?} has a NUL byte")))?;
        let child = to_foreign(engine, child)?;
        object.insert(&c_key, child).map_err(|rejected| {
            Error::conversion(format!(
                "engine rejected key {key:?}: {}",
                code_name(rejected.raw_code)
            ))
        })?;
    }
    Ok(object)
}

fn array_to_foreign<'e, E: Engine>(engine: &'e E, items: &Array) -> Result<OwnedValue<'e, E>> {
    let mut array = adopt(engine, engine.new_array(), "array")?;
    for (index, item) in items.iter().enumerate() {
        let child = to_foreign(engine, item)?;
        array.push(child).map_err(|rejected| {
            Error::conversion(format!(
                "engine rejected array element {index}: {}",
                code_name(rejected.raw_code)
            ))
        })?;
    }
    Ok(array)
}

/// Takes ownership of a freshly created engine value.
fn adopt<'e, E: Engine>(
    engine: &'e E,
    raw: *mut RawValue,
    what: &str,
) -> Result<OwnedValue<'e, E>> {
    // SAFETY: `raw` was just created by `engine` and nothing else owns it.
    unsafe { OwnedValue::from_raw(engine, raw) }
        .map_err(|_| Error::conversion(format!("engine failed to create {what} value")))
}

fn code_name(raw: RawCode) -> String {
    match ErrorCode::from_raw(raw) {
        Some(code) => code.to_string(),
        None => format!("unknown code {raw}"),
    }
}
