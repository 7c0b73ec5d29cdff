//! Scoped ownership of engine resources.
//!
//! A [`Scoped`] handle owns exactly one engine resource and releases it
//! exactly once: on drop, on an explicit [`Scoped::release`], or never
//! (from this side) after ownership is handed out with [`Scoped::into_raw`].
//! Handles cannot be cloned, only moved.

use std::ffi::{c_char, CStr};
use std::fmt;
use std::marker::PhantomData;

use crate::error::{Error, ErrorCode, LastError, Result};
use crate::ffi::{Engine, RawCode, RawConfig, RawValue};

/// The four kinds of engine resource this crate takes ownership of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Value,
    Config,
    String,
    KeyList,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandleKind::Value => "value",
            HandleKind::Config => "config",
            HandleKind::String => "string",
            HandleKind::KeyList => "key-list",
        })
    }
}

/// A kind of engine resource and the way it is released.
pub trait Resource {
    const KIND: HandleKind;

    /// Raw representation handed out by the engine.
    type Raw: Copy;

    fn null() -> Self::Raw;

    fn is_null(raw: &Self::Raw) -> bool;

    /// Returns the resource to the engine.
    ///
    /// # Safety
    ///
    /// `raw` must be a live, owned resource obtained from `engine` and must
    /// not be used afterwards.
    unsafe fn release<E: Engine>(engine: &E, raw: Self::Raw);
}

/// Owned key array from `object_keys`, released together with its count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyList {
    pub keys: *mut *mut c_char,
    pub count: usize,
}

#[derive(Debug)]
pub enum ValueResource {}
#[derive(Debug)]
pub enum StringResource {}
#[derive(Debug)]
pub enum ConfigResource {}
#[derive(Debug)]
pub enum KeysResource {}

impl Resource for ValueResource {
    const KIND: HandleKind = HandleKind::Value;
    type Raw = *mut RawValue;

    fn null() -> Self::Raw {
        std::ptr::null_mut()
    }

    fn is_null(raw: &Self::Raw) -> bool {
        raw.is_null()
    }

    unsafe fn release<E: Engine>(engine: &E, raw: Self::Raw) {
        unsafe { engine.value_free(raw) }
    }
}

impl Resource for StringResource {
    const KIND: HandleKind = HandleKind::String;
    type Raw = *mut c_char;

    fn null() -> Self::Raw {
        std::ptr::null_mut()
    }

    fn is_null(raw: &Self::Raw) -> bool {
        raw.is_null()
    }

    unsafe fn release<E: Engine>(engine: &E, raw: Self::Raw) {
        unsafe { engine.string_free(raw) }
    }
}

impl Resource for ConfigResource {
    const KIND: HandleKind = HandleKind::Config;
    type Raw = *mut RawConfig;

    fn null() -> Self::Raw {
        std::ptr::null_mut()
    }

    fn is_null(raw: &Self::Raw) -> bool {
        raw.is_null()
    }

    unsafe fn release<E: Engine>(engine: &E, raw: Self::Raw) {
        unsafe { engine.config_free(raw) }
    }
}

impl Resource for KeysResource {
    const KIND: HandleKind = HandleKind::KeyList;
    type Raw = KeyList;

    fn null() -> Self::Raw {
        KeyList {
            keys: std::ptr::null_mut(),
            count: 0,
        }
    }

    fn is_null(raw: &Self::Raw) -> bool {
        raw.keys.is_null()
    }

    unsafe fn release<E: Engine>(engine: &E, raw: Self::Raw) {
        unsafe { engine.keys_free(raw.keys, raw.count) }
    }
}

/// Scoped ownership of one engine resource.
pub struct Scoped<'e, E: Engine, R: Resource> {
    engine: &'e E,
    raw: Option<R::Raw>,
    _kind: PhantomData<R>,
}

pub type OwnedValue<'e, E> = Scoped<'e, E, ValueResource>;
pub type OwnedString<'e, E> = Scoped<'e, E, StringResource>;
pub type OwnedConfig<'e, E> = Scoped<'e, E, ConfigResource>;
pub type OwnedKeys<'e, E> = Scoped<'e, E, KeysResource>;

impl<'e, E: Engine, R: Resource> Scoped<'e, E, R> {
    /// Takes ownership of `raw`.
    ///
    /// Fails with [`Error::InvalidHandle`] if `raw` is null.
    ///
    /// # Safety
    ///
    /// `raw` must be an owned resource of kind `R` obtained from `engine`
    /// that nothing else will release.
    pub unsafe fn from_raw(engine: &'e E, raw: R::Raw) -> Result<Self> {
        if R::is_null(&raw) {
            return Err(Error::InvalidHandle { kind: R::KIND });
        }
        Ok(Self {
            engine,
            raw: Some(raw),
            _kind: PhantomData,
        })
    }

    /// Returns the raw resource without giving up ownership.
    ///
    /// Returns the kind's null value once released.
    pub fn as_raw(&self) -> R::Raw {
        self.raw.unwrap_or_else(R::null)
    }

    /// Returns true while this handle still owns its resource.
    pub fn is_owned(&self) -> bool {
        self.raw.is_some()
    }

    /// Returns the engine this handle belongs to.
    pub fn engine(&self) -> &'e E {
        self.engine
    }

    /// Releases the resource now. Calling it again is a no-op.
    pub fn release(&mut self) {
        if let Some(raw) = self.raw.take() {
            // SAFETY: `from_raw` established ownership, and `take` ensures
            // this runs once.
            unsafe { R::release(self.engine, raw) }
        }
    }

    /// Transfers ownership out. The caller becomes responsible for the
    /// release.
    pub fn into_raw(mut self) -> R::Raw {
        self.raw.take().unwrap_or_else(R::null)
    }
}

impl<E: Engine, R: Resource> Drop for Scoped<'_, E, R> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<E: Engine, R: Resource> fmt::Debug for Scoped<'_, E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoped")
            .field("kind", &R::KIND)
            .field("owned", &self.raw.is_some())
            .finish()
    }
}

// =============================================================================
// VALUE HANDLES
// =============================================================================

/// A child rejected by `insert` or `push`.
///
/// The engine did not take ownership. The child comes back to the caller,
/// and dropping it releases it.
pub struct Rejected<'e, E: Engine> {
    pub raw_code: RawCode,
    pub child: OwnedValue<'e, E>,
}

impl<'e, E: Engine> Rejected<'e, E> {
    /// Returns the engine's result code, if it is a known one.
    pub fn code(&self) -> Option<ErrorCode> {
        ErrorCode::from_raw(self.raw_code)
    }

    /// Returns the rejected child.
    pub fn into_child(self) -> OwnedValue<'e, E> {
        self.child
    }
}

impl<E: Engine> fmt::Debug for Rejected<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("code", &self.code())
            .field("raw_code", &self.raw_code)
            .finish()
    }
}

impl<'e, E: Engine> OwnedValue<'e, E> {
    /// Inserts `child` under `key`, transferring ownership on success only.
    ///
    /// A child from another engine is rejected with `NullPointer` without
    /// reaching either engine.
    pub fn insert(
        &mut self,
        key: &CStr,
        child: OwnedValue<'e, E>,
    ) -> std::result::Result<(), Rejected<'e, E>> {
        let child = self.same_engine(child)?;
        // SAFETY: both pointers are owned by live handles from this engine.
        let raw_code = unsafe {
            self.engine
                .object_insert(self.as_raw(), key.as_ptr(), child.as_raw())
        };
        Self::settle(raw_code, child)
    }

    /// Appends `child`, transferring ownership on success only.
    pub fn push(&mut self, child: OwnedValue<'e, E>) -> std::result::Result<(), Rejected<'e, E>> {
        let child = self.same_engine(child)?;
        // SAFETY: both pointers are owned by live handles from this engine.
        let raw_code = unsafe { self.engine.array_push(self.as_raw(), child.as_raw()) };
        Self::settle(raw_code, child)
    }

    fn same_engine(
        &self,
        child: OwnedValue<'e, E>,
    ) -> std::result::Result<OwnedValue<'e, E>, Rejected<'e, E>> {
        if std::ptr::eq(self.engine, child.engine) {
            Ok(child)
        } else {
            tracing::warn!("refusing to attach a value owned by another engine");
            Err(Rejected {
                raw_code: ErrorCode::NullPointer.as_raw(),
                child,
            })
        }
    }

    fn settle(
        raw_code: RawCode,
        child: OwnedValue<'e, E>,
    ) -> std::result::Result<(), Rejected<'e, E>> {
        if ErrorCode::from_raw(raw_code) == Some(ErrorCode::Ok) {
            // The container owns the child now.
            child.into_raw();
            Ok(())
        } else {
            Err(Rejected { raw_code, child })
        }
    }
}

// =============================================================================
// STRING HANDLES
// =============================================================================

impl<E: Engine> OwnedString<'_, E> {
    /// Returns the string as a borrowed C string.
    pub fn as_c_str(&self) -> Option<&CStr> {
        let raw = self.raw?;
        // SAFETY: owned, non-null, NUL-terminated engine string.
        Some(unsafe { CStr::from_ptr(raw) })
    }

    /// Copies the contents into an owned `String`, failing on invalid UTF-8.
    pub fn copy_to_string(&self) -> Result<String> {
        let s = self
            .as_c_str()
            .ok_or_else(|| Error::conversion("engine string already released"))?;
        s.to_str()
            .map(str::to_owned)
            .map_err(|_| Error::conversion("engine string is not valid UTF-8"))
    }

    /// Copies the contents into an owned `String`, replacing invalid UTF-8.
    pub fn copy_to_string_lossy(&self) -> String {
        self.as_c_str()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

// =============================================================================
// KEY LISTS
// =============================================================================

impl<E: Engine> OwnedKeys<'_, E> {
    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.raw.map(|raw| raw.count).unwrap_or(0)
    }

    /// Returns true if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the key at `index`, or `None` if out of range or null.
    pub fn get(&self, index: usize) -> Option<&CStr> {
        let raw = self.raw?;
        if index >= raw.count {
            return None;
        }
        // SAFETY: the engine hands out `count` key pointers; index is in range.
        let key = unsafe { *raw.keys.add(index) };
        if key.is_null() {
            return None;
        }
        // SAFETY: non-null NUL-terminated key owned by this list.
        Some(unsafe { CStr::from_ptr(key) })
    }
}

/// Copies the engine's last error message and suggestion.
///
/// Call this immediately after the failing engine call, before any other
/// engine call can overwrite the shared error state.
pub fn take_last_error<E: Engine>(engine: &E) -> LastError {
    // SAFETY: the engine hands out owned strings (or null) from these calls.
    let message = unsafe { OwnedString::from_raw(engine, engine.last_error_message()) }.ok();
    let suggestion = unsafe { OwnedString::from_raw(engine, engine.last_error_suggestion()) }.ok();
    LastError {
        message: message.map(|s| s.copy_to_string_lossy()),
        suggestion: suggestion.map(|s| s.copy_to_string_lossy()),
    }
}
