//! GBLN text: parse and serialise.

use std::ffi::CString;

use super::convert::to_foreign;
use super::{Format, Gbln};
use crate::error::{Error, ErrorCode, Result};
use crate::ffi::{Engine, OwnedString, OwnedValue};
use crate::model::Value;

impl<E: Engine> Gbln<E> {
    /// Parses GBLN text into a value.
    pub fn parse(&self, input: &str) -> Result<Value> {
        tracing::debug!(len = input.len(), "parsing GBLN text");
        let input = CString::new(input).map_err(|e| {
            Error::conversion(format!("input has a NUL byte at {}", e.nul_position()))
        })?;

        let _guard = self.engine.enter();
        let mut out = std::ptr::null_mut();
        // SAFETY: `input` is NUL-terminated and `out` is a valid out-pointer.
        let raw_code = unsafe { self.engine.parse(input.as_ptr(), &mut out) };
        self.check(raw_code, |code, last| {
            last.into_parse_error(code, "parse failed")
        })?;

        if out.is_null() {
            return Err(Error::Parse {
                code: ErrorCode::NullPointer,
                message: "parse returned a null value".to_string(),
                suggestion: None,
            });
        }
        // SAFETY: a successful parse hands the root to the caller.
        let root = unsafe { OwnedValue::from_raw(&self.engine, out) }?;
        root.to_value()
    }

    /// Serialises a value to GBLN text.
    pub fn to_string(&self, value: &Value, format: Format) -> Result<String> {
        tracing::debug!(?format, nodes = value.node_count(), "serialising value");
        let _guard = self.engine.enter();
        let foreign = to_foreign(&self.engine, value)?;

        // SAFETY: `foreign` owns a live value from this engine.
        let raw = unsafe {
            match format {
                Format::Compact => self.engine.to_string(foreign.as_raw()),
                Format::Pretty => self.engine.to_string_pretty(foreign.as_raw()),
            }
        };
        // SAFETY: serialisation hands an owned string to the caller.
        let text = unsafe { OwnedString::from_raw(&self.engine, raw) }
            .map_err(|_| Error::conversion("engine failed to serialise value"))?;
        text.copy_to_string()
    }

    /// Serialises a value to indented GBLN text.
    pub fn to_string_pretty(&self, value: &Value) -> Result<String> {
        self.to_string(value, Format::Pretty)
    }
}
