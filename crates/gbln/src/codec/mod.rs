//! Parsing, serialising and file I/O through a GBLN engine.
//!
//! [`Gbln`] wraps an [`Engine`] and exposes the model-level operations.
//! Every operation holds the engine's [`enter`](Engine::enter) guard from
//! the first engine call until the last-error state has been copied out.

pub mod convert;
mod io;
pub mod select;
mod text;

pub use convert::{create_optimal_int, create_optimal_string, from_foreign, to_foreign};
pub use select::{char_count, optimal_int_type, optimal_string_capacity, string_capacity};

use crate::error::{Error, ErrorCode, LastError, Result};
use crate::ffi::handle::take_last_error;
use crate::ffi::{Engine, RawCode};

/// Text layout for serialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Single line, no whitespace.
    #[default]
    Compact,
    /// Indented, one member per line.
    Pretty,
}

/// Model-level GBLN operations over an engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gbln<E> {
    engine: E,
}

impl<E: Engine> Gbln<E> {
    /// Creates a new instance over `engine`.
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Returns the underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Turns a raw result code into `Ok(())` or the error built by
    /// `on_failure` from the engine's last-error state.
    ///
    /// Must be called right after the engine call that produced `raw_code`.
    fn check(
        &self,
        raw_code: RawCode,
        on_failure: impl FnOnce(ErrorCode, LastError) -> Error,
    ) -> Result<()> {
        match ErrorCode::from_raw(raw_code) {
            Some(ErrorCode::Ok) => Ok(()),
            code => {
                let last = take_last_error(&self.engine);
                let code = code.unwrap_or_else(|| {
                    tracing::warn!(raw_code, "engine returned an unknown result code");
                    ErrorCode::InvalidSyntax
                });
                Err(on_failure(code, last))
            }
        }
    }
}

// =============================================================================
// LINKED ENGINE
// =============================================================================

#[cfg(feature = "libgbln")]
mod linked {
    use std::path::Path;

    use super::{Format, Gbln};
    use crate::config::Config;
    use crate::error::Result;
    use crate::ffi::LibGbln;
    use crate::model::Value;

    fn engine() -> Gbln<LibGbln> {
        Gbln::new(LibGbln)
    }

    /// Parses GBLN text with the linked engine.
    pub fn parse(input: &str) -> Result<Value> {
        engine().parse(input)
    }

    /// Reads and parses a GBLN source file.
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Value> {
        engine().parse_file(path)
    }

    /// Serialises `value` to compact GBLN text.
    pub fn to_string(value: &Value) -> Result<String> {
        engine().to_string(value, Format::Compact)
    }

    /// Serialises `value` to indented GBLN text.
    pub fn to_string_pretty(value: &Value) -> Result<String> {
        engine().to_string_pretty(value)
    }

    /// Reads a GBLN I/O file (optionally compressed).
    pub fn read_io(path: impl AsRef<Path>) -> Result<Value> {
        engine().read_io(path)
    }

    /// Writes `value` to a GBLN I/O file.
    pub fn write_io(value: &Value, path: impl AsRef<Path>, config: &Config) -> Result<()> {
        engine().write_io(value, path, config)
    }
}

#[cfg(feature = "libgbln")]
pub use linked::{parse, parse_file, read_io, to_string, to_string_pretty, write_io};
