//! GBLN files: source files and I/O files.
//!
//! Source files are plain text and are read on this side. I/O files are
//! read and written by the engine, which owns the MINI layout and the XZ
//! compression.

use std::ffi::CString;
use std::path::Path;

use super::convert::to_foreign;
use super::Gbln;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ffi::{Engine, OwnedConfig, OwnedValue};
use crate::model::Value;

impl<E: Engine> Gbln<E> {
    /// Reads a GBLN source file and parses it.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "reading GBLN source file");
        let text = std::fs::read_to_string(path).map_err(|e| Error::Io {
            path: Some(path.to_path_buf()),
            message: e.to_string(),
        })?;
        self.parse(&text)
    }

    /// Reads a GBLN I/O file.
    pub fn read_io(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "reading GBLN I/O file");
        let c_path = path_to_c_string(path)?;

        let _guard = self.engine.enter();
        let mut out = std::ptr::null_mut();
        // SAFETY: `c_path` is NUL-terminated and `out` is a valid out-pointer.
        let raw_code = unsafe { self.engine.read_io(c_path.as_ptr(), &mut out) };
        self.check(raw_code, |_, last| last.into_io_error(path, "I/O read failed"))?;

        if out.is_null() {
            return Err(Error::Io {
                path: Some(path.to_path_buf()),
                message: "read returned a null value".to_string(),
            });
        }
        // SAFETY: a successful read hands the root to the caller.
        let root = unsafe { OwnedValue::from_raw(&self.engine, out) }?;
        root.to_value()
    }

    /// Writes a value to a GBLN I/O file.
    ///
    /// The configuration is validated before anything reaches the engine.
    pub fn write_io(&self, value: &Value, path: impl AsRef<Path>, config: &Config) -> Result<()> {
        let path = path.as_ref();
        config.validate()?;
        tracing::debug!(
            path = %path.display(),
            mini = config.mini_mode,
            compress = config.compress,
            level = config.compression_level,
            "writing GBLN I/O file"
        );
        let c_path = path_to_c_string(path)?;

        let _guard = self.engine.enter();
        let foreign = to_foreign(&self.engine, value)?;
        let raw_config = self.engine.config_new(
            config.mini_mode,
            config.compress,
            config.compression_level,
            config.indent,
            config.strip_comments,
        );
        // SAFETY: `config_new` hands an owned config to the caller.
        let engine_config = unsafe { OwnedConfig::from_raw(&self.engine, raw_config) }
            .map_err(|_| Error::conversion("engine failed to create config"))?;

        // SAFETY: all three arguments are live and owned by this call.
        let raw_code = unsafe {
            self.engine
                .write_io(foreign.as_raw(), c_path.as_ptr(), engine_config.as_raw())
        };
        self.check(raw_code, |_, last| last.into_io_error(path, "I/O write failed"))
    }
}

fn path_to_c_string(path: &Path) -> Result<CString> {
    let io_error = |message: &str| Error::Io {
        path: Some(path.to_path_buf()),
        message: message.to_string(),
    };
    let s = path.to_str().ok_or_else(|| io_error("path is not valid UTF-8"))?;
    CString::new(s).map_err(|_| io_error("path contains a NUL byte"))
}
