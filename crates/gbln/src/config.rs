//! Configuration for GBLN I/O.

use crate::error::{Error, Result};
use crate::limits::{DEFAULT_COMPRESSION_LEVEL, DEFAULT_INDENT, MAX_COMPRESSION_LEVEL, MAX_INDENT};

/// Options passed to the engine when writing an I/O file.
///
/// The default is [`Config::io_default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Use the MINI format (no whitespace).
    pub mini_mode: bool,
    /// Enable XZ compression.
    pub compress: bool,
    /// XZ compression level, 0 (fastest) to 9 (smallest).
    pub compression_level: u8,
    /// Indentation width for the pretty format. Ignored in MINI mode.
    pub indent: usize,
    /// Remove comments when writing.
    pub strip_comments: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::io_default()
    }
}

impl Config {
    /// Configuration for the I/O format: MINI and compressed.
    pub fn io_default() -> Self {
        Self {
            mini_mode: true,
            compress: true,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            indent: DEFAULT_INDENT,
            strip_comments: true,
        }
    }

    /// Configuration for the source format: pretty and uncompressed.
    pub fn source_default() -> Self {
        Self {
            mini_mode: false,
            compress: false,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            indent: DEFAULT_INDENT,
            strip_comments: false,
        }
    }

    /// Sets whether the MINI layout is written.
    pub fn with_mini_mode(mut self, mini_mode: bool) -> Self {
        self.mini_mode = mini_mode;
        self
    }

    /// Sets whether the output is XZ-compressed.
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Sets the XZ level (0-9, checked by `validate`).
    pub fn with_compression_level(mut self, level: u8) -> Self {
        self.compression_level = level;
        self
    }

    /// Sets the pretty-print indent width (0-16, checked by `validate`).
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Sets whether comments are dropped on write.
    pub fn with_strip_comments(mut self, strip_comments: bool) -> Self {
        self.strip_comments = strip_comments;
        self
    }

    /// Checks the numeric ranges.
    ///
    /// Must pass before the configuration is handed to the engine.
    pub fn validate(&self) -> Result<()> {
        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(Error::Configuration {
                field: "compression_level",
                value: u64::from(self.compression_level),
                min: 0,
                max: u64::from(MAX_COMPRESSION_LEVEL),
            });
        }
        if self.indent > MAX_INDENT {
            return Err(Error::Configuration {
                field: "indent",
                value: self.indent as u64,
                min: 0,
                max: MAX_INDENT as u64,
            });
        }
        Ok(())
    }
}
