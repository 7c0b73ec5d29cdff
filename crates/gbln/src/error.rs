//! Error types for GBLN parsing, conversion and I/O.

use std::path::PathBuf;

use thiserror::Error;

use crate::ffi::HandleKind;

/// Result codes reported by the engine.
///
/// The discriminants are the engine's raw codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    UnexpectedChar = 1,
    UnterminatedString = 2,
    UnexpectedToken = 3,
    UnexpectedEof = 4,
    InvalidSyntax = 5,
    IntOutOfRange = 6,
    StringTooLong = 7,
    TypeMismatch = 8,
    InvalidTypeHint = 9,
    DuplicateKey = 10,
    NullPointer = 11,
    Io = 12,
}

impl ErrorCode {
    /// Creates an ErrorCode from the engine's raw code.
    pub fn from_raw(v: i32) -> Option<ErrorCode> {
        match v {
            0 => Some(ErrorCode::Ok),
            1 => Some(ErrorCode::UnexpectedChar),
            2 => Some(ErrorCode::UnterminatedString),
            3 => Some(ErrorCode::UnexpectedToken),
            4 => Some(ErrorCode::UnexpectedEof),
            5 => Some(ErrorCode::InvalidSyntax),
            6 => Some(ErrorCode::IntOutOfRange),
            7 => Some(ErrorCode::StringTooLong),
            8 => Some(ErrorCode::TypeMismatch),
            9 => Some(ErrorCode::InvalidTypeHint),
            10 => Some(ErrorCode::DuplicateKey),
            11 => Some(ErrorCode::NullPointer),
            12 => Some(ErrorCode::Io),
            _ => None,
        }
    }

    /// Returns the raw code passed across the engine boundary.
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    /// Returns a short snake_case name for the code (e.g., "duplicate_key").
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Ok => "ok",
            ErrorCode::UnexpectedChar => "unexpected_char",
            ErrorCode::UnterminatedString => "unterminated_string",
            ErrorCode::UnexpectedToken => "unexpected_token",
            ErrorCode::UnexpectedEof => "unexpected_eof",
            ErrorCode::InvalidSyntax => "invalid_syntax",
            ErrorCode::IntOutOfRange => "int_out_of_range",
            ErrorCode::StringTooLong => "string_too_long",
            ErrorCode::TypeMismatch => "type_mismatch",
            ErrorCode::InvalidTypeHint => "invalid_type_hint",
            ErrorCode::DuplicateKey => "duplicate_key",
            ErrorCode::NullPointer => "null_pointer",
            ErrorCode::Io => "io",
        }
    }

    /// Returns true for the I/O failure code.
    pub fn is_io(&self) -> bool {
        matches!(self, ErrorCode::Io)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by parsing, conversion, serialisation and I/O.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("parse error ({code}): {message}")]
    Parse {
        code: ErrorCode,
        message: String,
        suggestion: Option<String>,
    },

    #[error("conversion error: {context}")]
    Conversion { context: String },

    #[error("invalid UTF-8 lead byte 0x{byte:02x} at offset {offset}")]
    InvalidEncoding { offset: usize, byte: u8 },

    #[error("string too long ({chars} characters, max {max})")]
    StringTooLong { chars: usize, max: usize },

    #[error("cannot take ownership of a null {kind} handle")]
    InvalidHandle { kind: HandleKind },

    #[error("configuration error: {field} must be {min}-{max}, got {value}")]
    Configuration {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("I/O error: {}", describe_io(.path, .message))]
    Io {
        path: Option<PathBuf>,
        message: String,
    },
}

fn describe_io(path: &Option<PathBuf>, message: &str) -> String {
    match path {
        Some(path) => format!("{}: {message}", path.display()),
        None => message.to_string(),
    }
}

impl Error {
    /// Shorthand for a [`Error::Conversion`] with the given context.
    pub fn conversion(context: impl Into<String>) -> Self {
        Error::Conversion {
            context: context.into(),
        }
    }

    /// Returns the engine result code behind this error, if there is one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::Parse { code, .. } => Some(*code),
            Error::Io { .. } => Some(ErrorCode::Io),
            Error::StringTooLong { .. } => Some(ErrorCode::StringTooLong),
            _ => None,
        }
    }

    /// Returns the engine's suggestion for fixing a parse error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Error::Parse { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Last-error details copied out of the engine.
///
/// Both fields are owned copies. The engine may overwrite its own state on
/// the next call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastError {
    pub message: Option<String>,
    pub suggestion: Option<String>,
}

impl LastError {
    /// Builds a parse error for `code`, falling back to `fallback` when the
    /// engine left no message.
    pub fn into_parse_error(self, code: ErrorCode, fallback: &str) -> Error {
        if code.is_io() {
            return Error::Io {
                path: None,
                message: self.message_or(fallback),
            };
        }
        Error::Parse {
            code,
            message: self.message_or(fallback),
            suggestion: self.suggestion,
        }
    }

    /// Builds an I/O error for `path`.
    pub fn into_io_error(self, path: impl Into<PathBuf>, fallback: &str) -> Error {
        Error::Io {
            path: Some(path.into()),
            message: self.message_or(fallback),
        }
    }

    fn message_or(&self, fallback: &str) -> String {
        match &self.message {
            Some(msg) => msg.clone(),
            None => {
                tracing::warn!(fallback, "engine reported failure without a last-error message");
                fallback.to_string()
            }
        }
    }
}
