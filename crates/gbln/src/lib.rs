//! GBLN: typed value model and conversion layer for the GBLN data format.
//!
//! The GBLN grammar, serialiser and file format live in a native engine.
//! This crate gives Rust code a plain value tree to work with and converts
//! it to and from the engine's typed values without leaking or double
//! freeing anything on the way.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use gbln::{Config, Value};
//!
//! let value = gbln::parse("user{id<u32>(12345)name<s64>(Alice)active<b>(t)}")?;
//! assert_eq!(value["user"]["name"].as_str(), Some("Alice"));
//!
//! // Integers and strings get the narrowest engine type on the way out.
//! let text = gbln::to_string(&value)?;
//! assert_eq!(text, "user{active<b>(t)id<u16>(12345)name<s8>(Alice)}");
//!
//! gbln::write_io(&value, "user.io.gbln.xz", &Config::io_default())?;
//! assert_eq!(gbln::read_io("user.io.gbln.xz")?, value);
//! # Ok::<(), gbln::Error>(())
//! ```
//!
//! # Modules
//!
//! - [`model`]: The value tree and its builder
//! - [`codec`]: Parse, serialise, file I/O and the type selectors
//! - [`ffi`]: The engine surface and scoped ownership of engine resources
//! - [`config`]: I/O configuration
//! - [`error`]: Error types
//! - [`limits`]: Fixed limits of the format
//!
//! # Type mapping
//!
//! All eight engine integer types read as [`Value::Integer`] and both float
//! types as [`Value::Float`]. Writing picks the narrowest unsigned type for
//! non-negative integers, the narrowest signed type for negative ones, and
//! the smallest string capacity bucket (2 to 1024 characters).
//!
//! # Features
//!
//! - `libgbln`: link the native engine and expose the free functions
//!   [`parse`], [`to_string`], [`read_io`] and friends.

pub mod codec;
pub mod config;
pub mod error;
pub mod ffi;
pub mod limits;
pub mod model;

// Re-export commonly used types at crate root
pub use codec::{Format, Gbln};
pub use config::Config;
pub use error::{Error, ErrorCode, Result};
pub use ffi::{Engine, ValueType};
pub use model::{Array, Object, ObjectBuilder, Value};

#[cfg(feature = "libgbln")]
pub use codec::{parse, parse_file, read_io, to_string, to_string_pretty, write_io};
#[cfg(feature = "libgbln")]
pub use ffi::LibGbln;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
