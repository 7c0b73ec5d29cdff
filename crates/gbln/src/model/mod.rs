//! Data model types for GBLN.
//!
//! - Values (the seven-variant tree every engine value converts to)
//! - Builders (ergonomic object construction)

pub mod builder;
pub mod value;

pub use builder::ObjectBuilder;
pub use value::{Array, Object, Value};
