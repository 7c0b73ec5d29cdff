//! Builder API for ergonomic object construction.
//!
//! # Example
//!
//! ```rust
//! use gbln::model::builder::ObjectBuilder;
//!
//! let doc = ObjectBuilder::new()
//!     .object("user", |u| u
//!         .int("id", 12345)
//!         .string("name", "Alice")
//!         .int("age", 25)
//!         .bool("active", true)
//!     )
//!     .build();
//!
//! assert_eq!(doc["user"]["name"].as_str(), Some("Alice"));
//! ```

use crate::model::{Array, Object, Value};

/// Builder for an object value.
#[derive(Debug, Clone, Default)]
pub struct ObjectBuilder {
    entries: Object,
}

impl ObjectBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to any value. A later call with the same key replaces it.
    pub fn value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn null(self, key: impl Into<String>) -> Self {
        self.value(key, Value::Null)
    }

    pub fn bool(self, key: impl Into<String>, value: bool) -> Self {
        self.value(key, Value::Bool(value))
    }

    pub fn int(self, key: impl Into<String>, value: i64) -> Self {
        self.value(key, Value::Integer(value))
    }

    pub fn float(self, key: impl Into<String>, value: f64) -> Self {
        self.value(key, Value::Float(value))
    }

    pub fn string(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.value(key, Value::String(value.into()))
    }

    /// Adds a nested object built by `f`.
    pub fn object<F>(self, key: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(ObjectBuilder) -> ObjectBuilder,
    {
        let nested = f(ObjectBuilder::new()).build();
        self.value(key, nested)
    }

    /// Adds an array of values.
    pub fn array<I, V>(self, key: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items: Array = items.into_iter().map(Into::into).collect();
        self.value(key, Value::Array(items))
    }

    /// Returns the number of entries so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries have been added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds the object value.
    pub fn build(self) -> Value {
        Value::Object(self.entries)
    }
}
