//! Typed records on top of the dynamic decoder.
//!
//! A Rust struct opts in by implementing [`SoftBoiled`]: it names its shape,
//! lists its fields, and says how to build itself from a decoded [`Record`].
//! Decoding stays lenient, so struct fields are [`Maybe`] values: a field
//! can be absent, present with the expected kind, or present with some
//! other JSON value that is kept as-is.
//!
//! ```
//! use serde_json::json;
//! use softboiled::{Maybe, Record, ShapeBuilder, SoftBoiled, TypeRef};
//!
//! #[derive(Debug, PartialEq)]
//! struct Team {
//!     id: Maybe<String>,
//!     name: Maybe<String>,
//! }
//!
//! impl SoftBoiled for Team {
//!     const NAME: &'static str = "DocTeam";
//!
//!     fn fields(shape: ShapeBuilder) -> ShapeBuilder {
//!         shape.field("id", TypeRef::STR).field("name", TypeRef::STR)
//!     }
//!
//!     fn from_record(mut record: Record) -> Self {
//!         Team { id: record.take_value("id"), name: record.take_value("name") }
//!     }
//! }
//!
//! let raw = json!({"id": "P1", "summary": "ignored"});
//! let team = Team::decode_from(raw.as_object().unwrap());
//! assert_eq!(team.id, Maybe::Present("P1".to_string()));
//! assert!(team.name.is_absent());
//! ```
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::decode::Decoder;
use crate::diagnostics::DiagnosticSink;
use crate::record::{Record, Slot};
use crate::registry::Registry;
use crate::shape::{DeclarationError, Shape, ShapeBuilder};

// ————————————————————————————————————————————————————————————————————————————
// MAYBE
// ————————————————————————————————————————————————————————————————————————————

/// Typed view of one decoded field.
#[derive(Debug, Clone, PartialEq)]
pub enum Maybe<T> {
    /// Not supplied, no default.
    Absent,
    Present(T),
    /// Supplied, but not convertible to `T`; kept unvalidated.
    Opaque(Value),
}

impl<T> Default for Maybe<T> {
    fn default() -> Self {
        Maybe::Absent
    }
}

impl<T> Maybe<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Maybe::Absent)
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Maybe::Present(_))
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, Maybe::Opaque(_))
    }

    pub fn present(&self) -> Option<&T> {
        match self {
            Maybe::Present(v) => Some(v),
            _ => None,
        }
    }

    /// The raw value kept when the field had the wrong kind.
    pub fn opaque(&self) -> Option<&Value> {
        match self {
            Maybe::Opaque(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Maybe::Present(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Maybe<U> {
        match self {
            Maybe::Absent => Maybe::Absent,
            Maybe::Present(v) => Maybe::Present(f(v)),
            Maybe::Opaque(v) => Maybe::Opaque(v),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONVERSIONS
// ————————————————————————————————————————————————————————————————————————————

/// Leaf conversion from a raw JSON value. On mismatch the value is handed
/// back untouched.
///
/// `accepts` must agree with `from_json`: it returns `true` exactly when
/// `from_json` would succeed.
pub trait FromJson: Sized {
    fn accepts(value: &Value) -> bool;

    fn from_json(value: Value) -> Result<Self, Value>;
}

impl FromJson for Value {
    fn accepts(_: &Value) -> bool {
        true
    }

    fn from_json(value: Value) -> Result<Self, Value> {
        Ok(value)
    }
}

impl FromJson for String {
    fn accepts(value: &Value) -> bool {
        value.is_string()
    }

    fn from_json(value: Value) -> Result<Self, Value> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(other),
        }
    }
}

impl FromJson for bool {
    fn accepts(value: &Value) -> bool {
        value.is_boolean()
    }

    fn from_json(value: Value) -> Result<Self, Value> {
        value.as_bool().ok_or(value)
    }
}

impl FromJson for i64 {
    fn accepts(value: &Value) -> bool {
        value.is_i64()
    }

    fn from_json(value: Value) -> Result<Self, Value> {
        value.as_i64().ok_or(value)
    }
}

impl FromJson for u64 {
    fn accepts(value: &Value) -> bool {
        value.is_u64()
    }

    fn from_json(value: Value) -> Result<Self, Value> {
        value.as_u64().ok_or(value)
    }
}

impl FromJson for f64 {
    fn accepts(value: &Value) -> bool {
        value.is_number()
    }

    fn from_json(value: Value) -> Result<Self, Value> {
        value.as_f64().ok_or(value)
    }
}

impl FromJson for Map<String, Value> {
    fn accepts(value: &Value) -> bool {
        value.is_object()
    }

    fn from_json(value: Value) -> Result<Self, Value> {
        match value {
            Value::Object(map) => Ok(map),
            other => Err(other),
        }
    }
}

/// `null` becomes `None`; anything else must convert as `T`.
impl<T: FromJson> FromJson for Option<T> {
    fn accepts(value: &Value) -> bool {
        value.is_null() || T::accepts(value)
    }

    fn from_json(value: Value) -> Result<Self, Value> {
        match value {
            Value::Null => Ok(None),
            other => T::from_json(other).map(Some),
        }
    }
}

/// All or nothing: one mismatched element keeps the whole array opaque.
impl<T: FromJson> FromJson for Vec<T> {
    fn accepts(value: &Value) -> bool {
        value.as_array().is_some_and(|items| items.iter().all(T::accepts))
    }

    fn from_json(value: Value) -> Result<Self, Value> {
        match value {
            Value::Array(items) if items.iter().all(T::accepts) => {
                items.into_iter().map(T::from_json).collect()
            }
            other => Err(other),
        }
    }
}

impl Record {
    /// Take a leaf field as `T`.
    pub fn take_value<T: FromJson>(&mut self, name: &str) -> Maybe<T> {
        match self.take(name) {
            Slot::Absent => Maybe::Absent,
            Slot::Value(v) => T::from_json(v).map_or_else(Maybe::Opaque, Maybe::Present),
            other => Maybe::Opaque(other.to_value().unwrap_or(Value::Null)),
        }
    }

    /// Take a nested record field as the typed record `T`.
    pub fn take_record<T: SoftBoiled>(&mut self, name: &str) -> Maybe<T> {
        match self.take(name) {
            Slot::Absent => Maybe::Absent,
            Slot::Record(record) => Maybe::Present(T::from_record(record)),
            other => Maybe::Opaque(other.to_value().unwrap_or(Value::Null)),
        }
    }

    /// Take a list-of-records field as `Vec<T>`.
    pub fn take_records<T: SoftBoiled>(&mut self, name: &str) -> Maybe<Vec<T>> {
        match self.take(name) {
            Slot::Absent => Maybe::Absent,
            Slot::Records(records) => Maybe::Present(records.into_iter().map(T::from_record).collect()),
            other => Maybe::Opaque(other.to_value().unwrap_or(Value::Null)),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SOFTBOILED
// ————————————————————————————————————————————————————————————————————————————

/// A Rust type that can be decoded leniently from a raw mapping.
///
/// Types whose fields name other typed records should declare those in
/// [`SoftBoiled::declare_dependencies`], so that declaring (or decoding)
/// the outer type is enough for its nested records to decode too.
pub trait SoftBoiled: Sized {
    /// Record name used in the registry and in other shapes' `TypeRef`s.
    const NAME: &'static str;

    /// Add this record's fields to its shape declaration.
    fn fields(shape: ShapeBuilder) -> ShapeBuilder;

    /// Build `Self` from a decoded record of this shape.
    fn from_record(record: Record) -> Self;

    /// Declare the typed records this one refers to, usually one
    /// `Nested::shape_in(registry)?` per nested type.
    fn declare_dependencies(_registry: &Registry) -> Result<(), DeclarationError> {
        Ok(())
    }

    /// Declare dependencies, then this shape.
    fn declare(registry: &Registry) -> Result<Arc<Shape>, DeclarationError> {
        Self::declare_dependencies(registry)?;
        Self::fields(Shape::builder(Self::NAME)).declare(registry)
    }

    /// Registered shape, declaring it (and its dependencies) on first use.
    fn shape_in(registry: &Registry) -> Result<Arc<Shape>, DeclarationError> {
        match registry.resolve(Self::NAME) {
            Some(shape) => Ok(shape),
            None => Self::declare(registry),
        }
    }

    /// Decode with an explicit decoder.
    fn decode_with<S: DiagnosticSink>(decoder: &Decoder<'_, S>, raw: &Map<String, Value>) -> Result<Self, DeclarationError> {
        let shape = Self::shape_in(decoder.registry())?;
        Ok(Self::from_record(decoder.decode(&shape, raw)))
    }

    /// Decode against the global registry, warning through the log.
    ///
    /// # Panics
    ///
    /// If this type's shape declaration is invalid. That is a bug in the
    /// `SoftBoiled` impl, not in the input.
    fn decode_from(raw: &Map<String, Value>) -> Self {
        let decoder = Decoder::new(Registry::global());
        match Self::decode_with(&decoder, raw) {
            Ok(value) => value,
            Err(err) => panic!("invalid declaration for {}: {err}", Self::NAME),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
