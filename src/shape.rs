//! Record shapes: the declared, immutable description of one record type.
//!
//! A [`Shape`] is built once through [`ShapeBuilder`], which validates the
//! declaration and computes each field's required-ness up front. Decoding
//! only ever reads the cached field list; nothing is re-derived per call.
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::registry::Registry;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Scalar and opaque leaf kinds. The decoder never checks values against
/// these; they document intent and drive the typed layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Str,
    Int,
    Float,
    Bool,
    /// Arbitrary JSON, kept as-is.
    Any,
    /// A mapping that is *not* a declared record.
    Object,
}

/// Declared type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Primitive(Primitive),
    /// Reference by name to another record shape in the registry.
    Record(String),
    Optional(Box<TypeRef>),
    Sequence(Box<TypeRef>),
}

/// One declared field of a record shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    ty: TypeRef,
    default: Option<Value>,
    required: bool,
}

/// Type descriptor for one record shape. Field order is declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    name: String,
    fields: IndexMap<String, Field>,
}

/// Collects a shape declaration; [`ShapeBuilder::build`] validates it.
#[derive(Debug, Clone)]
pub struct ShapeBuilder {
    name: String,
    fields: Vec<(String, TypeRef, Option<Value>)>,
}

/// A declaration that does not describe a valid record shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    #[error("invalid record name '{0}': expected an identifier")]
    InvalidName(String),
    #[error("record '{record}': field name is empty")]
    EmptyFieldName { record: String },
    #[error("record '{record}': field '{field}' is declared more than once")]
    DuplicateField { record: String, field: String },
    #[error("record '{record}': field '{field}' refers to invalid record name '{target}'")]
    InvalidReference { record: String, field: String, target: String },
    #[error("record '{record}': field '{field}' decodes into record '{target}' and only accepts a null default")]
    RecordDefault { record: String, field: String, target: String },
}

// ————————————————————————————————————————————————————————————————————————————
// TYPEREF
// ————————————————————————————————————————————————————————————————————————————

impl TypeRef {
    pub const STR: TypeRef = TypeRef::Primitive(Primitive::Str);
    pub const INT: TypeRef = TypeRef::Primitive(Primitive::Int);
    pub const FLOAT: TypeRef = TypeRef::Primitive(Primitive::Float);
    pub const BOOL: TypeRef = TypeRef::Primitive(Primitive::Bool);
    pub const ANY: TypeRef = TypeRef::Primitive(Primitive::Any);
    pub const OBJECT: TypeRef = TypeRef::Primitive(Primitive::Object);

    pub fn record(name: impl Into<String>) -> Self {
        TypeRef::Record(name.into())
    }

    pub fn optional(inner: TypeRef) -> Self {
        TypeRef::Optional(Box::new(inner))
    }

    pub fn sequence(inner: TypeRef) -> Self {
        TypeRef::Sequence(Box::new(inner))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, TypeRef::Optional(_))
    }

    /// Name of the record this type decodes into, looking through at most
    /// one `Optional` and then at most one `Sequence`. Anything wrapped
    /// deeper is opaque and yields `None`.
    pub fn record_target(&self) -> Option<&str> {
        let inner = match self {
            TypeRef::Optional(inner) => inner.as_ref(),
            other => other,
        };
        let inner = match inner {
            TypeRef::Sequence(inner) => inner.as_ref(),
            other => other,
        };
        match inner {
            TypeRef::Record(name) => Some(name),
            _ => None,
        }
    }

    /// Every record name mentioned anywhere in this type, however deep.
    fn mentioned_records<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            TypeRef::Primitive(_) => {}
            TypeRef::Record(name) => out.push(name),
            TypeRef::Optional(inner) | TypeRef::Sequence(inner) => inner.mentioned_records(out),
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Primitive::Str => "str",
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::Bool => "bool",
            Primitive::Any => "any",
            Primitive::Object => "object",
        };
        f.write_str(s)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(p) => write!(f, "{p}"),
            TypeRef::Record(name) => f.write_str(name),
            TypeRef::Optional(inner) => write!(f, "Optional[{inner}]"),
            TypeRef::Sequence(inner) => write!(f, "List[{inner}]"),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// FIELD & SHAPE
// ————————————————————————————————————————————————————————————————————————————

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// Declared default, if any. `Some(Value::Null)` is a real default.
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// No default declared and not `Optional`-wrapped.
    pub fn is_required(&self) -> bool {
        self.required
    }
}

impl Shape {
    pub fn builder(name: impl Into<String>) -> ShapeBuilder {
        ShapeBuilder { name: name.into(), fields: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered field list, as declared.
    pub fn fields(&self) -> impl ExactSizeIterator<Item = &Field> {
        self.fields.values()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl ExactSizeIterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `(field, record name)` for every record this shape mentions.
    pub(crate) fn references(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        for field in self.fields.values() {
            let mut names = Vec::new();
            field.ty.mentioned_records(&mut names);
            out.extend(names.into_iter().map(|target| (field.name.as_str(), target)));
        }
        out
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.name)?;
        for (i, field) in self.fields.values().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{}: {}", field.name, field.ty)?;
            if let Some(default) = &field.default {
                write!(f, " = {default}")?;
            }
        }
        if self.fields.is_empty() { f.write_str("}") } else { f.write_str(" }") }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BUILDER
// ————————————————————————————————————————————————————————————————————————————

impl ShapeBuilder {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.fields.push((name.into(), ty, None));
        self
    }

    pub fn field_with_default(mut self, name: impl Into<String>, ty: TypeRef, default: Value) -> Self {
        self.fields.push((name.into(), ty, Some(default)));
        self
    }

    /// Validate and freeze the declaration.
    pub fn build(self) -> Result<Shape, DeclarationError> {
        let record = self.name;
        if !IDENTIFIER.is_match(&record) {
            return Err(DeclarationError::InvalidName(record));
        }

        let mut fields = IndexMap::with_capacity(self.fields.len());
        for (name, ty, default) in self.fields {
            if name.is_empty() {
                return Err(DeclarationError::EmptyFieldName { record });
            }
            if fields.contains_key(&name) {
                return Err(DeclarationError::DuplicateField { record, field: name });
            }

            if let Some(target) = invalid_reference(&ty) {
                return Err(DeclarationError::InvalidReference { record, field: name, target });
            }
            if let (Some(target), Some(default)) = (ty.record_target(), &default) {
                if !default.is_null() {
                    return Err(DeclarationError::RecordDefault {
                        record,
                        field: name,
                        target: target.to_string(),
                    });
                }
            }

            let required = default.is_none() && !ty.is_optional();
            fields.insert(name.clone(), Field { name, ty, default, required });
        }

        Ok(Shape { name: record, fields })
    }

    /// Build and register in `registry`.
    pub fn declare(self, registry: &Registry) -> Result<Arc<Shape>, DeclarationError> {
        let shape = self.build()?;
        Ok(registry.register(shape))
    }

    /// Build and register in the process-wide registry.
    pub fn declare_global(self) -> Result<Arc<Shape>, DeclarationError> {
        self.declare(Registry::global())
    }
}

fn invalid_reference(ty: &TypeRef) -> Option<String> {
    let mut mentioned = Vec::new();
    ty.mentioned_records(&mut mentioned);
    mentioned
        .into_iter()
        .find(|target| !IDENTIFIER.is_match(target))
        .map(str::to_string)
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
