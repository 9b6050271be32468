//! Record shapes declared in a JSON document instead of in code.
//!
//! ```json
//! {
//!   "records": [
//!     { "name": "Team", "fields": [ { "name": "id", "type": "str" } ] },
//!     { "name": "User", "fields": [
//!         { "name": "id",    "type": "str" },
//!         { "name": "teams", "type": "Optional[List[Team]]" },
//!         { "name": "seats", "type": "int", "default": 1 }
//!     ] }
//!   ]
//! }
//! ```
//!
//! Type expressions are parsed once, when the document is loaded. Records
//! may refer to each other in any order: names are resolved at decode time.
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

use crate::path_de::{from_slice_with_path, from_str_with_path, PathError};
use crate::registry::Registry;
use crate::shape::{DeclarationError, Primitive, Shape, TypeRef};

// ————————————————————————————————————————————————————————————————————————————
// DOCUMENT
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDoc {
    pub records: Vec<RecordDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordDecl {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    /// `Some(Value::Null)` when the document says `"default": null`.
    #[serde(default, deserialize_with = "explicit")]
    pub default: Option<Value>,
}

fn explicit<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(de).map(Some)
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid schema document {0}")]
    Parse(#[from] PathError),
    #[error("record '{record}', field '{field}': cannot parse type '{expr}'")]
    TypeExpr { record: String, field: String, expr: String },
    #[error("record '{0}' is declared more than once")]
    DuplicateRecord(String),
    #[error(transparent)]
    Declaration(#[from] DeclarationError),
}

// ————————————————————————————————————————————————————————————————————————————
// SCHEMA
// ————————————————————————————————————————————————————————————————————————————

/// Validated shapes from one schema document, not yet registered.
#[derive(Debug, Clone)]
pub struct Schema {
    shapes: Vec<Shape>,
}

impl Schema {
    pub fn from_json_str(src: &str) -> Result<Self, SchemaError> {
        Self::from_doc(from_str_with_path::<SchemaDoc>(src)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_doc(from_slice_with_path::<SchemaDoc>(&bytes)?)
    }

    pub fn from_doc(doc: SchemaDoc) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        let mut shapes = Vec::with_capacity(doc.records.len());
        for record in doc.records {
            if !seen.insert(record.name.clone()) {
                return Err(SchemaError::DuplicateRecord(record.name));
            }
            let mut builder = Shape::builder(record.name.as_str());
            for field in record.fields {
                let ty = parse_type(&field.ty).ok_or_else(|| SchemaError::TypeExpr {
                    record: record.name.clone(),
                    field: field.name.clone(),
                    expr: field.ty.clone(),
                })?;
                builder = match field.default {
                    Some(default) => builder.field_with_default(field.name, ty, default),
                    None => builder.field(field.name, ty),
                };
            }
            shapes.push(builder.build()?);
        }
        Ok(Schema { shapes })
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.shapes.iter().map(Shape::name)
    }

    /// Register every shape; returns them in document order.
    pub fn declare_into(self, registry: &Registry) -> Vec<Arc<Shape>> {
        self.shapes.into_iter().map(|shape| registry.register(shape)).collect()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TYPE EXPRESSIONS
// ————————————————————————————————————————————————————————————————————————————

/// Parse `str`, `int`, `Optional[T]`, `List[T]`, `Sequence[T]`, or a record
/// name. Record names are validated later by the shape builder.
pub fn parse_type(expr: &str) -> Option<TypeRef> {
    let expr = expr.trim();
    if expr.is_empty() {
        return None;
    }
    if let Some(inner) = unwrap_generic(expr, &["Optional"]) {
        return parse_type(inner).map(TypeRef::optional);
    }
    if let Some(inner) = unwrap_generic(expr, &["List", "list", "Sequence"]) {
        return parse_type(inner).map(TypeRef::sequence);
    }
    if expr.contains(['[', ']', ',']) {
        return None;
    }
    let primitive = match expr {
        "str" | "string" => Primitive::Str,
        "int" | "integer" => Primitive::Int,
        "float" | "number" => Primitive::Float,
        "bool" | "boolean" => Primitive::Bool,
        "any" | "Any" => Primitive::Any,
        "object" | "dict" => Primitive::Object,
        name => return Some(TypeRef::record(name)),
    };
    Some(TypeRef::Primitive(primitive))
}

fn unwrap_generic<'a>(expr: &'a str, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|name| {
        expr.strip_prefix(name)?
            .strip_prefix('[')?
            .strip_suffix(']')
    })
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
