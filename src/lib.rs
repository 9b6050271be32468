//! Lenient decoding of loosely-shaped JSON into declared record types.
//!
//! Declare record shapes once (in code with [`Shape::builder`], through the
//! [`SoftBoiled`] trait, or from a [`Schema`] document), then decode raw
//! mappings against them. Decoding never fails:
//! - unknown keys are dropped,
//! - missing fields become [`Slot::Absent`] (or their declared default),
//! - each missing *required* field produces one [`Warning`],
//! - nested records and lists of records are decoded recursively.
//!
//! ```
//! use serde_json::json;
//! use softboiled::{Collector, Decoder, Registry, Shape, Slot, TypeRef};
//!
//! let registry = Registry::new();
//! Shape::builder("Child").field("x", TypeRef::STR).declare(&registry).unwrap();
//! let parent = Shape::builder("Parent")
//!     .field("name", TypeRef::STR)
//!     .field("items", TypeRef::sequence(TypeRef::record("Child")))
//!     .declare(&registry)
//!     .unwrap();
//!
//! let decoder = Decoder::with_sink(&registry, Collector::new());
//! let raw = json!({"items": [{"x": "1"}, {}], "unknown": true});
//! let record = decoder.decode_value(&parent, &raw);
//!
//! assert!(record.is_absent("name"));
//! assert_eq!(record.get("items").and_then(Slot::as_records).map(|r| r.len()), Some(2));
//! assert_eq!(decoder.sink().fields(), vec!["x", "name"]);
//! ```
pub mod decode;
pub mod diagnostics;
pub mod model;
pub mod path_de;
pub mod record;
pub mod registry;
pub mod schema;
pub mod shape;

pub use decode::{decode, decode_value, Decoder};
pub use diagnostics::{Collector, DiagnosticSink, LogSink, Warning};
pub use model::{FromJson, Maybe, SoftBoiled};
pub use record::{Record, Slot};
pub use registry::{Registry, UnresolvedRef};
pub use schema::{Schema, SchemaError};
pub use shape::{DeclarationError, Field, Primitive, Shape, ShapeBuilder, TypeRef};
