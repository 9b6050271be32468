//! Lenient decoding of raw JSON mappings into records.
//!
//! Three passes over the target shape's fields:
//! 1. filter: keep only keys the shape declares; the rest is dropped silently.
//! 2. nested: fields whose type names a registered record are decoded
//!    recursively (element-wise for sequences); everything else passes
//!    through untouched.
//! 3. fill: fields still missing take their declared default, or
//!    [`Slot::Absent`]; absent required fields raise one warning each.
//!
//! Recursion follows the *shape*, never the data, so input nesting cannot
//! drive it deeper than the declared schema.
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::diagnostics::{DiagnosticSink, LogSink, Warning};
use crate::record::{Record, Slot};
use crate::registry::Registry;
use crate::shape::Shape;

/// Decodes against the shapes of one registry, reporting to one sink.
#[derive(Debug)]
pub struct Decoder<'r, S = LogSink> {
    registry: &'r Registry,
    sink: S,
}

impl<'r> Decoder<'r, LogSink> {
    pub fn new(registry: &'r Registry) -> Self {
        Decoder { registry, sink: LogSink }
    }
}

impl<'r, S: DiagnosticSink> Decoder<'r, S> {
    pub fn with_sink(registry: &'r Registry, sink: S) -> Self {
        Decoder { registry, sink }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Decode `raw` into an instance of `shape`. Never fails.
    pub fn decode(&self, shape: &Arc<Shape>, raw: &Map<String, Value>) -> Record {
        let known = filter_known(shape, raw);
        let resolved = self.resolve_nested(shape, known);
        let filled = self.fill_missing(shape, resolved);
        Record::construct(Arc::clone(shape), filled)
    }

    /// Like [`Decoder::decode`] for any JSON value. A non-object decodes as
    /// an empty mapping.
    pub fn decode_value(&self, shape: &Arc<Shape>, raw: &Value) -> Record {
        match raw {
            Value::Object(map) => self.decode(shape, map),
            _ => self.decode(shape, &Map::new()),
        }
    }

    /// Decode against the shape registered as `name`, if any.
    pub fn decode_named(&self, name: &str, raw: &Map<String, Value>) -> Option<Record> {
        let shape = self.registry.resolve(name)?;
        Some(self.decode(&shape, raw))
    }

    fn resolve_nested(&self, shape: &Shape, known: Vec<(&str, &Value)>) -> IndexMap<String, Slot> {
        let mut out = IndexMap::with_capacity(known.len());
        for (key, value) in known {
            let target = shape.field(key).and_then(|f| f.ty().record_target());
            let slot = match target {
                None => Slot::Value(value.clone()),
                Some(target) => match self.registry.resolve(target) {
                    Some(nested) => self.decode_nested(&nested, value),
                    None => {
                        log::debug!(
                            "{}.{}: record '{target}' is not registered, passing value through",
                            shape.name(),
                            key
                        );
                        Slot::Value(value.clone())
                    }
                },
            };
            out.insert(key.to_string(), slot);
        }
        out
    }

    fn decode_nested(&self, nested: &Arc<Shape>, value: &Value) -> Slot {
        match value {
            Value::Object(map) => Slot::Record(self.decode(nested, map)),
            Value::Array(items) if items.iter().all(Value::is_object) => Slot::Records(
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .map(|map| self.decode(nested, map))
                    .collect(),
            ),
            other => Slot::Value(other.clone()),
        }
    }

    fn fill_missing(&self, shape: &Shape, mut resolved: IndexMap<String, Slot>) -> IndexMap<String, Slot> {
        let mut out = IndexMap::with_capacity(shape.len());
        for field in shape.fields() {
            let slot = resolved.swap_remove(field.name()).unwrap_or_else(|| match field.default() {
                Some(default) => Slot::Value(default.clone()),
                None => Slot::Absent,
            });
            if slot.is_absent() && field.is_required() {
                self.sink.warn(Warning {
                    record: shape.name().to_string(),
                    field: field.name().to_string(),
                });
            }
            out.insert(field.name().to_string(), slot);
        }
        out
    }
}

fn filter_known<'a>(shape: &Shape, raw: &'a Map<String, Value>) -> Vec<(&'a str, &'a Value)> {
    raw.iter()
        .filter(|(key, _)| shape.has_field(key))
        .map(|(key, value)| (key.as_str(), value))
        .collect()
}

/// Decode against the global registry, warning through the `log` facade.
pub fn decode(shape: &Arc<Shape>, raw: &Map<String, Value>) -> Record {
    Decoder::new(Registry::global()).decode(shape, raw)
}

/// [`decode`] for any JSON value; non-objects decode as an empty mapping.
pub fn decode_value(shape: &Arc<Shape>, raw: &Value) -> Record {
    Decoder::new(Registry::global()).decode_value(shape, raw)
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Collector;
    use crate::shape::TypeRef;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            other => panic!("fixture is not an object: {other}"),
        }
    }

    /// `a: str`, `b: str`, `c: Optional[str]`
    fn simple(registry: &Registry) -> Arc<Shape> {
        Shape::builder("SimpleLayer")
            .field("a", TypeRef::STR)
            .field("b", TypeRef::STR)
            .field("c", TypeRef::optional(TypeRef::STR))
            .declare(registry)
            .unwrap()
    }

    fn child(registry: &Registry) -> Arc<Shape> {
        Shape::builder("Child").field("x", TypeRef::STR).declare(registry).unwrap()
    }

    fn decode_collect(registry: &Registry, shape: &Arc<Shape>, raw: Value) -> (Record, Vec<String>) {
        let decoder = Decoder::with_sink(registry, Collector::new());
        let record = decoder.decode(shape, &obj(raw));
        (record, decoder.into_sink().fields())
    }

    #[test]
    fn empty_input_everything_absent() {
        let registry = Registry::new();
        let shape = simple(&registry);
        let (record, warned) = decode_collect(&registry, &shape, json!({}));

        assert!(record.is_absent("a") && record.is_absent("b") && record.is_absent("c"));
        assert_eq!(warned, vec!["a", "b"]);
    }

    #[test]
    fn partial_input_warns_for_the_rest() {
        let registry = Registry::new();
        let shape = simple(&registry);
        let (record, warned) = decode_collect(&registry, &shape, json!({"a": "X"}));

        assert_eq!(record.get("a").and_then(Slot::as_str), Some("X"));
        assert!(record.is_absent("b"));
        assert!(record.is_absent("c"));
        assert_eq!(warned, vec!["b"]);
    }

    #[test]
    fn extra_keys_dropped_without_warning() {
        let registry = Registry::new();
        let shape = simple(&registry);
        let (record, warned) =
            decode_collect(&registry, &shape, json!({"a": "X", "b": "Y", "c": "Z", "d": "extra"}));

        assert_eq!(record.to_value(), json!({"a": "X", "b": "Y", "c": "Z"}));
        assert_eq!(record.field_names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert!(warned.is_empty());
    }

    #[test]
    fn foreign_keys_decode_like_empty_input() {
        let registry = Registry::new();
        let shape = simple(&registry);
        let (empty, warned_empty) = decode_collect(&registry, &shape, json!({}));
        let (foreign, warned_foreign) = decode_collect(&registry, &shape, json!({"q": 1, "r": [2]}));
        assert_eq!(empty, foreign);
        assert_eq!(warned_empty, warned_foreign);
    }

    #[test]
    fn field_set_matches_shape_whatever_the_input() {
        let registry = Registry::new();
        let shape = simple(&registry);
        for raw in [json!({}), json!({"a": 1}), json!({"z": 1, "c": null}), json!({"a": [], "b": {}, "c": 0, "d": 0})] {
            let (record, _) = decode_collect(&registry, &shape, raw);
            assert_eq!(record.field_names().collect::<Vec<_>>(), shape.field_names().collect::<Vec<_>>());
        }
    }

    #[test]
    fn types_are_not_validated() {
        let registry = Registry::new();
        let shape = simple(&registry);
        let (record, warned) = decode_collect(&registry, &shape, json!({"a": 42, "b": [true], "c": {"k": 1}}));
        assert_eq!(record.get("a"), Some(&Slot::Value(json!(42))));
        assert_eq!(record.get("b"), Some(&Slot::Value(json!([true]))));
        assert_eq!(record.get("c"), Some(&Slot::Value(json!({"k": 1}))));
        assert!(warned.is_empty());
    }

    #[test]
    fn explicit_null_is_kept_and_not_warned() {
        let registry = Registry::new();
        let shape = simple(&registry);
        let (record, warned) = decode_collect(&registry, &shape, json!({"a": null, "b": "Y"}));
        assert_eq!(record.get("a"), Some(&Slot::Value(Value::Null)));
        assert!(warned.is_empty());
    }

    #[test]
    fn defaults_fill_without_warning_and_yield_to_input() {
        let registry = Registry::new();
        let shape = Shape::builder("DefaultValues")
            .field_with_default("data01", TypeRef::STR, json!("Test 01"))
            .field_with_default("data02", TypeRef::BOOL, json!(true))
            .field_with_default("data03", TypeRef::INT, json!(0))
            .declare(&registry)
            .unwrap();

        let (defaulted, warned) = decode_collect(&registry, &shape, json!({}));
        assert_eq!(defaulted.to_value(), json!({"data01": "Test 01", "data02": true, "data03": 0}));
        assert!(warned.is_empty());

        let (overridden, _) =
            decode_collect(&registry, &shape, json!({"data01": "Hello", "data02": false, "data03": 10}));
        assert_eq!(overridden.to_value(), json!({"data01": "Hello", "data02": false, "data03": 10}));
    }

    #[test]
    fn nested_record_decodes_and_warns_inside() {
        let registry = Registry::new();
        child(&registry);
        let parent = Shape::builder("Parent")
            .field("child", TypeRef::record("Child"))
            .declare(&registry)
            .unwrap();

        let (record, warned) = decode_collect(&registry, &parent, json!({"child": {}}));
        let nested = record.get("child").and_then(Slot::as_record).unwrap();
        assert_eq!(nested.shape_name(), "Child");
        assert!(nested.is_absent("x"));
        assert_eq!(warned, vec!["x"]);
    }

    #[test]
    fn nested_decode_composes() {
        let registry = Registry::new();
        let child_shape = child(&registry);
        let parent = Shape::builder("Parent")
            .field("child", TypeRef::optional(TypeRef::record("Child")))
            .declare(&registry)
            .unwrap();

        let inner = json!({"x": "1", "junk": true});
        let (whole, _) = decode_collect(&registry, &parent, json!({"child": inner.clone()}));
        let (alone, _) = decode_collect(&registry, &child_shape, inner);
        assert_eq!(whole.get("child").and_then(Slot::as_record), Some(&alone));
    }

    #[test]
    fn list_of_records_decodes_element_wise() {
        let registry = Registry::new();
        child(&registry);
        let parent = Shape::builder("Parent")
            .field("items", TypeRef::sequence(TypeRef::record("Child")))
            .declare(&registry)
            .unwrap();

        let (record, warned) = decode_collect(&registry, &parent, json!({"items": [{"x": "1"}, {}]}));
        let items = record.get("items").and_then(Slot::as_records).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].get("x").and_then(Slot::as_str), Some("1"));
        assert!(items[1].is_absent("x"));
        assert_eq!(warned, vec!["x"]);
    }

    #[test]
    fn non_mapping_values_for_record_fields_pass_through() {
        let registry = Registry::new();
        child(&registry);
        let parent = Shape::builder("Parent")
            .field("child", TypeRef::record("Child"))
            .field("items", TypeRef::sequence(TypeRef::record("Child")))
            .declare(&registry)
            .unwrap();

        let (record, _) = decode_collect(&registry, &parent, json!({"child": "flat", "items": [{"x": "1"}, 2]}));
        assert_eq!(record.get("child"), Some(&Slot::Value(json!("flat"))));
        assert_eq!(record.get("items"), Some(&Slot::Value(json!([{"x": "1"}, 2]))));

        let (empty_list, _) = decode_collect(&registry, &parent, json!({"items": []}));
        assert_eq!(empty_list.get("items"), Some(&Slot::Records(Vec::new())));
    }

    #[test]
    fn unregistered_record_name_passes_through() {
        let registry = Registry::new();
        let parent = Shape::builder("Parent")
            .field("later", TypeRef::record("DeclaredLater"))
            .declare(&registry)
            .unwrap();

        let (record, warned) = decode_collect(&registry, &parent, json!({"later": {"x": 1, "extra": 2}}));
        assert_eq!(record.get("later"), Some(&Slot::Value(json!({"x": 1, "extra": 2}))));
        assert!(warned.is_empty());

        // resolution happens at decode time, so declaring it afterwards is enough
        Shape::builder("DeclaredLater").field("x", TypeRef::INT).declare(&registry).unwrap();
        let (record, _) = decode_collect(&registry, &parent, json!({"later": {"x": 1, "extra": 2}}));
        assert_eq!(record.get("later").and_then(Slot::as_record).map(Record::to_value), Some(json!({"x": 1})));
    }

    #[test]
    fn deep_data_does_not_drive_recursion() {
        let registry = Registry::new();
        let shape = simple(&registry);
        // 100 levels, inside serde_json's parse limit
        let depth = 100;
        let text = format!("{}\"bottom\"{}", "{\"a\":".repeat(depth), "}".repeat(depth));
        let deep: Value = serde_json::from_str(&text).unwrap();

        let (record, warned) = decode_collect(&registry, &shape, deep.clone());
        assert_eq!(record.get("a"), Some(&Slot::Value(deep["a"].clone())));
        assert_eq!(warned, vec!["b"]);
    }

    #[test]
    fn redecoding_reencoded_record_is_identity() {
        let registry = Registry::new();
        child(&registry);
        let top = Shape::builder("TopLayer")
            .field("tdata01", TypeRef::STR)
            .field("tdata02", TypeRef::record("Child"))
            .field("tdata03", TypeRef::optional(TypeRef::STR))
            .field("tdata04", TypeRef::optional(TypeRef::sequence(TypeRef::record("Child"))))
            .field_with_default("tdata05", TypeRef::INT, json!(7))
            .declare(&registry)
            .unwrap();

        let raw = json!({
            "tdata02": {"x": "a", "y": "dropped"},
            "tdata03": null,
            "tdata04": [{"x": "1"}, {}],
            "tdata06": "dropped",
        });
        let (first, _) = decode_collect(&registry, &top, raw);
        let (second, _) = decode_collect(&registry, &top, first.to_value());
        assert_eq!(first, second);
    }

    #[test]
    fn extra_keys_never_change_the_result() {
        let registry = Registry::new();
        child(&registry);
        let top = Shape::builder("Top")
            .field("a", TypeRef::STR)
            .field("kids", TypeRef::sequence(TypeRef::record("Child")))
            .declare(&registry)
            .unwrap();

        let (plain, _) = decode_collect(&registry, &top, json!({"a": "A", "kids": [{"x": "1"}]}));
        let (noisy, _) = decode_collect(
            &registry,
            &top,
            json!({"a": "A", "kids": [{"x": "1", "y": 2}], "zz": {"kids": []}}),
        );
        assert_eq!(plain, noisy);
    }

    #[test]
    fn decode_value_treats_non_objects_as_empty() {
        let registry = Registry::new();
        let shape = simple(&registry);
        let decoder = Decoder::with_sink(&registry, Collector::new());
        let record = decoder.decode_value(&shape, &json!([1, 2, 3]));
        assert_eq!(record.missing_required(), vec!["a", "b"]);
        assert_eq!(decoder.sink().len(), 2);
    }

    #[test]
    fn decode_named_uses_registry() {
        let registry = Registry::new();
        simple(&registry);
        let decoder = Decoder::with_sink(&registry, Collector::new());
        assert!(decoder.decode_named("SimpleLayer", &obj(json!({"a": "X"}))).is_some());
        assert!(decoder.decode_named("Missing", &Map::new()).is_none());
    }
}
