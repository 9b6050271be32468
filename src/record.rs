//! Decoded record instances.
use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::shape::Shape;

/// Content of one field of a decoded record.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Nothing supplied and no default declared. Distinct from `Value(Null)`.
    Absent,
    /// A scalar or an opaque structure, exactly as supplied.
    Value(Value),
    Record(Record),
    Records(Vec<Record>),
}

/// An immutable decoded instance of a [`Shape`].
///
/// Its field set is exactly the shape's field set. Two records are equal when
/// they have the same shape name and equal fields, regardless of order.
#[derive(Debug, Clone)]
pub struct Record {
    shape: Arc<Shape>,
    fields: IndexMap<String, Slot>,
}

impl Slot {
    pub fn is_absent(&self) -> bool {
        matches!(self, Slot::Absent)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Slot::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Slot::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&[Record]> {
        match self {
            Slot::Records(rs) => Some(rs),
            _ => None,
        }
    }

    /// Re-encode as raw JSON. `None` for [`Slot::Absent`].
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Slot::Absent => None,
            Slot::Value(v) => Some(v.clone()),
            Slot::Record(r) => Some(Value::Object(r.to_map())),
            Slot::Records(rs) => Some(Value::Array(
                rs.iter().map(|r| Value::Object(r.to_map())).collect(),
            )),
        }
    }
}

impl From<Value> for Slot {
    fn from(value: Value) -> Self {
        Slot::Value(value)
    }
}

impl Record {
    /// Build an instance from a field mapping whose keys are exactly the
    /// shape's field names. Only the decoder calls this.
    pub(crate) fn construct(shape: Arc<Shape>, fields: IndexMap<String, Slot>) -> Self {
        debug_assert_eq!(fields.len(), shape.len(), "field count differs from shape '{}'", shape.name());
        debug_assert!(
            fields.keys().all(|k| shape.has_field(k)),
            "field mapping has keys foreign to shape '{}'",
            shape.name()
        );
        Record { shape, fields }
    }

    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    pub fn shape_name(&self) -> &str {
        self.shape.name()
    }

    pub fn get(&self, name: &str) -> Option<&Slot> {
        self.fields.get(name)
    }

    pub fn is_absent(&self, name: &str) -> bool {
        self.get(name).is_some_and(Slot::is_absent)
    }

    pub fn field_names(&self) -> impl ExactSizeIterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &Slot)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Required fields holding [`Slot::Absent`], in declaration order. This
    /// is what strict callers check; decoding itself never fails.
    pub fn missing_required(&self) -> Vec<&str> {
        self.shape
            .fields()
            .filter(|f| f.is_required() && self.is_absent(f.name()))
            .map(|f| f.name())
            .collect()
    }

    /// Move a field out, leaving [`Slot::Absent`] behind.
    pub fn take(&mut self, name: &str) -> Slot {
        match self.fields.get_mut(name) {
            Some(slot) => std::mem::replace(slot, Slot::Absent),
            None => Slot::Absent,
        }
    }

    /// Raw mapping that decodes back to an equal record. Absent fields are
    /// left out.
    pub fn to_map(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter_map(|(k, slot)| slot.to_value().map(|v| (k.clone(), v)))
            .collect()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.to_map())
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.shape.name() == other.shape.name() && self.fields == other.fields
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let present = self.fields.values().filter(|s| !s.is_absent()).count();
        let mut map = serializer.serialize_map(Some(present))?;
        for (key, slot) in &self.fields {
            match slot {
                Slot::Absent => continue,
                Slot::Value(v) => map.serialize_entry(key, v)?,
                Slot::Record(r) => map.serialize_entry(key, r)?,
                Slot::Records(rs) => map.serialize_entry(key, rs)?,
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::TypeRef;
    use serde_json::json;

    fn pair_shape() -> Arc<Shape> {
        Arc::new(
            Shape::builder("Pair")
                .field("a", TypeRef::STR)
                .field("b", TypeRef::optional(TypeRef::STR))
                .build()
                .unwrap(),
        )
    }

    fn pair(a: Slot, b: Slot) -> Record {
        let mut fields = IndexMap::new();
        fields.insert("a".to_string(), a);
        fields.insert("b".to_string(), b);
        Record::construct(pair_shape(), fields)
    }

    #[test]
    fn equality_ignores_field_order() {
        let forward = pair(json!("x").into(), Slot::Absent);

        let mut fields = IndexMap::new();
        fields.insert("b".to_string(), Slot::Absent);
        fields.insert("a".to_string(), json!("x").into());
        let backward = Record::construct(pair_shape(), fields);

        assert_eq!(forward, backward);
        assert_ne!(forward, pair(json!("y").into(), Slot::Absent));
    }

    #[test]
    fn absent_is_not_null() {
        let absent = pair(json!("x").into(), Slot::Absent);
        let null = pair(json!("x").into(), Value::Null.into());
        assert_ne!(absent, null);
        assert!(absent.is_absent("b"));
        assert!(!null.is_absent("b"));
    }

    #[test]
    fn to_map_omits_absent_and_serializes_the_same() {
        let record = pair(Slot::Absent, json!("y").into());
        assert_eq!(record.to_value(), json!({"b": "y"}));
        assert_eq!(serde_json::to_value(&record).unwrap(), json!({"b": "y"}));
        assert_eq!(record.missing_required(), vec!["a"]);
    }

    #[test]
    fn take_leaves_absent_behind() {
        let mut record = pair(json!("x").into(), Slot::Absent);
        assert_eq!(record.take("a"), Slot::Value(json!("x")));
        assert!(record.is_absent("a"));
        assert_eq!(record.take("nope"), Slot::Absent);
        assert_eq!(record.len(), 2);
    }
}
