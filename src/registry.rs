//! Name → shape table consulted when a field refers to another record.
//!
//! Shapes are registered once while record types are declared and are never
//! removed. Reads and writes go through an `RwLock`; a reader sees either the
//! old entry or the fully built new one, never a partial write.
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use once_cell::sync::Lazy;

use crate::shape::Shape;

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);

/// Registry of declared record shapes, keyed by record name.
#[derive(Debug, Default)]
pub struct Registry {
    shapes: RwLock<HashMap<String, Arc<Shape>>>,
}

/// A field whose declared type names a record the registry does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRef {
    pub record: String,
    pub field: String,
    pub target: String,
}

impl fmt::Display for UnresolvedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} refers to undeclared record '{}'", self.record, self.field, self.target)
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Add `shape` under its name. Re-registering a name replaces the entry.
    pub fn register(&self, shape: impl Into<Arc<Shape>>) -> Arc<Shape> {
        let shape = shape.into();
        let previous = self.write().insert(shape.name().to_string(), Arc::clone(&shape));
        match previous {
            Some(_) => log::debug!("re-registered record shape '{}'", shape.name()),
            None => log::debug!("registered record shape '{}' ({} fields)", shape.name(), shape.len()),
        }
        shape
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<Shape>> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Registered names, sorted for determinism.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Record references that currently do not resolve. Decoding passes such
    /// fields through unchanged, so this is the place to catch typos.
    pub fn unresolved(&self) -> Vec<UnresolvedRef> {
        let shapes = self.read();
        let mut out = Vec::new();
        for shape in shapes.values() {
            for (field, target) in shape.references() {
                if !shapes.contains_key(target) {
                    out.push(UnresolvedRef {
                        record: shape.name().to_string(),
                        field: field.to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }
        out.sort_by(|a, b| (&a.record, &a.field).cmp(&(&b.record, &b.field)));
        out
    }

    // A panic while holding the lock cannot leave a half-inserted Arc behind,
    // so a poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Shape>>> {
        self.shapes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Shape>>> {
        self.shapes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::TypeRef;

    fn leaf(name: &str) -> Shape {
        Shape::builder(name).field("x", TypeRef::STR).build().unwrap()
    }

    #[test]
    fn register_then_resolve() {
        let registry = Registry::new();
        assert!(registry.resolve("Leaf").is_none());

        registry.register(leaf("Leaf"));
        let shape = registry.resolve("Leaf").unwrap();
        assert_eq!(shape.name(), "Leaf");
        assert!(registry.contains("Leaf"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn re_registering_overwrites() {
        let registry = Registry::new();
        registry.register(leaf("Leaf"));
        registry.register(Shape::builder("Leaf").field("y", TypeRef::INT).build().unwrap());

        let shape = registry.resolve("Leaf").unwrap();
        assert_eq!(shape.field_names().collect::<Vec<_>>(), vec!["y"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn concurrent_declarations_all_land() {
        let registry = Registry::new();
        std::thread::scope(|scope| {
            for t in 0..8 {
                let registry = &registry;
                scope.spawn(move || {
                    for i in 0..25 {
                        registry.register(leaf(&format!("Shape_{t}_{i}")));
                        // readers interleave with writers
                        assert!(registry.resolve(&format!("Shape_{t}_{i}")).is_some());
                    }
                });
            }
        });
        assert_eq!(registry.len(), 200);
        assert_eq!(registry.names()[0], "Shape_0_0");
    }

    #[test]
    fn unresolved_lists_dangling_references() {
        let registry = Registry::new();
        registry.register(
            Shape::builder("Parent")
                .field("child", TypeRef::record("Child"))
                .field("others", TypeRef::optional(TypeRef::sequence(TypeRef::record("Other"))))
                .build()
                .unwrap(),
        );
        registry.register(leaf("Child"));

        let dangling = registry.unresolved();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].to_string(), "Parent.others refers to undeclared record 'Other'");

        registry.register(leaf("Other"));
        assert!(registry.unresolved().is_empty());
    }
}
