//! Custom converter registry
//!
//! User-supplied conversion functions keyed by (source type, destination
//! type). Resolution is an ordered scan: an exact pair wins, otherwise the
//! first registered entry whose source type is a supertype of the value's
//! runtime type.

use objmap_ir::{TypeRef, Value};
use std::sync::Arc;

/// Type alias for a converter function
pub type ConverterFn = Arc<dyn Fn(&Value) -> crate::Result<Value> + Send + Sync>;

/// A registered conversion
#[derive(Clone)]
pub struct Converter {
    pub source: TypeRef,
    pub destination: TypeRef,
    func: ConverterFn,
}

impl Converter {
    /// Run the conversion
    ///
    /// # Errors
    ///
    /// Returns whatever error the converter function raises.
    pub fn convert(&self, value: &Value) -> crate::Result<Value> {
        (self.func)(value)
    }

    fn is_pair(&self, source: &str, destination: &str) -> bool {
        self.source.name() == source && self.destination.name() == destination
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("source", &self.source.name())
            .field("destination", &self.destination.name())
            .finish_non_exhaustive()
    }
}

/// Ordered set of custom converters
#[derive(Debug, Default, Clone)]
pub struct ConverterRegistry {
    entries: Vec<Converter>,
}

impl ConverterRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter for a type pair
    ///
    /// Re-registering a pair replaces the function but keeps its position.
    pub fn register(
        &mut self,
        source: &TypeRef,
        destination: &TypeRef,
        func: impl Fn(&Value) -> crate::Result<Value> + Send + Sync + 'static,
    ) -> &mut Self {
        let converter = Converter {
            source: source.clone(),
            destination: destination.clone(),
            func: Arc::new(func),
        };

        match self
            .entries
            .iter_mut()
            .find(|entry| entry.is_pair(source.name(), destination.name()))
        {
            Some(existing) => *existing = converter,
            None => self.entries.push(converter),
        }
        self
    }

    /// Find the converter that applies to `value` and `destination`
    #[must_use]
    pub fn resolve(&self, value: &Value, destination: &TypeRef) -> Option<&Converter> {
        let runtime = value.runtime_type()?;

        if let Some(exact) = self
            .entries
            .iter()
            .find(|entry| entry.is_pair(runtime.name(), destination.name()))
        {
            return Some(exact);
        }

        self.entries.iter().find(|entry| {
            entry.destination.name() == destination.name() && runtime.derives_from(&entry.source)
        })
    }

    /// Convert `value` with the applicable converter, if any
    ///
    /// `None` means no converter applies; `Some(Err(..))` means the
    /// converter ran and failed.
    pub fn try_resolve(
        &self,
        value: &Value,
        destination: &TypeRef,
    ) -> Option<crate::Result<Value>> {
        let converter = self.resolve(value, destination)?;
        tracing::trace!(
            source = converter.source.name(),
            destination = converter.destination.name(),
            "Applying custom converter"
        );
        Some(converter.convert(value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objmap_ir::{ObjectRef, ScalarKind, TypeBuilder, TypeDescriptor};

    fn string() -> TypeRef {
        TypeDescriptor::scalar(ScalarKind::String)
    }

    #[test]
    fn test_exact_pair_resolves() {
        let mut registry = ConverterRegistry::new();
        registry.register(
            &TypeDescriptor::scalar(ScalarKind::Int32),
            &string(),
            |value| match value {
                Value::Int32(i) => Ok(Value::String(format!("#{i}"))),
                _ => Err(crate::Error::custom("not an int")),
            },
        );

        let result = registry.try_resolve(&Value::Int32(7), &string()).unwrap();
        assert_eq!(result.unwrap(), Value::from("#7"));
        assert!(registry.try_resolve(&Value::Int64(7), &string()).is_none());
        assert!(registry.try_resolve(&Value::Null, &string()).is_none());
    }

    #[test]
    fn test_base_type_fallback() {
        let shape = TypeBuilder::object("Shape").build();
        let circle = TypeBuilder::object("Circle").extends(&shape).build();

        let mut registry = ConverterRegistry::new();
        registry.register(&shape, &string(), |_| Ok(Value::from("shape")));

        let value = Value::Object(ObjectRef::new(&circle).unwrap());
        let result = registry.try_resolve(&value, &string()).unwrap();
        assert_eq!(result.unwrap(), Value::from("shape"));
    }

    #[test]
    fn test_exact_beats_earlier_base_entry() {
        let shape = TypeBuilder::object("Shape").build();
        let circle = TypeBuilder::object("Circle").extends(&shape).build();

        let mut registry = ConverterRegistry::new();
        registry
            .register(&shape, &string(), |_| Ok(Value::from("shape")))
            .register(&circle, &string(), |_| Ok(Value::from("circle")));

        let value = Value::Object(ObjectRef::new(&circle).unwrap());
        let result = registry.try_resolve(&value, &string()).unwrap();
        assert_eq!(result.unwrap(), Value::from("circle"));
    }

    #[test]
    fn test_first_registered_base_wins() {
        let entity = TypeBuilder::object("Entity").build();
        let shape = TypeBuilder::object("Shape").extends(&entity).build();
        let circle = TypeBuilder::object("Circle").extends(&shape).build();

        let mut registry = ConverterRegistry::new();
        registry
            .register(&entity, &string(), |_| Ok(Value::from("entity")))
            .register(&shape, &string(), |_| Ok(Value::from("shape")));

        let value = Value::Object(ObjectRef::new(&circle).unwrap());
        let result = registry.try_resolve(&value, &string()).unwrap();
        assert_eq!(result.unwrap(), Value::from("entity"));
    }

    #[test]
    fn test_reregistering_replaces_in_place() {
        let int = TypeDescriptor::scalar(ScalarKind::Int32);
        let mut registry = ConverterRegistry::new();
        registry
            .register(&int, &string(), |_| Ok(Value::from("old")))
            .register(&int, &string(), |_| Ok(Value::from("new")));

        assert_eq!(registry.len(), 1);
        let result = registry.try_resolve(&Value::Int32(1), &string()).unwrap();
        assert_eq!(result.unwrap(), Value::from("new"));
    }
}
