//! Cycle guard
//!
//! Remembers which destination instance was produced for each source object
//! during one top-level mapping call. Revisiting a source returns the same
//! destination, which both terminates cyclic graphs and keeps shared
//! references shared in the output.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]; the lookup table
//! maps source identities to arena slots. Each slot keeps its source handle
//! alive so an identity cannot be reused by a new allocation mid-call.

use std::collections::{HashMap, HashSet};

use objmap_ir::{ObjectRef, TypeDescriptor, Value};

/// Index of a registered source/destination pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Identity of a source object paired with the destination type it maps to
type GuardKey = (usize, String);

#[derive(Debug)]
struct Node {
    // Held only to pin the source's address for the lifetime of the guard
    _source: ObjectRef,
    destination: Value,
}

/// Per-call registry of source identity to destination instance
#[derive(Debug, Default)]
pub struct CycleGuard {
    index: HashMap<GuardKey, NodeId>,
    nodes: Vec<Node>,
    pending: HashSet<GuardKey>,
}

impl CycleGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(source: &ObjectRef, destination: &TypeDescriptor) -> GuardKey {
        (source.identity(), destination.name().to_string())
    }

    /// Destination already produced for `source` as `destination`
    #[must_use]
    pub fn lookup(&self, source: &ObjectRef, destination: &TypeDescriptor) -> Option<&Value> {
        self.index
            .get(&Self::key(source, destination))
            .map(|id| &self.nodes[id.0].destination)
    }

    /// Record the destination produced for `source`
    ///
    /// Registering the same pair twice keeps the first destination.
    pub fn register(
        &mut self,
        source: &ObjectRef,
        destination_type: &TypeDescriptor,
        destination: Value,
    ) -> NodeId {
        let key = Self::key(source, destination_type);
        self.pending.remove(&key);
        if let Some(id) = self.index.get(&key) {
            return *id;
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            _source: source.clone(),
            destination,
        });
        self.index.insert(key, id);
        id
    }

    /// Mark `source` as being constructed; `false` if it already is
    pub fn begin_construction(&mut self, source: &ObjectRef, destination: &TypeDescriptor) -> bool {
        self.pending.insert(Self::key(source, destination))
    }

    /// Clear a construction mark left by a failed construction
    pub fn abandon_construction(&mut self, source: &ObjectRef, destination: &TypeDescriptor) {
        self.pending.remove(&Self::key(source, destination));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objmap_ir::{ScalarKind, TypeBuilder, TypeRef};

    fn node_type() -> TypeRef {
        TypeBuilder::object("Node")
            .property("Id", &TypeDescriptor::scalar(ScalarKind::Int32))
            .build()
    }

    fn dto_type() -> TypeRef {
        TypeBuilder::object("NodeDto")
            .property("Id", &TypeDescriptor::scalar(ScalarKind::Int32))
            .build()
    }

    #[test]
    fn test_lookup_by_identity() {
        let ty = node_type();
        let dto = dto_type();
        let source = ObjectRef::new(&ty).unwrap();
        let twin = ObjectRef::new(&ty).unwrap();
        let target = Value::Object(ObjectRef::new(&dto).unwrap());

        let mut guard = CycleGuard::new();
        assert!(guard.lookup(&source, &dto).is_none());

        guard.register(&source, &dto, target.clone());
        assert_eq!(guard.lookup(&source, &dto), Some(&target));
        assert_eq!(guard.lookup(&source.clone(), &dto), Some(&target));
        // Structurally equal but distinct instance
        assert!(guard.lookup(&twin, &dto).is_none());
    }

    #[test]
    fn test_destination_type_is_part_of_the_key() {
        let ty = node_type();
        let source = ObjectRef::new(&ty).unwrap();
        let mut guard = CycleGuard::new();
        guard.register(
            &source,
            &dto_type(),
            Value::Object(ObjectRef::new(&dto_type()).unwrap()),
        );
        assert!(guard.lookup(&source, &ty).is_none());
    }

    #[test]
    fn test_register_twice_keeps_first() {
        let ty = node_type();
        let dto = dto_type();
        let source = ObjectRef::new(&ty).unwrap();
        let first = Value::Object(ObjectRef::new(&dto).unwrap());
        let second = Value::Object(ObjectRef::new(&dto).unwrap());

        let mut guard = CycleGuard::new();
        let a = guard.register(&source, &dto, first.clone());
        let b = guard.register(&source, &dto, second);
        assert_eq!(a, b);
        assert_eq!(guard.len(), 1);
        assert_eq!(guard.lookup(&source, &dto), Some(&first));
    }

    #[test]
    fn test_construction_marks() {
        let ty = node_type();
        let dto = dto_type();
        let source = ObjectRef::new(&ty).unwrap();

        let mut guard = CycleGuard::new();
        assert!(guard.begin_construction(&source, &dto));
        assert!(!guard.begin_construction(&source, &dto));
        guard.abandon_construction(&source, &dto);
        assert!(guard.begin_construction(&source, &dto));
        guard.register(&source, &dto, Value::Null);
        assert!(guard.begin_construction(&source, &dto));
    }
}
