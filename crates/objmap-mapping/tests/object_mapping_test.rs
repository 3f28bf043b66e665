//! Integration test: object graph mapping
//!
//! Covers null handling, mapping into existing instances, cyclic and shared
//! references, member name matching, and concurrent use of one mapper.

use std::sync::Arc;

use objmap_ir::{
    ObjectRef, ParamDescriptor, ScalarKind, TypeBuilder, TypeDescriptor, TypeRef, Value,
};
use objmap_mapping::{Mapper, MappingOptions, TypeMapCache};

fn string() -> TypeRef {
    TypeDescriptor::scalar(ScalarKind::String)
}

fn int() -> TypeRef {
    TypeDescriptor::scalar(ScalarKind::Int32)
}

struct Fixture {
    address: TypeRef,
    address_dto: TypeRef,
    person: TypeRef,
    person_dto: TypeRef,
}

fn fixture() -> Fixture {
    let address = TypeBuilder::object("Address")
        .property("Street", &string())
        .property("City", &string())
        .build();
    let address_dto = TypeBuilder::object("AddressDto")
        .property("Street", &string())
        .property("City", &string())
        .build();
    let person = TypeBuilder::object("Person")
        .property("Name", &string())
        .property("Age", &int())
        .property("Home", &address)
        .build();
    let person_dto = TypeBuilder::object("PersonDto")
        .property("Name", &string())
        .property("Age", &int())
        .property("Home", &address_dto)
        .build();

    Fixture {
        address,
        address_dto,
        person,
        person_dto,
    }
}

fn ada(f: &Fixture) -> ObjectRef {
    let home = ObjectRef::new(&f.address)
        .unwrap()
        .with("Street", "12 Analytical Row")
        .unwrap()
        .with("City", "London")
        .unwrap();
    ObjectRef::new(&f.person)
        .unwrap()
        .with("Name", "Ada")
        .unwrap()
        .with("Age", 36)
        .unwrap()
        .with("Home", home)
        .unwrap()
}

#[test]
fn test_map_nested_objects() -> anyhow::Result<()> {
    let f = fixture();
    let source = ada(&f);

    let mapped = Mapper::new().map_to_type(
        &Value::Object(source.clone()),
        &f.person_dto,
        &MappingOptions::default(),
    )?;

    let dto = mapped.as_object().expect("object");
    assert_eq!(dto.type_ref().name(), "PersonDto");
    assert_eq!(dto.get("Name")?, Value::from("Ada"));
    assert_eq!(dto.get("Age")?, Value::Int32(36));

    let home = dto.get("Home")?;
    let home = home.as_object().expect("nested object");
    assert_eq!(home.type_ref().name(), "AddressDto");
    assert_eq!(home.get("City")?, Value::from("London"));
    assert!(!home.ptr_eq(source.get("Home")?.as_object().unwrap()));
    Ok(())
}

#[test]
fn test_null_source_yields_zero_value() {
    let f = fixture();
    let mapper = Mapper::new();
    let options = MappingOptions::default();

    assert_eq!(
        mapper.map_to_type(&Value::Null, &f.person_dto, &options).unwrap(),
        Value::Null
    );
    assert_eq!(
        mapper.map_to_type(&Value::Null, &int(), &options).unwrap(),
        Value::Int32(0)
    );
}

#[test]
fn test_map_into_with_null_source_leaves_destination_untouched() {
    let f = fixture();
    let existing = ObjectRef::new(&f.person_dto)
        .unwrap()
        .with("Name", "Keep")
        .unwrap();

    let result = Mapper::new()
        .map_into(&Value::Null, &existing, &MappingOptions::default())
        .unwrap();

    assert!(result.ptr_eq(&existing));
    assert_eq!(existing.get("Name").unwrap(), Value::from("Keep"));
}

#[test]
fn test_map_into_updates_in_place_and_reuses_nested_objects() {
    let f = fixture();
    let source = ada(&f);
    let nested = ObjectRef::new(&f.address_dto)
        .unwrap()
        .with("Street", "old street")
        .unwrap();
    let existing = ObjectRef::new(&f.person_dto)
        .unwrap()
        .with("Home", nested.clone())
        .unwrap();

    let result = Mapper::new()
        .map_into(&Value::Object(source), &existing, &MappingOptions::default())
        .unwrap();

    assert!(result.ptr_eq(&existing));
    assert_eq!(existing.get("Name").unwrap(), Value::from("Ada"));
    let home = existing.get("Home").unwrap();
    assert!(home.as_object().unwrap().ptr_eq(&nested));
    assert_eq!(nested.get("Street").unwrap(), Value::from("12 Analytical Row"));
}

#[test]
fn test_assignable_source_is_not_copied() {
    let f = fixture();
    let source = ada(&f);
    let mapped = Mapper::new()
        .map_to_type(
            &Value::Object(source.clone()),
            &f.person,
            &MappingOptions::default(),
        )
        .unwrap();
    assert!(mapped.as_object().unwrap().ptr_eq(&source));
}

fn node_types() -> (TypeRef, TypeRef) {
    let node = TypeDescriptor::declare("Node");
    TypeBuilder::object("Node")
        .property("Name", &string())
        .property("Next", &node)
        .define(&node)
        .unwrap();
    let node_dto = TypeDescriptor::declare("NodeDto");
    TypeBuilder::object("NodeDto")
        .property("Name", &string())
        .property("Next", &node_dto)
        .define(&node_dto)
        .unwrap();
    (node, node_dto)
}

#[test]
fn test_cyclic_graph_terminates_and_keeps_identity() {
    let (node, node_dto) = node_types();
    let a = ObjectRef::new(&node).unwrap().with("Name", "A").unwrap();
    let b = ObjectRef::new(&node).unwrap().with("Name", "B").unwrap();
    a.set("Next", b.clone()).unwrap();
    b.set("Next", a.clone()).unwrap();

    let mapped = Mapper::new()
        .map_to_type(&Value::Object(a), &node_dto, &MappingOptions::default())
        .unwrap();

    let a_dto = mapped.as_object().unwrap().clone();
    let b_dto = a_dto.get("Next").unwrap().as_object().unwrap().clone();
    let back = b_dto.get("Next").unwrap().as_object().unwrap().clone();

    assert_eq!(b_dto.get("Name").unwrap(), Value::from("B"));
    assert!(back.ptr_eq(&a_dto));
}

#[test]
fn test_self_reference() {
    let (node, node_dto) = node_types();
    let a = ObjectRef::new(&node).unwrap().with("Name", "loop").unwrap();
    a.set("Next", a.clone()).unwrap();

    let mapped = Mapper::new()
        .map_to_type(&Value::Object(a), &node_dto, &MappingOptions::default())
        .unwrap();
    let dto = mapped.as_object().unwrap();
    assert!(dto.get("Next").unwrap().as_object().unwrap().ptr_eq(dto));
}

#[test]
fn test_shared_reference_maps_to_shared_destination() {
    let f = fixture();
    let couple = TypeBuilder::object("Couple")
        .property("First", &f.person)
        .property("Second", &f.person)
        .build();
    let couple_dto = TypeBuilder::object("CoupleDto")
        .property("First", &f.person_dto)
        .property("Second", &f.person_dto)
        .build();

    let shared = ada(&f);
    let source = ObjectRef::new(&couple)
        .unwrap()
        .with("First", shared.clone())
        .unwrap()
        .with("Second", shared)
        .unwrap();

    let mapped = Mapper::new()
        .map_to_type(&Value::Object(source), &couple_dto, &MappingOptions::default())
        .unwrap();
    let dto = mapped.as_object().unwrap();
    assert_eq!(dto.get("First").unwrap(), dto.get("Second").unwrap());
}

#[test]
fn test_case_sensitivity() {
    let source_type = TypeBuilder::object("JsonUser")
        .property("firstName", &string())
        .build();
    let dest_type = TypeBuilder::object("User")
        .property("FirstName", &string())
        .build();
    let source = Value::Object(
        ObjectRef::new(&source_type)
            .unwrap()
            .with("firstName", "Grace")
            .unwrap(),
    );
    let mapper = Mapper::new();

    let lenient = mapper
        .map_to_type(&source, &dest_type, &MappingOptions::default())
        .unwrap();
    assert_eq!(
        lenient.as_object().unwrap().get("FirstName").unwrap(),
        Value::from("Grace")
    );

    let mut options = MappingOptions::new();
    options.case_sensitive(true);
    let strict = mapper.map_to_type(&source, &dest_type, &options).unwrap();
    assert_eq!(
        strict.as_object().unwrap().get("FirstName").unwrap(),
        Value::Null
    );
}

#[test]
fn test_ignored_members_are_never_written() {
    let f = fixture();
    let mut options = MappingOptions::new();
    options.ignore("age");

    let existing = ObjectRef::new(&f.person_dto)
        .unwrap()
        .with("Age", 99)
        .unwrap();
    Mapper::new()
        .map_into(&Value::Object(ada(&f)), &existing, &options)
        .unwrap();

    assert_eq!(existing.get("Age").unwrap(), Value::Int32(99));
    assert_eq!(existing.get("Name").unwrap(), Value::from("Ada"));
}

#[test]
fn test_null_source_members() {
    let f = fixture();
    let source = ObjectRef::new(&f.person).unwrap().with("Age", 5).unwrap();
    let existing = || {
        ObjectRef::new(&f.person_dto)
            .unwrap()
            .with("Name", "Existing")
            .unwrap()
    };
    let mapper = Mapper::new();

    let overwritten = existing();
    mapper
        .map_into(
            &Value::Object(source.clone()),
            &overwritten,
            &MappingOptions::default(),
        )
        .unwrap();
    assert_eq!(overwritten.get("Name").unwrap(), Value::Null);

    let mut options = MappingOptions::new();
    options.ignore_null_source_values(true);
    let kept = existing();
    mapper
        .map_into(&Value::Object(source), &kept, &options)
        .unwrap();
    assert_eq!(kept.get("Name").unwrap(), Value::from("Existing"));
    assert_eq!(kept.get("Age").unwrap(), Value::Int32(5));
}

#[test]
fn test_record_destination_built_through_constructor() {
    let f = fixture();
    let summary = TypeBuilder::object("PersonSummary")
        .read_only("Name", &string())
        .read_only("Age", &TypeDescriptor::scalar(ScalarKind::Int64))
        .property("Note", &string())
        .constructor(vec![ParamDescriptor::new("name", &string())])
        .constructor(vec![
            ParamDescriptor::new("name", &string()),
            ParamDescriptor::new("age", &TypeDescriptor::scalar(ScalarKind::Int64)),
        ])
        .private_constructor(Vec::new())
        .build();

    let mapped = Mapper::new()
        .map_to_type(&Value::Object(ada(&f)), &summary, &MappingOptions::default())
        .unwrap();
    let record = mapped.as_object().unwrap();
    assert_eq!(record.get("Name").unwrap(), Value::from("Ada"));
    // Age is read-only, so only the two-parameter constructor can set it
    assert_eq!(record.get("Age").unwrap(), Value::Int64(36));
}

#[test]
fn test_typed_entry_point() {
    let mapper = Mapper::new();
    let options = MappingOptions::default();

    let number: Option<i64> = mapper.map(&Value::from("1,024"), &options).unwrap();
    assert_eq!(number, Some(1024));

    let text: Option<String> = mapper.map(&Value::Int32(7), &options).unwrap();
    assert_eq!(text.as_deref(), Some("7"));

    let maybe: Option<Option<i32>> = mapper.map(&Value::Null, &options).unwrap();
    assert_eq!(maybe, None);
}

#[test]
fn test_mapper_shared_across_threads() {
    let f = Arc::new(fixture());
    let cache = Arc::new(TypeMapCache::new());
    let mapper = Mapper::with_cache(Arc::clone(&cache));
    let options = MappingOptions::default();

    std::thread::scope(|scope| {
        for i in 0..8 {
            let f = Arc::clone(&f);
            let mapper = &mapper;
            let options = &options;
            scope.spawn(move || {
                let source = ada(&f);
                source.set("Age", i).unwrap();
                let mapped = mapper
                    .map_to_type(&Value::Object(source), &f.person_dto, options)
                    .unwrap();
                assert_eq!(
                    mapped.as_object().unwrap().get("Age").unwrap(),
                    Value::Int32(i)
                );
            });
        }
    });

    // Person -> PersonDto and Address -> AddressDto
    assert_eq!(cache.len(), 2);
}
