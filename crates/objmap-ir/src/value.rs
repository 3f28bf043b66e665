//! Dynamic values
//!
//! Objects and sequences are shared handles: cloning a [`Value`] that holds
//! one clones the handle, not the contents, so reference identity survives
//! and graphs may contain cycles.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::types::{ScalarKind, SequenceShape, TypeDescriptor, TypeKind, TypeRef};
use crate::{Error, Result};

/// Values that can flow through a mapping
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value
    Null,

    Bool(bool),

    Int32(i32),

    Int64(i64),

    Float(f64),

    /// Decimal value
    Decimal(f64),

    String(String),

    Guid(Uuid),

    DateTime(NaiveDateTime),

    Date(NaiveDate),

    Duration(TimeDelta),

    Enum(EnumValue),

    /// Shared object handle
    Object(ObjectRef),

    /// Shared sequence handle
    Sequence(SequenceRef),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Scalar kind of this value, if it is a scalar
    #[must_use]
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            Value::Bool(_) => Some(ScalarKind::Bool),
            Value::Int32(_) => Some(ScalarKind::Int32),
            Value::Int64(_) => Some(ScalarKind::Int64),
            Value::Float(_) => Some(ScalarKind::Float64),
            Value::Decimal(_) => Some(ScalarKind::Decimal),
            Value::String(_) => Some(ScalarKind::String),
            Value::Guid(_) => Some(ScalarKind::Guid),
            Value::DateTime(_) => Some(ScalarKind::DateTime),
            Value::Date(_) => Some(ScalarKind::Date),
            Value::Duration(_) => Some(ScalarKind::Duration),
            Value::Null | Value::Enum(_) | Value::Object(_) | Value::Sequence(_) => None,
        }
    }

    /// Runtime type; `None` for `Null`
    #[must_use]
    pub fn runtime_type(&self) -> Option<TypeRef> {
        match self {
            Value::Null => None,
            Value::Enum(value) => Some(value.ty.clone()),
            Value::Object(object) => Some(object.type_ref()),
            Value::Sequence(sequence) => Some(sequence.type_ref()),
            scalar => scalar.scalar_kind().map(TypeDescriptor::scalar),
        }
    }

    /// Runtime type name, `"null"` for `Null`
    #[must_use]
    pub fn type_name(&self) -> String {
        self.runtime_type()
            .map_or_else(|| "null".to_string(), |ty| ty.name().to_string())
    }

    /// Simple values are scalars and enum constants
    #[must_use]
    pub fn is_simple(&self) -> bool {
        self.scalar_kind().is_some() || matches!(self, Value::Enum(_))
    }

    /// Culture-invariant text form; `None` for `Null`
    #[must_use]
    pub fn to_invariant_string(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int32(i) => Some(i.to_string()),
            Value::Int64(i) => Some(i.to_string()),
            Value::Float(f) | Value::Decimal(f) => Some(f.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Guid(g) => Some(g.hyphenated().to_string()),
            Value::DateTime(dt) => Some(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Value::Duration(td) => Some(format_duration(*td)),
            Value::Enum(value) => Some(
                value
                    .name()
                    .map_or_else(|| value.value.to_string(), str::to_string),
            ),
            Value::Object(object) => Some(object.type_ref().name().to_string()),
            Value::Sequence(sequence) => Some(sequence.type_ref().name().to_string()),
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sequence(&self) -> Option<&SequenceRef> {
        match self {
            Value::Sequence(sequence) => Some(sequence),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Render as `[-][d.]hh:mm:ss[.fffffff]`
fn format_duration(delta: TimeDelta) -> String {
    let sign = if delta < TimeDelta::zero() { "-" } else { "" };
    let delta = delta.abs();
    let days = delta.num_days();
    let hours = delta.num_hours() % 24;
    let minutes = delta.num_minutes() % 60;
    let seconds = delta.num_seconds() % 60;
    let ticks = delta.subsec_nanos() / 100;

    let mut out = String::from(sign);
    if days > 0 {
        out.push_str(&format!("{days}."));
    }
    out.push_str(&format!("{hours:02}:{minutes:02}:{seconds:02}"));
    if ticks > 0 {
        out.push_str(&format!(".{ticks:07}"));
    }
    out
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float(a), Value::Float(b)) | (Value::Decimal(a), Value::Decimal(b)) => {
                a == b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Guid(a), Value::Guid(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Sequence(a), Value::Sequence(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Bool,
    i32 => Int32,
    i64 => Int64,
    f64 => Float,
    String => String,
    Uuid => Guid,
    NaiveDateTime => DateTime,
    NaiveDate => Date,
    TimeDelta => Duration,
    EnumValue => Enum,
    ObjectRef => Object,
    SequenceRef => Sequence,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// An enum constant tagged with its enum type
#[derive(Clone)]
pub struct EnumValue {
    ty: TypeRef,
    value: i64,
}

impl EnumValue {
    pub fn new(ty: &TypeRef, value: i64) -> Self {
        Self {
            ty: ty.clone(),
            value,
        }
    }

    /// Constant named `name` (ignoring case) of enum type `ty`
    ///
    /// # Errors
    ///
    /// Returns an error if `ty` is not an enum or declares no such variant.
    pub fn named(ty: &TypeRef, name: &str) -> Result<Self> {
        let desc = ty
            .as_enum()
            .ok_or_else(|| Error::type_mismatch("enum", ty.name()))?;
        let value = desc
            .value_of(name)
            .ok_or_else(|| Error::member_not_found(ty.name(), name))?;
        Ok(Self::new(ty, value))
    }

    #[must_use]
    pub fn type_ref(&self) -> &TypeRef {
        &self.ty
    }

    /// Underlying integral value
    #[must_use]
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Declared name of this constant
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.ty.as_enum().and_then(|desc| desc.name_of(self.value))
    }
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        self.ty.name() == other.ty.name() && self.value == other.value
    }
}

impl fmt::Debug for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}::{}", self.ty.name(), name),
            None => write!(f, "{}({})", self.ty.name(), self.value),
        }
    }
}

struct Object {
    ty: TypeRef,
    fields: Vec<Value>,
}

/// Shared, lockable object instance
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<Object>>);

impl ObjectRef {
    /// Allocate an instance of `ty` with every member at its zero value
    ///
    /// # Errors
    ///
    /// Returns an error if `ty` is not an object type.
    pub fn new(ty: &TypeRef) -> Result<Self> {
        let desc = ty
            .as_object()
            .ok_or_else(|| Error::type_mismatch("object", ty.name()))?;
        let fields = desc.members().iter().map(|m| m.ty.zero_value()).collect();
        Ok(Self(Arc::new(RwLock::new(Object {
            ty: ty.clone(),
            fields,
        }))))
    }

    /// Set a member and return the handle, for building instances inline
    ///
    /// # Errors
    ///
    /// Returns an error if the type has no member called `name`.
    pub fn with(self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    #[must_use]
    pub fn type_ref(&self) -> TypeRef {
        self.0.read().ty.clone()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        let ty = self.type_ref();
        ty.as_object()
            .and_then(|desc| desc.member_index(name))
            .ok_or_else(|| Error::member_not_found(ty.name(), name))
    }

    /// Read a member by exact name
    ///
    /// # Errors
    ///
    /// Returns an error if the type has no member called `name`.
    pub fn get(&self, name: &str) -> Result<Value> {
        let index = self.index_of(name)?;
        self.get_at(index)
    }

    /// Write a member by exact name
    ///
    /// # Errors
    ///
    /// Returns an error if the type has no member called `name`.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let index = self.index_of(name)?;
        self.set_at(index, value.into())
    }

    /// Read the member at a descriptor position
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range.
    pub fn get_at(&self, index: usize) -> Result<Value> {
        let object = self.0.read();
        object
            .fields
            .get(index)
            .cloned()
            .ok_or_else(|| Error::member_not_found(object.ty.name(), format!("#{index}")))
    }

    /// Write the member at a descriptor position
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range.
    pub fn set_at(&self, index: usize, value: Value) -> Result<()> {
        let mut object = self.0.write();
        let type_name = object.ty.name().to_string();
        let slot = object
            .fields
            .get_mut(index)
            .ok_or_else(|| Error::member_not_found(type_name, format!("#{index}")))?;
        *slot = value;
        Ok(())
    }

    /// Copy of every member value in descriptor order
    #[must_use]
    pub fn snapshot(&self) -> Vec<Value> {
        self.0.read().fields.clone()
    }

    /// Address-based identity of the shared instance
    #[must_use]
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({}@{:#x})", self.type_ref().name(), self.identity())
    }
}

struct Sequence {
    ty: TypeRef,
    items: Vec<Value>,
}

/// Shared, lockable sequence instance
#[derive(Clone)]
pub struct SequenceRef(Arc<RwLock<Sequence>>);

impl SequenceRef {
    /// Allocate a sequence of type `ty` holding `items`
    ///
    /// # Errors
    ///
    /// Returns an error if `ty` is not a sequence type.
    pub fn new(ty: &TypeRef, items: Vec<Value>) -> Result<Self> {
        match ty.kind() {
            TypeKind::Sequence { .. } => Ok(Self::from_parts(ty.clone(), items)),
            _ => Err(Error::type_mismatch("sequence", ty.name())),
        }
    }

    /// New array over `element`
    #[must_use]
    pub fn array(element: &TypeRef, items: Vec<Value>) -> Self {
        Self::from_parts(
            TypeDescriptor::sequence(SequenceShape::Array, element),
            items,
        )
    }

    /// New list over `element`
    #[must_use]
    pub fn list(element: &TypeRef, items: Vec<Value>) -> Self {
        Self::from_parts(
            TypeDescriptor::sequence(SequenceShape::List, element),
            items,
        )
    }

    fn from_parts(ty: TypeRef, items: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(Sequence { ty, items })))
    }

    #[must_use]
    pub fn type_ref(&self) -> TypeRef {
        self.0.read().ty.clone()
    }

    #[must_use]
    pub fn shape(&self) -> SequenceShape {
        self.0
            .read()
            .ty
            .sequence_parts()
            .map_or(SequenceShape::Enumerable, |(shape, _)| shape)
    }

    #[must_use]
    pub fn element_type(&self) -> TypeRef {
        let sequence = self.0.read();
        sequence
            .ty
            .sequence_parts()
            .map_or_else(TypeDescriptor::any, |(_, element)| element.clone())
    }

    /// Copy of the items in order
    #[must_use]
    pub fn items(&self) -> Vec<Value> {
        self.0.read().items.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.read().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an item
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence shape does not support appending.
    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        let mut sequence = self.0.write();
        let can_append = sequence
            .ty
            .sequence_parts()
            .is_some_and(|(shape, _)| shape.can_append());
        if !can_append {
            return Err(Error::unsupported(sequence.ty.name(), "append"));
        }
        sequence.items.push(value.into());
        Ok(())
    }

    /// Remove every item
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence shape does not support clearing.
    pub fn clear(&self) -> Result<()> {
        let mut sequence = self.0.write();
        let can_clear = sequence
            .ty
            .sequence_parts()
            .is_some_and(|(shape, _)| shape.can_clear());
        if !can_clear {
            return Err(Error::unsupported(sequence.ty.name(), "clear"));
        }
        sequence.items.clear();
        Ok(())
    }

    #[must_use]
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &SequenceRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SequenceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sequence = self.0.read();
        write!(f, "SequenceRef({}, len={})", sequence.ty.name(), sequence.items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeBuilder;

    fn person_type() -> TypeRef {
        TypeBuilder::object("Person")
            .property("Name", &TypeDescriptor::scalar(ScalarKind::String))
            .property("Age", &TypeDescriptor::scalar(ScalarKind::Int32))
            .build()
    }

    #[test]
    fn test_new_object_has_zero_values() {
        let person = ObjectRef::new(&person_type()).unwrap();
        assert_eq!(person.get("Name").unwrap(), Value::Null);
        assert_eq!(person.get("Age").unwrap(), Value::Int32(0));
    }

    #[test]
    fn test_object_get_set() {
        let person = ObjectRef::new(&person_type())
            .unwrap()
            .with("Name", "Ada")
            .unwrap();
        person.set("Age", 36).unwrap();

        assert_eq!(person.get("Name").unwrap(), Value::from("Ada"));
        assert_eq!(person.get("Age").unwrap(), Value::Int32(36));
        assert!(matches!(
            person.get("Missing"),
            Err(Error::MemberNotFound { .. })
        ));
    }

    #[test]
    fn test_object_equality_is_identity() {
        let ty = person_type();
        let a = ObjectRef::new(&ty).unwrap();
        let b = ObjectRef::new(&ty).unwrap();
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn test_non_object_type_rejected() {
        let result = ObjectRef::new(&TypeDescriptor::scalar(ScalarKind::Int32));
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_sequence_capabilities() {
        let int = TypeDescriptor::scalar(ScalarKind::Int32);
        let list = SequenceRef::list(&int, vec![Value::Int32(1)]);
        list.push(2).unwrap();
        assert_eq!(list.len(), 2);
        list.clear().unwrap();
        assert!(list.is_empty());

        let array = SequenceRef::array(&int, vec![Value::Int32(1)]);
        assert!(array.push(2).is_err());
        assert!(array.clear().is_err());

        let bag_ty = TypeDescriptor::sequence(SequenceShape::AppendOnly, &int);
        let bag = SequenceRef::new(&bag_ty, Vec::new()).unwrap();
        bag.push(1).unwrap();
        assert!(bag.clear().is_err());
    }

    #[test]
    fn test_invariant_strings() {
        assert_eq!(Value::Bool(true).to_invariant_string().unwrap(), "true");
        assert_eq!(Value::Decimal(1234.56).to_invariant_string().unwrap(), "1234.56");
        assert_eq!(
            Value::Duration(TimeDelta::hours(26) + TimeDelta::minutes(5))
                .to_invariant_string()
                .unwrap(),
            "1.02:05:00"
        );
        assert_eq!(
            Value::Duration(-TimeDelta::milliseconds(1500))
                .to_invariant_string()
                .unwrap(),
            "-00:00:01.5000000"
        );
        assert!(Value::Null.to_invariant_string().is_none());
    }

    #[test]
    fn test_runtime_type_names() {
        assert_eq!(Value::Int64(1).type_name(), "i64");
        assert_eq!(Value::Null.type_name(), "null");
        let person = ObjectRef::new(&person_type()).unwrap();
        assert_eq!(Value::Object(person).type_name(), "Person");
    }
}
