//! Runtime type descriptors
//!
//! A descriptor table stands in for reflection: each type that takes part in
//! mapping declares its members, constructors and base type once. Object
//! types can be declared before they are defined so that self-referential and
//! mutually referential graphs can be described.

use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use uuid::Uuid;

use crate::value::{EnumValue, ObjectRef, Value};
use crate::{Error, Result};

/// Shared handle to a type descriptor
pub type TypeRef = Arc<TypeDescriptor>;

/// Factory invoked with constructor arguments in parameter order
pub type ConstructorFn = Arc<dyn Fn(&[Value]) -> Result<ObjectRef> + Send + Sync>;

/// Built-in scalar representations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int32,
    Int64,
    Float64,
    Decimal,
    String,
    Guid,
    DateTime,
    Date,
    Duration,
}

impl ScalarKind {
    /// Every scalar kind, in declaration order
    pub const ALL: [ScalarKind; 10] = [
        ScalarKind::Bool,
        ScalarKind::Int32,
        ScalarKind::Int64,
        ScalarKind::Float64,
        ScalarKind::Decimal,
        ScalarKind::String,
        ScalarKind::Guid,
        ScalarKind::DateTime,
        ScalarKind::Date,
        ScalarKind::Duration,
    ];

    /// Name used as the type identity of this scalar
    #[must_use]
    pub fn type_name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int32 => "i32",
            ScalarKind::Int64 => "i64",
            ScalarKind::Float64 => "f64",
            ScalarKind::Decimal => "decimal",
            ScalarKind::String => "string",
            ScalarKind::Guid => "guid",
            ScalarKind::DateTime => "datetime",
            ScalarKind::Date => "date",
            ScalarKind::Duration => "duration",
        }
    }
}

/// Shape of a sequence type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceShape {
    /// Fixed-size array
    Array,

    /// Growable list supporting clear and append
    List,

    /// Collection that accepts appends but cannot be cleared
    AppendOnly,

    /// Read-only view over any sequence of the same element type
    Enumerable,
}

impl SequenceShape {
    #[must_use]
    pub fn can_clear(self) -> bool {
        matches!(self, SequenceShape::List)
    }

    #[must_use]
    pub fn can_append(self) -> bool {
        matches!(self, SequenceShape::List | SequenceShape::AppendOnly)
    }

    /// Type name of a sequence of this shape over `element`
    #[must_use]
    pub fn type_name(self, element: &str) -> String {
        match self {
            SequenceShape::Array => format!("{element}[]"),
            SequenceShape::List => format!("List<{element}>"),
            SequenceShape::AppendOnly => format!("AppendOnly<{element}>"),
            SequenceShape::Enumerable => format!("Enumerable<{element}>"),
        }
    }
}

/// Named integral constants of an enum type
#[derive(Debug, Clone)]
pub struct EnumDescriptor {
    variants: Vec<(String, i64)>,
}

impl EnumDescriptor {
    /// Declared variants in declaration order
    #[must_use]
    pub fn variants(&self) -> &[(String, i64)] {
        &self.variants
    }

    /// Look a variant up by name, ignoring case
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(variant, _)| variant.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }

    /// Name of the variant carrying `value`
    #[must_use]
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn is_defined(&self, value: i64) -> bool {
        self.name_of(value).is_some()
    }

    /// Zero value: the variant numbered 0, or the first declared variant
    #[must_use]
    pub fn zero(&self) -> i64 {
        if self.is_defined(0) {
            0
        } else {
            self.variants.first().map_or(0, |(_, value)| *value)
        }
    }
}

/// A property of an object type
#[derive(Clone)]
pub struct MemberDescriptor {
    pub name: String,
    pub ty: TypeRef,
    pub readable: bool,
    pub writable: bool,
    pub public: bool,
    pub indexed: bool,
}

impl MemberDescriptor {
    /// Public read/write property
    pub fn property(name: impl Into<String>, ty: &TypeRef) -> Self {
        Self {
            name: name.into(),
            ty: ty.clone(),
            readable: true,
            writable: true,
            public: true,
            indexed: false,
        }
    }

    /// Can be read as a mapping source
    #[must_use]
    pub fn is_source(&self) -> bool {
        self.public && self.readable && !self.indexed
    }

    /// Can be written as a mapping destination
    #[must_use]
    pub fn is_destination(&self) -> bool {
        self.public && self.writable && !self.indexed
    }
}

impl fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("name", &self.name)
            .field("ty", &self.ty.name())
            .field("readable", &self.readable)
            .field("writable", &self.writable)
            .field("public", &self.public)
            .field("indexed", &self.indexed)
            .finish()
    }
}

/// A constructor parameter
#[derive(Clone)]
pub struct ParamDescriptor {
    pub name: String,
    pub ty: TypeRef,
    /// Parameter has a default and may be left unsatisfied
    pub optional: bool,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>, ty: &TypeRef) -> Self {
        Self {
            name: name.into(),
            ty: ty.clone(),
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, ty: &TypeRef) -> Self {
        Self {
            optional: true,
            ..Self::new(name, ty)
        }
    }
}

impl fmt::Debug for ParamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamDescriptor")
            .field("name", &self.name)
            .field("ty", &self.ty.name())
            .field("optional", &self.optional)
            .finish()
    }
}

/// A constructor of an object type
#[derive(Clone)]
pub struct ConstructorDescriptor {
    pub params: Vec<ParamDescriptor>,
    pub public: bool,
    factory: Option<ConstructorFn>,
}

impl ConstructorDescriptor {
    /// Public constructor that assigns each argument to the same-named member
    #[must_use]
    pub fn new(params: Vec<ParamDescriptor>) -> Self {
        Self {
            params,
            public: true,
            factory: None,
        }
    }

    /// Public constructor backed by a custom factory
    pub fn with_factory(
        params: Vec<ParamDescriptor>,
        factory: impl Fn(&[Value]) -> Result<ObjectRef> + Send + Sync + 'static,
    ) -> Self {
        Self {
            params,
            public: true,
            factory: Some(Arc::new(factory)),
        }
    }

    #[must_use]
    pub fn is_parameterless(&self) -> bool {
        self.params.is_empty()
    }

    /// Create an instance of `ty` from arguments given in parameter order
    ///
    /// # Errors
    ///
    /// Returns an error if the argument count does not match, `ty` is not an
    /// object type, or the factory fails.
    pub fn invoke(&self, ty: &TypeRef, args: &[Value]) -> Result<ObjectRef> {
        if args.len() != self.params.len() {
            return Err(Error::unsupported(
                ty.name(),
                format!(
                    "constructor expects {} arguments, got {}",
                    self.params.len(),
                    args.len()
                ),
            ));
        }

        if let Some(factory) = &self.factory {
            return factory(args);
        }

        let object = ObjectRef::new(ty)?;
        for (param, arg) in self.params.iter().zip(args) {
            // Record-style constructors: a parameter initialises the member of the same name
            if let Some(index) = ty
                .as_object()
                .and_then(|desc| desc.member_index_ignore_case(&param.name))
            {
                object.set_at(index, arg.clone())?;
            }
        }
        Ok(object)
    }
}

impl fmt::Debug for ConstructorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDescriptor")
            .field("params", &self.params)
            .field("public", &self.public)
            .field("has_factory", &self.factory.is_some())
            .finish()
    }
}

#[derive(Debug)]
struct ObjectBody {
    base: Option<TypeRef>,
    members: Vec<MemberDescriptor>,
    constructors: Vec<ConstructorDescriptor>,
}

/// Members and constructors of an object type
#[derive(Debug, Default)]
pub struct ObjectDescriptor {
    body: OnceLock<ObjectBody>,
}

impl ObjectDescriptor {
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.body.get().is_some()
    }

    #[must_use]
    pub fn base(&self) -> Option<&TypeRef> {
        self.body.get().and_then(|body| body.base.as_ref())
    }

    /// Members, base type members first
    #[must_use]
    pub fn members(&self) -> &[MemberDescriptor] {
        self.body.get().map_or(&[], |body| body.members.as_slice())
    }

    #[must_use]
    pub fn constructors(&self) -> &[ConstructorDescriptor] {
        self.body
            .get()
            .map_or(&[], |body| body.constructors.as_slice())
    }

    #[must_use]
    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members().iter().position(|m| m.name == name)
    }

    #[must_use]
    pub fn member_index_ignore_case(&self, name: &str) -> Option<usize> {
        self.member_index(name).or_else(|| {
            self.members()
                .iter()
                .position(|m| m.name.to_lowercase() == name.to_lowercase())
        })
    }

    #[must_use]
    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.member_index(name).map(|index| &self.members()[index])
    }

    /// Public parameterless constructor, if declared
    #[must_use]
    pub fn default_constructor(&self) -> Option<&ConstructorDescriptor> {
        self.constructors()
            .iter()
            .find(|ctor| ctor.public && ctor.is_parameterless())
    }
}

/// Kinds of runtime types
#[derive(Debug)]
pub enum TypeKind {
    /// Root type every value is assignable to
    Any,

    Scalar(ScalarKind),

    Enum(EnumDescriptor),

    /// Nullable wrapper around a value type
    Optional(TypeRef),

    Sequence {
        shape: SequenceShape,
        element: TypeRef,
    },

    Object(ObjectDescriptor),
}

/// A runtime type: its identity (name) and its kind
pub struct TypeDescriptor {
    name: String,
    kind: TypeKind,
}

static ANY: LazyLock<TypeRef> = LazyLock::new(|| {
    Arc::new(TypeDescriptor {
        name: "any".to_string(),
        kind: TypeKind::Any,
    })
});

static SCALARS: LazyLock<Vec<TypeRef>> = LazyLock::new(|| {
    ScalarKind::ALL
        .iter()
        .map(|kind| {
            Arc::new(TypeDescriptor {
                name: kind.type_name().to_string(),
                kind: TypeKind::Scalar(*kind),
            })
        })
        .collect()
});

impl TypeDescriptor {
    #[must_use]
    pub fn any() -> TypeRef {
        ANY.clone()
    }

    #[must_use]
    pub fn scalar(kind: ScalarKind) -> TypeRef {
        SCALARS[kind as usize].clone()
    }

    #[must_use]
    pub fn optional(inner: &TypeRef) -> TypeRef {
        Arc::new(Self {
            name: format!("{}?", inner.name),
            kind: TypeKind::Optional(inner.clone()),
        })
    }

    #[must_use]
    pub fn sequence(shape: SequenceShape, element: &TypeRef) -> TypeRef {
        Arc::new(Self {
            name: shape.type_name(&element.name),
            kind: TypeKind::Sequence {
                shape,
                element: element.clone(),
            },
        })
    }

    pub fn enumeration<S: Into<String>>(
        name: impl Into<String>,
        variants: impl IntoIterator<Item = (S, i64)>,
    ) -> TypeRef {
        Arc::new(Self {
            name: name.into(),
            kind: TypeKind::Enum(EnumDescriptor {
                variants: variants
                    .into_iter()
                    .map(|(variant, value)| (variant.into(), value))
                    .collect(),
            }),
        })
    }

    /// Declare an object type whose body is supplied later via [`TypeBuilder::define`]
    pub fn declare(name: impl Into<String>) -> TypeRef {
        Arc::new(Self {
            name: name.into(),
            kind: TypeKind::Object(ObjectDescriptor::default()),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    #[must_use]
    pub fn base(&self) -> Option<&TypeRef> {
        self.as_object().and_then(ObjectDescriptor::base)
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectDescriptor> {
        match &self.kind {
            TypeKind::Object(desc) => Some(desc),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_enum(&self) -> Option<&EnumDescriptor> {
        match &self.kind {
            TypeKind::Enum(desc) => Some(desc),
            _ => None,
        }
    }

    #[must_use]
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match &self.kind {
            TypeKind::Scalar(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Shape and element type, looking through an optional wrapper
    #[must_use]
    pub fn sequence_parts(&self) -> Option<(SequenceShape, &TypeRef)> {
        match &self.kind {
            TypeKind::Sequence { shape, element } => Some((*shape, element)),
            TypeKind::Optional(inner) => inner.sequence_parts(),
            _ => None,
        }
    }

    /// Scalar, enum, or an optional of either
    #[must_use]
    pub fn is_simple(&self) -> bool {
        match &self.kind {
            TypeKind::Scalar(_) | TypeKind::Enum(_) => true,
            TypeKind::Optional(inner) => inner.is_simple(),
            _ => false,
        }
    }

    /// The wrapped type for optionals, otherwise the type itself
    #[must_use]
    pub fn non_optional(self: &Arc<Self>) -> TypeRef {
        match &self.kind {
            TypeKind::Optional(inner) => inner.clone(),
            _ => self.clone(),
        }
    }

    /// `self` or one of its base types is named like `ancestor`
    #[must_use]
    pub fn derives_from(&self, ancestor: &TypeDescriptor) -> bool {
        if self.name == ancestor.name {
            return true;
        }
        let mut current = self.base();
        while let Some(base) = current {
            if base.name == ancestor.name {
                return true;
            }
            current = base.base();
        }
        false
    }

    /// Whether a value of runtime type `source` can be stored as `self` unchanged
    #[must_use]
    pub fn is_assignable_from(&self, source: &TypeDescriptor) -> bool {
        if matches!(self.kind, TypeKind::Any) || self.name == source.name {
            return true;
        }

        match (&self.kind, &source.kind) {
            (TypeKind::Optional(inner), TypeKind::Optional(source_inner)) => {
                inner.is_assignable_from(source_inner)
            }
            (TypeKind::Optional(inner), _) => inner.is_assignable_from(source),
            (
                TypeKind::Sequence {
                    shape: SequenceShape::Enumerable,
                    element,
                },
                TypeKind::Sequence {
                    element: source_element,
                    ..
                },
            ) => element.name == source_element.name,
            _ => source.derives_from(self),
        }
    }

    /// Zero value: `Null` for reference-like types
    #[must_use]
    pub fn zero_value(self: &Arc<Self>) -> Value {
        match &self.kind {
            TypeKind::Scalar(kind) => match kind {
                ScalarKind::Bool => Value::Bool(false),
                ScalarKind::Int32 => Value::Int32(0),
                ScalarKind::Int64 => Value::Int64(0),
                ScalarKind::Float64 => Value::Float(0.0),
                ScalarKind::Decimal => Value::Decimal(0.0),
                ScalarKind::String => Value::Null,
                ScalarKind::Guid => Value::Guid(Uuid::nil()),
                ScalarKind::DateTime => Value::DateTime(NaiveDateTime::default()),
                ScalarKind::Date => Value::Date(NaiveDate::default()),
                ScalarKind::Duration => Value::Duration(TimeDelta::zero()),
            },
            TypeKind::Enum(desc) => Value::Enum(EnumValue::new(self, desc.zero())),
            TypeKind::Any
            | TypeKind::Optional(_)
            | TypeKind::Sequence { .. }
            | TypeKind::Object(_) => Value::Null,
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            TypeKind::Any => "any",
            TypeKind::Scalar(_) => "scalar",
            TypeKind::Enum(_) => "enum",
            TypeKind::Optional(_) => "optional",
            TypeKind::Sequence { .. } => "sequence",
            TypeKind::Object(_) => "object",
        };
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Builder for object type descriptors
#[derive(Debug)]
pub struct TypeBuilder {
    name: String,
    base: Option<TypeRef>,
    members: Vec<MemberDescriptor>,
    constructors: Vec<ConstructorDescriptor>,
}

impl TypeBuilder {
    pub fn object(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            members: Vec::new(),
            constructors: Vec::new(),
        }
    }

    /// Inherit members from `base` and make it the supertype
    #[must_use]
    pub fn extends(mut self, base: &TypeRef) -> Self {
        self.base = Some(base.clone());
        self
    }

    /// Public read/write property
    #[must_use]
    pub fn property(self, name: impl Into<String>, ty: &TypeRef) -> Self {
        self.member(MemberDescriptor::property(name, ty))
    }

    /// Public property without a setter
    #[must_use]
    pub fn read_only(self, name: impl Into<String>, ty: &TypeRef) -> Self {
        self.member(MemberDescriptor {
            writable: false,
            ..MemberDescriptor::property(name, ty)
        })
    }

    /// Public property without a getter
    #[must_use]
    pub fn write_only(self, name: impl Into<String>, ty: &TypeRef) -> Self {
        self.member(MemberDescriptor {
            readable: false,
            ..MemberDescriptor::property(name, ty)
        })
    }

    /// Non-public property
    #[must_use]
    pub fn private(self, name: impl Into<String>, ty: &TypeRef) -> Self {
        self.member(MemberDescriptor {
            public: false,
            ..MemberDescriptor::property(name, ty)
        })
    }

    /// Indexed property
    #[must_use]
    pub fn indexer(self, name: impl Into<String>, ty: &TypeRef) -> Self {
        self.member(MemberDescriptor {
            indexed: true,
            ..MemberDescriptor::property(name, ty)
        })
    }

    #[must_use]
    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    /// Public record-style constructor
    #[must_use]
    pub fn constructor(mut self, params: Vec<ParamDescriptor>) -> Self {
        self.constructors.push(ConstructorDescriptor::new(params));
        self
    }

    /// Public constructor backed by a factory
    #[must_use]
    pub fn constructor_with(
        mut self,
        params: Vec<ParamDescriptor>,
        factory: impl Fn(&[Value]) -> Result<ObjectRef> + Send + Sync + 'static,
    ) -> Self {
        self.constructors
            .push(ConstructorDescriptor::with_factory(params, factory));
        self
    }

    /// Non-public constructor; never used by the mapper
    #[must_use]
    pub fn private_constructor(mut self, params: Vec<ParamDescriptor>) -> Self {
        self.constructors.push(ConstructorDescriptor {
            public: false,
            ..ConstructorDescriptor::new(params)
        });
        self
    }

    fn into_body(self) -> ObjectBody {
        let mut members: Vec<MemberDescriptor> = self
            .base
            .as_ref()
            .and_then(|base| base.as_object())
            .map(|desc| {
                desc.members()
                    .iter()
                    .filter(|inherited| !self.members.iter().any(|m| m.name == inherited.name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        members.extend(self.members);

        let mut constructors = self.constructors;
        if constructors.is_empty() {
            // A type without declared constructors gets an implicit parameterless one
            constructors.push(ConstructorDescriptor::new(Vec::new()));
        }

        ObjectBody {
            base: self.base,
            members,
            constructors,
        }
    }

    /// Build a complete object type
    #[must_use]
    pub fn build(self) -> TypeRef {
        let name = self.name.clone();
        let body = self.into_body();
        Arc::new(TypeDescriptor {
            name,
            kind: TypeKind::Object(ObjectDescriptor {
                body: OnceLock::from(body),
            }),
        })
    }

    /// Supply the body of a type created with [`TypeDescriptor::declare`]
    ///
    /// # Errors
    ///
    /// Returns an error if `declared` is not a declared object type of the
    /// same name, or was already defined.
    pub fn define(self, declared: &TypeRef) -> Result<()> {
        if declared.name != self.name {
            return Err(Error::type_mismatch(&self.name, &declared.name));
        }
        let desc = declared
            .as_object()
            .ok_or_else(|| Error::type_mismatch("object", &declared.name))?;
        desc.body
            .set(self.into_body())
            .map_err(|_| Error::AlreadyDefined {
                type_name: declared.name.clone(),
            })
    }
}
