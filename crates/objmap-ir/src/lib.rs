#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # objmap-ir
//!
//! Dynamic value model and runtime type descriptors for object mapping.
//!
//! Rust has no runtime reflection, so every type that takes part in a mapping
//! is described once by a [`TypeDescriptor`]: its members, constructors, base
//! type, or the scalar/enum/sequence shape it has. Values are carried as
//! [`Value`]s whose objects and sequences are shared handles, which gives the
//! mapper the reference identity it needs to detect cycles.

/// Typed bridge between Rust types and dynamic values.
pub mod mapped;
/// Runtime type descriptors and the object type builder.
pub mod types;
/// Dynamic values plus the shared object and sequence handles.
pub mod value;

/// Conversion trait implemented by every statically mapped type.
pub use mapped::Mapped;
/// Descriptor primitives.
pub use types::{
    ConstructorDescriptor, ConstructorFn, EnumDescriptor, MemberDescriptor, ObjectDescriptor,
    ParamDescriptor, ScalarKind, SequenceShape, TypeBuilder, TypeDescriptor, TypeKind, TypeRef,
};
/// Value primitives.
pub use value::{EnumValue, ObjectRef, SequenceRef, Value};

use thiserror::Error;

/// Errors that can occur when working with values and descriptors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Member '{member}' not found on type {type_name}")]
    MemberNotFound { type_name: String, member: String },

    #[error("Type {type_name} is already defined")]
    AlreadyDefined { type_name: String },

    #[error("Unsupported operation on {type_name}: {operation}")]
    UnsupportedOperation { type_name: String, operation: String },
}

impl Error {
    /// Build a type-mismatch error from expected and found type names.
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Build a member-not-found error with the owning type name.
    pub fn member_not_found(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        Self::MemberNotFound {
            type_name: type_name.into(),
            member: member.into(),
        }
    }

    /// Build an unsupported-operation error for a type.
    pub fn unsupported(type_name: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            type_name: type_name.into(),
            operation: operation.into(),
        }
    }
}

/// Crate-local result type for IR operations.
pub type Result<T> = std::result::Result<T, Error>;
