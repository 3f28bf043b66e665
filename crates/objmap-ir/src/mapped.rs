//! Statically typed bridge
//!
//! [`Mapped`] ties a Rust type to its descriptor and converts between the
//! Rust value and its dynamic [`Value`] form.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use uuid::Uuid;

use crate::types::{ScalarKind, SequenceShape, TypeDescriptor, TypeRef};
use crate::value::{SequenceRef, Value};
use crate::{Error, Result};

/// A Rust type with a runtime descriptor
pub trait Mapped: Sized {
    /// Descriptor of this type
    fn type_ref() -> TypeRef;

    /// Dynamic form of this value
    fn to_value(&self) -> Value;

    /// Rebuild from a dynamic value
    ///
    /// # Errors
    ///
    /// Returns an error if `value` does not have the shape of this type.
    fn from_value(value: &Value) -> Result<Self>;
}

macro_rules! impl_mapped_scalar {
    ($($ty:ty => $kind:ident, $variant:ident);* $(;)?) => {
        $(
            impl Mapped for $ty {
                fn type_ref() -> TypeRef {
                    TypeDescriptor::scalar(ScalarKind::$kind)
                }

                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }

                fn from_value(value: &Value) -> Result<Self> {
                    match value {
                        Value::$variant(inner) => Ok(inner.clone()),
                        other => Err(Error::type_mismatch(
                            ScalarKind::$kind.type_name(),
                            other.type_name(),
                        )),
                    }
                }
            }
        )*
    };
}

impl_mapped_scalar! {
    bool => Bool, Bool;
    i32 => Int32, Int32;
    i64 => Int64, Int64;
    f64 => Float64, Float;
    String => String, String;
    Uuid => Guid, Guid;
    NaiveDateTime => DateTime, DateTime;
    NaiveDate => Date, Date;
    TimeDelta => Duration, Duration;
}

impl<T: Mapped> Mapped for Option<T> {
    fn type_ref() -> TypeRef {
        TypeDescriptor::optional(&T::type_ref())
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, Mapped::to_value)
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Mapped> Mapped for Vec<T> {
    fn type_ref() -> TypeRef {
        TypeDescriptor::sequence(SequenceShape::List, &T::type_ref())
    }

    fn to_value(&self) -> Value {
        Value::Sequence(SequenceRef::list(
            &T::type_ref(),
            self.iter().map(Mapped::to_value).collect(),
        ))
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Sequence(sequence) => sequence.items().iter().map(T::from_value).collect(),
            other => Err(Error::type_mismatch(Self::type_ref().name(), other.type_name())),
        }
    }
}
