//! Scalar conversion
//!
//! Coerces simple values (scalars and enum constants) across type
//! boundaries. Every failure is reported as `None`, never as an error, so the
//! caller's conversion-failure policy decides what happens next.

use chrono::NaiveTime;
use objmap_ir::{EnumDescriptor, EnumValue, ScalarKind, TypeKind, TypeRef, Value};
use uuid::Uuid;

use crate::datetime::{parse_datetime, parse_duration};
use crate::numeric::{parse_f64, parse_i64, value_to_f64, value_to_i64};
use crate::options::MappingOptions;

/// Convert `value` to `destination`, or `None` when it cannot be coerced
#[must_use]
pub fn try_convert(value: &Value, destination: &TypeRef, options: &MappingOptions) -> Option<Value> {
    if value.is_null() {
        return Some(destination.zero_value());
    }

    if let Some(runtime) = value.runtime_type() {
        if destination.is_assignable_from(&runtime) {
            return Some(value.clone());
        }
    }

    let destination = destination.non_optional();
    match destination.kind() {
        TypeKind::Enum(desc) => to_enum(value, &destination, desc),
        TypeKind::Scalar(kind) => to_scalar(value, *kind, options),
        _ => None,
    }
}

fn to_enum(value: &Value, ty: &TypeRef, desc: &EnumDescriptor) -> Option<Value> {
    let raw = match value {
        Value::String(text) => {
            let text = text.trim();
            desc.value_of(text).or_else(|| parse_i64(text))?
        }
        Value::Int32(_) | Value::Int64(_) | Value::Enum(_) => value_to_i64(value)?,
        _ => return None,
    };

    desc.is_defined(raw)
        .then(|| Value::Enum(EnumValue::new(ty, raw)))
}

fn to_scalar(value: &Value, kind: ScalarKind, options: &MappingOptions) -> Option<Value> {
    match kind {
        ScalarKind::String => value.to_invariant_string().map(Value::String),
        ScalarKind::Bool => to_bool(value).map(Value::Bool),
        ScalarKind::Int32 => to_integer(value)
            .and_then(|i| i32::try_from(i).ok())
            .map(Value::Int32),
        ScalarKind::Int64 => to_integer(value).map(Value::Int64),
        ScalarKind::Float64 => to_real(value).map(Value::Float),
        ScalarKind::Decimal => to_real(value)
            .filter(|f| f.is_finite())
            .map(Value::Decimal),
        ScalarKind::Guid => value
            .as_str()
            .and_then(|text| Uuid::parse_str(text.trim()).ok())
            .map(Value::Guid),
        ScalarKind::DateTime => match value {
            Value::String(text) => parse_datetime(text, options.date_formats()).map(Value::DateTime),
            Value::Date(date) => Some(Value::DateTime(date.and_time(NaiveTime::MIN))),
            _ => None,
        },
        ScalarKind::Date => match value {
            Value::String(text) => parse_datetime(text, options.date_formats())
                .map(|dt| Value::Date(dt.date())),
            Value::DateTime(dt) => Some(Value::Date(dt.date())),
            _ => None,
        },
        ScalarKind::Duration => value
            .as_str()
            .and_then(parse_duration)
            .map(Value::Duration),
    }
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if text.eq_ignore_ascii_case("true") || text == "1" {
                Some(true)
            } else if text.eq_ignore_ascii_case("false") || text == "0" {
                Some(false)
            } else {
                None
            }
        }
        Value::Int32(_) | Value::Int64(_) => value_to_i64(value).map(|i| i != 0),
        Value::Float(f) | Value::Decimal(f) => Some(*f != 0.0),
        _ => None,
    }
}

fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::String(text) => parse_i64(text),
        other => value_to_i64(other),
    }
}

fn to_real(value: &Value) -> Option<f64> {
    match value {
        Value::String(text) => parse_f64(text),
        other => value_to_f64(other),
    }
}
