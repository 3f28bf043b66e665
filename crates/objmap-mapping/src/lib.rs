//! # objmap-mapping
//!
//! Name-matching object mapper with scalar coercion, collection reshaping,
//! and cycle tracking.
//!
//! Given a source [`Value`](objmap_ir::Value) and a destination
//! [`TypeRef`](objmap_ir::TypeRef), the [`Mapper`] builds a destination
//! instance by matching members by name. No per-pair mapping definition is
//! needed; behaviour is tuned through [`MappingOptions`].

pub mod collections;
pub mod convert;
pub mod converters;
pub mod cycle;
pub mod datetime;
pub mod introspect;
pub mod numeric;
pub mod options;
pub mod runtime;

pub use converters::ConverterRegistry;
pub use introspect::{PropertyMap, TypeMapCache};
pub use options::{ConversionFailurePolicy, MappingOptions, OptionsFile};
pub use runtime::{Mapper, MappingContext};

use std::fmt;
use thiserror::Error;

/// Errors that can occur during mapping
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot construct {type_name}: {reason}")]
    Construction { type_name: String, reason: String },

    #[error("Cannot convert '{value}' from {source_type} to {destination_type}")]
    Conversion {
        value: String,
        source_type: String,
        destination_type: String,
    },

    #[error("Converter {source_type} -> {destination_type} failed: {cause}")]
    Converter {
        source_type: String,
        destination_type: String,
        #[source]
        cause: Box<Error>,
    },

    #[error("No mapping from {source_type} to {destination_type}")]
    Incompatible {
        source_type: String,
        destination_type: String,
    },

    #[error("{0}")]
    Member(Box<MappingError>),

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Ir(#[from] objmap_ir::Error),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Free-form failure, typically raised by a custom converter
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    pub fn construction(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Construction {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    pub fn incompatible(
        source_type: impl Into<String>,
        destination_type: impl Into<String>,
    ) -> Self {
        Self::Incompatible {
            source_type: source_type.into(),
            destination_type: destination_type.into(),
        }
    }

    /// A member failure that was already delivered to the error handler
    #[must_use]
    pub fn is_reported(&self) -> bool {
        matches!(self, Self::Member(_))
    }
}

/// A failure while mapping one destination member
#[derive(Debug)]
pub struct MappingError {
    pub source_type: String,
    pub destination_type: String,
    /// Destination member, `None` for whole-value failures
    pub member: Option<String>,
    pub cause: Error,
}

impl MappingError {
    pub fn new(
        source_type: impl Into<String>,
        destination_type: impl Into<String>,
        member: Option<String>,
        cause: Error,
    ) -> Self {
        Self {
            source_type: source_type.into(),
            destination_type: destination_type.into(),
            member,
            cause,
        }
    }
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mapping {} -> {}", self.source_type, self.destination_type)?;
        if let Some(member) = &self.member {
            write!(f, " (member '{member}')")?;
        }
        write!(f, " failed: {}", self.cause)
    }
}

impl std::error::Error for MappingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
