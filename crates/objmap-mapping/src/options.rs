//! Mapping options
//!
//! Options are built once, tuned with chainable setters, then shared
//! read-only by any number of mapping calls. The plain settings can also be
//! loaded from YAML; callbacks are attached in code.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use objmap_ir::{TypeRef, Value};
use serde::{Deserialize, Serialize};

use crate::converters::ConverterRegistry;
use crate::MappingError;

/// Type alias for the error handler callback
pub type ErrorHandler = Arc<dyn Fn(&MappingError) + Send + Sync>;

/// Date/time formats tried when none are configured
pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "yyyy-MM-ddTHH:mm:ss.fff",
    "yyyy-MM-ddTHH:mm:ss",
    "yyyy-MM-dd HH:mm:ss",
    "yyyy-MM-dd",
    "MM/dd/yyyy HH:mm:ss",
    "MM/dd/yyyy",
    "yyyyMMdd",
];

/// What to do when a scalar value cannot be coerced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionFailurePolicy {
    /// Write the destination's zero value and continue
    #[default]
    SetDefault,

    /// Leave the destination member untouched and continue
    Skip,

    /// Report and surface the failure
    Throw,
}

/// Settings that can be loaded from a file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsFile {
    pub case_sensitive: bool,
    pub ignore_null_source_values: bool,
    pub strict_mode: bool,
    pub conversion_failure: ConversionFailurePolicy,
    pub date_formats: Vec<String>,
    pub ignore: Vec<String>,
}

/// Configuration for mapping calls
#[derive(Clone, Default)]
pub struct MappingOptions {
    case_sensitive: bool,
    ignore_null_source_values: bool,
    strict_mode: bool,
    conversion_failure: ConversionFailurePolicy,
    date_formats: Vec<String>,
    error_handler: Option<ErrorHandler>,
    ignored: HashSet<String>,
    converters: ConverterRegistry,
}

impl MappingOptions {
    /// Default options: case-insensitive, lenient, `SetDefault` on failures
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from YAML
    ///
    /// # Errors
    ///
    /// Returns an error when the YAML is malformed or names unknown settings.
    pub fn from_yaml_str(yaml: &str) -> crate::Result<Self> {
        let file: OptionsFile = serde_yaml::from_str(yaml).map_err(|e| crate::Error::Config {
            message: format!("Failed to parse options: {e}"),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
        })?;
        Ok(Self::from(file))
    }

    /// Load options from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Match member names case-sensitively
    pub fn case_sensitive(&mut self, enabled: bool) -> &mut Self {
        self.case_sensitive = enabled;
        self
    }

    /// Leave destination members untouched when the source value is null
    pub fn ignore_null_source_values(&mut self, enabled: bool) -> &mut Self {
        self.ignore_null_source_values = enabled;
        self
    }

    /// Surface every member failure instead of continuing
    pub fn strict(&mut self, enabled: bool) -> &mut Self {
        self.strict_mode = enabled;
        self
    }

    pub fn on_conversion_failure(&mut self, policy: ConversionFailurePolicy) -> &mut Self {
        self.conversion_failure = policy;
        self
    }

    /// Replace the accepted date/time formats, tried in order
    pub fn accept_date_formats<S: Into<String>>(
        &mut self,
        formats: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        self.date_formats = formats.into_iter().map(Into::into).collect();
        self
    }

    /// Callback invoked for every member failure
    pub fn on_error(
        &mut self,
        handler: impl Fn(&MappingError) + Send + Sync + 'static,
    ) -> &mut Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Never write the destination member called `name`
    pub fn ignore(&mut self, name: impl Into<String>) -> &mut Self {
        self.ignored.insert(name.into());
        self
    }

    /// Register a custom converter for a type pair
    pub fn add_converter(
        &mut self,
        source: &TypeRef,
        destination: &TypeRef,
        func: impl Fn(&Value) -> crate::Result<Value> + Send + Sync + 'static,
    ) -> &mut Self {
        self.converters.register(source, destination, func);
        self
    }

    #[must_use]
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    #[must_use]
    pub fn ignores_null_source_values(&self) -> bool {
        self.ignore_null_source_values
    }

    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict_mode
    }

    #[must_use]
    pub fn conversion_failure(&self) -> ConversionFailurePolicy {
        self.conversion_failure
    }

    /// Accepted formats, falling back to [`DEFAULT_DATE_FORMATS`]
    pub fn date_formats(&self) -> impl Iterator<Item = &str> {
        let configured = self.date_formats.iter().map(String::as_str);
        let defaults = DEFAULT_DATE_FORMATS.iter().copied();
        let use_defaults = self.date_formats.is_empty();
        configured.chain(defaults.filter(move |_| use_defaults))
    }

    #[must_use]
    pub fn error_handler(&self) -> Option<&ErrorHandler> {
        self.error_handler.as_ref()
    }

    /// Whether the destination member `name` is ignored
    #[must_use]
    pub fn is_ignored(&self, name: &str) -> bool {
        if self.case_sensitive {
            self.ignored.contains(name)
        } else {
            self.ignored
                .iter()
                .any(|ignored| ignored.to_lowercase() == name.to_lowercase())
        }
    }

    #[must_use]
    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }
}

impl From<OptionsFile> for MappingOptions {
    fn from(file: OptionsFile) -> Self {
        let mut options = Self::new();
        options
            .case_sensitive(file.case_sensitive)
            .ignore_null_source_values(file.ignore_null_source_values)
            .strict(file.strict_mode)
            .on_conversion_failure(file.conversion_failure)
            .accept_date_formats(file.date_formats);
        for name in file.ignore {
            options.ignore(name);
        }
        options
    }
}

impl std::fmt::Debug for MappingOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingOptions")
            .field("case_sensitive", &self.case_sensitive)
            .field("ignore_null_source_values", &self.ignore_null_source_values)
            .field("strict_mode", &self.strict_mode)
            .field("conversion_failure", &self.conversion_failure)
            .field("date_formats", &self.date_formats)
            .field("has_error_handler", &self.error_handler.is_some())
            .field("ignored", &self.ignored)
            .field("converters", &self.converters)
            .finish()
    }
}
