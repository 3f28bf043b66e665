//! Mapping runtime
//!
//! The [`Mapper`] is the entry point. Each call gets a fresh
//! [`MappingContext`] that carries the options, the shared property-map cache
//! and a per-call [`CycleGuard`]. The context decides, for every value it
//! sees, which strategy applies: passthrough, custom converter, scalar
//! coercion, collection mapping, or member-by-member object mapping.

use std::sync::Arc;

use objmap_ir::{
    ConstructorDescriptor, Mapped, MemberDescriptor, ObjectDescriptor, ObjectRef, TypeRef, Value,
};
use tracing::{debug, trace, warn};

use crate::collections::try_map_collection;
use crate::convert::try_convert;
use crate::cycle::CycleGuard;
use crate::introspect::TypeMapCache;
use crate::options::{ConversionFailurePolicy, MappingOptions};
use crate::{Error, MappingError, Result};

/// Name-matching object mapper
///
/// Cheap to clone and safe to share across threads; clones share the
/// property-map cache.
#[derive(Debug, Clone, Default)]
pub struct Mapper {
    cache: Arc<TypeMapCache>,
}

impl Mapper {
    /// Create a mapper with its own cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mapper that shares an existing cache
    #[must_use]
    pub fn with_cache(cache: Arc<TypeMapCache>) -> Self {
        Self { cache }
    }

    /// Property-map cache shared by clones of this mapper
    #[must_use]
    pub fn cache(&self) -> &Arc<TypeMapCache> {
        &self.cache
    }

    /// Map `source` to the statically known type `D`
    ///
    /// Returns `None` when the mapped value is null.
    ///
    /// # Errors
    ///
    /// Returns an error when mapping fails and the failure is surfaced, or
    /// when the mapped value does not have the shape of `D`.
    pub fn map<D: Mapped>(&self, source: &Value, options: &MappingOptions) -> Result<Option<D>> {
        let value = self.map_to_type(source, &D::type_ref(), options)?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(D::from_value(&value)?))
    }

    /// Map `source` to a destination type chosen at runtime
    ///
    /// # Errors
    ///
    /// Returns an error when mapping fails and the failure is surfaced.
    pub fn map_to_type(
        &self,
        source: &Value,
        destination: &TypeRef,
        options: &MappingOptions,
    ) -> Result<Value> {
        debug!(
            source = %source.type_name(),
            destination = %destination,
            "Mapping value"
        );
        let mut context = MappingContext::new(options, &self.cache);
        let result = context.map(source, destination, None);
        context.finish(source, destination, result)
    }

    /// Populate an existing destination from `source`
    ///
    /// A null source leaves `destination` untouched. The returned handle is
    /// always `destination` itself.
    ///
    /// # Errors
    ///
    /// Returns an error when mapping fails and the failure is surfaced.
    pub fn map_into(
        &self,
        source: &Value,
        destination: &ObjectRef,
        options: &MappingOptions,
    ) -> Result<ObjectRef> {
        if source.is_null() {
            return Ok(destination.clone());
        }

        let destination_type = destination.type_ref();
        debug!(
            source = %source.type_name(),
            destination = %destination_type,
            "Mapping into existing value"
        );
        let existing = Value::Object(destination.clone());
        let mut context = MappingContext::new(options, &self.cache);
        let result = context.map(source, &destination_type, Some(&existing));
        context.finish(source, &destination_type, result)?;
        Ok(destination.clone())
    }
}

/// Outcome of mapping one member
enum Assignment {
    Write(Value),
    Keep,
}

/// Constructor chosen to build a destination
struct Candidate {
    satisfied: usize,
    arity: usize,
    /// Source value for each parameter, `None` for an unsatisfied optional
    inputs: Vec<Option<Value>>,
}

impl Candidate {
    /// Most satisfied parameters first, then fewest parameters
    fn outranks(&self, other: &Candidate) -> bool {
        self.satisfied > other.satisfied
            || (self.satisfied == other.satisfied && self.arity < other.arity)
    }
}

/// State for one top-level mapping call
#[derive(Debug)]
pub struct MappingContext<'a> {
    options: &'a MappingOptions,
    cache: &'a TypeMapCache,
    guard: CycleGuard,
}

impl<'a> MappingContext<'a> {
    #[must_use]
    pub fn new(options: &'a MappingOptions, cache: &'a TypeMapCache) -> Self {
        Self {
            options,
            cache,
            guard: CycleGuard::new(),
        }
    }

    /// Map one value to `destination`, reusing `existing` where possible
    ///
    /// # Errors
    ///
    /// Returns an error when a strategy fails and the failure is surfaced.
    pub fn map(
        &mut self,
        source: &Value,
        destination: &TypeRef,
        existing: Option<&Value>,
    ) -> Result<Value> {
        let Some(runtime) = source.runtime_type() else {
            return Ok(existing
                .cloned()
                .unwrap_or_else(|| destination.zero_value()));
        };

        if existing.is_none() && destination.is_assignable_from(&runtime) {
            return Ok(source.clone());
        }

        if let Some(result) = self.options.converters().try_resolve(source, destination) {
            return result.map_err(|cause| converter_error(&runtime, destination, cause));
        }

        if destination.is_simple() && source.is_simple() {
            return match try_convert(source, destination, self.options) {
                Some(value) => Ok(value),
                None => self.scalar_failure(source, &runtime, destination, existing),
            };
        }

        if let Some(mapped) = try_map_collection(source, destination, existing, self)? {
            return Ok(mapped);
        }

        self.map_object(source, &runtime, destination, existing)
    }

    fn scalar_failure(
        &self,
        source: &Value,
        runtime: &TypeRef,
        destination: &TypeRef,
        existing: Option<&Value>,
    ) -> Result<Value> {
        match self.options.conversion_failure() {
            ConversionFailurePolicy::SetDefault => Ok(destination.zero_value()),
            ConversionFailurePolicy::Skip => Ok(existing
                .cloned()
                .unwrap_or_else(|| destination.zero_value())),
            ConversionFailurePolicy::Throw => Err(self.report(MappingError::new(
                runtime.name(),
                destination.name(),
                None,
                conversion_error(source, runtime, destination),
            ))),
        }
    }

    fn map_object(
        &mut self,
        source: &Value,
        runtime: &TypeRef,
        destination: &TypeRef,
        existing: Option<&Value>,
    ) -> Result<Value> {
        let Some(source_object) = source.as_object() else {
            return Err(Error::incompatible(runtime.name(), destination.name()));
        };
        let destination = destination.non_optional();

        if let Some(mapped) = self.guard.lookup(source_object, &destination) {
            trace!(
                source = %runtime,
                destination = %destination,
                "Reusing destination for already mapped source"
            );
            return Ok(mapped.clone());
        }

        let (target, initialized) = match existing.and_then(Value::as_object) {
            Some(object) => (object.clone(), Vec::new()),
            None => self.construct_guarded(source_object, runtime, &destination)?,
        };

        self.guard
            .register(source_object, &destination, Value::Object(target.clone()));
        self.populate(source_object, &target, &initialized)?;
        Ok(Value::Object(target))
    }

    fn construct_guarded(
        &mut self,
        source: &ObjectRef,
        runtime: &TypeRef,
        destination: &TypeRef,
    ) -> Result<(ObjectRef, Vec<String>)> {
        let Some(desc) = destination.as_object() else {
            return Err(Error::incompatible(runtime.name(), destination.name()));
        };

        if !self.guard.begin_construction(source, destination) {
            return Err(Error::construction(
                destination.name(),
                "cyclic reference through constructor parameters",
            ));
        }
        let result = self.construct(source, destination, desc);
        if result.is_err() {
            self.guard.abandon_construction(source, destination);
        }
        result
    }

    /// Build a destination instance, returning it with the names of the
    /// members its constructor initialised
    fn construct(
        &mut self,
        source: &ObjectRef,
        destination: &TypeRef,
        desc: &ObjectDescriptor,
    ) -> Result<(ObjectRef, Vec<String>)> {
        if let Some(ctor) = desc.default_constructor() {
            let object = ctor
                .invoke(destination, &[])
                .map_err(|e| Error::construction(destination.name(), e.to_string()))?;
            return Ok((object, Vec::new()));
        }

        let source_type = source.type_ref();
        let source_members = source_type
            .as_object()
            .map_or(&[][..], ObjectDescriptor::members);
        let values = source.snapshot();

        let mut best: Option<(&ConstructorDescriptor, Candidate)> = None;
        for ctor in desc.constructors().iter().filter(|ctor| ctor.public) {
            let Some(candidate) = self.satisfy(ctor, source_members, &values) else {
                continue;
            };
            if best
                .as_ref()
                .is_none_or(|(_, current)| candidate.outranks(current))
            {
                best = Some((ctor, candidate));
            }
        }

        let Some((ctor, candidate)) = best else {
            return Err(Error::construction(
                destination.name(),
                format!(
                    "no public constructor can be satisfied from members of {}",
                    source_type.name()
                ),
            ));
        };

        debug!(
            destination = %destination,
            params = candidate.arity,
            satisfied = candidate.satisfied,
            "Selected constructor"
        );
        let args = self.constructor_args(source, destination, ctor, candidate.inputs)?;
        let object = ctor
            .invoke(destination, &args)
            .map_err(|e| Error::construction(destination.name(), e.to_string()))?;

        let initialized = ctor
            .params
            .iter()
            .filter_map(|param| desc.member_index_ignore_case(&param.name))
            .map(|index| desc.members()[index].name.clone())
            .collect();
        Ok((object, initialized))
    }

    /// Source values for `ctor`, or `None` when a required parameter has
    /// no usable source value
    ///
    /// Nothing is mapped here, so rejected candidates leave no trace in the
    /// guard or the error handler.
    fn satisfy(
        &self,
        ctor: &ConstructorDescriptor,
        source_members: &[MemberDescriptor],
        values: &[Value],
    ) -> Option<Candidate> {
        let mut inputs = Vec::with_capacity(ctor.params.len());
        let mut satisfied = 0;

        for param in &ctor.params {
            let wanted = param.name.to_lowercase();
            let input = source_members
                .iter()
                .position(|member| member.is_source() && member.name.to_lowercase() == wanted)
                .and_then(|index| values.get(index))
                .filter(|value| !value.is_null() && self.can_supply(value, &param.ty));

            match input {
                Some(value) => {
                    satisfied += 1;
                    inputs.push(Some(value.clone()));
                }
                None if param.optional => inputs.push(None),
                None => return None,
            }
        }

        Some(Candidate {
            satisfied,
            arity: ctor.params.len(),
            inputs,
        })
    }

    /// Whether some strategy applies to `value` as `ty`
    fn can_supply(&self, value: &Value, ty: &TypeRef) -> bool {
        let Some(runtime) = value.runtime_type() else {
            return false;
        };
        if ty.is_assignable_from(&runtime) || self.options.converters().resolve(value, ty).is_some()
        {
            return true;
        }
        if ty.is_simple() && value.is_simple() {
            return try_convert(value, ty, self.options).is_some();
        }
        match value {
            Value::Sequence(_) => ty.sequence_parts().is_some(),
            Value::Object(_) => ty.non_optional().as_object().is_some(),
            _ => false,
        }
    }

    /// Map the chosen constructor's inputs, reporting failures the way the
    /// member pass does
    fn constructor_args(
        &mut self,
        source: &ObjectRef,
        destination: &TypeRef,
        ctor: &ConstructorDescriptor,
        inputs: Vec<Option<Value>>,
    ) -> Result<Vec<Value>> {
        let mut args = Vec::with_capacity(inputs.len());
        for (param, input) in ctor.params.iter().zip(inputs) {
            let Some(value) = input else {
                args.push(param.ty.zero_value());
                continue;
            };
            match self.map_member(&value, &param.ty, &Value::Null) {
                Ok(Assignment::Write(mapped)) => args.push(mapped),
                Ok(Assignment::Keep) => args.push(param.ty.zero_value()),
                Err(error) if error.is_reported() => return Err(error),
                Err(error) => {
                    let fatal = self.is_fatal(&error);
                    let reported = self.report(MappingError::new(
                        source.type_ref().name(),
                        destination.name(),
                        Some(param.name.clone()),
                        error,
                    ));
                    if fatal {
                        return Err(reported);
                    }
                    args.push(param.ty.zero_value());
                }
            }
        }
        Ok(args)
    }

    /// Copy every matched member from `source` onto `target`
    fn populate(
        &mut self,
        source: &ObjectRef,
        target: &ObjectRef,
        initialized: &[String],
    ) -> Result<()> {
        let options = self.options;
        let map = self.cache.property_map(
            &source.type_ref(),
            &target.type_ref(),
            options.is_case_sensitive(),
        );
        // Read every source value up front so no two locks are held at once
        let values = source.snapshot();

        for pair in map.pairs() {
            if options.is_ignored(&pair.destination_name) {
                trace!(member = %pair.destination_name, "Ignoring member");
                continue;
            }
            if initialized.contains(&pair.destination_name) {
                continue;
            }

            let value = values
                .get(pair.source_index)
                .cloned()
                .unwrap_or(Value::Null);
            if value.is_null() && options.ignores_null_source_values() {
                continue;
            }

            let current = target.get_at(pair.destination_index)?;
            match self.map_member(&value, &pair.destination_type, &current) {
                Ok(Assignment::Write(mapped)) => target.set_at(pair.destination_index, mapped)?,
                Ok(Assignment::Keep) => {}
                Err(error) if error.is_reported() => return Err(error),
                Err(error) => {
                    let fatal = self.is_fatal(&error);
                    let reported = self.report(MappingError::new(
                        map.source_type(),
                        map.destination_type(),
                        Some(pair.destination_name.clone()),
                        error,
                    ));
                    if fatal {
                        return Err(reported);
                    }
                }
            }
        }
        Ok(())
    }

    fn map_member(
        &mut self,
        value: &Value,
        member_type: &TypeRef,
        current: &Value,
    ) -> Result<Assignment> {
        let Some(runtime) = value.runtime_type() else {
            return Ok(Assignment::Write(member_type.zero_value()));
        };

        if member_type.is_assignable_from(&runtime) {
            return Ok(Assignment::Write(value.clone()));
        }

        if let Some(result) = self.options.converters().try_resolve(value, member_type) {
            return result
                .map(Assignment::Write)
                .map_err(|cause| converter_error(&runtime, member_type, cause));
        }

        if member_type.is_simple() && value.is_simple() {
            return match try_convert(value, member_type, self.options) {
                Some(converted) => Ok(Assignment::Write(converted)),
                None => match self.options.conversion_failure() {
                    ConversionFailurePolicy::SetDefault => {
                        Ok(Assignment::Write(member_type.zero_value()))
                    }
                    ConversionFailurePolicy::Skip => Ok(Assignment::Keep),
                    ConversionFailurePolicy::Throw => {
                        Err(conversion_error(value, &runtime, member_type))
                    }
                },
            };
        }

        let existing = (!current.is_null()).then_some(current);
        if let Some(mapped) = try_map_collection(value, member_type, existing, self)? {
            return Ok(Assignment::Write(mapped));
        }

        self.map_object(value, &runtime, member_type, existing)
            .map(Assignment::Write)
    }

    /// Unreported failures that abort the call rather than skip a member
    fn is_fatal(&self, error: &Error) -> bool {
        self.options.is_strict()
            || matches!(
                error,
                Error::Conversion { .. } | Error::Construction { .. }
            )
    }

    /// Deliver a failure to the error handler and mark it as reported
    fn report(&self, error: MappingError) -> Error {
        warn!(
            source = %error.source_type,
            destination = %error.destination_type,
            member = error.member.as_deref().unwrap_or("-"),
            "Mapping failed: {}",
            error.cause
        );
        if let Some(handler) = self.options.error_handler() {
            handler(&error);
        }
        Error::Member(Box::new(error))
    }

    /// Report any failure that escaped the member loop
    fn finish(&self, source: &Value, destination: &TypeRef, result: Result<Value>) -> Result<Value> {
        debug!(mapped_objects = self.guard.len(), "Mapping finished");
        result.map_err(|error| {
            if error.is_reported() {
                error
            } else {
                self.report(MappingError::new(
                    source.type_name(),
                    destination.name(),
                    None,
                    error,
                ))
            }
        })
    }
}

fn converter_error(runtime: &TypeRef, destination: &TypeRef, cause: Error) -> Error {
    Error::Converter {
        source_type: runtime.name().to_string(),
        destination_type: destination.name().to_string(),
        cause: Box::new(cause),
    }
}

fn conversion_error(value: &Value, runtime: &TypeRef, destination: &TypeRef) -> Error {
    Error::Conversion {
        value: value.to_invariant_string().unwrap_or_default(),
        source_type: runtime.name().to_string(),
        destination_type: destination.name().to_string(),
    }
}
