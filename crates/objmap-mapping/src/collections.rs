//! Collection adapter
//!
//! Maps a source sequence onto a destination sequence type element by
//! element. Arrays are always freshly allocated; an existing growable
//! destination of the right element type is refilled in place so that callers
//! holding it observe the new contents.

use objmap_ir::{SequenceRef, SequenceShape, TypeDescriptor, TypeRef, Value};
use tracing::trace;

use crate::runtime::MappingContext;

/// Map `source` onto the sequence type `destination`
///
/// Returns `Ok(None)` when either side is not a sequence so the caller can
/// try other strategies.
///
/// # Errors
///
/// Returns the first element mapping error that the context surfaces.
pub fn try_map_collection(
    source: &Value,
    destination: &TypeRef,
    existing: Option<&Value>,
    context: &mut MappingContext<'_>,
) -> crate::Result<Option<Value>> {
    let Some(source_sequence) = source.as_sequence() else {
        return Ok(None);
    };
    let Some((shape, element)) = destination.sequence_parts() else {
        return Ok(None);
    };

    let items = source_sequence.items();
    trace!(
        source = %source_sequence.type_ref(),
        destination = %destination,
        len = items.len(),
        "Mapping collection"
    );

    let mut mapped = Vec::with_capacity(items.len());
    for item in &items {
        mapped.push(context.map(item, element, None)?);
    }

    if shape != SequenceShape::Array {
        if let Some(target) = existing.and_then(Value::as_sequence) {
            if reusable(target, element) {
                if target.shape().can_clear() {
                    target.clear()?;
                }
                for value in mapped {
                    target.push(value)?;
                }
                return Ok(Some(Value::Sequence(target.clone())));
            }
        }
    }

    let ty = match shape {
        SequenceShape::Enumerable => TypeDescriptor::sequence(SequenceShape::List, element),
        _ => destination.non_optional(),
    };
    Ok(Some(Value::Sequence(SequenceRef::new(&ty, mapped)?)))
}

fn reusable(target: &SequenceRef, element: &TypeRef) -> bool {
    target.shape().can_append() && target.element_type().name() == element.name()
}
