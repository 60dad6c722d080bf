use crate::runtime::{
    types::{StorageKind, TypeRef, default_value, same_type},
    value::{self, Storage, Value},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CastError {
    #[error("Can't cast {from} to {to}")]
    CastImpossible { from: String, to: String },
}

fn impossible(from: &TypeRef, to: &TypeRef) -> CastError {
    CastError::CastImpossible {
        from: from.name.clone(),
        to: to.name.clone(),
    }
}

/// Converts `src` to `target`, writing into `dest` when given. With
/// `dest == None` only checks, and a successful check guarantees the real
/// cast succeeds.
///
/// Rules, in order: the target's own `cast` op; identical type or `any`
/// target (the value keeps its concrete type); Int to Float widening;
/// lists and compounds element- or field-wise; same storage kind retags.
pub fn cast(src: &Value, target: &TypeRef, dest: Option<&mut Value>) -> Result<(), CastError> {
    if let Some(custom) = target.ops.cast {
        return if custom(src, target, dest) {
            Ok(())
        } else {
            Err(impossible(src.type_(), target))
        };
    }

    if same_type(src.type_(), target) || target.is_any() {
        if let Some(dest) = dest {
            value::copy(src, dest);
        }
        return Ok(());
    }

    match (src.storage(), target.storage_kind) {
        (Storage::Int(v), StorageKind::Float) => {
            if let Some(dest) = dest {
                *dest = Value::new(target.clone(), Storage::Float(*v as f64));
            }
            Ok(())
        }
        (Storage::List(items), StorageKind::List) => cast_list(src, items, target, dest),
        (storage, kind) if kind.accepts(storage) && target.prototype.is_none() && target.element.is_none() => {
            if let Some(dest) = dest {
                *dest = Value::new(target.clone(), storage.clone());
            }
            Ok(())
        }
        _ => Err(impossible(src.type_(), target)),
    }
}

fn cast_list(
    src: &Value,
    items: &[Value],
    target: &TypeRef,
    dest: Option<&mut Value>,
) -> Result<(), CastError> {
    let slot_types: Vec<TypeRef> = match (&target.prototype, &target.element) {
        (Some(fields), _) => {
            if fields.len() != items.len() {
                return Err(impossible(src.type_(), target));
            }
            fields.iter().map(|field| field.type_.clone()).collect()
        }
        (None, Some(element)) => vec![element.clone(); items.len()],
        (None, None) => items.iter().map(|item| item.type_().clone()).collect(),
    };

    let Some(dest) = dest else {
        for (item, slot_type) in items.iter().zip(&slot_types) {
            cast(item, slot_type, None)?;
        }
        return Ok(());
    };

    let mut converted = Vec::with_capacity(items.len());
    for (item, slot_type) in items.iter().zip(&slot_types) {
        let mut slot = default_value(slot_type);
        cast(item, slot_type, Some(&mut slot))?;
        converted.push(slot);
    }
    *dest = Value::new(target.clone(), Storage::List(converted));
    Ok(())
}

/// Check-only cast.
pub fn value_fits_type(value: &Value, target: &TypeRef) -> bool {
    cast(value, target, None).is_ok()
}

/// Casts into a fresh value.
pub fn cast_value(src: &Value, target: &TypeRef) -> Result<Value, CastError> {
    let mut dest = default_value(target);
    cast(src, target, Some(&mut dest))?;
    Ok(dest)
}

/// Static compatibility of two declared types, used for overload selection.
///
/// `any` as the actual type only fits an `any` expectation, so imprecise
/// static types fall through to dynamic resolution.
pub fn type_fits_type(actual: &TypeRef, expected: &TypeRef) -> bool {
    if expected.is_any() || same_type(actual, expected) {
        return true;
    }
    if actual.is_any() {
        return false;
    }
    match (actual.storage_kind, expected.storage_kind) {
        (StorageKind::Int, StorageKind::Float) => true,
        (StorageKind::List, StorageKind::List) => list_type_fits(actual, expected),
        (a, b) => a == b && expected.prototype.is_none() && expected.element.is_none(),
    }
}

fn list_type_fits(actual: &TypeRef, expected: &TypeRef) -> bool {
    match (&expected.prototype, &expected.element) {
        (None, None) => true,
        (Some(fields), _) => match &actual.prototype {
            Some(actual_fields) => {
                actual_fields.len() == fields.len()
                    && actual_fields
                        .iter()
                        .zip(fields)
                        .all(|(a, e)| type_fits_type(&a.type_, &e.type_))
            }
            None => false,
        },
        (None, Some(element)) => match &actual.element {
            Some(actual_element) => type_fits_type(actual_element, element),
            None => false,
        },
    }
}

/// Lenient form for validation: accepts anything that could fit at runtime.
pub fn type_may_fit(actual: &TypeRef, expected: &TypeRef) -> bool {
    if type_fits_type(actual, expected) || actual.is_any() {
        return true;
    }
    actual.is_list() && expected.is_list() && actual.prototype.is_none() && actual.element.is_none()
}
