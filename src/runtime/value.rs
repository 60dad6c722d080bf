use std::{any::Any, fmt, rc::Rc};

use crate::{
    graph::TermId,
    runtime::types::{StorageKind, TypeRef, default_value, format_float, same_type},
};

/// Host object shared between values. The destructor, if any, runs once the
/// last handle is dropped.
#[derive(Clone)]
pub struct OpaqueHandle(Rc<OpaqueInner>);

struct OpaqueInner {
    tag: &'static str,
    object: Box<dyn Any>,
    destructor: Option<fn(&mut dyn Any)>,
}

impl Drop for OpaqueInner {
    fn drop(&mut self) {
        if let Some(destructor) = self.destructor {
            destructor(self.object.as_mut());
        }
    }
}

impl OpaqueHandle {
    pub fn new<T: Any>(tag: &'static str, object: T) -> Self {
        Self(Rc::new(OpaqueInner {
            tag,
            object: Box::new(object),
            destructor: None,
        }))
    }

    pub fn with_destructor<T: Any>(
        tag: &'static str,
        object: T,
        destructor: fn(&mut dyn Any),
    ) -> Self {
        Self(Rc::new(OpaqueInner {
            tag,
            object: Box::new(object),
            destructor: Some(destructor),
        }))
    }

    pub fn tag(&self) -> &'static str {
        self.0.tag
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.object.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &OpaqueHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for OpaqueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueHandle({} {:#x})", self.0.tag, self.address())
    }
}

/// Physical payload of a [`Value`].
///
/// `Ref` is a weak term id: it never keeps the term alive and resolves to
/// nothing once the term is freed.
#[derive(Debug, Clone)]
pub enum Storage {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    String(Rc<str>),
    List(Vec<Value>),
    Ref(TermId),
    Opaque(OpaqueHandle),
}

/// A typed cell: every value carries its type, and the storage variant
/// agrees with the type's storage kind.
#[derive(Clone)]
pub struct Value {
    type_: TypeRef,
    storage: Storage,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("No equals function defined for type {type_name}")]
    NoEqualsDefined { type_name: String },
}

impl Value {
    pub fn new(type_: TypeRef, storage: Storage) -> Self {
        Self { type_, storage }
    }

    pub fn type_(&self) -> &TypeRef {
        &self.type_
    }

    pub fn type_name(&self) -> &str {
        &self.type_.name
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    pub fn into_storage(self) -> Storage {
        self.storage
    }

    /// Storage agrees with the type's storage kind.
    pub fn is_consistent(&self) -> bool {
        self.type_.storage_kind.accepts(&self.storage)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.storage, Storage::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.storage {
            Storage::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.storage {
            Storage::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Int or Float, widened.
    pub fn as_number(&self) -> Option<f64> {
        match self.storage {
            Storage::Int(v) => Some(v as f64),
            Storage::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.storage {
            Storage::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.storage {
            Storage::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match &self.storage {
            Storage::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match &mut self.storage {
            Storage::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Option<TermId> {
        match self.storage {
            Storage::Ref(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&OpaqueHandle> {
        match &self.storage {
            Storage::Opaque(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn num_elements(&self) -> Option<usize> {
        self.type_.ops.num_elements.map(|count| count(self))
    }

    pub fn get_element(&self, index: usize) -> Option<Value> {
        self.type_.ops.get_element.and_then(|get| get(self, index))
    }

    /// Calls `visit` for every `Ref` reachable through `visit_for_gc`.
    pub fn visit_refs(&self, visit: &mut dyn FnMut(TermId)) {
        if let Storage::Ref(id) = self.storage {
            visit(id);
        }
        if let Some(walk) = self.type_.ops.visit_for_gc {
            walk(self, &mut |child| child.visit_refs(visit));
        }
    }

    pub fn contains_refs(&self) -> bool {
        let mut found = false;
        self.visit_refs(&mut |_| found = true);
        found
    }

    /// Rewrites every nested `Ref` through `map`; unmapped ids become null.
    pub fn remap_refs(&mut self, map: &dyn Fn(TermId) -> Option<TermId>) {
        match &mut self.storage {
            Storage::Ref(id) => *id = map(*id).unwrap_or(TermId::NULL),
            Storage::List(items) => {
                for item in items.iter_mut() {
                    item.remap_refs(map);
                }
            }
            _ => {}
        }
    }
}

/// Deep copy honoring the source type's `copy` op.
pub fn copy(src: &Value, dest: &mut Value) {
    match src.type_.ops.copy {
        Some(copy_fn) => copy_fn(src, dest),
        None => *dest = src.clone(),
    }
}

/// Resets a value to its type's default.
pub fn reset(value: &mut Value) {
    *value = default_value(&value.type_);
}

/// Equality through the type's `equals` op. Int and Float compare
/// numerically; values of unrelated types are unequal; a type without an
/// `equals` op fails closed. An `any`-typed side defers to the other side's
/// op, and two values with no op between them but `any` compare by storage.
pub fn equals(a: &Value, b: &Value) -> Result<bool, ValueError> {
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        if !same_type(&a.type_, &b.type_) {
            return Ok(x == y);
        }
    }
    let any = a.type_.is_any() || b.type_.is_any();
    if !same_type(&a.type_, &b.type_) && !any {
        return Ok(false);
    }
    let op = match a.type_.ops.equals {
        None if a.type_.is_any() => b.type_.ops.equals,
        op => op,
    };
    match op {
        Some(equals_fn) => equals_fn(a, b),
        None if any => storage_equals(a, b),
        None => Err(ValueError::NoEqualsDefined {
            type_name: a.type_.name.clone(),
        }),
    }
}

fn storage_equals(a: &Value, b: &Value) -> Result<bool, ValueError> {
    Ok(match (&a.storage, &b.storage) {
        (Storage::Null, Storage::Null) => true,
        (Storage::Bool(x), Storage::Bool(y)) => x == y,
        (Storage::String(x), Storage::String(y)) => x == y,
        (Storage::Ref(x), Storage::Ref(y)) => x == y,
        (Storage::Opaque(x), Storage::Opaque(y)) => x.ptr_eq(y),
        (Storage::List(x), Storage::List(y)) => {
            if x.len() != y.len() {
                return Ok(false);
            }
            for (left, right) in x.iter().zip(y) {
                if !equals(left, right)? {
                    return Ok(false);
                }
            }
            true
        }
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    })
}

pub fn to_string(value: &Value) -> String {
    match value.type_.ops.to_string {
        Some(render) => render(value),
        None => match &value.storage {
            Storage::Int(i) => i.to_string(),
            Storage::Float(f) => format_float(*f),
            Storage::Bool(b) => b.to_string(),
            Storage::String(s) => s.to_string(),
            _ if value.type_.storage_kind == StorageKind::Any && value.is_null() => {
                "null".to_string()
            }
            _ => fallback_string(value),
        },
    }
}

/// Like [`to_string`] but quotes strings; used for list elements.
pub fn repr(value: &Value) -> String {
    match &value.storage {
        Storage::String(s) => format!("\"{}\"", s),
        _ => to_string(value),
    }
}

pub(crate) fn fallback_string(value: &Value) -> String {
    let address = match &value.storage {
        Storage::Opaque(handle) => handle.address(),
        _ => value as *const Value as usize,
    };
    format!("<{} {:#x}>", value.type_.name, address)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", to_string(self))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({}: {})", self.type_.name, repr(self))
    }
}
