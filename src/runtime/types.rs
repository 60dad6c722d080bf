use std::{collections::HashMap, fmt, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::{
    graph::TermId,
    runtime::value::{self, Storage, Value, ValueError},
};

pub type TypeRef = Rc<Type>;

/// Physical representation a type's values use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKind {
    Null,
    Int,
    Float,
    Bool,
    String,
    List,
    Ref,
    Opaque,
    /// Accepts any storage.
    Any,
}

impl StorageKind {
    pub fn of(storage: &Storage) -> StorageKind {
        match storage {
            Storage::Null => StorageKind::Null,
            Storage::Int(_) => StorageKind::Int,
            Storage::Float(_) => StorageKind::Float,
            Storage::Bool(_) => StorageKind::Bool,
            Storage::String(_) => StorageKind::String,
            Storage::List(_) => StorageKind::List,
            Storage::Ref(_) => StorageKind::Ref,
            Storage::Opaque(_) => StorageKind::Opaque,
        }
    }

    /// Null storage doubles as the empty handle for opaque and ref kinds.
    pub fn accepts(self, storage: &Storage) -> bool {
        match (self, storage) {
            (StorageKind::Any, _) => true,
            (StorageKind::Opaque | StorageKind::Ref, Storage::Null) => true,
            (kind, storage) => kind == StorageKind::of(storage),
        }
    }
}

pub type CopyFn = fn(&Value, &mut Value);
pub type ResetFn = fn(&mut Value);
pub type EqualsFn = fn(&Value, &Value) -> Result<bool, ValueError>;
/// `dest == None` is a check-only request.
pub type CastFn = fn(&Value, &TypeRef, Option<&mut Value>) -> bool;
pub type ToStringFn = fn(&Value) -> String;
pub type NumElementsFn = fn(&Value) -> usize;
pub type GetElementFn = fn(&Value, usize) -> Option<Value>;
pub type VisitFn = fn(&Value, &mut dyn FnMut(&Value));

/// Per-type behavior table. Every entry is optional; callers fall back to
/// structural defaults or fail closed.
#[derive(Clone, Copy, Default)]
pub struct TypeOps {
    pub copy: Option<CopyFn>,
    pub reset: Option<ResetFn>,
    pub equals: Option<EqualsFn>,
    pub cast: Option<CastFn>,
    pub to_string: Option<ToStringFn>,
    pub num_elements: Option<NumElementsFn>,
    pub get_element: Option<GetElementFn>,
    pub visit_for_gc: Option<VisitFn>,
}

impl fmt::Debug for TypeOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let present: Vec<&str> = [
            ("copy", self.copy.is_some()),
            ("reset", self.reset.is_some()),
            ("equals", self.equals.is_some()),
            ("cast", self.cast.is_some()),
            ("to_string", self.to_string.is_some()),
            ("num_elements", self.num_elements.is_some()),
            ("get_element", self.get_element.is_some()),
            ("visit_for_gc", self.visit_for_gc.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect();
        write!(f, "TypeOps({})", present.join(", "))
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub type_: TypeRef,
}

impl Field {
    pub fn new(name: &str, type_: TypeRef) -> Self {
        Self {
            name: name.to_string(),
            type_,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Type {
    pub name: String,
    pub storage_kind: StorageKind,
    /// Field layout of compound types.
    pub prototype: Option<Vec<Field>>,
    /// Element type of homogeneous lists.
    pub element: Option<TypeRef>,
    pub ops: TypeOps,
}

impl Type {
    pub fn primitive(name: &str, storage_kind: StorageKind, ops: TypeOps) -> TypeRef {
        Rc::new(Type {
            name: name.to_string(),
            storage_kind,
            prototype: None,
            element: None,
            ops,
        })
    }

    /// Compound type with structural copy and equality.
    pub fn compound(name: &str, fields: Vec<Field>) -> TypeRef {
        Rc::new(Type {
            name: name.to_string(),
            storage_kind: StorageKind::List,
            prototype: Some(fields),
            element: None,
            ops: list_ops(),
        })
    }

    pub fn list_of(element: &TypeRef) -> TypeRef {
        Rc::new(Type {
            name: format!("List<{}>", element.name),
            storage_kind: StorageKind::List,
            prototype: None,
            element: Some(element.clone()),
            ops: list_ops(),
        })
    }

    pub fn is_any(&self) -> bool {
        self.storage_kind == StorageKind::Any
    }

    pub fn is_void(&self) -> bool {
        self.storage_kind == StorageKind::Null
    }

    pub fn is_list(&self) -> bool {
        self.storage_kind == StorageKind::List
    }

    pub fn is_compound(&self) -> bool {
        self.prototype.as_ref().is_some_and(|fields| !fields.is_empty())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.storage_kind, StorageKind::Int | StorageKind::Float)
    }

    pub fn field(&self, name: &str) -> Option<(usize, &Field)> {
        self.prototype
            .as_ref()?
            .iter()
            .enumerate()
            .find(|(_, field)| field.name == name)
    }
}

pub fn same_type(a: &TypeRef, b: &TypeRef) -> bool {
    Rc::ptr_eq(a, b) || (a.name == b.name && a.storage_kind == b.storage_kind)
}

/// Default-constructed value of `type_` (0, 0.0, false, "", [], field
/// defaults, null ref).
pub fn default_value(type_: &TypeRef) -> Value {
    if let Some(reset) = type_.ops.reset {
        let mut value = Value::new(type_.clone(), Storage::Null);
        reset(&mut value);
        return value;
    }
    let storage = match type_.storage_kind {
        StorageKind::Null | StorageKind::Any | StorageKind::Opaque => Storage::Null,
        StorageKind::Int => Storage::Int(0),
        StorageKind::Float => Storage::Float(0.0),
        StorageKind::Bool => Storage::Bool(false),
        StorageKind::String => Storage::String(Rc::from("")),
        StorageKind::Ref => Storage::Ref(TermId::NULL),
        StorageKind::List => match &type_.prototype {
            Some(fields) => Storage::List(
                fields
                    .iter()
                    .map(|field| default_value(&field.type_))
                    .collect(),
            ),
            None => Storage::List(Vec::new()),
        },
    };
    Value::new(type_.clone(), storage)
}

pub(crate) fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

fn primitive_equals(a: &Value, b: &Value) -> Result<bool, ValueError> {
    Ok(match (a.storage(), b.storage()) {
        (Storage::Null, Storage::Null) => true,
        (Storage::Int(x), Storage::Int(y)) => x == y,
        (Storage::Float(x), Storage::Float(y)) => x == y,
        (Storage::Bool(x), Storage::Bool(y)) => x == y,
        (Storage::String(x), Storage::String(y)) => x == y,
        (Storage::Ref(x), Storage::Ref(y)) => x == y,
        _ => false,
    })
}

fn primitive_to_string(v: &Value) -> String {
    match v.storage() {
        Storage::Null => "null".to_string(),
        Storage::Int(i) => i.to_string(),
        Storage::Float(f) => format_float(*f),
        Storage::Bool(b) => b.to_string(),
        Storage::String(s) => s.to_string(),
        Storage::Ref(id) => id.to_string(),
        Storage::List(_) | Storage::Opaque(_) => value::fallback_string(v),
    }
}

fn string_num_elements(v: &Value) -> usize {
    v.as_str().map_or(0, |s| s.chars().count())
}

fn string_get_element(v: &Value, index: usize) -> Option<Value> {
    let ch = v.as_str()?.chars().nth(index)?;
    Some(Value::new(
        v.type_().clone(),
        Storage::String(Rc::from(ch.to_string().as_str())),
    ))
}

fn list_copy(src: &Value, dest: &mut Value) {
    let items = match src.storage() {
        Storage::List(items) => items
            .iter()
            .map(|item| {
                let mut slot = Value::new(item.type_().clone(), Storage::Null);
                value::copy(item, &mut slot);
                slot
            })
            .collect(),
        other => {
            *dest = Value::new(src.type_().clone(), other.clone());
            return;
        }
    };
    *dest = Value::new(src.type_().clone(), Storage::List(items));
}

fn list_equals(a: &Value, b: &Value) -> Result<bool, ValueError> {
    let (Some(left), Some(right)) = (a.as_list(), b.as_list()) else {
        return Ok(false);
    };
    if left.len() != right.len() {
        return Ok(false);
    }
    for (x, y) in left.iter().zip(right) {
        if !value::equals(x, y)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn list_to_string(v: &Value) -> String {
    let Some(items) = v.as_list() else {
        return value::fallback_string(v);
    };
    let rendered: Vec<String> = items.iter().map(value::repr).collect();
    format!("[{}]", rendered.join(", "))
}

fn list_num_elements(v: &Value) -> usize {
    v.as_list().map_or(0, |items| items.len())
}

fn list_get_element(v: &Value, index: usize) -> Option<Value> {
    v.as_list()?.get(index).cloned()
}

fn list_visit(v: &Value, visit: &mut dyn FnMut(&Value)) {
    if let Some(items) = v.as_list() {
        for item in items {
            visit(item);
        }
    }
}

fn primitive_ops() -> TypeOps {
    TypeOps {
        equals: Some(primitive_equals),
        to_string: Some(primitive_to_string),
        ..TypeOps::default()
    }
}

fn list_ops() -> TypeOps {
    TypeOps {
        copy: Some(list_copy),
        equals: Some(list_equals),
        to_string: Some(list_to_string),
        num_elements: Some(list_num_elements),
        get_element: Some(list_get_element),
        visit_for_gc: Some(list_visit),
        ..TypeOps::default()
    }
}

/// Types every world starts with.
#[derive(Debug, Clone)]
pub struct BuiltinTypes {
    pub any: TypeRef,
    pub void: TypeRef,
    pub int: TypeRef,
    pub float: TypeRef,
    pub bool: TypeRef,
    pub string: TypeRef,
    pub list: TypeRef,
    pub ref_: TypeRef,
    pub function: TypeRef,
    /// Host objects; no equality, default string rendering.
    pub opaque: TypeRef,
}

impl Default for BuiltinTypes {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinTypes {
    pub fn new() -> Self {
        let string_ops = TypeOps {
            num_elements: Some(string_num_elements),
            get_element: Some(string_get_element),
            ..primitive_ops()
        };
        Self {
            any: Type::primitive("any", StorageKind::Any, TypeOps::default()),
            void: Type::primitive("void", StorageKind::Null, primitive_ops()),
            int: Type::primitive("int", StorageKind::Int, primitive_ops()),
            float: Type::primitive("number", StorageKind::Float, primitive_ops()),
            bool: Type::primitive("bool", StorageKind::Bool, primitive_ops()),
            string: Type::primitive("string", StorageKind::String, string_ops),
            list: Rc::new(Type {
                name: "List".to_string(),
                storage_kind: StorageKind::List,
                prototype: None,
                element: None,
                ops: list_ops(),
            }),
            ref_: Type::primitive("Ref", StorageKind::Ref, primitive_ops()),
            function: Type::primitive("Function", StorageKind::Ref, primitive_ops()),
            opaque: Type::primitive("Opaque", StorageKind::Opaque, TypeOps::default()),
        }
    }

    fn all(&self) -> [&TypeRef; 10] {
        [
            &self.any,
            &self.void,
            &self.int,
            &self.float,
            &self.bool,
            &self.string,
            &self.list,
            &self.ref_,
            &self.function,
            &self.opaque,
        ]
    }

    pub fn null(&self) -> Value {
        Value::new(self.void.clone(), Storage::Null)
    }

    pub fn make_int(&self, v: i64) -> Value {
        Value::new(self.int.clone(), Storage::Int(v))
    }

    pub fn make_float(&self, v: f64) -> Value {
        Value::new(self.float.clone(), Storage::Float(v))
    }

    pub fn make_bool(&self, v: bool) -> Value {
        Value::new(self.bool.clone(), Storage::Bool(v))
    }

    pub fn make_string(&self, v: &str) -> Value {
        Value::new(self.string.clone(), Storage::String(Rc::from(v)))
    }

    pub fn make_list(&self, items: Vec<Value>) -> Value {
        Value::new(self.list.clone(), Storage::List(items))
    }

    pub fn make_ref(&self, term: TermId) -> Value {
        Value::new(self.ref_.clone(), Storage::Ref(term))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("type {0} is already registered")]
    AlreadyRegistered(String),
}

/// Name-keyed type registry owned by the world.
#[derive(Debug)]
pub struct TypeRegistry {
    builtins: BuiltinTypes,
    types: HashMap<String, TypeRef>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let builtins = BuiltinTypes::new();
        let types = builtins
            .all()
            .into_iter()
            .map(|t| (t.name.clone(), t.clone()))
            .collect();
        Self { builtins, types }
    }

    pub fn builtins(&self) -> &BuiltinTypes {
        &self.builtins
    }

    pub fn get(&self, name: &str) -> Option<TypeRef> {
        self.types.get(name).cloned()
    }

    pub fn register(&mut self, type_: TypeRef) -> Result<TypeRef, TypeError> {
        if self.types.contains_key(&type_.name) {
            return Err(TypeError::AlreadyRegistered(type_.name.clone()));
        }
        self.types.insert(type_.name.clone(), type_.clone());
        Ok(type_)
    }

    pub fn compound(&mut self, name: &str, fields: Vec<Field>) -> Result<TypeRef, TypeError> {
        self.register(Type::compound(name, fields))
    }

    /// `List<T>`, created once per element type.
    pub fn list_of(&mut self, element: &TypeRef) -> TypeRef {
        if element.is_any() {
            return self.builtins.list.clone();
        }
        let name = format!("List<{}>", element.name);
        if let Some(existing) = self.types.get(&name) {
            return existing.clone();
        }
        let list = Type::list_of(element);
        self.types.insert(name, list.clone());
        list
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
