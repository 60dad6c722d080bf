use std::fmt;

use crate::runtime::{BuiltinFn, RuntimeContext, RuntimeError, value::Value};

/// Native function tagged by a stable name. Records compare by tag, so a
/// function term built in one world matches the same builtin in another.
#[derive(Clone, Copy)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl BuiltinFunction {
    pub const fn new(name: &'static str, func: BuiltinFn) -> Self {
        Self { name, func }
    }

    pub fn call(&self, ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
        (self.func)(ctx, args)
    }
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "builtin:{}", self.name)
    }
}

impl fmt::Display for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl PartialEq for BuiltinFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for BuiltinFunction {}
