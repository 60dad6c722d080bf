use crate::{
    graph::{Graph, GraphError, TermId},
    runtime::{
        BuiltinFn,
        builtin_function::BuiltinFunction,
        feedback::{self, FeedbackFunction},
        function::{Function, FunctionKind, SpecializeFn},
        overload::{specialize_cond, specialize_element, specialize_first_input, specialize_list},
        types::{TypeRef, TypeRegistry},
        world::World,
    },
};

mod helpers;
mod list_ops;
mod logic_ops;
mod math_ops;

#[cfg(test)]
mod logic_ops_test;

use list_ops::{
    builtin_any_true, builtin_concat_lists, builtin_filter, builtin_get_index, builtin_length, builtin_list,
    builtin_range,
};
use logic_ops::{
    builtin_assert, builtin_changed, builtin_concat, builtin_cond, builtin_equals, builtin_less_than, builtin_not,
    builtin_print, builtin_raise, builtin_to_string, builtin_unique_id,
};
use math_ops::{
    builtin_add_f, builtin_add_i, builtin_cos, builtin_div, builtin_mult_f, builtin_mult_i, builtin_neg,
    builtin_sin, builtin_sub_f, builtin_sub_i,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effects {
    Pure,
    Impure,
    SideEffects,
}

/// Kernel registration entry for a native function. Types are referenced by
/// registry name.
struct BuiltinSpec {
    builtin: BuiltinFunction,
    inputs: &'static [(&'static str, &'static str)],
    output: &'static str,
    variadic: bool,
    state: Option<&'static str>,
    effects: Effects,
    feedback: Option<FeedbackFunction>,
    specialize: Option<SpecializeFn>,
}

impl BuiltinSpec {
    const fn new(
        name: &'static str,
        func: BuiltinFn,
        inputs: &'static [(&'static str, &'static str)],
        output: &'static str,
    ) -> Self {
        Self {
            builtin: BuiltinFunction::new(name, func),
            inputs,
            output,
            variadic: false,
            state: None,
            effects: Effects::Pure,
            feedback: None,
            specialize: None,
        }
    }

    const fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    const fn stateful(mut self, state: &'static str) -> Self {
        self.state = Some(state);
        self
    }

    const fn effects(mut self, effects: Effects) -> Self {
        self.effects = effects;
        self
    }

    const fn feedback(mut self, feedback: FeedbackFunction) -> Self {
        self.feedback = Some(feedback);
        self
    }

    const fn specialize(mut self, specialize: SpecializeFn) -> Self {
        self.specialize = Some(specialize);
        self
    }

    fn record(&self, types: &TypeRegistry) -> Function {
        let resolve = |name: &str| -> TypeRef { types.get(name).unwrap_or_else(|| types.builtins().any.clone()) };
        let mut record = Function::new(self.builtin.name, FunctionKind::Builtin(self.builtin), resolve(self.output));
        for &(name, type_name) in self.inputs {
            record = record.with_input(name, resolve(type_name));
        }
        if self.variadic {
            record = record.variadic();
        }
        if let Some(state) = self.state {
            record = record.stateful(resolve(state));
        }
        record = match self.effects {
            Effects::Pure => record,
            Effects::Impure => record.impure(),
            Effects::SideEffects => record.side_effects(),
        };
        if let Some(feedback) = self.feedback {
            record = record.with_feedback(feedback);
        }
        if let Some(specialize) = self.specialize {
            record = record.with_specialize(specialize);
        }
        record
    }
}

const NUMBERS: &[(&str, &str)] = &[("a", "number"), ("b", "number")];
const INTS: &[(&str, &str)] = &[("a", "int"), ("b", "int")];

/// All builtins in kernel definition order.
static BUILTINS: &[BuiltinSpec] = &[
    BuiltinSpec::new("add_i", builtin_add_i, INTS, "int").feedback(feedback::ADD_FEEDBACK),
    BuiltinSpec::new("add_f", builtin_add_f, NUMBERS, "number").feedback(feedback::ADD_FEEDBACK),
    BuiltinSpec::new("sub_i", builtin_sub_i, INTS, "int").feedback(feedback::SUB_FEEDBACK),
    BuiltinSpec::new("sub_f", builtin_sub_f, NUMBERS, "number").feedback(feedback::SUB_FEEDBACK),
    BuiltinSpec::new("mult_i", builtin_mult_i, INTS, "int").feedback(feedback::MULT_FEEDBACK),
    BuiltinSpec::new("mult_f", builtin_mult_f, NUMBERS, "number").feedback(feedback::MULT_FEEDBACK),
    BuiltinSpec::new("div", builtin_div, NUMBERS, "number"),
    BuiltinSpec::new("neg", builtin_neg, &[("x", "number")], "number").feedback(feedback::NEG_FEEDBACK),
    BuiltinSpec::new("sin", builtin_sin, &[("x", "number")], "number").feedback(feedback::SIN_FEEDBACK),
    BuiltinSpec::new("cos", builtin_cos, &[("x", "number")], "number").feedback(feedback::COS_FEEDBACK),
    BuiltinSpec::new("list", builtin_list, &[("items", "any")], "List")
        .variadic()
        .specialize(specialize_list),
    BuiltinSpec::new("length", builtin_length, &[("x", "any")], "int"),
    BuiltinSpec::new("get_index", builtin_get_index, &[("list", "List"), ("index", "int")], "any")
        .specialize(specialize_element),
    BuiltinSpec::new("filter", builtin_filter, &[("items", "List"), ("mask", "List")], "List")
        .specialize(specialize_first_input),
    BuiltinSpec::new("range", builtin_range, &[("bounds", "int")], "List")
        .variadic()
        .specialize(specialize_int_list),
    BuiltinSpec::new("extend", builtin_concat_lists, &[("lists", "List")], "List").variadic(),
    BuiltinSpec::new("any_true", builtin_any_true, &[("items", "List")], "bool"),
    BuiltinSpec::new("equals", builtin_equals, &[("a", "any"), ("b", "any")], "bool"),
    BuiltinSpec::new("not", builtin_not, &[("x", "bool")], "bool"),
    BuiltinSpec::new("less_than", builtin_less_than, NUMBERS, "bool"),
    BuiltinSpec::new("cond", builtin_cond, &[("condition", "bool"), ("a", "any"), ("b", "any")], "any")
        .feedback(feedback::COND_FEEDBACK)
        .specialize(specialize_cond),
    BuiltinSpec::new("assert", builtin_assert, &[("condition", "bool")], "void").effects(Effects::SideEffects),
    BuiltinSpec::new("raise", builtin_raise, &[("message", "string")], "void").effects(Effects::SideEffects),
    BuiltinSpec::new("print", builtin_print, &[("items", "any")], "void")
        .variadic()
        .effects(Effects::SideEffects),
    BuiltinSpec::new("to_string", builtin_to_string, &[("x", "any")], "string"),
    BuiltinSpec::new("concat", builtin_concat, &[("items", "any")], "string").variadic(),
    BuiltinSpec::new("unique_id", builtin_unique_id, &[], "int").effects(Effects::Impure),
    BuiltinSpec::new("changed", builtin_changed, &[("x", "any")], "bool").stateful("any"),
];

/// Overloaded kernel names and their candidates, tried in this order.
const OVERLOADS: &[(&str, &[&str])] = &[
    ("add", &["add_i", "add_f"]),
    ("sub", &["sub_i", "sub_f"]),
    ("mult", &["mult_i", "mult_f"]),
];

fn specialize_int_list(_: &Graph, registry: &mut TypeRegistry, _: TermId) -> Option<TypeRef> {
    let int = registry.builtins().int.clone();
    Some(registry.list_of(&int))
}

/// Defines every builtin and overload in the kernel branch.
pub fn register_builtins(world: &mut World) -> Result<(), GraphError> {
    let kernel = world.kernel();
    for spec in BUILTINS {
        let record = spec.record(&world.types);
        world.define_function(kernel, record)?;
    }
    for (name, candidates) in OVERLOADS {
        let ids: Vec<TermId> = candidates.iter().filter_map(|c| world.function(c)).collect();
        world.create_overloaded_function(kernel, name, ids)?;
    }
    log::debug!("registered {} builtins, {} overloads", BUILTINS.len(), OVERLOADS.len());
    Ok(())
}

/// Look up a builtin by name.
pub fn get_builtin(name: &str) -> Option<&'static BuiltinFunction> {
    BUILTINS.iter().map(|spec| &spec.builtin).find(|b| b.name == name)
}

#[cfg(test)]
use crate::runtime::{RuntimeContext, RuntimeError, types::BuiltinTypes, value::Value};

/// Stand-alone context for calling builtins without a world.
#[cfg(test)]
pub(crate) struct TestContext {
    registry: TypeRegistry,
    output_type: TypeRef,
    pub state: Option<Value>,
    next_id: i64,
}

#[cfg(test)]
impl TestContext {
    pub fn new() -> Self {
        let registry = TypeRegistry::new();
        let output_type = registry.builtins().any.clone();
        Self {
            registry,
            output_type,
            state: None,
            next_id: 1,
        }
    }

    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let builtin = get_builtin(name).unwrap_or_else(|| panic!("no builtin {}", name));
        builtin.call(self, args)
    }
}

#[cfg(test)]
impl RuntimeContext for TestContext {
    fn types(&self) -> &BuiltinTypes {
        self.registry.builtins()
    }

    fn registry(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    fn caller(&self) -> TermId {
        TermId::NULL
    }

    fn output_type(&self) -> &TypeRef {
        &self.output_type
    }

    fn state(&mut self) -> Option<&mut Value> {
        self.state.as_mut()
    }

    fn next_unique_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
