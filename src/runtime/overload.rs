//! Overload selection and output type specialization.
//!
//! Static resolution runs when a term is appended and looks only at declared
//! input types; whatever it cannot decide is resolved per evaluation from
//! the runtime value types.
use crate::{
    graph::{BranchId, Graph, GraphError, TermId},
    runtime::{
        cast::{type_fits_type, value_fits_type},
        function::{Function, FunctionKind, Param},
        types::{BuiltinTypes, TypeRef, TypeRegistry, default_value, same_type},
        value::Value,
        world::World,
    },
};

/// Rewrites an overloaded call to a concrete overload when the static input
/// types pick one, then specializes the declared output type.
pub fn resolve_on_append(world: &mut World, term: TermId) {
    let Some((function, inputs)) = world.graph.term(term).map(|t| (t.function, t.inputs.clone())) else {
        return;
    };
    if let Some(record) = world.graph.record_of(function) {
        if record.is_overloaded() {
            match statically_specialize(&world.graph, &record, &inputs) {
                Some(chosen) => {
                    log::debug!(
                        "{}: {} resolved statically to {}",
                        term,
                        record.name,
                        world.graph.record_of(chosen).map_or("?".to_string(), |r| r.name.clone())
                    );
                    if let Some(t) = world.graph.term_mut(term) {
                        t.function = chosen;
                    }
                }
                None => log::debug!("{}: {} deferred to evaluation", term, record.name),
            }
        }
    }
    specialize_declared_type(world, term);
}

/// Sets the term's declared type from its function's `specialize_type`, or
/// the function's output type when there is none.
pub fn specialize_declared_type(world: &mut World, term: TermId) {
    let Some(record) = world.graph.function_of(term) else {
        return;
    };
    let declared = record
        .specialize_type
        .and_then(|specialize| specialize(&world.graph, &mut world.types, term))
        .unwrap_or_else(|| record.output_type.clone());
    if let Some(t) = world.graph.term_mut(term) {
        t.output = default_value(&declared);
        t.declared_type = declared;
    }
}

/// First overload, in declaration order, whose parameters accept the
/// declared types of `inputs`.
pub fn statically_specialize(graph: &Graph, record: &Function, inputs: &[TermId]) -> Option<TermId> {
    record.overloads.as_ref()?.iter().copied().find(|candidate| {
        graph
            .record_of(*candidate)
            .is_some_and(|r| inputs_fit_statically(graph, &r, inputs))
    })
}

fn inputs_fit_statically(graph: &Graph, record: &Function, inputs: &[TermId]) -> bool {
    if !record.accepts_arity(inputs.len()) {
        return false;
    }
    inputs.iter().enumerate().all(|(index, input)| {
        match (graph.term(*input), record.input_type(index)) {
            (Some(actual), Some(expected)) => type_fits_type(&actual.declared_type, expected),
            _ => false,
        }
    })
}

pub fn values_fit(record: &Function, values: &[Value]) -> bool {
    if !record.accepts_arity(values.len()) {
        return false;
    }
    values
        .iter()
        .enumerate()
        .all(|(index, value)| record.input_type(index).is_some_and(|t| value_fits_type(value, t)))
}

/// First overload whose parameters accept the runtime values.
pub fn resolve_dynamic(graph: &Graph, record: &Function, values: &[Value]) -> Option<TermId> {
    record.overloads.as_ref()?.iter().copied().find(|candidate| {
        graph
            .record_of(*candidate)
            .is_some_and(|r| values_fit(&r, values))
    })
}

/// Shared type of `candidates`: the type itself when they all agree, `any`
/// otherwise.
pub fn common_type(types: &BuiltinTypes, candidates: &[TypeRef]) -> TypeRef {
    let Some(first) = candidates.first() else {
        return types.any.clone();
    };
    if candidates.iter().all(|t| same_type(t, first)) {
        first.clone()
    } else {
        types.any.clone()
    }
}

fn input_type(graph: &Graph, term: TermId, index: usize) -> Option<TypeRef> {
    let input = graph.term(term)?.inputs.get(index).copied()?;
    Some(graph.term(input)?.declared_type.clone())
}

/// `get_index(List<T>, int) -> T`.
pub fn specialize_element(graph: &Graph, _: &mut TypeRegistry, term: TermId) -> Option<TypeRef> {
    input_type(graph, term, 0)?.element.clone()
}

/// `cond(c, a, b)` has the common type of `a` and `b`.
pub fn specialize_cond(graph: &Graph, registry: &mut TypeRegistry, term: TermId) -> Option<TypeRef> {
    let branches = [input_type(graph, term, 1)?, input_type(graph, term, 2)?];
    Some(common_type(registry.builtins(), &branches))
}

/// `list(a, b, ...)` is `List<T>` when every item has type `T`.
pub fn specialize_list(graph: &Graph, registry: &mut TypeRegistry, term: TermId) -> Option<TypeRef> {
    let count = graph.term(term)?.inputs.len();
    if count == 0 {
        return None;
    }
    let items: Option<Vec<TypeRef>> = (0..count).map(|i| input_type(graph, term, i)).collect();
    let element = common_type(registry.builtins(), &items?);
    Some(registry.list_of(&element))
}

/// A case join has the common type of the bindings it picks from.
pub fn specialize_join(graph: &Graph, registry: &mut TypeRegistry, term: TermId) -> Option<TypeRef> {
    let count = graph.term(term)?.inputs.len();
    let sources: Option<Vec<TypeRef>> = (1..count).map(|i| input_type(graph, term, i)).collect();
    Some(common_type(registry.builtins(), &sources?))
}

/// Output has the type of the first input.
pub fn specialize_first_input(graph: &Graph, _: &mut TypeRegistry, term: TermId) -> Option<TypeRef> {
    input_type(graph, term, 0)
}

impl World {
    /// Defines `name` as an overloaded function over `overloads`, tried in
    /// the given order.
    pub fn create_overloaded_function(
        &mut self,
        branch: BranchId,
        name: &str,
        overloads: Vec<TermId>,
    ) -> Result<TermId, GraphError> {
        let records = overloads
            .iter()
            .map(|id| self.graph.record_of(*id).ok_or(GraphError::NotAFunction(*id)))
            .collect::<Result<Vec<_>, _>>()?;

        let outputs: Vec<TypeRef> = records.iter().map(|r| r.output_type.clone()).collect();
        let output_type = common_type(self.types.builtins(), &outputs);

        let arity = records.first().map_or(0, |r| r.inputs.len());
        let uniform = records.iter().all(|r| !r.variadic && r.inputs.len() == arity);
        let inputs: Vec<Param> = (0..arity)
            .map(|i| {
                let types: Vec<TypeRef> = records
                    .iter()
                    .filter_map(|r| r.inputs.get(i).map(|p| p.type_.clone()))
                    .collect();
                let name = records
                    .first()
                    .and_then(|r| r.inputs.get(i))
                    .map_or("input", |p| p.name.as_str())
                    .to_string();
                Param::new(&name, common_type(self.types.builtins(), &types))
            })
            .collect();

        let mut record = Function::new(name, FunctionKind::Overloaded, output_type)
            .with_inputs(inputs)
            .with_overloads(overloads);
        record.variadic = !uniform;
        record.is_pure = records.iter().all(|r| r.is_pure);
        record.has_side_effects = records.iter().any(|r| r.has_side_effects);
        let first_feedback = records.first().and_then(|r| r.feedback);
        if let Some(feedback) = first_feedback {
            if records.iter().all(|r| r.feedback.is_some_and(|f| f.name == feedback.name)) {
                record.feedback = Some(feedback);
            }
        }
        self.define_function(branch, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{config::WorldConfig, world::initialize_with_config};

    #[test]
    fn common_type_agrees_or_falls_back_to_any() {
        let types = BuiltinTypes::new();
        assert_eq!(common_type(&types, &[types.int.clone(), types.int.clone()]).name, "int");
        assert_eq!(common_type(&types, &[types.int.clone(), types.float.clone()]).name, "any");
        assert_eq!(common_type(&types, &[]).name, "any");
    }

    #[test]
    fn int_inputs_pick_first_overload() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let branch = world.create_branch();
        let a = world.create_int(branch, 1, None).unwrap();
        let b = world.create_float(branch, 2.0, None).unwrap();
        let add = world.function("add").unwrap();

        let ints = world.append(branch, add, vec![a, a]).unwrap();
        let mixed = world.append(branch, add, vec![a, b]).unwrap();

        assert_eq!(world.graph.term(ints).unwrap().function, world.function("add_i").unwrap());
        assert_eq!(world.graph.term(mixed).unwrap().function, world.function("add_f").unwrap());
        assert_eq!(world.graph.term(mixed).unwrap().declared_type.name, "number");
    }

    #[test]
    fn specialization_is_idempotent() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let branch = world.create_branch();
        let t = world.builtin_types().clone();
        let list = world.create_list(branch, vec![t.make_int(1), t.make_int(2)], None).unwrap();
        let zero = world.create_int(branch, 0, None).unwrap();
        let get = world.call(branch, "get_index", vec![list, zero]).unwrap();

        assert_eq!(world.graph.term(get).unwrap().declared_type.name, "int");
        specialize_declared_type(&mut world, get);
        specialize_declared_type(&mut world, get);
        assert_eq!(world.graph.term(get).unwrap().declared_type.name, "int");
    }

    #[test]
    fn dynamic_resolution_uses_runtime_types() {
        let world = initialize_with_config(WorldConfig::default()).unwrap();
        let t = world.builtin_types().clone();
        let add = world.graph.record_of(world.function("add").unwrap()).unwrap();
        let chosen = resolve_dynamic(&world.graph, &add, &[t.make_float(1.0), t.make_int(1)]);
        assert_eq!(chosen, world.function("add_f"));
        assert_eq!(resolve_dynamic(&world.graph, &add, &[t.make_string("a"), t.make_int(1)]), None);
    }
}
