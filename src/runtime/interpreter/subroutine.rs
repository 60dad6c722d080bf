use crate::{
    graph::TermId,
    internal_error,
    runtime::{
        EvalError, RuntimeError, RuntimeErrorKind,
        cast::cast_value,
        frame::{Frame, FrameKind, Interrupt},
        function::FunctionKind,
        stack::Stack,
        value::Value,
        world::World,
    },
};

use super::{last_output, run_nested, state};

/// Input placeholders of a subroutine body, in parameter order.
pub(crate) fn placeholders(world: &World, def: TermId) -> Vec<TermId> {
    let Some(body) = world.graph.nested_id(def).and_then(|id| world.graph.branch(id)) else {
        return Vec::new();
    };
    body.iter()
        .filter(|id| world.graph.kind_of(*id) == Some(FunctionKind::InputPlaceholder))
        .collect()
}

/// Binds `args` to the placeholders of `function`'s body and runs it in a
/// subroutine frame. The result is the `return` value, else the last body
/// term.
pub(crate) fn call_subroutine(
    world: &mut World,
    stack: &mut Stack,
    caller: TermId,
    function: TermId,
    args: Vec<Value>,
) -> Result<Value, EvalError> {
    let name = world
        .graph
        .record_of(function)
        .map_or_else(String::new, |record| record.name.clone());
    let body = world
        .graph
        .nested_id(function)
        .ok_or_else(|| internal_error!("subroutine {} has no body", name))?;
    let len = world.graph.branch(body).map_or(0, |b| b.len());

    let params = placeholders(world, function);
    if params.len() != args.len() {
        return Err(RuntimeError::new(RuntimeErrorKind::WrongNumberOfInputs {
            function: name,
            found: args.len(),
            expected: params.len().to_string(),
        })
        .into());
    }

    let types = world.builtin_types().clone();
    let mut slots = state::load_slots(world, stack, caller);
    let frame_state = state::take_slot(&mut slots, 0, &types);
    let mut frame = Frame::new(body, FrameKind::Subroutine, len)
        .with_caller(caller)
        .with_state(frame_state);

    for (placeholder, arg) in params.iter().zip(args) {
        let (index, declared) = world
            .graph
            .term(*placeholder)
            .map(|t| (t.index, t.declared_type.clone()))
            .ok_or_else(|| internal_error!("placeholder {} vanished", placeholder))?;
        let value = cast_value(&arg, &declared).map_err(|e| RuntimeError::from(e).at(*placeholder))?;
        frame.set_register(index, value.clone());
        if let Some(t) = world.graph.term_mut(*placeholder) {
            t.output = value;
        }
    }

    let mut frame = run_nested(world, stack, frame)?;
    let frame_state = frame.state.take().unwrap_or_else(|| types.make_list(Vec::new()));
    state::put_slot(&mut slots, 0, frame_state, &types);
    state::store_slots(world, stack, caller, slots);

    Ok(match frame.interrupt.take() {
        Some(Interrupt::Return(value)) => value,
        _ => last_output(world, &frame),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{config::WorldConfig, interpreter::evaluate_branch, world::initialize_with_config};

    #[test]
    fn arguments_bind_in_order() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let mut stack = world.alloc_stack();
        let branch = world.create_branch();
        let int = world.builtin_types().int.clone();
        let def = world
            .define_subroutine(branch, "minus", &[("a", int.clone()), ("b", int.clone())], int)
            .unwrap();
        let body = world.subroutine_body(def).unwrap();
        let a = world.graph.lookup(body, "a").unwrap();
        let b = world.graph.lookup(body, "b").unwrap();
        world.call(body, "sub", vec![a, b]).unwrap();

        let ten = world.create_int(branch, 10, None).unwrap();
        let three = world.create_int(branch, 3, None).unwrap();
        let call = world.call(branch, "minus", vec![ten, three]).unwrap();
        evaluate_branch(&mut world, &mut stack, branch).unwrap();

        assert_eq!(placeholders(&world, def), vec![a, b]);
        assert_eq!(world.value_of(call).and_then(|v| v.as_int()), Some(7));
    }

    #[test]
    fn wrong_argument_count_is_runtime_error() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let mut stack = world.alloc_stack();
        let branch = world.create_branch();
        let int = world.builtin_types().int.clone();
        let def = world.define_subroutine(branch, "id", &[("x", int.clone())], int).unwrap();

        let err = crate::runtime::interpreter::run_function(&mut world, &mut stack, def, vec![]).unwrap_err();

        assert_eq!(err.to_string(), "Wrong number of inputs to id (found 0, expected 1)");
    }
}
