use crate::{
    graph::{BranchId, TermId, building::LOOP_INDEX_NAME},
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

use super::{input_value, last_output, run_nested, state};

fn nested_body(world: &World, term: TermId) -> Option<(BranchId, usize)> {
    let body = world.graph.nested_id(term)?;
    Some((body, world.graph.branch(body)?.len()))
}

/// First case of `if_block` whose condition holds, or the else-case, with
/// its index. Conditions live outside the block, so asking again after the
/// block ran gives the same answer.
fn chosen_case(world: &World, stack: &Stack, if_block: TermId) -> Result<Option<(usize, TermId)>, EvalError> {
    let cases: Vec<TermId> = world
        .graph
        .nested_id(if_block)
        .and_then(|id| world.graph.branch(id))
        .map(|cases| cases.terms.clone())
        .unwrap_or_default();

    for (index, case) in cases.iter().enumerate() {
        let condition = world.graph.term(*case).and_then(|t| t.inputs.first().copied());
        let Some(condition) = condition else {
            return Ok(Some((index, *case)));
        };
        let value = input_value(world, stack, condition)?;
        match value.as_bool() {
            Some(true) => return Ok(Some((index, *case))),
            Some(false) => {}
            None => {
                return Err(RuntimeError::new(RuntimeErrorKind::InvalidInput {
                    function: "case".to_string(),
                    index: 0,
                    expected: "bool".to_string(),
                    found: value.type_name().to_string(),
                })
                .at(*case)
                .into());
            }
        }
    }
    Ok(None)
}

/// Runs the first case whose condition holds, or the else-case. Each case
/// index owns one state slot of the if-block.
pub(crate) fn evaluate_if(world: &mut World, stack: &mut Stack, term: TermId) -> Result<Value, EvalError> {
    let types = world.builtin_types().clone();
    let chosen = chosen_case(world, stack, term)?;

    let Some((index, case)) = chosen else {
        return Ok(types.null());
    };
    let Some((body, len)) = nested_body(world, case) else {
        return Ok(types.null());
    };

    let mut slots = state::load_slots(world, stack, term);
    let frame_state = state::take_slot(&mut slots, index, &types);
    let frame = Frame::new(body, FrameKind::Case, len)
        .with_caller(term)
        .with_state(frame_state);
    let mut frame = run_nested(world, stack, frame)?;
    let output = last_output(world, &frame);
    let frame_state = frame.state.take().unwrap_or_else(|| types.make_list(Vec::new()));
    state::put_slot(&mut slots, index, frame_state, &types);
    state::store_slots(world, stack, term, slots);
    Ok(output)
}

/// `args` are the block, one binding per case, then the fallback used when
/// no case ran.
pub(crate) fn evaluate_join(world: &mut World, stack: &mut Stack, term: TermId, args: Vec<Value>) -> Result<Value, EvalError> {
    let block = world.graph.term(term).map_or(TermId::NULL, |t| t.input(0));
    let position = match chosen_case(world, stack, block)? {
        Some((index, _)) => index + 1,
        None => args.len().saturating_sub(1),
    };
    match args.into_iter().enumerate().find(|(i, _)| *i == position && *i > 0) {
        Some((_, value)) => Ok(value),
        None => Ok(world.builtin_types().null()),
    }
}

/// One loop frame per element. The iterator placeholder holds the element
/// cast to its declared type, the index placeholder the iteration number. The
/// output lists the result of every iteration that ran to completion.
pub(crate) fn evaluate_for(
    world: &mut World,
    stack: &mut Stack,
    term: TermId,
    args: Vec<Value>,
) -> Result<Value, EvalError> {
    let types = world.builtin_types().clone();
    let list = args.into_iter().next().unwrap_or_else(|| types.null());
    let Some(items) = list.as_list().map(<[Value]>::to_vec) else {
        return Err(RuntimeError::new(RuntimeErrorKind::InvalidInput {
            function: "for".to_string(),
            index: 0,
            expected: "List".to_string(),
            found: list.type_name().to_string(),
        })
        .into());
    };
    let Some((body, len)) = nested_body(world, term) else {
        return Ok(types.make_list(Vec::new()));
    };

    let placeholders: Vec<TermId> = world
        .graph
        .branch(body)
        .map(|b| {
            b.iter()
                .filter(|id| world.graph.kind_of(*id) == Some(FunctionKind::InputPlaceholder))
                .collect()
        })
        .unwrap_or_default();
    let index_term = placeholders
        .iter()
        .copied()
        .find(|id| world.graph.term(*id).and_then(|t| t.name()) == Some(LOOP_INDEX_NAME));
    let iterator = placeholders.iter().copied().find(|id| Some(*id) != index_term);
    let iterator = iterator.and_then(|id| world.graph.term(id).map(|t| (id, t.index, t.declared_type.clone())));
    let index_slot = index_term.and_then(|id| world.graph.term(id).map(|t| t.index));

    let mut slots = state::load_slots(world, stack, term);
    let mut results = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let frame_state = state::take_slot(&mut slots, i, &types);
        let mut frame = Frame::new(body, FrameKind::Loop, len)
            .with_caller(term)
            .with_iteration(i)
            .with_state(frame_state);
        if let Some((id, index, declared)) = &iterator {
            let value = cast_value(item, declared).map_err(|e| RuntimeError::from(e).at(*id))?;
            frame.set_register(*index, value.clone());
            if let Some(t) = world.graph.term_mut(*id) {
                t.output = value;
            }
        }
        if let Some(index) = index_slot {
            frame.set_register(index, types.make_int(i as i64));
        }

        let mut frame = run_nested(world, stack, frame)?;
        let frame_state = frame.state.take().unwrap_or_else(|| types.make_list(Vec::new()));
        state::put_slot(&mut slots, i, frame_state, &types);
        match frame.interrupt.take() {
            None => results.push(last_output(world, &frame)),
            Some(Interrupt::Continue) => {}
            Some(Interrupt::Break) | Some(Interrupt::Return(_)) => break,
        }
    }
    state::store_slots(world, stack, term, slots);
    Ok(types.make_list(results))
}

/// Recovers from a runtime error raised anywhere in the body; the term's
/// output is then null. Static and internal errors still propagate.
pub(crate) fn evaluate_ignore_error(world: &mut World, stack: &mut Stack, term: TermId) -> Result<Value, EvalError> {
    let types = world.builtin_types().clone();
    let Some((body, len)) = nested_body(world, term) else {
        return Ok(types.null());
    };
    let mut slots = state::load_slots(world, stack, term);
    let frame_state = state::take_slot(&mut slots, 0, &types);
    let frame = Frame::new(body, FrameKind::IgnoreError, len)
        .with_caller(term)
        .with_state(frame_state)
        .ignoring_errors();

    match run_nested(world, stack, frame) {
        Ok(mut frame) => {
            let output = last_output(world, &frame);
            let frame_state = frame.state.take().unwrap_or_else(|| types.make_list(Vec::new()));
            state::put_slot(&mut slots, 0, frame_state, &types);
            state::store_slots(world, stack, term, slots);
            Ok(output)
        }
        Err(EvalError::Runtime(err)) => {
            log::debug!("{}: ignored error: {}", term, err);
            Ok(types.null())
        }
        Err(other) => Err(other),
    }
}
