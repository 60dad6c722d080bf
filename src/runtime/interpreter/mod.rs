//! Frame-stack interpreter.
//!
//! Every activation of a branch (the root pass, a subroutine call, one loop
//! iteration, a taken case) is a [`Frame`] on the host's [`Stack`]. Terms are
//! evaluated in declaration order; each result lands in the frame's register
//! for that term and in the term's `output`.
pub mod control_flow;
pub mod state;
pub mod subroutine;

use crate::{
    graph::{
        BranchId, TermId, TermStatus,
        building::LOOP_INDEX_NAME,
        validation::{StaticError, StaticErrorKind, check_branch, check_term},
    },
    internal_error,
    runtime::{
        EvalError, RuntimeContext, RuntimeError, RuntimeErrorKind,
        builtin_function::BuiltinFunction,
        cast::cast_value,
        config::StaticErrorPolicy,
        feedback,
        frame::{Frame, FrameKind, Interrupt},
        function::{Function, FunctionKind},
        overload,
        stack::Stack,
        types::{BuiltinTypes, TypeRef, TypeRegistry, default_value, same_type},
        value::{self, Value},
        world::World,
    },
};

/// One pass over `branch` (a script tick). State carried by stateful terms
/// persists between passes.
pub fn evaluate_branch(world: &mut World, stack: &mut Stack, branch: BranchId) -> Result<(), EvalError> {
    stack.clear_error();
    let result = evaluate_root(world, stack, branch);
    if let Err(err) = &result {
        if !err.is_runtime() {
            stack.unwind_all();
        }
        stack.set_error(err.clone());
    }
    result
}

fn evaluate_root(world: &mut World, stack: &mut Stack, branch: BranchId) -> Result<(), EvalError> {
    let len = world
        .graph
        .branch(branch)
        .ok_or_else(|| internal_error!("unknown branch {}", branch))?
        .len();

    for id in world.graph.walk(branch) {
        if let Some(term) = world.graph.term_mut(id) {
            if !term.is_function() {
                term.status = TermStatus::Pending;
            }
        }
    }

    if world.config.static_error_policy == StaticErrorPolicy::Refuse {
        let errors = check_branch(&world.graph, branch);
        if !errors.is_empty() {
            log::debug!("refusing to evaluate {}: {} static errors", branch, errors.len());
            return Err(EvalError::Static(errors));
        }
    }

    run_nested(world, stack, Frame::new(branch, FrameKind::Root, len))?;
    Ok(())
}

/// Calls `function` from the host. The function term itself is the caller,
/// so state of a stateful function persists on its definition.
pub fn run_function(
    world: &mut World,
    stack: &mut Stack,
    function: TermId,
    inputs: Vec<Value>,
) -> Result<Vec<Value>, EvalError> {
    stack.clear_error();
    let result = run_function_inner(world, stack, function, inputs);
    if let Err(err) = &result {
        if !err.is_runtime() {
            stack.unwind_all();
        }
        stack.set_error(err.clone());
    }
    result
}

fn run_function_inner(
    world: &mut World,
    stack: &mut Stack,
    function: TermId,
    inputs: Vec<Value>,
) -> Result<Vec<Value>, EvalError> {
    let record = world
        .graph
        .record_of(function)
        .ok_or_else(|| internal_error!("{} is not a function", function))?;

    if record.kind == FunctionKind::Subroutine && world.config.static_error_policy == StaticErrorPolicy::Refuse {
        if let Some(body) = world.graph.nested_id(function) {
            let errors = check_branch(&world.graph, body);
            if !errors.is_empty() {
                return Err(EvalError::Static(errors));
            }
        }
    }

    let value = invoke(world, stack, function, function, inputs)?;
    let value = if record.output_type.is_any() || same_type(value.type_(), &record.output_type) {
        value
    } else {
        cast_value(&value, &record.output_type).map_err(|e| RuntimeError::from(e).at(function))?
    };
    Ok(vec![value])
}

/// Pushes `frame`, runs it to completion and pops it again, also on error.
pub(crate) fn run_nested(world: &mut World, stack: &mut Stack, frame: Frame) -> Result<Frame, EvalError> {
    stack.check_depth()?;
    stack.push_frame(frame);
    let result = run_frame(world, stack);
    let frame = stack
        .pop_frame()
        .ok_or_else(|| internal_error!("frame stack underflow"))?;
    result?;
    Ok(frame)
}

fn run_frame(world: &mut World, stack: &mut Stack) -> Result<(), EvalError> {
    loop {
        let frame = stack.top().ok_or_else(|| internal_error!("no frame to run"))?;
        if frame.interrupt.is_some() {
            break;
        }
        let next = world
            .graph
            .branch(frame.branch)
            .and_then(|branch| branch.get(frame.term_index));
        let Some(term) = next else {
            break;
        };
        evaluate_term(world, stack, term)?;
        if let Some(frame) = stack.top_mut() {
            frame.term_index += 1;
        }
    }
    state::commit_declared_state(world, stack)
}

/// Problems that make a term impossible to evaluate at all.
fn blocking_error(world: &World, term: TermId) -> Option<StaticErrorKind> {
    let t = world.graph.term(term)?;
    if let Some(annotation) = &t.static_error {
        return Some(annotation.clone());
    }
    if world.graph.record_of(t.function).is_none() {
        return Some(StaticErrorKind::NullFunction);
    }
    t.inputs
        .iter()
        .position(|input| !world.graph.contains_term(*input))
        .map(StaticErrorKind::NullInput)
}

fn has_errored_input(world: &World, term: TermId) -> bool {
    world.graph.term(term).is_some_and(|t| {
        t.inputs.iter().any(|input| {
            world
                .graph
                .term(*input)
                .is_some_and(|i| i.status == TermStatus::Errored)
        })
    })
}

fn skip_term(world: &mut World, stack: &mut Stack, term: TermId, reason: &str) {
    let null = world.builtin_types().null();
    let Some(t) = world.graph.term_mut(term) else {
        return;
    };
    log::debug!("skipping {}: {}", term, reason);
    t.status = TermStatus::Errored;
    t.output = null.clone();
    let (branch, index) = (t.owning_branch, t.index);
    set_register(stack, branch, index, null);
}

fn set_register(stack: &mut Stack, branch: BranchId, index: usize, value: Value) {
    if let Some(frame) = stack.top_mut() {
        if frame.branch == branch {
            frame.set_register(index, value);
        }
    }
}

fn mark_errored(world: &mut World, term: TermId) {
    if let Some(t) = world.graph.term_mut(term) {
        t.status = TermStatus::Errored;
    }
}

pub(crate) fn evaluate_term(world: &mut World, stack: &mut Stack, term: TermId) -> Result<(), EvalError> {
    let policy = world.config.static_error_policy;
    if let Some(kind) = blocking_error(world, term) {
        if policy == StaticErrorPolicy::Refuse {
            return Err(EvalError::Static(vec![StaticError { term, kind }]));
        }
        skip_term(world, stack, term, &kind.to_string());
        return Ok(());
    }
    if policy == StaticErrorPolicy::SkipAffected {
        if let Some(kind) = check_term(&world.graph, term) {
            skip_term(world, stack, term, &kind.to_string());
            return Ok(());
        }
        if has_errored_input(world, term) {
            skip_term(world, stack, term, "an input is errored");
            return Ok(());
        }
    }

    let t = world
        .graph
        .term(term)
        .ok_or_else(|| internal_error!("term {} vanished", term))?;
    let (inputs, function) = (t.inputs.clone(), t.function);
    let record = world
        .graph
        .record_of(function)
        .ok_or_else(|| internal_error!("function of {} vanished", term))?;

    if let Some(t) = world.graph.term_mut(term) {
        t.status = TermStatus::Evaluating;
    }
    let args = inputs
        .iter()
        .map(|input| input_value(world, stack, *input))
        .collect::<Result<Vec<_>, _>>()?;

    if world.config.trace {
        let rendered: Vec<String> = args.iter().map(value::repr).collect();
        log::trace!("[{}] {} {}({})", stack.depth(), term, record.name, rendered.join(", "));
    }

    match dispatch(world, stack, term, function, &record, args) {
        Ok(Some(output)) => write_output(world, stack, term, output),
        Ok(None) => keep_output(world, stack, term),
        Err(EvalError::Runtime(err)) => {
            mark_errored(world, term);
            if stack.frames().iter().any(|frame| frame.ignore_errors) {
                log::debug!("{} raised {} inside ignore_error", term, err);
            }
            Err(EvalError::Runtime(err.at(term)))
        }
        Err(err) => {
            mark_errored(world, term);
            Err(err)
        }
    }
}

/// Value of `input` as seen from the current activation: the register of
/// the innermost frame running the input's branch, else its stored output.
pub(crate) fn input_value(world: &World, stack: &Stack, input: TermId) -> Result<Value, EvalError> {
    let t = world
        .graph
        .term(input)
        .ok_or_else(|| internal_error!("dangling input {}", input))?;
    if let Some(frame) = stack.frames().iter().rev().find(|f| f.branch == t.owning_branch) {
        if let Some(value) = frame.register(t.index) {
            return Ok(value.clone());
        }
    }
    Ok(t.output.clone())
}

fn write_output(world: &mut World, stack: &mut Stack, term: TermId, output: Value) -> Result<(), EvalError> {
    let t = world
        .graph
        .term(term)
        .ok_or_else(|| internal_error!("term {} vanished", term))?;
    let declared = t.declared_type.clone();
    let output = if declared.is_any() || same_type(output.type_(), &declared) {
        output
    } else {
        match cast_value(&output, &declared) {
            Ok(cast) => cast,
            Err(err) => {
                mark_errored(world, term);
                return Err(RuntimeError::from(err).at(term).into());
            }
        }
    };

    let Some(t) = world.graph.term_mut(term) else {
        return Err(internal_error!("term {} vanished", term));
    };
    t.output = output.clone();
    t.status = TermStatus::Done;
    let (branch, index) = (t.owning_branch, t.index);
    set_register(stack, branch, index, output);
    Ok(())
}

fn keep_output(world: &mut World, stack: &mut Stack, term: TermId) -> Result<(), EvalError> {
    let Some(t) = world.graph.term_mut(term) else {
        return Err(internal_error!("term {} vanished", term));
    };
    t.status = TermStatus::Done;
    let (branch, index) = (t.owning_branch, t.index);
    let output = t.output.clone();
    if let Some(frame) = stack.top_mut() {
        if frame.branch == branch && frame.register(index).is_none() {
            frame.set_register(index, output);
        }
    }
    Ok(())
}

/// Runs the strategy of the term's function. `None` keeps the term's existing
/// output (constants and placeholders).
fn dispatch(
    world: &mut World,
    stack: &mut Stack,
    term: TermId,
    function: TermId,
    record: &Function,
    args: Vec<Value>,
) -> Result<Option<Value>, EvalError> {
    let null = world.builtin_types().null();
    match record.kind {
        FunctionKind::Value | FunctionKind::InputPlaceholder | FunctionKind::Case => Ok(None),
        FunctionKind::Builtin(_) | FunctionKind::Subroutine | FunctionKind::Overloaded => {
            invoke(world, stack, term, function, args).map(Some)
        }
        FunctionKind::IfBlock => control_flow::evaluate_if(world, stack, term).map(Some),
        FunctionKind::CaseJoin => control_flow::evaluate_join(world, stack, term, args).map(Some),
        FunctionKind::ForLoop => control_flow::evaluate_for(world, stack, term, args).map(Some),
        FunctionKind::IgnoreError => control_flow::evaluate_ignore_error(world, stack, term).map(Some),
        FunctionKind::DeclaredState => state::evaluate_declared_state(world, stack, term).map(Some),
        FunctionKind::DoOnce => state::evaluate_do_once(world, stack, term).map(Some),
        FunctionKind::Return => {
            let value = args.into_iter().next().unwrap_or_else(|| null.clone());
            interrupt_return(stack, value);
            Ok(Some(null))
        }
        FunctionKind::Break => {
            interrupt_loop(stack, term, Interrupt::Break);
            Ok(Some(null))
        }
        FunctionKind::Continue => {
            interrupt_loop(stack, term, Interrupt::Continue);
            Ok(Some(null))
        }
        FunctionKind::Feedback => {
            let target = world.graph.term(term).map_or(TermId::NULL, |t| t.input(0));
            let desired = args.get(1).cloned().unwrap_or_else(|| null.clone());
            feedback::apply_feedback(world, target, desired)?;
            Ok(Some(null))
        }
        FunctionKind::Unknown => Ok(Some(null)),
    }
}

/// Applies `function` to `args` on behalf of `caller`.
pub(crate) fn invoke(
    world: &mut World,
    stack: &mut Stack,
    caller: TermId,
    function: TermId,
    args: Vec<Value>,
) -> Result<Value, EvalError> {
    let record = world
        .graph
        .record_of(function)
        .ok_or_else(|| internal_error!("{} is not a function", function))?;
    match record.kind {
        FunctionKind::Builtin(builtin) => call_builtin(world, stack, caller, &record, builtin, args),
        FunctionKind::Subroutine => subroutine::call_subroutine(world, stack, caller, function, args),
        FunctionKind::Overloaded => {
            let Some(chosen) = overload::resolve_dynamic(&world.graph, &record, &args) else {
                let inputs: Vec<&str> = args.iter().map(|arg| arg.type_name()).collect();
                log::warn!("{}: no overload of {} accepts ({})", caller, record.name, inputs.join(", "));
                return Err(RuntimeError::new(RuntimeErrorKind::NoMatchingOverload {
                    function: record.name.clone(),
                    inputs: inputs.join(", "),
                })
                .into());
            };
            invoke(world, stack, caller, chosen, args)
        }
        other => Err(internal_error!("{:?} cannot be invoked", other)),
    }
}

struct Invocation<'a> {
    registry: &'a mut TypeRegistry,
    caller: TermId,
    output_type: &'a TypeRef,
    state: Option<&'a mut Value>,
    unique_ids: &'a mut i64,
}

impl RuntimeContext for Invocation<'_> {
    fn types(&self) -> &BuiltinTypes {
        self.registry.builtins()
    }

    fn registry(&mut self) -> &mut TypeRegistry {
        &mut *self.registry
    }

    fn caller(&self) -> TermId {
        self.caller
    }

    fn output_type(&self) -> &TypeRef {
        self.output_type
    }

    fn state(&mut self) -> Option<&mut Value> {
        self.state.as_deref_mut()
    }

    fn next_unique_id(&mut self) -> i64 {
        let id = *self.unique_ids;
        *self.unique_ids += 1;
        id
    }
}

fn call_builtin(
    world: &mut World,
    stack: &mut Stack,
    caller: TermId,
    record: &Function,
    builtin: BuiltinFunction,
    args: Vec<Value>,
) -> Result<Value, EvalError> {
    let output_type = world
        .graph
        .term(caller)
        .filter(|t| !t.is_function())
        .map_or_else(|| record.output_type.clone(), |t| t.declared_type.clone());
    let mut slot = record.state_type.as_ref().map(|state_type| {
        state::load_state(world, stack, caller).unwrap_or_else(|| default_value(state_type))
    });

    let result = {
        let mut ctx = Invocation {
            registry: &mut world.types,
            caller,
            output_type: &output_type,
            state: slot.as_mut(),
            unique_ids: &mut world.next_unique_id,
        };
        builtin.call(&mut ctx, args)
    };
    let output = result?;
    if let Some(state) = slot {
        state::save_state(world, stack, caller, state);
    }
    Ok(output)
}

/// Sets `Return` on every frame up to and including the nearest subroutine
/// frame.
fn interrupt_return(stack: &mut Stack, value: Value) {
    for frame in stack.frames_mut().iter_mut().rev() {
        frame.interrupt = Some(Interrupt::Return(value.clone()));
        if frame.kind == FrameKind::Subroutine {
            break;
        }
    }
}

/// Interrupts frames from the top down to the nearest loop iteration.
/// Loops never extend across a subroutine call.
fn interrupt_loop(stack: &mut Stack, term: TermId, interrupt: Interrupt) {
    let frames = stack.frames_mut();
    let target = frames
        .iter()
        .rposition(|f| matches!(f.kind, FrameKind::Loop | FrameKind::Subroutine))
        .filter(|index| frames[*index].kind == FrameKind::Loop);
    let Some(target) = target else {
        log::warn!("{}: {:?} outside of a loop is ignored", term, interrupt);
        return;
    };
    for frame in frames[target..].iter_mut() {
        frame.interrupt = Some(interrupt.clone());
    }
}

/// Output of a finished activation: the last register in the frame, not
/// counting control terms and the loop index.
pub(crate) fn last_output(world: &World, frame: &Frame) -> Value {
    let null = world.builtin_types().null();
    let Some(branch) = world.graph.branch(frame.branch) else {
        return null;
    };
    for id in branch.terms.iter().rev() {
        let Some(t) = world.graph.term(*id) else {
            continue;
        };
        let control = matches!(
            world.graph.kind_of(*id),
            Some(FunctionKind::Return | FunctionKind::Break | FunctionKind::Continue | FunctionKind::Feedback)
        );
        if control || t.name() == Some(LOOP_INDEX_NAME) {
            continue;
        }
        if let Some(value) = frame.register(t.index) {
            return value.clone();
        }
    }
    null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{config::WorldConfig, world::initialize_with_config};

    #[test]
    fn straight_line_evaluation() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let mut stack = world.alloc_stack();
        let branch = world.create_branch();
        let a = world.create_int(branch, 2, None).unwrap();
        let b = world.create_int(branch, 3, None).unwrap();
        let sum = world.call(branch, "add", vec![a, b]).unwrap();
        let product = world.call(branch, "mult", vec![sum, b]).unwrap();

        evaluate_branch(&mut world, &mut stack, branch).unwrap();

        assert_eq!(world.value_of(sum).and_then(|v| v.as_int()), Some(5));
        assert_eq!(world.value_of(product).and_then(|v| v.as_int()), Some(15));
        assert_eq!(world.graph.term(product).unwrap().status, TermStatus::Done);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn runtime_error_carries_term() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let mut stack = world.alloc_stack();
        let branch = world.create_branch();
        let no = world.create_bool(branch, false, None).unwrap();
        let check = world.call(branch, "assert", vec![no]).unwrap();

        let err = evaluate_branch(&mut world, &mut stack, branch).unwrap_err();

        match err {
            EvalError::Runtime(err) => {
                assert_eq!(err.kind, RuntimeErrorKind::AssertionFailed);
                assert_eq!(err.term, Some(check));
            }
            other => panic!("expected runtime error, got {:?}", other),
        }
        assert!(stack.has_error());
        assert_eq!(stack.error_message(), "Assertion failed");
        assert_eq!(world.graph.term(check).unwrap().status, TermStatus::Errored);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn declared_output_type_casts_results() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let mut stack = world.alloc_stack();
        let branch = world.create_branch();
        let float = world.builtin_types().float.clone();
        let def = world.define_subroutine(branch, "one", &[], float).unwrap();
        let body = world.subroutine_body(def).unwrap();
        world.create_int(body, 1, None).unwrap();
        let call = world.call(branch, "one", vec![]).unwrap();

        evaluate_branch(&mut world, &mut stack, branch).unwrap();

        assert_eq!(world.value_of(call).and_then(|v| v.as_float()), Some(1.0));
    }

    #[test]
    fn run_function_calls_builtins_directly() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let mut stack = world.alloc_stack();
        let t = world.builtin_types().clone();
        let add = world.function("add").unwrap();

        let out = run_function(&mut world, &mut stack, add, vec![t.make_int(2), t.make_float(0.5)]).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_float(), Some(2.5));
    }

    #[test]
    fn no_matching_overload_at_runtime() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let mut stack = world.alloc_stack();
        let t = world.builtin_types().clone();
        let add = world.function("add").unwrap();

        let err = run_function(&mut world, &mut stack, add, vec![t.make_string("a"), t.make_int(1)]).unwrap_err();

        assert_eq!(err.to_string(), "No matching overload for add(string, int)");
        assert!(stack.has_error());
    }
}
