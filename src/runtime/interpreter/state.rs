//! Stateful-value threading.
//!
//! A term evaluated in a root frame keeps its state in `Term::state`. Inside
//! a nested frame the state lives in the frame state, a list of
//! `[ref, state]` pairs, which the control term that pushed the frame stores
//! in its own state: one slot per loop iteration or case index.
use std::collections::HashMap;

use serde::Serialize;

use crate::{
    graph::{BranchId, TermId},
    runtime::{
        EvalError, RuntimeError,
        cast::cast_value,
        frame::{Frame, FrameKind},
        function::FunctionKind,
        stack::Stack,
        types::{BuiltinTypes, TypeRef, default_value},
        value::Value,
        world::World,
    },
};

use super::{last_output, run_nested};

fn frame_state_get(frame_state: &Value, term: TermId) -> Option<Value> {
    frame_state.as_list()?.iter().find_map(|pair| match pair.as_list() {
        Some([key, state]) if key.as_ref() == Some(term) => Some(state.clone()),
        _ => None,
    })
}

fn frame_state_set(frame_state: &mut Value, term: TermId, state: Value, types: &BuiltinTypes) {
    let Some(pairs) = frame_state.as_list_mut() else {
        *frame_state = types.make_list(vec![types.make_list(vec![types.make_ref(term), state])]);
        return;
    };
    for pair in pairs.iter_mut() {
        if let Some(items) = pair.as_list_mut() {
            if items.len() == 2 && items[0].as_ref() == Some(term) {
                items[1] = state;
                return;
            }
        }
    }
    pairs.push(types.make_list(vec![types.make_ref(term), state]));
}

/// State of `term` in the current activation.
pub(crate) fn load_state(world: &World, stack: &Stack, term: TermId) -> Option<Value> {
    match stack.top().and_then(|frame| frame.state.as_ref()) {
        Some(frame_state) => frame_state_get(frame_state, term),
        None => world.graph.term(term)?.state.clone(),
    }
}

pub(crate) fn save_state(world: &mut World, stack: &mut Stack, term: TermId, state: Value) {
    if let Some(frame_state) = stack.top_mut().and_then(|frame| frame.state.as_mut()) {
        frame_state_set(frame_state, term, state, world.types.builtins());
        return;
    }
    if let Some(t) = world.graph.term_mut(term) {
        t.state = Some(state);
    }
}

/// Per-index frame states owned by a control term.
pub(crate) fn load_slots(world: &World, stack: &Stack, term: TermId) -> Vec<Value> {
    load_state(world, stack, term)
        .and_then(|state| state.as_list().map(<[Value]>::to_vec))
        .unwrap_or_default()
}

pub(crate) fn take_slot(slots: &mut [Value], index: usize, types: &BuiltinTypes) -> Value {
    match slots.get_mut(index) {
        Some(slot) if slot.as_list().is_some() => std::mem::replace(slot, types.make_list(Vec::new())),
        _ => types.make_list(Vec::new()),
    }
}

pub(crate) fn put_slot(slots: &mut Vec<Value>, index: usize, frame_state: Value, types: &BuiltinTypes) {
    if slots.len() <= index {
        slots.resize(index + 1, types.make_list(Vec::new()));
    }
    slots[index] = frame_state;
}

/// Writes slots back unless nothing stateful ever ran under `term`.
pub(crate) fn store_slots(world: &mut World, stack: &mut Stack, term: TermId, slots: Vec<Value>) {
    let empty = slots.iter().all(|slot| slot.as_list().is_some_and(|pairs| pairs.is_empty()));
    if empty && load_state(world, stack, term).is_none() {
        return;
    }
    let state = world.types.builtins().make_list(slots);
    save_state(world, stack, term, state);
}

/// `state T name = initial`: existing state wins; the initializer only runs
/// while the state is absent or no longer fits `T`.
pub(crate) fn evaluate_declared_state(world: &mut World, stack: &mut Stack, term: TermId) -> Result<Value, EvalError> {
    let declared = world
        .graph
        .term(term)
        .map(|t| t.declared_type.clone())
        .ok_or_else(|| crate::internal_error!("term {} vanished", term))?;

    if let Some(existing) = load_state(world, stack, term) {
        match cast_value(&existing, &declared) {
            Ok(state) => return Ok(state),
            Err(err) => log::warn!("{}: discarding state: {}", term, err),
        }
    }

    let initializer = world
        .graph
        .nested_id(term)
        .and_then(|id| world.graph.branch(id).map(|b| (id, b.len())))
        .filter(|(_, len)| *len > 0);
    let initial = match initializer {
        Some((branch, len)) => {
            let frame_state = world.types.builtins().make_list(Vec::new());
            let frame = Frame::new(branch, FrameKind::Initializer, len)
                .with_caller(term)
                .with_state(frame_state);
            let frame = run_nested(world, stack, frame)?;
            last_output(world, &frame)
        }
        None => default_value(&declared),
    };
    let state = cast_value(&initial, &declared).map_err(|e| RuntimeError::from(e).at(term))?;
    save_state(world, stack, term, state.clone());
    Ok(state)
}

/// End of a pass over a frame: for every declared state evaluated in it,
/// the final binding of its name in the same branch becomes the new state.
pub(crate) fn commit_declared_state(world: &mut World, stack: &mut Stack) -> Result<(), EvalError> {
    let Some(frame) = stack.top() else {
        return Ok(());
    };
    let Some(branch) = world.graph.branch(frame.branch) else {
        return Ok(());
    };

    let mut updates: Vec<(TermId, Value, TypeRef)> = Vec::new();
    for id in branch.iter() {
        if world.graph.kind_of(id) != Some(FunctionKind::DeclaredState) {
            continue;
        }
        let Some(t) = world.graph.term(id) else {
            continue;
        };
        if frame.register(t.index).is_none() {
            continue;
        }
        let Some(last) = t.name().and_then(|name| branch.get_named(name)) else {
            continue;
        };
        if last == id {
            continue;
        }
        let Some(value) = world
            .graph
            .term(last)
            .and_then(|binding| frame.register(binding.index))
        else {
            continue;
        };
        updates.push((id, value.clone(), t.declared_type.clone()));
    }

    for (id, value, declared) in updates {
        match cast_value(&value, &declared) {
            Ok(state) => save_state(world, stack, id, state),
            Err(err) => log::warn!("{}: rebinding not kept as state: {}", id, err),
        }
    }
    Ok(())
}

pub(crate) fn evaluate_do_once(world: &mut World, stack: &mut Stack, term: TermId) -> Result<Value, EvalError> {
    let types = world.types.builtins().clone();
    let done = load_state(world, stack, term)
        .and_then(|state| state.as_bool())
        .unwrap_or(false);
    if !done {
        if let Some(body) = world.graph.nested_id(term) {
            let len = world.graph.branch(body).map_or(0, |b| b.len());
            let frame = Frame::new(body, FrameKind::DoOnce, len)
                .with_caller(term)
                .with_state(types.make_list(Vec::new()));
            run_nested(world, stack, frame)?;
        }
        save_state(world, stack, term, types.make_bool(true));
    }
    Ok(types.null())
}

/// Drops every state value in `branch` and its nested branches.
pub fn reset_state(world: &mut World, branch: BranchId) {
    for id in world.graph.walk(branch) {
        if let Some(t) = world.graph.term_mut(id) {
            t.state = None;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub migrated: usize,
    pub discarded: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PairKey {
    /// Name and occurrence among terms bound to that name.
    Named(String, usize),
    /// Function name and occurrence among unnamed terms applying it.
    Unnamed(String, usize),
}

fn keyed_terms(world: &World, branch: BranchId) -> Vec<(PairKey, TermId)> {
    let Some(scope) = world.graph.branch(branch) else {
        return Vec::new();
    };
    let mut seen: HashMap<PairKey, usize> = HashMap::new();
    let mut out = Vec::new();
    for id in scope.iter() {
        let Some(t) = world.graph.term(id) else {
            continue;
        };
        let base = match t.name() {
            Some(name) => PairKey::Named(name.to_string(), 0),
            None => {
                let function = world.graph.function_of(id).map_or_else(String::new, |r| r.name.clone());
                PairKey::Unnamed(function, 0)
            }
        };
        let count = seen.entry(base.clone()).or_insert(0);
        let key = match base {
            PairKey::Named(name, _) => PairKey::Named(name, *count),
            PairKey::Unnamed(function, _) => PairKey::Unnamed(function, *count),
        };
        *count += 1;
        out.push((key, id));
    }
    out
}

fn pair_branches(world: &World, old: BranchId, new: BranchId, pairs: &mut Vec<(TermId, TermId)>) {
    let old_terms: HashMap<PairKey, TermId> = keyed_terms(world, old).into_iter().collect();
    for (key, new_id) in keyed_terms(world, new) {
        let Some(&old_id) = old_terms.get(&key) else {
            continue;
        };
        pairs.push((old_id, new_id));
        if let (Some(old_nested), Some(new_nested)) = (world.graph.nested_id(old_id), world.graph.nested_id(new_id)) {
            pair_branches(world, old_nested, new_nested, pairs);
        }
    }
}

/// Type a migrated state must fit, or `None` when the term keeps no state.
fn accepted_state_type(world: &World, term: TermId) -> Option<TypeRef> {
    let record = world.graph.function_of(term)?;
    match record.kind {
        FunctionKind::DeclaredState => world.graph.term(term).map(|t| t.declared_type.clone()),
        FunctionKind::IfBlock | FunctionKind::ForLoop | FunctionKind::IgnoreError | FunctionKind::Subroutine => {
            Some(world.builtin_types().list.clone())
        }
        _ => record.state_type.clone(),
    }
}

/// Carries state from the terms of `old` to their counterparts in `new`.
/// Terms pair up by name (or, unnamed, by function and ordinal); states that
/// no longer fit the new term are discarded.
pub fn migrate_stateful_values(world: &mut World, old: BranchId, new: BranchId) -> MigrationReport {
    let mut pairs = Vec::new();
    pair_branches(world, old, new, &mut pairs);
    let mapping: HashMap<TermId, TermId> = pairs.iter().copied().collect();

    let mut report = MigrationReport::default();
    for (old_id, new_id) in pairs {
        let Some(mut state) = world.graph.term(old_id).and_then(|t| t.state.clone()) else {
            continue;
        };
        let Some(accepted) = accepted_state_type(world, new_id) else {
            continue;
        };
        if state.contains_refs() {
            state.remap_refs(&|id| mapping.get(&id).copied());
        }
        match cast_value(&state, &accepted).ok() {
            Some(state) => {
                if world.config.log_migration {
                    log::debug!("migrated state {} -> {}", old_id, new_id);
                }
                if let Some(t) = world.graph.term_mut(new_id) {
                    t.state = Some(state);
                }
                report.migrated += 1;
            }
            None => {
                log::warn!("discarding state of {}: does not fit {}", old_id, accepted.name);
                report.discarded += 1;
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{config::WorldConfig, interpreter::evaluate_branch, world::initialize_with_config};

    #[test]
    fn frame_state_pairs() {
        let types = BuiltinTypes::new();
        let mut frame_state = types.make_list(Vec::new());
        let term = TermId::NULL;
        assert!(frame_state_get(&frame_state, term).is_none());
        frame_state_set(&mut frame_state, term, types.make_int(1), &types);
        frame_state_set(&mut frame_state, term, types.make_int(2), &types);
        assert_eq!(frame_state.as_list().map(|pairs| pairs.len()), Some(1));
        assert_eq!(frame_state_get(&frame_state, term).and_then(|v| v.as_int()), Some(2));
    }

    #[test]
    fn slots_grow_on_demand() {
        let types = BuiltinTypes::new();
        let mut slots = Vec::new();
        put_slot(&mut slots, 2, types.make_int(7), &types);
        assert_eq!(slots.len(), 3);
        assert_eq!(take_slot(&mut slots, 0, &types).as_list().map(|l| l.len()), Some(0));
        assert_eq!(take_slot(&mut slots, 9, &types).as_list().map(|l| l.len()), Some(0));
    }

    #[test]
    fn do_once_runs_body_once() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let mut stack = world.alloc_stack();
        let branch = world.create_branch();
        let (once, body) = world.do_once(branch).unwrap();
        let id = world.call(body, "unique_id", vec![]).unwrap();

        evaluate_branch(&mut world, &mut stack, branch).unwrap();
        let first = world.value_of(id).and_then(|v| v.as_int());
        evaluate_branch(&mut world, &mut stack, branch).unwrap();

        assert_eq!(world.value_of(id).and_then(|v| v.as_int()), first);
        assert_eq!(world.state_of(once).and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn reset_clears_nested_state() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let mut stack = world.alloc_stack();
        let branch = world.create_branch();
        let t = world.builtin_types().clone();
        let s = world.declare_state(branch, "s", t.int.clone(), Some(t.make_int(4))).unwrap();

        evaluate_branch(&mut world, &mut stack, branch).unwrap();
        assert!(world.state_of(s).is_some());
        reset_state(&mut world, branch);
        assert!(world.state_of(s).is_none());
    }
}
