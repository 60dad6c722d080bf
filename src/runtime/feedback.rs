//! Inverse evaluation: pushes a desired output value back through the graph
//! towards trainable value terms.
//!
//! A function opts in with a [`FeedbackFunction`]. The callback receives the
//! term and the wanted output, computes a target for each input that should
//! move, and recurses through [`Feedback::apply`]. Terms without a callback
//! are dead ends.
use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use crate::{
    graph::{BranchId, TermId, building::LOOP_INDEX_NAME},
    runtime::{
        RuntimeError, RuntimeErrorKind,
        cast::cast_value,
        function::FunctionKind,
        types::StorageKind,
        value::{Storage, Value},
        world::World,
    },
};

pub type FeedbackFn = fn(&mut Feedback<'_>, TermId, &Value) -> Result<(), RuntimeError>;

/// Feedback callback tagged by a stable name.
#[derive(Clone, Copy)]
pub struct FeedbackFunction {
    pub name: &'static str,
    pub func: FeedbackFn,
}

impl fmt::Debug for FeedbackFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeedbackFunction({})", self.name)
    }
}

/// Guards against cyclic routing through pathological graphs.
pub const MAX_FEEDBACK_STEPS: usize = 10_000;

/// One feedback propagation over a world.
pub struct Feedback<'w> {
    world: &'w mut World,
    /// Placeholder to call-argument maps, one level per subroutine entered.
    bindings: Vec<HashMap<TermId, TermId>>,
    steps: usize,
}

impl<'w> Feedback<'w> {
    pub fn new(world: &'w mut World) -> Self {
        Self {
            world,
            bindings: Vec::new(),
            steps: 0,
        }
    }

    pub fn world(&self) -> &World {
        &*self.world
    }

    /// Asks `term` to produce `desired`.
    pub fn apply(&mut self, term: TermId, desired: &Value) -> Result<(), RuntimeError> {
        self.steps += 1;
        if self.steps > MAX_FEEDBACK_STEPS {
            log::warn!("feedback stopped after {} steps", MAX_FEEDBACK_STEPS);
            return Ok(());
        }

        let argument = self.bindings.last().and_then(|level| level.get(&term).copied());
        if let Some(argument) = argument {
            let level = self.bindings.pop();
            let result = self.apply(argument, desired);
            if let Some(level) = level {
                self.bindings.push(level);
            }
            return result;
        }

        let Some(record) = self.world.graph.function_of(term) else {
            log::debug!("feedback dead end at {}: no function", term);
            return Ok(());
        };
        if let Some(callback) = record.feedback {
            return (callback.func)(self, term, desired);
        }
        if record.kind == FunctionKind::Subroutine {
            return self.through_subroutine(term, desired);
        }
        log::debug!("feedback dead end at {} ({})", term, record.name);
        Ok(())
    }

    fn through_subroutine(&mut self, call: TermId, desired: &Value) -> Result<(), RuntimeError> {
        let Some(t) = self.world.graph.term(call) else {
            return Ok(());
        };
        let (def, arguments) = (t.function, t.inputs.clone());
        let Some(body) = self.world.graph.nested_id(def) else {
            return Ok(());
        };
        let Some(result) = body_result(self.world, body) else {
            log::debug!("feedback dead end at {}: empty body", call);
            return Ok(());
        };
        let placeholders: Vec<TermId> = self
            .world
            .graph
            .branch(body)
            .map(|b| {
                b.iter()
                    .filter(|id| self.world.graph.kind_of(*id) == Some(FunctionKind::InputPlaceholder))
                    .collect()
            })
            .unwrap_or_default();

        self.bindings.push(placeholders.into_iter().zip(arguments).collect());
        let outcome = self.apply(result, desired);
        self.bindings.pop();
        outcome
    }

    /// The term a placeholder stands for under the current call bindings.
    fn resolve(&self, term: TermId) -> TermId {
        let mut current = term;
        for level in self.bindings.iter().rev() {
            if let Some(argument) = level.get(&current) {
                current = *argument;
            }
        }
        current
    }

    pub fn input(&self, term: TermId, index: usize) -> TermId {
        self.world.graph.term(term).map_or(TermId::NULL, |t| t.input(index))
    }

    /// Current output of `term`, seen through call bindings.
    pub fn value(&self, term: TermId) -> Option<&Value> {
        self.world.value_of(self.resolve(term))
    }

    pub fn number(&self, term: TermId) -> f64 {
        self.value(term).and_then(Value::as_number).unwrap_or(0.0)
    }

    pub fn input_number(&self, term: TermId, index: usize) -> f64 {
        self.number(self.input(term, index))
    }

    /// Whether feedback into `term` can reach a trainable value.
    pub fn is_trainable(&self, term: TermId) -> bool {
        let mut seen = HashSet::new();
        self.trainable_at(term, self.bindings.len(), &mut seen)
    }

    fn trainable_at(&self, term: TermId, depth: usize, seen: &mut HashSet<(TermId, usize)>) -> bool {
        if !seen.insert((term, depth)) {
            return false;
        }
        if depth > 0 {
            if let Some(argument) = self.bindings[depth - 1].get(&term) {
                return self.trainable_at(*argument, depth - 1, seen);
            }
        }
        let Some(t) = self.world.graph.term(term) else {
            return false;
        };
        t.trainable || t.inputs.iter().any(|input| self.trainable_at(*input, depth, seen))
    }

    /// `n` shaped like the output of `term`: rounded for int terms.
    pub fn numeric_like(&self, term: TermId, n: f64) -> Value {
        let types = self.world.builtin_types();
        let is_int = self
            .world
            .graph
            .term(self.resolve(term))
            .is_some_and(|t| t.declared_type.storage_kind == StorageKind::Int);
        if is_int {
            types.make_int(n.round() as i64)
        } else {
            types.make_float(n)
        }
    }

    /// Overwrites the output of a value term.
    pub fn assign(&mut self, term: TermId, desired: &Value) -> Result<(), RuntimeError> {
        let Some(t) = self.world.graph.term(term) else {
            return Ok(());
        };
        let declared = t.declared_type.clone();
        let value = match (declared.storage_kind, desired.as_number()) {
            (StorageKind::Int, Some(n)) => Value::new(declared, Storage::Int(n.round() as i64)),
            _ => cast_value(desired, &declared)?,
        };
        log::debug!("feedback assigns {} to {}", value, term);
        if let Some(t) = self.world.graph.term_mut(term) {
            t.output = value;
        }
        Ok(())
    }
}

/// Term whose value a subroutine body returns.
fn body_result(world: &World, body: BranchId) -> Option<TermId> {
    let branch = world.graph.branch(body)?;
    let returned = branch.iter().find_map(|id| {
        (world.graph.kind_of(id) == Some(FunctionKind::Return))
            .then(|| world.graph.term(id).map(|t| t.input(0)))
            .flatten()
            .filter(|input| !input.is_null())
    });
    returned.or_else(|| {
        branch.terms.iter().rev().copied().find(|id| {
            let control = matches!(
                world.graph.kind_of(*id),
                Some(FunctionKind::Return | FunctionKind::Break | FunctionKind::Continue | FunctionKind::Feedback)
            );
            !control && world.graph.term(*id).and_then(|t| t.name()) != Some(LOOP_INDEX_NAME)
        })
    })
}

/// Runs one feedback propagation from `term`.
pub fn apply_feedback(world: &mut World, term: TermId, desired: Value) -> Result<(), RuntimeError> {
    Feedback::new(world).apply(term, &desired)
}

fn desired_number(desired: &Value) -> Result<f64, RuntimeError> {
    desired.as_number().ok_or_else(|| {
        RuntimeError::new(RuntimeErrorKind::InvalidInput {
            function: "feedback".to_string(),
            index: 1,
            expected: "number".to_string(),
            found: desired.type_name().to_string(),
        })
    })
}

fn value_feedback(fb: &mut Feedback<'_>, term: TermId, desired: &Value) -> Result<(), RuntimeError> {
    let trainable = fb.world().graph.term(term).is_some_and(|t| t.trainable);
    if !trainable {
        log::debug!("feedback dead end at {}: not trainable", term);
        return Ok(());
    }
    fb.assign(term, desired)
}

/// Trainable inputs of `term` as distinct targets, each with the sum of
/// `weight(position)` over every position it appears at.
fn weighted_targets(fb: &Feedback<'_>, term: TermId, weight: impl Fn(usize) -> f64) -> Vec<(TermId, f64)> {
    let inputs = fb.world().graph.term(term).map(|t| t.inputs.clone()).unwrap_or_default();
    let mut targets: Vec<(TermId, TermId, f64)> = Vec::new();
    for (position, input) in inputs.into_iter().enumerate() {
        if !fb.is_trainable(input) {
            continue;
        }
        let key = fb.resolve(input);
        match targets.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, _, coefficient)) => *coefficient += weight(position),
            None => targets.push((key, input, weight(position))),
        }
    }
    targets.into_iter().map(|(_, input, coefficient)| (input, coefficient)).collect()
}

/// Moves each target so the output, linear in its inputs, changes by
/// `missing`. Every target carries an equal share; targets whose positions
/// cancel out cannot move the output and are left alone.
fn linear_feedback(fb: &mut Feedback<'_>, term: TermId, missing: f64, weight: impl Fn(usize) -> f64) -> Result<(), RuntimeError> {
    let targets: Vec<(TermId, f64, f64)> = weighted_targets(fb, term, weight)
        .into_iter()
        .filter(|(input, coefficient)| {
            if coefficient.abs() < 1e-9 {
                log::debug!("feedback through {} skips {}: positions cancel", term, input);
                return false;
            }
            true
        })
        .map(|(input, coefficient)| (input, coefficient, fb.number(input)))
        .collect();
    if targets.is_empty() {
        return Ok(());
    }
    let share = missing / targets.len() as f64;
    for (input, coefficient, current) in targets {
        let target = fb.numeric_like(input, current + share / coefficient);
        fb.apply(input, &target)?;
    }
    Ok(())
}

/// Splits the missing amount evenly over the trainable inputs.
fn add_feedback(fb: &mut Feedback<'_>, term: TermId, desired: &Value) -> Result<(), RuntimeError> {
    let want = desired_number(desired)?;
    let inputs = fb.world().graph.term(term).map(|t| t.inputs.clone()).unwrap_or_default();
    let current: f64 = inputs.iter().map(|input| fb.number(*input)).sum();
    linear_feedback(fb, term, want - current, |_| 1.0)
}

fn sub_feedback(fb: &mut Feedback<'_>, term: TermId, desired: &Value) -> Result<(), RuntimeError> {
    let want = desired_number(desired)?;
    let current = fb.input_number(term, 0) - fb.input_number(term, 1);
    linear_feedback(fb, term, want - current, |position| if position == 0 { 1.0 } else { -1.0 })
}

/// To reach `x = a * b`, moves `a` by the delta divided by `b` and the other
/// way round, both from the operands as they were before any move. Gives up
/// on an input when the other one is near zero. `a * a` moves `a` to the
/// square root of the target, keeping its sign.
fn mult_feedback(fb: &mut Feedback<'_>, term: TermId, desired: &Value) -> Result<(), RuntimeError> {
    let want = desired_number(desired)?;
    let (a, b) = (fb.input(term, 0), fb.input(term, 1));
    let (va, vb) = (fb.number(a), fb.number(b));

    if fb.resolve(a) == fb.resolve(b) {
        if !fb.is_trainable(a) {
            return Ok(());
        }
        if want < 0.0 {
            log::debug!("mult feedback gives up on {}: square cannot reach {}", a, want);
            return Ok(());
        }
        let root = if va < 0.0 { -want.sqrt() } else { want.sqrt() };
        let target = fb.numeric_like(a, root);
        return fb.apply(a, &target);
    }

    let moving: Vec<(TermId, f64, f64)> = [(a, va, vb), (b, vb, va)]
        .into_iter()
        .filter(|(input, _, _)| fb.is_trainable(*input))
        .collect();
    if moving.is_empty() {
        return Ok(());
    }
    let delta = (want - va * vb) / moving.len() as f64;
    for (input, current, divisor) in moving {
        if divisor.abs() < 0.0001 {
            log::debug!("mult feedback gives up on {}: other input is zero", input);
            continue;
        }
        let target = fb.numeric_like(input, current + delta / divisor);
        fb.apply(input, &target)?;
    }
    Ok(())
}

fn single_input(fb: &mut Feedback<'_>, term: TermId, target: f64) -> Result<(), RuntimeError> {
    let input = fb.input(term, 0);
    if !fb.is_trainable(input) {
        return Ok(());
    }
    let target = fb.numeric_like(input, target);
    fb.apply(input, &target)
}

fn neg_feedback(fb: &mut Feedback<'_>, term: TermId, desired: &Value) -> Result<(), RuntimeError> {
    let want = desired_number(desired)?;
    single_input(fb, term, -want)
}

/// Out-of-range targets wrap into [-1, 1].
fn wrap_unit(n: f64) -> f64 {
    if (-1.0..=1.0).contains(&n) {
        n
    } else {
        (n + 1.0).rem_euclid(2.0) - 1.0
    }
}

fn sin_feedback(fb: &mut Feedback<'_>, term: TermId, desired: &Value) -> Result<(), RuntimeError> {
    let want = wrap_unit(desired_number(desired)?);
    single_input(fb, term, want.asin())
}

fn cos_feedback(fb: &mut Feedback<'_>, term: TermId, desired: &Value) -> Result<(), RuntimeError> {
    let want = wrap_unit(desired_number(desired)?);
    single_input(fb, term, want.acos())
}

/// Routes to the branch the last evaluation chose. The condition itself is
/// never adjusted.
fn cond_feedback(fb: &mut Feedback<'_>, term: TermId, desired: &Value) -> Result<(), RuntimeError> {
    let condition = fb
        .value(fb.input(term, 0))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let chosen = fb.input(term, if condition { 1 } else { 2 });
    fb.apply(chosen, desired)
}

pub const VALUE_FEEDBACK: FeedbackFunction = FeedbackFunction {
    name: "value",
    func: value_feedback,
};

pub const ADD_FEEDBACK: FeedbackFunction = FeedbackFunction {
    name: "add",
    func: add_feedback,
};

pub const SUB_FEEDBACK: FeedbackFunction = FeedbackFunction {
    name: "sub",
    func: sub_feedback,
};

pub const MULT_FEEDBACK: FeedbackFunction = FeedbackFunction {
    name: "mult",
    func: mult_feedback,
};

pub const NEG_FEEDBACK: FeedbackFunction = FeedbackFunction {
    name: "neg",
    func: neg_feedback,
};

pub const SIN_FEEDBACK: FeedbackFunction = FeedbackFunction {
    name: "sin",
    func: sin_feedback,
};

pub const COS_FEEDBACK: FeedbackFunction = FeedbackFunction {
    name: "cos",
    func: cos_feedback,
};

pub const COND_FEEDBACK: FeedbackFunction = FeedbackFunction {
    name: "cond",
    func: cond_feedback,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{config::WorldConfig, world::initialize_with_config};

    #[test]
    fn wrap_keeps_unit_range() {
        assert_eq!(wrap_unit(0.5), 0.5);
        assert!((wrap_unit(1.5) - -0.5).abs() < 1e-9);
        assert!((wrap_unit(-1.5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn untrainable_value_is_dead_end() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let branch = world.create_branch();
        let a = world.create_float(branch, 1.0, None).unwrap();
        let t = world.builtin_types().clone();

        apply_feedback(&mut world, a, t.make_float(3.0)).unwrap();

        assert_eq!(world.value_of(a).and_then(|v| v.as_float()), Some(1.0));
    }

    #[test]
    fn int_value_rounds() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let branch = world.create_branch();
        let a = world.create_int(branch, 1, None).unwrap();
        world.set_trainable(a, true).unwrap();
        let t = world.builtin_types().clone();

        apply_feedback(&mut world, a, t.make_float(2.6)).unwrap();

        assert_eq!(world.value_of(a).and_then(|v| v.as_int()), Some(3));
    }

    #[test]
    fn neg_inverts() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let branch = world.create_branch();
        let a = world.create_float(branch, 1.0, None).unwrap();
        world.set_trainable(a, true).unwrap();
        let n = world.call(branch, "neg", vec![a]).unwrap();
        let t = world.builtin_types().clone();

        apply_feedback(&mut world, n, t.make_float(4.0)).unwrap();

        assert_eq!(world.value_of(a).and_then(|v| v.as_float()), Some(-4.0));
    }
}
