#![allow(dead_code)]

use circa::{
    BranchId, EvalError, StaticErrorPolicy, TermId, World, WorldConfig, evaluate_branch, initialize_with_config,
};

pub fn world() -> World {
    initialize_with_config(WorldConfig::default()).unwrap()
}

pub fn lenient_world() -> World {
    initialize_with_config(WorldConfig {
        static_error_policy: StaticErrorPolicy::SkipAffected,
        ..WorldConfig::default()
    }).unwrap()
}

/// Evaluates `branch` once on a fresh stack, panicking with the rendered
/// diagnostics on failure.
pub fn eval(world: &mut World, branch: BranchId) {
    let mut stack = world.alloc_stack();
    if let Err(err) = evaluate_branch(world, &mut stack, branch) {
        let rendered = circa::render_diagnostics(&circa::Diagnostic::from_eval(&world.graph, &err), false);
        panic!("evaluation failed:\n{}", rendered);
    }
}

pub fn eval_err(world: &mut World, branch: BranchId) -> EvalError {
    let mut stack = world.alloc_stack();
    evaluate_branch(world, &mut stack, branch).expect_err("evaluation should fail")
}

pub fn int_of(world: &World, term: TermId) -> i64 {
    world
        .value_of(term)
        .and_then(|v| v.as_int())
        .unwrap_or_else(|| panic!("{} has no int output: {:?}", term, world.value_of(term)))
}

pub fn float_of(world: &World, term: TermId) -> f64 {
    world
        .value_of(term)
        .and_then(|v| v.as_number())
        .unwrap_or_else(|| panic!("{} has no number output: {:?}", term, world.value_of(term)))
}

pub fn rendered(world: &World, term: TermId) -> String {
    world.value_of(term).map(|v| v.to_string()).unwrap_or_default()
}
