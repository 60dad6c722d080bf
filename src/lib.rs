//! Circa: a dataflow term graph with a frame-stack evaluator, persistent
//! per-term state that survives code reloads, and feedback propagation that
//! nudges trainable constants toward a desired output.
pub mod diagnostics;
pub mod graph;
pub mod runtime;

pub use diagnostics::{Diagnostic, render_diagnostics};
pub use graph::{BranchId, Graph, GraphError, TermId, TermStatus, snapshot};
pub use runtime::{
    EvalError, RuntimeError, RuntimeErrorKind,
    config::{StaticErrorPolicy, WorldConfig},
    feedback::apply_feedback,
    interpreter::{
        evaluate_branch, run_function,
        state::{MigrationReport, migrate_stateful_values, reset_state},
    },
    stack::Stack,
    value::Value,
    world::{ReloadReport, World, alloc_stack, initialize, initialize_with_config, shutdown},
};
