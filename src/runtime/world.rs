use std::{cell::Cell, rc::Rc};

use crate::{
    graph::{BranchId, Graph, GraphError, TermId, TermStatus, snapshot},
    runtime::{
        EvalError, builtins,
        config::WorldConfig,
        feedback,
        function::{Function, FunctionKind},
        interpreter::state::{self, MigrationReport},
        overload,
        stack::Stack,
        types::{BuiltinTypes, TypeRegistry},
        value::{Storage, Value},
    },
};

/// Ids of the function terms the evaluator treats specially.
#[derive(Debug, Clone, Copy)]
pub struct KernelFunctions {
    pub function: TermId,
    pub value: TermId,
    pub input_placeholder: TermId,
    pub if_block: TermId,
    pub case: TermId,
    pub join: TermId,
    pub for_loop: TermId,
    pub return_: TermId,
    pub break_: TermId,
    pub continue_: TermId,
    pub declared_state: TermId,
    pub do_once: TermId,
    pub ignore_error: TermId,
    pub feedback: TermId,
    pub unknown_function: TermId,
    pub unknown_identifier: TermId,
    pub unknown_type: TermId,
    pub unknown_field: TermId,
}

impl KernelFunctions {
    const UNSET: KernelFunctions = KernelFunctions {
        function: TermId::NULL,
        value: TermId::NULL,
        input_placeholder: TermId::NULL,
        if_block: TermId::NULL,
        case: TermId::NULL,
        join: TermId::NULL,
        for_loop: TermId::NULL,
        return_: TermId::NULL,
        break_: TermId::NULL,
        continue_: TermId::NULL,
        declared_state: TermId::NULL,
        do_once: TermId::NULL,
        ignore_error: TermId::NULL,
        feedback: TermId::NULL,
        unknown_function: TermId::NULL,
        unknown_identifier: TermId::NULL,
        unknown_type: TermId::NULL,
        unknown_field: TermId::NULL,
    };
}

/// Result of [`World::reload_branch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadReport {
    pub unchanged: bool,
    pub migration: MigrationReport,
}

/// Owns the graph, the type registry and process-wide counters. There is no
/// global state; a host may run several worlds side by side.
#[derive(Debug)]
pub struct World {
    pub graph: Graph,
    pub types: TypeRegistry,
    pub config: WorldConfig,
    kernel: BranchId,
    kernel_functions: KernelFunctions,
    pub(crate) next_unique_id: i64,
    next_stack_id: Cell<u32>,
}

impl World {
    /// Builds the kernel branch and registers the core builtins.
    pub fn new(config: WorldConfig) -> Result<Self, EvalError> {
        let mut graph = Graph::new();
        let kernel = graph.create_branch(None);
        let mut world = World {
            graph,
            types: TypeRegistry::new(),
            config,
            kernel,
            kernel_functions: KernelFunctions::UNSET,
            next_unique_id: 1,
            next_stack_id: Cell::new(0),
        };
        world
            .bootstrap()
            .map_err(|err| crate::internal_error!("kernel bootstrap failed: {}", err))?;
        log::debug!(
            "world ready: {} kernel terms, {} types",
            world.graph.branch(kernel).map_or(0, |b| b.len()),
            world.types.len()
        );
        Ok(world)
    }

    fn bootstrap(&mut self) -> Result<(), GraphError> {
        let kernel = self.kernel;
        let t = self.types.builtins().clone();

        let mut k = KernelFunctions::UNSET;
        k.function = self.define_function(kernel, Function::new("function", FunctionKind::Value, t.function.clone()))?;
        self.kernel_functions.function = k.function;

        k.value = self.define_function(
            kernel,
            Function::new("value", FunctionKind::Value, t.any.clone()).with_feedback(feedback::VALUE_FEEDBACK),
        )?;
        k.input_placeholder = self.define_function(
            kernel,
            Function::new("input_placeholder", FunctionKind::InputPlaceholder, t.any.clone()),
        )?;
        k.if_block = self.define_function(kernel, Function::new("if_block", FunctionKind::IfBlock, t.any.clone()))?;
        k.case = self.define_function(
            kernel,
            Function::new("case", FunctionKind::Case, t.any.clone())
                .with_input("condition", t.bool.clone())
                .variadic(),
        )?;
        k.join = self.define_function(
            kernel,
            Function::new("join", FunctionKind::CaseJoin, t.any.clone())
                .with_input("block", t.any.clone())
                .variadic()
                .with_specialize(overload::specialize_join),
        )?;
        k.for_loop = self.define_function(
            kernel,
            Function::new("for", FunctionKind::ForLoop, t.list.clone()).with_input("list", t.list.clone()),
        )?;
        k.return_ = self.define_function(
            kernel,
            Function::new("return", FunctionKind::Return, t.void.clone())
                .with_input("value", t.any.clone())
                .variadic(),
        )?;
        k.break_ = self.define_function(kernel, Function::new("break", FunctionKind::Break, t.void.clone()))?;
        k.continue_ = self.define_function(kernel, Function::new("continue", FunctionKind::Continue, t.void.clone()))?;
        k.declared_state = self.define_function(
            kernel,
            Function::new("declared_state", FunctionKind::DeclaredState, t.any.clone()).stateful(t.any.clone()),
        )?;
        k.do_once = self.define_function(
            kernel,
            Function::new("do_once", FunctionKind::DoOnce, t.void.clone()).stateful(t.bool.clone()),
        )?;
        k.ignore_error = self.define_function(
            kernel,
            Function::new("ignore_error", FunctionKind::IgnoreError, t.any.clone()),
        )?;
        k.feedback = self.define_function(
            kernel,
            Function::new("feedback", FunctionKind::Feedback, t.void.clone())
                .with_input("target", t.any.clone())
                .with_input("desired", t.any.clone())
                .side_effects(),
        )?;
        for (slot, name) in [
            (&mut k.unknown_function, "unknown_function"),
            (&mut k.unknown_identifier, "unknown_identifier"),
            (&mut k.unknown_type, "unknown_type"),
            (&mut k.unknown_field, "unknown_field"),
        ] {
            *slot = self.define_function(
                kernel,
                Function::new(name, FunctionKind::Unknown, t.any.clone())
                    .with_input("inputs", t.any.clone())
                    .variadic(),
            )?;
        }
        self.kernel_functions = k;

        builtins::register_builtins(self)
    }

    pub fn kernel(&self) -> BranchId {
        self.kernel
    }

    pub fn kernel_functions(&self) -> &KernelFunctions {
        &self.kernel_functions
    }

    pub fn builtin_types(&self) -> &BuiltinTypes {
        self.types.builtins()
    }

    /// Function term registered under `name` in the kernel.
    pub fn function(&self, name: &str) -> Option<TermId> {
        let id = self.graph.lookup_local(self.kernel, name)?;
        self.graph.term(id)?.is_function().then_some(id)
    }

    /// Adds a function-value term to `branch` and binds its name there.
    pub fn define_function(&mut self, branch: BranchId, record: Function) -> Result<TermId, GraphError> {
        let function_type = self.types.builtins().function.clone();
        let definer = self.kernel_functions.function;
        let name = record.name.clone();
        let id = self
            .graph
            .append_raw(branch, definer, Vec::new(), function_type.clone())?;
        if let Some(term) = self.graph.term_mut(id) {
            if definer.is_null() {
                term.function = id;
            }
            term.output = Value::new(function_type, Storage::Ref(id));
            term.function_record = Some(Rc::new(record));
            term.status = TermStatus::Done;
        }
        self.graph.bind_name(branch, id, &name)?;
        Ok(id)
    }

    /// Replaces the record of an existing function term.
    pub fn update_function(&mut self, function: TermId, record: Function) -> Result<(), GraphError> {
        let term = self
            .graph
            .term_mut(function)
            .ok_or(GraphError::UnknownTerm(function))?;
        if term.function_record.is_none() {
            return Err(GraphError::NotAFunction(function));
        }
        term.function_record = Some(Rc::new(record));
        Ok(())
    }

    /// Fresh top-level branch scoped under the kernel.
    pub fn create_branch(&mut self) -> BranchId {
        self.graph.create_branch(Some(self.kernel))
    }

    pub fn alloc_stack(&self) -> Stack {
        let id = self.next_stack_id.get();
        self.next_stack_id.set(id + 1);
        Stack::new(id, self.config.max_frame_depth)
    }

    pub fn value_of(&self, term: TermId) -> Option<&Value> {
        self.graph.term(term).map(|t| &t.output)
    }

    pub fn state_of(&self, term: TermId) -> Option<&Value> {
        self.graph.term(term)?.state.as_ref()
    }

    pub fn next_unique_id(&mut self) -> i64 {
        let id = self.next_unique_id;
        self.next_unique_id += 1;
        id
    }

    /// Hot reload: carries state from `old` into `new` and reports whether the
    /// two branches were structurally identical.
    pub fn reload_branch(&mut self, old: BranchId, new: BranchId) -> ReloadReport {
        let unchanged = snapshot::branch_fingerprint(self, old) == snapshot::branch_fingerprint(self, new);
        let migration = state::migrate_stateful_values(self, old, new);
        log::debug!(
            "reload {} -> {}: unchanged={} migrated={} discarded={}",
            old,
            new,
            unchanged,
            migration.migrated,
            migration.discarded
        );
        ReloadReport { unchanged, migration }
    }
}

/// A world configured from the `CIRCA_*` environment.
pub fn initialize() -> Result<World, EvalError> {
    World::new(WorldConfig::from_env())
}

pub fn initialize_with_config(config: WorldConfig) -> Result<World, EvalError> {
    World::new(config)
}

pub fn shutdown(world: World) {
    log::debug!(
        "shutting down world: {} terms, {} branches",
        world.graph.term_count(),
        world.graph.branch_count()
    );
    drop(world);
}

pub fn alloc_stack(world: &World) -> Stack {
    world.alloc_stack()
}
