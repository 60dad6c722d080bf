use crate::{
    graph::{BranchId, TermId},
    runtime::value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Top-level pass over a branch; state lives on the terms themselves.
    Root,
    Subroutine,
    Loop,
    Case,
    DoOnce,
    IgnoreError,
    Initializer,
}

/// Pending unwind request, checked before every term.
#[derive(Debug, Clone)]
pub enum Interrupt {
    Return(Value),
    Break,
    Continue,
}

/// One activation of a branch.
#[derive(Debug, Clone)]
pub struct Frame {
    pub branch: BranchId,
    pub kind: FrameKind,
    pub caller: Option<TermId>,
    pub iteration: Option<usize>,
    pub term_index: usize,
    /// Outputs of this activation, indexed by term position.
    pub registers: Vec<Option<Value>>,
    pub interrupt: Option<Interrupt>,
    /// Frame state: a list of `[ref, state]` pairs. `None` for root frames.
    pub state: Option<Value>,
    pub ignore_errors: bool,
}

impl Frame {
    pub fn new(branch: BranchId, kind: FrameKind, len: usize) -> Self {
        Self {
            branch,
            kind,
            caller: None,
            iteration: None,
            term_index: 0,
            registers: vec![None; len],
            interrupt: None,
            state: None,
            ignore_errors: false,
        }
    }

    pub fn with_caller(mut self, caller: TermId) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn with_iteration(mut self, iteration: usize) -> Self {
        self.iteration = Some(iteration);
        self
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    pub fn ignoring_errors(mut self) -> Self {
        self.ignore_errors = true;
        self
    }

    pub fn register(&self, index: usize) -> Option<&Value> {
        self.registers.get(index)?.as_ref()
    }

    pub fn set_register(&mut self, index: usize, value: Value) {
        if index >= self.registers.len() {
            self.registers.resize(index + 1, None);
        }
        self.registers[index] = Some(value);
    }
}
