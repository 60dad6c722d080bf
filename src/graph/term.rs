use std::{fmt, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::{
    graph::{arena::ArenaId, branch::BranchId, validation::StaticErrorKind},
    runtime::{function::Function, types::TypeRef, value::Value},
};

/// Weak, generation-checked handle to a [`Term`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TermId(pub(crate) ArenaId);

impl TermId {
    /// Placeholder written into inputs whose term was deleted.
    pub const NULL: TermId = TermId(ArenaId::NULL);

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "#null")
        } else {
            write!(f, "#{}", self.0.index())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermStatus {
    Pending,
    Evaluating,
    Done,
    Errored,
}

/// A node in the dataflow graph: one function applied to an ordered list of
/// input terms.
#[derive(Debug, Clone)]
pub struct Term {
    pub id: TermId,
    pub owning_branch: BranchId,
    /// Position inside `owning_branch`, kept current on append and delete.
    pub index: usize,
    pub inputs: Vec<TermId>,
    pub function: TermId,
    pub declared_type: TypeRef,
    /// Value produced by the most recent evaluation (or the constant, for
    /// value terms).
    pub output: Value,
    pub state: Option<Value>,
    pub nested: Option<BranchId>,
    pub name: Option<String>,
    pub status: TermStatus,
    /// Annotation left by whoever built the term (parser or builder API).
    pub static_error: Option<StaticErrorKind>,
    pub trainable: bool,
    /// Present when this term is itself a function value.
    pub function_record: Option<Rc<Function>>,
}

impl Term {
    pub fn input(&self, index: usize) -> TermId {
        self.inputs.get(index).copied().unwrap_or(TermId::NULL)
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_function(&self) -> bool {
        self.function_record.is_some()
    }
}
