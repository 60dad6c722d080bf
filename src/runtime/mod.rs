//! Runtime core: values and types, function records, the frame-stack
//! interpreter, overload resolution, state threading and feedback.
//!
//! # Ownership
//! The [`world::World`] owns the graph and the type registry. Values own
//! their storage outright; `Ref` storage is a weak term id and `Opaque`
//! storage is a shared host handle, so value graphs stay acyclic.
use crate::{
    graph::{TermId, validation::StaticError},
    runtime::{
        cast::CastError,
        types::{BuiltinTypes, TypeRef, TypeRegistry},
        value::{Value, ValueError},
    },
};

pub mod builtin_function;
pub mod builtins;
pub mod cast;
pub mod config;
pub mod feedback;
pub mod frame;
pub mod function;
pub mod interpreter;
pub mod overload;
pub mod stack;
pub mod types;
pub mod value;
pub mod world;

pub type BuiltinFn = fn(&mut dyn RuntimeContext, Vec<Value>) -> Result<Value, RuntimeError>;

/// What a builtin sees of the world while it runs.
pub trait RuntimeContext {
    fn types(&self) -> &BuiltinTypes;
    fn registry(&mut self) -> &mut TypeRegistry;
    /// The term being evaluated.
    fn caller(&self) -> TermId;
    /// Declared output type of the caller.
    fn output_type(&self) -> &TypeRef;
    /// State slot of the caller; `None` unless the function is stateful.
    fn state(&mut self) -> Option<&mut Value>;
    fn next_unique_id(&mut self) -> i64;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeErrorKind {
    #[error("Assertion failed")]
    AssertionFailed,
    #[error("{0}")]
    UserRaised(String),
    #[error(transparent)]
    Cast(#[from] CastError),
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error("Index out of range: {index} (length {length})")]
    IndexOutOfRange { index: i64, length: usize },
    #[error("Inputs have different lengths ({left} and {right})")]
    InputsLengthMismatch { left: usize, right: usize },
    #[error("No matching overload for {function}({inputs})")]
    NoMatchingOverload { function: String, inputs: String },
    #[error("Stack overflow (frame depth {depth})")]
    StackOverflow { depth: usize },
    #[error("{function} expected input {index} to be {expected}, got {found}")]
    InvalidInput {
        function: String,
        index: usize,
        expected: String,
        found: String,
    },
    #[error("Wrong number of inputs to {function} (found {found}, expected {expected})")]
    WrongNumberOfInputs {
        function: String,
        found: usize,
        expected: String,
    },
}

/// Runtime failure, tagged with the term that raised it once known.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub term: Option<TermId>,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind) -> Self {
        Self { kind, term: None }
    }

    /// Attaches the raising term; the innermost one wins.
    pub fn at(mut self, term: TermId) -> Self {
        if self.term.is_none() {
            self.term = Some(term);
        }
        self
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl From<RuntimeErrorKind> for RuntimeError {
    fn from(kind: RuntimeErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<CastError> for RuntimeError {
    fn from(err: CastError) -> Self {
        Self::new(RuntimeErrorKind::Cast(err))
    }
}

impl From<ValueError> for RuntimeError {
    fn from(err: ValueError) -> Self {
        Self::new(RuntimeErrorKind::Value(err))
    }
}

fn static_messages(errors: &[StaticError]) -> String {
    let messages: Vec<String> = errors.iter().map(|e| e.message()).collect();
    messages.join("\n")
}

/// Everything an evaluation entry point can fail with.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("{}", static_messages(.0))]
    Static(Vec<StaticError>),
    /// Broken graph invariant. Never recovered by `ignore_error`.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EvalError {
    pub fn is_runtime(&self) -> bool {
        matches!(self, EvalError::Runtime(_))
    }
}

/// Builds an [`EvalError::Internal`] recording where it was raised.
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::runtime::EvalError::Internal(format!(
            "{} [{}:{} ({})]",
            format!($($arg)*),
            file!(),
            line!(),
            module_path!()
        ))
    };
}
