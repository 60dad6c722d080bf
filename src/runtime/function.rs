use crate::{
    graph::{Graph, TermId},
    runtime::{
        builtin_function::BuiltinFunction,
        feedback::FeedbackFunction,
        types::{TypeRef, TypeRegistry},
    },
};

/// Narrows a term's declared output type from its inputs' static types.
/// Must be a pure function of the graph so that repeated calls agree.
pub type SpecializeFn = fn(&Graph, &mut TypeRegistry, TermId) -> Option<TypeRef>;

/// Evaluation strategy of a function. Closed set; the interpreter matches on
/// it directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FunctionKind {
    Builtin(BuiltinFunction),
    /// Constant; the term's output is the value.
    Value,
    InputPlaceholder,
    Subroutine,
    Overloaded,
    IfBlock,
    Case,
    /// A name rebound inside an if-block's cases, as the chosen case left it.
    CaseJoin,
    ForLoop,
    Return,
    Break,
    Continue,
    DeclaredState,
    DoOnce,
    IgnoreError,
    Feedback,
    /// Stand-in for an unresolved name; always carries a static error.
    Unknown,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub type_: TypeRef,
}

impl Param {
    pub fn new(name: &str, type_: TypeRef) -> Self {
        Self {
            name: name.to_string(),
            type_,
        }
    }
}

/// Function record attached to a function-value term.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub inputs: Vec<Param>,
    pub output_type: TypeRef,
    pub kind: FunctionKind,
    pub specialize_type: Option<SpecializeFn>,
    pub state_type: Option<TypeRef>,
    pub is_pure: bool,
    pub has_side_effects: bool,
    pub feedback: Option<FeedbackFunction>,
    /// Candidates in declaration order, for overloaded functions.
    pub overloads: Option<Vec<TermId>>,
    /// The last parameter repeats.
    pub variadic: bool,
}

impl Function {
    pub fn new(name: &str, kind: FunctionKind, output_type: TypeRef) -> Self {
        Self {
            name: name.to_string(),
            inputs: Vec::new(),
            output_type,
            kind,
            specialize_type: None,
            state_type: None,
            is_pure: true,
            has_side_effects: false,
            feedback: None,
            overloads: None,
            variadic: false,
        }
    }

    pub fn with_input(mut self, name: &str, type_: TypeRef) -> Self {
        self.inputs.push(Param::new(name, type_));
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<Param>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn stateful(mut self, state_type: TypeRef) -> Self {
        self.state_type = Some(state_type);
        self.is_pure = false;
        self
    }

    pub fn impure(mut self) -> Self {
        self.is_pure = false;
        self
    }

    pub fn side_effects(mut self) -> Self {
        self.has_side_effects = true;
        self.is_pure = false;
        self
    }

    pub fn with_feedback(mut self, feedback: FeedbackFunction) -> Self {
        self.feedback = Some(feedback);
        self
    }

    pub fn with_specialize(mut self, specialize: SpecializeFn) -> Self {
        self.specialize_type = Some(specialize);
        self
    }

    pub fn with_overloads(mut self, overloads: Vec<TermId>) -> Self {
        self.overloads = Some(overloads);
        self
    }

    pub fn input_type(&self, index: usize) -> Option<&TypeRef> {
        match self.inputs.get(index) {
            Some(param) => Some(&param.type_),
            None if self.variadic => self.inputs.last().map(|param| &param.type_),
            None => None,
        }
    }

    pub fn accepts_arity(&self, count: usize) -> bool {
        if self.variadic {
            count + 1 >= self.inputs.len()
        } else {
            count == self.inputs.len()
        }
    }

    pub fn is_stateful(&self) -> bool {
        self.state_type.is_some()
    }

    pub fn is_overloaded(&self) -> bool {
        self.kind == FunctionKind::Overloaded
    }

    /// Human readable `name(a: int, b: number) -> number`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .inputs
            .iter()
            .map(|param| format!("{}: {}", param.name, param.type_.name))
            .collect();
        let dots = if self.variadic { "..." } else { "" };
        format!(
            "{}({}{}) -> {}",
            self.name,
            params.join(", "),
            dots,
            self.output_type.name
        )
    }
}
