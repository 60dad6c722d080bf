use std::collections::HashSet;

use serde::Serialize;

use crate::{
    diagnostics::{ErrorCode, static_errors},
    graph::{BranchId, Graph, TermId},
    runtime::{cast::type_may_fit, function::FunctionKind},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum StaticErrorKind {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Unknown type: {0}")]
    UnknownType(String),
    #[error("Input {index} has type {found}, expected {expected}")]
    InputTypeMismatch {
        index: usize,
        expected: String,
        found: String,
    },
    #[error("Function is null")]
    NullFunction,
    #[error("Input {0} is null")]
    NullInput(usize),
    #[error("Wrong number of inputs (found {found}, expected {expected})")]
    WrongNumberOfInputs { found: usize, expected: usize },
    #[error("Input {0} depends on this term")]
    InputCycle(usize),
}

impl StaticErrorKind {
    pub fn code(&self) -> &'static ErrorCode {
        match self {
            StaticErrorKind::UnknownFunction(_) => &static_errors::UNKNOWN_FUNCTION,
            StaticErrorKind::UnknownIdentifier(_) => &static_errors::UNKNOWN_IDENTIFIER,
            StaticErrorKind::UnknownField(_) => &static_errors::UNKNOWN_FIELD,
            StaticErrorKind::UnknownType(_) => &static_errors::UNKNOWN_TYPE,
            StaticErrorKind::InputTypeMismatch { .. } => &static_errors::INPUT_TYPE_MISMATCH,
            StaticErrorKind::NullFunction => &static_errors::NULL_FUNCTION,
            StaticErrorKind::NullInput(_) => &static_errors::NULL_INPUT,
            StaticErrorKind::WrongNumberOfInputs { .. } => &static_errors::WRONG_NUMBER_OF_INPUTS,
            StaticErrorKind::InputCycle(_) => &static_errors::INPUT_CYCLE,
        }
    }
}

/// A static error found on a specific term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaticError {
    pub term: TermId,
    pub kind: StaticErrorKind,
}

impl StaticError {
    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn code(&self) -> &'static ErrorCode {
        self.kind.code()
    }
}

/// First static problem with `term`, if any.
pub fn check_term(graph: &Graph, term: TermId) -> Option<StaticErrorKind> {
    let t = graph.term(term)?;
    if let Some(annotation) = &t.static_error {
        return Some(annotation.clone());
    }
    let Some(record) = graph.record_of(t.function) else {
        return Some(StaticErrorKind::NullFunction);
    };

    for (index, input) in t.inputs.iter().enumerate() {
        if !graph.contains_term(*input) {
            return Some(StaticErrorKind::NullInput(index));
        }
    }

    if !record.accepts_arity(t.inputs.len()) {
        return Some(StaticErrorKind::WrongNumberOfInputs {
            found: t.inputs.len(),
            expected: record.inputs.len(),
        });
    }

    if !matches!(record.kind, FunctionKind::Overloaded | FunctionKind::Unknown) {
        for (index, input) in t.inputs.iter().enumerate() {
            let (Some(expected), Some(actual)) = (record.input_type(index), graph.term(*input)) else {
                continue;
            };
            if !type_may_fit(&actual.declared_type, expected) {
                return Some(StaticErrorKind::InputTypeMismatch {
                    index,
                    expected: expected.name.clone(),
                    found: actual.declared_type.name.clone(),
                });
            }
        }
    }

    input_cycle(graph, term)
}

fn input_cycle(graph: &Graph, term: TermId) -> Option<StaticErrorKind> {
    let t = graph.term(term)?;
    let mut visited = HashSet::new();
    for (index, input) in t.inputs.iter().enumerate() {
        let mut pending = vec![*input];
        while let Some(current) = pending.pop() {
            if current == term {
                return Some(StaticErrorKind::InputCycle(index));
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(next) = graph.term(current) {
                pending.extend(next.inputs.iter().copied());
            }
        }
    }
    None
}

/// Every static error in `branch` and its nested branches, in order.
pub fn check_branch(graph: &Graph, branch: BranchId) -> Vec<StaticError> {
    graph
        .walk(branch)
        .into_iter()
        .filter_map(|term| check_term(graph, term).map(|kind| StaticError { term, kind }))
        .collect()
}

pub fn has_static_errors(graph: &Graph, branch: BranchId) -> bool {
    graph
        .walk(branch)
        .into_iter()
        .any(|term| check_term(graph, term).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{config::WorldConfig, world::initialize_with_config};

    #[test]
    fn unknown_function_message() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let branch = world.create_branch();
        let one = world.create_int(branch, 1, None).unwrap();
        let term = world.call(branch, "embiggen", vec![one]).unwrap();
        let errors = check_branch(&world.graph, branch);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].term, term);
        assert_eq!(errors[0].message(), "Unknown function: embiggen");
        assert_eq!(errors[0].code().code, "E2000");
    }

    #[test]
    fn deleted_input_is_null_input() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let branch = world.create_branch();
        let a = world.create_int(branch, 1, None).unwrap();
        let neg = world.call(branch, "neg", vec![a]).unwrap();
        world.graph.delete_term(a).unwrap();
        assert_eq!(check_term(&world.graph, neg), Some(StaticErrorKind::NullInput(0)));
    }

    #[test]
    fn arity_and_type_mismatch() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let branch = world.create_branch();
        let s = world.create_string(branch, "x", None).unwrap();
        let not = world.function("not").unwrap();
        let bad_type = world.append(branch, not, vec![s]).unwrap();
        let bad_arity = world.append(branch, not, vec![]).unwrap();

        assert_eq!(
            check_term(&world.graph, bad_type),
            Some(StaticErrorKind::InputTypeMismatch {
                index: 0,
                expected: "bool".to_string(),
                found: "string".to_string()
            })
        );
        assert_eq!(
            check_term(&world.graph, bad_arity).map(|k| k.to_string()),
            Some("Wrong number of inputs (found 0, expected 1)".to_string())
        );
    }

    #[test]
    fn cycle_is_reported() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let branch = world.create_branch();
        let a = world.create_float(branch, 1.0, None).unwrap();
        let neg1 = world.call(branch, "neg", vec![a]).unwrap();
        let neg2 = world.call(branch, "neg", vec![neg1]).unwrap();
        world.graph.set_input(neg1, 0, neg2).unwrap();
        assert_eq!(check_term(&world.graph, neg1), Some(StaticErrorKind::InputCycle(0)));
        assert!(has_static_errors(&world.graph, branch));
    }

    #[test]
    fn clean_branch_has_no_errors() {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let branch = world.create_branch();
        let a = world.create_int(branch, 1, None).unwrap();
        world.call(branch, "add", vec![a, a]).unwrap();
        assert!(check_branch(&world.graph, branch).is_empty());
    }
}
