use super::{ErrorCode, ErrorType};
use crate::runtime::RuntimeErrorKind;

pub const WRONG_NUMBER_OF_ARGUMENTS: ErrorCode = ErrorCode {
    code: "E1000",
    title: "WRONG NUMBER OF ARGUMENTS",
    error_type: ErrorType::Runtime,
    hint: None,
};

pub const NO_MATCHING_OVERLOAD: ErrorCode = ErrorCode {
    code: "E1002",
    title: "NO MATCHING OVERLOAD",
    error_type: ErrorType::Runtime,
    hint: Some("None of the overloads accept the runtime types of these inputs."),
};

pub const RUNTIME_TYPE_ERROR: ErrorCode = ErrorCode {
    code: "E1004",
    title: "TYPE ERROR",
    error_type: ErrorType::Runtime,
    hint: None,
};

pub const INDEX_OUT_OF_RANGE: ErrorCode = ErrorCode {
    code: "E1012",
    title: "INDEX OUT OF RANGE",
    error_type: ErrorType::Runtime,
    hint: None,
};

pub const CAST_IMPOSSIBLE: ErrorCode = ErrorCode {
    code: "E1015",
    title: "CAST IMPOSSIBLE",
    error_type: ErrorType::Runtime,
    hint: None,
};

pub const NO_EQUALS_DEFINED: ErrorCode = ErrorCode {
    code: "E1016",
    title: "NO EQUALS DEFINED",
    error_type: ErrorType::Runtime,
    hint: Some("Give the type an equals op to compare its values."),
};

pub const INPUTS_LENGTH_MISMATCH: ErrorCode = ErrorCode {
    code: "E1017",
    title: "INPUTS LENGTH MISMATCH",
    error_type: ErrorType::Runtime,
    hint: None,
};

pub const ASSERTION_FAILED: ErrorCode = ErrorCode {
    code: "E1019",
    title: "ASSERTION FAILED",
    error_type: ErrorType::Runtime,
    hint: None,
};

pub const USER_ERROR: ErrorCode = ErrorCode {
    code: "E1020",
    title: "USER ERROR",
    error_type: ErrorType::Runtime,
    hint: None,
};

pub const STACK_OVERFLOW: ErrorCode = ErrorCode {
    code: "E1021",
    title: "STACK OVERFLOW",
    error_type: ErrorType::Runtime,
    hint: Some("Raise max_frame_depth or check for unbounded recursion."),
};

pub const INTERNAL_ERROR: ErrorCode = ErrorCode {
    code: "E9000",
    title: "INTERNAL ERROR",
    error_type: ErrorType::Internal,
    hint: Some("This is a bug in the evaluator or in code that edited the graph."),
};

impl RuntimeErrorKind {
    pub fn code(&self) -> &'static ErrorCode {
        match self {
            RuntimeErrorKind::AssertionFailed => &ASSERTION_FAILED,
            RuntimeErrorKind::UserRaised(_) => &USER_ERROR,
            RuntimeErrorKind::Cast(_) => &CAST_IMPOSSIBLE,
            RuntimeErrorKind::Value(_) => &NO_EQUALS_DEFINED,
            RuntimeErrorKind::IndexOutOfRange { .. } => &INDEX_OUT_OF_RANGE,
            RuntimeErrorKind::InputsLengthMismatch { .. } => &INPUTS_LENGTH_MISMATCH,
            RuntimeErrorKind::NoMatchingOverload { .. } => &NO_MATCHING_OVERLOAD,
            RuntimeErrorKind::StackOverflow { .. } => &STACK_OVERFLOW,
            RuntimeErrorKind::InvalidInput { .. } => &RUNTIME_TYPE_ERROR,
            RuntimeErrorKind::WrongNumberOfInputs { .. } => &WRONG_NUMBER_OF_ARGUMENTS,
        }
    }
}
